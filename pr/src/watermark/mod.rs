//! Durable watermark storage
//!
//! The watermark is the id of the newest event the relay has already handled.
//! It lives in a one-table SQLite database so it survives restarts.

mod store;

pub use store::{SqliteWatermarkStore, StoreError, WatermarkStore};
