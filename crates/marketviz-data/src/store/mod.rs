//! SQLite persistence: time-series cache and index result sink.

pub mod sqlite;

pub use sqlite::{IndexStore, StoreStats};
