//! Lodge Store - dual-mode persistence for the lodging domain
//!
//! One `StorageEngine` contract over two backends: a flat JSON file store
//! and an embedded SQLite database. The relationship resolver sits on top of
//! the contract so ownership and link rules behave identically in both modes.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod file;
pub mod resolver;

pub use config::{open, BackendKind, StoreConfig};
pub use db::Database;
pub use engine::{LinkOutcome, StorageEngine};
pub use error::{Result, StoreError};
pub use file::FileStore;
