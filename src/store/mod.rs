//! Durable message storage.
//!
//! Append-only message log backed by SQLite, queryable per directional
//! (sender, receiver) pair.

pub mod message_store;

pub use message_store::{MessageStore, StoreError};
