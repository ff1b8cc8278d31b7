//! SQLite backend for Orchid.
//!
//! Derives a relational schema from each registered type description,
//! decomposes documents into rows across that schema, and writes them in a
//! single transaction. Every root row also embeds the full document, which is
//! what reads return.
//!
//! All database access runs on the dedicated thread owned by
//! [`tokio_rusqlite`]; the engine itself ([`orm::Mapping`]) is synchronous.

pub mod column;
pub mod decompose;
pub mod encode;
pub mod error;
mod generate;
pub mod orm;
mod registry;
pub mod result;
pub mod schema;
pub mod statement;
mod store;
pub mod table;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
