//! Core types and trait definitions for Orchid.
//!
//! Documents, type descriptions, label selectors and the storage abstraction
//! live here. This crate is deliberately free of HTTP and database
//! dependencies; the engine and the API server both depend on it.

// Native `async fn` in traits; the returned futures are bounded explicitly.
#![allow(async_fn_in_trait)]

pub mod crd;
pub mod document;
pub mod error;
pub mod field;
pub mod jsonschema;
pub mod selector;
pub mod store;

pub use error::{Error, Result};
