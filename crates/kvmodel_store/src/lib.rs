//! # kvmodel Store
//!
//! Connection contract and in-memory reference store for kvmodel.
//!
//! This crate is the lowest layer of kvmodel. A store is an **opaque
//! key-value server**: it executes commands and store-side procedures, but knows
//! nothing about entities or key layouts.
//!
//! ## Design Principles
//!
//! - Connections are blocking request/response channels
//! - Procedures run indivisibly on the store side
//! - Must be `Send + Sync` so many engines can share a connection
//! - kvmodel_core owns all key-layout interpretation
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and embedded use
//!
//! ## Example
//!
//! ```rust
//! use kvmodel_store::{Command, InMemoryStore, StoreConnection};
//!
//! let store = InMemoryStore::new();
//! store.run(Command::sadd("user:all", "1")).unwrap();
//! let reply = store.run(Command::sismember("user:all", "1")).unwrap();
//! assert_eq!(reply.as_integer(), Some(1));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod connection;
mod error;
mod memory;
mod procedure;

pub use bytes::Bytes;
pub use command::{Command, Reply};
pub use connection::StoreConnection;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use procedure::{Procedure, ProcedureContext, ProcedureHandle};
