//! # kvmodel Core
//!
//! Entity mapping over a key-value store.
//!
//! This crate provides:
//! - Key derivation for every structure an entity type owns
//! - The [`Model`] contract entities implement
//! - Store-side save and remove procedures and their executor
//! - The [`Orm`] engine: lookups by id, unique and indexed attribute, and
//!   ordered member lists
//!
//! ## Key Layout
//!
//! For an entity type `user`:
//!
//! | Key | Kind | Contents |
//! |-----|------|----------|
//! | `user:<id>` | hash | attributes plus `id` |
//! | `user:id` | string | id counter |
//! | `user:all` | set | live ids |
//! | `user:uniques:<field>` | hash | value → id |
//! | `user:indices:<field>:<value>` | set | ids |
//! | `user:<id>:<list>` | list | member ids |
//!
//! ## Example
//!
//! ```rust,ignore
//! use kvmodel_core::Orm;
//! use kvmodel_store::InMemoryStore;
//!
//! let orm = Orm::new(InMemoryStore::new())?;
//! let mut user = User::with_email("a@x.com");
//! orm.save(&mut user)?;
//! assert!(orm.exists_by_id::<User>(user.id())?);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
pub mod keys;
mod model;
mod orm;
pub mod procedure;

pub use config::{MissingMemberPolicy, OrmConfig};
pub use error::{OrmError, OrmResult};
pub use keys::KeyNamer;
pub use model::{AttributeMap, Model, ID_ATTRIBUTE};
pub use orm::Orm;
pub use procedure::{ProcedureExecutor, RemoveProcedure, SaveProcedure};
