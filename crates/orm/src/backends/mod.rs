//! Database backends
//!
//! The query and entity layers only see the [`Database`] trait; concrete
//! adaptors live here. `MySqlBackend` talks to a real server through sqlx,
//! `MockDatabase` serves canned responses in tests.

pub mod core;
pub mod mock;
pub mod mysql;

pub use core::{Database, ExecuteResult, PoolConfig};
pub use mock::{ExecutedQuery, MockDatabase, MockResponse};
pub use mysql::MySqlBackend;
