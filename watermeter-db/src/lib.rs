//! Typed access to the water meter database: domain rows plus the queries and
//! schema management shared by the collector daemon and the maintenance logger.

pub mod db;
pub mod domain;
pub mod error;

pub use error::DbError;
