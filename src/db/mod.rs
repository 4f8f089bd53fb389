//! Database module: the scoped MySQL session and the seed-override statements.
//!
//! Layout:
//! - `mysql.rs`: connector/session traits and their MySQL implementation
//! - `statements.rs`: literal SQL for selecting the schema and the overrides

pub mod mysql;
pub mod statements;

pub use mysql::{Connector, MySqlConnector, MySqlSession, SiteDatabase};
pub use statements::{Statement, seed_overrides};
