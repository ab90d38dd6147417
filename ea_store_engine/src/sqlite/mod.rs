//! SQLite backend for the EA store engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
