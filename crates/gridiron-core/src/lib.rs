// Library root: the fantasy league core shared by the CLI and integration
// tests.

pub mod config;
pub mod draft;
pub mod error;
pub mod league;
pub mod lineup;
pub mod model;
pub mod schedule;
pub mod scoring;
pub mod store;

pub use error::{CoreError, Result, StoreError};
