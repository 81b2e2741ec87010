// guardpost-core — shared types for the guardpost authentication engine.
//
// Holds everything the engine and its storage backends both depend on:
// configuration options, the error taxonomy, the persisted data models, and
// the `AuthStore` trait that every backend implements.

pub mod db;
pub mod error;
pub mod options;

pub use error::{AuthError, ErrorCode, Result};
pub use options::AuthOptions;
