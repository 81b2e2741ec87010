// Persistence layer: data models and the store trait.

pub mod models;
pub mod store;

pub use models::{Connection, Password, Session, User, Verification, VerificationKind};
pub use store::{AuthStore, NewUser, StoreError, StoreResult};
