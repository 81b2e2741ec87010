// External identity providers.

pub mod github;
pub mod mock;
pub mod provider;

pub use github::GitHubProvider;
pub use mock::MockProvider;
pub use provider::{IdentityProvider, ProviderProfile};
