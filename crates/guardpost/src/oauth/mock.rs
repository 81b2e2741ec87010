// In-process provider for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;

use guardpost_core::error::{AuthError, Result};

use super::provider::{IdentityProvider, ProviderProfile};

/// Exchanges pre-registered codes for canned profiles. Unknown codes fail
/// the same way a revoked real-world code would.
pub struct MockProvider {
    name: String,
    profiles: HashMap<String, ProviderProfile>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profiles: HashMap::new(),
        }
    }

    /// Register a code → profile exchange.
    pub fn with_profile(mut self, code: impl Into<String>, profile: ProviderProfile) -> Self {
        self.profiles.insert(code.into(), profile);
        self
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn authorization_url(&self, state: &str, redirect_uri: &str) -> String {
        format!(
            "/mock/{}/authorize?state={}&redirect_uri={}",
            self.name,
            urlencoding::encode(state),
            urlencoding::encode(redirect_uri),
        )
    }

    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<ProviderProfile> {
        self.profiles
            .get(code)
            .cloned()
            .ok_or_else(|| AuthError::Provider(format!("{}: unknown code", self.name)))
    }
}
