// The provider seam.
//
// Real and mock providers implement the same trait and are registered at
// engine construction, so nothing downstream ever branches on "is this a
// mock".

use async_trait::async_trait;

use guardpost_core::error::Result;

/// What a provider tells us about the authenticated account.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    /// Stable account id at the provider. The connection key.
    pub id: String,
    pub email: String,
    /// Provider-side handle, if the provider has one. Used as a username
    /// seed for onboarding.
    pub username: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The name connections are stored under, e.g. "github".
    fn name(&self) -> &str;

    /// Where to send the user to authorize.
    fn authorization_url(&self, state: &str, redirect_uri: &str) -> String;

    /// Trade the callback code for the account profile.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<ProviderProfile>;
}
