// Shared engine state, built once and handed around as `Arc<AuthContext>`.

use std::collections::HashMap;
use std::sync::Arc;

use guardpost_core::db::AuthStore;
use guardpost_core::error::{AuthError, Result};
use guardpost_core::options::AuthOptions;

use crate::cookies::AuthCookies;
use crate::email::Mailer;
use crate::oauth::IdentityProvider;

pub struct AuthContext {
    pub options: AuthOptions,
    pub store: Arc<dyn AuthStore>,
    pub mailer: Arc<dyn Mailer>,
    pub providers: HashMap<String, Arc<dyn IdentityProvider>>,
    pub cookies: AuthCookies,
}

impl AuthContext {
    pub fn builder(options: AuthOptions) -> AuthContextBuilder {
        AuthContextBuilder {
            options,
            store: None,
            mailer: None,
            providers: HashMap::new(),
        }
    }

    pub fn provider(&self, name: &str) -> Option<&Arc<dyn IdentityProvider>> {
        self.providers.get(name)
    }
}

pub struct AuthContextBuilder {
    options: AuthOptions,
    store: Option<Arc<dyn AuthStore>>,
    mailer: Option<Arc<dyn Mailer>>,
    providers: HashMap<String, Arc<dyn IdentityProvider>>,
}

impl AuthContextBuilder {
    pub fn store(mut self, store: Arc<dyn AuthStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Register an identity provider under its own name. Whether it is real
    /// or a mock is decided here, once, and invisible everywhere else.
    pub fn provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    pub fn build(self) -> Result<Arc<AuthContext>> {
        if self.options.secrets.is_empty() {
            return Err(AuthError::Config("at least one secret is required".into()));
        }
        let store = self
            .store
            .ok_or_else(|| AuthError::Config("a store is required".into()))?;
        let mailer = self
            .mailer
            .ok_or_else(|| AuthError::Config("a mailer is required".into()))?;
        let cookies = AuthCookies::new(self.options.clone());
        Ok(Arc::new(AuthContext {
            options: self.options,
            store,
            mailer,
            providers: self.providers,
            cookies,
        }))
    }
}
