// GitHub OAuth provider.

use async_trait::async_trait;
use serde::Deserialize;

use guardpost_core::error::{AuthError, Result};

use super::provider::{IdentityProvider, ProviderProfile};

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";
const EMAILS_URL: &str = "https://api.github.com/user/emails";

pub struct GitHubProvider {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

impl GitHubProvider {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http: reqwest::Client::new(),
        }
    }

    async fn fetch_primary_email(&self, token: &str) -> Result<Option<String>> {
        let emails: Vec<GitHubEmail> = self
            .http
            .get(EMAILS_URL)
            .bearer_auth(token)
            .header("User-Agent", "guardpost")
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("github email fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("github email response invalid: {e}")))?;
        Ok(emails
            .into_iter()
            .find(|e| e.primary && e.verified)
            .map(|e| e.email))
    }
}

#[async_trait]
impl IdentityProvider for GitHubProvider {
    fn name(&self) -> &str {
        "github"
    }

    fn authorization_url(&self, state: &str, redirect_uri: &str) -> String {
        format!(
            "{AUTHORIZE_URL}?client_id={}&redirect_uri={}&state={}&scope=user:email",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<ProviderProfile> {
        let token: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .header("Accept", "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("github token exchange failed: {e}")))?
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("github token response invalid: {e}")))?;

        let access_token = token.access_token.ok_or_else(|| {
            AuthError::Provider(format!(
                "github rejected the code: {}",
                token.error_description.unwrap_or_else(|| "no detail".into())
            ))
        })?;

        let user: GitHubUser = self
            .http
            .get(USER_URL)
            .bearer_auth(&access_token)
            .header("User-Agent", "guardpost")
            .send()
            .await
            .map_err(|e| AuthError::Provider(format!("github user fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| AuthError::Provider(format!("github user response invalid: {e}")))?;

        // The profile email is often hidden; fall back to the emails API.
        let email = match user.email {
            Some(email) => email,
            None => self
                .fetch_primary_email(&access_token)
                .await?
                .ok_or_else(|| AuthError::Provider("github account has no verified email".into()))?,
        };

        Ok(ProviderProfile {
            id: user.id.to_string(),
            email,
            username: Some(user.login),
            name: user.name,
            image_url: user.avatar_url,
        })
    }
}
