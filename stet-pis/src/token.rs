//! OAuth2 token lifecycle.
//!
//! One token slot serves three purposes: the pre-step client credentials
//! token used for plain API calls, and the PSU tokens obtained with an
//! authorization code during validation or cancellation. They share a single
//! refresh token.

use crate::config::{ClientAuthMethod, PreStepType};
use crate::error::Result;
use crate::flow::Flow;
use crate::response::token_data;
use crate::transport::{Endpoint, Method, Request};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Duration;
use std::fmt;
use tracing::{debug, info};

/// OAuth2 grant used to obtain a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Grant {
    ClientCredentials { scope: String },
    AuthorizationCode { code: String },
    RefreshToken { refresh_token: String },
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grant::ClientCredentials { .. } => write!(f, "client_credentials"),
            Grant::AuthorizationCode { .. } => write!(f, "authorization_code"),
            Grant::RefreshToken { .. } => write!(f, "refresh_token"),
        }
    }
}

impl<'a> Flow<'a> {
    fn grant_form(&self, grant: &Grant) -> Vec<(String, String)> {
        let mut form = vec![("grant_type".to_string(), grant.to_string())];
        match grant {
            Grant::ClientCredentials { scope } => {
                form.push(("scope".to_string(), scope.clone()));
            }
            Grant::AuthorizationCode { code } => {
                form.push(("code".to_string(), code.clone()));
                form.push((
                    "redirect_uri".to_string(),
                    self.settings.redirect_uri.clone(),
                ));
                if let Some(verifier) = &self.state.pkce_verifier {
                    form.push(("code_verifier".to_string(), verifier.clone()));
                }
            }
            Grant::RefreshToken { refresh_token } => {
                form.push(("refresh_token".to_string(), refresh_token.clone()));
                form.push((
                    "redirect_uri".to_string(),
                    self.settings.redirect_uri.clone(),
                ));
            }
        }
        form
    }

    /// Requests a token and stores it in the session state.
    pub(crate) async fn acquire_token(&mut self, grant: Grant) -> Result<()> {
        let settings = self.settings;
        let mut form = self.grant_form(&grant);
        let mut request =
            Request::new(Method::Post, Endpoint::Token).with_header("Accept", "application/json");

        match self.config.client_auth_method {
            ClientAuthMethod::Basic => {
                let credentials = format!(
                    "{}:{}",
                    settings.client_id,
                    settings.client_secret.as_deref().unwrap_or("")
                );
                request = request.with_header(
                    "Authorization",
                    &format!("Basic {}", STANDARD.encode(credentials)),
                );
            }
            ClientAuthMethod::Post => {
                form.push(("client_id".to_string(), settings.client_id.clone()));
                if let Some(secret) = &settings.client_secret {
                    form.push(("client_secret".to_string(), secret.clone()));
                }
            }
        }

        info!("Requesting a token with the {} grant", grant);
        let response = self.send(request.with_form(form)).await?;
        let data = token_data(&response.body)?;
        let now = self.now();

        let token_type = data.token_type.as_deref().unwrap_or("Bearer");
        self.state.oauth_token = Some(data.access_token);
        self.state.oauth_token_type = Some(self.config.normalize_token_type(token_type));
        self.state.oauth_token_expires_at = data
            .expires_in
            .map(|seconds| now + Duration::seconds(seconds));
        match (data.refresh_token, &grant) {
            (Some(refresh_token), _) => self.state.oauth_refresh_token = Some(refresh_token),
            // Banks that do not rotate refresh tokens omit them on refresh.
            (None, Grant::RefreshToken { .. }) => {}
            (None, _) => self.state.oauth_refresh_token = None,
        }
        self.new_token = true;
        Ok(())
    }

    /// Replaces an expired token, using the refresh token when there is one.
    pub(crate) async fn check_token(&mut self) -> Result<()> {
        if self.state.oauth_token.is_none() {
            return Ok(());
        }
        match self.state.oauth_token_expires_at {
            Some(expires_at) if expires_at <= self.now() => {
                info!("The access token expired at {}", expires_at);
                self.refresh_token().await?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Returns false when there was no refresh token to use. The expired
    /// token is dropped either way.
    async fn refresh_token(&mut self) -> Result<bool> {
        self.state.oauth_token = None;
        let Some(refresh_token) = self.state.oauth_refresh_token.clone() else {
            debug!("No refresh token available");
            return Ok(false);
        };
        self.acquire_token(Grant::RefreshToken { refresh_token })
            .await?;
        Ok(true)
    }

    /// Makes sure a token is available before an API call.
    pub(crate) async fn check_pre_step(&mut self) -> Result<()> {
        self.check_token().await?;
        if self.state.oauth_token.is_some() || self.config.pre_step == PreStepType::None {
            return Ok(());
        }
        self.request_pre_step_token().await
    }

    pub(crate) async fn request_pre_step_token(&mut self) -> Result<()> {
        let scope = self.config.pre_step_scope.clone();
        self.acquire_token(Grant::ClientCredentials { scope }).await
    }

    pub(crate) fn reset_token(&mut self) {
        debug!("Dropping the current token");
        self.state.reset_token();
    }
}
