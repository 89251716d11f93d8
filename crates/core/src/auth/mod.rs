//! Request authentication for the ingest API.
//!
//! The operator surface is either open (`method = "none"`, for local
//! deployments behind a trusted proxy) or guarded by a single shared API key.

mod api_key;

pub use api_key::ApiKeyAuthenticator;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;
use thiserror::Error;

use crate::config::{AuthConfig, AuthMethod};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl AuthError {
    /// Label used for the auth failure metric.
    pub fn label(&self) -> &'static str {
        match self {
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::InvalidCredentials(_) => "invalid_credentials",
            AuthError::ConfigurationError(_) => "configuration",
        }
    }
}

/// What the middleware hands to an [`Authenticator`]. Header names are lowercase.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

/// The caller a request was accepted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub principal: String,
    pub method: &'static str,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            principal: "anonymous".to_string(),
            method: "none",
        }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    fn method_name(&self) -> &'static str;
}

/// Accepts every request as [`Identity::anonymous`].
#[derive(Debug, Default)]
pub struct NoneAuthenticator;

impl NoneAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(&self, _request: &AuthRequest) -> Result<Identity, AuthError> {
        Ok(Identity::anonymous())
    }

    fn method_name(&self) -> &'static str {
        "none"
    }
}

/// Build the authenticator selected by `[auth]`.
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator::new())),
        AuthMethod::ApiKey => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    AuthError::ConfigurationError(
                        "auth.api_key must be set when method is api_key".to_string(),
                    )
                })?;
            Ok(Box::new(ApiKeyAuthenticator::new(api_key)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_none_accepts_everything() {
        let auth = NoneAuthenticator::new();
        let request = AuthRequest {
            headers: HashMap::new(),
            source_ip: "10.0.0.7".parse().unwrap(),
        };

        let identity = auth.authenticate(&request).await.unwrap();
        assert_eq!(identity, Identity::anonymous());
        assert_eq!(auth.method_name(), "none");
    }

    #[test]
    fn test_factory_selects_method() {
        let none = create_authenticator(&AuthConfig {
            method: AuthMethod::None,
            api_key: None,
        })
        .unwrap();
        assert_eq!(none.method_name(), "none");

        let keyed = create_authenticator(&AuthConfig {
            method: AuthMethod::ApiKey,
            api_key: Some("s3cret".to_string()),
        })
        .unwrap();
        assert_eq!(keyed.method_name(), "api_key");
    }

    #[test]
    fn test_factory_rejects_missing_or_blank_key() {
        for api_key in [None, Some("   ".to_string())] {
            let result = create_authenticator(&AuthConfig {
                method: AuthMethod::ApiKey,
                api_key,
            });
            assert!(matches!(result, Err(AuthError::ConfigurationError(_))));
        }
    }

    #[test]
    fn test_failure_labels() {
        assert_eq!(AuthError::NotAuthenticated.label(), "not_authenticated");
        assert_eq!(
            AuthError::InvalidCredentials("x".into()).label(),
            "invalid_credentials"
        );
    }
}
