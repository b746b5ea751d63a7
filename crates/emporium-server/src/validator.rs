//! Owner existence checks against the identity service.
//!
//! Orders reference users that live in another service's store. Before the
//! order service reads or writes anything for an owner it asks the identity
//! service whether that owner exists. Results are never cached and failed
//! calls are not retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};

#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error("identity service unreachable: {0}")]
    Transport(String),

    #[error("identity service answered {status} for owner '{owner_id}'")]
    UnexpectedStatus { owner_id: String, status: u16 },

    #[error("invalid identity service configuration: {0}")]
    Config(String),
}

#[async_trait]
pub trait OwnerValidator: Send + Sync {
    /// `Ok(false)` means the identity service reported the owner as unknown.
    async fn exists(&self, owner_id: &str) -> Result<bool, ValidatorError>;
}

/// Calls `GET {base_url}/users/{id}` with the id escaped as a single path
/// segment.
#[derive(Debug, Clone)]
pub struct HttpOwnerValidator {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpOwnerValidator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ValidatorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ValidatorError::Config(e.to_string()))?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
    ) -> Result<Self, ValidatorError> {
        let raw = base_url.into();
        let base_url = Url::parse(&raw)
            .map_err(|e| ValidatorError::Config(format!("base url '{raw}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ValidatorError::Config(format!(
                "base url '{raw}' cannot carry a path"
            )));
        }
        Ok(Self { client, base_url })
    }

    fn owner_url(&self, owner_id: &str) -> Result<Url, ValidatorError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ValidatorError::Config("base url cannot carry a path".into()))?
            .pop_if_empty()
            .push("users")
            .push(owner_id);
        Ok(url)
    }
}

#[async_trait]
impl OwnerValidator for HttpOwnerValidator {
    async fn exists(&self, owner_id: &str) -> Result<bool, ValidatorError> {
        let url = self.owner_url(owner_id)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ValidatorError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => {
                tracing::debug!(owner_id, "owner not found by identity service");
                Ok(false)
            }
            status => Err(ValidatorError::UnexpectedStatus {
                owner_id: owner_id.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(base: &str) -> HttpOwnerValidator {
        HttpOwnerValidator::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn owner_id_stays_one_path_segment() {
        let v = validator("http://identity:8080/");
        assert_eq!(
            v.owner_url("alice").unwrap().as_str(),
            "http://identity:8080/users/alice"
        );
        assert_eq!(
            v.owner_url("alice?x").unwrap().as_str(),
            "http://identity:8080/users/alice%3Fx"
        );
        assert_eq!(
            v.owner_url("alice#x").unwrap().as_str(),
            "http://identity:8080/users/alice%23x"
        );
        assert_eq!(
            v.owner_url("a/b").unwrap().as_str(),
            "http://identity:8080/users/a%2Fb"
        );
    }

    #[test]
    fn base_path_is_kept() {
        let v = validator("http://gateway/identity");
        assert_eq!(
            v.owner_url("u1").unwrap().as_str(),
            "http://gateway/identity/users/u1"
        );
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        let err = HttpOwnerValidator::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ValidatorError::Config(_)));
        let err = HttpOwnerValidator::new("mailto:ops@example.com", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, ValidatorError::Config(_)));
    }
}
