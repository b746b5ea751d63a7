//! User identities.
//!
//! An [`Identity`] carries the password hash and never leaves the service
//! boundary as-is. Everything that is returned to callers or written to the
//! cache goes through [`IdentityProfile`].

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{CoreError, Result, require_non_empty};
use crate::id::generate_id;
use crate::time::now_utc;

#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub confirmed: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: Option<OffsetDateTime>,
}

impl Identity {
    /// A fresh, unconfirmed identity.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            confirmed: false,
            created_at: now_utc(),
            updated_at: None,
        }
    }

    pub fn profile(&self) -> IdentityProfile {
        IdentityProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            confirmed: self.confirmed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Applies a patch whose password (if any) has already been hashed.
    pub fn apply(&mut self, patch: IdentityPatch, password_hash: Option<String>) {
        if let Some(username) = patch.username {
            self.username = username;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(hash) = password_hash {
            self.password_hash = hash;
        }
        self.updated_at = Some(now_utc());
    }
}

/// Public view of an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityProfile {
    pub id: String,
    pub username: String,
    pub email: String,
    pub confirmed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Registration {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("username", &self.username)?;
        validate_email(&self.email)?;
        require_non_empty("password", &self.password)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityPatch {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl IdentityPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(username) = &self.username {
            require_non_empty("username", username)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(password) = &self.password {
            require_non_empty("password", password)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.password.is_none()
    }
}

pub fn validate_email(email: &str) -> Result<()> {
    require_non_empty("email", email)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(CoreError::invalid_field("email", "must contain '@'")),
    }
}
