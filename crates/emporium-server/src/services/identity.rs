//! Identity service: registration, confirmation, login and profile CRUD.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use emporium_core::{
    Identity, IdentityPatch, IdentityProfile, Registration, validate_email, validate_id,
};
use emporium_notifications::{CONFIRMATION_TEMPLATE, EmailMessage, EmailSender, TemplateRenderer};
use emporium_storage::{IdentityStore, IdentityTransaction};
use serde::{Deserialize, Serialize};

use super::HealthProbe;
use crate::auth::{PasswordHasher, TokenIssuer, generate_confirmation_code};
use crate::cache::{CacheAside, CacheTtls, EntityKind, confirmation_code_key};
use crate::error::{ServiceError, ServiceResult};
use crate::events::{Event, EventEmitter};

const KIND: EntityKind = EntityKind::User;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmRequest {
    pub email: String,
    pub code: String,
}

/// A wrong or expired code is not an error, just `success: false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: String,
}

/// Everything the identity service is built from.
pub struct IdentityServiceDeps {
    pub store: Arc<dyn IdentityStore>,
    pub cache: CacheAside,
    pub ttls: CacheTtls,
    pub code_ttl: Duration,
    pub events: EventEmitter,
    pub email: Arc<dyn EmailSender>,
    pub templates: TemplateRenderer,
    pub hasher: Arc<dyn PasswordHasher>,
    pub tokens: TokenIssuer,
}

pub struct IdentityService {
    store: Arc<dyn IdentityStore>,
    cache: CacheAside,
    ttls: CacheTtls,
    code_ttl: Duration,
    events: EventEmitter,
    email: Arc<dyn EmailSender>,
    templates: TemplateRenderer,
    hasher: Arc<dyn PasswordHasher>,
    tokens: TokenIssuer,
}

impl IdentityService {
    pub fn new(deps: IdentityServiceDeps) -> Self {
        Self {
            store: deps.store,
            cache: deps.cache,
            ttls: deps.ttls,
            code_ttl: deps.code_ttl,
            events: deps.events,
            email: deps.email,
            templates: deps.templates,
            hasher: deps.hasher,
            tokens: deps.tokens,
        }
    }

    /// Creates an unconfirmed identity and issues a confirmation code.
    ///
    /// The uniqueness check and the insert run in one store transaction.
    /// The code is stored before commit; the email and the
    /// `user_registered` event are sent after commit and may be lost.
    #[tracing::instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: Registration) -> ServiceResult<RegisterResponse> {
        registration.validate()?;

        let mut tx = self.store.begin().await?;
        let (identity, code) = match self.register_in(tx.as_mut(), &registration).await {
            Ok(created) => created,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "registration rollback failed");
                }
                return Err(e);
            }
        };
        tx.commit().await?;
        tracing::info!(user_id = %identity.id, "user registered");

        self.cache.invalidate(&KIND.all_key()).await;
        self.send_confirmation_email(&identity, &code);
        self.events
            .emit(Event::user(Event::UserRegistered, &identity.id, &identity.email));

        Ok(RegisterResponse {
            user_id: identity.id,
            message: "registered, check your email for the confirmation code".into(),
        })
    }

    async fn register_in(
        &self,
        tx: &mut dyn IdentityTransaction,
        registration: &Registration,
    ) -> ServiceResult<(Identity, String)> {
        if tx.find_by_email(&registration.email).await?.is_some() {
            return Err(ServiceError::AlreadyExists(format!(
                "user with email '{}' already exists",
                registration.email
            )));
        }

        let hash = self.hash_password(registration.password.clone()).await?;
        let identity = Identity::new(&registration.username, &registration.email, hash);
        tx.insert(&identity).await?;

        let code = generate_confirmation_code();
        let key = confirmation_code_key(&identity.email);
        if let Err(e) = self.cache.put_token(&key, &code, self.code_ttl).await {
            tracing::warn!(key = %key, error = %e, "failed to store confirmation code");
        }

        Ok((identity, code))
    }

    fn send_confirmation_email(&self, identity: &Identity, code: &str) {
        let data = HashMap::from([
            ("username".to_string(), identity.username.clone().into()),
            ("code".to_string(), code.into()),
            ("ttl_minutes".to_string(), (self.code_ttl.as_secs() / 60).into()),
        ]);
        let content = match self.templates.render(CONFIRMATION_TEMPLATE, &data) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(error = %e, "failed to render confirmation email");
                return;
            }
        };

        let message = EmailMessage {
            to: identity.email.clone(),
            subject: content.subject,
            body: content.body,
        };
        let sender = Arc::clone(&self.email);
        tokio::spawn(async move {
            if let Err(e) = sender.send(&message).await {
                tracing::warn!(to = %message.to, error = %e, "confirmation email not sent");
            }
        });
    }

    /// Consumes the confirmation code for `email` and marks the identity
    /// confirmed. A wrong, expired or already used code is a soft failure.
    #[tracing::instrument(skip(self, code))]
    pub async fn confirm(&self, email: &str, code: &str) -> ServiceResult<ConfirmResponse> {
        validate_email(email)?;
        let identity = self
            .store
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("user with email '{email}' not found")))?;

        let key = confirmation_code_key(email);
        if !self.cache.claim_token(&key, code).await {
            return Ok(ConfirmResponse {
                success: false,
                message: "invalid or expired confirmation code".into(),
            });
        }

        if let Err(e) = self.store.set_confirmed(&identity.id, true).await {
            if let Err(restore) = self.cache.put_token(&key, code, self.code_ttl).await {
                tracing::warn!(key = %key, error = %restore, "failed to restore confirmation code");
            }
            return Err(e.into());
        }

        self.cache
            .invalidate_all(KIND.mutation_keys(&identity.id))
            .await;
        self.events
            .emit(Event::user(Event::UserConfirmed, &identity.id, &identity.email));
        tracing::info!(user_id = %identity.id, "user confirmed");

        Ok(ConfirmResponse {
            success: true,
            message: "email confirmed".into(),
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<LoginResponse> {
        let identity = self
            .store
            .find_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("user with email '{email}' not found")))?;

        if !self
            .verify_password(password.to_string(), identity.password_hash.clone())
            .await?
        {
            return Err(ServiceError::InvalidCredential(
                "invalid email or password".into(),
            ));
        }

        let token = self.tokens.issue(&identity.id, &identity.email)?;
        Ok(LoginResponse {
            token,
            user_id: identity.id,
        })
    }

    pub async fn get(&self, id: &str) -> ServiceResult<IdentityProfile> {
        validate_id(id)?;
        self.cache
            .get(&KIND.key(id), self.ttls.entity, move || self.load_profile(id))
            .await
    }

    async fn load_profile(&self, id: &str) -> ServiceResult<IdentityProfile> {
        self.store
            .get(id)
            .await?
            .map(|identity| identity.profile())
            .ok_or_else(|| ServiceError::not_found(format!("user '{id}' not found")))
    }

    pub async fn list(&self) -> ServiceResult<Vec<IdentityProfile>> {
        self.cache
            .get(&KIND.all_key(), self.ttls.list, move || self.load_profiles())
            .await
    }

    async fn load_profiles(&self) -> ServiceResult<Vec<IdentityProfile>> {
        let identities = self.store.list().await?;
        Ok(identities.iter().map(Identity::profile).collect())
    }

    /// Looks a user up by email. Not cached.
    pub async fn get_by_email(&self, email: &str) -> ServiceResult<IdentityProfile> {
        self.store
            .find_by_email(email)
            .await?
            .map(|identity| identity.profile())
            .ok_or_else(|| ServiceError::not_found(format!("user with email '{email}' not found")))
    }

    pub async fn update(&self, id: &str, patch: IdentityPatch) -> ServiceResult<IdentityProfile> {
        validate_id(id)?;
        patch.validate()?;
        if patch.is_empty() {
            return Err(ServiceError::InvalidArgument("nothing to update".into()));
        }

        let mut identity = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("user '{id}' not found")))?;
        let previous_email = identity.email.clone();

        let hash = match &patch.password {
            Some(password) => Some(self.hash_password(password.clone()).await?),
            None => None,
        };
        identity.apply(patch, hash);
        let stored = self.store.update(&identity).await?;

        if stored.email != previous_email {
            let moved = self
                .cache
                .move_token(
                    &confirmation_code_key(&previous_email),
                    &confirmation_code_key(&stored.email),
                )
                .await;
            if moved {
                tracing::debug!(user_id = %id, "pending confirmation code follows new email");
            }
        }

        self.cache.invalidate_all(KIND.mutation_keys(id)).await;
        self.events
            .emit(Event::user(Event::UserUpdated, &stored.id, &stored.email));

        Ok(stored.profile())
    }

    pub async fn delete(&self, id: &str) -> ServiceResult<()> {
        validate_id(id)?;
        let removed = self.store.delete(id).await?;

        self.cache.invalidate_all(KIND.mutation_keys(id)).await;
        self.cache
            .invalidate(&confirmation_code_key(&removed.email))
            .await;
        self.events
            .emit(Event::user(Event::UserDeleted, &removed.id, &removed.email));
        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }

    /// Drops every cached `user:` entry.
    pub async fn flush_cache(&self) -> ServiceResult<u64> {
        Ok(self.cache.flush(&KIND.prefix()).await?)
    }

    async fn hash_password(&self, password: String) -> ServiceResult<String> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| ServiceError::internal(format!("hashing task failed: {e}")))?
            .map_err(ServiceError::from)
    }

    async fn verify_password(&self, password: String, hash: String) -> ServiceResult<bool> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| ServiceError::internal(format!("verification task failed: {e}")))
    }
}

#[async_trait]
impl HealthProbe for IdentityService {
    async fn ready(&self) -> ServiceResult<()> {
        Ok(self.store.health_check().await?)
    }
}
