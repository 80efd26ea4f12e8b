//! [`AuthService`] backed by a [`DataStore`].

use super::password::{is_strong_password, PasswordHasher};
use super::throttle::LoginThrottle;
use super::{AuthError, AuthService, Credentials, Registration};
use crate::config::AuthPolicy;
use crate::core::{Role, UserIdentity};
use crate::effects::payload::is_valid_email;
use crate::store::{DataStore, NewUser, StoreError, UserRecord};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

pub struct StoreAuthService {
    store: Arc<dyn DataStore>,
    hasher: Arc<dyn PasswordHasher>,
    throttle: LoginThrottle,
}

impl StoreAuthService {
    pub fn new(store: Arc<dyn DataStore>, hasher: Arc<dyn PasswordHasher>, policy: AuthPolicy) -> Self {
        Self {
            store,
            hasher,
            throttle: LoginThrottle::new(policy),
        }
    }

    pub fn throttle(&self) -> &LoginThrottle {
        &self.throttle
    }

    async fn verify_password(&self, password: &str, hash: &str) -> bool {
        let hasher = Arc::clone(&self.hasher);
        let (password, hash) = (password.to_string(), hash.to_string());
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .unwrap_or(false)
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::ServerError(e.to_string()))?
    }

    async fn identity_of(&self, user: UserRecord) -> Result<UserIdentity, AuthError> {
        let seller_profile = match user.role {
            Role::Seller => self
                .store
                .find_seller_profile(user.id)
                .await
                .map_err(server_error)?,
            Role::Gamer => None,
        };

        Ok(UserIdentity {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            seller_profile,
        })
    }
}

#[async_trait]
impl AuthService for StoreAuthService {
    async fn authenticate(&self, credentials: &Credentials) -> Result<UserIdentity, AuthError> {
        let email = credentials.email.trim();
        if email.is_empty() || credentials.password.is_empty() {
            return Err(AuthError::MissingFields);
        }
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }

        let now = Utc::now();
        if let Some(minutes) = self.throttle.locked_for(email, now) {
            return Err(AuthError::RateLimited { minutes });
        }

        let mut user = self
            .store
            .find_user_by_email(email)
            .await
            .map_err(server_error)?;
        if let Some(found) = &user {
            if !self.verify_password(&credentials.password, &found.password_hash).await {
                user = None;
            }
        }

        let Some(user) = user else {
            self.throttle.record_failure(email, now);
            tracing::warn!(email = %email, "sign-in rejected");
            return Err(AuthError::InvalidCredentials);
        };

        self.throttle.clear(email);
        tracing::info!(user.id = user.id, "signed in");
        self.identity_of(user).await
    }

    async fn register(&self, registration: &Registration) -> Result<UserIdentity, AuthError> {
        let name = registration.name.trim();
        let email = registration.email.trim();
        if name.is_empty() || email.is_empty() || registration.password.is_empty() || registration.role.is_empty() {
            return Err(AuthError::MissingFields);
        }
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if !is_strong_password(&registration.password) {
            return Err(AuthError::WeakPassword);
        }
        let role = Role::parse(&registration.role)
            .ok_or_else(|| AuthError::InvalidRole(registration.role.clone()))?;

        let seller_profile = match role {
            Role::Seller => match &registration.seller_profile {
                Some(profile) if !profile.company_name.trim().is_empty() => Some(profile.clone()),
                _ => return Err(AuthError::MissingFields),
            },
            Role::Gamer => None,
        };

        if self
            .store
            .find_user_by_email(email)
            .await
            .map_err(server_error)?
            .is_some()
        {
            return Err(AuthError::EmailExists);
        }

        let password_hash = self.hash_password(&registration.password).await?;
        let id = self
            .store
            .insert_user(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
                role,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::EmailExists,
                other => server_error(other),
            })?;

        if let Some(profile) = &seller_profile {
            self.store
                .insert_seller_profile(id, profile.clone())
                .await
                .map_err(server_error)?;
        }

        tracing::info!(user.id = id, role = role.as_str(), "account registered");
        Ok(UserIdentity {
            id,
            name: name.to_string(),
            email: email.to_string(),
            role,
            seller_profile,
        })
    }
}

fn server_error(err: StoreError) -> AuthError {
    tracing::error!(error = %err, "auth store call failed");
    AuthError::ServerError(err.to_string())
}
