//! Authentication service layer
//!
//! Orchestrates registration, credential checks, login, refresh-token
//! rotation and logout over the identity and refresh-token repositories.

use super::guard::SessionIdentity;
use super::jwt::{JwtConfig, TokenIssuer, TokenKind};
use super::password::{validate_password_strength, PasswordConfig, PasswordHasher};
use super::pool::WorkerPool;
use super::refresh::RefreshTokenStore;
use super::roles::{BehavioralRoles, RoleResolver};
use crate::audit::{audit_log, AuditEvent};
use crate::error::AppError;
use crate::metrics;
use chrono::{DateTime, Utc};
use eventhub_core::{
    AppConfig, ClientMeta, Identity, IdentityRepository, NewIdentity, RefreshTokenRepository,
    RelationshipLookup, StaticRole,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    /// At least 6 characters with one uppercase letter and one digit
    pub password: String,
    /// Only `ADMIN` may be requested
    #[serde(default)]
    pub role: Option<String>,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Authentication response with tokens
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    pub user: UserInfo,
}

/// User information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[schema(value_type = Option<String>, example = "ADMIN")]
    pub role: Option<StaticRole>,
    pub is_organizer: bool,
    pub is_attendee: bool,
    pub created_at: DateTime<Utc>,
}

impl UserInfo {
    pub fn new(identity: &Identity, roles: BehavioralRoles) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            username: identity.username.clone(),
            role: identity.role,
            is_organizer: roles.is_organizer,
            is_attendee: roles.is_attendee,
            created_at: identity.created_at,
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    identities: Arc<dyn IdentityRepository>,
    refresh_tokens: RefreshTokenStore,
    roles: RoleResolver,
    issuer: TokenIssuer,
    hasher: PasswordHasher,
    pool: WorkerPool,
}

impl AuthService {
    pub fn new(
        identities: Arc<dyn IdentityRepository>,
        refresh_repo: Arc<dyn RefreshTokenRepository>,
        relationships: Arc<dyn RelationshipLookup>,
        config: &AppConfig,
    ) -> Self {
        let pool = WorkerPool::new(config.hashing.workers, config.hashing.max_queue);
        let hasher = PasswordHasher::new(PasswordConfig::from(&config.hashing), pool.clone());

        Self {
            identities,
            refresh_tokens: RefreshTokenStore::new(refresh_repo, hasher.clone()),
            roles: RoleResolver::new(relationships),
            issuer: TokenIssuer::new(JwtConfig::from(&config.auth)),
            hasher,
            pool,
        }
    }

    pub fn worker_pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Register a new identity.
    ///
    /// The only role that may be requested is `ADMIN`; organizer and
    /// attendee are never assigned at registration.
    pub async fn register(
        &self,
        request: RegisterRequest,
        client: &ClientMeta,
    ) -> Result<Identity, AppError> {
        let result = self.try_register(&request).await;
        record_outcome("register", &result);

        match &result {
            Ok(identity) => audit_log(&AuditEvent::RegistrationSuccess {
                user_id: identity.id,
                email: identity.email.clone(),
                role: identity.role.map(|r| r.to_string()),
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
            }),
            Err(e) => audit_log(&AuditEvent::RegistrationFailure {
                email: request.email.clone(),
                reason: e.to_string(),
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
            }),
        }

        result
    }

    async fn try_register(&self, request: &RegisterRequest) -> Result<Identity, AppError> {
        request
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let role = match request.role.as_deref() {
            Some(requested) => Some(requested.parse::<StaticRole>()?),
            None => None,
        };

        validate_password_strength(&request.password).map_err(AppError::BadRequest)?;

        let password_hash = self.hasher.hash(&request.password).await?;

        let identity = self
            .identities
            .create(NewIdentity {
                email: request.email.clone(),
                username: request.username.clone(),
                password_hash,
                role,
            })
            .await?;

        tracing::info!(user_id = %identity.id, "Registered new identity");
        Ok(identity)
    }

    /// Check an email/password pair.
    ///
    /// Unknown email and wrong password both fail with
    /// [`AppError::InvalidCredentials`] after the same amount of hashing work.
    pub async fn validate_credentials(
        &self,
        email: &str,
        password: &str,
        client: &ClientMeta,
    ) -> Result<Identity, AppError> {
        let (result, reason) = match self.identities.find_by_email(email).await? {
            Some(identity) => {
                if self.hasher.verify(&identity.password_hash, password).await? {
                    (Ok(identity), None)
                } else {
                    (Err(AppError::InvalidCredentials), Some("password mismatch"))
                }
            }
            None => {
                self.hasher.verify_dummy(password).await?;
                (Err(AppError::InvalidCredentials), Some("unknown email"))
            }
        };

        if let Some(reason) = reason {
            metrics::record_auth_outcome("login", "invalid_credentials");
            audit_log(&AuditEvent::LoginFailure {
                email: email.to_string(),
                reason: reason.to_string(),
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
            });
        }

        result
    }

    /// Issue an access/refresh pair for an already verified identity
    pub async fn login(
        &self,
        identity: &Identity,
        client: ClientMeta,
    ) -> Result<AuthResponse, AppError> {
        let result = self.issue_session(identity, client.clone()).await;
        record_outcome("login", &result);

        if result.is_ok() {
            audit_log(&AuditEvent::LoginSuccess {
                user_id: identity.id,
                email: identity.email.clone(),
                ip_address: client.ip_address,
                user_agent: client.user_agent,
            });
        }

        result
    }

    /// Rotate a refresh token: revoke the presented one, then issue a new pair.
    ///
    /// Revocation happens before issuance but not in one transaction; two
    /// concurrent calls with the same token can both succeed.
    pub async fn refresh(
        &self,
        user_id: Uuid,
        presented: &str,
        client: ClientMeta,
    ) -> Result<AuthResponse, AppError> {
        let result = self.rotate(user_id, presented, client.clone()).await;
        record_outcome("refresh", &result);

        match &result {
            Ok(_) => audit_log(&AuditEvent::TokenRefresh {
                user_id,
                ip_address: client.ip_address,
                user_agent: client.user_agent,
            }),
            Err(e) => audit_log(&AuditEvent::RefreshRejected {
                user_id: Some(user_id),
                reason: e.kind().to_string(),
                ip_address: client.ip_address,
                user_agent: client.user_agent,
            }),
        }

        result
    }

    async fn rotate(
        &self,
        user_id: Uuid,
        presented: &str,
        client: ClientMeta,
    ) -> Result<AuthResponse, AppError> {
        let identity = self
            .identities
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::SessionNotFound)?;

        let record = self.refresh_tokens.find_valid(user_id, presented).await?;
        self.refresh_tokens.revoke_by_id(record.id).await?;

        self.issue_session(&identity, client).await
    }

    /// Revoke the session behind `presented`, if there is one
    pub async fn logout(
        &self,
        user_id: Uuid,
        presented: &str,
        client: &ClientMeta,
    ) -> Result<(), AppError> {
        let revoked = match self.refresh_tokens.find_valid(user_id, presented).await {
            Ok(record) => {
                self.refresh_tokens.revoke_by_id(record.id).await?;
                1
            }
            Err(AppError::SessionNotFound) => 0,
            Err(e) => return Err(e),
        };

        metrics::record_auth_outcome("logout", "success");
        audit_log(&AuditEvent::Logout {
            user_id,
            ip_address: client.ip_address.clone(),
            all_sessions: false,
            revoked,
        });

        Ok(())
    }

    /// Revoke every session of the identity
    pub async fn logout_all(&self, user_id: Uuid, client: &ClientMeta) -> Result<u64, AppError> {
        let revoked = self.refresh_tokens.revoke_all_for_identity(user_id).await?;

        metrics::record_auth_outcome("logout_all", "success");
        audit_log(&AuditEvent::Logout {
            user_id,
            ip_address: client.ip_address.clone(),
            all_sessions: true,
            revoked,
        });

        Ok(revoked)
    }

    /// Operator revocation of another identity's sessions
    pub async fn revoke_sessions(
        &self,
        user_id: Uuid,
        revoked_by: Option<Uuid>,
    ) -> Result<u64, AppError> {
        self.get_identity(user_id).await?;
        let revoked = self.refresh_tokens.revoke_all_for_identity(user_id).await?;

        audit_log(&AuditEvent::SessionsRevoked {
            user_id,
            revoked_by,
            revoked,
        });

        Ok(revoked)
    }

    /// Resolve an access token into the identity attached to a request.
    ///
    /// The static role is read from the stored identity rather than the token
    /// and behavioral roles are recomputed on every call.
    pub async fn authenticate_access(&self, token: &str) -> Result<SessionIdentity, AppError> {
        let issuer = self.issuer.clone();
        let token = token.to_owned();
        let claims = self
            .pool
            .run(move || issuer.verify(TokenKind::Access, &token))
            .await??;

        let user_id = claims.subject_id()?;
        let identity = self
            .identities
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::TokenInvalid("subject no longer exists".to_string()))?;

        let roles = self.roles.resolve(identity.id).await?;
        Ok(SessionIdentity::new(identity.id, identity.role, roles))
    }

    /// Stateless check of a refresh token, returning its subject.
    ///
    /// Whether the session is still active is decided later by
    /// [`RefreshTokenStore::find_valid`].
    pub fn authenticate_refresh(&self, token: &str) -> Result<Uuid, AppError> {
        let claims = self.issuer.verify(TokenKind::Refresh, token)?;
        Ok(claims.subject_id()?)
    }

    pub async fn get_identity(&self, user_id: Uuid) -> Result<Identity, AppError> {
        self.identities
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    pub async fn behavioral_roles(&self, user_id: Uuid) -> Result<BehavioralRoles, AppError> {
        self.roles.resolve(user_id).await
    }

    async fn issue_session(
        &self,
        identity: &Identity,
        client: ClientMeta,
    ) -> Result<AuthResponse, AppError> {
        let access = self
            .issuer
            .issue(TokenKind::Access, identity.id, identity.role)?;
        let refresh = self
            .issuer
            .issue(TokenKind::Refresh, identity.id, identity.role)?;

        // Resolve before storing so a failed lookup leaves no orphaned session
        let roles = self.roles.resolve(identity.id).await?;

        self.refresh_tokens
            .store(identity.id, &refresh.token, refresh.expires_at, client)
            .await?;

        Ok(AuthResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer".to_string(),
            expires_in: self.issuer.config().access_expiration_secs,
            user: UserInfo::new(identity, roles),
        })
    }
}

fn record_outcome<T>(operation: &str, result: &Result<T, AppError>) {
    match result {
        Ok(_) => metrics::record_auth_outcome(operation, "success"),
        Err(e) => metrics::record_auth_outcome(operation, &e.kind().to_lowercase()),
    }
}
