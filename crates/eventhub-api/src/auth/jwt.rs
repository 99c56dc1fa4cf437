//! JWT token generation and validation
//!
//! Access and refresh tokens are HS256 JWTs sharing one claim layout. Each
//! kind has its own secret and TTL, and the `typ` claim is checked on
//! verification so one kind is never accepted where the other is expected.

use chrono::{DateTime, TimeZone, Utc};
use eventhub_core::{AuthConfig, StaticRole};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Which of the two token kinds a JWT is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - identity ID
    pub sub: String,
    /// JWT ID - unique per token, so two tokens minted in the same second differ
    pub jti: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
    /// Static role, absent for ordinary accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<StaticRole>,
    /// Token kind
    pub typ: TokenKind,
}

impl Claims {
    pub fn subject_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidToken)
    }
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// Signing settings for both token kinds
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    /// Access token lifetime in seconds (default: 3600 = 1 hour)
    pub access_expiration_secs: u64,
    /// Refresh token lifetime in seconds (default: 7 days)
    pub refresh_expiration_secs: u64,
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            access_secret: config.access_secret.clone(),
            refresh_secret: config.refresh_secret.clone(),
            access_expiration_secs: config.access_ttl_secs,
            refresh_expiration_secs: config.refresh_ttl_secs,
            issuer: config.issuer.clone(),
        }
    }
}

impl JwtConfig {
    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => self.access_secret.as_bytes(),
            TokenKind::Refresh => self.refresh_secret.as_bytes(),
        }
    }

    pub fn ttl_secs(&self, kind: TokenKind) -> u64 {
        match kind {
            TokenKind::Access => self.access_expiration_secs,
            TokenKind::Refresh => self.refresh_expiration_secs,
        }
    }
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Stateless signer and verifier for both token kinds
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    config: JwtConfig,
}

impl TokenIssuer {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Sign a token of `kind` for `user_id`
    pub fn issue(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        role: Option<StaticRole>,
    ) -> Result<IssuedToken, JwtError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let exp = now + self.config.ttl_secs(kind);

        let claims = Claims {
            iss: self.config.issuer.clone(),
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp,
            role,
            typ: kind,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.secret(kind)),
        )?;

        let expires_at = Utc
            .timestamp_opt(exp as i64, 0)
            .single()
            .ok_or(JwtError::InvalidToken)?;

        Ok(IssuedToken {
            token,
            jti: claims.jti,
            expires_at,
        })
    }

    /// Check signature, expiry, issuer and kind; return the claims
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.leeway = 0;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.secret(kind)),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            _ => JwtError::InvalidToken,
        })?;

        if token_data.claims.typ != kind {
            return Err(JwtError::InvalidToken);
        }

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(JwtConfig::default())
    }

    #[test]
    fn test_issue_and_verify_access_token() {
        let issuer = issuer();
        let user_id = Uuid::new_v4();

        let issued = issuer
            .issue(TokenKind::Access, user_id, Some(StaticRole::Admin))
            .unwrap();
        let claims = issuer.verify(TokenKind::Access, &issued.token).unwrap();

        assert_eq!(claims.subject_id().unwrap(), user_id);
        assert_eq!(claims.role, Some(StaticRole::Admin));
        assert_eq!(claims.typ, TokenKind::Access);
        assert_eq!(claims.iss, "eventhub");
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_refresh_token_uses_refresh_ttl() {
        let issuer = issuer();
        let issued = issuer
            .issue(TokenKind::Refresh, Uuid::new_v4(), None)
            .unwrap();
        let claims = issuer.verify(TokenKind::Refresh, &issued.token).unwrap();

        assert_eq!(claims.exp - claims.iat, 7 * 24 * 3600);
        assert_eq!(claims.role, None);
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        let issuer = issuer();
        let user_id = Uuid::new_v4();

        let access = issuer.issue(TokenKind::Access, user_id, None).unwrap();
        let refresh = issuer.issue(TokenKind::Refresh, user_id, None).unwrap();

        assert!(issuer.verify(TokenKind::Refresh, &access.token).is_err());
        assert!(issuer.verify(TokenKind::Access, &refresh.token).is_err());
    }

    #[test]
    fn test_typ_checked_even_with_equal_secrets() {
        let config = JwtConfig {
            refresh_secret: JwtConfig::default().access_secret,
            ..Default::default()
        };
        let issuer = TokenIssuer::new(config);

        let refresh = issuer
            .issue(TokenKind::Refresh, Uuid::new_v4(), None)
            .unwrap();
        assert!(matches!(
            issuer.verify(TokenKind::Access, &refresh.token),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn test_tokens_minted_together_differ() {
        let issuer = issuer();
        let user_id = Uuid::new_v4();

        let first = issuer.issue(TokenKind::Refresh, user_id, None).unwrap();
        let second = issuer.issue(TokenKind::Refresh, user_id, None).unwrap();

        assert_ne!(first.token, second.token);
        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn test_invalid_token() {
        let result = issuer().verify(TokenKind::Access, "invalid.token.here");
        assert!(matches!(result, Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_wrong_secret() {
        let other = TokenIssuer::new(JwtConfig {
            access_secret: "another-access-secret".to_string(),
            ..Default::default()
        });

        let token = other
            .issue(TokenKind::Access, Uuid::new_v4(), None)
            .unwrap();

        let result = issuer().verify(TokenKind::Access, &token.token);
        assert!(matches!(result, Err(JwtError::InvalidSignature)));
    }

    #[test]
    fn test_wrong_issuer() {
        let other = TokenIssuer::new(JwtConfig {
            issuer: "someone-else".to_string(),
            ..Default::default()
        });

        let token = other
            .issue(TokenKind::Access, Uuid::new_v4(), None)
            .unwrap();

        assert!(issuer().verify(TokenKind::Access, &token.token).is_err());
    }

    #[test]
    fn test_expired_token() {
        let config = JwtConfig::default();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let claims = Claims {
            iss: config.issuer.clone(),
            sub: Uuid::new_v4().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now - 7200,
            exp: now - 3600,
            role: None,
            typ: TokenKind::Access,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(config.access_secret.as_bytes()),
        )
        .unwrap();

        let result = TokenIssuer::new(config).verify(TokenKind::Access, &token);
        assert!(matches!(result, Err(JwtError::ExpiredToken)));
    }
}
