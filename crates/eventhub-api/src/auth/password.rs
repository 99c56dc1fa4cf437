/// Password hashing and verification using Argon2id
///
/// Parameters come from `HashingConfig`:
/// - Algorithm: Argon2id (memory-hard, resistant to GPU attacks)
/// - Memory: 64 MB by default
/// - Iterations: 3
/// - Parallelism: 4 lanes
/// - Salt: 16 bytes random, embedded in the PHC string
/// - Output: 32 bytes hash
///
/// The blocking primitives are plain functions; [`PasswordHasher`] runs them
/// on the bounded [`WorkerPool`].
use super::pool::{PoolError, WorkerPool};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Argon2, Params,
};
use eventhub_core::HashingConfig;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;

/// Password hashing and verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,

    #[error("Hashing workers are saturated")]
    Busy,

    #[error("Hashing worker failed: {0}")]
    WorkerFailed(String),
}

impl From<PoolError> for PasswordError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Saturated => PasswordError::Busy,
            PoolError::Join(msg) => PasswordError::WorkerFailed(msg),
        }
    }
}

/// Argon2 cost parameters
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    /// Memory cost in KiB (default: 65536 = 64 MB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism (lanes, default: 4)
    pub parallelism: u32,
    /// Output length in bytes (default: 32)
    pub output_len: Option<usize>,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self::from(&HashingConfig::default())
    }
}

impl From<&HashingConfig> for PasswordConfig {
    fn from(config: &HashingConfig) -> Self {
        Self {
            memory_cost: config.memory_cost_kib,
            time_cost: config.time_cost,
            parallelism: config.parallelism,
            output_len: Some(32),
        }
    }
}

impl PasswordConfig {
    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            self.output_len,
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }
}

/// Hash a plaintext password with the given parameters.
///
/// Returns a PHC string (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`).
/// Two calls with the same input produce different outputs.
pub fn hash_password_with_config(
    password: &str,
    config: &PasswordConfig,
) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = config.to_params()?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

    Ok(password_hash.to_string())
}

/// Verify a plaintext password against a stored PHC hash.
///
/// Parameters are read from the hash itself, so hashes created under older
/// settings keep verifying.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
    }
}

/// Validate password strength
///
/// - At least 6 characters
/// - At least 1 uppercase letter
/// - At least 1 digit
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < 6 {
        return Err("Password must be at least 6 characters long".to_string());
    }

    if !password.chars().any(|c| c.is_ascii_uppercase()) || !password.chars().any(|c| c.is_ascii_digit())
    {
        return Err(
            "Password must contain at least one uppercase letter and one number".to_string(),
        );
    }

    Ok(())
}

/// Async password hasher backed by the worker pool
#[derive(Clone)]
pub struct PasswordHasher {
    config: Arc<PasswordConfig>,
    pool: WorkerPool,
    dummy_hash: Arc<OnceCell<String>>,
}

impl PasswordHasher {
    pub fn new(config: PasswordConfig, pool: WorkerPool) -> Self {
        Self {
            config: Arc::new(config),
            pool,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    pub async fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let config = Arc::clone(&self.config);
        let plaintext = plaintext.to_owned();

        self.pool
            .run(move || hash_password_with_config(&plaintext, &config))
            .await?
    }

    /// Returns `Ok(false)` on mismatch and on an unparseable stored hash.
    pub async fn verify(&self, hash: &str, plaintext: &str) -> Result<bool, PasswordError> {
        let hash = hash.to_owned();
        let plaintext = plaintext.to_owned();

        match self
            .pool
            .run(move || verify_password(&plaintext, &hash))
            .await?
        {
            Ok(matches) => Ok(matches),
            Err(PasswordError::InvalidHashFormat) => {
                tracing::warn!("Stored password hash is not a valid PHC string");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Password verification failed");
                Ok(false)
            }
        }
    }

    /// Spend one verification's worth of work against a throwaway hash.
    ///
    /// Called when the account does not exist so the response takes as long
    /// as a wrong password would.
    pub async fn verify_dummy(&self, plaintext: &str) -> Result<(), PasswordError> {
        let dummy = self
            .dummy_hash
            .get_or_try_init(|| self.hash("dummy-password-for-timing"))
            .await?
            .clone();

        self.verify(&dummy, plaintext).await?;
        Ok(())
    }
}
