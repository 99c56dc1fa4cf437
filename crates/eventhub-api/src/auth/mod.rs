//! Authentication and authorization module
//!
//! - Password hashing with Argon2id on a bounded worker pool
//! - Access and refresh JWT issuance and validation
//! - Hashed, revocable refresh-token sessions with rotation
//! - Behavioral role resolution and role-based access control
//! - Middleware for request authentication

pub mod guard;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod pool;
pub mod refresh;
pub mod roles;
pub mod service;

pub use guard::{authorize, RequiredRole, SessionIdentity};
pub use jwt::{Claims, IssuedToken, JwtConfig, JwtError, TokenIssuer, TokenKind};
pub use middleware::{
    auth_middleware, optional_auth_middleware, refresh_middleware, require_roles,
    RefreshPrincipal,
};
pub use password::{validate_password_strength, PasswordConfig, PasswordError, PasswordHasher};
pub use pool::{PoolError, WorkerPool};
pub use refresh::RefreshTokenStore;
pub use roles::{BehavioralRoles, RoleResolver};
pub use service::{AuthResponse, AuthService, LoginRequest, RegisterRequest, UserInfo};
