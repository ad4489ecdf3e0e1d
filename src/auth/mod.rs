//! Authentication boundary: JWT configuration, token validation, and the
//! Rocket request guards the admin endpoints sit behind. Token issuance is
//! handled by the platform's identity service; this module only validates.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod guards;
pub mod jwt;
pub mod responses;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use guards::{AuthUser, RequireAdmin};
pub use jwt::JwtService;

#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub jwt_service: Arc<JwtService>,
}

impl AuthState {
    pub fn new(config: AuthConfig, jwt_service: JwtService) -> Self {
        Self {
            config,
            jwt_service: Arc::new(jwt_service),
        }
    }
}
