use rocket::http::Status;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("account disabled")]
    AccountDisabled,
    #[error("token expired")]
    TokenExpired,
    #[error("token invalid")]
    TokenInvalid,
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Sqlx(#[from] rocket_db_pools::sqlx::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            AuthError::AccountDisabled => Status::Forbidden,
            AuthError::TokenExpired | AuthError::TokenInvalid => Status::Unauthorized,
            AuthError::Unauthorized => Status::Unauthorized,
            AuthError::Forbidden => Status::Forbidden,
            AuthError::Config(_) | AuthError::Sqlx(_) => Status::InternalServerError,
            AuthError::Jwt(_) => Status::Unauthorized,
        }
    }
}
