use thiserror::Error;

use super::partners_constants::INVALID_LIMIT_MESSAGE;

/// Expected, user-facing outcomes of partner operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartnerError {
    #[error("Partner not found: {0}")]
    NotFound(String),
    #[error("Partner is not active: {0}")]
    Inactive(String),
    #[error("{}", INVALID_LIMIT_MESSAGE)]
    InvalidLimit,
    #[error("Promo code limit not found: {0}")]
    LimitNotFound(String),
}

impl From<PartnerError> for String {
    fn from(error: PartnerError) -> Self {
        error.to_string()
    }
}
