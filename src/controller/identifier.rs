//! Classification of the single path segment that selects one record.

use crate::error::AppError;

/// What a path token addresses. Decided by the token's shape alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identifier {
    Id(i64),
    Code(String),
}

impl Identifier {
    /// All-digit tokens are ids (must be positive and fit i64); anything else is a code.
    pub fn classify(token: &str) -> Result<Self, AppError> {
        if token.trim().is_empty() {
            return Err(AppError::Validation("identifier is empty".into()));
        }
        if !is_numeric(token) {
            return Ok(Identifier::Code(token.to_string()));
        }
        let id: i64 = token
            .parse()
            .map_err(|_| AppError::Validation(format!("id '{}' is out of range", token)))?;
        if id == 0 {
            return Err(AppError::Validation("id must be a positive integer".into()));
        }
        Ok(Identifier::Id(id))
    }
}

/// Tokens that would classify as an id. Such strings can never be used as codes.
pub fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Path id for mutating routes. Codes are not accepted there.
pub fn parse_id(token: &str) -> Result<i64, AppError> {
    match Identifier::classify(token)? {
        Identifier::Id(id) => Ok(id),
        Identifier::Code(_) => Err(AppError::Validation(format!(
            "'{}' is not a valid id",
            token
        ))),
    }
}
