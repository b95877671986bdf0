use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use warp::http::StatusCode;

use crate::database::error::StoreError;

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Field name -> messages, serialized as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(|messages| messages.as_slice())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

impl From<validator::ValidationErrors> for FieldErrors {
    fn from(value: validator::ValidationErrors) -> Self {
        let mut errors = FieldErrors::new();
        for (field, list) in value.field_errors() {
            for error in list.iter() {
                let message = match &error.message {
                    Some(message) => message.to_string(),
                    None => error.code.to_string(),
                };
                errors.add(&field.to_string(), message);
            }
        }
        errors
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0:?}")]
    Validation(FieldErrors),
    #[error("{0}")]
    Conflict(String),
    #[error("Authentication credentials were not provided.")]
    Unauthorized,
    #[error("Invalid token.")]
    InvalidToken,
    #[error("You do not have permission to perform this action.")]
    PermissionDenied,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    ProtectedReference(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(FieldErrors::single(field, message))
    }

    pub fn non_field(message: impl Into<String>) -> Self {
        Self::field(NON_FIELD_ERRORS, message)
    }

    pub fn not_found() -> Self {
        Self::NotFound(String::from("Not found."))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ProtectedReference(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            ApiError::Validation(errors) => json!(errors),
            ApiError::Conflict(message) => json!({ NON_FIELD_ERRORS: [message] }),
            ApiError::Internal(_) => json!({ "detail": "Internal server error" }),
            other => json!({ "detail": other.to_string() }),
        }
    }
}

impl warp::reject::Reject for ApiError {}

impl From<FieldErrors> for ApiError {
    fn from(value: FieldErrors) -> Self {
        ApiError::Validation(value)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(value: validator::ValidationErrors) -> Self {
        ApiError::Validation(value.into())
    }
}

/// Fallback for store errors a handler did not map to a field-level message.
impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UniqueViolation { constraint } => {
                ApiError::non_field(format!("The fields must make a unique set ({constraint})."))
            }
            StoreError::CheckViolation { constraint } => {
                ApiError::non_field(format!("Constraint {constraint} is not satisfied."))
            }
            StoreError::ForeignKeyViolation { constraint } => ApiError::ProtectedReference(
                format!("The object is still referenced ({constraint})."),
            ),
            StoreError::Query(message) => ApiError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_reported_as_bad_request() {
        let error = ApiError::Conflict(String::from("Recipe is already in favorites"));

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            error.body(),
            json!({ "non_field_errors": ["Recipe is already in favorites"] })
        );
    }

    #[test]
    fn internal_details_stay_out_of_the_body() {
        let error = ApiError::from(StoreError::new(String::from("connection reset")));

        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.body(), json!({ "detail": "Internal server error" }));
    }

    #[test]
    fn field_errors_accumulate_per_field() {
        let mut errors = FieldErrors::single("ingredients", "first");
        errors.add("ingredients", "second");
        errors.merge(FieldErrors::single("tags", "third"));

        assert_eq!(
            json!(errors),
            json!({ "ingredients": ["first", "second"], "tags": ["third"] })
        );
    }
}
