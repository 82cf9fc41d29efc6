//! Common API utilities
//!
//! Request body validation: [`ValidJson`] parses a JSON body and runs the
//! type's [`Validate`] rules, turning any failure into a 400 listing the
//! offending fields.

use axum::{
    extract::{FromRequest, Request},
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};

use crate::api::middleware::ApiError;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// One failed validation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Collects field errors while a body is checked
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whitespace counts as content; only `""` fails.
    pub fn non_empty(&mut self, field: &str, value: &str, message: &str) -> &mut Self {
        self.check(value.is_empty(), field, message)
    }

    pub fn email(&mut self, field: &str, value: &str, message: &str) -> &mut Self {
        self.check(!is_valid_email(value), field, message)
    }

    pub fn non_empty_list(&mut self, field: &str, values: &[String], message: &str) -> &mut Self {
        self.check(values.is_empty(), field, message)
    }

    fn check(&mut self, failed: bool, field: &str, message: &str) -> &mut Self {
        if failed {
            self.errors.push(FieldError::new(field, message));
        }
        self
    }

    pub fn finish(&mut self) -> Vec<FieldError> {
        std::mem::take(&mut self.errors)
    }
}

/// Validation rules of a request body
pub trait Validate {
    fn validate(&self) -> Vec<FieldError>;
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// JSON body that passed its [`Validate`] rules
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state).await.map_err(|rejection| {
            tracing::debug!(error = %rejection.body_text(), "Rejected request body");
            bad_request(vec![FieldError::new("body", rejection.body_text())])
        })?;

        let errors = value.validate();
        if !errors.is_empty() {
            return Err(bad_request(errors));
        }
        Ok(ValidJson(value))
    }
}

fn bad_request(errors: Vec<FieldError>) -> ApiError {
    ApiError::bad_request(serde_json::to_value(errors).unwrap_or_default())
}
