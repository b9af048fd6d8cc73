use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::schemas::ApiResponse;
use crate::services::AttemptError;

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    Rejected { message: String, errors: Vec<String> },
    NotFound(String),
    TooManyRequests(&'static str),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) | ApiError::Rejected { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AttemptError> for ApiError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::Ineligible(reasons) => ApiError::Rejected {
                message: "Candidate is not eligible to start this exam".to_string(),
                errors: reasons,
            },
            AttemptError::NotFound(_) => {
                let message = err.to_string();
                ApiError::NotFound(capitalize(&message))
            }
            AttemptError::Database(err) => ApiError::internal(err, "Database operation failed"),
            AttemptError::InvalidAccessCode
            | AttemptError::AttemptNotActive
            | AttemptError::InvalidState(_)
            | AttemptError::AttemptExpired
            | AttemptError::SectionExpired
            | AttemptError::QuestionNotInAttempt
            | AttemptError::InvalidAnswer(_)
            | AttemptError::InvalidGrade(_)
            | AttemptError::DuplicateOverride => ApiError::BadRequest(capitalize(&err.to_string())),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut errors = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, failures)| {
                failures.iter().map(move |failure| match &failure.message {
                    Some(message) => message.to_string(),
                    None => format!("{field} is invalid"),
                })
            })
            .collect::<Vec<_>>();
        errors.sort();
        ApiError::Rejected { message: "Request validation failed".to_string(), errors }
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, errors) = match self {
            ApiError::Unauthorized(message)
            | ApiError::Forbidden(message)
            | ApiError::TooManyRequests(message) => (message.to_string(), Vec::new()),
            ApiError::BadRequest(message) | ApiError::NotFound(message) => (message, Vec::new()),
            ApiError::Rejected { message, errors } => (message, errors),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                ("Internal server error".to_string(), Vec::new())
            }
        };

        let mut response =
            (status, Json(ApiResponse::<()>::failure(message, errors))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
