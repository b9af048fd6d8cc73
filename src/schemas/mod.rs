use std::collections::HashMap;

use serde::Serialize;

pub(crate) mod attempt;
pub(crate) mod grading;
pub(crate) mod operations;
pub(crate) mod proctoring;

/// Envelope shared by every `/api/v1` response.
#[derive(Debug, Serialize)]
pub(crate) struct ApiResponse<T> {
    pub(crate) success: bool,
    pub(crate) data: Option<T>,
    pub(crate) message: Option<String>,
    pub(crate) errors: Vec<String>,
}

impl<T> ApiResponse<T> {
    pub(crate) fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), message: None, errors: Vec::new() }
    }

    pub(crate) fn with_message(data: T, message: impl Into<String>) -> Self {
        Self { success: true, data: Some(data), message: Some(message.into()), errors: Vec::new() }
    }
}

impl ApiResponse<()> {
    pub(crate) fn failure(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self { success: false, data: None, message: Some(message.into()), errors }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
    pub(crate) api_prefix: String,
}
