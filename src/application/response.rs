use serde::{Deserialize, Serialize};

use super::error::{AppError, ErrorKind};

/// Caller-facing envelope: `data` on success, a short safe `error` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    pub fn failure(error: &AppError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.public_message()),
            kind: Some(error.kind()),
        }
    }
}

impl<T> From<Result<T, AppError>> for ApiResponse<T> {
    fn from(result: Result<T, AppError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(error) => Self::failure(&error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::RepoError;
    use crate::domain::error::DomainError;

    #[test]
    fn success_envelope_serializes_without_kind() {
        let json = serde_json::to_value(ApiResponse::ok(42)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": true, "data": 42, "error": null })
        );
    }

    #[test]
    fn not_found_envelope() {
        let response: ApiResponse<()> =
            ApiResponse::failure(&DomainError::not_found("player", 9).into());
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("Resource not found"));
        assert_eq!(response.kind, Some(ErrorKind::NotFound));
    }

    #[test]
    fn storage_failures_hide_details() {
        let error = AppError::from(RepoError::from_persistence(
            "relation \"scores\" does not exist at SELECT sc.pp FROM scores",
        ));
        let response: ApiResponse<()> = Err(error).into();
        let text = response.error.unwrap();
        assert_eq!(text, "Internal server error");
        assert!(!text.contains("SELECT"));
        assert_eq!(response.kind, Some(ErrorKind::Internal));
    }
}
