use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures surfaced to API callers.
///
/// The display text of every variant is the exact message placed in the
/// `{"error": ...}` body. Underlying causes are logged where the error is
/// created and never cross the HTTP boundary.
#[derive(Debug, Error)]
pub enum StudyError {
    // Validation
    #[error("No PDF file provided")]
    MissingFile,

    #[error("File must be a PDF")]
    NotPdf,

    // Extraction
    #[error("No text content found in PDF")]
    NoTextContent,

    #[error("Failed to parse PDF content")]
    ParseFailed,

    #[error("Failed to process PDF content")]
    ProcessingFailed,

    // Generation
    #[error("Failed to generate study document. Please check your API key and try again.")]
    Generation,

    // Rendering
    #[error("No content provided")]
    EmptyContent,

    #[error("Failed to generate PDF")]
    Render,

    #[error("Internal server error")]
    Internal,
}

impl StudyError {
    pub fn status(&self) -> StatusCode {
        match self {
            StudyError::MissingFile
            | StudyError::NotPdf
            | StudyError::NoTextContent
            | StudyError::EmptyContent => StatusCode::BAD_REQUEST,
            StudyError::ParseFailed
            | StudyError::ProcessingFailed
            | StudyError::Generation
            | StudyError::Render
            | StudyError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StudyError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type StudyResult<T> = std::result::Result<T, StudyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_requests() {
        assert_eq!(StudyError::MissingFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(StudyError::NotPdf.status(), StatusCode::BAD_REQUEST);
        assert_eq!(StudyError::NoTextContent.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn generation_error_hides_provider_detail() {
        let e = StudyError::Generation;
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(e.to_string().contains("check your API key"));
    }

    #[test]
    fn parse_failure_is_server_error() {
        assert_eq!(
            StudyError::ParseFailed.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(StudyError::ParseFailed.to_string(), "Failed to parse PDF content");
    }
}
