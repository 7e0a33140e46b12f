use crate::error::ClientError;
use bytes::Bytes;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// A file the user picked or dropped.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.media_type == PDF_MEDIA_TYPE
    }

    /// Size in megabytes, as shown next to the file name.
    pub fn size_mb(&self) -> f64 {
        self.bytes.len() as f64 / 1024.0 / 1024.0
    }
}

/// Successful answer of the generation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyDocument {
    pub study_document: String,
    #[serde(default)]
    pub original_length: Option<usize>,
    #[serde(default)]
    pub original_size: Option<usize>,
    pub processed_at: String,
    #[serde(default)]
    pub processing_method: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// HTTP client for the study document service.
#[derive(Debug, Clone)]
pub struct StudyMateApi {
    http: Client,
    base_url: String,
}

impl StudyMateApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn generate_study_document(
        &self,
        file: &SelectedFile,
    ) -> Result<StudyDocument, ClientError> {
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.media_type)
            .map_err(|_| ClientError::InvalidFile)?;
        let form = Form::new().part("pdf", part);

        let response = self
            .http
            .post(self.url("/api/generate-study-document"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Study document request failed: {} {}", status, body);
            return Err(ClientError::GenerationFailed);
        }

        response.json::<StudyDocument>().await.map_err(|e| {
            error!("Unreadable study document response: {}", e);
            ClientError::GenerationFailed
        })
    }

    /// Export `content` as a PDF through the service.
    pub async fn download_pdf(&self, content: &str) -> Result<Bytes, ClientError> {
        info!("Requesting PDF export ({} characters)", content.len());

        let response = self
            .http
            .post(self.url("/api/download-pdf"))
            .json(&json!({ "content": content }))
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        info!("PDF export responded with {}", status);

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            error!("PDF generation failed: {}", body);
            return Err(ClientError::ExportFailed {
                status: status.as_u16(),
                body,
            });
        }

        let pdf = response
            .bytes()
            .await
            .map_err(|e| ClientError::ResponseBody(e.to_string()))?;

        if pdf.is_empty() {
            return Err(ClientError::EmptyPdf);
        }
        Ok(pdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn only_pdf_media_type_counts_as_pdf() {
        assert!(SelectedFile::new("a.pdf", "application/pdf", vec![1u8]).is_pdf());
        assert!(!SelectedFile::new("a.txt", "text/plain", vec![1u8]).is_pdf());
        assert!(!SelectedFile::new("a.pdf", "application/x-pdf", vec![1u8]).is_pdf());
    }

    #[test]
    fn deserializes_multimodal_response() {
        let doc: StudyDocument = serde_json::from_value(json!({
            "studyDocument": "DOC",
            "originalSize": 42,
            "processedAt": "2026-10-17T09:00:00.000Z",
            "processingMethod": "multimodal",
            "capabilities": ["text", "images"]
        }))
        .unwrap();
        assert_eq!(doc.original_size, Some(42));
        assert!(doc.original_length.is_none());
        assert_eq!(doc.capabilities.len(), 2);
    }

    #[tokio::test]
    async fn download_posts_content_as_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/download-pdf"))
            .and(body_json(json!({ "content": "STUDY DOC" })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let pdf = StudyMateApi::new(server.uri())
            .download_pdf("STUDY DOC")
            .await
            .unwrap();
        assert_eq!(&pdf[..], b"%PDF-1.4");
    }

    #[tokio::test]
    async fn download_error_carries_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/download-pdf"))
            .respond_with(ResponseTemplate::new(500).set_body_string("font table missing"))
            .mount(&server)
            .await;

        let err = StudyMateApi::new(server.uri())
            .download_pdf("STUDY DOC")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ExportFailed { status: 500, .. }));
        assert!(err.to_string().contains("font table missing"));
    }

    #[tokio::test]
    async fn zero_byte_pdf_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/download-pdf"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = StudyMateApi::new(server.uri())
            .download_pdf("STUDY DOC")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::EmptyPdf));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        // Nothing listens on port 9 on loopback.
        let err = StudyMateApi::new("http://127.0.0.1:9")
            .download_pdf("STUDY DOC")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
    }
}
