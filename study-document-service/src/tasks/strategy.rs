use crate::config::{ContentStrategyKind, ServiceConfig};
use crate::error::{StudyError, StudyResult};
use crate::models::{StudyDocumentResponse, UploadedFile};
use crate::tasks::generation::StudyGenerator;
use crate::tasks::pdf_extract::{LopdfExtractor, TextExtractor};
use crate::tasks::prompts::{Attachment, GenerationRequest, multimodal_prompt, text_prompt};
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{error, info};

pub const MULTIMODAL_METHOD: &str = "multimodal";
pub const MULTIMODAL_CAPABILITIES: [&str; 5] = ["text", "images", "diagrams", "charts", "tables"];

/// How an uploaded PDF is turned into a model request.
#[derive(Clone)]
pub enum ContentStrategy {
    /// Extract text locally and interpolate it into the prompt.
    TextExtraction(Arc<dyn TextExtractor>),
    /// Send the PDF itself, base64 encoded, next to the prompt.
    DirectAttachment,
}

impl ContentStrategy {
    pub fn from_config(config: &ServiceConfig) -> Self {
        match config.strategy {
            ContentStrategyKind::TextExtraction => ContentStrategy::TextExtraction(Arc::new(
                LopdfExtractor::new(config.extraction_timeout),
            )),
            ContentStrategyKind::DirectAttachment => ContentStrategy::DirectAttachment,
        }
    }

    pub fn kind(&self) -> ContentStrategyKind {
        match self {
            ContentStrategy::TextExtraction(_) => ContentStrategyKind::TextExtraction,
            ContentStrategy::DirectAttachment => ContentStrategyKind::DirectAttachment,
        }
    }

    /// Run one validated upload through extraction, generation and response assembly.
    pub async fn generate(
        &self,
        file: UploadedFile,
        generator: &dyn StudyGenerator,
    ) -> StudyResult<StudyDocumentResponse> {
        match self {
            ContentStrategy::TextExtraction(extractor) => {
                let extracted = extractor.extract(file.bytes).await?;
                let request = GenerationRequest::text_only(text_prompt(&extracted));
                let study_document = call_model(generator, &request).await?;

                Ok(StudyDocumentResponse {
                    study_document,
                    original_length: Some(extracted.chars().count()),
                    original_size: None,
                    processed_at: processed_at(),
                    processing_method: None,
                    capabilities: None,
                })
            }
            ContentStrategy::DirectAttachment => {
                let original_size = file.len();
                let request = GenerationRequest::with_attachment(
                    multimodal_prompt(),
                    Attachment::pdf(&file.bytes),
                );
                let study_document = call_model(generator, &request).await?;

                Ok(StudyDocumentResponse {
                    study_document,
                    original_length: None,
                    original_size: Some(original_size),
                    processed_at: processed_at(),
                    processing_method: Some(MULTIMODAL_METHOD.to_string()),
                    capabilities: Some(
                        MULTIMODAL_CAPABILITIES
                            .iter()
                            .map(|c| c.to_string())
                            .collect(),
                    ),
                })
            }
        }
    }
}

async fn call_model(
    generator: &dyn StudyGenerator,
    request: &GenerationRequest,
) -> StudyResult<String> {
    match generator.generate(request).await {
        Ok(text) if !text.trim().is_empty() => {
            info!("Study document generated ({} characters)", text.len());
            Ok(text)
        }
        Ok(_) => {
            error!("Error generating study document: model returned an empty reply");
            Err(StudyError::Generation)
        }
        Err(e) => {
            error!("Error generating study document: {:#}", e);
            Err(StudyError::Generation)
        }
    }
}

fn processed_at() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Extractor returning a fixed result and counting calls.
    pub struct StubExtractor {
        pub result: Result<String, fn() -> StudyError>,
        pub calls: AtomicUsize,
    }

    impl StubExtractor {
        pub fn returning(text: &str) -> Self {
            Self {
                result: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(make: fn() -> StudyError) -> Self {
            Self {
                result: Err(make),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextExtractor for StubExtractor {
        async fn extract(&self, _pdf: Bytes) -> StudyResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    /// Generator returning a fixed reply and recording requests.
    pub struct StubGenerator {
        reply: Option<String>,
        pub requests: Mutex<Vec<GenerationRequest>>,
    }

    impl StubGenerator {
        pub fn replying(text: &str) -> Self {
            Self {
                reply: Some(text.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                reply: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl StudyGenerator for StubGenerator {
        async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            self.reply
                .clone()
                .ok_or_else(|| anyhow::anyhow!("quota exceeded for project"))
        }
    }
}
