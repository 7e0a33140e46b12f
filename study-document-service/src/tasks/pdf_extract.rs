use crate::error::{StudyError, StudyResult};
use async_trait::async_trait;
use bytes::Bytes;
use lopdf::Document;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Page/text-run tree produced by [`PdfParser`].
///
/// Run text is kept URI-component encoded so the tree can be serialized
/// and logged without escaping issues; [`assemble_text`] decodes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfTree {
    #[serde(rename = "Pages")]
    pub pages: Vec<PdfPage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfPage {
    #[serde(rename = "Texts")]
    pub texts: Vec<PdfText>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PdfText {
    #[serde(rename = "R")]
    pub runs: Vec<TextRun>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextRun {
    #[serde(rename = "T")]
    pub t: Option<String>,
}

impl TextRun {
    pub fn encode(text: &str) -> Self {
        Self {
            t: Some(urlencoding::encode(text).into_owned()),
        }
    }
}

/// The two events a parse can end with. Exactly one is delivered per parse.
#[derive(Debug)]
pub enum ParseEvent {
    DataReady(PdfTree),
    DataError(String),
}

/// Event-driven PDF parser. Parsing happens on a blocking worker and the
/// outcome is delivered through the returned [`ParseHandle`].
pub struct PdfParser;

impl PdfParser {
    pub fn parse_buffer(pdf: Bytes) -> ParseHandle {
        let (tx, rx) = oneshot::channel();

        tokio::task::spawn_blocking(move || {
            let event = match build_tree(&pdf) {
                Ok(tree) => ParseEvent::DataReady(tree),
                Err(e) => ParseEvent::DataError(e.to_string()),
            };
            // The waiter may have given up on a deadline.
            let _ = tx.send(event);
        });

        ParseHandle { events: rx }
    }
}

/// Single suspend point for a running parse.
pub struct ParseHandle {
    events: oneshot::Receiver<ParseEvent>,
}

impl ParseHandle {
    /// Wait for the parse outcome, optionally bounded by `deadline`.
    pub async fn wait(self, deadline: Option<Duration>) -> StudyResult<PdfTree> {
        let received = match deadline {
            Some(limit) => match tokio::time::timeout(limit, self.events).await {
                Ok(received) => received,
                Err(_) => {
                    error!("PDF parsing did not finish within {:?}", limit);
                    return Err(StudyError::ParseFailed);
                }
            },
            None => self.events.await,
        };

        match received {
            Ok(ParseEvent::DataReady(tree)) => Ok(tree),
            Ok(ParseEvent::DataError(message)) => {
                error!("PDF parsing error: {}", message);
                Err(StudyError::ParseFailed)
            }
            Err(_) => {
                error!("PDF parser stopped without reporting a result");
                Err(StudyError::ParseFailed)
            }
        }
    }
}

fn build_tree(pdf: &[u8]) -> Result<PdfTree, lopdf::Error> {
    let document = Document::load_mem(pdf)?;
    let mut pages = Vec::new();

    for (page_number, _) in document.get_pages() {
        let texts = match document.extract_text(&[page_number]) {
            Ok(page_text) => page_text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| PdfText {
                    runs: vec![TextRun::encode(line)],
                })
                .collect(),
            Err(e) => {
                warn!("No text recovered from page {}: {}", page_number, e);
                Vec::new()
            }
        };
        pages.push(PdfPage { texts });
    }

    Ok(PdfTree { pages })
}

/// Concatenate every run's decoded text followed by a space, with a newline
/// after each page.
pub fn assemble_text(tree: &PdfTree) -> StudyResult<String> {
    let mut extracted = String::new();

    for page in &tree.pages {
        for text in &page.texts {
            for run in &text.runs {
                let Some(encoded) = run.t.as_deref().filter(|t| !t.is_empty()) else {
                    continue;
                };
                // Parsed trees always decode; this guards trees built or deserialized elsewhere.
                let decoded = urlencoding::decode(encoded).map_err(|e| {
                    error!("Error processing PDF data: {}", e);
                    StudyError::ProcessingFailed
                })?;
                extracted.push_str(&decoded);
                extracted.push(' ');
            }
        }
        extracted.push('\n');
    }

    Ok(extracted)
}

/// Turns raw PDF bytes into plain text for the text-only prompt.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, pdf: Bytes) -> StudyResult<String>;
}

/// [`TextExtractor`] backed by `lopdf`.
#[derive(Debug, Clone, Default)]
pub struct LopdfExtractor {
    deadline: Option<Duration>,
}

impl LopdfExtractor {
    pub fn new(deadline: Option<Duration>) -> Self {
        Self { deadline }
    }
}

#[async_trait]
impl TextExtractor for LopdfExtractor {
    async fn extract(&self, pdf: Bytes) -> StudyResult<String> {
        info!("Parsing PDF ({} bytes)", pdf.len());

        let tree = PdfParser::parse_buffer(pdf).wait(self.deadline).await?;
        let extracted = assemble_text(&tree)?;

        if extracted.trim().is_empty() {
            warn!("PDF parsed but contains no text ({} pages)", tree.pages.len());
            return Err(StudyError::NoTextContent);
        }

        info!(
            "Extracted {} characters from {} pages",
            extracted.chars().count(),
            tree.pages.len()
        );
        Ok(extracted)
    }
}
