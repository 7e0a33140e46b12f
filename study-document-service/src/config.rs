use anyhow::{Context as _, anyhow};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_PORT: u16 = 3000;

/// How uploaded PDF content reaches the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStrategyKind {
    /// Extract text locally and interpolate it into the prompt.
    TextExtraction,
    /// Forward the raw PDF as a binary attachment.
    DirectAttachment,
}

impl FromStr for ContentStrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "text-extraction" => Ok(Self::TextExtraction),
            "attachment" | "direct-attachment" | "multimodal" => Ok(Self::DirectAttachment),
            other => Err(anyhow!(
                "unknown content strategy '{}', expected 'text' or 'attachment'",
                other
            )),
        }
    }
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub gemini_api_key: Option<String>,
    pub model: String,
    pub gemini_base_url: String,
    pub strategy: ContentStrategyKind,
    /// Deadline for the extractor's parse event. `None` waits forever.
    pub extraction_timeout: Option<Duration>,
    /// TrueType font embedded in exported PDFs. Without one the builtin
    /// Helvetica is used, which only covers WinAnsi text.
    pub pdf_font_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            gemini_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            strategy: ContentStrategyKind::TextExtraction,
            extraction_timeout: None,
            pdf_font_path: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let port = lookup("PORT")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let gemini_api_key = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty());

        let strategy = match lookup("CONTENT_STRATEGY") {
            Some(value) => value.parse()?,
            None => defaults.strategy,
        };

        let extraction_timeout = lookup("EXTRACTION_TIMEOUT_SECS")
            .map(|secs| {
                secs.parse::<u64>()
                    .with_context(|| format!("EXTRACTION_TIMEOUT_SECS is not a number: {}", secs))
            })
            .transpose()?
            .map(Duration::from_secs);

        Ok(Self {
            port,
            gemini_api_key,
            model: lookup("GEMINI_MODEL").unwrap_or(defaults.model),
            gemini_base_url: lookup("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            strategy,
            extraction_timeout,
            pdf_font_path: lookup("PDF_FONT_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}
