use thiserror::Error;

/// Failures shown to the person using the client. Messages are user-facing.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Please upload a PDF file first")]
    NoFileSelected,

    #[error("Please select a valid PDF file")]
    InvalidFile,

    #[error("Please wait until the current study document is ready")]
    GenerationInProgress,

    #[error("Failed to generate study document. Please try again.")]
    GenerationFailed,

    #[error("No study document to download")]
    EmptyContent,

    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx answer from the PDF export endpoint; `body` is the server's text.
    #[error("Failed to generate PDF: {status} - {body}")]
    ExportFailed { status: u16, body: String },

    #[error("Failed to process PDF response: {0}")]
    ResponseBody(String),

    #[error("Empty PDF file generated")]
    EmptyPdf,

    #[error("Failed to initiate download: {0}")]
    DownloadTrigger(String),
}
