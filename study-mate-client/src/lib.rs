//! Client half of the study document flow: pick a PDF, have the service turn it
//! into a study document, and download that document as a PDF.
//!
//! [`StudySession`] holds the in-memory state of one session. The browser side
//! of a download (object URLs, anchors, clicks) sits behind [`DownloadSink`] so
//! the same session logic drives a real page or [`DirectorySink`].

pub mod api;
pub mod download;
pub mod error;
pub mod session;

pub use api::{SelectedFile, StudyDocument, StudyMateApi};
pub use download::{AnchorId, DirectorySink, DownloadLink, DownloadSink};
pub use error::ClientError;
pub use session::{DownloadOutcome, GenerateOutcome, SessionSnapshot, SessionTimings, StudySession};
