use crate::api::{SelectedFile, StudyDocument, StudyMateApi};
use crate::download::{CLEANUP_GRACE, DownloadLink, DownloadSink, download_file_name};
use crate::error::ClientError;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy)]
pub struct SessionTimings {
    pub progress_tick: Duration,
    pub progress_step: u8,
    pub progress_cap: u8,
    pub success_banner: Duration,
    pub cleanup_grace: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            progress_tick: Duration::from_millis(200),
            progress_step: 10,
            progress_cap: 90,
            success_banner: Duration::from_secs(3),
            cleanup_grace: CLEANUP_GRACE,
        }
    }
}

#[derive(Debug)]
pub enum GenerateOutcome {
    Generated(StudyDocument),
    /// A generation was already running.
    Ignored,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    Started { file_name: String, size: usize },
    /// A download was already in flight.
    Ignored,
}

/// Read-only view of the session, for rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub file_name: Option<String>,
    pub file_size_mb: Option<f64>,
    pub study_document: String,
    pub loading: bool,
    pub upload_progress: u8,
    pub downloading: bool,
    pub download_success: bool,
}

#[derive(Default)]
struct SessionState {
    file: Option<SelectedFile>,
    study_document: String,
    loading: bool,
    upload_progress: u8,
    download_success: bool,
}

/// In-memory state of one user session: the selected file, the generated
/// study document and the in-flight flags that keep actions from overlapping.
pub struct StudySession<S: DownloadSink> {
    api: StudyMateApi,
    sink: Arc<S>,
    state: Arc<Mutex<SessionState>>,
    downloading: AtomicBool,
    timings: SessionTimings,
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<S: DownloadSink> StudySession<S> {
    pub fn new(api: StudyMateApi, sink: Arc<S>) -> Self {
        Self::with_timings(api, sink, SessionTimings::default())
    }

    pub fn with_timings(api: StudyMateApi, sink: Arc<S>, timings: SessionTimings) -> Self {
        Self {
            api,
            sink,
            state: Arc::new(Mutex::new(SessionState::default())),
            downloading: AtomicBool::new(false),
            timings,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = lock(&self.state);
        SessionSnapshot {
            file_name: state.file.as_ref().map(|f| f.name.clone()),
            file_size_mb: state.file.as_ref().map(SelectedFile::size_mb),
            study_document: state.study_document.clone(),
            loading: state.loading,
            upload_progress: state.upload_progress,
            downloading: self.downloading.load(Ordering::SeqCst),
            download_success: state.download_success,
        }
    }

    /// Pick a file for upload. A new file discards the previous study document.
    /// The selection is locked while a generation is running.
    pub fn select_file(&self, file: SelectedFile) -> Result<(), ClientError> {
        if !file.is_pdf() {
            info!("Rejected {} ({})", file.name, file.media_type);
            return Err(ClientError::InvalidFile);
        }

        let mut state = lock(&self.state);
        if state.loading {
            return Err(ClientError::GenerationInProgress);
        }
        state.file = Some(file);
        state.study_document.clear();
        Ok(())
    }

    pub async fn generate(&self) -> Result<GenerateOutcome, ClientError> {
        let file = {
            let mut state = lock(&self.state);
            let Some(file) = state.file.clone() else {
                return Err(ClientError::NoFileSelected);
            };
            if state.loading {
                return Ok(GenerateOutcome::Ignored);
            }
            state.loading = true;
            state.upload_progress = 0;
            file
        };

        // Resets the in-flight state even if this future is dropped mid-request.
        let reset_state = Arc::clone(&self.state);
        let _in_flight = scopeguard::guard(self.spawn_progress_ticker(), move |ticker| {
            ticker.abort();
            let mut state = lock(&reset_state);
            state.loading = false;
            state.upload_progress = 0;
        });

        let result = self.api.generate_study_document(&file).await;

        let mut state = lock(&self.state);
        state.upload_progress = 100;
        match result {
            Ok(document) => {
                info!(
                    "Study document received ({} characters)",
                    document.study_document.len()
                );
                state.study_document = document.study_document.clone();
                Ok(GenerateOutcome::Generated(document))
            }
            Err(e) => {
                error!("Error generating study document: {}", e);
                Err(ClientError::GenerationFailed)
            }
        }
    }

    /// Simulated upload progress: +step every tick, holding at the cap.
    fn spawn_progress_ticker(&self) -> tokio::task::JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let SessionTimings {
            progress_tick,
            progress_step,
            progress_cap,
            ..
        } = self.timings;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(progress_tick);
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut guard = lock(&state);
                if guard.upload_progress >= progress_cap {
                    guard.upload_progress = progress_cap;
                    break;
                }
                guard.upload_progress = guard.upload_progress.saturating_add(progress_step);
            }
        })
    }

    /// Export the current study document and hand it to the sink.
    pub async fn download_pdf(&self) -> Result<DownloadOutcome, ClientError> {
        let content = lock(&self.state).study_document.clone();
        if content.is_empty() {
            return Err(ClientError::EmptyContent);
        }

        if self
            .downloading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Download already in progress, ignoring");
            return Ok(DownloadOutcome::Ignored);
        }
        let _in_flight = scopeguard::guard(&self.downloading, |flag| {
            flag.store(false, Ordering::SeqCst)
        });

        info!("Starting PDF download ({} characters)", content.len());
        match self.export_and_trigger(&content).await {
            Ok(outcome) => {
                self.show_download_success();
                Ok(outcome)
            }
            Err(e) => {
                error!("Failed to download PDF: {}", e);
                Err(e)
            }
        }
    }

    async fn export_and_trigger(&self, content: &str) -> Result<DownloadOutcome, ClientError> {
        let pdf: Bytes = self.api.download_pdf(content).await?;
        let size = pdf.len();
        let file_name = download_file_name(chrono::Utc::now().date_naive());

        let mut link = DownloadLink::acquire(Arc::clone(&self.sink), pdf, self.timings.cleanup_grace)?;
        link.trigger(&file_name)?;

        Ok(DownloadOutcome::Started { file_name, size })
    }

    fn show_download_success(&self) {
        lock(&self.state).download_success = true;

        let state = Arc::clone(&self.state);
        let banner = self.timings.success_banner;
        tokio::spawn(async move {
            tokio::time::sleep(banner).await;
            lock(&state).download_success = false;
        });
    }
}
