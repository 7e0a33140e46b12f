use crate::error::ClientError;
use bytes::Bytes;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Delay between triggering a download and releasing its URL and anchor.
pub const CLEANUP_GRACE: Duration = Duration::from_millis(100);

pub type AnchorId = u64;

/// The page-side operations needed to hand a file to the user.
pub trait DownloadSink: Send + Sync + 'static {
    fn create_object_url(&self, data: Bytes) -> anyhow::Result<String>;
    fn attach_anchor(&self, url: &str, file_name: &str) -> anyhow::Result<AnchorId>;
    fn click(&self, anchor: AnchorId) -> anyhow::Result<()>;
    /// Remove the anchor if it is still attached.
    fn detach_anchor(&self, anchor: AnchorId);
    fn revoke_object_url(&self, url: &str);
}

pub fn download_file_name(date: NaiveDate) -> String {
    format!("study-document-{}.pdf", date.format("%Y-%m-%d"))
}

/// A transient object URL (plus its anchor once attached).
///
/// Dropping the link schedules the release after the grace period, so the
/// URL is revoked and the anchor removed on every exit path.
pub struct DownloadLink<S: DownloadSink> {
    sink: Arc<S>,
    url: String,
    anchor: Option<AnchorId>,
    grace: Duration,
}

impl<S: DownloadSink> DownloadLink<S> {
    pub fn acquire(sink: Arc<S>, data: Bytes, grace: Duration) -> Result<Self, ClientError> {
        let url = sink
            .create_object_url(data)
            .map_err(|e| ClientError::DownloadTrigger(e.to_string()))?;
        debug!("Object URL created: {}", url);

        Ok(Self {
            sink,
            url,
            anchor: None,
            grace,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Attach a hidden anchor for `file_name` and click it.
    pub fn trigger(&mut self, file_name: &str) -> Result<(), ClientError> {
        let anchor = self
            .sink
            .attach_anchor(&self.url, file_name)
            .map_err(|e| ClientError::DownloadTrigger(e.to_string()))?;
        self.anchor = Some(anchor);

        self.sink
            .click(anchor)
            .map_err(|e| ClientError::DownloadTrigger(e.to_string()))?;
        info!("Download of {} initiated", file_name);
        Ok(())
    }
}

fn release<S: DownloadSink>(sink: &S, url: &str, anchor: Option<AnchorId>) {
    if let Some(anchor) = anchor {
        sink.detach_anchor(anchor);
    }
    sink.revoke_object_url(url);
    debug!("Cleanup completed for {}", url);
}

impl<S: DownloadSink> Drop for DownloadLink<S> {
    fn drop(&mut self) {
        let sink = Arc::clone(&self.sink);
        let url = std::mem::take(&mut self.url);
        let anchor = self.anchor.take();
        let grace = self.grace;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(grace).await;
                    release(sink.as_ref(), &url, anchor);
                });
            }
            Err(_) => release(sink.as_ref(), &url, anchor),
        }
    }
}

/// Sink that saves downloads into a directory.
///
/// Blobs are staged in memory behind `blob:<uuid>` URLs until revoked; a click
/// writes the blob under the anchor's file name.
pub struct DirectorySink {
    dir: PathBuf,
    blobs: Mutex<HashMap<String, Bytes>>,
    anchors: Mutex<HashMap<AnchorId, (String, String)>>,
    next_anchor: AtomicU64,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            blobs: Mutex::new(HashMap::new()),
            anchors: Mutex::new(HashMap::new()),
            next_anchor: AtomicU64::new(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn staged_blobs(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }

    pub fn attached_anchors(&self) -> usize {
        self.anchors.lock().map(|a| a.len()).unwrap_or(0)
    }
}

impl DownloadSink for DirectorySink {
    fn create_object_url(&self, data: Bytes) -> anyhow::Result<String> {
        let url = format!("blob:{}", Uuid::new_v4());
        self.blobs
            .lock()
            .map_err(|_| anyhow::anyhow!("blob store poisoned"))?
            .insert(url.clone(), data);
        Ok(url)
    }

    fn attach_anchor(&self, url: &str, file_name: &str) -> anyhow::Result<AnchorId> {
        let id = self.next_anchor.fetch_add(1, Ordering::SeqCst);
        self.anchors
            .lock()
            .map_err(|_| anyhow::anyhow!("anchor table poisoned"))?
            .insert(id, (url.to_string(), file_name.to_string()));
        Ok(id)
    }

    fn click(&self, anchor: AnchorId) -> anyhow::Result<()> {
        let (url, file_name) = self
            .anchors
            .lock()
            .map_err(|_| anyhow::anyhow!("anchor table poisoned"))?
            .get(&anchor)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("anchor {} is not attached", anchor))?;

        let data = self
            .blobs
            .lock()
            .map_err(|_| anyhow::anyhow!("blob store poisoned"))?
            .get(&url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("object URL {} was revoked", url))?;

        let target = self.dir.join(&file_name);
        std::fs::write(&target, &data)?;
        info!("Saved {} ({} bytes)", target.display(), data.len());
        Ok(())
    }

    fn detach_anchor(&self, anchor: AnchorId) {
        match self.anchors.lock() {
            Ok(mut anchors) => {
                anchors.remove(&anchor);
            }
            Err(_) => warn!("Cleanup error (non-critical): anchor table poisoned"),
        }
    }

    fn revoke_object_url(&self, url: &str) {
        match self.blobs.lock() {
            Ok(mut blobs) => {
                blobs.remove(url);
            }
            Err(_) => warn!("Cleanup error (non-critical): blob store poisoned"),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::RecordingSink;
    use super::*;

    const SHORT_GRACE: Duration = Duration::from_millis(10);

    #[test]
    fn file_name_carries_the_date() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert_eq!(download_file_name(date), "study-document-2026-10-17.pdf");
    }

    #[tokio::test]
    async fn release_waits_for_grace_period() {
        let sink = Arc::new(RecordingSink::default());
        {
            let mut link =
                DownloadLink::acquire(sink.clone(), Bytes::from_static(b"%PDF"), SHORT_GRACE * 10)
                    .unwrap();
            link.trigger("study.pdf").unwrap();
        }
        assert_eq!(sink.count("revoke"), 0);

        tokio::time::sleep(SHORT_GRACE * 30).await;
        assert_eq!(sink.events(), vec!["create", "attach", "click", "detach", "revoke"]);
    }

    #[tokio::test]
    async fn failed_click_still_releases_everything() {
        let sink = Arc::new(RecordingSink::failing_click());
        {
            let mut link =
                DownloadLink::acquire(sink.clone(), Bytes::from_static(b"%PDF"), SHORT_GRACE)
                    .unwrap();
            assert!(matches!(
                link.trigger("study.pdf"),
                Err(ClientError::DownloadTrigger(_))
            ));
        }

        tokio::time::sleep(SHORT_GRACE * 10).await;
        assert_eq!(sink.count("detach"), 1);
        assert_eq!(sink.count("revoke"), 1);
    }

    #[tokio::test]
    async fn untriggered_link_only_revokes_url() {
        let sink = Arc::new(RecordingSink::default());
        drop(DownloadLink::acquire(sink.clone(), Bytes::from_static(b"%PDF"), SHORT_GRACE).unwrap());

        tokio::time::sleep(SHORT_GRACE * 10).await;
        assert_eq!(sink.events(), vec!["create", "revoke"]);
    }

    #[test]
    fn release_is_immediate_outside_a_runtime() {
        let sink = Arc::new(RecordingSink::default());
        drop(DownloadLink::acquire(sink.clone(), Bytes::from_static(b"%PDF"), SHORT_GRACE).unwrap());
        assert_eq!(sink.events(), vec!["create", "revoke"]);
    }

    #[tokio::test]
    async fn directory_sink_writes_file_and_forgets_blob() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(DirectorySink::new(dir.path()));

        {
            let mut link =
                DownloadLink::acquire(sink.clone(), Bytes::from_static(b"%PDF-1.4"), SHORT_GRACE)
                    .unwrap();
            assert!(link.url().starts_with("blob:"));
            link.trigger("study-document-2026-10-17.pdf").unwrap();
        }

        let written = std::fs::read(dir.path().join("study-document-2026-10-17.pdf")).unwrap();
        assert_eq!(written, b"%PDF-1.4");

        tokio::time::sleep(SHORT_GRACE * 10).await;
        assert_eq!(sink.staged_blobs(), 0);
        assert_eq!(sink.attached_anchors(), 0);
    }

    #[test]
    fn directory_sink_refuses_revoked_urls() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path());
        let url = sink.create_object_url(Bytes::from_static(b"%PDF")).unwrap();
        let anchor = sink.attach_anchor(&url, "x.pdf").unwrap();
        sink.revoke_object_url(&url);
        assert!(sink.click(anchor).is_err());
    }
}
