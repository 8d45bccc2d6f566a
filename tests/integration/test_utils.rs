//! Shared test utilities for integration tests
//!
//! Scripted rendering strategies and fetchers, record builders, and environment
//! isolation for configuration tests.

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use permit_preview::config::PreviewConfig;
use permit_preview::document::{PageInspector, PagedDocument, SourceDocument};
use permit_preview::error::{AttachmentError, DocumentError, RenderError};
use permit_preview::record::{ApprovalStatus, AttachmentFile, Record, Requirement};
use permit_preview::render::{
    AttachmentFetcher, FallbackRenderer, FetchedAttachment, PrimaryRenderer, Strategies,
};
use permit_preview::types::RecordId;
use permit_preview::GenerationOrchestrator;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

/// Fake paged document: `%PDF-` header, a tag, and the page count the stub
/// inspector reads back.
pub fn fake_pdf(tag: &str, pages: usize) -> Bytes {
    Bytes::from(format!("%PDF-1.7 {tag} pages={pages}"))
}

pub fn png_bytes(width: u32, height: u32) -> Bytes {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
    let mut out = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    Bytes::from(out)
}

/// Reads the page count written by [`fake_pdf`]
pub struct StubInspector;

impl PageInspector for StubInspector {
    fn page_count(&self, bytes: &[u8]) -> Result<usize, DocumentError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| DocumentError::OpenFailed(e.to_string()))?;
        if !text.starts_with("%PDF-") {
            return Err(DocumentError::OpenFailed("not a PDF".to_string()));
        }
        text.rsplit("pages=")
            .next()
            .and_then(|n| n.trim().parse().ok())
            .filter(|n| *n > 0)
            .ok_or(DocumentError::Empty)
    }
}

#[derive(Debug, Clone)]
pub enum PrimaryBehavior {
    Succeed { pages: usize },
    Unavailable,
    Fail,
}

/// Scripted high-fidelity converter
pub struct MockPrimary {
    behavior: Mutex<PrimaryBehavior>,
    calls: Mutex<Vec<RecordId>>,
    gated: Mutex<bool>,
    /// Signalled when a call starts
    pub started: Notify,
    /// Releases gated calls
    pub gate: Notify,
}

impl MockPrimary {
    pub fn new(behavior: PrimaryBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: Mutex::new(Vec::new()),
            gated: Mutex::new(false),
            started: Notify::new(),
            gate: Notify::new(),
        }
    }

    /// Make every following call wait for [`MockPrimary::gate`]
    pub fn hold(&self) {
        *self.gated.lock() = true;
    }

    /// Stop gating calls made from now on. Calls already waiting stay gated.
    pub fn release(&self) {
        *self.gated.lock() = false;
    }

    pub fn set_behavior(&self, behavior: PrimaryBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl PrimaryRenderer for MockPrimary {
    async fn render_primary(&self, record_id: &RecordId) -> Result<Bytes, RenderError> {
        self.calls.lock().push(record_id.clone());
        self.started.notify_one();
        let gated = *self.gated.lock();
        if gated {
            self.gate.notified().await;
        }
        let behavior = self.behavior.lock().clone();
        match behavior {
            PrimaryBehavior::Succeed { pages } => {
                Ok(fake_pdf(&format!("form:{}", record_id), pages))
            }
            PrimaryBehavior::Unavailable => Err(RenderError::ConverterUnavailable(
                "Engine not found on the conversion host".to_string(),
            )),
            PrimaryBehavior::Fail => Err(RenderError::UnexpectedStatus {
                status: 502,
                body: "bad gateway".to_string(),
            }),
        }
    }
}

/// Scripted local renderer
pub struct MockFallback {
    fail: Mutex<bool>,
    calls: Mutex<usize>,
}

impl MockFallback {
    pub fn new() -> Self {
        Self {
            fail: Mutex::new(false),
            calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        let fallback = Self::new();
        *fallback.fail.lock() = true;
        fallback
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl FallbackRenderer for MockFallback {
    async fn render_fallback(&self, record: &Record) -> Result<PagedDocument, RenderError> {
        *self.calls.lock() += 1;
        if *self.fail.lock() {
            return Err(RenderError::TemplateUnavailable(
                "template missing".to_string(),
            ));
        }
        let bytes = fake_pdf(&format!("template:{}", record.id), 1);
        let source = SourceDocument::new(bytes, "application/pdf", 1)
            .map_err(|e| RenderError::InvalidDocument(e.to_string()))?;
        Ok(PagedDocument::from_source(source))
    }
}

/// Attachment store keyed by retrieval reference
pub struct MockFetcher {
    responses: Mutex<HashMap<String, Result<FetchedAttachment, AttachmentError>>>,
    delays: Mutex<HashMap<String, Duration>>,
    gated: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
    pub started: Notify,
    pub gate: Notify,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            gated: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            started: Notify::new(),
            gate: Notify::new(),
        }
    }

    pub fn serve(&self, reference: &str, bytes: Bytes, content_type: Option<&str>) {
        self.responses.lock().insert(
            reference.to_string(),
            Ok(FetchedAttachment {
                bytes,
                content_type: content_type.map(str::to_string),
            }),
        );
    }

    pub fn fail(&self, reference: &str) {
        self.responses.lock().insert(
            reference.to_string(),
            Err(AttachmentError::FetchFailed("404 Not Found".to_string())),
        );
    }

    pub fn delay(&self, reference: &str, delay: Duration) {
        self.delays.lock().insert(reference.to_string(), delay);
    }

    /// Make fetches of `reference` wait for [`MockFetcher::gate`]
    pub fn hold(&self, reference: &str) {
        *self.gated.lock() = Some(reference.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl AttachmentFetcher for MockFetcher {
    async fn fetch_attachment(&self, reference: &str) -> Result<FetchedAttachment, AttachmentError> {
        self.calls.lock().push(reference.to_string());
        self.started.notify_one();

        let gated = self.gated.lock().as_deref() == Some(reference);
        if gated {
            self.gate.notified().await;
        }
        let delay = self.delays.lock().get(reference).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.responses.lock().get(reference).cloned();
        response.unwrap_or_else(|| Err(AttachmentError::FetchFailed(format!("unknown {reference}"))))
    }
}

/// An orchestrator wired to scripted strategies
pub struct Harness {
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub primary: Arc<MockPrimary>,
    pub fallback: Arc<MockFallback>,
    pub fetcher: Arc<MockFetcher>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(
            MockPrimary::new(PrimaryBehavior::Succeed { pages: 2 }),
            MockFallback::new(),
        )
    }

    pub fn with(primary: MockPrimary, fallback: MockFallback) -> Self {
        let primary = Arc::new(primary);
        let fallback = Arc::new(fallback);
        let fetcher = Arc::new(MockFetcher::new());
        let strategies = Strategies {
            primary: primary.clone(),
            fallback: fallback.clone(),
            fetcher: fetcher.clone(),
            inspector: Arc::new(StubInspector),
        };
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            &PreviewConfig::default(),
            strategies,
        ));
        Self {
            orchestrator,
            primary,
            fallback,
            fetcher,
        }
    }

    pub fn session(&self) -> Arc<permit_preview::PreviewSession> {
        Arc::new(permit_preview::PreviewSession::new(Arc::clone(
            &self.orchestrator,
        )))
    }
}

pub fn file(id: &str, status: ApprovalStatus, reference: &str, content_type: &str) -> AttachmentFile {
    AttachmentFile {
        id: id.to_string(),
        name: format!("{id}.bin"),
        status,
        uploaded_at: None,
        content_hash: Some(format!("hash-{id}")),
        size: 1024,
        reference: reference.to_string(),
        content_type: Some(content_type.to_string()),
    }
}

/// A record with one requirement holding `files` in order
pub fn record(id: &str, files: Vec<AttachmentFile>) -> Record {
    let mut record = Record::new(id);
    record.status = "approved".to_string();
    record.overall_status = "for_release".to_string();
    record.requirements = vec![Requirement {
        id: "req-1".to_string(),
        name: "Supporting documents".to_string(),
        files,
    }];
    record
}

/// Serializes environment variable access across tests in this binary
static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Run `f` with HOME and XDG_CONFIG_HOME pointing into `test_dir`, plus the given
/// extra variables; everything is restored afterwards.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let mut names = vec!["HOME", "XDG_CONFIG_HOME"];
    names.extend(vars.iter().map(|(name, _)| *name));
    let saved: Vec<(String, Option<String>)> = names
        .iter()
        .map(|name| (name.to_string(), std::env::var(name).ok()))
        .collect();

    let home = test_dir.path().join("home");
    let config_home = test_dir.path().join("xdg");
    std::fs::create_dir_all(&home).unwrap();
    std::fs::create_dir_all(&config_home).unwrap();
    std::env::set_var("HOME", &home);
    std::env::set_var("XDG_CONFIG_HOME", &config_home);
    for (name, value) in vars {
        std::env::set_var(name, value);
    }

    let result = f();

    for (name, value) in saved {
        match value {
            Some(value) => std::env::set_var(&name, value),
            None => std::env::remove_var(&name),
        }
    }
    result
}
