//! Test helpers: in-memory enhancement service, link opener and image fixtures.
#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use glowii_api_client::{
    DescribeResponse, EnhanceRequest, EnhanceResponse, EnhancementService, GeneratedBackground,
    HealthStatus, SearchResponse, SearchResult, UploadResponse,
};
use glowii_core::{ClientConfig, RecordingNotifier};
use glowii_workflow::{LinkOpener, SelectedFile, Workflow};
use image::{ImageFormat, Rgb, RgbImage};
use tokio::sync::Notify;

/// Canned reply of one mock endpoint
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Fail(String),
}

impl<T: Clone> Reply<T> {
    fn get(&self) -> anyhow::Result<T> {
        match self {
            Reply::Ok(value) => Ok(value.clone()),
            Reply::Fail(message) => Err(anyhow::anyhow!("{}", message)),
        }
    }
}

/// Recorded remote call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Upload(String),
    Enhance(EnhanceRequest),
    Describe(String, u32),
    Search(String),
    GenerateBackground(String),
    Health,
    Cleanup(String),
}

pub struct MockEnhancementService {
    pub upload: Mutex<Reply<UploadResponse>>,
    pub enhance: Mutex<Reply<EnhanceResponse>>,
    pub describe: Mutex<Reply<DescribeResponse>>,
    pub search: Mutex<Reply<SearchResponse>>,
    pub background: Mutex<Reply<GeneratedBackground>>,
    pub health: Mutex<Reply<HealthStatus>>,
    pub cleanup: Mutex<Reply<()>>,
    /// When set, `enhance` waits for a permit before replying
    pub enhance_gate: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<Call>>,
}

impl Default for MockEnhancementService {
    fn default() -> Self {
        Self {
            upload: Mutex::new(Reply::Ok(UploadResponse::Image {
                image: "uploads/product.jpg".to_string(),
            })),
            enhance: Mutex::new(Reply::Ok(enhance_response("proc-1", 3, 1000, 1004))),
            describe: Mutex::new(Reply::Ok(DescribeResponse {
                description: Some(r#"{"title":"T","description":"D"}"#.to_string()),
                option_number: None,
            })),
            search: Mutex::new(Reply::Ok(SearchResponse {
                results: vec![SearchResult {
                    link: "https://shop.example/lamp".to_string(),
                    ..SearchResult::default()
                }],
            })),
            background: Mutex::new(Reply::Ok(GeneratedBackground {
                image: None,
                file_path: "/generated/bg.png".to_string(),
                public_url: Some("https://cdn.example/bg.png".to_string()),
                file_name: Some("bg.png".to_string()),
            })),
            health: Mutex::new(Reply::Ok(HealthStatus {
                status: Some("healthy".to_string()),
                active_processors: Some(0),
            })),
            cleanup: Mutex::new(Reply::Ok(())),
            enhance_gate: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockEnhancementService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn set_upload(&self, reply: Reply<UploadResponse>) {
        *self.upload.lock().unwrap() = reply;
    }

    pub fn set_enhance(&self, reply: Reply<EnhanceResponse>) {
        *self.enhance.lock().unwrap() = reply;
    }

    pub fn set_describe(&self, reply: Reply<DescribeResponse>) {
        *self.describe.lock().unwrap() = reply;
    }

    pub fn set_search(&self, reply: Reply<SearchResponse>) {
        *self.search.lock().unwrap() = reply;
    }

    pub fn set_health(&self, reply: Reply<HealthStatus>) {
        *self.health.lock().unwrap() = reply;
    }

    /// Hold `enhance` until the returned handle is notified.
    pub fn gate_enhance(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.enhance_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl EnhancementService for MockEnhancementService {
    async fn upload(
        &self,
        file_name: &str,
        _content_type: &str,
        _data: Vec<u8>,
    ) -> anyhow::Result<UploadResponse> {
        self.record(Call::Upload(file_name.to_string()));
        self.upload.lock().unwrap().get()
    }

    async fn enhance(&self, request: &EnhanceRequest) -> anyhow::Result<EnhanceResponse> {
        self.record(Call::Enhance(request.clone()));
        let gate = self.enhance_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.enhance.lock().unwrap().get()
    }

    async fn describe(
        &self,
        processor_id: &str,
        option_number: u32,
    ) -> anyhow::Result<DescribeResponse> {
        self.record(Call::Describe(processor_id.to_string(), option_number));
        self.describe.lock().unwrap().get()
    }

    async fn search(&self, query: &str) -> anyhow::Result<SearchResponse> {
        self.record(Call::Search(query.to_string()));
        self.search.lock().unwrap().get()
    }

    async fn generate_background(&self, prompt: &str) -> anyhow::Result<GeneratedBackground> {
        self.record(Call::GenerateBackground(prompt.to_string()));
        self.background.lock().unwrap().get()
    }

    async fn health(&self) -> anyhow::Result<HealthStatus> {
        self.record(Call::Health);
        self.health.lock().unwrap().get()
    }

    async fn cleanup(&self, processor_id: &str) -> anyhow::Result<()> {
        self.record(Call::Cleanup(processor_id.to_string()));
        self.cleanup.lock().unwrap().get()
    }
}

/// Opener recording every link it was asked to open
#[derive(Debug, Default)]
pub struct RecordingOpener {
    pub opened: Mutex<Vec<String>>,
}

impl LinkOpener for RecordingOpener {
    fn open(&self, url: &str) -> anyhow::Result<()> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([180, 140, 90]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn data_url(bytes: &[u8]) -> String {
    format!(
        "data:image/jpeg;base64,{}",
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Enhance response with `count` JPEG candidates of the given size.
pub fn enhance_response(processor_id: &str, count: usize, width: u32, height: u32) -> EnhanceResponse {
    let payload = || Some(data_url(&jpeg_bytes(width, height)));
    EnhanceResponse {
        processor_id: processor_id.to_string(),
        enhanced_image_1: if count >= 1 { payload() } else { None },
        enhanced_image_2: if count >= 2 { payload() } else { None },
        enhanced_image_3: if count >= 3 { payload() } else { None },
    }
}

pub fn product_photo() -> SelectedFile {
    SelectedFile::new("product.jpg", "image/jpeg", jpeg_bytes(64, 48))
}

pub fn test_config(dir: &Path) -> ClientConfig {
    ClientConfig {
        phase_delay_ms: 0,
        download_dir: dir.join("downloads"),
        cache_dir: Some(dir.join("cache")),
        ..ClientConfig::default()
    }
}

pub struct TestWorkflow {
    pub workflow: Arc<Workflow>,
    pub api: Arc<MockEnhancementService>,
    pub notifier: RecordingNotifier,
    pub opener: Arc<RecordingOpener>,
    pub _dir: tempfile::TempDir,
}

pub fn setup() -> TestWorkflow {
    setup_with(|_| {})
}

pub fn setup_with(configure: impl FnOnce(&mut ClientConfig)) -> TestWorkflow {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    configure(&mut config);

    let api = MockEnhancementService::new();
    let notifier = RecordingNotifier::new();
    let opener = Arc::new(RecordingOpener::default());
    let workflow = Workflow::new(config, api.clone(), Arc::new(notifier.clone()))
        .with_opener(opener.clone());

    TestWorkflow {
        workflow: Arc::new(workflow),
        api,
        notifier,
        opener,
        _dir: dir,
    }
}

impl TestWorkflow {
    /// Drive the workflow to `Selecting`.
    pub async fn to_selecting(&self) {
        self.workflow.select_file(product_photo()).await.unwrap();
        self.workflow.begin_enhancement().await.unwrap();
    }

    /// Drive the workflow to `Finalized` with option `index`.
    pub async fn to_finalized(&self, index: usize) {
        self.to_selecting().await;
        self.workflow.select_option(index).await.unwrap();
    }

    pub fn messages(&self) -> Vec<String> {
        self.notifier
            .entries()
            .into_iter()
            .map(|n| n.message)
            .collect()
    }
}
