//! Enhancement session state machine
//!
//! `Idle -> Loaded -> Processing -> Selecting -> Finalized`, back to `Idle` only through
//! [`Workflow::reset`]. Every operation reports its failures through the [`Notifier`] before
//! returning them, and no failure leaves the session in a mixed stage.
//!
//! The session lives behind a `std::sync::Mutex` that is never held across an `.await`. Each
//! asynchronous operation records the session generation when it starts and drops its result if a
//! newer generation (new file or reset) became active in the meantime.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use chrono::Utc;
use glowii_api_client::{
    ApiClient, EnhanceRequest, EnhanceResponse, EnhancementService, ProductCopy,
};
use glowii_compositor::{Compositor, EXPORT_FILE_NAME};
use glowii_core::models::session::MAX_OPTIONS;
use glowii_core::validation::content_type_for_filename;
use glowii_core::{
    AppError, AppResult, Background, ClientConfig, EnhancementOption, EnhancementSettings,
    ErrorMetadata, ImageData, LogLevel, MediaValidator, Notification, Notifier, ProcessingStep,
    ServiceMode, Session, Stage, TracingNotifier,
};
use tokio::sync::watch;

use crate::decode;
use crate::files::{self, UploadCache};
use crate::opener::{LinkOpener, LoggingOpener};
use crate::progress::{Outcome, Progress};

/// A file chosen by the user
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl SelectedFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk; the content type is derived from its extension.
    pub async fn from_path(path: &Path) -> AppResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let content_type = content_type_for_filename(&file_name).to_string();
        Ok(Self::new(file_name, content_type, bytes))
    }
}

struct WorkflowState {
    generation: u64,
    session: Session,
    compositor: Option<Compositor>,
    /// Option whose description is being generated
    pending_selection: Option<usize>,
}

pub struct Workflow {
    config: ClientConfig,
    api: Arc<dyn EnhancementService>,
    notifier: Arc<dyn Notifier>,
    opener: Arc<dyn LinkOpener>,
    validator: MediaValidator,
    cache: Option<UploadCache>,
    state: Mutex<WorkflowState>,
    progress: watch::Sender<Progress>,
}

impl Workflow {
    pub fn new(
        config: ClientConfig,
        api: Arc<dyn EnhancementService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let session = Session::new();
        let (progress, _) = watch::channel(Progress::of(0, &session));

        Self {
            validator: MediaValidator::new(config.max_file_size_bytes),
            cache: config.cache_dir.clone().map(UploadCache::new),
            config,
            api,
            notifier,
            opener: Arc::new(LoggingOpener),
            state: Mutex::new(WorkflowState {
                generation: 0,
                session,
                compositor: None,
                pending_selection: None,
            }),
            progress,
        }
    }

    /// Workflow talking to the configured remote service, reporting through tracing.
    pub fn from_config(config: ClientConfig) -> anyhow::Result<Self> {
        let api = ApiClient::from_config(&config)?;
        Ok(Self::new(config, Arc::new(api), Arc::new(TracingNotifier)))
    }

    pub fn with_opener(mut self, opener: Arc<dyn LinkOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Copy of the current session
    pub fn snapshot(&self) -> Session {
        self.lock().session.clone()
    }

    pub fn progress(&self) -> Progress {
        *self.progress.borrow()
    }

    /// Receiver observing every stage and processing-step transition.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    // ---------------------------------------------------------------------
    // File selection and upload
    // ---------------------------------------------------------------------

    /// Validate and load a file, then upload it.
    ///
    /// The session is `Loaded` once the image has been decoded, before the upload completes.
    /// An upload failure is returned (and notified) but keeps the session `Loaded`; use
    /// [`Workflow::retry_upload`] to try again.
    pub async fn select_file(&self, file: SelectedFile) -> AppResult<Outcome> {
        if let Err(err) = self
            .validator
            .validate_all(&file.content_type, file.bytes.len())
        {
            return self.fail(err.into());
        }
        self.require_stage(
            &[Stage::Idle, Stage::Loaded],
            "Please start over before selecting a new image.",
        )?;

        let bytes = file.bytes.clone();
        let dimensions = match blocking(move || Ok(decode::probe_dimensions(&bytes)?)).await {
            Ok(dimensions) => dimensions,
            Err(err) => return self.fail(err),
        };

        let generation = {
            let mut st = self.lock();
            if !matches!(st.session.stage, Stage::Idle | Stage::Loaded) {
                return self.fail(AppError::precondition(
                    "Please start over before selecting a new image.",
                ));
            }

            let mut session = st.session.successor();
            session.stage = Stage::Loaded;
            session.original_image = Some(ImageData::new(
                file.bytes.clone(),
                file.content_type.clone(),
            ));
            session.original_dimensions = Some(dimensions);
            session.original_file_name = Some(file.file_name.clone());

            st.generation += 1;
            st.session = session;
            st.compositor = None;
            st.pending_selection = None;
            self.publish(&st);
            st.generation
        };

        tracing::info!(
            generation,
            file_name = %file.file_name,
            size = file.bytes.len(),
            dimensions = %dimensions,
            "Image loaded"
        );
        self.notifier.notify(Notification::info("Uploading image..."));
        self.upload(generation, file).await
    }

    /// Upload the loaded image again after a failed upload.
    pub async fn retry_upload(&self) -> AppResult<Outcome> {
        let (generation, file) = {
            let st = self.lock();
            let session = &st.session;
            match (
                session.stage,
                &session.original_image,
                &session.uploaded_reference,
            ) {
                (Stage::Loaded, Some(image), None) => (
                    st.generation,
                    SelectedFile::new(
                        session
                            .original_file_name
                            .clone()
                            .unwrap_or_else(|| "upload".to_string()),
                        image.content_type.clone(),
                        image.bytes.clone(),
                    ),
                ),
                (Stage::Loaded, _, Some(_)) => {
                    return self.fail(AppError::precondition("The image is already uploaded."))
                }
                _ => return self.fail(AppError::precondition("Please upload an image first.")),
            }
        };

        self.notifier.notify(Notification::info("Uploading image..."));
        self.upload(generation, file).await
    }

    async fn upload(&self, generation: u64, file: SelectedFile) -> AppResult<Outcome> {
        let result = self
            .api
            .upload(&file.file_name, &file.content_type, file.bytes.to_vec())
            .await
            .and_then(|response| {
                let reference = response.reference().trim().to_string();
                if reference.is_empty() {
                    Err(anyhow::anyhow!("upload response carried no image reference"))
                } else {
                    Ok(reference)
                }
            });

        {
            let mut st = self.lock();
            if st.generation != generation {
                tracing::debug!(generation, "Discarding upload result of a superseded session");
                return Ok(Outcome::Discarded);
            }
            if let Ok(reference) = &result {
                st.session.uploaded_reference = Some(reference.clone());
            }
        }

        match result {
            Ok(reference) => {
                tracing::info!(generation, reference = %reference, "Image uploaded");
                self.notifier
                    .notify(Notification::success("Image uploaded successfully!"));
                self.cache_upload(&file).await;
                Ok(Outcome::Applied)
            }
            Err(e) => self.fail(AppError::remote("upload", e)),
        }
    }

    async fn cache_upload(&self, file: &SelectedFile) {
        let Some(cache) = &self.cache else {
            return;
        };
        match cache.store(&file.file_name, &file.bytes).await {
            Ok(path) => tracing::debug!(path = %path.display(), "Cached last upload"),
            Err(e) => tracing::warn!(error = %e, "Failed to cache last upload"),
        }
    }

    /// Most recently uploaded file from the local cache, if caching is enabled.
    pub async fn last_cached_upload(&self) -> AppResult<Option<(PathBuf, Bytes)>> {
        match &self.cache {
            Some(cache) => cache.load().await,
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------------
    // Enhancement
    // ---------------------------------------------------------------------

    /// Run the four processing sub-phases and move to `Selecting`.
    ///
    /// Analysis, decision and finalization wait the configured phase delay; the application
    /// phase lasts exactly as long as the remote enhance call. On failure the session returns to
    /// `Loaded` with no options.
    pub async fn begin_enhancement(&self) -> AppResult<Outcome> {
        let (generation, request) = {
            let mut st = self.lock();
            match st.session.stage {
                Stage::Loaded => {}
                Stage::Processing => {
                    return self.fail(AppError::precondition("Enhancement is already running."))
                }
                _ => return self.fail(AppError::precondition("Please upload an image first.")),
            }
            let Some(reference) = st.session.uploaded_reference.clone() else {
                return self.fail(AppError::precondition(
                    "Please wait until the image upload has finished.",
                ));
            };

            let request = EnhanceRequest {
                image_path: reference,
                background: Some(st.session.settings.background.request_value()),
            };
            st.session.stage = Stage::Processing;
            st.session.processing_step = ProcessingStep::NotStarted;
            self.publish(&st);
            (st.generation, request)
        };
        tracing::info!(generation, background = ?request.background, "Enhancement started");

        for step in [ProcessingStep::Analysis, ProcessingStep::Decision] {
            if !self.advance(generation, step) {
                return Ok(Outcome::Discarded);
            }
            self.phase_delay().await;
        }
        if !self.advance(generation, ProcessingStep::Application) {
            return Ok(Outcome::Discarded);
        }

        let response = match self.api.enhance(&request).await {
            Ok(response) => response,
            Err(e) => return self.abort_enhancement(generation, AppError::remote("enhance", e)),
        };
        let processor_id = response.processor_id.clone();

        let options = match decode_candidates(&response).await {
            Ok(options) if !options.is_empty() => options,
            Ok(_) => {
                self.release(&processor_id).await;
                return self.abort_enhancement(
                    generation,
                    AppError::remote(
                        "enhance",
                        anyhow::anyhow!("response contained no usable candidate images"),
                    ),
                );
            }
            Err(err) => {
                self.release(&processor_id).await;
                return self.abort_enhancement(generation, err);
            }
        };

        if !self.advance(generation, ProcessingStep::Finalization) {
            self.release(&processor_id).await;
            return Ok(Outcome::Discarded);
        }
        self.phase_delay().await;

        let count = options.len();
        let committed = {
            let mut st = self.lock();
            if st.generation == generation && st.session.stage == Stage::Processing {
                st.session.options = options;
                st.session.processor_id = Some(processor_id.clone());
                st.session.processing_step = ProcessingStep::NotStarted;
                st.session.stage = Stage::Selecting;
                self.publish(&st);
                true
            } else {
                false
            }
        };
        if !committed {
            self.release(&processor_id).await;
            return Ok(Outcome::Discarded);
        }

        tracing::info!(generation, processor_id = %processor_id, options = count, "Enhancement finished");
        self.notifier.notify(Notification::success(format!(
            "{} enhanced options are ready. Pick your favorite!",
            count
        )));
        Ok(Outcome::Applied)
    }

    fn advance(&self, generation: u64, step: ProcessingStep) -> bool {
        let mut st = self.lock();
        if st.generation != generation || st.session.stage != Stage::Processing {
            tracing::debug!(generation, ?step, "Enhancement run superseded");
            return false;
        }
        st.session.processing_step = step;
        self.publish(&st);
        tracing::debug!(generation, step = step.label(), "Processing step");
        true
    }

    fn abort_enhancement(&self, generation: u64, err: AppError) -> AppResult<Outcome> {
        {
            let mut st = self.lock();
            if st.generation != generation {
                return Ok(Outcome::Discarded);
            }
            st.session.stage = Stage::Loaded;
            st.session.processing_step = ProcessingStep::NotStarted;
            st.session.options.clear();
            st.session.processor_id = None;
            self.publish(&st);
        }
        self.fail(err)
    }

    async fn phase_delay(&self) {
        let delay = self.config.phase_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Best-effort release of a server-side processor.
    async fn release(&self, processor_id: &str) {
        match self.api.cleanup(processor_id).await {
            Ok(()) => tracing::debug!(processor_id = %processor_id, "Processor released"),
            Err(e) => {
                tracing::warn!(processor_id = %processor_id, error = %e, "Processor cleanup failed")
            }
        }
    }

    // ---------------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------------

    /// Choose option `index` (0-based), optionally generate its copy, and finalize.
    ///
    /// Copy generation failures are notified but never block the transition.
    pub async fn select_option(&self, index: usize) -> AppResult<Outcome> {
        let (generation, option, processor_id, settings) = {
            let mut st = self.lock();
            if st.session.stage != Stage::Selecting {
                return self.fail(AppError::precondition(
                    "There are no enhanced options to choose from.",
                ));
            }
            if st.pending_selection.is_some() {
                return self.fail(AppError::precondition(
                    "An option is already being finalized.",
                ));
            }
            let Some(option) = st.session.options.get(index).cloned() else {
                return self.fail(AppError::precondition(format!(
                    "Option {} is not available.",
                    index + 1
                )));
            };
            st.pending_selection = Some(index);
            (
                st.generation,
                option,
                st.session.processor_id.clone(),
                st.session.settings.clone(),
            )
        };

        let copy = if settings.wants_copy() {
            self.generate_copy(processor_id.as_deref(), option.option_number)
                .await
        } else {
            None
        };

        {
            let mut st = self.lock();
            if st.generation != generation {
                return Ok(Outcome::Discarded);
            }
            let session = &mut st.session;
            session.selected_option_index = Some(index);
            session.enhanced_image = Some(option);
            if let Some(copy) = copy {
                if settings.title_generation {
                    if let Some(title) = copy.title {
                        session.generated_title = title;
                    }
                }
                if settings.description_generation {
                    if let Some(description) = copy.description {
                        session.generated_description = description;
                    }
                    session.generated_features = copy.features;
                    session.generated_tags = copy.tags;
                }
            }
            session.stage = Stage::Finalized;
            st.pending_selection = None;
            self.publish(&st);
        }

        tracing::info!(generation, index, "Option selected");
        self.notifier
            .notify(Notification::success("Enhanced image selected!"));
        Ok(Outcome::Applied)
    }

    async fn generate_copy(
        &self,
        processor_id: Option<&str>,
        option_number: u32,
    ) -> Option<ProductCopy> {
        let Some(processor_id) = processor_id else {
            tracing::warn!("No processor id; skipping description generation");
            self.notifier.notify(Notification::warning(
                "A title and description could not be generated for this image.",
            ));
            return None;
        };

        match self.api.describe(processor_id, option_number).await {
            Ok(response) => {
                let copy = response.copy();
                if copy.is_none() {
                    self.notifier.notify(Notification::warning(
                        "No description was generated for this image.",
                    ));
                }
                copy
            }
            Err(e) => {
                let err = AppError::remote("describe", e);
                log_error(&err);
                self.notifier.notify(
                    Notification::from_error(&err)
                        .with_message("Could not generate a title and description."),
                );
                None
            }
        }
    }

    // ---------------------------------------------------------------------
    // Reset, download, search
    // ---------------------------------------------------------------------

    /// Start over. Always legal; in-flight results of the abandoned run are discarded and the
    /// server-side processor is released. Settings and service mode are kept.
    pub async fn reset(&self) {
        let processor_id = {
            let mut st = self.lock();
            let processor_id = st.session.processor_id.take();
            let next = st.session.successor();
            st.generation += 1;
            st.session = next;
            st.compositor = None;
            st.pending_selection = None;
            self.publish(&st);
            processor_id
        };
        tracing::info!("Session reset");

        if let Some(processor_id) = processor_id {
            self.release(&processor_id).await;
        }
    }

    /// Save the enhanced image (watermarked if applied) as PNG into the download directory.
    pub async fn download(&self) -> AppResult<PathBuf> {
        let image = self.lock().session.download_image().cloned();
        let Some(image) = image else {
            return self.fail(AppError::precondition("There is no enhanced image to download."));
        };

        let png = match blocking(move || decode::to_png(&image)).await {
            Ok(png) => png,
            Err(err) => return self.fail(err),
        };
        let file_name = files::enhanced_file_name(Utc::now());
        match files::write_output(&self.config.download_dir, &file_name, &png).await {
            Ok(path) => {
                self.notifier.notify(Notification::success("Image downloaded!"));
                Ok(path)
            }
            Err(err) => self.fail(err),
        }
    }

    /// Search by the generated title (or description) and open the first result.
    ///
    /// Returns `Ok(None)` when the search found nothing.
    pub async fn search_similar_products(&self) -> AppResult<Option<String>> {
        let (generation, query) = {
            let st = self.lock();
            let session = &st.session;
            let query = if !session.generated_title.trim().is_empty() {
                session.generated_title.trim().to_string()
            } else {
                session.generated_description.trim().to_string()
            };
            (st.generation, query)
        };
        if query.is_empty() {
            return self.fail(AppError::precondition(
                "Generate a title or description first to search for similar products.",
            ));
        }

        self.notifier
            .notify(Notification::info("Searching for similar products..."));
        let response = match self.api.search(&query).await {
            Ok(response) => response,
            Err(e) => {
                let err = AppError::remote("search", e);
                log_error(&err);
                self.notifier.notify(
                    Notification::from_error(&err)
                        .with_message("Search failed. Please try again."),
                );
                return Err(err);
            }
        };

        let Some(url) = response.first_link().map(str::to_string) else {
            tracing::info!(query = %query, "Search returned no results");
            self.notifier
                .notify(Notification::warning("No similar products found."));
            return Ok(None);
        };

        {
            let mut st = self.lock();
            if st.generation == generation {
                st.session.search_result_url = Some(url.clone());
            }
        }
        if let Err(e) = self.opener.open(&url) {
            tracing::warn!(url = %url, error = %e, "Failed to open search result");
        }
        self.notifier
            .notify(Notification::success("Similar product found!"));
        Ok(Some(url))
    }

    // ---------------------------------------------------------------------
    // Settings
    // ---------------------------------------------------------------------

    pub fn update_settings(&self, settings: EnhancementSettings) -> AppResult<()> {
        self.modify_settings(|current| *current = settings)
    }

    pub fn set_background_color(&self, color: impl Into<String>) -> AppResult<()> {
        let color = color.into();
        self.modify_settings(|settings| settings.background = Background::Color(color))
    }

    pub fn set_sample_background(&self, id: impl Into<String>, raster: ImageData) -> AppResult<()> {
        let id = id.into();
        self.modify_settings(|settings| settings.background = Background::Sample { id, raster })
    }

    pub fn set_copy_generation(&self, title: bool, description: bool) -> AppResult<()> {
        self.modify_settings(|settings| {
            settings.title_generation = title;
            settings.description_generation = description;
        })
    }

    fn modify_settings(&self, f: impl FnOnce(&mut EnhancementSettings)) -> AppResult<()> {
        {
            let mut st = self.lock();
            if settings_editable(st.session.stage) {
                f(&mut st.session.settings);
                return Ok(());
            }
        }
        self.fail(AppError::precondition(
            "Settings can only be changed before enhancement starts.",
        ))
    }

    /// Generate a background from a prompt and select it.
    pub async fn generate_background(&self, prompt: &str) -> AppResult<Outcome> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return self.fail(AppError::precondition(
                "Please describe the background you want.",
            ));
        }
        self.require_stage(
            &[Stage::Idle, Stage::Loaded],
            "Settings can only be changed before enhancement starts.",
        )?;

        self.notifier
            .notify(Notification::info("Generating background..."));
        let generated = match self.api.generate_background(prompt).await {
            Ok(generated) => generated,
            Err(e) => return self.fail(AppError::remote("generate_background", e)),
        };
        if generated.file_path.trim().is_empty() && generated.public_url.is_none() {
            return self.fail(AppError::remote(
                "generate_background",
                anyhow::anyhow!("response carried neither file_path nor public_url"),
            ));
        }

        let raster = generated
            .image
            .as_deref()
            .filter(|payload| !payload.trim().is_empty())
            .and_then(|payload| match decode::decode_payload(payload) {
                Ok(image) => Some(image),
                Err(e) => {
                    tracing::warn!(error = %e, "Generated background preview is not decodable");
                    None
                }
            });

        let applied = {
            let mut st = self.lock();
            if settings_editable(st.session.stage) {
                st.session.settings.background = Background::Generated {
                    file_path: generated.file_path.clone(),
                    public_url: generated.public_url.clone(),
                    raster,
                };
                true
            } else {
                false
            }
        };
        if !applied {
            tracing::debug!("Discarding generated background: enhancement already started");
            return Ok(Outcome::Discarded);
        }

        self.notifier
            .notify(Notification::success("Background generated!"));
        Ok(Outcome::Applied)
    }

    /// Probe the remote service and record the presentational mode. Never fails.
    pub async fn check_health(&self) -> ServiceMode {
        let mode = match self.api.health().await {
            Ok(status) if status.is_healthy() => ServiceMode::Live,
            Ok(status) => {
                tracing::warn!(status = ?status.status, "Enhancement service reports unhealthy");
                ServiceMode::Offline
            }
            Err(e) => {
                tracing::warn!(error = %e, "Enhancement service health check failed");
                ServiceMode::Offline
            }
        };
        self.lock().session.service_mode = mode;
        mode
    }

    // ---------------------------------------------------------------------
    // Watermark compositor
    // ---------------------------------------------------------------------

    /// Open the watermark editor on the selected enhanced image.
    pub fn open_compositor(&self) -> AppResult<()> {
        let (generation, base) = {
            let st = self.lock();
            (
                st.generation,
                st.session
                    .enhanced_image
                    .as_ref()
                    .map(|option| option.image.bytes.clone()),
            )
        };
        let Some(base) = base else {
            return self.fail(AppError::precondition("Select an enhanced image first."));
        };

        let compositor = Compositor::new(self.config.canvas_width, self.config.canvas_height)
            .and_then(|mut compositor| compositor.load_base(base).map(|()| compositor));
        let compositor = match compositor {
            Ok(compositor) => compositor,
            Err(err) => return self.fail(err),
        };

        let mut st = self.lock();
        if st.generation == generation {
            st.compositor = Some(compositor);
        }
        Ok(())
    }

    pub fn is_compositor_open(&self) -> bool {
        self.lock().compositor.is_some()
    }

    /// Run `f` against the open compositor. Errors are notified like any other failure.
    pub fn edit_compositor<R>(
        &self,
        f: impl FnOnce(&mut Compositor) -> AppResult<R>,
    ) -> AppResult<R> {
        let result = {
            let mut st = self.lock();
            st.compositor.as_mut().map(f)
        };
        match result {
            Some(Ok(value)) => Ok(value),
            Some(Err(err)) => self.fail(err),
            None => self.fail(AppError::precondition("Open the watermark editor first.")),
        }
    }

    /// Store the flattened canvas; [`Workflow::download`] prefers it from now on.
    pub fn apply_watermark(&self) -> AppResult<()> {
        let png = match self.export_canvas() {
            Ok(png) => png,
            Err(err) => return self.fail(err),
        };
        self.lock().session.watermarked_image = Some(ImageData::new(png, "image/png"));
        self.notifier.notify(Notification::success("Watermark applied!"));
        Ok(())
    }

    /// Write the flattened canvas as `watermarked-image.png`.
    pub async fn export_watermark(&self, dir: Option<&Path>) -> AppResult<PathBuf> {
        let png = match self.export_canvas() {
            Ok(png) => png,
            Err(err) => return self.fail(err),
        };
        let dir = dir.unwrap_or(&self.config.download_dir);
        match files::write_output(dir, EXPORT_FILE_NAME, &png).await {
            Ok(path) => Ok(path),
            Err(err) => self.fail(err),
        }
    }

    /// Discard the editor and its overlays.
    pub fn close_compositor(&self) {
        self.lock().compositor = None;
    }

    fn export_canvas(&self) -> AppResult<Vec<u8>> {
        let st = self.lock();
        match &st.compositor {
            Some(compositor) => compositor.export_flattened(),
            None => Err(AppError::precondition("Open the watermark editor first.")),
        }
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, st: &WorkflowState) {
        if let Err(violation) = st.session.check_invariants() {
            tracing::error!(violation = %violation, "Session invariant violated");
        }
        self.progress
            .send_replace(Progress::of(st.generation, &st.session));
    }

    fn require_stage(&self, allowed: &[Stage], message: &str) -> AppResult<()> {
        let stage = self.lock().session.stage;
        if allowed.contains(&stage) {
            Ok(())
        } else {
            self.fail(AppError::precondition(message))
        }
    }

    fn fail<T>(&self, err: AppError) -> AppResult<T> {
        log_error(&err);
        self.notifier.notify(Notification::from_error(&err));
        Err(err)
    }
}

fn settings_editable(stage: Stage) -> bool {
    matches!(stage, Stage::Idle | Stage::Loaded)
}

fn log_error(error: &AppError) {
    let code = error.error_code();
    match error.log_level() {
        LogLevel::Debug => tracing::debug!(error = %error, code, "Operation failed"),
        LogLevel::Warn => tracing::warn!(error = %error, code, "Operation failed"),
        LogLevel::Error => tracing::error!(error = %error, code, "Operation failed"),
    }
}

async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("Blocking task failed: {}", e)))?
}

/// Decode the candidate payloads; undecodable ones are skipped.
async fn decode_candidates(response: &EnhanceResponse) -> AppResult<Vec<EnhancementOption>> {
    let payloads: Vec<(u32, String)> = response
        .candidates()
        .into_iter()
        .map(|(number, payload)| (number, payload.to_string()))
        .collect();

    blocking(move || {
        let options = payloads
            .iter()
            .filter_map(|(number, payload)| {
                let decoded = decode::decode_payload(payload).and_then(|image| {
                    let dimensions = decode::probe_dimensions(&image.bytes)?;
                    Ok((image, dimensions))
                });
                match decoded {
                    Ok((image, dimensions)) => Some(EnhancementOption {
                        option_number: *number,
                        image,
                        dimensions,
                    }),
                    Err(e) => {
                        tracing::warn!(option_number = number, error = %e, "Skipping undecodable candidate");
                        None
                    }
                }
            })
            .take(MAX_OPTIONS)
            .collect();
        Ok(options)
    })
    .await
}
