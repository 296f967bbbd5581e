//! Session model: the client-visible state of one enhancement run

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Dimensions, EnhancementOption, EnhancementSettings, ImageData, ServiceMode};

/// Maximum number of candidates the enhancement service returns
pub const MAX_OPTIONS: usize = 3;

/// Lifecycle stage of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Idle,
    Loaded,
    Processing,
    Selecting,
    Finalized,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::Loaded => "loaded",
            Stage::Processing => "processing",
            Stage::Selecting => "selecting",
            Stage::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

/// Sub-phase of [`Stage::Processing`]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStep {
    #[default]
    NotStarted,
    Analysis,
    Decision,
    Application,
    Finalization,
}

impl ProcessingStep {
    /// Ordinal 0–4
    pub fn ordinal(self) -> u8 {
        match self {
            ProcessingStep::NotStarted => 0,
            ProcessingStep::Analysis => 1,
            ProcessingStep::Decision => 2,
            ProcessingStep::Application => 3,
            ProcessingStep::Finalization => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProcessingStep::NotStarted => "Waiting",
            ProcessingStep::Analysis => "Analyzing product",
            ProcessingStep::Decision => "Choosing enhancements",
            ProcessingStep::Application => "Applying enhancements",
            ProcessingStep::Finalization => "Finalizing",
        }
    }
}

/// One enhancement run's state
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub stage: Stage,
    pub processing_step: ProcessingStep,
    pub original_image: Option<ImageData>,
    pub original_dimensions: Option<Dimensions>,
    pub original_file_name: Option<String>,
    /// Server-side reference returned by the upload call
    pub uploaded_reference: Option<String>,
    /// Processor id correlating this run across describe/cleanup calls
    pub processor_id: Option<String>,
    pub options: Vec<EnhancementOption>,
    pub selected_option_index: Option<usize>,
    pub enhanced_image: Option<EnhancementOption>,
    /// Flattened compositor output, preferred over `enhanced_image` for download
    pub watermarked_image: Option<ImageData>,
    pub generated_title: String,
    pub generated_description: String,
    pub generated_features: Vec<String>,
    pub generated_tags: Vec<String>,
    pub search_result_url: Option<String>,
    pub settings: EnhancementSettings,
    pub service_mode: ServiceMode,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: Stage::Idle,
            processing_step: ProcessingStep::NotStarted,
            original_image: None,
            original_dimensions: None,
            original_file_name: None,
            uploaded_reference: None,
            processor_id: None,
            options: Vec::new(),
            selected_option_index: None,
            enhanced_image: None,
            watermarked_image: None,
            generated_title: String::new(),
            generated_description: String::new(),
            generated_features: Vec::new(),
            generated_tags: Vec::new(),
            search_result_url: None,
            settings: EnhancementSettings::default(),
            service_mode: ServiceMode::Unknown,
        }
    }

    /// Fresh session carrying over only what outlives a run (settings, service mode).
    pub fn successor(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            service_mode: self.service_mode,
            ..Self::new()
        }
    }

    pub fn has_generated_copy(&self) -> bool {
        !self.generated_title.trim().is_empty() || !self.generated_description.trim().is_empty()
    }

    /// Bytes offered for download: the watermarked raster if one was applied.
    pub fn download_image(&self) -> Option<&ImageData> {
        self.watermarked_image
            .as_ref()
            .or_else(|| self.enhanced_image.as_ref().map(|o| &o.image))
    }

    /// Check the stage/data invariants. Returns a description of the first violation.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.selected_option_index.is_some() != (self.stage == Stage::Finalized) {
            return Err(format!(
                "selected_option_index is {:?} in stage {}",
                self.selected_option_index, self.stage
            ));
        }

        let options_allowed = matches!(self.stage, Stage::Selecting | Stage::Finalized);
        if !self.options.is_empty() && !options_allowed {
            return Err(format!(
                "{} options present in stage {}",
                self.options.len(),
                self.stage
            ));
        }

        if self.options.len() > MAX_OPTIONS {
            return Err(format!("{} options exceed maximum", self.options.len()));
        }

        if self.stage != Stage::Processing && self.processing_step != ProcessingStep::NotStarted {
            return Err(format!(
                "processing step {:?} outside processing stage ({})",
                self.processing_step, self.stage
            ));
        }

        if let Some(index) = self.selected_option_index {
            if index >= self.options.len() {
                return Err(format!("selected option {} out of range", index));
            }
            if self.enhanced_image.as_ref() != self.options.get(index) {
                return Err("enhanced image does not match selected option".to_string());
            }
        }

        if self.stage != Stage::Idle && self.original_image.is_none() {
            return Err(format!("stage {} without an original image", self.stage));
        }

        Ok(())
    }
}
