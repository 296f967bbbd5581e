use serde::{Deserialize, Serialize};

use super::ImageData;

/// Background requested for the enhanced product image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Background {
    /// A fixed named color (`white`, `black`)
    Color(String),
    /// One of the bundled sample backgrounds
    Sample { id: String, raster: ImageData },
    /// A background generated remotely from a user prompt
    Generated {
        file_path: String,
        public_url: Option<String>,
        raster: Option<ImageData>,
    },
}

impl Default for Background {
    fn default() -> Self {
        Background::Color("white".to_string())
    }
}

impl Background {
    /// Value sent as `background` in the enhance request.
    pub fn request_value(&self) -> String {
        match self {
            Background::Color(name) => name.clone(),
            Background::Sample { id, .. } => id.clone(),
            Background::Generated {
                file_path,
                public_url,
                ..
            } => public_url.clone().unwrap_or_else(|| file_path.clone()),
        }
    }
}

/// User-selected options for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancementSettings {
    pub background: Background,
    pub title_generation: bool,
    pub description_generation: bool,
}

impl Default for EnhancementSettings {
    fn default() -> Self {
        Self {
            background: Background::default(),
            title_generation: true,
            description_generation: true,
        }
    }
}

impl EnhancementSettings {
    pub fn wants_copy(&self) -> bool {
        self.title_generation || self.description_generation
    }
}

/// Presentational mode derived from the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    #[default]
    Unknown,
    Live,
    Offline,
}
