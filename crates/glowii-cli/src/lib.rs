use glowii_core::Session;
use serde::Serialize;

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// JSON view of a session; image payloads are reduced to their sizes.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub stage: glowii_core::Stage,
    pub file_name: Option<String>,
    pub uploaded_reference: Option<String>,
    pub processor_id: Option<String>,
    pub options: Vec<OptionSummary>,
    pub selected_option: Option<usize>,
    pub watermarked: bool,
    pub title: String,
    pub description: String,
    pub features: Vec<String>,
    pub tags: Vec<String>,
    pub search_result_url: Option<String>,
    pub service_mode: glowii_core::ServiceMode,
}

#[derive(Debug, Serialize)]
pub struct OptionSummary {
    pub option_number: u32,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            stage: session.stage,
            file_name: session.original_file_name.clone(),
            uploaded_reference: session.uploaded_reference.clone(),
            processor_id: session.processor_id.clone(),
            options: session
                .options
                .iter()
                .map(|o| OptionSummary {
                    option_number: o.option_number,
                    width: o.dimensions.width,
                    height: o.dimensions.height,
                    bytes: o.image.len(),
                })
                .collect(),
            selected_option: session.selected_option_index,
            watermarked: session.watermarked_image.is_some(),
            title: session.generated_title.clone(),
            description: truncate_string(&session.generated_description, 500),
            features: session.generated_features.clone(),
            tags: session.generated_tags.clone(),
            search_result_url: session.search_result_url.clone(),
            service_mode: session.service_mode,
        }
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
