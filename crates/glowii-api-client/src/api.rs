//! Domain methods and wire types for the enhancement service.

use crate::ApiClient;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Upload response. The enhancement UI receives `{ image }`; the FastAPI backend answers
/// `{ file_path, filename }`; some deployments return the bare reference string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadResponse {
    Image {
        image: String,
    },
    Stored {
        file_path: String,
        #[serde(default)]
        filename: Option<String>,
    },
    Bare(String),
}

impl UploadResponse {
    /// Server-side reference to pass as `image_path` to the enhance call
    pub fn reference(&self) -> &str {
        match self {
            UploadResponse::Image { image } => image,
            UploadResponse::Stored { file_path, .. } => file_path,
            UploadResponse::Bare(reference) => reference,
        }
    }
}

/// Body of `POST /enhance_and_return_all_options`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhanceRequest {
    pub image_path: String,
    pub background: Option<String>,
}

/// Response of `POST /enhance_and_return_all_options`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhanceResponse {
    pub processor_id: String,
    #[serde(default)]
    pub enhanced_image_1: Option<String>,
    #[serde(default)]
    pub enhanced_image_2: Option<String>,
    #[serde(default)]
    pub enhanced_image_3: Option<String>,
}

impl EnhanceResponse {
    /// Non-empty candidate payloads with their 1-based option number, in order.
    pub fn candidates(&self) -> Vec<(u32, &str)> {
        [
            (1, self.enhanced_image_1.as_deref()),
            (2, self.enhanced_image_2.as_deref()),
            (3, self.enhanced_image_3.as_deref()),
        ]
        .into_iter()
        .filter_map(|(n, payload)| match payload {
            Some(p) if !p.trim().is_empty() => Some((n, p)),
            _ => None,
        })
        .collect()
    }
}

/// Response of `POST /choose_image_and_generate_description`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeResponse {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub option_number: Option<u32>,
}

impl DescribeResponse {
    /// Parsed product copy, or `None` when the service returned no description.
    pub fn copy(&self) -> Option<ProductCopy> {
        self.description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(ProductCopy::parse)
    }
}

/// Generated product listing copy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCopy {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ProductCopy {
    /// Parse a description body as structured `{title, description, features, tags}` JSON
    /// (optionally inside a Markdown code fence). Anything else becomes the description verbatim.
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(strip_code_fence(body)) {
            Ok(serde_json::Value::Object(map)) => {
                let text = |key: &str| {
                    map.get(key)
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                        .filter(|s| !s.trim().is_empty())
                };
                let list = |key: &str| -> Vec<String> {
                    map.get(key)
                        .and_then(|v| v.as_array())
                        .map(|items| {
                            items
                                .iter()
                                .filter_map(|i| i.as_str().map(str::to_string))
                                .collect()
                        })
                        .unwrap_or_default()
                };
                ProductCopy {
                    title: text("title"),
                    description: text("description"),
                    features: list("features"),
                    tags: list("tags"),
                }
            }
            _ => ProductCopy {
                description: Some(body.to_string()),
                ..ProductCopy::default()
            },
        }
    }
}

fn strip_code_fence(body: &str) -> &str {
    let trimmed = body.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}

/// Response of `POST /get_search_results`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

impl SearchResponse {
    /// Link of the first result, if it has one.
    pub fn first_link(&self) -> Option<&str> {
        self.results
            .first()
            .map(|r| r.link.as_str())
            .filter(|l| !l.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default, rename = "displayLink")]
    pub display_link: Option<String>,
}

/// Response of `POST /generate_background`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedBackground {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Response of `GET /health`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub active_processors: Option<u64>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        match self.status.as_deref() {
            Some(s) => s.eq_ignore_ascii_case("healthy") || s.eq_ignore_ascii_case("ok"),
            None => true,
        }
    }
}

impl ApiClient {
    /// Upload an image as multipart field `image`.
    pub async fn upload_image(
        &self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<UploadResponse> {
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .with_context(|| format!("Invalid content type: {}", content_type))?;
        let form = reqwest::multipart::Form::new().part("image", part);

        self.post_multipart("/upload", form).await
    }

    /// Run the enhancement pipeline and return all candidates.
    pub async fn enhance_image(&self, request: &EnhanceRequest) -> Result<EnhanceResponse> {
        let response: EnhanceResponse = self
            .post_json("/enhance_and_return_all_options", request)
            .await?;
        tracing::debug!(
            processor_id = %response.processor_id,
            candidates = response.candidates().len(),
            "Enhancement response received"
        );
        Ok(response)
    }

    /// Choose an option (1-based) and generate its listing copy.
    pub async fn choose_image_and_generate_description(
        &self,
        processor_id: &str,
        option_number: u32,
    ) -> Result<DescribeResponse> {
        self.post_query(
            "/choose_image_and_generate_description",
            &[
                ("processor_id", processor_id.to_string()),
                ("option_number", option_number.to_string()),
            ],
        )
        .await
    }

    /// Search for similar products.
    pub async fn search_products(&self, query: &str) -> Result<SearchResponse> {
        self.post_query("/get_search_results", &[("query", query.to_string())])
            .await
    }

    /// Generate a background image from a prompt.
    pub async fn generate_background_image(&self, prompt: &str) -> Result<GeneratedBackground> {
        self.post_query("/generate_background", &[("promptFromUser", prompt.to_string())])
            .await
    }

    pub async fn health_check(&self) -> Result<HealthStatus> {
        self.get("/health", &[]).await
    }

    /// Release the server-side processor of a run.
    pub async fn cleanup_processor(&self, processor_id: &str) -> Result<()> {
        self.delete(&format!("/cleanup/{}", urlencoding::encode(processor_id)))
            .await
    }
}
