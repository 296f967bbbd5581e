use anyhow::Result;
use async_trait::async_trait;

use crate::api::{
    DescribeResponse, EnhanceRequest, EnhanceResponse, GeneratedBackground, HealthStatus,
    SearchResponse, UploadResponse,
};
use crate::ApiClient;

/// Remote operations the enhancement workflow depends on.
///
/// Implemented by [`ApiClient`]; tests substitute an in-memory double.
#[async_trait]
pub trait EnhancementService: Send + Sync {
    async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<UploadResponse>;

    async fn enhance(&self, request: &EnhanceRequest) -> Result<EnhanceResponse>;

    /// `option_number` is 1-based.
    async fn describe(&self, processor_id: &str, option_number: u32) -> Result<DescribeResponse>;

    async fn search(&self, query: &str) -> Result<SearchResponse>;

    async fn generate_background(&self, prompt: &str) -> Result<GeneratedBackground>;

    async fn health(&self) -> Result<HealthStatus>;

    async fn cleanup(&self, processor_id: &str) -> Result<()>;
}

#[async_trait]
impl EnhancementService for ApiClient {
    async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<UploadResponse> {
        self.upload_image(file_name, content_type, data).await
    }

    async fn enhance(&self, request: &EnhanceRequest) -> Result<EnhanceResponse> {
        self.enhance_image(request).await
    }

    async fn describe(&self, processor_id: &str, option_number: u32) -> Result<DescribeResponse> {
        self.choose_image_and_generate_description(processor_id, option_number)
            .await
    }

    async fn search(&self, query: &str) -> Result<SearchResponse> {
        self.search_products(query).await
    }

    async fn generate_background(&self, prompt: &str) -> Result<GeneratedBackground> {
        self.generate_background_image(prompt).await
    }

    async fn health(&self) -> Result<HealthStatus> {
        self.health_check().await
    }

    async fn cleanup(&self, processor_id: &str) -> Result<()> {
        self.cleanup_processor(processor_id).await
    }
}
