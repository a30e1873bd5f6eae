use super::types::*;
use crate::error::GcpError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Vertex AI generateContent client
pub struct VertexClient {
    access_token: String,
    project_id: String,
    region: String,
    base_url: String,
    http_client: reqwest::Client,
}

impl VertexClient {
    pub fn new(
        project_id: impl Into<String>,
        region: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, GcpError> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(GcpError::authentication("Access token cannot be empty"));
        }

        let project_id = project_id.into();
        if project_id.is_empty() {
            return Err(GcpError::invalid_request("Project id cannot be empty"));
        }

        let region = region.into();
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| GcpError::Network { source: e })?;

        Ok(Self {
            access_token,
            project_id,
            base_url: format!("https://{}-aiplatform.googleapis.com", region),
            region,
            http_client,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, GcpError> {
        self.http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GcpError::Network { source: e })?;
        Ok(self)
    }

    pub async fn generate_content(
        &self,
        model: impl Into<String>,
        request: VertexGenerateContentRequest,
    ) -> Result<VertexGenerateContentResponse, GcpError> {
        let model = model.into();
        let url = format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.base_url, self.project_id, self.region, model
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.access_token)).map_err(|e| {
                GcpError::authentication(format!("Invalid access token format: {}", e))
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(%model, "Sending generateContent request");

        let response = self
            .http_client
            .post(&url)
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(|e| GcpError::Network { source: e })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            if let Ok(error_response) = serde_json::from_str::<VertexErrorResponse>(&error_body) {
                return Err(Self::map_error(
                    error_response.error.code,
                    error_response.error.message,
                ));
            }

            return Err(GcpError::api_error(status.as_u16(), error_body));
        }

        let generate_response = response
            .json::<VertexGenerateContentResponse>()
            .await
            .map_err(|e| GcpError::internal(format!("Failed to parse response: {}", e)))?;

        Ok(generate_response)
    }

    fn map_error(status: u16, message: String) -> GcpError {
        match status {
            400 => GcpError::invalid_request(message),
            401 | 403 => GcpError::Authentication { message },
            429 => GcpError::rate_limit(message, None),
            _ => GcpError::api_error(status, message),
        }
    }

    pub fn message_builder(&self) -> super::builder::MessageBuilder<'_> {
        super::builder::MessageBuilder::new(self)
    }
}
