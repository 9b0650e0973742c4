use super::types::*;
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Response,
};
use serde_json::Value;

#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Creates a new HTTP client.
    ///
    /// The chat service is local, so no proxy is ever used.
    fn create_client(&self) -> Result<Client, String>;

    /// Sends a POST request with the given configuration, supporting both
    /// regular and streaming responses.
    ///
    /// # Arguments
    /// * `config` - The API configuration including URL and authentication
    /// * `endpoint` - The API endpoint to send the request to
    /// * `body` - The request body as JSON
    /// * `stream` - Whether to handle the response as a stream
    ///
    /// # Returns
    /// A Result containing either the ApiResponse or an error message
    async fn post_request(
        &self,
        config: &ApiConfig,
        endpoint: &str,
        body: Value,
        stream: bool,
    ) -> Result<ApiResponse, String>;
}

#[derive(Clone)]
pub struct DefaultApiClient {
    error_format: ErrorFormat,
}

impl DefaultApiClient {
    /// Creates a new instance of DefaultApiClient
    pub fn new(error_format: ErrorFormat) -> Self {
        Self { error_format }
    }

    /// Builds the request headers from the configuration
    fn build_headers(&self, config: &ApiConfig) -> Result<HeaderMap, String> {
        let mut headers = HeaderMap::new();

        // Add API key if present and not empty
        if let Some(api_key) =
            config
                .api_key
                .as_ref()
                .and_then(|k| if k.is_empty() { None } else { Some(k) })
        {
            headers.insert(
                HeaderName::from_static("authorization"),
                HeaderValue::from_str(&format!("Bearer {}", api_key))
                    .map_err(|e| format!("invalid header value: {}", e))?,
            );
        }

        headers.insert(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/json"),
        );

        // Add custom headers if present
        if let Some(custom_headers) = &config.headers {
            if let Some(obj) = custom_headers.as_object() {
                for (key, value) in obj {
                    if let Some(value_str) = value.as_str() {
                        let header_name = HeaderName::from_bytes(key.as_bytes())
                            .map_err(|e| format!("invalid header name {}: {}", key, e))?;
                        headers.insert(
                            header_name,
                            HeaderValue::from_str(value_str)
                                .map_err(|e| format!("invalid header value: {}", e))?,
                        );
                    }
                }
            }
        }

        Ok(headers)
    }

    /// Processes the response and handles any errors
    async fn process_response(
        &self,
        response: Response,
        stream: bool,
    ) -> Result<ApiResponse, String> {
        let status = response.status();

        if !status.is_success() {
            return self.process_error_response(response).await;
        }

        if stream {
            Ok(ApiResponse::success_stream(response))
        } else {
            let content = response
                .text()
                .await
                .map_err(|e| format!("failed to read response body: {}", e))?;

            Ok(ApiResponse::success(content))
        }
    }

    async fn process_error_response(&self, response: Response) -> Result<ApiResponse, String> {
        let status_code = response.status().as_u16();
        let inner_type = response
            .status()
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_owned();
        let error_text = response
            .text()
            .await
            .map_err(|e| format!("failed to read response body: {}", e))?;

        let error_message =
            if let Some((mut error_type, message)) = self.error_format.parse_error(&error_text) {
                if error_type.is_empty() {
                    error_type = inner_type;
                }
                log::warn!(
                    "Error response - Status: {}, Type: {}, Message: {}",
                    status_code,
                    error_type,
                    message
                );
                format!("request failed ({} {}): {}", status_code, error_type, message)
            } else {
                format!("request failed ({}): {}", status_code, error_text)
            };

        Ok(ApiResponse::error(error_message))
    }
}

#[async_trait]
impl ApiClient for DefaultApiClient {
    fn create_client(&self) -> Result<Client, String> {
        Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| format!("failed to build http client: {}", e))
    }

    async fn post_request(
        &self,
        config: &ApiConfig,
        endpoint: &str,
        body: Value,
        stream: bool,
    ) -> Result<ApiResponse, String> {
        let client = self.create_client()?;
        let headers = self.build_headers(config)?;

        let url = if endpoint.is_empty() {
            config.api_url.as_deref().unwrap_or_default().to_string()
        } else {
            let base_url = config
                .api_url
                .as_deref()
                .unwrap_or_default()
                .trim_end_matches('/');
            if !endpoint.starts_with('/') {
                format!("{}/{}", base_url, endpoint)
            } else {
                format!("{}{}", base_url, endpoint)
            }
        };

        #[cfg(debug_assertions)]
        log::debug!("Request URL: {}", url);

        let response = client
            .post(url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        self.process_response(response, stream).await
    }
}
