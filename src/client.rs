use std::env;
use std::time::{Duration, Instant};

use futures::{Stream, TryFutureExt};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, CLIENT_VERIFICATIONS, STREAM_TTFB,
};
use crate::sse;
use crate::transport::{self, FragmentStream, Transport};
use crate::types::{ChatCompletionRequest, ModelList, Provider, Turn};

/// Environment variable consulted when no key is passed explicitly.
pub const API_KEY_ENV: &str = "PARLEY_API_KEY";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_APP_TITLE: &str = "parley";
const DEFAULT_REFERER: &str = "https://crates.io/crates/parley";
const REFERER_HEADER: &str = "HTTP-Referer";

/// Knobs for [`ChatClient::with_options`].
///
/// Anything left unset falls back to the [`Provider`] preset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientOptions {
    provider: Provider,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    timeout: Option<Duration>,
    app_title: Option<String>,
    referer: Option<String>,
}

impl ClientOptions {
    /// Options for the given provider preset.
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }

    /// Override the preset's base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Override the preset's model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature; `None` leaves it to the endpoint.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the connect and request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the application title sent to providers that show attribution.
    pub fn with_app_title(mut self, title: impl Into<String>) -> Self {
        self.app_title = Some(title.into());
        self
    }

    /// Set the referer sent to providers that show attribution.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// The provider preset.
    pub fn provider(&self) -> Provider {
        self.provider
    }
}

/// Client for OpenAI-compatible chat completion endpoints.
#[derive(Debug, Clone)]
pub struct ChatClient {
    api_key: String,
    client: ReqwestClient,
    base_url: Url,
    model: String,
    temperature: Option<f32>,
    timeout: Duration,
    app_title: Option<String>,
    referer: Option<String>,
}

impl ChatClient {
    /// Create a new client for the default provider.
    ///
    /// The API key can be provided directly or read from the PARLEY_API_KEY
    /// environment variable.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, ClientOptions::default())
    }

    /// Create a new client with custom settings.
    pub fn with_options(api_key: Option<String>, options: ClientOptions) -> Result<Self> {
        let api_key = match api_key {
            Some(key) if !key.trim().is_empty() => key.trim().to_string(),
            Some(_) => return Err(Error::configuration("API key is empty")),
            None => env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    Error::configuration(format!(
                        "API key not provided and {API_KEY_ENV} environment variable not set"
                    ))
                })?,
        };

        let base_url = options
            .base_url
            .as_deref()
            .unwrap_or(options.provider.base_url());
        let base_url = normalize_base_url(base_url)?;

        let timeout = options.timeout.unwrap_or(DEFAULT_TIMEOUT);
        // Replies can stream for longer than the timeout, so only connecting is bounded here.
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        let (app_title, referer) = if options.provider.wants_attribution() {
            (
                Some(
                    options
                        .app_title
                        .unwrap_or_else(|| DEFAULT_APP_TITLE.to_string()),
                ),
                Some(
                    options
                        .referer
                        .unwrap_or_else(|| DEFAULT_REFERER.to_string()),
                ),
            )
        } else {
            (options.app_title, options.referer)
        };

        Ok(Self {
            api_key,
            client,
            base_url,
            model: options
                .model
                .unwrap_or_else(|| options.provider.default_model().to_string()),
            temperature: options.temperature,
            timeout,
            app_title,
            referer,
        })
    }

    /// The model requested for every completion.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The endpoint root, always ending in a slash.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| Error::configuration("API key contains characters not allowed in a header"))?;
        bearer.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, bearer);
        if let Some(title) = &self.app_title
            && let Ok(value) = HeaderValue::from_str(title)
        {
            headers.insert("X-Title", value);
        }
        if let Some(referer) = &self.referer
            && let Ok(value) = HeaderValue::from_str(referer)
        {
            headers.insert(REFERER_HEADER, value);
        }
        Ok(headers)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn map_request_error(&self, e: reqwest::Error) -> Error {
        CLIENT_REQUEST_ERRORS.click();
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        CLIENT_REQUEST_ERRORS.click();
        let status_code = response.status().as_u16();

        // Get headers we might need for error processing
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|val| val.to_str().ok())
            .map(String::from);

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        Error::from_status(status_code, &error_body, request_id, retry_after)
    }

    /// List the models the credential can see.
    pub async fn list_models(&self) -> Result<ModelList> {
        let url = self.endpoint("models")?;
        tracing::debug!(%url, "listing models");
        CLIENT_REQUESTS.click();

        let response = self
            .client
            .get(url)
            .headers(self.default_headers()?)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        response.json::<ModelList>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {e}"),
                Some(Box::new(e)),
            )
        })
    }

    /// Send a streaming completion request and return its text fragments.
    pub async fn stream(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<impl Stream<Item = Result<String>> + Send + 'static + use<>> {
        request.stream = true;
        let url = self.endpoint("chat/completions")?;

        let mut headers = self.default_headers()?;
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );

        tracing::debug!(
            %url,
            model = %request.model,
            turns = request.messages.len(),
            "requesting completion"
        );
        CLIENT_REQUESTS.click();
        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        if !response.status().is_success() {
            let err = Self::process_error_response(response).await;
            tracing::debug!(error = %err, "completion request rejected");
            return Err(err);
        }
        STREAM_TTFB.add(start.elapsed().as_secs_f64());

        Ok(sse::text_fragments(sse::process_sse(response.bytes_stream())))
    }
}

#[async_trait::async_trait]
impl Transport for ChatClient {
    fn complete(&self, turns: &[Turn]) -> FragmentStream {
        if let Err(err) = transport::validate_turns(turns) {
            return transport::failed(err);
        }
        let client = self.clone();
        let request = ChatCompletionRequest::streaming(self.model.clone(), turns.to_vec())
            .with_temperature(self.temperature);
        Box::pin(async move { client.stream(request).await }.try_flatten_stream())
    }

    async fn verify(&self) -> Result<()> {
        CLIENT_VERIFICATIONS.click();
        let models = self.list_models().await?;
        if !models.contains(&self.model) {
            tracing::debug!(model = %self.model, "model not listed by endpoint");
        }
        Ok(())
    }
}

/// Parse `base_url` and make sure joining a relative path appends to it.
fn normalize_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url.trim())?;
    if url.cannot_be_a_base() {
        return Err(Error::url(format!("{base_url} cannot be a base URL"), None));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
