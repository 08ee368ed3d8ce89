//! HTTP adapters for image, speech and text services.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use storyreel_media::MediaInspector;
use storyreel_models::encoding::{TARGET_HEIGHT, TARGET_WIDTH};
use storyreel_models::Voice;

use super::{
    CapabilityError, CapabilityResult, GeneratedImage, ImageGenerator, ImageRequest,
    SpeechSynthesizer, SynthesizedSpeech, TextSource,
};
use crate::config::CapabilityEndpoints;
use crate::retry::{retry_async_if, RetryConfig};

/// Response header carrying the synthesized audio duration in seconds.
pub const AUDIO_DURATION_HEADER: &str = "x-audio-duration";

fn build_client(timeout: Duration) -> CapabilityResult<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

fn retry_config(operation: &str, max_retries: u32) -> RetryConfig {
    RetryConfig::new(operation)
        .with_max_retries(max_retries)
        .with_base_delay(Duration::from_millis(500))
}

fn authorize(request: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
    match api_key {
        Some(key) => request.bearer_auth(key),
        None => request,
    }
}

/// Turn a non-success response into [`CapabilityError::Status`] with its body.
async fn ensure_success(service: &'static str, response: Response) -> CapabilityResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(CapabilityError::Status {
        service,
        status,
        body,
    })
}

async fn check_health_endpoint(
    http: &Client,
    service: &'static str,
    base_url: &str,
) -> CapabilityResult<()> {
    let response = http.get(format!("{}/health", base_url)).send().await?;
    ensure_success(service, response).await.map(|_| ())
}

/// Prompt sent to the image service.
pub fn build_image_prompt(request: &ImageRequest) -> String {
    let mut prompt = format!(
        "{} illustration for the {} romance story \"{}\"",
        request.style.as_str().replace('_', " "),
        request.category,
        request.title
    );
    if let Some(scene) = &request.scene {
        prompt.push_str(". Scene: ");
        prompt.push_str(scene);
    }
    prompt.push_str(". Vertical 9:16 composition, no text or lettering.");
    prompt
}

#[derive(Debug, Serialize)]
struct ImageApiRequest<'a> {
    prompt: &'a str,
    style: &'a str,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct ImageApiResponse {
    image_url: String,
    model: String,
    #[serde(default)]
    revised_prompt: Option<String>,
}

/// Image generation service client.
pub struct HttpImageGenerator {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl HttpImageGenerator {
    pub fn new(endpoints: &CapabilityEndpoints) -> CapabilityResult<Self> {
        Ok(Self {
            http: build_client(endpoints.timeout)?,
            base_url: endpoints.image_url.trim_end_matches('/').to_string(),
            api_key: endpoints.api_key.clone(),
            retry: retry_config("image_generation", endpoints.max_retries),
        })
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    async fn generate(&self, request: &ImageRequest, output: &Path) -> CapabilityResult<GeneratedImage> {
        let prompt = build_image_prompt(request);
        let url = format!("{}/v1/images", self.base_url);
        let body = ImageApiRequest {
            prompt: &prompt,
            style: request.style.as_str(),
            width: TARGET_WIDTH,
            height: TARGET_HEIGHT,
        };

        debug!("Requesting image from {}", url);
        let generated: ImageApiResponse =
            retry_async_if(&self.retry, CapabilityError::is_retryable, || async {
                let response = authorize(self.http.post(&url), self.api_key.as_deref())
                    .json(&body)
                    .send()
                    .await?;
                Ok::<_, CapabilityError>(
                    ensure_success("image", response)
                        .await?
                        .json::<ImageApiResponse>()
                        .await?,
                )
            })
            .await
            .into_result()?;

        let bytes = retry_async_if(&self.retry, CapabilityError::is_retryable, || async {
            let response = self.http.get(&generated.image_url).send().await?;
            Ok::<_, CapabilityError>(ensure_success("image download", response).await?.bytes().await?)
        })
        .await
        .into_result()?;

        if bytes.is_empty() {
            return Err(CapabilityError::invalid_response("image service returned an empty image"));
        }
        tokio::fs::write(output, &bytes).await?;

        Ok(GeneratedImage {
            path: output.to_path_buf(),
            prompt: generated.revised_prompt.unwrap_or(prompt),
            model: generated.model,
        })
    }

    async fn check_health(&self) -> CapabilityResult<()> {
        check_health_endpoint(&self.http, "image", &self.base_url).await
    }
}

#[derive(Debug, Serialize)]
struct SpeechApiRequest<'a> {
    text: &'a str,
    voice: &'a str,
}

/// Speech synthesis service client.
///
/// The service answers with raw audio; duration comes from the
/// [`AUDIO_DURATION_HEADER`] header when present, otherwise from inspection.
pub struct HttpSpeechSynthesizer {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
    inspector: Arc<dyn MediaInspector>,
}

impl HttpSpeechSynthesizer {
    pub fn new(
        endpoints: &CapabilityEndpoints,
        inspector: Arc<dyn MediaInspector>,
    ) -> CapabilityResult<Self> {
        Ok(Self {
            http: build_client(endpoints.timeout)?,
            base_url: endpoints.speech_url.trim_end_matches('/').to_string(),
            api_key: endpoints.api_key.clone(),
            retry: retry_config("speech_synthesis", endpoints.max_retries),
            inspector,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: Voice,
        output: &Path,
    ) -> CapabilityResult<SynthesizedSpeech> {
        let url = format!("{}/v1/speech", self.base_url);
        let body = SpeechApiRequest {
            text,
            voice: voice.as_str(),
        };

        let (bytes, header_duration) =
            retry_async_if(&self.retry, CapabilityError::is_retryable, || async {
                let response = authorize(self.http.post(&url), self.api_key.as_deref())
                    .json(&body)
                    .send()
                    .await?;
                let response = ensure_success("speech", response).await?;
                let duration = response
                    .headers()
                    .get(AUDIO_DURATION_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<f64>().ok());
                Ok::<_, CapabilityError>((response.bytes().await?, duration))
            })
            .await
            .into_result()?;

        if bytes.is_empty() {
            return Err(CapabilityError::invalid_response("speech service returned no audio"));
        }
        tokio::fs::write(output, &bytes).await?;

        let duration_secs = match header_duration {
            Some(d) if d > 0.0 => d,
            _ => self.inspector.inspect(output).await?.duration,
        };

        Ok(SynthesizedSpeech {
            path: output.to_path_buf(),
            duration_secs,
        })
    }

    async fn check_health(&self) -> CapabilityResult<()> {
        check_health_endpoint(&self.http, "speech", &self.base_url).await
    }
}

/// Fetches story text over HTTP.
pub struct HttpTextSource {
    http: Client,
    retry: RetryConfig,
}

impl HttpTextSource {
    pub fn new(endpoints: &CapabilityEndpoints) -> CapabilityResult<Self> {
        Ok(Self {
            http: build_client(endpoints.timeout)?,
            retry: retry_config("text_retrieval", endpoints.max_retries),
        })
    }
}

#[async_trait]
impl TextSource for HttpTextSource {
    async fn fetch(&self, url: &str) -> CapabilityResult<String> {
        retry_async_if(&self.retry, CapabilityError::is_retryable, || async {
            let response = self.http.get(url).send().await?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(CapabilityError::NotFound(url.to_string()));
            }
            Ok(ensure_success("text", response).await?.text().await?)
        })
        .await
        .into_result()
    }
}
