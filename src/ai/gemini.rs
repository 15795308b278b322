//! Gemini REST implementation of [`ContentGenerator`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::prompts;
use super::{ensure_api_key, image_aspect_ratio, video_aspect_ratio, ContentGenerator};
use crate::carousel::data_uri::DataUri;
use crate::carousel::model::{
    AspectRatio, Carousel, DesignPreferences, PreferencesUpdate, Slide, SlideContent, SlidePart,
};
use crate::error::{classify_api_error, classify_video_error, CarouselError, CarouselResult};
use crate::settings::AppSettings;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const IMAGE_MODEL: &str = "imagen-4.0-generate-001";
pub const EDIT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const VIDEO_MODEL: &str = "veo-3.0-fast-generate-001";

const VIDEO_POLL_INTERVAL: Duration = Duration::from_secs(10);
const API_KEY_HEADER: &str = "x-goog-api-key";

type Classifier = fn(Option<u16>, &str) -> CarouselError;

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum RequestPart {
    Text(String),
    #[serde(rename_all = "camelCase")]
    InlineData { mime_type: String, data: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PredictResponse {
    predictions: Vec<Prediction>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Operation {
    name: String,
    done: bool,
    error: Option<OperationError>,
    response: Option<OperationResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OperationError {
    code: Option<u16>,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct OperationResponse {
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GenerateVideoResponse {
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeneratedSample {
    video: Option<VideoRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VideoRef {
    uri: Option<String>,
}

// =============================================================================
// RESPONSE EXTRACTION
// =============================================================================

fn response_parts(response: &GenerateContentResponse) -> impl Iterator<Item = &ResponsePart> {
    response
        .candidates
        .iter()
        .filter_map(|c| c.content.as_ref())
        .flat_map(|c| c.parts.iter())
}

fn response_text(response: &GenerateContentResponse) -> CarouselResult<String> {
    let text: String = response_parts(response)
        .filter_map(|p| p.text.as_deref())
        .collect();
    if text.trim().is_empty() {
        return Err(CarouselError::unknown("AI returned an empty response."));
    }
    Ok(text)
}

fn response_image(response: &GenerateContentResponse) -> CarouselResult<String> {
    response_parts(response)
        .filter_map(|p| p.inline_data.as_ref())
        .find(|d| !d.data.is_empty())
        .map(|d| {
            let mime = if d.mime_type.is_empty() { "image/png" } else { d.mime_type.as_str() };
            format!("data:{};base64,{}", mime, d.data)
        })
        .ok_or(CarouselError::NoImageReturned)
}

fn prediction_image(response: &PredictResponse) -> CarouselResult<String> {
    response
        .predictions
        .iter()
        .find_map(|p| {
            let data = p.bytes_base64_encoded.as_deref().filter(|d| !d.is_empty())?;
            let mime = p.mime_type.as_deref().unwrap_or("image/png");
            Some(format!("data:{};base64,{}", mime, data))
        })
        .ok_or(CarouselError::NoImageReturned)
}

fn operation_video_uri(operation: &Operation) -> CarouselResult<String> {
    if let Some(err) = &operation.error {
        return Err(classify_video_error(err.code, &err.message));
    }
    operation
        .response
        .as_ref()
        .and_then(|r| r.generate_video_response.as_ref())
        .and_then(|r| r.generated_samples.first())
        .and_then(|s| s.video.as_ref())
        .and_then(|v| v.uri.clone())
        .ok_or_else(|| CarouselError::unknown("Video generation finished without a video."))
}

// =============================================================================
// CLIENT
// =============================================================================

/// Gemini API client.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    poll_interval: Duration,
}

impl GeminiClient {
    pub fn new() -> CarouselResult<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Client against a different endpoint (proxies, tests).
    pub fn with_base_url(base_url: &str) -> CarouselResult<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval: VIDEO_POLL_INTERVAL,
        })
    }

    /// Builder: Set how often a running video operation is polled.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        classify: Classifier,
    ) -> CarouselResult<reqwest::Response> {
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify(Some(status.as_u16()), &body));
        }
        Ok(resp)
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        settings: &AppSettings,
        path: &str,
        body: &B,
        classify: Classifier,
    ) -> CarouselResult<R> {
        ensure_api_key(settings)?;
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "gemini request");
        let request = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, settings.api_key.trim())
            .json(body);
        let resp = self.send(request, classify).await?;
        Ok(resp.json().await?)
    }

    async fn generate_text(
        &self,
        settings: &AppSettings,
        prompt: String,
        schema: Option<Value>,
    ) -> CarouselResult<String> {
        let system_prompt = settings.system_prompt.trim();
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                role: Some("user"),
                parts: vec![RequestPart::Text(prompt)],
            }],
            system_instruction: (!system_prompt.is_empty()).then(|| RequestContent {
                role: None,
                parts: vec![RequestPart::Text(system_prompt.to_string())],
            }),
            generation_config: schema.map(|schema| GenerationConfig {
                response_mime_type: Some("application/json"),
                response_schema: Some(schema),
                response_modalities: None,
            }),
        };
        let path = format!("models/{}:generateContent", settings.ai_model.as_str());
        let response: GenerateContentResponse =
            self.post(settings, &path, &request, classify_api_error).await?;
        response_text(&response)
    }

    async fn poll_operation(&self, settings: &AppSettings, name: &str) -> CarouselResult<Operation> {
        let url = format!("{}/{}", self.base_url, name);
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let request = self
                .client
                .get(&url)
                .header(API_KEY_HEADER, settings.api_key.trim());
            let operation: Operation = self.send(request, classify_video_error).await?.json().await?;
            debug!(operation = %name, done = operation.done, "polled video operation");
            if operation.done {
                return Ok(operation);
            }
        }
    }

    async fn download_video(&self, settings: &AppSettings, uri: &str) -> CarouselResult<String> {
        let request = self
            .client
            .get(uri)
            .query(&[("key", settings.api_key.trim())]);
        let resp = self.send(request, classify_video_error).await?;
        let mime = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("video/"))
            .unwrap_or("video/mp4")
            .to_string();
        let bytes = resp.bytes().await?;
        Ok(DataUri::encode(&mime, &bytes))
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate_carousel_content(
        &self,
        settings: &AppSettings,
        topic: &str,
        niche: &str,
        preferences: &DesignPreferences,
    ) -> CarouselResult<Vec<SlideContent>> {
        let prompt = prompts::carousel_content_prompt(topic, niche, preferences);
        let text = self
            .generate_text(settings, prompt, Some(prompts::carousel_content_schema()))
            .await?;
        let slides = prompts::parse_slide_contents(&text)?;
        info!(topic, slides = slides.len(), "generated carousel content");
        Ok(slides)
    }

    async fn generate_image(
        &self,
        settings: &AppSettings,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> CarouselResult<String> {
        let body = serde_json::json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": image_aspect_ratio(aspect_ratio),
            }
        });
        let path = format!("models/{}:predict", IMAGE_MODEL);
        let response: PredictResponse = self.post(settings, &path, &body, classify_api_error).await?;
        prediction_image(&response)
    }

    async fn generate_video(
        &self,
        settings: &AppSettings,
        prompt: &str,
        aspect_ratio: AspectRatio,
    ) -> CarouselResult<String> {
        let body = serde_json::json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "aspectRatio": video_aspect_ratio(aspect_ratio) }
        });
        let path = format!("models/{}:predictLongRunning", VIDEO_MODEL);
        let started: Operation = self.post(settings, &path, &body, classify_video_error).await?;
        info!(operation = %started.name, "video generation started");

        let finished = if started.done {
            started
        } else {
            self.poll_operation(settings, &started.name).await?
        };
        let uri = operation_video_uri(&finished)?;
        self.download_video(settings, &uri).await
    }

    async fn edit_image(
        &self,
        settings: &AppSettings,
        image_base64: &str,
        mime_type: &str,
        instruction: &str,
    ) -> CarouselResult<String> {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                role: Some("user"),
                parts: vec![
                    RequestPart::InlineData {
                        mime_type: mime_type.to_string(),
                        data: image_base64.to_string(),
                    },
                    RequestPart::Text(prompts::edit_image_prompt(instruction)),
                ],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_mime_type: None,
                response_schema: None,
                response_modalities: Some(vec!["IMAGE", "TEXT"]),
            }),
        };
        let path = format!("models/{}:generateContent", EDIT_IMAGE_MODEL);
        let response: GenerateContentResponse =
            self.post(settings, &path, &request, classify_api_error).await?;
        response_image(&response)
    }

    async fn regenerate_slide_content(
        &self,
        settings: &AppSettings,
        carousel_title: &str,
        slide: &Slide,
        part: SlidePart,
    ) -> CarouselResult<String> {
        let prompt = prompts::regenerate_prompt(carousel_title, slide, part);
        let text = self.generate_text(settings, prompt, None).await?;
        Ok(prompts::clean_text(&text))
    }

    async fn generate_caption(
        &self,
        settings: &AppSettings,
        carousel: &Carousel,
    ) -> CarouselResult<String> {
        let text = self
            .generate_text(settings, prompts::caption_prompt(carousel), None)
            .await?;
        Ok(text.trim().to_string())
    }

    async fn generate_thread(
        &self,
        settings: &AppSettings,
        carousel: &Carousel,
    ) -> CarouselResult<String> {
        let text = self
            .generate_text(settings, prompts::thread_prompt(carousel), None)
            .await?;
        Ok(text.trim().to_string())
    }

    async fn design_suggestion(
        &self,
        settings: &AppSettings,
        title: &str,
        category: &str,
    ) -> CarouselResult<PreferencesUpdate> {
        let text = self
            .generate_text(
                settings,
                prompts::design_suggestion_prompt(title, category),
                Some(prompts::design_suggestion_schema()),
            )
            .await?;
        prompts::parse_design_suggestion(&text)
    }
}
