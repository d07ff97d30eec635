//! ReadingApiClient - HTTP implementation of the reading backend gateway.
//!
//! Talks to the tarot backend over plain JSON/multipart POSTs. No
//! authentication, no versioning, no retries; failures map to
//! `ArcanaError::Api` and are surfaced by the flow as apology bubbles.
//! Configuration priority: ARCANA_BASE_URL > ~/.config/arcana/config.toml > default.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use arcana_core::backend::{
    CardDraw, ImageInterpretation, Interpretation, ReadingBackend, Transcription,
};
use arcana_core::config::{self, ClientConfig};
use arcana_core::error::{ArcanaError, Result};

/// HTTP client for the reading backend.
#[derive(Debug, Clone)]
pub struct ReadingApiClient {
    client: Client,
    base_url: String,
}

impl ReadingApiClient {
    /// Creates a client for the given configuration.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| ArcanaError::internal(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Loads configuration from ~/.config/arcana/config.toml and the
    /// environment.
    ///
    /// Priority:
    /// 1. `ARCANA_BASE_URL` environment variable
    /// 2. Configuration file
    /// 3. Built-in default
    pub fn try_from_env() -> Result<Self> {
        let mut config = config::load_config().unwrap_or_default();
        if let Ok(base_url) = env::var("ARCANA_BASE_URL") {
            config.base_url = base_url;
        }
        Self::new(&config)
    }

    /// The base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_reading(&self, body: &ReadingRequest<'_>) -> Result<ReadingResponse> {
        let response = self
            .client
            .post(self.url("/reading"))
            .json(body)
            .send()
            .await
            .map_err(map_request_error)?;

        let parsed: ReadingResponse = decode_json(response).await?;

        // The backend reports some failures in a 200 body instead of a
        // status code; treat those as errors too.
        if let Some(error) = parsed.error {
            let message = parsed.message.unwrap_or(error);
            return Err(ArcanaError::request(message));
        }

        Ok(parsed)
    }
}

#[async_trait]
impl ReadingBackend for ReadingApiClient {
    async fn draw(&self, context: &str) -> Result<CardDraw> {
        let request = ReadingRequest {
            context,
            reflection: None,
            session_id: None,
        };
        let response = self.post_reading(&request).await?;

        let card_name = response
            .card_name
            .ok_or_else(|| ArcanaError::request("Backend returned no card name"))?;
        let image_data = response
            .image_data
            .ok_or_else(|| ArcanaError::request("Backend returned no card image"))?;

        Ok(CardDraw {
            card_name,
            image_data,
            reflection_prompt: response.reflection_prompt,
            session_id: response.session_id,
        })
    }

    async fn interpret(
        &self,
        full_context: &str,
        reflection: &str,
        session_id: Option<&str>,
    ) -> Result<Interpretation> {
        let request = ReadingRequest {
            context: full_context,
            reflection: Some(reflection),
            session_id,
        };
        let response = self.post_reading(&request).await?;

        let interpretation = response
            .interpretation
            .ok_or_else(|| ArcanaError::request("Backend returned no interpretation"))?;

        Ok(Interpretation {
            interpretation,
            session_id: response.session_id,
        })
    }

    async fn interpret_image(
        &self,
        image: Vec<u8>,
        file_name: &str,
        context: &str,
    ) -> Result<ImageInterpretation> {
        let part = Part::bytes(image)
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))
            .map_err(|err| ArcanaError::internal(format!("Invalid image mime type: {err}")))?;

        let form = Form::new()
            .part("image", part)
            .text("context", context.to_string());

        let response = self
            .client
            .post(self.url("/interpret-image"))
            .multipart(form)
            .send()
            .await
            .map_err(map_request_error)?;

        decode_json(response).await
    }

    async fn transcribe(&self, audio: Vec<u8>, file_name: &str) -> Result<Transcription> {
        let part = Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))
            .map_err(|err| ArcanaError::internal(format!("Invalid audio mime type: {err}")))?;

        let form = Form::new().part("audio_file", part);

        let response = self
            .client
            .post(self.url("/transcribe"))
            .multipart(form)
            .send()
            .await
            .map_err(map_request_error)?;

        decode_json(response).await
    }

    async fn submit_feedback(
        &self,
        session_id: &str,
        score: u8,
        note: Option<&str>,
    ) -> Result<()> {
        let request = FeedbackRequest {
            session_id,
            score,
            feedback: note,
        };

        let response = self
            .client
            .post(self.url("/feedback"))
            .json(&request)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, body));
        }

        Ok(())
    }
}

#[derive(Serialize)]
struct ReadingRequest<'a> {
    context: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reflection: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

/// The single `/reading` endpoint serves both draws and interpretations,
/// so every field is optional on the wire.
#[derive(Deserialize)]
struct ReadingResponse {
    card_name: Option<String>,
    image_data: Option<String>,
    reflection_prompt: Option<String>,
    interpretation: Option<String>,
    session_id: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

#[derive(Serialize)]
struct FeedbackRequest<'a> {
    session_id: &'a str,
    score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    feedback: Option<&'a str>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<String>,
    message: Option<String>,
    detail: Option<String>,
}

async fn decode_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(map_http_error(status, body));
    }

    response
        .json()
        .await
        .map_err(|err| ArcanaError::request(format!("Failed to parse backend response: {err}")))
}

fn map_request_error(err: reqwest::Error) -> ArcanaError {
    if err.is_timeout() {
        ArcanaError::request(format!("Request timed out: {err}"))
    } else {
        ArcanaError::request(format!("Request failed: {err}"))
    }
}

fn map_http_error(status: StatusCode, body: String) -> ArcanaError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(|wrapper| wrapper.message.or(wrapper.detail).or(wrapper.error))
        .unwrap_or(body);

    ArcanaError::api(status.as_u16(), message)
}

/// Maps a file name to a mime type for multipart uploads.
fn mime_for(file_name: &str) -> &'static str {
    match file_name.rsplit('.').next().map(str::to_ascii_lowercase) {
        Some(ext) => match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "m4a" => "audio/mp4",
            "ogg" => "audio/ogg",
            "webm" => "audio/webm",
            _ => "application/octet-stream",
        },
        None => "application/octet-stream",
    }
}
