use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};
use studio_contracts::encoded::EncodedImage;
use studio_contracts::prompts::TRY_ON_INSTRUCTION;

use crate::collaborator::{CollaboratorError, GenerationCollaborator};
use crate::config::StudioConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const TEXT_OUTPUT_MIME: &str = "image/jpeg";
const GENERATED_NAME: &str = "generated";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google Generative Language API: Imagen `:predict` for text-to-image,
/// Gemini `:generateContent` for every image-conditioned operation.
pub struct GoogleGenAiClient {
    api_base: String,
    api_key: String,
    text_model: String,
    edit_model: String,
    http: HttpClient,
}

impl GoogleGenAiClient {
    pub fn new(config: &StudioConfig) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            text_model: config.text_model.clone(),
            edit_model: config.edit_model.clone(),
            http: HttpClient::new(),
        }
    }

    fn endpoint_for_model(&self, model: &str, method: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:{}", self.api_base, model_path, method)
    }

    fn post(&self, provider: &str, endpoint: &str, payload: &Value) -> Result<Value> {
        let response = self
            .http
            .post(endpoint)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("{provider} request failed ({endpoint})"))?;
        response_json_or_error(provider, response)
    }

    fn generate_content(
        &self,
        images: &[&EncodedImage],
        text: &str,
    ) -> Result<EncodedImage, CollaboratorError> {
        let endpoint = self.endpoint_for_model(&self.edit_model, "generateContent");
        let payload = generate_content_payload(images, text);
        let response = self
            .post("Gemini", &endpoint, &payload)
            .map_err(service_error)?;
        first_inline_image(&response)
            .map_err(service_error)?
            .ok_or(CollaboratorError::NoImageFound)
    }
}

impl GenerationCollaborator for GoogleGenAiClient {
    fn name(&self) -> &str {
        "google"
    }

    fn synthesize_from_text(&self, prompt: &str) -> Result<EncodedImage, CollaboratorError> {
        let endpoint = self.endpoint_for_model(&self.text_model, "predict");
        let response = self
            .post("Imagen", &endpoint, &predict_payload(prompt))
            .map_err(service_error)?;
        first_prediction_image(&response)
            .map_err(service_error)?
            .ok_or(CollaboratorError::NoImageProduced)
    }

    fn edit_with_image(
        &self,
        prompt: &str,
        image: &EncodedImage,
    ) -> Result<EncodedImage, CollaboratorError> {
        self.generate_content(&[image], prompt)
    }

    fn composite_two_images(
        &self,
        person: &EncodedImage,
        garment: &EncodedImage,
    ) -> Result<EncodedImage, CollaboratorError> {
        self.generate_content(&[person, garment], TRY_ON_INSTRUCTION)
    }
}

pub(crate) fn predict_payload(prompt: &str) -> Value {
    json!({
        "instances": [{ "prompt": prompt }],
        "parameters": {
            "sampleCount": 1,
            "aspectRatio": "1:1",
            "outputOptions": { "mimeType": TEXT_OUTPUT_MIME },
        },
    })
}

pub(crate) fn generate_content_payload(images: &[&EncodedImage], text: &str) -> Value {
    let mut parts: Vec<Value> = images.iter().map(|image| inline_image_part(image)).collect();
    parts.push(json!({ "text": text }));
    json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": { "responseModalities": ["IMAGE", "TEXT"] },
    })
}

fn inline_image_part(image: &EncodedImage) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.media_type(),
            "data": image.payload(),
        }
    })
}

/// First prediction of an Imagen `:predict` response. Imagen answers in the
/// requested output format, so a missing mime type means jpeg.
pub(crate) fn first_prediction_image(response_payload: &Value) -> Result<Option<EncodedImage>> {
    let Some(first) = response_payload
        .get("predictions")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(Value::as_object)
    else {
        return Ok(None);
    };
    let generated = first
        .get("image")
        .or_else(|| first.get("generatedImage"))
        .and_then(Value::as_object);
    let encoded = first
        .get("bytesBase64Encoded")
        .or_else(|| first.get("bytes_base64_encoded"))
        .or_else(|| generated.and_then(|image| image.get("imageBytes")))
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty());
    let Some(encoded) = encoded else {
        return Ok(None);
    };
    let mime_type = first
        .get("mimeType")
        .or_else(|| generated.and_then(|image| image.get("mimeType")))
        .and_then(Value::as_str)
        .unwrap_or(TEXT_OUTPUT_MIME);
    let image = EncodedImage::from_base64(encoded, mime_type, GENERATED_NAME)
        .context("Imagen image base64 decode failed")?;
    Ok(Some(image))
}

/// First `inlineData` part across the candidates of a `:generateContent`
/// response, in order. Text parts are ignored.
pub(crate) fn first_inline_image(response_payload: &Value) -> Result<Option<EncodedImage>> {
    let candidates = response_payload
        .get("candidates")
        .and_then(Value::as_array)
        .into_iter()
        .flatten();
    let parts = candidates.flat_map(|candidate| {
        candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    });

    for part in parts {
        let Some(inline) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let image = EncodedImage::from_base64(data, mime_type, GENERATED_NAME)
            .context("Gemini image base64 decode failed")?;
        return Ok(Some(image));
    }
    Ok(None)
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))
}

fn service_error(err: anyhow::Error) -> CollaboratorError {
    CollaboratorError::Service(error_chain_text(&err, 1024))
}

fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() || parts.last().is_some_and(|last| last == trimmed) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
