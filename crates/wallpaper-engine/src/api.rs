use anyhow::Context;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};
use wallpaper_contracts::image_uri::{ImagePayload, ImageUri};
use wallpaper_contracts::settings::{AspectRatio, Language};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::prompts::{
    assistant_instruction, assistant_system_role, image_edit_prompt, text_to_image_prompt,
    AssistantTask, UPSCALE_INSTRUCTION,
};

const TEXT_TO_IMAGE_MIME: &str = "image/jpeg";
const INLINE_IMAGE_FALLBACK_MIME: &str = "image/png";

/// Remote generative-image service. One request per call, no retries.
pub trait ImageApi: Send + Sync {
    fn generate_from_text(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        style: &str,
    ) -> Result<ImageUri, ApiError>;

    fn generate_from_image(
        &self,
        base_image: &ImagePayload,
        edit_prompt: &str,
    ) -> Result<ImageUri, ApiError>;

    fn upscale_image(&self, base_image: &ImagePayload) -> Result<ImageUri, ApiError>;

    fn assistant_text(&self, task: &AssistantTask, language: Language) -> Result<String, ApiError>;
}

/// Google Generative Language REST client: Imagen `:predict` for
/// text-to-image, Gemini `:generateContent` for edits, upscales and text.
pub struct GeminiClient {
    config: ApiConfig,
    http: HttpClient,
}

impl GeminiClient {
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self::with_http_client(config, http))
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::new(ApiConfig::from_env())
    }

    pub fn with_http_client(config: ApiConfig, http: HttpClient) -> Self {
        Self { config, http }
    }

    fn api_key(&self) -> Result<String, ApiError> {
        self.config
            .api_key()
            .ok_or_else(|| ApiError::MissingApiKey(self.config.api_key_vars.join(", ")))
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:{}", self.config.api_base, model_path, method)
    }

    fn post_json(&self, label: &str, endpoint: &str, payload: &Value) -> Result<Value, ApiError> {
        let api_key = self.api_key()?;
        tracing::debug!(endpoint, "sending {label} request");
        let response = self
            .http
            .post(endpoint)
            .query(&[("key", api_key.as_str())])
            .json(payload)
            .send()
            .map_err(|err| ApiError::remote(format!("{label} request failed ({endpoint})"), err))?;
        response_json_or_error(label, response)
    }
}

impl ImageApi for GeminiClient {
    fn generate_from_text(
        &self,
        prompt: &str,
        aspect_ratio: AspectRatio,
        style: &str,
    ) -> Result<ImageUri, ApiError> {
        let endpoint = self.endpoint(&self.config.image_model, "predict");
        let payload = text_to_image_payload(prompt, aspect_ratio, style);
        let response = self.post_json("Imagen", &endpoint, &payload)?;
        extract_prediction_image(&response).ok_or(ApiError::NoImageReturned)
    }

    fn generate_from_image(
        &self,
        base_image: &ImagePayload,
        edit_prompt: &str,
    ) -> Result<ImageUri, ApiError> {
        let endpoint = self.endpoint(&self.config.edit_model, "generateContent");
        let payload = inline_image_payload(base_image, &image_edit_prompt(edit_prompt));
        let response = self.post_json("Gemini edit", &endpoint, &payload)?;
        extract_inline_image(&response).ok_or(ApiError::NoImageReturned)
    }

    fn upscale_image(&self, base_image: &ImagePayload) -> Result<ImageUri, ApiError> {
        let endpoint = self.endpoint(&self.config.edit_model, "generateContent");
        let payload = inline_image_payload(base_image, UPSCALE_INSTRUCTION);
        let response = self.post_json("Gemini upscale", &endpoint, &payload)?;
        extract_inline_image(&response).ok_or(ApiError::NoImageReturned)
    }

    fn assistant_text(&self, task: &AssistantTask, language: Language) -> Result<String, ApiError> {
        let endpoint = self.endpoint(&self.config.text_model, "generateContent");
        let payload = assistant_payload(task, language);
        let response = self.post_json("Gemini text", &endpoint, &payload)?;
        let text = extract_text(&response);
        if text.is_empty() {
            return Err(ApiError::NoTextReturned);
        }
        Ok(text)
    }
}

pub fn text_to_image_payload(prompt: &str, aspect_ratio: AspectRatio, style: &str) -> Value {
    json!({
        "instances": [{
            "prompt": text_to_image_prompt(prompt, style),
        }],
        "parameters": {
            "sampleCount": 1,
            "outputMimeType": TEXT_TO_IMAGE_MIME,
            "aspectRatio": aspect_ratio.as_str(),
        },
    })
}

pub fn inline_image_payload(base_image: &ImagePayload, instruction: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                {
                    "inlineData": {
                        "mimeType": base_image.mime_type,
                        "data": base_image.data,
                    }
                },
                { "text": instruction },
            ],
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE"],
        },
    })
}

pub fn assistant_payload(task: &AssistantTask, language: Language) -> Value {
    json!({
        "systemInstruction": {
            "parts": [{ "text": assistant_system_role(task, language) }],
        },
        "contents": [{
            "role": "user",
            "parts": [{ "text": assistant_instruction(task, language) }],
        }],
    })
}

fn response_json_or_error(label: &str, response: HttpResponse) -> Result<Value, ApiError> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(|err| ApiError::remote(format!("{label} response body read failed"), err))?;
    if !status.is_success() {
        return Err(ApiError::remote(
            format!("{label} request failed ({code})"),
            truncate_text(&body, 512),
        ));
    }
    serde_json::from_str(&body)
        .map_err(|err| ApiError::remote(format!("{label} returned invalid JSON payload"), err))
}

fn extract_prediction_image(response: &Value) -> Option<ImageUri> {
    response
        .get("predictions")
        .and_then(Value::as_array)?
        .iter()
        .find_map(|prediction| {
            let data = prediction
                .get("bytesBase64Encoded")
                .and_then(Value::as_str)
                .filter(|data| !data.is_empty())?;
            let mime_type = prediction
                .get("mimeType")
                .and_then(Value::as_str)
                .filter(|mime| !mime.is_empty())
                .unwrap_or(TEXT_TO_IMAGE_MIME);
            Some(ImageUri::from_base64(mime_type, data))
        })
}

fn candidate_parts(response: &Value) -> impl Iterator<Item = &Value> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|candidate| {
            candidate
                .get("content")
                .and_then(|content| content.get("parts"))
                .and_then(Value::as_array)
        })
        .flatten()
}

fn extract_inline_image(response: &Value) -> Option<ImageUri> {
    candidate_parts(response).find_map(|part| {
        let inline = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))?;
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .filter(|data| !data.is_empty())?;
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .filter(|mime| !mime.is_empty())
            .unwrap_or(INLINE_IMAGE_FALLBACK_MIME);
        Some(ImageUri::from_base64(mime_type, data))
    })
}

fn extract_text(response: &Value) -> String {
    candidate_parts(response)
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<String>()
        .trim()
        .to_string()
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::mpsc;
    use std::thread;

    use reqwest::blocking::Client as HttpClient;
    use serde_json::{json, Value};
    use wallpaper_contracts::image_uri::{ImagePayload, ImageUri};
    use wallpaper_contracts::settings::{style_fragment, AspectRatio, Language};

    use super::{
        assistant_payload, extract_inline_image, extract_prediction_image, extract_text,
        inline_image_payload, text_to_image_payload, GeminiClient, ImageApi,
    };
    use crate::config::ApiConfig;
    use crate::error::ApiError;
    use crate::prompts::{AssistantTask, UPSCALE_INSTRUCTION};

    struct CapturedRequest {
        head: String,
        body: Value,
    }

    fn find_header_end(buf: &[u8]) -> Option<usize> {
        buf.windows(4).position(|window| window == b"\r\n\r\n")
    }

    fn read_request(stream: &mut TcpStream) -> CapturedRequest {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        let mut header_end = None;
        loop {
            let read = match stream.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(read) => read,
            };
            buf.extend_from_slice(&chunk[..read]);
            if header_end.is_none() {
                header_end = find_header_end(&buf);
            }
            if let Some(end) = header_end {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        let end = header_end.unwrap_or(buf.len());
        let body_start = (end + 4).min(buf.len());
        CapturedRequest {
            head: String::from_utf8_lossy(&buf[..end]).to_string(),
            body: serde_json::from_slice(&buf[body_start..]).unwrap_or(Value::Null),
        }
    }

    /// Serves exactly one HTTP response on a loopback port.
    fn serve_once(
        status: u16,
        body: String,
    ) -> anyhow::Result<(String, mpsc::Receiver<CapturedRequest>)> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let request = read_request(&mut stream);
                let response = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
                let _ = tx.send(request);
            }
        });
        Ok((format!("http://{addr}"), rx))
    }

    fn client_for(api_base: String, key_var: &str) -> anyhow::Result<GeminiClient> {
        let config = ApiConfig {
            api_base,
            api_key_vars: vec![key_var.to_string()],
            ..ApiConfig::default()
        };
        let http = HttpClient::builder().no_proxy().build()?;
        Ok(GeminiClient::with_http_client(config, http))
    }

    fn base_image() -> ImagePayload {
        ImagePayload {
            mime_type: "image/png".to_string(),
            data: "iVBORw0KGgo=".to_string(),
        }
    }

    #[test]
    fn text_to_image_payload_requests_one_jpeg_at_ratio() {
        let payload = text_to_image_payload("a lone knight at sunset", AspectRatio::Portrait, "ghibli");
        let prompt = payload["instances"][0]["prompt"].as_str().unwrap_or("");
        assert!(prompt.contains("a lone knight at sunset"));
        assert!(prompt.contains(style_fragment("ghibli")));
        assert_eq!(payload["parameters"]["sampleCount"], json!(1));
        assert_eq!(payload["parameters"]["aspectRatio"], json!("9:16"));
        assert_eq!(payload["parameters"]["outputMimeType"], json!("image/jpeg"));
    }

    #[test]
    fn inline_payload_puts_image_before_instruction() {
        let payload = inline_image_payload(&base_image(), UPSCALE_INSTRUCTION);
        let parts = &payload["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!("image/png"));
        assert_eq!(parts[0]["inlineData"]["data"], json!("iVBORw0KGgo="));
        assert_eq!(parts[1]["text"], json!(UPSCALE_INSTRUCTION));
        assert_eq!(
            payload["generationConfig"]["responseModalities"],
            json!(["IMAGE"])
        );
        assert!(payload["generationConfig"].get("imageConfig").is_none());
    }

    #[test]
    fn assistant_payload_carries_system_role() {
        let payload = assistant_payload(&AssistantTask::Suggest, Language::En);
        assert!(payload["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .contains("creative assistant"));
        assert!(payload["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .contains("anime wallpaper"));
    }

    #[test]
    fn extract_prediction_image_builds_data_uri() {
        let response = json!({
            "predictions": [{"bytesBase64Encoded": "QUJD", "mimeType": "image/jpeg"}]
        });
        assert_eq!(
            extract_prediction_image(&response),
            Some(ImageUri::new("data:image/jpeg;base64,QUJD"))
        );
        assert_eq!(extract_prediction_image(&json!({"predictions": []})), None);
        assert_eq!(extract_prediction_image(&json!({})), None);
    }

    #[test]
    fn extract_inline_image_skips_text_parts() {
        let response = json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "here you go"},
                    {"inlineData": {"mimeType": "image/webp", "data": "UklG"}}
                ]}
            }]
        });
        assert_eq!(
            extract_inline_image(&response),
            Some(ImageUri::new("data:image/webp;base64,UklG"))
        );

        let blocked = json!({
            "candidates": [{"content": {"parts": [{"text": "I can't help with that."}]}}]
        });
        assert_eq!(extract_inline_image(&blocked), None);
        assert_eq!(extract_inline_image(&json!({"candidates": []})), None);
    }

    #[test]
    fn extract_text_joins_and_trims_parts() {
        let response = json!({
            "candidates": [{"content": {"parts": [{"text": "  A neon "}, {"text": "fox  \n"}]}}]
        });
        assert_eq!(extract_text(&response), "A neon fox");
        assert_eq!(extract_text(&json!({})), "");
    }

    #[test]
    fn missing_api_key_fails_before_any_request() -> anyhow::Result<()> {
        let client = client_for(
            "http://127.0.0.1:9".to_string(),
            "WALLPAPER_API_TEST_KEY_NEVER_SET",
        )?;
        let err = client
            .generate_from_text("castle", AspectRatio::Square, "pixel")
            .err();
        assert!(matches!(err, Some(ApiError::MissingApiKey(_))));
        Ok(())
    }

    #[test]
    fn generate_from_text_posts_to_imagen_predict() -> anyhow::Result<()> {
        std::env::set_var("WALLPAPER_API_TEST_KEY_PREDICT", "test-key");
        let (base, requests) = serve_once(
            200,
            json!({"predictions": [{"bytesBase64Encoded": "QUJD", "mimeType": "image/jpeg"}]})
                .to_string(),
        )?;
        let client = client_for(base, "WALLPAPER_API_TEST_KEY_PREDICT")?;

        let image = client.generate_from_text("a lone knight at sunset", AspectRatio::Portrait, "ghibli")?;
        assert_eq!(image, ImageUri::new("data:image/jpeg;base64,QUJD"));

        let request = requests.recv()?;
        let request_line = request.head.lines().next().unwrap_or("");
        assert!(request_line.starts_with("POST /models/imagen-4.0-generate-001:predict?"));
        assert!(request_line.contains("key=test-key"));
        assert_eq!(request.body["parameters"]["aspectRatio"], json!("9:16"));
        assert!(request.body["instances"][0]["prompt"]
            .as_str()
            .unwrap_or("")
            .contains(style_fragment("ghibli")));
        Ok(())
    }

    #[test]
    fn generate_from_text_without_predictions_is_no_image() -> anyhow::Result<()> {
        std::env::set_var("WALLPAPER_API_TEST_KEY_EMPTY", "test-key");
        let (base, _requests) = serve_once(200, json!({}).to_string())?;
        let client = client_for(base, "WALLPAPER_API_TEST_KEY_EMPTY")?;
        let err = client
            .generate_from_text("castle", AspectRatio::Square, "pixel")
            .err();
        assert!(matches!(err, Some(ApiError::NoImageReturned)));
        Ok(())
    }

    #[test]
    fn upscale_posts_inline_image_to_gemini() -> anyhow::Result<()> {
        std::env::set_var("WALLPAPER_API_TEST_KEY_UPSCALE", "test-key");
        let (base, requests) = serve_once(
            200,
            json!({
                "candidates": [{"content": {"parts": [
                    {"inlineData": {"mimeType": "image/png", "data": "WFla"}}
                ]}}]
            })
            .to_string(),
        )?;
        let client = client_for(base, "WALLPAPER_API_TEST_KEY_UPSCALE")?;

        let image = client.upscale_image(&base_image())?;
        assert_eq!(image, ImageUri::new("data:image/png;base64,WFla"));

        let request = requests.recv()?;
        assert!(request
            .head
            .starts_with("POST /models/gemini-2.5-flash-image:generateContent?"));
        assert_eq!(
            request.body["contents"][0]["parts"][1]["text"],
            json!(UPSCALE_INSTRUCTION)
        );
        Ok(())
    }

    #[test]
    fn http_error_status_is_remote_call_failure() -> anyhow::Result<()> {
        std::env::set_var("WALLPAPER_API_TEST_KEY_STATUS", "test-key");
        let (base, _requests) = serve_once(
            429,
            json!({"error": {"message": "quota exceeded"}}).to_string(),
        )?;
        let client = client_for(base, "WALLPAPER_API_TEST_KEY_STATUS")?;
        let err = client
            .assistant_text(&AssistantTask::Suggest, Language::En)
            .err();
        match err {
            Some(ApiError::RemoteCallFailed { context, source }) => {
                assert!(context.contains("(429)"));
                assert!(source.to_string().contains("quota exceeded"));
            }
            other => panic!("expected remote call failure, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn assistant_text_returns_trimmed_text() -> anyhow::Result<()> {
        std::env::set_var("WALLPAPER_API_TEST_KEY_TEXT", "test-key");
        let (base, requests) = serve_once(
            200,
            json!({
                "candidates": [{"content": {"parts": [{"text": "  A fox spirit in neon rain.  "}]}}]
            })
            .to_string(),
        )?;
        let client = client_for(base, "WALLPAPER_API_TEST_KEY_TEXT")?;
        let text = client.assistant_text(
            &AssistantTask::Enhance {
                prompt: "fox".to_string(),
            },
            Language::Ar,
        )?;
        assert_eq!(text, "A fox spirit in neon rain.");

        let request = requests.recv()?;
        assert!(request
            .head
            .starts_with("POST /models/gemini-2.5-flash:generateContent?"));
        assert!(request.body["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .contains("\"fox\""));
        Ok(())
    }
}
