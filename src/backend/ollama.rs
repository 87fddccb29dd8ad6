//! Backend for Ollama's native API.
//!
//! [`OllamaBackend`] translates normalized [`LlmRequest`]s into Ollama's
//! `/api/generate` and `/api/chat` endpoints. This is the default backend.

use super::{Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Backend for Ollama's native API.
///
/// Uses `/api/chat` when a non-empty system prompt is set, otherwise
/// `/api/generate`. Non-success statuses become [`PipelineError::HttpError`]
/// with the body kept verbatim, so provider rate-limit text reaches the
/// retry classifier.
#[derive(Debug, Clone)]
pub struct OllamaBackend;

impl OllamaBackend {
    /// Build the Ollama `options` object from the LlmConfig.
    fn build_options(request: &LlmRequest) -> Value {
        let mut opts = json!({
            "temperature": request.config.temperature,
            "num_predict": request.config.max_tokens,
        });
        if let Some(ref custom) = request.config.options {
            if let (Some(base), Some(extra)) = (opts.as_object_mut(), custom.as_object()) {
                for (k, v) in extra {
                    base.insert(k.clone(), v.clone());
                }
            }
        }
        opts
    }

    /// Whether this request should use `/api/chat` (vs `/api/generate`).
    fn use_chat(request: &LlmRequest) -> bool {
        request
            .system_prompt
            .as_ref()
            .is_some_and(|s| !s.is_empty())
    }

    /// Build the JSON body for `/api/generate`.
    fn build_generate_body(request: &LlmRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": Self::build_options(request),
        });
        if request.config.json_mode {
            body["format"] = json!("json");
        }
        body
    }

    /// Build the JSON body for `/api/chat`.
    fn build_chat_body(request: &LlmRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(ref sys) = request.system_prompt {
            if !sys.is_empty() {
                messages.push(json!({"role": "system", "content": sys}));
            }
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": false,
            "options": Self::build_options(request),
        });
        if request.config.json_mode {
            body["format"] = json!("json");
        }
        body
    }

    /// Send a request and return the decoded JSON body with its status.
    async fn send_request(client: &Client, url: &str, body: &Value) -> Result<(Value, u16)> {
        let resp = client.post(url).json(body).send().await.map_err(|e| {
            PipelineError::Other(format!("Failed to connect to LLM at {}: {}", url, e))
        })?;

        let status = resp.status().as_u16();

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::HttpError { status, body: text });
        }

        let json_resp: Value = resp.json().await?;
        Ok((json_resp, status))
    }

    /// Pull the completion text out of a generate or chat response.
    fn extract_text(json_resp: &Value, chat: bool) -> String {
        let text = if chat {
            json_resp
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(|v| v.as_str())
        } else {
            json_resp.get("response").and_then(|v| v.as_str())
        };
        text.unwrap_or("").to_string()
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let base = base_url.trim_end_matches('/');
        let chat = Self::use_chat(request);

        let (url, body) = if chat {
            (format!("{}/api/chat", base), Self::build_chat_body(request))
        } else {
            (
                format!("{}/api/generate", base),
                Self::build_generate_body(request),
            )
        };

        let (json_resp, status) = Self::send_request(client, &url, &body).await?;
        Ok(LlmResponse {
            text: Self::extract_text(&json_resp, chat),
            status,
        })
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    fn test_request() -> LlmRequest {
        LlmRequest {
            model: "llama3.2".into(),
            system_prompt: None,
            prompt: "Summarize this article.".into(),
            config: LlmConfig::default(),
        }
    }

    #[test]
    fn test_ollama_backend_generate_payload() {
        let request = test_request();
        let body = OllamaBackend::build_generate_body(&request);

        assert_eq!(body["model"], "llama3.2");
        assert_eq!(body["prompt"], "Summarize this article.");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["temperature"], 0.2);
        assert_eq!(body["options"]["num_predict"], 2048);
        assert!(body.get("format").is_none());
    }

    #[test]
    fn test_ollama_backend_chat_payload() {
        let mut request = test_request();
        request.system_prompt = Some("You are a quiz generator.".into());

        let body = OllamaBackend::build_chat_body(&request);
        let messages = body["messages"].as_array().expect("messages array");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "You are a quiz generator.");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "Summarize this article.");
    }

    #[test]
    fn test_ollama_backend_json_mode() {
        let mut request = test_request();
        request.config.json_mode = true;

        assert_eq!(OllamaBackend::build_generate_body(&request)["format"], "json");
        assert_eq!(OllamaBackend::build_chat_body(&request)["format"], "json");
    }

    #[test]
    fn test_ollama_backend_use_chat_logic() {
        let mut request = test_request();
        assert!(!OllamaBackend::use_chat(&request));

        request.system_prompt = Some("Be terse.".into());
        assert!(OllamaBackend::use_chat(&request));

        request.system_prompt = Some(String::new());
        assert!(!OllamaBackend::use_chat(&request));
    }

    #[test]
    fn test_ollama_backend_custom_options() {
        let mut request = test_request();
        request.config.options = Some(json!({"top_p": 0.9, "seed": 42}));

        let body = OllamaBackend::build_generate_body(&request);
        assert_eq!(body["options"]["top_p"], 0.9);
        assert_eq!(body["options"]["seed"], 42);
        assert_eq!(body["options"]["temperature"], 0.2);
    }

    #[test]
    fn test_extract_text_by_endpoint() {
        let generate = json!({"response": "[1, 2]", "done": true});
        let chat = json!({"message": {"role": "assistant", "content": "{}"}});
        assert_eq!(OllamaBackend::extract_text(&generate, false), "[1, 2]");
        assert_eq!(OllamaBackend::extract_text(&chat, true), "{}");
        assert_eq!(OllamaBackend::extract_text(&json!({}), true), "");
    }
}
