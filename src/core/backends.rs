//! HTTP adapters for the supported translation services

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::core::config::{ProviderDescriptor, ProviderKind};
use crate::core::errors::{Result, TranslationError};
use crate::core::models::AUTO_DETECT;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// One network round trip translating a chunk of texts.
///
/// Implementations return exactly one translation per input, in input order.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn send(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>>;
}

/// Backend speaking one provider's HTTP protocol
#[derive(Debug, Clone)]
pub struct HttpBackend {
    kind: ProviderKind,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: Option<String>,
}

impl HttpBackend {
    /// Create a backend from the provider configuration and a resolved credential
    pub fn new(descriptor: &ProviderDescriptor, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(descriptor.timeout())
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            kind: descriptor.kind,
            client,
            endpoint: descriptor.endpoint().trim_end_matches('/').to_string(),
            api_key,
            model: descriptor.model.clone(),
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn build_request(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> reqwest::RequestBuilder {
        let source = Some(source_lang).filter(|s| !s.is_empty() && *s != AUTO_DETECT);

        match self.kind {
            ProviderKind::Deepl => {
                let mut body = json!({
                    "text": texts,
                    "target_lang": target_lang.to_uppercase(),
                });
                if let Some(source) = source {
                    body["source_lang"] = json!(source.to_uppercase());
                }
                self.client
                    .post(format!("{}/v2/translate", self.endpoint))
                    .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
                    .json(&body)
            }
            ProviderKind::Google => {
                let mut body = json!({
                    "q": texts,
                    "target": target_lang,
                    "format": "text",
                });
                if let Some(source) = source {
                    body["source"] = json!(source);
                }
                self.client
                    .post(&self.endpoint)
                    .query(&[("key", self.api_key.as_str())])
                    .json(&body)
            }
            ProviderKind::Openai => {
                let instruction = format!(
                    "Translate each string of the JSON array from {} to {}. \
                     Reply with only a JSON array of the translated strings, \
                     same length and order as the input. Keep placeholders and markup unchanged.",
                    source.unwrap_or("the detected language"),
                    target_lang
                );
                let body = json!({
                    "model": self.model.as_deref().unwrap_or(DEFAULT_OPENAI_MODEL),
                    "temperature": 0,
                    "messages": [
                        {"role": "system", "content": instruction},
                        {"role": "user", "content": Value::from(texts.to_vec()).to_string()},
                    ],
                });
                self.client
                    .post(format!("{}/chat/completions", self.endpoint))
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&body)
            }
            ProviderKind::Generic => {
                let body = json!({
                    "texts": texts,
                    "source_lang": source_lang,
                    "target_lang": target_lang,
                });
                self.client
                    .post(&self.endpoint)
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&body)
            }
        }
    }

    fn parse_response(&self, json: &Value) -> Result<Vec<String>> {
        match self.kind {
            ProviderKind::Deepl => string_field_array(&json["translations"], "text"),
            ProviderKind::Google => {
                string_field_array(&json["data"]["translations"], "translatedText")
            }
            ProviderKind::Openai => {
                let content = json["choices"]
                    .get(0)
                    .and_then(|c| c["message"]["content"].as_str())
                    .ok_or_else(|| invalid("No translation in response"))?;
                let content = strip_code_fence(content);
                serde_json::from_str::<Vec<String>>(content)
                    .map_err(|e| invalid(format!("model reply is not a JSON string array: {}", e)))
            }
            ProviderKind::Generic => string_array(&json["translations"]),
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn send(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>> {
        debug!(
            "Sending {} texts to {} ({} -> {})",
            texts.len(),
            self.kind,
            source_lang,
            target_lang
        );

        let response = self
            .build_request(texts, source_lang, target_lang)
            .send()
            .await
            .map_err(TranslationError::from_transport)?;

        let status = response.status();

        if status.is_success() {
            // A body cut off mid-read is a transport failure, only a bad payload is invalid
            let body = response
                .bytes()
                .await
                .map_err(TranslationError::from_transport)?;
            let json: Value = serde_json::from_slice(&body)
                .map_err(|e| invalid(format!("malformed response body: {}", e)))?;

            let translations = self.parse_response(&json)?;
            if translations.len() != texts.len() {
                return Err(invalid(format!(
                    "expected {} translations, got {}",
                    texts.len(),
                    translations.len()
                )));
            }
            Ok(translations)
        } else {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error_text = response.text().await.unwrap_or_default();

            Err(TranslationError::from_status(
                status.as_u16(),
                error_text,
                retry_after,
            ))
        }
    }
}

fn invalid(message: impl Into<String>) -> TranslationError {
    TranslationError::InvalidResponse {
        message: message.into(),
    }
}

fn string_array(value: &Value) -> Result<Vec<String>> {
    value
        .as_array()
        .ok_or_else(|| invalid("missing translations array"))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid("translation is not a string"))
        })
        .collect()
}

fn string_field_array(value: &Value, field: &str) -> Result<Vec<String>> {
    value
        .as_array()
        .ok_or_else(|| invalid("missing translations array"))?
        .iter()
        .map(|v| {
            v[field]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(format!("translation item without '{}'", field)))
        })
        .collect()
}

/// LLMs like to wrap JSON in markdown fences
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches("json");
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(kind: ProviderKind) -> HttpBackend {
        let descriptor = ProviderDescriptor::new("test", kind, 1);
        HttpBackend::new(&descriptor, "key".to_string()).unwrap()
    }

    #[test]
    fn test_parse_deepl_response() {
        let json = json!({"translations": [{"detected_source_language": "EN", "text": "Hallo"}]});
        let parsed = backend(ProviderKind::Deepl).parse_response(&json).unwrap();
        assert_eq!(parsed, vec!["Hallo"]);
    }

    #[test]
    fn test_parse_google_response() {
        let json = json!({"data": {"translations": [{"translatedText": "Hei"}, {"translatedText": "Moi"}]}});
        let parsed = backend(ProviderKind::Google).parse_response(&json).unwrap();
        assert_eq!(parsed, vec!["Hei", "Moi"]);
    }

    #[test]
    fn test_parse_openai_fenced_reply() {
        let json = json!({"choices": [{"message": {"content": "```json\n[\"Hej\", \"Tack\"]\n```"}}]});
        let parsed = backend(ProviderKind::Openai).parse_response(&json).unwrap();
        assert_eq!(parsed, vec!["Hej", "Tack"]);
    }

    #[test]
    fn test_parse_malformed_response() {
        let json = json!({"translations": [1, 2]});
        let err = backend(ProviderKind::Generic).parse_response(&json).unwrap_err();
        assert!(matches!(err, TranslationError::InvalidResponse { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("[\"a\"]"), "[\"a\"]");
        assert_eq!(strip_code_fence("```\n[\"a\"]\n```"), "[\"a\"]");
        assert_eq!(strip_code_fence("  ```json [\"a\"]```  "), "[\"a\"]");
    }
}
