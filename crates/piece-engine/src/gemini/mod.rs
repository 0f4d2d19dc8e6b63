mod response;

use anyhow::{bail, Context, Result};
use piece_contracts::analysis::SearchResult;
use piece_contracts::image::EncodedImage;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use self::response::GenerateContentResponse;
use crate::client::{AnalysisClient, AnalysisError};
use crate::config::GeminiConfig;

/// Media type sent with every image, whatever the upload actually is.
pub const ASSUMED_MEDIA_TYPE: &str = "image/jpeg";

pub const CLOTHING_SEARCH_PROMPT: &str = "Analyze this image of clothing. Identify the item specifically (brand, model, style, color, material).

Then, use Google Search to find where this specific item (or the closest possible match) is available for sale online.

In your text response:
1. Give a brief, stylish description of the item.
2. Mention the estimated price range if found.
3. Provide a short list of potential retailers found.

Do not return JSON. Write in a clean, helpful tone.";

pub struct GeminiClient {
    config: GeminiConfig,
    http: HttpClient,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self { config, http })
    }

    fn endpoint(&self) -> String {
        let trimmed = self.config.model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.config.api_base, model_path)
    }

    /// Image part first, then the instruction. Only the search tool is
    /// configured: a JSON `responseMimeType` cannot be combined with it.
    fn build_payload(image: &EncodedImage) -> Result<Value> {
        let data = image.payload();
        if data.is_empty() {
            bail!("image payload is empty");
        }
        if let Some(declared) = image.declared_media_type() {
            if !declared.eq_ignore_ascii_case(ASSUMED_MEDIA_TYPE) {
                tracing::warn!(
                    declared,
                    sent = ASSUMED_MEDIA_TYPE,
                    "image media type differs from the type sent to Gemini"
                );
            }
        }
        Ok(json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": ASSUMED_MEDIA_TYPE,
                            "data": data,
                        }
                    },
                    { "text": CLOTHING_SEARCH_PROMPT },
                ],
            }],
            "tools": [{ "googleSearch": {} }],
        }))
    }

    fn try_analyze(&self, image: &EncodedImage) -> Result<SearchResult> {
        let payload = Self::build_payload(image)?;
        let endpoint = self.endpoint();
        tracing::debug!(
            endpoint = %endpoint,
            payload_chars = image.payload().len(),
            "sending clothing search request"
        );
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&payload)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let body = response_json_or_error(response)?;
        let parsed: GenerateContentResponse =
            serde_json::from_value(body).context("Gemini reply has an unexpected shape")?;
        Ok(parsed.into_search_result())
    }
}

impl AnalysisClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn analyze(&self, image: &EncodedImage) -> Result<SearchResult, AnalysisError> {
        self.try_analyze(image).map_err(|err| {
            tracing::error!(
                model = %self.config.model,
                error = %error_chain_text(&err, 2048),
                "Gemini clothing search failed"
            );
            AnalysisError
        })
    }
}

fn response_json_or_error(response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .context("Gemini response body read failed")?;
    if !status.is_success() {
        bail!(
            "Gemini request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    serde_json::from_str(&body).context("Gemini returned invalid JSON payload")
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
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use piece_contracts::analysis::NO_DESCRIPTION_PLACEHOLDER;
    use piece_contracts::image::EncodedImage;
    use serde_json::{json, Value};

    use super::{
        error_chain_text, truncate_text, GeminiClient, ASSUMED_MEDIA_TYPE,
        CLOTHING_SEARCH_PROMPT,
    };
    use crate::client::{AnalysisClient, AnalysisError};
    use crate::config::GeminiConfig;

    struct CapturedRequest {
        head: String,
        body: Value,
    }

    /// Serves exactly one canned HTTP response on a loopback port.
    fn serve_once(
        status_line: &'static str,
        body: String,
    ) -> anyhow::Result<(String, thread::JoinHandle<Option<CapturedRequest>>)> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let handle = thread::spawn(move || -> Option<CapturedRequest> {
            let (stream, _) = listener.accept().ok()?;
            let mut reader = BufReader::new(stream.try_clone().ok()?);
            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).ok()? == 0 || line == "\r\n" {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap_or(0);
                    }
                }
                head.push_str(&line);
            }
            let mut raw_body = vec![0u8; content_length];
            reader.read_exact(&mut raw_body).ok()?;

            let mut stream = stream;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).ok()?;
            stream.flush().ok()?;
            Some(CapturedRequest {
                head,
                body: serde_json::from_slice(&raw_body).unwrap_or(Value::Null),
            })
        });
        Ok((format!("http://{addr}/v1beta"), handle))
    }

    fn client_for(api_base: &str) -> anyhow::Result<GeminiClient> {
        GeminiClient::new(GeminiConfig::new("test-key").with_api_base(api_base))
    }

    fn jpeg_image() -> EncodedImage {
        EncodedImage::from_bytes(b"JPEGDATA", "image/jpeg").unwrap()
    }

    #[test]
    fn payload_strips_prefix_and_enables_search_only() -> anyhow::Result<()> {
        let image = EncodedImage::from_data_url("data:image/png;base64,SlBFR0RBVEE=")?;
        let payload = GeminiClient::build_payload(&image)?;
        let parts = &payload["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["data"], json!("SlBFR0RBVEE="));
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!(ASSUMED_MEDIA_TYPE));
        assert_eq!(parts[1]["text"], json!(CLOTHING_SEARCH_PROMPT));
        assert_eq!(payload["tools"], json!([{"googleSearch": {}}]));
        assert!(payload.get("generationConfig").is_none());
        Ok(())
    }

    #[test]
    fn endpoint_accepts_bare_and_prefixed_model_names() -> anyhow::Result<()> {
        let client = client_for("https://example.test/v1beta")?;
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
        let prefixed = GeminiClient::new(
            GeminiConfig::new("k")
                .with_api_base("https://example.test/v1beta")
                .with_model("models/gemini-2.5-pro"),
        )?;
        assert_eq!(
            prefixed.endpoint(),
            "https://example.test/v1beta/models/gemini-2.5-pro:generateContent"
        );
        Ok(())
    }

    #[test]
    fn analyze_maps_successful_reply() -> anyhow::Result<()> {
        let reply = json!({
            "candidates": [{
                "content": {"parts": [{"text": "A navy wool coat"}]},
                "groundingMetadata": {"groundingChunks": [
                    {"web": {"uri": "https://a.com", "title": "Shop A"}},
                    {"web": {"uri": "https://a.com", "title": "Shop A dup"}},
                ]},
            }],
        });
        let (api_base, server) = serve_once("200 OK", reply.to_string())?;
        let result = client_for(&api_base)?.analyze(&jpeg_image());

        let request = server
            .join()
            .map_err(|_| anyhow::anyhow!("server thread panicked"))?
            .ok_or_else(|| anyhow::anyhow!("no request captured"))?;
        assert!(request
            .head
            .starts_with("POST /v1beta/models/gemini-2.5-flash:generateContent?key=test-key "));
        assert_eq!(
            request.body["contents"][0]["parts"][0]["inlineData"]["data"],
            json!("SlBFR0RBVEE=")
        );

        let result = result.map_err(|err| anyhow::anyhow!("{err}"))?;
        assert_eq!(result.description(), "A navy wool coat");
        assert_eq!(result.citations().len(), 2);
        let found = result.found_online();
        assert_eq!(found.links().len(), 1);
        assert_eq!(found.links()[0].title, "Shop A");
        Ok(())
    }

    #[test]
    fn analyze_substitutes_placeholder_for_missing_text() -> anyhow::Result<()> {
        let reply = json!({"candidates": [{"groundingMetadata": {"groundingChunks": []}}]});
        let (api_base, server) = serve_once("200 OK", reply.to_string())?;
        let result = client_for(&api_base)?
            .analyze(&jpeg_image())
            .map_err(|err| anyhow::anyhow!("{err}"))?;
        let _ = server.join();
        assert_eq!(result.description(), NO_DESCRIPTION_PLACEHOLDER);
        assert!(result.citations().is_empty());
        Ok(())
    }

    #[test]
    fn remote_error_status_becomes_opaque_failure() -> anyhow::Result<()> {
        let (api_base, server) = serve_once(
            "403 Forbidden",
            json!({"error": {"message": "API key not valid"}}).to_string(),
        )?;
        let outcome = client_for(&api_base)?.analyze(&jpeg_image());
        let _ = server.join();
        assert_eq!(outcome, Err(AnalysisError));
        Ok(())
    }

    #[test]
    fn invalid_json_becomes_opaque_failure() -> anyhow::Result<()> {
        let (api_base, server) = serve_once("200 OK", "<html>oops</html>".to_string())?;
        let outcome = client_for(&api_base)?.analyze(&jpeg_image());
        let _ = server.join();
        assert_eq!(outcome, Err(AnalysisError));
        Ok(())
    }

    #[test]
    fn connection_failure_becomes_opaque_failure() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);
        let outcome = client_for(&format!("http://{addr}/v1beta"))?.analyze(&jpeg_image());
        let err = outcome.err().map(|err| err.to_string()).unwrap_or_default();
        assert_eq!(err, "Failed to analyze the image. Please try again.");
        Ok(())
    }

    #[test]
    fn error_chain_text_collapses_repeats_and_truncates() {
        let err = anyhow::anyhow!("root cause")
            .context("root cause")
            .context("Gemini request failed");
        assert_eq!(
            error_chain_text(&err, 200),
            "Gemini request failed | caused by: root cause"
        );
        assert_eq!(truncate_text("abcdef", 3), "abc…");
    }
}
