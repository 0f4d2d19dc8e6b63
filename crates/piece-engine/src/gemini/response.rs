//! `generateContent` reply, as far as the clothing search reads it.
//!
//! Every level is optional: the API omits `content` for blocked candidates,
//! omits `groundingMetadata` when search was not used, and leaves `web`
//! unset for non-web chunks.

use piece_contracts::analysis::{Citation, SearchResult};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    pub content: Option<Content>,
    pub grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Content {
    pub parts: Option<Vec<Part>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Part {
    pub text: Option<String>,
    pub thought: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GroundingMetadata {
    pub grounding_chunks: Option<Vec<GroundingChunk>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GroundingChunk {
    pub web: Option<WebChunk>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WebChunk {
    pub uri: Option<String>,
    pub title: Option<String>,
}

impl GenerateContentResponse {
    fn first_candidate(&self) -> Option<&Candidate> {
        self.candidates.as_ref()?.first()
    }

    /// Text parts of the first candidate joined together, skipping thought parts.
    pub fn text(&self) -> Option<String> {
        let parts = self.first_candidate()?.content.as_ref()?.parts.as_ref()?;
        let mut text = String::new();
        let mut any = false;
        for part in parts {
            if part.thought.unwrap_or(false) {
                continue;
            }
            if let Some(chunk) = part.text.as_deref() {
                text.push_str(chunk);
                any = true;
            }
        }
        any.then_some(text)
    }

    pub fn citations(&self) -> Vec<Citation> {
        let Some(chunks) = self
            .first_candidate()
            .and_then(|candidate| candidate.grounding_metadata.as_ref())
            .and_then(|metadata| metadata.grounding_chunks.as_ref())
        else {
            return Vec::new();
        };
        chunks
            .iter()
            .map(|chunk| match chunk.web.as_ref() {
                Some(web) => Citation {
                    uri: web.uri.clone(),
                    title: web.title.clone(),
                },
                None => Citation::default(),
            })
            .collect()
    }

    pub fn into_search_result(self) -> SearchResult {
        SearchResult::new(self.text(), self.citations())
    }
}

#[cfg(test)]
mod tests {
    use piece_contracts::analysis::{Citation, NO_DESCRIPTION_PLACEHOLDER};
    use serde_json::json;

    use super::GenerateContentResponse;

    fn parse(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn maps_text_and_grounding_chunks() {
        let response = parse(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "A navy "},
                    {"text": "thinking...", "thought": true},
                    {"text": "wool coat"},
                ]},
                "groundingMetadata": {
                    "webSearchQueries": ["navy wool coat"],
                    "groundingChunks": [
                        {"web": {"uri": "https://a.com", "title": "Shop A"}},
                        {"web": {"uri": "https://a.com", "title": "Shop A dup"}},
                        {"retrievedContext": {"uri": "gs://x"}},
                    ],
                },
            }],
            "usageMetadata": {"promptTokenCount": 10},
        }));
        let result = response.into_search_result();
        assert_eq!(result.description(), "A navy wool coat");
        assert_eq!(
            result.citations(),
            &[
                Citation::web("https://a.com", "Shop A"),
                Citation::web("https://a.com", "Shop A dup"),
                Citation::default(),
            ]
        );
        assert_eq!(result.found_online().links().len(), 1);
    }

    #[test]
    fn every_level_may_be_missing() {
        for value in [
            json!({}),
            json!({"candidates": null}),
            json!({"candidates": []}),
            json!({"candidates": [{}]}),
            json!({"candidates": [{"content": {}}]}),
            json!({"candidates": [{"content": {"parts": [{}]}, "groundingMetadata": {}}]}),
            json!({"candidates": [{"groundingMetadata": {"groundingChunks": []}}]}),
        ] {
            let result = parse(value).into_search_result();
            assert_eq!(result.description(), NO_DESCRIPTION_PLACEHOLDER);
            assert!(result.citations().is_empty());
        }
    }

    #[test]
    fn only_first_candidate_is_read() {
        let response = parse(json!({
            "candidates": [
                {"content": {"parts": [{"text": "first"}]}},
                {
                    "content": {"parts": [{"text": "second"}]},
                    "groundingMetadata": {"groundingChunks": [
                        {"web": {"uri": "https://b.com", "title": "B"}},
                    ]},
                },
            ],
        }));
        assert_eq!(response.text().as_deref(), Some("first"));
        assert!(response.citations().is_empty());
    }
}
