//! Query expansion for episodic recall.
//!
//! One short model call turns the user prompt into a few search queries.
//! The original prompt always comes first, and any failure falls back to
//! searching with the prompt alone.

use memoria_core::error::ParseError;
use memoria_core::message::Message;
use memoria_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tracing::{debug, warn};

const EXPANSION_INSTRUCTIONS: &str = "You generate search queries to retrieve relevant user memories.
Return ONLY valid JSON: {\"queries\": [..]}.
Rules:
- Max 3 queries.
- Short, natural-language.
- Cover: (1) task intent, (2) user preferences/background, (3) key entities/keywords.
- Do not include explanations.";

const EXPANSION_MAX_TOKENS: u32 = 200;
const MAX_GENERATED_QUERIES: usize = 3;

pub struct QueryExpander {
    provider: Arc<dyn Provider>,
    model: String,
}

impl QueryExpander {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// `[prompt]` followed by up to three generated queries.
    pub async fn expand(&self, prompt: &str) -> Vec<String> {
        let mut request = ProviderRequest::new(
            self.model.clone(),
            vec![
                Message::system(EXPANSION_INSTRUCTIONS),
                Message::user(format!("User message:\n{prompt}\n\nJSON:")),
            ],
        );
        request.max_tokens = Some(EXPANSION_MAX_TOKENS);

        let generated = match self.provider.complete(request).await {
            Ok(response) => match parse_queries(&response.message.content) {
                Ok(queries) => queries,
                Err(e) => {
                    warn!(error = %e, "Query expansion returned unusable output");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!(error = %e, "Query expansion call failed");
                Vec::new()
            }
        };

        debug!(generated = generated.len(), "Expanded memory queries");
        std::iter::once(prompt.to_string())
            .chain(generated.into_iter().take(MAX_GENERATED_QUERIES))
            .collect()
    }
}

/// Parse `{"queries": [...]}`. Non-string and blank entries are dropped and
/// the rest trimmed.
pub fn parse_queries(text: &str) -> Result<Vec<String>, ParseError> {
    let value: serde_json::Value = serde_json::from_str(text.trim())
        .map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    let queries = value
        .get("queries")
        .and_then(|q| q.as_array())
        .ok_or(ParseError::MissingField("queries"))?;

    Ok(queries
        .iter()
        .filter_map(|q| q.as_str())
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect())
}
