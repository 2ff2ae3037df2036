//! Query expansion: one utterance in, up to three search queries out.
//!
//! The original utterance always comes first so its hits win deduplication.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;

use crate::core::config::defaults::ExpansionConfig;
use crate::llm::{GenerationRequest, TextGenerator};

const EXPANSION_INSTRUCTION: &str = "Rewrite the question below as 2-3 short search queries \
(5-15 words each). Each query should look at the question from a different angle: \
different wording, a more specific phrasing, or the underlying need. \
Return one query per line, with no commentary.";

pub struct QueryExpander {
    generator: Arc<dyn TextGenerator>,
    config: ExpansionConfig,
}

impl QueryExpander {
    pub fn new(generator: Arc<dyn TextGenerator>, config: ExpansionConfig) -> Self {
        Self { generator, config }
    }

    /// Expands `utterance` into `[utterance, variation...]`.
    ///
    /// Never fails: any generation problem degrades to `[utterance]`.
    pub async fn expand(&self, utterance: &str, model: &str) -> Vec<String> {
        let original = utterance.trim().to_string();
        if !self.config.enabled || self.config.max_variations == 0 || original.is_empty() {
            return vec![original];
        }

        let request = GenerationRequest::from_prompt(format!(
            "{}\n\nQuestion: {}",
            EXPANSION_INSTRUCTION, original
        ))
        .with_temperature(0.7)
        .with_max_tokens(self.config.max_tokens);

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let reply = match tokio::time::timeout(timeout, self.generator.generate(request, model)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(query = %original, error = %e, "Query expansion failed; using original query");
                return vec![original];
            }
            Err(_) => {
                tracing::warn!(query = %original, timeout = ?timeout, "Query expansion timed out; using original query");
                return vec![original];
            }
        };

        let variations = parse_variations(&reply, &original, self.config.max_variations);
        if variations.is_empty() {
            tracing::warn!(query = %original, "Query expansion returned no usable lines; using original query");
        }

        let mut queries = Vec::with_capacity(variations.len() + 1);
        queries.push(original);
        queries.extend(variations);
        queries
    }
}

// Leading "1." / "2)" numbering or a bullet marker.
static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+\s*[.):]|[-*•])\s*").expect("valid regex"));

/// Pulls up to `max` distinct variations out of a model reply.
pub(crate) fn parse_variations(reply: &str, original: &str, max: usize) -> Vec<String> {
    let original_lower = original.to_lowercase();
    let mut out: Vec<String> = Vec::new();

    for line in reply.lines() {
        let stripped = LIST_MARKER_RE.replace(line, "");
        let cleaned = stripped
            .trim()
            .trim_matches(|c| c == '"' || c == '\'' || c == '`')
            .trim();
        if cleaned.is_empty() {
            continue;
        }

        let lower = cleaned.to_lowercase();
        if lower == original_lower || out.iter().any(|q| q.to_lowercase() == lower) {
            continue;
        }

        out.push(cleaned.to_string());
        if out.len() >= max {
            break;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::FakeGenerator;

    #[test]
    fn strips_numbering_and_blank_lines() {
        let reply = "1. pricing plans and tiers\n\n2) monthly subscription cost\n3. enterprise pricing options";
        let parsed = parse_variations(reply, "What are your pricing plans?", 2);
        assert_eq!(
            parsed,
            vec!["pricing plans and tiers", "monthly subscription cost"]
        );
    }

    #[test]
    fn drops_lines_repeating_the_original() {
        let reply = "- What are your pricing plans?\n- \"cost of each plan\"";
        let parsed = parse_variations(reply, "What are your pricing plans?", 2);
        assert_eq!(parsed, vec!["cost of each plan"]);
    }

    #[tokio::test]
    async fn original_query_comes_first() {
        let generator = Arc::new(FakeGenerator::answering("x").with_expansion(Ok(
            "1. plan prices\n2. subscription tiers".to_string(),
        )));
        let expander = QueryExpander::new(generator, ExpansionConfig::default());

        let queries = expander.expand("What are your pricing plans?", "m").await;
        assert_eq!(
            queries,
            vec!["What are your pricing plans?", "plan prices", "subscription tiers"]
        );
    }

    #[tokio::test]
    async fn generation_failure_degrades_to_original() {
        let generator = Arc::new(FakeGenerator::answering("x").with_expansion(Err("backend down".into())));
        let expander = QueryExpander::new(generator, ExpansionConfig::default());

        let queries = expander.expand("Can I see a demo?", "m").await;
        assert_eq!(queries, vec!["Can I see a demo?"]);
    }

    #[tokio::test]
    async fn empty_reply_degrades_to_original() {
        let generator = Arc::new(FakeGenerator::answering("x").with_expansion(Ok("\n \n".into())));
        let expander = QueryExpander::new(generator, ExpansionConfig::default());

        assert_eq!(expander.expand("hours?", "m").await, vec!["hours?"]);
    }

    #[tokio::test]
    async fn disabled_expansion_skips_generation() {
        let generator = Arc::new(FakeGenerator::answering("x"));
        let config = ExpansionConfig {
            enabled: false,
            ..Default::default()
        };
        let expander = QueryExpander::new(generator.clone(), config);

        assert_eq!(expander.expand("hours?", "m").await, vec!["hours?"]);
        assert_eq!(generator.calls(), 0);
    }
}
