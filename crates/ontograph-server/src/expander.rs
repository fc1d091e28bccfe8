use crate::config::ExpanderArgs;
use async_trait::async_trait;
use ontograph_core::{sanitize, OntographError, Suggestion, TopicExpander};
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Suggestion capability over an OpenAI-compatible chat completions
/// endpoint. One model is drawn at random from the configured pool per
/// call; there is no retry here — the engine finalizes a node on failure
/// and moves on.
pub struct ChatExpander {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    models: Vec<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct SubtopicsPayload {
    #[serde(default)]
    subtopics: Vec<SubtopicPayload>,
}

#[derive(Deserialize)]
struct SubtopicPayload {
    topic: String,
    #[serde(default)]
    importance: i64,
}

impl ChatExpander {
    pub fn from_args(args: &ExpanderArgs) -> anyhow::Result<Self> {
        if args.models.is_empty() {
            anyhow::bail!("model pool is empty");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(args.timeout_secs))
            .build()?;
        Ok(ChatExpander {
            client,
            base_url: args.base_url.trim_end_matches('/').to_string(),
            api_key: args.api_key.clone(),
            models: args.models.clone(),
        })
    }

    fn pick_model(&self) -> &str {
        self.models
            .choose(&mut rand::thread_rng())
            .expect("pool validated non-empty")
    }
}

#[async_trait]
impl TopicExpander for ChatExpander {
    async fn expand(
        &self,
        topic: &str,
        hierarchy: &[String],
    ) -> ontograph_core::Result<Vec<Suggestion>> {
        let model = self.pick_model();
        let prompt = build_expand_prompt(topic, &hierarchy.join(" > "));
        debug!(topic, model, "requesting subtopics");

        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": 512,
            "response_format": { "type": "json_object" },
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| OntographError::Expander(e.to_string()))?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OntographError::Expander(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| OntographError::Expander("empty completion".to_string()))?;

        parse_suggestions(content)
    }
}

/// Parse the `{"subtopics": [...]}` body out of a completion, tolerating
/// markdown code fences around the JSON.
fn parse_suggestions(content: &str) -> ontograph_core::Result<Vec<Suggestion>> {
    let body = strip_code_fences(content);
    let payload: SubtopicsPayload =
        serde_json::from_str(body).map_err(|e| OntographError::Expander(e.to_string()))?;
    Ok(sanitize(
        payload
            .subtopics
            .into_iter()
            .map(|s| Suggestion::new(s.topic, s.importance.clamp(0, 10) as u8))
            .collect(),
    ))
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Prompt for one expansion step. The path anchors the model at the right
/// granularity; the importance rubric feeds the engine's gating threshold.
fn build_expand_prompt(topic: &str, path: &str) -> String {
    format!(
        r#"You are generating a tree of all scientific knowledge.
Starting with root 'Knowledge' to branch out and include everything.
Domains, Objects (abstract / physical), Phenomenons, etc.
Only include what is scientifically recognized.

The current path is '{path}'. The current topic is '{topic}'.

Instructions:
1. Return only immediate subcategories of '{topic}' that are mutually exclusive, ontologically real, and scientifically recognized.
2. Exclude non-scientific concepts, cultural constructs, or vague ideas.
3. Keep granularity consistent: each child is exactly one level more specific than '{topic}'.
4. Do not jump multiple levels down the hierarchy.
5. Avoid pseudoscience, overlapping categories, and duplicate concepts.
6. Exclude non-technical, non-scientific and less rigorous topics (e.g. history, sociology, humanities).
7. Nest subcategories under the most fundamental parent possible.
8. Sort subtopics from most rigorous/fundamental to less rigorous. Prefer formal, axiomatized, mathematically grounded fields first; then empirical core sciences; then applied/less formal areas.
9. For each subtopic, assign an integer importance score from 0 to 10 representing how central/fundamental it is at this level.
   Meanings:
   - 0-2: Peripheral; strongly recommend not branching now
   - 3-4: Low priority; recommend not branching now
   - 5: Neutral
   - 6-7: Worth branching
   - 8-10: High priority; strongly recommend branching
   Only subtopics with importance >= 6 will be expanded downstream.
10. Dont cram in too much in the topic title. Keep it 3-4 words max, ideally 1-2.
11. Return strictly as JSON with this exact shape:
   {{
     "subtopics": [
       {{ "topic": "...", "importance": 0 }}
     ]
   }}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let content = r#"{"subtopics": [{"topic": "Physics", "importance": 9}, {"topic": "Chemistry", "importance": 8}]}"#;
        let suggestions = parse_suggestions(content).unwrap();
        assert_eq!(
            suggestions,
            vec![
                Suggestion::new("Physics", 9),
                Suggestion::new("Chemistry", 8)
            ]
        );
    }

    #[test]
    fn test_parse_fenced_json() {
        let content = "```json\n{\"subtopics\": [{\"topic\": \"Physics\", \"importance\": 9}]}\n```";
        let suggestions = parse_suggestions(content).unwrap();
        assert_eq!(suggestions, vec![Suggestion::new("Physics", 9)]);
    }

    #[test]
    fn test_parse_drops_blanks_and_clamps() {
        let content = r#"{"subtopics": [
            {"topic": "  ", "importance": 9},
            {"topic": "Physics", "importance": 15},
            {"topic": "Chemistry", "importance": -3}
        ]}"#;
        let suggestions = parse_suggestions(content).unwrap();
        assert_eq!(
            suggestions,
            vec![
                Suggestion::new("Physics", 10),
                Suggestion::new("Chemistry", 0)
            ]
        );
    }

    #[test]
    fn test_parse_missing_subtopics_is_empty() {
        assert!(parse_suggestions("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_suggestions("no json here").is_err());
    }
}
