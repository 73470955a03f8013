//! Recommendation client: prompt construction and reply parsing.
//!
//! The model is asked for a bare JSON array of product ids. Replies are
//! untrusted text, so the payload is taken from the first `[` to the last
//! `]` and must parse as an array of integers.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::llm::{LlmClient, LlmError};

/// The only message users ever see when a recommendation cycle fails.
pub const USER_ERROR_MESSAGE: &str = "Sorry, I couldn't get recommendations. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    ApiRejected,
    ParseFailure,
}

#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("model API rejected the request: {0}")]
    ApiRejected(String),

    #[error("could not parse model reply: {reason}")]
    ParseFailure { reason: String, raw: String },
}

impl RecommendationError {
    fn parse(reason: impl Into<String>, raw: &str) -> Self {
        Self::ParseFailure {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::ApiRejected(_) => ErrorKind::ApiRejected,
            Self::ParseFailure { .. } => ErrorKind::ParseFailure,
        }
    }

    /// Same text for every kind.
    pub fn user_message(&self) -> &'static str {
        USER_ERROR_MESSAGE
    }
}

impl From<LlmError> for RecommendationError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Transport(msg) => Self::Transport(msg),
            LlmError::Rejected { .. } | LlmError::Malformed(_) => {
                Self::ApiRejected(err.to_string())
            }
        }
    }
}

/// Builds the prompt sent to the model for `query`.
pub fn build_prompt(query: &str, catalog_json: &str) -> String {
    format!(
        "Based on the following user query and product list, please recommend the best products.\n\
         User Query: \"{query}\"\n\
         \n\
         Product List (in JSON format):\n\
         {catalog_json}\n\
         \n\
         Your task is to return a JSON array of the integer 'id's of the recommended products.\n\
         For example: [1, 5, 8].\n\
         Return ONLY the JSON array and nothing else. Do not wrap it in markdown backticks."
    )
}

/// Extracts the id set from a model reply.
///
/// Takes the span from the first `[` to the last `]` inclusive. Anything
/// between them must be a JSON array of integers; nested or multiple
/// arrays in the reply end up in one span and usually fail here.
pub fn parse_ids(reply: &str) -> Result<BTreeSet<i64>, RecommendationError> {
    let start = reply
        .find('[')
        .ok_or_else(|| RecommendationError::parse("no '[' in reply", reply))?;
    let end = reply
        .rfind(']')
        .filter(|&end| end > start)
        .ok_or_else(|| RecommendationError::parse("no ']' after '['", reply))?;

    let payload = &reply[start..=end];
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| RecommendationError::parse(format!("invalid JSON: {e}"), reply))?;

    let items = value
        .as_array()
        .ok_or_else(|| RecommendationError::parse("payload is not an array", reply))?;

    let mut ids = BTreeSet::new();
    for item in items {
        match integer_id(item) {
            Some(Some(id)) => {
                ids.insert(id);
            }
            // Integer outside the id range: cannot match any product
            Some(None) => debug!("Ignoring out-of-range id {item}"),
            None => {
                return Err(RecommendationError::parse(
                    format!("element is not an integer: {item}"),
                    reply,
                ))
            }
        }
    }
    Ok(ids)
}

/// `None` when `item` is not a JSON integer, `Some(None)` when it is one
/// but does not fit in an `i64`.
fn integer_id(item: &Value) -> Option<Option<i64>> {
    let Value::Number(number) = item else {
        return None;
    };
    if let Some(id) = number.as_i64() {
        return Some(Some(id));
    }
    if number.is_u64() {
        return Some(None);
    }
    // Integer literals beyond u64 are read as floats
    let float = number.as_f64()?;
    let beyond_i64 = float.abs() >= 9_223_372_036_854_775_808.0;
    (float.fract() == 0.0 && beyond_i64).then_some(None)
}

/// Seam between the session controller and whatever picks products.
#[async_trait]
pub trait Recommender: Send + Sync {
    /// Never called with an empty query.
    async fn recommend(
        &self,
        query: &str,
        catalog: &Catalog,
    ) -> Result<BTreeSet<i64>, RecommendationError>;
}

/// Recommender backed by a generative model.
pub struct RecommendationClient {
    llm: Arc<dyn LlmClient>,
}

impl RecommendationClient {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn description(&self) -> String {
        self.llm.description()
    }
}

#[async_trait]
impl Recommender for RecommendationClient {
    async fn recommend(
        &self,
        query: &str,
        catalog: &Catalog,
    ) -> Result<BTreeSet<i64>, RecommendationError> {
        let prompt = build_prompt(query, catalog.prompt_json());

        let reply = self.llm.generate(&prompt).await?;
        debug!("Raw model response: {}", reply.text);

        let ids = parse_ids(&reply.text)?;
        info!("Model recommended {} product ids for {query:?}", ids.len());
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::product;
    use crate::llm::client::LlmResponse;
    use std::sync::Mutex;

    fn set(ids: &[i64]) -> BTreeSet<i64> {
        ids.iter().copied().collect()
    }

    // ── parse_ids ────────────────────────────────────────

    #[test]
    fn test_parse_plain_array() {
        assert_eq!(parse_ids("[1, 5, 8]").unwrap(), set(&[1, 5, 8]));
    }

    #[test]
    fn test_parse_with_surrounding_prose_and_duplicates() {
        assert_eq!(
            parse_ids("Here you go: [2, 7, 7, 9] enjoy!").unwrap(),
            set(&[2, 7, 9])
        );
    }

    #[test]
    fn test_parse_markdown_fenced() {
        assert_eq!(parse_ids("```json\n[3, 4]\n```").unwrap(), set(&[3, 4]));
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_ids("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_no_brackets() {
        let err = parse_ids("I cannot help").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);
    }

    #[test]
    fn test_parse_no_closing_bracket() {
        assert!(parse_ids("[1, 2").is_err());
    }

    #[test]
    fn test_parse_closing_before_opening() {
        assert!(parse_ids("] oops [").is_err());
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_ids("[1, 2,, 3]").unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn test_parse_rejects_non_integers() {
        assert!(parse_ids("[\"1\", \"2\"]").is_err());
        assert!(parse_ids("[1.5]").is_err());
        assert!(parse_ids("[1, null]").is_err());
    }

    #[test]
    fn test_parse_out_of_range_id_ignored() {
        assert_eq!(parse_ids("[2, 10000000000000000000]").unwrap(), set(&[2]));
        assert_eq!(
            parse_ids("[7, -99999999999999999999, 100000000000000000000]").unwrap(),
            set(&[7])
        );
    }

    #[test]
    fn test_parse_fraction_error_message() {
        let err = parse_ids("[2, 12.25]").unwrap_err();
        assert!(err.to_string().contains("element is not an integer"));
    }

    #[test]
    fn test_parse_multiple_arrays_spans_first_to_last() {
        // "[1] and [2]" → "[1] and [2]" which is not valid JSON
        assert!(parse_ids("Maybe [1] and [2]").is_err());
    }

    #[test]
    fn test_parse_nested_array_rejected() {
        assert!(parse_ids("[[1, 2], [3]]").is_err());
    }

    #[test]
    fn test_parse_failure_keeps_raw_reply() {
        match parse_ids("nothing here").unwrap_err() {
            RecommendationError::ParseFailure { raw, .. } => assert_eq!(raw, "nothing here"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    // ── prompt ───────────────────────────────────────────

    #[test]
    fn test_prompt_embeds_query_and_catalog() {
        let prompt = build_prompt("laptop under 60000", "[{\"id\": 1}]");
        assert!(prompt.contains("User Query: \"laptop under 60000\""));
        assert!(prompt.contains("[{\"id\": 1}]"));
        assert!(prompt.contains("Return ONLY the JSON array"));
        assert!(prompt.contains("Do not wrap it in markdown backticks"));
    }

    // ── errors ───────────────────────────────────────────

    #[test]
    fn test_error_mapping_from_llm() {
        let transport: RecommendationError = LlmError::Transport("reset".to_string()).into();
        assert_eq!(transport.kind(), ErrorKind::Transport);

        let rejected: RecommendationError = LlmError::Rejected {
            status: 500,
            body: "boom".to_string(),
        }
        .into();
        assert_eq!(rejected.kind(), ErrorKind::ApiRejected);

        let malformed: RecommendationError = LlmError::Malformed("no candidates".to_string()).into();
        assert_eq!(malformed.kind(), ErrorKind::ApiRejected);
    }

    #[test]
    fn test_user_message_is_uniform() {
        let errors = [
            RecommendationError::Transport("x".to_string()),
            RecommendationError::ApiRejected("y".to_string()),
            RecommendationError::parse("z", "raw"),
        ];
        for err in &errors {
            assert_eq!(err.user_message(), USER_ERROR_MESSAGE);
        }
    }

    // ── RecommendationClient with a scripted LLM ─────────

    struct ScriptedLlm {
        reply: Result<String, LlmError>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(reply: Result<String, LlmError>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate(&self, prompt: &str) -> Result<LlmResponse, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(LlmResponse {
                    text: text.clone(),
                    input_tokens: 0,
                    output_tokens: 0,
                }),
                Err(LlmError::Transport(m)) => Err(LlmError::Transport(m.clone())),
                Err(LlmError::Rejected { status, body }) => Err(LlmError::Rejected {
                    status: *status,
                    body: body.clone(),
                }),
                Err(LlmError::Malformed(m)) => Err(LlmError::Malformed(m.clone())),
            }
        }

        fn description(&self) -> String {
            "scripted (test)".to_string()
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            product(2, "Phone", 100.0),
            product(7, "Laptop", 200.0),
            product(9, "Watch", 50.0),
            product(11, "Speaker", 75.0),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_recommend_round_trip() {
        let llm = ScriptedLlm::new(Ok("Here you go: [2, 7, 7, 9] enjoy!".to_string()));
        let client = RecommendationClient::new(llm.clone());
        let catalog = catalog();

        let ids = client.recommend("gadgets", &catalog).await.unwrap();
        assert_eq!(ids, set(&[2, 7, 9]));

        let names: Vec<_> = catalog
            .filter_by_ids(&ids)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Phone", "Laptop", "Watch"]);

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("User Query: \"gadgets\""));
        assert!(prompts[0].contains("\"name\": \"Speaker\""));
    }

    #[tokio::test]
    async fn test_recommend_transport_failure() {
        let llm = ScriptedLlm::new(Err(LlmError::Transport("connection refused".to_string())));
        let client = RecommendationClient::new(llm);
        let err = client.recommend("x", &catalog()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_recommend_unparseable_reply() {
        let llm = ScriptedLlm::new(Ok("I cannot help".to_string()));
        let client = RecommendationClient::new(llm);
        let err = client.recommend("x", &catalog()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseFailure);
    }

    #[test]
    fn test_description_delegates() {
        let client = RecommendationClient::new(ScriptedLlm::new(Ok("[]".to_string())));
        assert_eq!(client.description(), "scripted (test)");
    }
}
