//! The answer-generation collaborator.
//!
//! Retrieval only decides which chunks ground an answer. Turning them into
//! prose is delegated to an [`AnswerGenerator`], typically an LLM client.

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by an answer generator.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// Credentials for the generation backend are not configured.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// The generation request failed.
    #[error("request failed: {0}")]
    Request(String),
}

/// Produces an answer to `query` grounded in `contexts`.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate a raw response from the ordered context texts and the query.
    async fn generate(
        &self,
        contexts: &[String],
        query: &str,
    ) -> std::result::Result<String, GeneratorError>;
}

/// Returned for a JSON object response that has no `answer` field.
pub const MISSING_ANSWER: &str = "No answer field found in the response.";

/// Extract the answer from a generator response.
///
/// Responses shaped like `{"thoughts": ..., "answer": "..."}` yield the
/// `answer` field, with non-string values rendered as JSON. A JSON object
/// without `answer` yields [`MISSING_ANSWER`]. Anything that is not a JSON
/// object is returned unchanged.
pub fn parse_answer(raw: &str) -> String {
    let Ok(serde_json::Value::Object(response)) = serde_json::from_str(raw.trim()) else {
        return raw.to_string();
    };
    match response.get("answer") {
        Some(serde_json::Value::String(answer)) => answer.clone(),
        Some(other) => other.to_string(),
        None => MISSING_ANSWER.to_string(),
    }
}
