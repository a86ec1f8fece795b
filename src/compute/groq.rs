//! Groq strategy — asks an OpenAI-compatible chat completion for the answer.

use async_trait::async_trait;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

use crate::compute::ComputeStrategy;
use crate::error::StrategyError;
use crate::job::model::Operation;

/// Chat completions endpoint of the Groq API.
const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Model used for arithmetic prompts.
pub const GROQ_MODEL: &str = "llama-3.1-8b-instant";

const STRATEGY_NAME: &str = "groq";

/// Computes answers by prompting a Groq-hosted model.
///
/// Responses are free text, so the first numeric token is extracted; a reply
/// carrying an error marker, or no number at all, is a strategy failure and
/// the caller falls back to the deterministic kernel.
pub struct GroqStrategy {
    client: reqwest::Client,
    api_key: SecretString,
    number_re: Regex,
}

impl GroqStrategy {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            number_re: Regex::new(r"-?\d+\.?\d*").unwrap(),
        }
    }

    /// Extract the numeric answer from a model reply.
    fn parse_answer(&self, reply: &str) -> Result<f64, StrategyError> {
        if reply.contains("ERROR") || reply.contains("Division by zero") {
            return Err(StrategyError::InvalidResponse {
                name: STRATEGY_NAME.into(),
                reason: format!("model signalled an error: {reply}"),
            });
        }

        let matched = self.number_re.find(reply).ok_or_else(|| {
            StrategyError::InvalidResponse {
                name: STRATEGY_NAME.into(),
                reason: format!("no number in reply: {reply:?}"),
            }
        })?;

        matched
            .as_str()
            .parse()
            .map_err(|_| StrategyError::InvalidResponse {
                name: STRATEGY_NAME.into(),
                reason: format!("unparseable number in reply: {reply:?}"),
            })
    }
}

/// Build the single-turn arithmetic prompt.
fn build_prompt(operation: Operation, a: f64, b: f64) -> String {
    format!("Calculate {a} {} {b}. Return ONLY the number.", operation.symbol())
}

#[async_trait]
impl ComputeStrategy for GroqStrategy {
    fn name(&self) -> &str {
        STRATEGY_NAME
    }

    async fn try_compute(
        &self,
        operation: Operation,
        a: f64,
        b: f64,
    ) -> Result<f64, StrategyError> {
        let body = serde_json::json!({
            "model": GROQ_MODEL,
            "messages": [{
                "role": "user",
                "content": build_prompt(operation, a, b),
            }],
            "temperature": 0,
            "max_tokens": 50,
        });

        let response = self
            .client
            .post(GROQ_API_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| StrategyError::RequestFailed {
                name: STRATEGY_NAME.into(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(StrategyError::RequestFailed {
                name: STRATEGY_NAME.into(),
                reason: format!("HTTP {status}: {error_body}"),
            });
        }

        let data: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| StrategyError::InvalidResponse {
                    name: STRATEGY_NAME.into(),
                    reason: e.to_string(),
                })?;

        let reply = data
            .get("choices")
            .and_then(serde_json::Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
            .trim();

        self.parse_answer(reply)
    }
}
