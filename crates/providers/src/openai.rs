use serde::Deserialize;
use std::fmt::Write as _;
use tracing::{debug, warn};

use akahu_sync_core::AccountRecord;
use akahu_sync_reconcile::{Candidate, NameSimilarity, Suggester};

use crate::{expect_success, ProviderError};

const PROVIDER: &str = "openai";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        OpenAiConfig {
            api_key: api_key.into(),
            model: "gpt-4".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

/// Asks a chat model to pick the matching target account for a source
/// account. Any failure (transport, quota, unparseable answer) falls back to
/// name similarity, so an outage degrades suggestions instead of the match
/// pass.
pub struct OpenAiSuggester {
    http: reqwest::Client,
    config: OpenAiConfig,
    fallback: NameSimilarity,
}

impl OpenAiSuggester {
    pub fn new(config: OpenAiConfig) -> Self {
        OpenAiSuggester {
            http: reqwest::Client::new(),
            config,
            fallback: NameSimilarity::default(),
        }
    }

    fn build_prompt(source: &AccountRecord, candidates: &[Candidate<'_>]) -> String {
        let mut prompt = String::new();
        let _ = writeln!(
            prompt,
            "Which of the following accounts best matches the bank account \
             \"{}\"{}? Answer with the option number only.",
            source.name,
            source
                .connection
                .as_deref()
                .map(|c| format!(" at {c}"))
                .unwrap_or_default()
        );
        let _ = writeln!(prompt, "0. This account probably does not match any options");
        for candidate in candidates.iter().filter(|c| !c.claimed) {
            let _ = writeln!(prompt, "{}. {}", candidate.position, candidate.account.name);
        }
        prompt
    }

    async fn ask_model(
        &self,
        source: &AccountRecord,
        candidates: &[Candidate<'_>],
    ) -> Result<Option<String>, ProviderError> {
        let prompt = Self::build_prompt(source, candidates);
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": 2,
            "temperature": 0,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::http(PROVIDER, e))?;
        let completion: ChatCompletion = expect_success(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::http(PROVIDER, e))?;

        let answer = completion
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();
        debug!(source = %source.name, answer, "Model answered");

        match answer.parse::<usize>() {
            Ok(0) => Ok(None),
            Ok(position) => Ok(candidates
                .iter()
                .find(|c| c.position == position && !c.claimed)
                .map(|c| c.account.id.clone())),
            Err(_) => Err(ProviderError::Api {
                provider: PROVIDER,
                status: 200,
                body: format!("unparseable answer: {answer:?}"),
            }),
        }
    }
}

impl Suggester for OpenAiSuggester {
    async fn suggest(
        &self,
        source: &AccountRecord,
        candidates: &[Candidate<'_>],
    ) -> Option<String> {
        match self.ask_model(source, candidates).await {
            Ok(suggestion) => suggestion,
            Err(err) => {
                warn!(source = %source.name, error = %err, "Model suggestion failed, using name similarity");
                self.fallback.suggest(source, candidates).await
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: String,
}
