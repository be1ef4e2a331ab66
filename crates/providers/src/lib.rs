pub mod actual;
pub mod akahu;
pub mod convert;
pub mod openai;
pub mod ynab;

pub use actual::{ActualClient, ActualConfig, NewActualTransaction};
pub use akahu::{AkahuClient, AkahuConfig, AkahuTransaction};
pub use openai::{OpenAiConfig, OpenAiSuggester};
pub use ynab::{NewYnabTransaction, YnabClient, YnabConfig, YnabImportOutcome};

use thiserror::Error;

/// A provider fetch or write failed. Fatal for the run: a partial snapshot
/// would corrupt change detection, so there is no partial-provider
/// continuation and no retry here (that belongs to the transport, if
/// anywhere).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} returned HTTP {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{0} is not configured but the mapping references it")]
    MissingConfiguration(&'static str),
}

impl ProviderError {
    pub(crate) fn http(provider: &'static str, source: reqwest::Error) -> Self {
        ProviderError::Http { provider, source }
    }
}

/// Turns a non-2xx response into an `Api` error carrying the body.
pub(crate) async fn expect_success(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Api {
        provider,
        status: status.as_u16(),
        body,
    })
}
