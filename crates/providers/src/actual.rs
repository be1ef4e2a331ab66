use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use akahu_sync_core::{AccountRecord, AccountSnapshot};

use crate::{expect_success, ProviderError};

const PROVIDER: &str = "actual";

#[derive(Debug, Clone)]
pub struct ActualConfig {
    /// Base URL of the actual-http-api bridge, e.g. `http://localhost:5007`.
    pub server_url: String,
    pub password: String,
    /// The budget's sync id (Settings -> Advanced in Actual).
    pub sync_id: String,
}

pub struct ActualClient {
    http: reqwest::Client,
    config: ActualConfig,
}

/// A transaction in the shape Actual's import endpoint expects. Amounts are
/// integer cents; `imported_id` drives server-side dedup on re-runs.
#[derive(Debug, Clone, Serialize)]
pub struct NewActualTransaction {
    pub date: NaiveDate,
    pub amount: i64,
    pub payee_name: String,
    pub notes: String,
    pub imported_id: String,
    pub cleared: bool,
}

impl ActualClient {
    pub fn new(config: ActualConfig) -> Self {
        ActualClient {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn sync_id(&self) -> &str {
        &self.config.sync_id
    }

    fn url(&self, tail: &str) -> String {
        format!(
            "{}/v1/budgets/{}/{tail}",
            self.config.server_url.trim_end_matches('/'),
            self.config.sync_id
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .http
            .get(url)
            .header("x-api-key", &self.config.password)
            .send()
            .await
            .map_err(|e| ProviderError::http(PROVIDER, e))?;
        expect_success(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::http(PROVIDER, e))
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<T, ProviderError> {
        let response = self
            .http
            .post(url)
            .header("x-api-key", &self.config.password)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::http(PROVIDER, e))?;
        expect_success(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::http(PROVIDER, e))
    }

    /// Fetches open accounts for the configured budget as a snapshot.
    /// Cent balances are converted to decimal dollars.
    pub async fn fetch_accounts(&self) -> Result<AccountSnapshot, ProviderError> {
        let envelope: DataEnvelope<Vec<ActualAccount>> =
            self.get_json(&self.url("accounts")).await?;
        let snapshot: AccountSnapshot = envelope
            .data
            .into_iter()
            .filter(|a| !a.closed)
            .enumerate()
            .map(|(idx, account)| {
                let record = account.into_record(idx as u64 + 1);
                (record.id.clone(), record)
            })
            .collect();
        info!(count = snapshot.len(), "Fetched Actual accounts");
        Ok(snapshot)
    }

    /// Imports transactions into one account. Actual dedupes on
    /// `imported_id`; returns how many were actually added.
    pub async fn import_transactions(
        &self,
        account_id: &str,
        transactions: &[NewActualTransaction],
    ) -> Result<usize, ProviderError> {
        let body = serde_json::json!({ "transactions": transactions });
        let envelope: DataEnvelope<ImportResult> = self
            .post_json(
                &self.url(&format!("accounts/{account_id}/transactions/import")),
                &body,
            )
            .await?;

        let added = envelope.data.added.len();
        if added == 0 {
            info!(account_id, "No new transactions loaded to Actual");
        } else {
            info!(account_id, added, "Loaded transactions to Actual");
        }
        Ok(added)
    }

    /// Current account balance, in cents.
    pub async fn account_balance(&self, account_id: &str) -> Result<i64, ProviderError> {
        let envelope: DataEnvelope<i64> = self
            .get_json(&self.url(&format!("accounts/{account_id}/balance")))
            .await?;
        Ok(envelope.data)
    }

    /// Writes a single reconciling transaction bringing the account balance
    /// to `target_cents`. Returns false (and writes nothing) when the
    /// balances already agree.
    pub async fn create_balance_adjustment(
        &self,
        account_id: &str,
        target_cents: i64,
        current_cents: i64,
    ) -> Result<bool, ProviderError> {
        let difference = target_cents - current_cents;
        if difference == 0 {
            info!(account_id, "No balance adjustment needed; balances already in sync");
            return Ok(false);
        }

        let adjustment = NewActualTransaction {
            date: chrono::Utc::now().date_naive(),
            amount: difference,
            payee_name: "Balance Adjustment".to_string(),
            notes: format!(
                "Adjusted from ${:.2} to ${:.2} to reconcile tracking account.",
                current_cents as f64 / 100.0,
                target_cents as f64 / 100.0
            ),
            imported_id: format!("adjustment_{}", chrono::Utc::now().timestamp()),
            cleared: true,
        };
        self.import_transactions(account_id, std::slice::from_ref(&adjustment))
            .await?;
        info!(account_id, difference, "Created Actual balance adjustment");
        Ok(true)
    }
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ImportResult {
    #[serde(default)]
    added: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ActualAccount {
    id: String,
    name: String,
    #[serde(default)]
    offbudget: bool,
    #[serde(default)]
    closed: bool,
    /// Cents.
    #[serde(default)]
    balance: i64,
}

impl ActualAccount {
    fn into_record(self, seq: u64) -> AccountRecord {
        let kind = if self.offbudget { "tracking" } else { "budget" };
        AccountRecord {
            id: self.id,
            name: self.name,
            balance: Decimal::new(self.balance, 2),
            kind: kind.to_string(),
            connection: None,
            on_budget: Some(!self.offbudget),
            date_first_loaded: None,
            seq: Some(seq),
        }
    }
}
