use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use akahu_sync_core::{AccountRecord, AccountSnapshot};

use crate::{expect_success, ProviderError};

const BASE_URL: &str = "https://api.ynab.com/v1";
const PROVIDER: &str = "ynab";

#[derive(Debug, Clone)]
pub struct YnabConfig {
    pub bearer_token: String,
    pub budget_id: String,
}

pub struct YnabClient {
    http: reqwest::Client,
    config: YnabConfig,
}

/// A transaction in the shape YNAB's bulk-create endpoint expects.
/// Amounts are milliunits; `import_id` makes re-runs idempotent on the
/// server side.
#[derive(Debug, Clone, Serialize)]
pub struct NewYnabTransaction {
    pub account_id: String,
    pub date: NaiveDate,
    pub amount: i64,
    pub payee_name: String,
    pub memo: String,
    pub cleared: &'static str,
    pub import_id: String,
    pub flag_color: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YnabImportOutcome {
    pub created: usize,
    pub duplicates: usize,
}

impl YnabClient {
    pub fn new(config: YnabConfig) -> Self {
        YnabClient {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn budget_id(&self) -> &str {
        &self.config.budget_id
    }

    fn url(&self, tail: &str) -> String {
        format!("{BASE_URL}/budgets/{}/{tail}", self.config.budget_id)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.bearer_token)
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
            .bearer_auth(&self.config.bearer_token)
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
    /// Milliunit balances are converted to decimal dollars.
    pub async fn fetch_accounts(&self) -> Result<AccountSnapshot, ProviderError> {
        let envelope: Envelope<AccountsData> = self.get_json(&self.url("accounts")).await?;
        let snapshot: AccountSnapshot = envelope
            .data
            .accounts
            .into_iter()
            .filter(|a| !a.deleted && !a.closed)
            .enumerate()
            .map(|(idx, account)| {
                let record = account.into_record(idx as u64 + 1);
                (record.id.clone(), record)
            })
            .collect();
        info!(count = snapshot.len(), "Fetched YNAB accounts");
        Ok(snapshot)
    }

    /// Bulk-creates transactions. YNAB dedupes on `import_id`; the outcome
    /// separates newly created transactions from recognized duplicates.
    pub async fn create_transactions(
        &self,
        transactions: &[NewYnabTransaction],
    ) -> Result<YnabImportOutcome, ProviderError> {
        let body = serde_json::json!({ "transactions": transactions });
        let envelope: Envelope<SaveTransactionsData> =
            self.post_json(&self.url("transactions"), &body).await?;

        let outcome = YnabImportOutcome {
            created: envelope.data.transactions.len(),
            duplicates: envelope.data.duplicate_import_ids.len(),
        };
        if outcome.created == 0 {
            info!(duplicates = outcome.duplicates, "No new transactions loaded to YNAB");
        } else {
            info!(
                created = outcome.created,
                duplicates = outcome.duplicates,
                "Loaded transactions to YNAB"
            );
        }
        Ok(outcome)
    }

    /// Current cleared+uncleared balance for one account, in milliunits.
    pub async fn account_balance(&self, account_id: &str) -> Result<i64, ProviderError> {
        let envelope: Envelope<AccountData> = self
            .get_json(&self.url(&format!("accounts/{account_id}")))
            .await?;
        Ok(envelope.data.account.balance)
    }

    /// Writes a single reconciling transaction bringing the account balance
    /// to `target_milliunits`. Returns false (and writes nothing) when the
    /// balances already agree.
    pub async fn create_balance_adjustment(
        &self,
        account_id: &str,
        target_milliunits: i64,
        current_milliunits: i64,
    ) -> Result<bool, ProviderError> {
        let difference = target_milliunits - current_milliunits;
        if difference == 0 {
            info!(account_id, "No balance adjustment needed; balances already in sync");
            return Ok(false);
        }

        let memo = format!(
            "Adjusted from ${:.2} to ${:.2} based on retrieved balance",
            current_milliunits as f64 / 1000.0,
            target_milliunits as f64 / 1000.0
        );
        let body = serde_json::json!({
            "transaction": {
                "account_id": account_id,
                "date": chrono::Utc::now().date_naive(),
                "amount": difference,
                "payee_name": "Balance Adjustment",
                "memo": memo,
                "cleared": "cleared",
                "approved": true,
            }
        });
        let _: Envelope<serde_json::Value> =
            self.post_json(&self.url("transactions"), &body).await?;
        info!(account_id, difference, "Created YNAB balance adjustment");
        Ok(true)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct AccountsData {
    accounts: Vec<YnabAccount>,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    account: YnabAccount,
}

#[derive(Debug, Deserialize)]
struct SaveTransactionsData {
    #[serde(default)]
    transactions: Vec<serde_json::Value>,
    #[serde(default)]
    duplicate_import_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct YnabAccount {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    on_budget: bool,
    #[serde(default)]
    closed: bool,
    #[serde(default)]
    deleted: bool,
    /// Milliunits.
    balance: i64,
}

impl YnabAccount {
    fn into_record(self, seq: u64) -> AccountRecord {
        AccountRecord {
            id: self.id,
            name: self.name,
            balance: Decimal::new(self.balance, 3),
            kind: self.kind,
            connection: None,
            on_budget: Some(self.on_budget),
            date_first_loaded: None,
            seq: Some(seq),
        }
    }
}
