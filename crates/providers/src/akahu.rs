use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use akahu_sync_core::{AccountRecord, AccountSnapshot};

use crate::{expect_success, ProviderError};

const BASE_URL: &str = "https://api.akahu.io/v1";
const PROVIDER: &str = "akahu";

#[derive(Debug, Clone)]
pub struct AkahuConfig {
    pub user_token: String,
    pub app_token: String,
}

pub struct AkahuClient {
    http: reqwest::Client,
    config: AkahuConfig,
}

impl AkahuClient {
    pub fn new(config: AkahuConfig) -> Self {
        AkahuClient {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<T, ProviderError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.user_token)
            .header("X-Akahu-ID", &self.config.app_token)
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::http(PROVIDER, e))?;
        expect_success(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::http(PROVIDER, e))
    }

    /// Fetches the complete account list as a snapshot. The list position
    /// becomes the record's ordering token.
    pub async fn fetch_accounts(&self) -> Result<AccountSnapshot, ProviderError> {
        let page: ItemsResponse<AkahuAccount> =
            self.get_json(&format!("{BASE_URL}/accounts"), &[]).await?;
        let snapshot: AccountSnapshot = page
            .items
            .into_iter()
            .enumerate()
            .map(|(idx, account)| {
                let record = account.into_record(idx as u64 + 1);
                (record.id.clone(), record)
            })
            .collect();
        info!(count = snapshot.len(), "Fetched Akahu accounts");
        Ok(snapshot)
    }

    /// Fetches all transactions for one account, following cursor pagination
    /// until exhausted so the caller always sees a fully assembled result.
    /// The window starts one week before `last_synced` to pick up
    /// late-settling transactions, or at a fixed epoch on a first sync.
    pub async fn fetch_transactions(
        &self,
        account_id: &str,
        last_synced: Option<DateTime<Utc>>,
    ) -> Result<Vec<AkahuTransaction>, ProviderError> {
        let start = match last_synced {
            Some(at) => at - Duration::weeks(1),
            None => Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
        };

        let url = format!("{BASE_URL}/accounts/{account_id}/transactions");
        let mut transactions = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![(
                "start".to_string(),
                start.to_rfc3339_opts(SecondsFormat::Secs, true),
            )];
            if let Some(next) = &cursor {
                query.push(("cursor".to_string(), next.clone()));
            }

            let page: ItemsResponse<AkahuTransaction> = self.get_json(&url, &query).await?;
            let fetched = page.items.len();
            debug!(account_id, fetched, "Fetched a page of Akahu transactions");
            transactions.extend(page.items);

            cursor = match page.cursor.and_then(|c| c.next) {
                Some(next) if fetched > 0 => Some(next),
                _ => break,
            };
        }

        info!(
            account_id,
            count = transactions.len(),
            "Finished reading Akahu transactions"
        );
        Ok(transactions)
    }
}

#[derive(Debug, Deserialize)]
struct ItemsResponse<T> {
    items: Vec<T>,
    #[serde(default)]
    cursor: Option<PageCursor>,
}

#[derive(Debug, Deserialize)]
struct PageCursor {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AkahuAccount {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    connection: Option<AkahuConnection>,
    #[serde(default)]
    balance: Option<AkahuBalance>,
}

#[derive(Debug, Deserialize)]
struct AkahuConnection {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AkahuBalance {
    current: Decimal,
}

impl AkahuAccount {
    fn into_record(self, seq: u64) -> AccountRecord {
        AccountRecord {
            id: self.id,
            name: self.name,
            balance: self.balance.map(|b| b.current).unwrap_or(Decimal::ZERO),
            kind: self.kind,
            connection: self.connection.map(|c| c.name),
            on_budget: None,
            date_first_loaded: None,
            seq: Some(seq),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AkahuTransaction {
    #[serde(rename = "_id")]
    pub id: String,
    pub date: DateTime<Utc>,
    pub description: String,
    pub amount: Decimal,
    #[serde(default)]
    pub merchant: Option<Merchant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Merchant {
    pub name: String,
}
