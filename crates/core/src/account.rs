use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A budgeting system that Akahu accounts can be mapped into.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Ledger {
    Actual,
    Ynab,
}

impl Ledger {
    pub const ALL: [Ledger; 2] = [Ledger::Actual, Ledger::Ynab];

    /// The other budgeting system — used to show cross-ledger hints when
    /// matching ("already mapped to X in YNAB").
    pub fn other(self) -> Ledger {
        match self {
            Ledger::Actual => Ledger::Ynab,
            Ledger::Ynab => Ledger::Actual,
        }
    }

    /// Human-facing name for prompts and log lines.
    pub fn label(self) -> &'static str {
        match self {
            Ledger::Actual => "Actual Budget",
            Ledger::Ynab => "YNAB",
        }
    }
}

impl fmt::Display for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ledger::Actual => write!(f, "actual"),
            Ledger::Ynab => write!(f, "ynab"),
        }
    }
}

impl std::str::FromStr for Ledger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "actual" => Ok(Ledger::Actual),
            "ynab" => Ok(Ledger::Ynab),
            other => Err(format!("Unknown ledger: '{other}'")),
        }
    }
}

/// Whether a ledger account participates in the budget or only tracks a
/// balance. YNAB is authoritative when the two ledgers disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountClass {
    #[serde(rename = "On Budget")]
    OnBudget,
    Tracking,
}

impl fmt::Display for AccountClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountClass::OnBudget => write!(f, "On Budget"),
            AccountClass::Tracking => write!(f, "Tracking"),
        }
    }
}

/// One account as reported by a provider. Immutable once fetched, except for
/// `date_first_loaded`, which the merger stamps the first time an account is
/// seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: String,
    pub name: String,
    pub balance: Decimal,
    /// Provider-native classification ("checking", "savings", ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Akahu bank connection name, shown when matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_budget: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_first_loaded: Option<DateTime<Utc>>,
    /// Opaque provider-assigned ordering token. Volatile: providers rotate it
    /// without the underlying data changing, so it is excluded from change
    /// detection and never written to disk.
    #[serde(default, skip_serializing)]
    pub seq: Option<u64>,
}

impl AccountRecord {
    /// Equality on the fields that matter for sync: everything except the
    /// ordering token and the first-loaded bookkeeping stamp.
    pub fn sync_relevant_eq(&self, other: &AccountRecord) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.balance == other.balance
            && self.kind == other.kind
            && self.connection == other.connection
            && self.on_budget == other.on_budget
    }

    pub fn account_class(&self) -> Option<AccountClass> {
        self.on_budget.map(|on_budget| {
            if on_budget {
                AccountClass::OnBudget
            } else {
                AccountClass::Tracking
            }
        })
    }
}

/// A complete, consistent account list from one provider, keyed by the
/// provider-native account id. Replaced wholesale on each run.
pub type AccountSnapshot = BTreeMap<String, AccountRecord>;

/// Accounts ordered case-insensitively by display name (id as tie-break), for
/// deterministic, human-friendly presentation.
pub fn sorted_by_name(snapshot: &AccountSnapshot) -> Vec<&AccountRecord> {
    let mut accounts: Vec<&AccountRecord> = snapshot.values().collect();
    accounts.sort_by(|a, b| {
        (a.name.to_lowercase(), &a.id).cmp(&(b.name.to_lowercase(), &b.id))
    });
    accounts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, name: &str) -> AccountRecord {
        AccountRecord {
            id: id.to_string(),
            name: name.to_string(),
            balance: Decimal::new(10_000, 2),
            kind: "checking".to_string(),
            connection: None,
            on_budget: None,
            date_first_loaded: None,
            seq: None,
        }
    }

    #[test]
    fn sorted_by_name_is_case_insensitive() {
        let mut snapshot = AccountSnapshot::new();
        snapshot.insert("a3".into(), record("a3", "savings"));
        snapshot.insert("a1".into(), record("a1", "Checking"));
        snapshot.insert("a2".into(), record("a2", "Rainy day"));
        let names: Vec<&str> = sorted_by_name(&snapshot)
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(names, vec!["Checking", "Rainy day", "savings"]);
    }

    #[test]
    fn sync_relevant_eq_ignores_seq_and_first_loaded() {
        let a = record("a1", "Checking");
        let mut b = record("a1", "Checking");
        b.seq = Some(7);
        b.date_first_loaded = Some(Utc::now());
        assert!(a.sync_relevant_eq(&b));
    }

    #[test]
    fn sync_relevant_eq_sees_renames_and_balance_changes() {
        let a = record("a1", "Checking");
        let mut renamed = record("a1", "Everyday");
        assert!(!a.sync_relevant_eq(&renamed));
        renamed.name = "Checking".to_string();
        renamed.balance = Decimal::new(10_001, 2);
        assert!(!a.sync_relevant_eq(&renamed));
    }

    #[test]
    fn seq_is_never_serialized() {
        let mut rec = record("a1", "Checking");
        rec.seq = Some(3);
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("seq").is_none());
    }

    #[test]
    fn seq_is_accepted_on_deserialize() {
        let rec: AccountRecord = serde_json::from_value(serde_json::json!({
            "id": "a1",
            "name": "Checking",
            "balance": "100.00",
            "type": "checking",
            "seq": 4,
        }))
        .unwrap();
        assert_eq!(rec.seq, Some(4));
    }

    #[test]
    fn ledger_round_trips_through_str() {
        for ledger in Ledger::ALL {
            assert_eq!(ledger.to_string().parse::<Ledger>().unwrap(), ledger);
        }
        assert!("mint".parse::<Ledger>().is_err());
    }
}
