use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::account::{AccountClass, AccountSnapshot, Ledger};

/// The confirmed correspondence between one Akahu account and one ledger
/// account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerLink {
    pub account_id: String,
    /// The budget/file the ledger account lives in. Required before the link
    /// is used for sync; entries persisted by older versions may lack it and
    /// are backfilled from configuration at load time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_at: Option<DateTime<Utc>>,
    /// Last successful transaction/balance sync. Written only by the sync
    /// step, never by the reconciliation core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl LedgerLink {
    pub fn new(account_id: impl Into<String>) -> Self {
        LedgerLink {
            account_id: account_id.into(),
            budget_id: None,
            account_name: None,
            matched_at: None,
            synced_at: None,
        }
    }

    /// A link without a budget id is not usable for sync yet.
    pub fn is_complete(&self) -> bool {
        self.budget_id.is_some()
    }
}

/// One logical real-world account, keyed by its Akahu id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub akahu_id: String,
    pub akahu_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub akahu_balance: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_class: Option<AccountClass>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<Ledger, LedgerLink>,
    /// Ledgers the user has permanently declined to map this account into.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub do_not_map: BTreeSet<Ledger>,
}

impl MappingEntry {
    pub fn new(akahu_id: impl Into<String>, akahu_name: impl Into<String>) -> Self {
        MappingEntry {
            akahu_id: akahu_id.into(),
            akahu_name: akahu_name.into(),
            akahu_balance: None,
            account_class: None,
            links: BTreeMap::new(),
            do_not_map: BTreeSet::new(),
        }
    }

    pub fn link(&self, ledger: Ledger) -> Option<&LedgerLink> {
        self.links.get(&ledger)
    }

    pub fn link_mut(&mut self, ledger: Ledger) -> Option<&mut LedgerLink> {
        self.links.get_mut(&ledger)
    }

    pub fn set_link(&mut self, ledger: Ledger, link: LedgerLink) {
        self.links.insert(ledger, link);
    }

    /// True when the matcher should still offer this account for `ledger`:
    /// no confirmed link and no permanent do-not-map mark.
    pub fn is_unmapped_for(&self, ledger: Ledger) -> bool {
        !self.links.contains_key(&ledger) && !self.do_not_map.contains(&ledger)
    }

    pub fn mark_do_not_map(&mut self, ledger: Ledger) {
        self.do_not_map.insert(ledger);
    }
}

/// The sole persisted artifact: the last-seen snapshot per provider plus the
/// mapping itself. Loaded once at process start, mutated in memory, written
/// once at process end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingDocument {
    #[serde(default)]
    pub akahu_accounts: AccountSnapshot,
    #[serde(default)]
    pub ynab_accounts: AccountSnapshot,
    #[serde(default)]
    pub actual_accounts: AccountSnapshot,
    #[serde(default)]
    pub mapping: BTreeMap<String, MappingEntry>,
}

impl MappingDocument {
    pub fn accounts_for(&self, ledger: Ledger) -> &AccountSnapshot {
        match ledger {
            Ledger::Actual => &self.actual_accounts,
            Ledger::Ynab => &self.ynab_accounts,
        }
    }

    pub fn accounts_for_mut(&mut self, ledger: Ledger) -> &mut AccountSnapshot {
        match ledger {
            Ledger::Actual => &mut self.actual_accounts,
            Ledger::Ynab => &mut self.ynab_accounts,
        }
    }

    /// One-time migration for documents written before budget ids were
    /// recorded: any link for `ledger` that lacks one gets the currently
    /// configured budget id. Returns how many links were backfilled.
    pub fn backfill_budget_ids(&mut self, ledger: Ledger, budget_id: &str) -> usize {
        let mut updated = 0;
        for entry in self.mapping.values_mut() {
            if let Some(link) = entry.link_mut(ledger) {
                if link.budget_id.is_none() {
                    link.budget_id = Some(budget_id.to_string());
                    updated += 1;
                }
            }
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_until_linked_or_marked() {
        let mut entry = MappingEntry::new("acc_1", "Checking");
        assert!(entry.is_unmapped_for(Ledger::Ynab));
        assert!(entry.is_unmapped_for(Ledger::Actual));

        entry.set_link(Ledger::Ynab, LedgerLink::new("y1"));
        assert!(!entry.is_unmapped_for(Ledger::Ynab));
        assert!(entry.is_unmapped_for(Ledger::Actual));

        entry.mark_do_not_map(Ledger::Actual);
        assert!(!entry.is_unmapped_for(Ledger::Actual));
    }

    #[test]
    fn backfill_sets_missing_budget_ids_only() {
        let mut doc = MappingDocument::default();

        let mut legacy = MappingEntry::new("acc_1", "Checking");
        legacy.set_link(Ledger::Ynab, LedgerLink::new("y1"));
        doc.mapping.insert("acc_1".into(), legacy);

        let mut current = MappingEntry::new("acc_2", "Savings");
        let mut link = LedgerLink::new("y2");
        link.budget_id = Some("other-budget".into());
        current.set_link(Ledger::Ynab, link);
        doc.mapping.insert("acc_2".into(), current);

        assert_eq!(doc.backfill_budget_ids(Ledger::Ynab, "budget-1"), 1);

        let backfilled = doc.mapping["acc_1"].link(Ledger::Ynab).unwrap();
        assert_eq!(backfilled.budget_id.as_deref(), Some("budget-1"));
        assert!(backfilled.is_complete());

        let untouched = doc.mapping["acc_2"].link(Ledger::Ynab).unwrap();
        assert_eq!(untouched.budget_id.as_deref(), Some("other-budget"));
    }

    #[test]
    fn document_round_trips_through_json() {
        let mut doc = MappingDocument::default();
        let mut entry = MappingEntry::new("acc_1", "Checking");
        let mut link = LedgerLink::new("y1");
        link.budget_id = Some("budget-1".into());
        link.account_name = Some("Spending".into());
        entry.set_link(Ledger::Ynab, link);
        entry.mark_do_not_map(Ledger::Actual);
        doc.mapping.insert("acc_1".into(), entry);

        let json = serde_json::to_string_pretty(&doc).unwrap();
        let restored: MappingDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, doc);
    }

    #[test]
    fn empty_collections_are_omitted_from_entries() {
        let entry = MappingEntry::new("acc_1", "Checking");
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("links").is_none());
        assert!(json.get("do_not_map").is_none());
    }
}
