use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info, warn};

use akahu_sync_core::{
    sorted_by_name, AccountRecord, AccountSnapshot, Ledger, LedgerLink, MappingEntry,
};

use crate::suggest::Suggester;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("failed to read a match decision: {0}")]
    Resolver(#[from] std::io::Error),
}

/// The outcome of presenting one unmapped account to the confirmation
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Link the account to this target account id.
    Confirm(String),
    /// Leave unmapped for now; re-offered on the next run.
    Skip,
    /// Permanently mark the account as do-not-map for this ledger.
    Never,
}

/// One selectable target account, numbered for display.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    /// 1-based display position within the candidate list.
    pub position: usize,
    pub account: &'a AccountRecord,
    /// Already linked from another mapping entry; cannot be confirmed again.
    pub claimed: bool,
}

/// Everything the confirmation boundary needs to render one question.
#[derive(Debug)]
pub struct MatchPrompt<'a> {
    pub ledger: Ledger,
    pub source: &'a AccountRecord,
    /// Display name of this account's link in the other ledger, if any.
    pub mapped_elsewhere: Option<String>,
    pub candidates: &'a [Candidate<'a>],
    /// Display position of the suggested candidate, if one cleared the bar.
    pub suggestion: Option<usize>,
}

/// The confirmation boundary: a human at a terminal in the binary, a
/// scripted double in tests.
pub trait Resolver {
    fn resolve(&mut self, prompt: &MatchPrompt<'_>) -> Result<Decision, MatchError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchSummary {
    pub asked: usize,
    pub confirmed: usize,
    pub skipped: usize,
    pub marked_never: usize,
}

/// Walks every Akahu account that lacks a link for `ledger` (in
/// case-insensitive name order), asking the resolver to confirm, skip, or
/// permanently decline a correspondence. Asks at most one question per
/// unmapped account. Confirmed links are written with the currently
/// configured `budget_id`; skips leave no trace and are re-offered next run.
pub async fn match_accounts<S, R>(
    mapping: &mut BTreeMap<String, MappingEntry>,
    akahu_accounts: &AccountSnapshot,
    target_accounts: &AccountSnapshot,
    ledger: Ledger,
    budget_id: &str,
    suggester: &S,
    resolver: &mut R,
) -> Result<MatchSummary, MatchError>
where
    S: Suggester,
    R: Resolver,
{
    let targets = sorted_by_name(target_accounts);
    let mut summary = MatchSummary::default();

    for source in sorted_by_name(akahu_accounts) {
        if mapping
            .get(&source.id)
            .is_some_and(|entry| !entry.is_unmapped_for(ledger))
        {
            debug!(akahu_id = %source.id, ledger = %ledger, "Already mapped or marked do-not-map, skipping");
            continue;
        }

        let claimed: BTreeSet<&str> = mapping
            .values()
            .filter_map(|entry| entry.link(ledger))
            .map(|link| link.account_id.as_str())
            .collect();
        let candidates: Vec<Candidate<'_>> = targets
            .iter()
            .enumerate()
            .map(|(idx, account)| Candidate {
                position: idx + 1,
                account,
                claimed: claimed.contains(account.id.as_str()),
            })
            .collect();

        let suggestion = suggester
            .suggest(source, &candidates)
            .await
            .and_then(|id| {
                candidates
                    .iter()
                    .find(|c| c.account.id == id && !c.claimed)
                    .map(|c| c.position)
            });

        let mapped_elsewhere = mapping
            .get(&source.id)
            .and_then(|entry| entry.link(ledger.other()))
            .and_then(|link| link.account_name.clone());

        let prompt = MatchPrompt {
            ledger,
            source,
            mapped_elsewhere,
            candidates: &candidates,
            suggestion,
        };
        summary.asked += 1;

        match resolver.resolve(&prompt)? {
            Decision::Confirm(target_id) => {
                let Some(candidate) = candidates.iter().find(|c| c.account.id == target_id)
                else {
                    warn!(target_id = %target_id, "Confirmed account id is not a candidate, leaving unmapped");
                    summary.skipped += 1;
                    continue;
                };
                if candidate.claimed {
                    warn!(target_id = %target_id, "Target account is already mapped, leaving unmapped");
                    summary.skipped += 1;
                    continue;
                }
                confirm_link(mapping, source, candidate.account, ledger, budget_id);
                info!(
                    akahu = %source.name,
                    target = %candidate.account.name,
                    ledger = %ledger,
                    "Mapped account"
                );
                summary.confirmed += 1;
            }
            Decision::Skip => {
                summary.skipped += 1;
            }
            Decision::Never => {
                let entry = mapping
                    .entry(source.id.clone())
                    .or_insert_with(|| MappingEntry::new(&source.id, &source.name));
                entry.akahu_name = source.name.clone();
                entry.mark_do_not_map(ledger);
                info!(akahu = %source.name, ledger = %ledger, "Marked account as do-not-map");
                summary.marked_never += 1;
            }
        }
    }

    Ok(summary)
}

fn confirm_link(
    mapping: &mut BTreeMap<String, MappingEntry>,
    source: &AccountRecord,
    target: &AccountRecord,
    ledger: Ledger,
    budget_id: &str,
) {
    let entry = mapping
        .entry(source.id.clone())
        .or_insert_with(|| MappingEntry::new(&source.id, &source.name));
    entry.akahu_name = source.name.clone();
    entry.akahu_balance = Some(source.balance);

    if let Some(class) = target.account_class() {
        match entry.account_class {
            Some(existing) if existing != class => {
                warn!(
                    akahu = %source.name,
                    previous = %existing,
                    ledger = %ledger,
                    now = %class,
                    "Account class mismatch between ledgers"
                );
                // YNAB is authoritative for the account class.
                if ledger == Ledger::Ynab {
                    entry.account_class = Some(class);
                }
            }
            None => entry.account_class = Some(class),
            _ => {}
        }
    }

    let mut link = LedgerLink::new(&target.id);
    link.budget_id = Some(budget_id.to_string());
    link.account_name = Some(target.name.clone());
    link.matched_at = Some(Utc::now());
    entry.set_link(ledger, link);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suggest::{NameSimilarity, NoSuggestions};
    use rust_decimal::Decimal;
    use std::collections::VecDeque;

    fn record(id: &str, name: &str) -> AccountRecord {
        AccountRecord {
            id: id.to_string(),
            name: name.to_string(),
            balance: Decimal::new(25_000, 2),
            kind: "checking".to_string(),
            connection: Some("ANZ".to_string()),
            on_budget: Some(true),
            date_first_loaded: None,
            seq: None,
        }
    }

    fn snapshot(records: Vec<AccountRecord>) -> AccountSnapshot {
        records.into_iter().map(|r| (r.id.clone(), r)).collect()
    }

    /// Scripted stand-in for the interactive boundary; records what it was
    /// asked.
    #[derive(Default)]
    struct Scripted {
        decisions: VecDeque<Decision>,
        asked_for: Vec<String>,
        suggestions_seen: Vec<Option<usize>>,
    }

    impl Scripted {
        fn with(decisions: Vec<Decision>) -> Self {
            Scripted {
                decisions: decisions.into(),
                ..Default::default()
            }
        }
    }

    impl Resolver for Scripted {
        fn resolve(&mut self, prompt: &MatchPrompt<'_>) -> Result<Decision, MatchError> {
            self.asked_for.push(prompt.source.name.clone());
            self.suggestions_seen.push(prompt.suggestion);
            Ok(self.decisions.pop_front().unwrap_or(Decision::Skip))
        }
    }

    #[tokio::test]
    async fn asks_once_per_unmapped_account_and_maps_all_confirmed() {
        let mut mapping = BTreeMap::new();
        let akahu = snapshot(vec![record("ak1", "Checking"), record("ak2", "Savings")]);
        let targets = snapshot(vec![record("y1", "Spending"), record("y2", "Rainy Day")]);

        let mut resolver = Scripted::with(vec![
            Decision::Confirm("y1".into()),
            Decision::Confirm("y2".into()),
        ]);
        let summary = match_accounts(
            &mut mapping,
            &akahu,
            &targets,
            Ledger::Ynab,
            "budget-1",
            &NoSuggestions,
            &mut resolver,
        )
        .await
        .unwrap();

        assert_eq!(summary.asked, 2);
        assert_eq!(summary.confirmed, 2);
        // Asked in case-insensitive name order.
        assert_eq!(resolver.asked_for, vec!["Checking", "Savings"]);
        for entry in mapping.values() {
            assert!(!entry.is_unmapped_for(Ledger::Ynab));
            let link = entry.link(Ledger::Ynab).unwrap();
            assert_eq!(link.budget_id.as_deref(), Some("budget-1"));
            assert!(link.matched_at.is_some());
        }
    }

    #[tokio::test]
    async fn confirmed_link_caches_names_and_class() {
        let mut mapping = BTreeMap::new();
        let akahu = snapshot(vec![record("ak1", "Checking")]);
        let mut tracking = record("y1", "Mortgage");
        tracking.on_budget = Some(false);
        let targets = snapshot(vec![tracking]);

        let mut resolver = Scripted::with(vec![Decision::Confirm("y1".into())]);
        match_accounts(
            &mut mapping,
            &akahu,
            &targets,
            Ledger::Ynab,
            "budget-1",
            &NoSuggestions,
            &mut resolver,
        )
        .await
        .unwrap();

        let entry = &mapping["ak1"];
        assert_eq!(entry.akahu_name, "Checking");
        assert_eq!(entry.account_class, Some(akahu_sync_core::AccountClass::Tracking));
        let link = entry.link(Ledger::Ynab).unwrap();
        assert_eq!(link.account_name.as_deref(), Some("Mortgage"));
    }

    #[tokio::test]
    async fn skipped_accounts_are_reoffered_next_run() {
        let mut mapping = BTreeMap::new();
        let akahu = snapshot(vec![record("ak1", "Checking")]);
        let targets = snapshot(vec![record("y1", "Spending")]);

        let mut first = Scripted::with(vec![Decision::Skip]);
        let summary = match_accounts(
            &mut mapping,
            &akahu,
            &targets,
            Ledger::Ynab,
            "budget-1",
            &NoSuggestions,
            &mut first,
        )
        .await
        .unwrap();
        assert_eq!(summary.skipped, 1);
        // A skip persists nothing.
        assert!(!mapping.contains_key("ak1"));

        let mut second = Scripted::with(vec![Decision::Skip]);
        match_accounts(
            &mut mapping,
            &akahu,
            &targets,
            Ledger::Ynab,
            "budget-1",
            &NoSuggestions,
            &mut second,
        )
        .await
        .unwrap();
        assert_eq!(second.asked_for, vec!["Checking"]);
    }

    #[tokio::test]
    async fn never_is_persisted_and_not_asked_again() {
        let mut mapping = BTreeMap::new();
        let akahu = snapshot(vec![record("ak1", "Checking")]);
        let targets = snapshot(vec![record("y1", "Spending")]);

        let mut first = Scripted::with(vec![Decision::Never]);
        match_accounts(
            &mut mapping,
            &akahu,
            &targets,
            Ledger::Ynab,
            "budget-1",
            &NoSuggestions,
            &mut first,
        )
        .await
        .unwrap();
        assert!(mapping["ak1"].do_not_map.contains(&Ledger::Ynab));

        let mut second = Scripted::default();
        let summary = match_accounts(
            &mut mapping,
            &akahu,
            &targets,
            Ledger::Ynab,
            "budget-1",
            &NoSuggestions,
            &mut second,
        )
        .await
        .unwrap();
        assert_eq!(summary.asked, 0);
    }

    #[tokio::test]
    async fn already_linked_accounts_are_not_offered() {
        let mut mapping = BTreeMap::new();
        let mut entry = MappingEntry::new("ak1", "Checking");
        entry.set_link(Ledger::Ynab, LedgerLink::new("y1"));
        mapping.insert("ak1".into(), entry);

        let akahu = snapshot(vec![record("ak1", "Checking")]);
        let targets = snapshot(vec![record("y1", "Spending")]);

        let mut resolver = Scripted::default();
        let summary = match_accounts(
            &mut mapping,
            &akahu,
            &targets,
            Ledger::Ynab,
            "budget-1",
            &NoSuggestions,
            &mut resolver,
        )
        .await
        .unwrap();
        assert_eq!(summary.asked, 0);
        // The confirmed link is untouched.
        assert_eq!(mapping["ak1"].link(Ledger::Ynab).unwrap().account_id, "y1");
    }

    #[tokio::test]
    async fn a_target_cannot_be_claimed_twice() {
        let mut mapping = BTreeMap::new();
        let akahu = snapshot(vec![record("ak1", "Checking"), record("ak2", "Savings")]);
        let targets = snapshot(vec![record("y1", "Spending")]);

        let mut resolver = Scripted::with(vec![
            Decision::Confirm("y1".into()),
            Decision::Confirm("y1".into()),
        ]);
        let summary = match_accounts(
            &mut mapping,
            &akahu,
            &targets,
            Ledger::Ynab,
            "budget-1",
            &NoSuggestions,
            &mut resolver,
        )
        .await
        .unwrap();

        assert_eq!(summary.confirmed, 1);
        assert_eq!(summary.skipped, 1);
        // The second account stays unmapped rather than stealing the link.
        assert!(!mapping.contains_key("ak2"));
    }

    #[tokio::test]
    async fn similarity_suggestion_reaches_the_prompt() {
        let mut mapping = BTreeMap::new();
        let akahu = snapshot(vec![record("ak1", "Everyday Checking")]);
        let targets = snapshot(vec![record("y1", "Holiday Fund"), record("y2", "Everyday Checking")]);

        let suggester = NameSimilarity::default();
        let mut resolver = Scripted::with(vec![Decision::Skip]);
        match_accounts(
            &mut mapping,
            &akahu,
            &targets,
            Ledger::Ynab,
            "budget-1",
            &suggester,
            &mut resolver,
        )
        .await
        .unwrap();

        // Targets sorted by name: 1 = Everyday Checking, 2 = Holiday Fund.
        assert_eq!(resolver.suggestions_seen, vec![Some(1)]);
    }
}
