use std::io::{self, Write};

use anyhow::Context;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info, warn};

use akahu_sync_core::{AccountClass, Ledger, MappingDocument};
use akahu_sync_providers::{
    convert, ActualClient, AkahuClient, OpenAiSuggester, ProviderError, YnabClient,
};
use akahu_sync_reconcile::{
    check_for_changes, match_accounts, merge, prune_vanished, MatchSummary, NameSimilarity,
    Suggester, Vanished,
};
use akahu_sync_storage::MappingStore;

use crate::config::Settings;
use crate::resolver::StdinResolver;

/// Reconciles the mapping document against fresh provider snapshots and
/// interactively matches anything unmapped. The document is written back
/// exactly once, after all decisions are in.
pub async fn run_map(settings: &Settings, prune: bool, no_ai: bool) -> anyhow::Result<()> {
    let store = MappingStore::new(settings.mapping_path());
    let mut previous = store.load(true).context("loading mapping document")?;
    backfill(&mut previous, settings);

    let akahu = AkahuClient::new(settings.akahu_config());
    let latest_akahu = akahu.fetch_accounts().await?;

    // A ledger that is not configured carries its previous snapshot forward
    // unchanged, so its links and change state are left alone.
    let latest_ynab = match settings.ynab_config() {
        Some(config) => YnabClient::new(config).fetch_accounts().await?,
        None => previous.ynab_accounts.clone(),
    };
    let latest_actual = match settings.actual_config() {
        Some(config) => ActualClient::new(config).fetch_accounts().await?,
        None => previous.actual_accounts.clone(),
    };

    let report = check_for_changes(&previous, &latest_akahu, &latest_ynab, &latest_actual);
    let outcome = merge(&previous, latest_akahu, latest_ynab, latest_actual);
    let mut document = outcome.document;

    for gone in &outcome.vanished {
        match gone {
            Vanished::Akahu { id, name } => {
                warn!(akahu_id = %id, name = %name, "Akahu account vanished upstream; mapping entry retained");
            }
            Vanished::Target { ledger, id, name } => {
                warn!(ledger = %ledger, account_id = %id, name = %name, "Ledger account vanished upstream; link retained");
            }
        }
    }
    if prune && !outcome.vanished.is_empty() && confirm_prune(outcome.vanished.len())? {
        let removed = prune_vanished(&mut document, &outcome.vanished);
        info!(removed, "Pruned mapping state for vanished accounts");
    }

    if report.any() {
        run_matching(&mut document, settings, no_ai).await?;
    } else {
        info!("No account changes since the last run; skipping matching");
    }

    store.save(&document).context("saving mapping document")?;
    info!(path = %store.path().display(), "Mapping document saved");
    Ok(())
}

fn backfill(document: &mut MappingDocument, settings: &Settings) {
    if let Some(ynab) = settings.ynab_config() {
        let updated = document.backfill_budget_ids(Ledger::Ynab, &ynab.budget_id);
        if updated > 0 {
            info!(updated, "Backfilled YNAB budget ids on legacy links");
        }
    }
    if let Some(actual) = settings.actual_config() {
        let updated = document.backfill_budget_ids(Ledger::Actual, &actual.sync_id);
        if updated > 0 {
            info!(updated, "Backfilled Actual sync ids on legacy links");
        }
    }
}

fn confirm_prune(count: usize) -> anyhow::Result<bool> {
    print!("Remove mapping state for {count} vanished account(s)? [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}

async fn run_matching(
    document: &mut MappingDocument,
    settings: &Settings,
    no_ai: bool,
) -> anyhow::Result<()> {
    match (no_ai, settings.openai_config()) {
        (false, Some(config)) => {
            let suggester = OpenAiSuggester::new(config);
            match_all_ledgers(document, settings, &suggester).await
        }
        _ => {
            let suggester = NameSimilarity::default();
            match_all_ledgers(document, settings, &suggester).await
        }
    }
}

async fn match_all_ledgers<S: Suggester>(
    document: &mut MappingDocument,
    settings: &Settings,
    suggester: &S,
) -> anyhow::Result<()> {
    if let Some(ynab) = settings.ynab_config() {
        let summary =
            match_ledger(document, Ledger::Ynab, &ynab.budget_id, suggester).await?;
        report_summary(Ledger::Ynab, summary);
    }
    if let Some(actual) = settings.actual_config() {
        let summary =
            match_ledger(document, Ledger::Actual, &actual.sync_id, suggester).await?;
        report_summary(Ledger::Actual, summary);
    }
    Ok(())
}

async fn match_ledger<S: Suggester>(
    document: &mut MappingDocument,
    ledger: Ledger,
    budget_id: &str,
    suggester: &S,
) -> anyhow::Result<MatchSummary> {
    let akahu_accounts = document.akahu_accounts.clone();
    let target_accounts = document.accounts_for(ledger).clone();
    let mut resolver = StdinResolver;
    let summary = match_accounts(
        &mut document.mapping,
        &akahu_accounts,
        &target_accounts,
        ledger,
        budget_id,
        suggester,
        &mut resolver,
    )
    .await?;
    Ok(summary)
}

fn report_summary(ledger: Ledger, summary: MatchSummary) {
    info!(
        ledger = %ledger,
        asked = summary.asked,
        confirmed = summary.confirmed,
        skipped = summary.skipped,
        marked_never = summary.marked_never,
        "Matching pass finished"
    );
}

/// Pushes transactions (on-budget accounts) and balance adjustments
/// (tracking accounts) from Akahu into every ledger with a complete link.
pub async fn run_sync(settings: &Settings) -> anyhow::Result<()> {
    let store = MappingStore::new(settings.mapping_path());
    let mut document = store.load(false).context("loading mapping document")?;
    backfill(&mut document, settings);

    require_configured_ledgers(&document, settings)?;

    let akahu = AkahuClient::new(settings.akahu_config());
    let akahu_accounts = akahu.fetch_accounts().await?;

    let ynab = settings.ynab_config().map(YnabClient::new);
    let actual = settings.actual_config().map(ActualClient::new);

    for entry in document.mapping.values_mut() {
        let Some(source) = akahu_accounts.get(&entry.akahu_id) else {
            debug!(akahu_id = %entry.akahu_id, "Mapped account not in the latest Akahu snapshot, skipping");
            continue;
        };
        let tracking = entry.account_class == Some(AccountClass::Tracking);
        let akahu_id = entry.akahu_id.clone();
        let akahu_name = entry.akahu_name.clone();

        for ledger in Ledger::ALL {
            let Some(link) = entry.link_mut(ledger) else {
                continue;
            };
            if !link.is_complete() {
                warn!(akahu = %akahu_name, ledger = %ledger, "Link has no budget id, skipping");
                continue;
            }

            match ledger {
                Ledger::Ynab => {
                    let Some(client) = &ynab else { continue };
                    if tracking {
                        let target = to_scaled(source.balance, 3);
                        let current = client.account_balance(&link.account_id).await?;
                        client
                            .create_balance_adjustment(&link.account_id, target, current)
                            .await?;
                    } else {
                        let transactions =
                            akahu.fetch_transactions(&akahu_id, link.synced_at).await?;
                        let converted: Vec<_> = transactions
                            .iter()
                            .map(|t| convert::to_ynab(t, &link.account_id))
                            .collect();
                        if !converted.is_empty() {
                            client.create_transactions(&converted).await?;
                        }
                    }
                    link.synced_at = Some(chrono::Utc::now());
                }
                Ledger::Actual => {
                    let Some(client) = &actual else { continue };
                    if tracking {
                        let target = to_scaled(source.balance, 2);
                        let current = client.account_balance(&link.account_id).await?;
                        client
                            .create_balance_adjustment(&link.account_id, target, current)
                            .await?;
                    } else {
                        let transactions =
                            akahu.fetch_transactions(&akahu_id, link.synced_at).await?;
                        let converted: Vec<_> =
                            transactions.iter().map(convert::to_actual).collect();
                        if !converted.is_empty() {
                            client.import_transactions(&link.account_id, &converted).await?;
                        }
                    }
                    link.synced_at = Some(chrono::Utc::now());
                }
            }
        }
    }

    store.save(&document).context("saving mapping document")?;
    info!(path = %store.path().display(), "Sync finished, mapping document saved");
    Ok(())
}

/// A mapping that references a ledger with no configuration cannot sync; the
/// run fails up front rather than silently skipping confirmed links.
fn require_configured_ledgers(
    document: &MappingDocument,
    settings: &Settings,
) -> Result<(), ProviderError> {
    let references = |ledger: Ledger| {
        document
            .mapping
            .values()
            .any(|entry| entry.link(ledger).is_some_and(|l| l.is_complete()))
    };
    if references(Ledger::Ynab) && settings.ynab_config().is_none() {
        return Err(ProviderError::MissingConfiguration("ynab"));
    }
    if references(Ledger::Actual) && settings.actual_config().is_none() {
        return Err(ProviderError::MissingConfiguration("actual"));
    }
    Ok(())
}

/// Decimal dollars to an integer ledger unit (10^scale per dollar).
fn to_scaled(amount: Decimal, scale: u32) -> i64 {
    (amount * Decimal::from(10i64.pow(scale)))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use akahu_sync_core::{LedgerLink, MappingEntry};
    use std::path::PathBuf;

    fn settings_with_ynab_only() -> Settings {
        Settings {
            akahu: crate::config::AkahuSection {
                user_token: "user_tok".into(),
                app_token: "app_tok".into(),
            },
            ynab: Some(crate::config::YnabSection {
                bearer_token: "tok".into(),
                budget_id: "budget-1".into(),
            }),
            actual: None,
            openai: None,
            sync: crate::config::SyncSection {
                mapping_file: Some(PathBuf::from("/tmp/mapping.json")),
            },
        }
    }

    #[test]
    fn scaling_rounds_to_the_ledger_unit() {
        assert_eq!(to_scaled("12.345".parse().unwrap(), 3), 12_345);
        assert_eq!(to_scaled("12.345".parse().unwrap(), 2), 1_235);
        assert_eq!(to_scaled("-0.004".parse().unwrap(), 2), 0);
    }

    #[test]
    fn backfill_applies_the_configured_budget_id() {
        let settings = settings_with_ynab_only();
        let mut document = MappingDocument::default();
        let mut entry = MappingEntry::new("ak1", "Checking");
        entry.set_link(Ledger::Ynab, LedgerLink::new("y1"));
        document.mapping.insert("ak1".into(), entry);

        backfill(&mut document, &settings);

        let link = document.mapping["ak1"].link(Ledger::Ynab).unwrap();
        assert_eq!(link.budget_id.as_deref(), Some("budget-1"));
    }

    #[test]
    fn unconfigured_ledger_with_complete_links_is_fatal() {
        let settings = settings_with_ynab_only();
        let mut document = MappingDocument::default();
        let mut entry = MappingEntry::new("ak1", "Checking");
        let mut link = LedgerLink::new("ab1");
        link.budget_id = Some("sync-1".into());
        entry.set_link(Ledger::Actual, link);
        document.mapping.insert("ak1".into(), entry);

        let err = require_configured_ledgers(&document, &settings).unwrap_err();
        assert!(matches!(err, ProviderError::MissingConfiguration("actual")));
    }

    #[test]
    fn configured_ledgers_pass_the_check() {
        let settings = settings_with_ynab_only();
        let mut document = MappingDocument::default();
        let mut entry = MappingEntry::new("ak1", "Checking");
        let mut link = LedgerLink::new("y1");
        link.budget_id = Some("budget-1".into());
        entry.set_link(Ledger::Ynab, link);
        document.mapping.insert("ak1".into(), entry);

        assert!(require_configured_ledgers(&document, &settings).is_ok());
    }
}
