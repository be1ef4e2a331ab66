use chrono::Utc;
use tracing::info;

use akahu_sync_core::{AccountSnapshot, Ledger, MappingDocument};

/// Result of reconciling the persisted document against fresh snapshots.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub document: MappingDocument,
    /// Accounts present in the previous snapshot but missing upstream.
    /// Their mapping entries are retained; pruning is a separate, explicit
    /// operation so a transient fetch gap can never delete a confirmed link.
    pub vanished: Vec<Vanished>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vanished {
    Akahu { id: String, name: String },
    Target { ledger: Ledger, id: String, name: String },
}

/// Reconciles the persisted mapping against fresh snapshots. The output
/// account dictionaries are the full latest snapshots, so downstream display
/// and matching always reflect current reality; the mapping itself only
/// gains or keeps links.
///
/// - Ids only in the latest snapshot become unmapped candidates for the
///   matcher and get a first-loaded stamp.
/// - Ids only in the previous snapshot are reported as vanished, nothing
///   more.
/// - Ids in both keep their original first-loaded stamp, and their mapping
///   entry's cached display fields are refreshed without touching links.
pub fn merge(
    previous: &MappingDocument,
    latest_akahu: AccountSnapshot,
    latest_ynab: AccountSnapshot,
    latest_actual: AccountSnapshot,
) -> MergeOutcome {
    let mut vanished = Vec::new();

    let akahu_accounts = combine(latest_akahu, &previous.akahu_accounts, |id, name| {
        vanished.push(Vanished::Akahu {
            id: id.to_string(),
            name: name.to_string(),
        });
    });
    let ynab_accounts = combine(latest_ynab, &previous.ynab_accounts, |id, name| {
        vanished.push(Vanished::Target {
            ledger: Ledger::Ynab,
            id: id.to_string(),
            name: name.to_string(),
        });
    });
    let actual_accounts = combine(latest_actual, &previous.actual_accounts, |id, name| {
        vanished.push(Vanished::Target {
            ledger: Ledger::Actual,
            id: id.to_string(),
            name: name.to_string(),
        });
    });

    let mut mapping = previous.mapping.clone();
    for entry in mapping.values_mut() {
        if let Some(account) = akahu_accounts.get(&entry.akahu_id) {
            entry.akahu_name = account.name.clone();
            entry.akahu_balance = Some(account.balance);
        }
    }

    MergeOutcome {
        document: MappingDocument {
            akahu_accounts,
            ynab_accounts,
            actual_accounts,
            mapping,
        },
        vanished,
    }
}

fn combine(
    mut latest: AccountSnapshot,
    previous: &AccountSnapshot,
    mut on_vanished: impl FnMut(&str, &str),
) -> AccountSnapshot {
    let now = Utc::now();
    for (id, record) in latest.iter_mut() {
        record.date_first_loaded = previous
            .get(id)
            .and_then(|prev| prev.date_first_loaded)
            .or(Some(now));
    }
    for (id, prev) in previous {
        if !latest.contains_key(id) {
            on_vanished(id, &prev.name);
        }
    }
    latest
}

/// Explicitly removes mapping state for vanished accounts: a vanished Akahu
/// account drops its whole entry, a vanished ledger account drops only the
/// link that pointed at it. Only ever invoked after human confirmation.
/// Returns the number of entries/links removed.
pub fn prune_vanished(document: &mut MappingDocument, vanished: &[Vanished]) -> usize {
    let mut removed = 0;
    for gone in vanished {
        match gone {
            Vanished::Akahu { id, name } => {
                if document.mapping.remove(id).is_some() {
                    info!(akahu_id = %id, name = %name, "Pruned mapping entry for vanished Akahu account");
                    removed += 1;
                }
            }
            Vanished::Target { ledger, id, name } => {
                for entry in document.mapping.values_mut() {
                    let points_here = entry
                        .link(*ledger)
                        .is_some_and(|link| link.account_id == *id);
                    if points_here {
                        entry.links.remove(ledger);
                        info!(ledger = %ledger, account_id = %id, name = %name, "Pruned link to vanished ledger account");
                        removed += 1;
                    }
                }
            }
        }
    }
    removed
}
