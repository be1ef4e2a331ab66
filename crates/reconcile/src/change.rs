use akahu_sync_core::{AccountSnapshot, MappingDocument};

/// Which providers reported a sync-relevant difference since the last run.
/// Used to gate the interactive matching step: when nothing changed, an
/// unattended re-run skips human interaction entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeReport {
    pub akahu: bool,
    pub ynab: bool,
    pub actual: bool,
}

impl ChangeReport {
    pub fn any(&self) -> bool {
        self.akahu || self.ynab || self.actual
    }
}

/// Two snapshots are equal iff they hold the same account ids and every
/// record is equal on all fields except the provider ordering token (and the
/// first-loaded stamp, which is our own bookkeeping). A new id, a removed id,
/// a rename, or a changed balance/type each counts as a change.
pub fn snapshot_changed(previous: &AccountSnapshot, latest: &AccountSnapshot) -> bool {
    if previous.len() != latest.len() {
        return true;
    }
    previous.iter().any(|(id, prev)| {
        latest
            .get(id)
            .map_or(true, |new| !prev.sync_relevant_eq(new))
    })
}

pub fn check_for_changes(
    previous: &MappingDocument,
    latest_akahu: &AccountSnapshot,
    latest_ynab: &AccountSnapshot,
    latest_actual: &AccountSnapshot,
) -> ChangeReport {
    ChangeReport {
        akahu: snapshot_changed(&previous.akahu_accounts, latest_akahu),
        ynab: snapshot_changed(&previous.ynab_accounts, latest_ynab),
        actual: snapshot_changed(&previous.actual_accounts, latest_actual),
    }
}
