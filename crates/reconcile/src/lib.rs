pub mod change;
pub mod matcher;
pub mod merge;
pub mod suggest;
pub(crate) mod util;

pub use change::{check_for_changes, snapshot_changed, ChangeReport};
pub use matcher::{
    match_accounts, Candidate, Decision, MatchError, MatchPrompt, MatchSummary, Resolver,
};
pub use merge::{merge, prune_vanished, MergeOutcome, Vanished};
pub use suggest::{NameSimilarity, NoSuggestions, Suggester};
