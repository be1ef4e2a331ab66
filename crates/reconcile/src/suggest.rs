use akahu_sync_core::AccountRecord;

use crate::matcher::Candidate;
use crate::util::name_similarity;

/// Produces a best-guess target account id for an unmapped source account,
/// or `None` when nothing clears the bar. The matcher works the same
/// regardless of which implementation is active.
#[allow(async_fn_in_trait)]
pub trait Suggester {
    async fn suggest(
        &self,
        source: &AccountRecord,
        candidates: &[Candidate<'_>],
    ) -> Option<String>;
}

/// Never suggests anything.
pub struct NoSuggestions;

impl Suggester for NoSuggestions {
    async fn suggest(
        &self,
        _source: &AccountRecord,
        _candidates: &[Candidate<'_>],
    ) -> Option<String> {
        None
    }
}

/// Suggests the unclaimed candidate whose display name is most similar to
/// the source account's, if the similarity clears the threshold.
pub struct NameSimilarity {
    pub threshold: f32,
}

impl Default for NameSimilarity {
    fn default() -> Self {
        NameSimilarity { threshold: 0.5 }
    }
}

impl Suggester for NameSimilarity {
    async fn suggest(
        &self,
        source: &AccountRecord,
        candidates: &[Candidate<'_>],
    ) -> Option<String> {
        let (best, score) = candidates
            .iter()
            .filter(|c| !c.claimed)
            .map(|c| (c, name_similarity(&source.name, &c.account.name)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

        (score >= self.threshold).then(|| best.account.id.clone())
    }
}
