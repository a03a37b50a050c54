//! Word-level review of a proposed text correction.
//!
//! A review aligns the current draft against a proposed replacement as an
//! ordered sequence of word spans, and resolves atomically: accepting applies
//! the proposal wholesale, discarding keeps the draft untouched. There is no
//! partial application.

use similar::{ChangeTag, TextDiff};
use thiserror::Error;

/// Classification of one span in a word-level alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStatus {
    Unchanged,
    Added,
    Removed,
}

/// One contiguous run of text sharing a diff status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSpan {
    pub text: String,
    pub status: SpanStatus,
}

/// Word-granularity alignment of `original` against `proposed`.
///
/// Spans reconstruct either side losslessly: dropping `Added` spans yields
/// `original`, dropping `Removed` spans yields `proposed`. Adjacent runs with
/// the same status are merged so small edits stay human-legible.
pub fn compute_diff(original: &str, proposed: &str) -> Vec<DiffSpan> {
    let diff = TextDiff::from_words(original, proposed);
    let mut spans: Vec<DiffSpan> = Vec::new();

    for change in diff.iter_all_changes() {
        let status = match change.tag() {
            ChangeTag::Equal => SpanStatus::Unchanged,
            ChangeTag::Insert => SpanStatus::Added,
            ChangeTag::Delete => SpanStatus::Removed,
        };

        match spans.last_mut() {
            Some(last) if last.status == status => last.text.push_str(change.value()),
            _ => spans.push(DiffSpan {
                text: change.value().to_owned(),
                status,
            }),
        }
    }

    spans
}

/// Rebuild the pre-review text: every span that is not an addition.
pub fn reconstruct_original(spans: &[DiffSpan]) -> String {
    spans
        .iter()
        .filter(|span| span.status != SpanStatus::Added)
        .map(|span| span.text.as_str())
        .collect()
}

/// Rebuild the proposed text: every span that is not a removal.
pub fn reconstruct_proposed(spans: &[DiffSpan]) -> String {
    spans
        .iter()
        .filter(|span| span.status != SpanStatus::Removed)
        .map(|span| span.text.as_str())
        .collect()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("a review is already open for this draft")]
    AlreadyOpen,
    #[error("cannot review an empty draft")]
    EmptyDraft,
    #[error("no review is open")]
    NotOpen,
}

/// Pending review between "correction received" and "accept or discard".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    original: String,
    proposed: String,
    spans: Vec<DiffSpan>,
}

impl Review {
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn proposed(&self) -> &str {
        &self.proposed
    }

    pub fn spans(&self) -> &[DiffSpan] {
        &self.spans
    }
}

/// Editable draft plus its at-most-one open review.
#[derive(Debug, Default)]
pub struct ReviewBoard {
    draft: String,
    review: Option<Review>,
}

impl ReviewBoard {
    pub fn new(draft: impl Into<String>) -> Self {
        Self {
            draft: draft.into(),
            review: None,
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replace the draft wholesale (for example when a different file loads);
    /// any open review is abandoned.
    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
        self.review = None;
    }

    pub fn is_reviewing(&self) -> bool {
        self.review.is_some()
    }

    pub fn review(&self) -> Option<&Review> {
        self.review.as_ref()
    }

    /// Open a review of `proposed` against the current draft.
    ///
    /// Rejected while another review is open, and for blank drafts.
    pub fn open_review(&mut self, proposed: impl Into<String>) -> Result<&Review, ReviewError> {
        if self.review.is_some() {
            return Err(ReviewError::AlreadyOpen);
        }
        if self.draft.trim().is_empty() {
            return Err(ReviewError::EmptyDraft);
        }

        let proposed = proposed.into();
        let spans = compute_diff(&self.draft, &proposed);
        Ok(self.review.insert(Review {
            original: self.draft.clone(),
            proposed,
            spans,
        }))
    }

    /// Apply the proposal wholesale and resolve the review.
    pub fn accept(&mut self) -> Result<(), ReviewError> {
        let review = self.review.take().ok_or(ReviewError::NotOpen)?;
        self.draft = review.proposed;
        Ok(())
    }

    /// Resolve the review leaving the draft untouched.
    pub fn discard(&mut self) -> Result<(), ReviewError> {
        self.review.take().ok_or(ReviewError::NotOpen)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{compute_diff, reconstruct_original, reconstruct_proposed, SpanStatus};

    #[test]
    fn identical_texts_diff_to_a_single_unchanged_span() {
        let spans = compute_diff("nothing to fix here", "nothing to fix here");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, SpanStatus::Unchanged);
        assert_eq!(spans[0].text, "nothing to fix here");
    }

    #[test]
    fn adjacent_same_status_runs_are_merged() {
        let spans = compute_diff("a b", "a c d");
        assert!(spans.windows(2).all(|pair| pair[0].status != pair[1].status));
        assert_eq!(reconstruct_original(&spans), "a b");
        assert_eq!(reconstruct_proposed(&spans), "a c d");
    }
}
