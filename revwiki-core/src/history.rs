//! History summaries: per-revision metadata and size deltas, newest first.

use revwiki_types::{HistoryRow, Revision};
use std::sync::Arc;

/// Summarize a document's revisions
///
/// Rows are computed in ascending index order, each carrying the change in
/// body length from the previous revision (the first revision's delta is its
/// full length), and returned most recent first.
pub fn summarize(revisions: &[Arc<Revision>]) -> Vec<HistoryRow> {
    let mut previous_len = 0i64;
    let mut rows: Vec<HistoryRow> = revisions
        .iter()
        .enumerate()
        .map(|(position, revision)| {
            let len = revision.body_len() as i64;
            let row = HistoryRow {
                revision_index: position + 1,
                comment: revision.comment().to_string(),
                contributor: revision.contributor().to_string(),
                length_delta: len - previous_len,
                created_at: revision.created_at(),
            };
            previous_len = len;
            row
        })
        .collect();

    rows.reverse();
    rows
}
