//! Search-and-select form controller.
//!
//! Owns the ordered collection of search-and-rate rows, the focused row, the
//! live candidate list, and the last-received recommendations. The controller
//! is a plain synchronous state machine: operations that need the network
//! return a request token for the caller to execute, and completions are fed
//! back with the epoch they were issued under so that only the latest request
//! can land.

use std::collections::HashMap;

use tracing::debug;

use crate::models::{Game, RatedGame};

/// Rating assigned to freshly added rows.
pub const DEFAULT_RATING: f64 = 10.0;

/// Minimum number of characters before a search query is issued.
pub const MIN_SEARCH_CHARS: usize = 2;

/// Stable identifier for a form row.
///
/// Rows are addressed by id rather than position wherever the position can
/// shift underneath the caller (rating edits, async completions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

/// One user-editable search-and-rate row.
#[derive(Debug, Clone)]
pub struct SearchedEntry {
    id: EntryId,
    /// Rating plus the game reference once the row is resolved.
    pub rated: RatedGame,
    /// Free text the user has typed into the row.
    pub search_text: String,
}

impl SearchedEntry {
    fn new(id: EntryId) -> Self {
        Self {
            id,
            rated: RatedGame::unresolved(DEFAULT_RATING),
            search_text: String::new(),
        }
    }

    /// Stable identifier of this row.
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Whether the row has been matched to a concrete game.
    pub fn is_resolved(&self) -> bool {
        self.rated.game.is_some()
    }
}

/// A search the caller should run against the search provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Epoch this request was issued under; pass back with the results.
    pub epoch: u64,
    /// Text to search for.
    pub query: String,
}

/// A submission the caller should post to the recommendation provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    /// Epoch this request was issued under; pass back with the response.
    pub epoch: u64,
    /// Game id to rating, one entry per distinct resolved game.
    pub ratings: HashMap<u64, f64>,
}

/// State machine behind the search-and-rate form.
#[derive(Debug, Default)]
pub struct GameForm {
    entries: Vec<SearchedEntry>,
    focused: Option<usize>,
    candidates: Vec<Game>,
    recommendations: Vec<RatedGame>,
    search_epoch: u64,
    submit_epoch: u64,
    next_id: u64,
}

impl GameForm {
    /// Create an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows in display order.
    pub fn entries(&self) -> &[SearchedEntry] {
        &self.entries
    }

    /// Row at `index`, if present.
    pub fn entry(&self, index: usize) -> Option<&SearchedEntry> {
        self.entries.get(index)
    }

    /// Index of the row currently focused for search.
    pub fn focused(&self) -> Option<usize> {
        self.focused
    }

    /// Candidates from the most recent search that was allowed to land.
    pub fn candidates(&self) -> &[Game] {
        &self.candidates
    }

    /// Last recommendation sequence received, in provider order.
    pub fn recommendations(&self) -> &[RatedGame] {
        &self.recommendations
    }

    /// Number of rows resolved to a concrete game.
    pub fn resolved_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_resolved()).count()
    }

    /// Append an empty row and return its id.
    pub fn add_row(&mut self) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push(SearchedEntry::new(id));
        id
    }

    /// Remove the row at `index`. Out-of-range indices are ignored.
    pub fn delete_row(&mut self, index: usize) {
        if index >= self.entries.len() {
            return;
        }
        self.entries.remove(index);
        match self.focused {
            Some(f) if f == index => {
                self.focused = None;
                self.candidates.clear();
                self.search_epoch += 1;
            }
            Some(f) if f > index => self.focused = Some(f - 1),
            _ => {}
        }
    }

    /// Update the rating on the row with the given id.
    ///
    /// The value is stored as given; the UI control declares the 1..=10
    /// range and nothing beyond that is enforced here.
    pub fn set_rating(&mut self, id: EntryId, value: f64) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.rated.rating = value;
        }
    }

    /// Replace the text of the row at `index`.
    ///
    /// Editing a resolved row clears its game reference immediately; the row
    /// must be re-resolved through a new selection. Returns a search request
    /// when the new text is long enough to query, otherwise clears any
    /// candidates left over from the previous text.
    pub fn edit_text(&mut self, index: usize, text: impl Into<String>) -> Option<SearchRequest> {
        let len = self.entries.len();
        let Some(entry) = self.entries.get_mut(index) else {
            debug!(index, len, "ignoring text edit for missing row");
            return None;
        };
        entry.search_text = text.into();
        entry.rated.game = None;
        self.search_epoch += 1;
        let query = self.entries[index].search_text.clone();
        if query.chars().count() >= MIN_SEARCH_CHARS {
            Some(SearchRequest {
                epoch: self.search_epoch,
                query,
            })
        } else {
            self.candidates.clear();
            None
        }
    }

    /// Focus the row at `index` and re-issue a search for its current text.
    pub fn focus(&mut self, index: usize) -> Option<SearchRequest> {
        if index >= self.entries.len() {
            return None;
        }
        self.focused = Some(index);
        self.candidates.clear();
        self.search_epoch += 1;
        let query = self.entries[index].search_text.clone();
        if query.chars().count() >= MIN_SEARCH_CHARS {
            Some(SearchRequest {
                epoch: self.search_epoch,
                query,
            })
        } else {
            None
        }
    }

    /// Drop focus from the row at `index`.
    ///
    /// An unresolved row has its partial text discarded; the candidate list
    /// is cleared either way, and in-flight search results are invalidated.
    pub fn blur(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            if entry.rated.game.is_none() {
                entry.search_text.clear();
            }
        }
        if self.focused == Some(index) {
            self.focused = None;
        }
        self.candidates.clear();
        self.search_epoch += 1;
    }

    /// Resolve the row at `row_index` to the candidate at `candidate_index`.
    ///
    /// The row's text becomes the candidate's name, its rating is preserved,
    /// and focus and candidates are cleared. Out-of-range indices are no-ops,
    /// which also makes repeated identical calls idempotent.
    pub fn select(&mut self, candidate_index: usize, row_index: usize) {
        let Some(candidate) = self.candidates.get(candidate_index).cloned() else {
            return;
        };
        let Some(entry) = self.entries.get_mut(row_index) else {
            return;
        };
        entry.search_text = candidate.name.clone();
        entry.rated.game = Some(candidate);
        self.focused = None;
        self.candidates.clear();
        self.search_epoch += 1;
    }

    /// Install search results issued under `epoch`.
    ///
    /// Results from a superseded request are dropped so that the latest
    /// query always wins, regardless of network ordering. Returns whether
    /// the results were installed.
    pub fn apply_search_results(&mut self, epoch: u64, games: Vec<Game>) -> bool {
        if epoch != self.search_epoch {
            debug!(
                epoch,
                current = self.search_epoch,
                "discarding stale search results"
            );
            return false;
        }
        self.candidates = games;
        true
    }

    /// Build the submission for all resolved rows.
    ///
    /// Returns `None` when no row is resolved; no request should be made in
    /// that case. Duplicate game ids collapse to the last row's rating.
    pub fn submit(&mut self) -> Option<SubmitRequest> {
        let mut ratings = HashMap::new();
        for entry in &self.entries {
            if let Some(game) = &entry.rated.game {
                ratings.insert(game.id, entry.rated.rating);
            }
        }
        if ratings.is_empty() {
            return None;
        }
        self.submit_epoch += 1;
        Some(SubmitRequest {
            epoch: self.submit_epoch,
            ratings,
        })
    }

    /// Install a recommendation response issued under `epoch`.
    ///
    /// Superseded responses are dropped; the displayed sequence only ever
    /// reflects the most recent submission. Returns whether the response was
    /// installed.
    pub fn apply_recommendations(&mut self, epoch: u64, games: Vec<RatedGame>) -> bool {
        if epoch != self.submit_epoch {
            debug!(
                epoch,
                current = self.submit_epoch,
                "discarding stale recommendations"
            );
            return false;
        }
        self.recommendations = games;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn game(id: u64, name: &str) -> Game {
        Game {
            id,
            name: name.to_string(),
            first_release_date: Utc.with_ymd_and_hms(2001, 11, 15, 0, 0, 0).unwrap(),
        }
    }

    fn form_with_rows(count: usize) -> GameForm {
        let mut form = GameForm::new();
        for _ in 0..count {
            form.add_row();
        }
        form
    }

    #[test]
    fn add_row_defaults() {
        let mut form = GameForm::new();
        form.add_row();
        let entry = form.entry(0).unwrap();
        assert_eq!(entry.rated.rating, DEFAULT_RATING);
        assert!(entry.rated.game.is_none());
        assert!(entry.search_text.is_empty());
    }

    #[test]
    fn delete_preserves_relative_order() {
        let mut form = form_with_rows(3);
        let ids: Vec<_> = form.entries().iter().map(|e| e.id()).collect();

        form.delete_row(1);
        let remaining: Vec<_> = form.entries().iter().map(|e| e.id()).collect();
        assert_eq!(remaining, vec![ids[0], ids[2]]);

        // out of range is a silent no-op
        form.delete_row(10);
        assert_eq!(form.entries().len(), 2);
    }

    #[test]
    fn delete_adjusts_focus() {
        let mut form = form_with_rows(3);
        form.focus(2);
        form.delete_row(0);
        assert_eq!(form.focused(), Some(1));

        form.delete_row(1);
        assert_eq!(form.focused(), None);
        assert!(form.candidates().is_empty());
    }

    #[test]
    fn edit_text_issues_search_at_two_chars() {
        let mut form = form_with_rows(1);
        assert!(form.edit_text(0, "H").is_none());
        let request = form.edit_text(0, "Ha").expect("query issued");
        assert_eq!(request.query, "Ha");
        assert!(form.edit_text(5, "ghost row").is_none());
    }

    #[test]
    fn short_text_clears_candidates() {
        let mut form = form_with_rows(1);
        let request = form.edit_text(0, "Halo").unwrap();
        assert!(form.apply_search_results(request.epoch, vec![game(1, "Halo")]));
        assert_eq!(form.candidates().len(), 1);

        form.edit_text(0, "H");
        assert!(form.candidates().is_empty());
    }

    #[test]
    fn stale_search_results_are_discarded() {
        let mut form = form_with_rows(1);
        let first = form.edit_text(0, "Ha").unwrap();
        let second = form.edit_text(0, "Hal").unwrap();

        // completion for the superseded query arrives last but must not win
        assert!(form.apply_search_results(second.epoch, vec![game(1, "Halo")]));
        assert!(!form.apply_search_results(first.epoch, vec![game(2, "Half-Life")]));
        assert_eq!(form.candidates()[0].id, 1);
    }

    #[test]
    fn focus_reissues_search_for_existing_text() {
        let mut form = form_with_rows(2);
        form.edit_text(1, "Halo");
        let request = form.focus(1).expect("query issued");
        assert_eq!(request.query, "Halo");
        assert_eq!(form.focused(), Some(1));

        // focusing an empty row issues nothing
        assert!(form.focus(0).is_none());
        assert!(form.focus(9).is_none());
    }

    #[test]
    fn blur_unresolved_clears_text_and_candidates() {
        let mut form = form_with_rows(1);
        form.focus(0);
        let request = form.edit_text(0, "xyz").unwrap();
        form.apply_search_results(request.epoch, vec![game(3, "Xyzzy")]);
        assert_eq!(form.candidates().len(), 1);

        form.blur(0);
        assert_eq!(form.entry(0).unwrap().search_text, "");
        assert!(form.candidates().is_empty());
        assert_eq!(form.focused(), None);
    }

    #[test]
    fn blur_resolved_keeps_text() {
        let mut form = form_with_rows(1);
        let request = form.edit_text(0, "Halo").unwrap();
        form.apply_search_results(request.epoch, vec![game(1, "Halo")]);
        form.select(0, 0);

        form.blur(0);
        assert_eq!(form.entry(0).unwrap().search_text, "Halo");
        assert!(form.entry(0).unwrap().is_resolved());
    }

    #[test]
    fn select_resolves_and_preserves_rating() {
        let mut form = form_with_rows(1);
        let id = form.entry(0).unwrap().id();
        form.set_rating(id, 8.0);

        form.focus(0);
        let request = form.edit_text(0, "Hal").unwrap();
        form.apply_search_results(request.epoch, vec![game(1, "Halo")]);
        form.select(0, 0);

        let entry = form.entry(0).unwrap();
        assert_eq!(entry.search_text, "Halo");
        assert_eq!(entry.rated.game.as_ref().unwrap().id, 1);
        assert_eq!(entry.rated.rating, 8.0);
        assert_eq!(form.focused(), None);
        assert!(form.candidates().is_empty());
    }

    #[test]
    fn select_is_idempotent() {
        let mut form = form_with_rows(1);
        let request = form.edit_text(0, "Halo").unwrap();
        form.apply_search_results(request.epoch, vec![game(1, "Halo")]);
        form.select(0, 0);
        let after_once = format!("{form:?}");

        form.select(0, 0);
        assert_eq!(format!("{form:?}"), after_once);
    }

    #[test]
    fn editing_resolved_row_unresolves_immediately() {
        let mut form = form_with_rows(1);
        let request = form.edit_text(0, "Halo").unwrap();
        form.apply_search_results(request.epoch, vec![game(1, "Halo")]);
        form.select(0, 0);
        assert!(form.entry(0).unwrap().is_resolved());

        form.edit_text(0, "Halo 2");
        assert!(!form.entry(0).unwrap().is_resolved());
    }

    #[test]
    fn submit_without_resolved_rows_is_a_no_op() {
        let mut form = form_with_rows(2);
        form.edit_text(0, "unmatched text");
        assert!(form.submit().is_none());
        assert!(form.recommendations().is_empty());
    }

    #[test]
    fn submit_builds_rating_map() {
        let mut form = form_with_rows(1);
        let id = form.entry(0).unwrap().id();
        form.set_rating(id, 8.0);
        let request = form.edit_text(0, "Hal").unwrap();
        form.apply_search_results(request.epoch, vec![game(1, "Halo")]);
        form.select(0, 0);

        let submit = form.submit().expect("one resolved row");
        assert_eq!(submit.ratings.len(), 1);
        assert_eq!(submit.ratings[&1], 8.0);
    }

    #[test]
    fn duplicate_game_ids_last_write_wins() {
        let mut form = form_with_rows(2);
        for row in 0..2 {
            let request = form.edit_text(row, "Halo").unwrap();
            form.apply_search_results(request.epoch, vec![game(1, "Halo")]);
            form.select(0, row);
        }
        let first = form.entry(0).unwrap().id();
        let second = form.entry(1).unwrap().id();
        form.set_rating(first, 3.0);
        form.set_rating(second, 9.0);

        let submit = form.submit().expect("resolved rows");
        assert_eq!(submit.ratings.len(), 1);
        assert_eq!(submit.ratings[&1], 9.0);
    }

    #[test]
    fn stale_recommendations_are_discarded() {
        let mut form = form_with_rows(1);
        let request = form.edit_text(0, "Halo").unwrap();
        form.apply_search_results(request.epoch, vec![game(1, "Halo")]);
        form.select(0, 0);

        let first = form.submit().unwrap();
        let second = form.submit().unwrap();

        let newer = vec![RatedGame {
            game: Some(game(2, "Half-Life")),
            rating: 0.9,
        }];
        assert!(form.apply_recommendations(second.epoch, newer.clone()));
        assert!(!form.apply_recommendations(first.epoch, Vec::new()));
        assert_eq!(form.recommendations(), newer.as_slice());
    }

    #[test]
    fn rating_accepts_out_of_range_values() {
        let mut form = form_with_rows(1);
        let id = form.entry(0).unwrap().id();
        form.set_rating(id, 42.5);
        assert_eq!(form.entry(0).unwrap().rated.rating, 42.5);
    }
}
