use crate::entry::{Entry, NumberedEntry, number_entries};
use crate::validation::{EntryValidator, ValidationError};

/// The accumulated entry list of one editing session.
///
/// Entries are only appended after validation, removed from the tail by
/// [`EntrySession::undo_last`], or cleared all at once. Ids are never stored:
/// they are the 1-based position of an entry in the list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntrySession {
    entries: Vec<Entry>,
}

impl EntrySession {
    pub fn new() -> Self {
        EntrySession::default()
    }

    pub fn from_entries(entries: Vec<Entry>) -> Self {
        EntrySession { entries }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn numbered(&self) -> Vec<NumberedEntry> {
        number_entries(&self.entries)
    }

    /// Validate `candidate` and append it when it passes.
    ///
    /// A duplicate is reported unless `override_duplicate` is set, in which case
    /// the remaining checks still apply. Returns the id of the new entry.
    pub fn try_add(
        &mut self,
        candidate: Entry,
        validator: &EntryValidator,
        override_duplicate: bool,
    ) -> Result<usize, ValidationError> {
        validator.validate(&self.entries, &candidate, override_duplicate)?;
        self.entries.push(candidate);
        Ok(self.entries.len())
    }

    /// Remove the last entry and hand it back so it can be corrected and re-entered.
    pub fn undo_last(&mut self) -> Option<Entry> {
        self.entries.pop()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn replace_all(&mut self, entries: Vec<Entry>) {
        self.entries = entries;
    }

    /// Distinct patient names in first-seen order.
    pub fn name_candidates(&self) -> Vec<&str> {
        Self::distinct(self.entries.iter().map(|entry| entry.name.as_str()))
    }

    /// Distinct institution names in first-seen order.
    pub fn institution_candidates(&self) -> Vec<&str> {
        Self::distinct(self.entries.iter().map(|entry| entry.institution.as_str()))
    }

    fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
        let mut seen = Vec::new();
        for value in values {
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        seen
    }
}
