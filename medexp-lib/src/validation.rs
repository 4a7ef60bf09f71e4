use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::entry::Entry;
use crate::utils::char_length;

/// Maximum patient name length, in characters.
pub const NAME_CHAR_LIMIT: usize = 10;
/// Maximum institution name length, in characters.
pub const INSTITUTION_CHAR_LIMIT: usize = 20;

/// Why a candidate entry was not accepted.
///
/// Only [`ValidationError::Duplicate`] can be overridden by the user; every other
/// variant blocks the entry until it is corrected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error(
        "An entry with the same name, institution, amount and payment date already exists (entry {existing_id})"
    )]
    Duplicate { existing_id: usize },

    #[error("Payment date {date} is outside the fiscal year window {first_year}-{last_year}")]
    DateOutOfRange {
        date: NaiveDate,
        first_year: i32,
        last_year: i32,
    },

    #[error("Patient name is empty")]
    NameEmpty,

    #[error("Institution name is empty")]
    InstitutionEmpty,

    #[error("Patient name exceeds {limit} characters (got {length})")]
    NameTooLong { length: usize, limit: usize },

    #[error("Institution name exceeds {limit} characters (got {length})")]
    InstitutionTooLong { length: usize, limit: usize },

    #[error("Medical expense amount has not been entered")]
    ExpenseUnset,

    #[error("No medical expense category is selected")]
    NoCategorySelected,
}

impl ValidationError {
    /// Whether the user may confirm the entry anyway.
    pub fn is_overridable(&self) -> bool {
        matches!(self, ValidationError::Duplicate { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Filing year; payment dates in this year or the next one are accepted.
    pub fiscal_year: i32,
    pub name_char_limit: usize,
    pub institution_char_limit: usize,
}

impl ValidatorConfig {
    pub fn new(fiscal_year: i32) -> Self {
        ValidatorConfig {
            fiscal_year,
            name_char_limit: NAME_CHAR_LIMIT,
            institution_char_limit: INSTITUTION_CHAR_LIMIT,
        }
    }
}

/// Index of the first accumulated entry that looks like the same receipt as `candidate`.
///
/// Both entries must have a payment date; two undated entries never match.
pub fn find_duplicate(accumulated: &[Entry], candidate: &Entry) -> Option<usize> {
    let candidate_date = candidate.payment_date?;
    accumulated.iter().position(|entry| {
        entry.name == candidate.name
            && entry.institution == candidate.institution
            && entry.medical_expense == candidate.medical_expense
            && entry.payment_date == Some(candidate_date)
    })
}

pub fn is_duplicate(accumulated: &[Entry], candidate: &Entry) -> bool {
    find_duplicate(accumulated, candidate).is_some()
}

pub fn is_out_of_range_date(candidate: &Entry, fiscal_year: i32) -> bool {
    match candidate.payment_date {
        Some(date) => date.year() < fiscal_year || date.year() > fiscal_year + 1,
        None => false,
    }
}

pub fn is_name_empty(candidate: &Entry) -> bool {
    candidate.name.is_empty()
}

pub fn is_institution_empty(candidate: &Entry) -> bool {
    candidate.institution.is_empty()
}

pub fn is_name_too_long(candidate: &Entry, limit: usize) -> bool {
    char_length(&candidate.name) > limit
}

pub fn is_institution_too_long(candidate: &Entry, limit: usize) -> bool {
    char_length(&candidate.institution) > limit
}

pub fn is_expense_unset(candidate: &Entry) -> bool {
    candidate.medical_expense_value().is_none()
}

pub fn is_category_missing(candidate: &Entry) -> bool {
    !candidate.has_category()
}

/// Runs the per-field checks against a candidate entry.
///
/// The validator never mutates the accumulated list and has no side effects, so
/// it is safe to call speculatively (e.g. while the user is still typing).
#[derive(Debug, Clone, Copy)]
pub struct EntryValidator {
    config: ValidatorConfig,
}

impl EntryValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        EntryValidator { config }
    }

    /// Report the first violation in evaluation order.
    ///
    /// With `allow_duplicate` set, the duplicate check is skipped (the user has
    /// already confirmed the double entry) and evaluation continues with the
    /// hard checks.
    pub fn validate(
        &self,
        accumulated: &[Entry],
        candidate: &Entry,
        allow_duplicate: bool,
    ) -> Result<(), ValidationError> {
        match self.collect_violations(accumulated, candidate).into_iter().find(|violation| {
            !(allow_duplicate && violation.is_overridable())
        }) {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }

    /// Every violation of the candidate, in evaluation order.
    pub fn collect_violations(
        &self,
        accumulated: &[Entry],
        candidate: &Entry,
    ) -> Vec<ValidationError> {
        let mut violations = Vec::new();

        if let Some(index) = find_duplicate(accumulated, candidate) {
            violations.push(ValidationError::Duplicate {
                existing_id: index + 1,
            });
        }

        if is_out_of_range_date(candidate, self.config.fiscal_year) {
            if let Some(date) = candidate.payment_date {
                violations.push(ValidationError::DateOutOfRange {
                    date,
                    first_year: self.config.fiscal_year,
                    last_year: self.config.fiscal_year + 1,
                });
            }
        }

        if is_name_empty(candidate) {
            violations.push(ValidationError::NameEmpty);
        }

        if is_institution_empty(candidate) {
            violations.push(ValidationError::InstitutionEmpty);
        }

        if is_name_too_long(candidate, self.config.name_char_limit) {
            violations.push(ValidationError::NameTooLong {
                length: char_length(&candidate.name),
                limit: self.config.name_char_limit,
            });
        }

        if is_institution_too_long(candidate, self.config.institution_char_limit) {
            violations.push(ValidationError::InstitutionTooLong {
                length: char_length(&candidate.institution),
                limit: self.config.institution_char_limit,
            });
        }

        if is_expense_unset(candidate) {
            violations.push(ValidationError::ExpenseUnset);
        }

        if is_category_missing(candidate) {
            violations.push(ValidationError::NoCategorySelected);
        }

        violations
    }
}
