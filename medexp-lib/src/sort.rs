use std::cmp::Ordering;

use chrono::NaiveDate;

use crate::entry::NumberedEntry;
use crate::utils::collation_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMethod {
    ById,
    ByName,
    ByMedicalExpense,
    ByPaymentDate,
}

/// Return a sorted copy of `entries`; the input is left untouched.
///
/// All modes use a stable sort, so entries that compare equal keep their
/// original relative order. Undated entries sort before every dated entry.
pub fn sort_entries(entries: &[NumberedEntry], method: SortMethod) -> Vec<NumberedEntry> {
    let mut sorted = entries.to_vec();
    match method {
        SortMethod::ById => sorted.sort_by_key(|numbered| numbered.id),
        SortMethod::ByName => sorted.sort_by(|a, b| compare_names(&a.entry.name, &b.entry.name)),
        SortMethod::ByMedicalExpense => sorted.sort_by(|a, b| {
            let a = a.entry.medical_expense_value().unwrap_or(0.0);
            let b = b.entry.medical_expense_value().unwrap_or(0.0);
            a.total_cmp(&b)
        }),
        SortMethod::ByPaymentDate => sorted.sort_by_key(|numbered| {
            numbered.entry.payment_date.unwrap_or(NaiveDate::MIN)
        }),
    }
    sorted
}

fn compare_names(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}
