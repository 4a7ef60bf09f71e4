//! Property tests for the entry validator.
//! Every candidate is built valid first, then exactly one field is broken.

use medexp_lib::{Entry, ValidationError};
use proptest::prelude::*;

mod common;

fn valid_name() -> impl Strategy<Value = String> {
    "[a-zA-Zあ-ん]{1,10}"
}

fn valid_institution() -> impl Strategy<Value = String> {
    "[a-zA-Z病院薬局]{1,20}"
}

fn valid_entry() -> impl Strategy<Value = Entry> {
    (
        valid_name(),
        valid_institution(),
        0u32..1_000_000,
        common::FISCAL_YEAR..=common::FISCAL_YEAR + 1,
        1u32..=12,
        1u32..=28,
    )
        .prop_map(|(name, institution, amount, year, month, day)| {
            common::create_valid_entry(&name, &institution, amount as f64, Some((year, month, day)))
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        ..ProptestConfig::default()
    })]

    #[test]
    fn prop_valid_entries_are_accepted(entry in valid_entry()) {
        prop_assert_eq!(common::create_validator().validate(&[], &entry, false), Ok(()));
    }

    #[test]
    fn prop_no_category_is_always_rejected(mut entry in valid_entry()) {
        entry.includes_treatment = false;
        entry.includes_medication = false;
        entry.includes_care_service = false;
        entry.includes_other_medical_expenses = false;
        prop_assert_eq!(
            common::create_validator().validate(&[], &entry, false),
            Err(ValidationError::NoCategorySelected)
        );
    }

    #[test]
    fn prop_any_single_category_is_enough(mut entry in valid_entry(), which in 0usize..4) {
        entry.includes_treatment = which == 0;
        entry.includes_medication = which == 1;
        entry.includes_care_service = which == 2;
        entry.includes_other_medical_expenses = which == 3;
        prop_assert!(common::create_validator().validate(&[], &entry, false).is_ok());
    }

    #[test]
    fn prop_long_names_are_rejected(mut entry in valid_entry(), name in "[a-zあ-ん]{11,30}") {
        entry.name = name;
        let is_too_long = matches!(
            common::create_validator().validate(&[], &entry, false),
            Err(ValidationError::NameTooLong { .. })
        );
        prop_assert!(is_too_long);
    }

    #[test]
    fn prop_long_institutions_are_rejected(mut entry in valid_entry(), institution in "[a-z病院]{21,40}") {
        entry.institution = institution;
        let is_too_long = matches!(
            common::create_validator().validate(&[], &entry, false),
            Err(ValidationError::InstitutionTooLong { .. })
        );
        prop_assert!(is_too_long);
    }

    #[test]
    fn prop_dates_outside_window_are_rejected(
        mut entry in valid_entry(),
        year in prop_oneof![1990i32..common::FISCAL_YEAR, (common::FISCAL_YEAR + 2)..2100],
    ) {
        entry.payment_date = chrono::NaiveDate::from_ymd_opt(year, 3, 15);
        let is_out_of_range = matches!(
            common::create_validator().validate(&[], &entry, false),
            Err(ValidationError::DateOutOfRange { .. })
        );
        prop_assert!(is_out_of_range);
    }

    #[test]
    fn prop_changing_any_key_field_clears_duplicate(existing in valid_entry(), field in 0usize..4) {
        let accumulated = vec![existing.clone()];
        prop_assert!(medexp_lib::is_duplicate(&accumulated, &existing));

        let mut candidate = existing.clone();
        match field {
            0 => candidate.name.push('x'),
            1 => candidate.institution.push('x'),
            2 => candidate.medical_expense = candidate.medical_expense.map(|amount| amount + 1.0),
            _ => candidate.payment_date = candidate.payment_date.and_then(|date| date.succ_opt()),
        }
        prop_assert!(!medexp_lib::is_duplicate(&accumulated, &candidate));
    }
}

#[test]
fn test_empty_name_and_institution_are_rejected() {
    let validator = common::create_validator();

    let mut entry = common::create_valid_entry("Taro", "ClinicA", 100.0, None);
    entry.name.clear();
    assert_eq!(
        validator.validate(&[], &entry, false),
        Err(ValidationError::NameEmpty)
    );

    let mut entry = common::create_valid_entry("Taro", "ClinicA", 100.0, None);
    entry.institution.clear();
    assert_eq!(
        validator.validate(&[], &entry, false),
        Err(ValidationError::InstitutionEmpty)
    );
}

#[test]
fn test_unset_expense_is_rejected() {
    let mut entry = common::create_valid_entry("Taro", "ClinicA", 100.0, None);
    entry.medical_expense = None;
    assert_eq!(
        common::create_validator().validate(&[], &entry, false),
        Err(ValidationError::ExpenseUnset)
    );
}

#[test]
fn test_validator_error_messages() {
    assert_eq!(
        ValidationError::NameTooLong { length: 12, limit: 10 }.to_string(),
        "Patient name exceeds 10 characters (got 12)"
    );
    assert_eq!(
        ValidationError::Duplicate { existing_id: 3 }.to_string(),
        "An entry with the same name, institution, amount and payment date already exists (entry 3)"
    );
}
