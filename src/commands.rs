use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use medexp_lib::utils::{LogCategory, write_error_to_log};
use medexp_lib::{
    Entry, EntryValidator, FORM_FILE_NAME, FORM_SHEET_NAME, NumberedEntry, SortMethod,
    ValidationError, WorkbookError, WorkbookProjector, default_export_file_name,
    export_entries_json, import_entries_json, sort_entries,
};

use crate::store::DataStore;

/// Ask a yes/no question on the terminal; `assume_yes` answers it without asking.
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool, anyhow::Error> {
    if assume_yes {
        return Ok(true);
    }
    print!("{prompt} [y/N]: ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    return Ok(answer == "y" || answer == "yes");
}

/// Parse an amount typed by the user: a finite, non-negative number.
pub fn parse_amount(value: &str) -> Result<f64, String> {
    let amount: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(format!("'{value}' is not a valid amount"));
    }
    Ok(amount)
}

/// Parse a payment date as `YYYY-MM-DD` or `YYYY/MM/DD`.
pub fn parse_payment_date(value: &str) -> Result<NaiveDate, String> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y/%m/%d"))
        .map_err(|_| format!("'{value}' is not a date (expected YYYY-MM-DD)"))
}

pub fn init_template(store: &DataStore, template_path: &Path) -> Result<(), anyhow::Error> {
    let bytes = std::fs::read(template_path)
        .with_context(|| format!("Failed to read {}", template_path.display()))?;
    let workbook = store.cache_template(&bytes)?;
    println!("✅ Template loaded: {}", template_path.display());
    if workbook.worksheet(FORM_SHEET_NAME).is_err() {
        eprintln!(
            "⚠️  The template has no worksheet named {FORM_SHEET_NAME}; \
             download will fail until a matching template is loaded."
        );
    }
    Ok(())
}

pub enum AddResult {
    Added(usize),
    Rejected(ValidationError),
    Cancelled,
}

/// Validate a candidate and append it to the saved session.
///
/// A duplicate prompts for confirmation (unless `allow_duplicate` is set);
/// every other rejection is final.
pub fn add_entry(
    store: &DataStore,
    validator: &EntryValidator,
    candidate: Entry,
    allow_duplicate: bool,
) -> Result<AddResult, anyhow::Error> {
    let mut session = store.load_session()?;

    let mut override_duplicate = allow_duplicate;
    if !override_duplicate {
        if let Err(ValidationError::Duplicate { existing_id }) =
            validator.validate(session.entries(), &candidate, false)
        {
            eprintln!("⚠️  The same visit is already recorded as entry {existing_id}.");
            if !confirm("Add it anyway?", false)? {
                return Ok(AddResult::Cancelled);
            }
            override_duplicate = true;
        }
    }

    match session.try_add(candidate, validator, override_duplicate) {
        Ok(id) => {
            store.save_session(&session)?;
            Ok(AddResult::Added(id))
        }
        Err(rejection) => {
            write_error_to_log(LogCategory::EntryRejected, &rejection.to_string());
            Ok(AddResult::Rejected(rejection))
        }
    }
}

/// Drop the last entry and return it for correction.
pub fn undo_last(store: &DataStore) -> Result<Option<Entry>, anyhow::Error> {
    let mut session = store.load_session()?;
    let undone = session.undo_last();
    if undone.is_some() {
        store.save_session(&session)?;
    }
    Ok(undone)
}

pub fn list_entries(
    store: &DataStore,
    method: SortMethod,
) -> Result<Vec<NumberedEntry>, anyhow::Error> {
    let session = store.load_session()?;
    Ok(sort_entries(&session.numbered(), method))
}

pub fn format_entry(numbered: &NumberedEntry) -> String {
    let entry = &numbered.entry;
    let categories: Vec<&str> = [
        (entry.includes_treatment, "treatment"),
        (entry.includes_medication, "medication"),
        (entry.includes_care_service, "care"),
        (entry.includes_other_medical_expenses, "other"),
    ]
    .into_iter()
    .filter_map(|(applies, label)| applies.then_some(label))
    .collect();
    let amount = entry
        .medical_expense_value()
        .map(|amount| amount.to_string())
        .unwrap_or_else(|| "-".to_string());
    let date = entry
        .payment_date
        .map(|date| date.format("%Y/%m/%d").to_string())
        .unwrap_or_else(|| "----/--/--".to_string());
    format!(
        "{:>3}  {}  {}  {}  {}  {} (reimbursed {})",
        numbered.id,
        date,
        entry.name,
        entry.institution,
        categories.join("+"),
        amount,
        entry.reimbursed_amount
    )
}

pub fn export_json(store: &DataStore, output: Option<PathBuf>) -> Result<PathBuf, anyhow::Error> {
    let session = store.load_session()?;
    let output = output.unwrap_or_else(|| PathBuf::from(default_export_file_name()));
    let json = export_entries_json(session.entries())?;
    std::fs::write(&output, json)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(output)
}

/// Replace the saved entries with the contents of an exported JSON file.
///
/// Returns `None` when the user declined to overwrite existing entries.
pub fn import_json(
    store: &DataStore,
    input: &Path,
    assume_yes: bool,
) -> Result<Option<usize>, anyhow::Error> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let entries = match import_entries_json(&text) {
        Ok(entries) => entries,
        Err(error) => {
            write_error_to_log(LogCategory::EntriesImportFailed, &error.to_string());
            let context = format!("Failed to import {}", input.display());
            return Err(anyhow::Error::new(error).context(context));
        }
    };

    let mut session = store.load_session()?;
    if !session.is_empty()
        && !confirm(
            &format!("{} entries are already recorded. Replace them?", session.len()),
            assume_yes,
        )?
    {
        return Ok(None);
    }

    session.replace_all(entries);
    store.save_session(&session)?;
    Ok(Some(session.len()))
}

/// Fill the cached template with the saved entries and write it to `output`.
pub fn download(
    store: &DataStore,
    projector: &WorkbookProjector,
    output: Option<PathBuf>,
) -> Result<PathBuf, anyhow::Error> {
    let session = store.load_session()?;
    if session.is_empty() {
        anyhow::bail!("No entries have been entered yet");
    }
    let Some(template) = store.load_template_bytes()? else {
        anyhow::bail!("No medical expense form template has been loaded (run `init` first)");
    };

    let filled = match projector.project_xlsx(session.entries(), &template) {
        Ok(filled) => filled,
        Err(error) => {
            let category = match &error {
                WorkbookError::WorksheetNotFound(_) => LogCategory::FormSheetMissing,
                _ => LogCategory::TemplateUnreadable,
            };
            write_error_to_log(category, &error.to_string());
            return Err(error.into());
        }
    };

    let output = output.unwrap_or_else(|| PathBuf::from(FORM_FILE_NAME));
    std::fs::write(&output, filled)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(output)
}

/// Forget the cached template so a different one can be loaded. Entries are kept.
pub fn clear_template(store: &DataStore, assume_yes: bool) -> Result<bool, anyhow::Error> {
    if !store.has_template() {
        return Ok(false);
    }
    if !confirm("Delete the cached template? Entries are kept.", assume_yes)? {
        return Ok(false);
    }
    store.clear_template()?;
    Ok(true)
}

pub fn reset(store: &DataStore, assume_yes: bool) -> Result<bool, anyhow::Error> {
    if !confirm("Delete every entry and the cached template?", assume_yes)? {
        return Ok(false);
    }
    store.clear()?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("5000"), Ok(5000.0));
        assert_eq!(parse_amount(" 12.5 "), Ok(12.5));
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("NaN").is_err());
        assert!(parse_amount("five").is_err());
    }

    #[test]
    fn test_parse_payment_date_accepts_both_separators() {
        let expected = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        assert_eq!(parse_payment_date("2023-06-01"), Ok(expected));
        assert_eq!(parse_payment_date("2023/06/01"), Ok(expected));
        assert!(parse_payment_date("06/01/2023").is_err());
    }

    #[test]
    fn test_format_entry_lists_categories() {
        let numbered = NumberedEntry {
            id: 3,
            entry: Entry {
                name: "Taro".to_string(),
                institution: "ClinicA".to_string(),
                includes_treatment: true,
                includes_other_medical_expenses: true,
                medical_expense: Some(5000.0),
                ..Entry::draft()
            },
        };
        let line = format_entry(&numbered);
        assert!(line.starts_with("  3  ----/--/--  Taro  ClinicA  treatment+other  5000"));
    }
}
