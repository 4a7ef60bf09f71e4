use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;

use crate::ERRORS_LOG_FILE;
use crate::utils::log_timestamp;

/// What went wrong, as recorded in `errors.log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    /// A candidate entry failed validation.
    EntryRejected,
    /// A saved entries file could not be read back.
    EntriesImportFailed,
    /// The cached template has no medical expense form sheet.
    FormSheetMissing,
    /// The cached template could not be opened or patched.
    TemplateUnreadable,
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogCategory::EntryRejected => "entry rejected",
            LogCategory::EntriesImportFailed => "entries import failed",
            LogCategory::FormSheetMissing => "form sheet missing",
            LogCategory::TemplateUnreadable => "template unreadable",
        };
        f.write_str(label)
    }
}

/// One `errors.log` record: `[<UTC timestamp>] <category>` followed by the
/// message, indented so multi-line schema reports stay readable.
pub fn format_log_record(timestamp: &str, category: LogCategory, message: &str) -> String {
    let mut record = format!("[{timestamp}] {category}\n");
    for line in message.lines() {
        record.push_str("    ");
        record.push_str(line);
        record.push('\n');
    }
    record
}

/// Append a record to `errors.log` in the working directory.
///
/// Failing to write the log never fails the command that is reporting.
pub fn write_error_to_log(category: LogCategory, message: &str) {
    let record = format_log_record(&log_timestamp(), category, message);

    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(ERRORS_LOG_FILE)
    {
        let _ = file.write_all(record.as_bytes());
    }
}
