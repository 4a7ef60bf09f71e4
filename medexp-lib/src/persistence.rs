use serde_json::{Value, json};
use thiserror::Error;

use crate::entry::{Entry, number_entries};
use crate::sort::{SortMethod, sort_entries};
use crate::utils::local_date_stamp;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("The file is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("The file does not contain medical expense entries:\n{}", .0.join("\n"))]
    SchemaViolation(Vec<String>),

    #[error("Invalid entry schema: {0}")]
    InvalidSchema(String),
}

/// JSON Schema of an exported entry list.
pub fn entries_schema() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "id": { "type": ["integer", "null"] },
                "name": { "type": "string" },
                "institution": { "type": "string" },
                "includes_Treatment": { "type": "boolean" },
                "includes_Medication": { "type": "boolean" },
                "includes_CareService": { "type": "boolean" },
                "includes_OtherMedicalExpenses": { "type": "boolean" },
                "medicalExpense": { "type": ["number", "null"] },
                "reimbursedAmount": { "type": ["number", "null"] },
                "paymentDate": { "type": ["string", "null"] }
            },
            "required": [
                "name",
                "institution",
                "includes_Treatment",
                "includes_Medication",
                "includes_CareService",
                "includes_OtherMedicalExpenses"
            ]
        }
    })
}

/// Serialize the accumulated list, ordered by id, with two-space indentation.
pub fn export_entries_json(entries: &[Entry]) -> Result<String, serde_json::Error> {
    let sorted = sort_entries(&number_entries(entries), SortMethod::ById);
    serde_json::to_string_pretty(&sorted)
}

/// Parse an exported entry list.
///
/// The document is checked against [`entries_schema`] before anything is
/// deserialized, so a failed import never yields a partial list. Ids in the
/// file are ignored; the array order becomes the list order.
pub fn import_entries_json(text: &str) -> Result<Vec<Entry>, ImportError> {
    let document: Value = serde_json::from_str(text)?;

    let schema = entries_schema();
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| ImportError::InvalidSchema(e.to_string()))?;

    let errors: Vec<String> = validator
        .iter_errors(&document)
        .map(|error| {
            let path = error.instance_path.to_string();
            if path.is_empty() {
                format!("  - {}", error)
            } else {
                format!("  - at {}: {}", path, error)
            }
        })
        .collect();
    if !errors.is_empty() {
        return Err(ImportError::SchemaViolation(errors));
    }

    Ok(serde_json::from_value(document)?)
}

/// `MedicalExpenseFormData_<local date>.json`
pub fn default_export_file_name() -> String {
    let date = local_date_stamp();
    format!("MedicalExpenseFormData_{date}.json")
}
