use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One line-item of the medical expense summary form.
///
/// The entry does not carry its own id: ids are derived from the position in
/// the accumulated list (see [`NumberedEntry`] and [`number_entries`]).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Entry {
    /// Patient name
    pub name: String,
    /// Hospital, pharmacy or other institution that was paid
    pub institution: String,
    #[serde(rename = "includes_Treatment", default)]
    pub includes_treatment: bool,
    #[serde(rename = "includes_Medication", default)]
    pub includes_medication: bool,
    #[serde(rename = "includes_CareService", default)]
    pub includes_care_service: bool,
    #[serde(rename = "includes_OtherMedicalExpenses", default)]
    pub includes_other_medical_expenses: bool,
    /// `None` while the amount has not been entered.
    #[serde(rename = "medicalExpense", default)]
    pub medical_expense: Option<f64>,
    /// Amount reimbursed by insurance, zero when not entered.
    #[serde(
        rename = "reimbursedAmount",
        default,
        deserialize_with = "amount_or_zero::deserialize"
    )]
    pub reimbursed_amount: f64,
    #[serde(rename = "paymentDate", default, with = "payment_date_format")]
    pub payment_date: Option<NaiveDate>,
}

impl Entry {
    /// A blank draft, the state of the form before the user types anything.
    pub fn draft() -> Self {
        Entry::default()
    }

    /// The medical expense when it holds a usable number.
    pub fn medical_expense_value(&self) -> Option<f64> {
        self.medical_expense.filter(|amount| amount.is_finite())
    }

    pub fn has_category(&self) -> bool {
        self.includes_treatment
            || self.includes_medication
            || self.includes_care_service
            || self.includes_other_medical_expenses
    }
}

/// An entry paired with its position-derived id (1-based).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberedEntry {
    pub id: usize,
    #[serde(flatten)]
    pub entry: Entry,
}

/// Attach ids to an ordered list: the id of each entry is its position + 1.
pub fn number_entries(entries: &[Entry]) -> Vec<NumberedEntry> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| NumberedEntry {
            id: index + 1,
            entry: entry.clone(),
        })
        .collect()
}

/// Serializes payment dates as `YYYY-MM-DD`.
///
/// Deserialization accepts a plain date or a full ISO 8601 date-time. Anything
/// else is read as "no date" instead of failing the whole document.
pub(crate) mod payment_date_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::utils::parse_iso_calendar_day;

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(date) => serializer.serialize_str(&date.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse_iso_calendar_day))
    }
}

mod amount_or_zero {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<f64>::deserialize(deserializer)?;
        Ok(raw.filter(|amount| amount.is_finite()).unwrap_or(0.0))
    }
}
