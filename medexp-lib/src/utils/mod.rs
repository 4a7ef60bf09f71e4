mod datetime;
mod filesystem;
mod string;

pub use datetime::{default_fiscal_year, local_date_stamp, log_timestamp, parse_iso_calendar_day};
pub use filesystem::{LogCategory, format_log_record, write_error_to_log};
pub use string::{char_length, collation_key};
