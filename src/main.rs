// reset; cargo run -- init ~/Downloads/iryouhi_form.xlsx
// reset; cargo run -- add --name "国税太郎" --institution "国税クリニック" \
//     --treatment --expense 5000 --date 2023-06-01
// reset; cargo run -- download --output ./医療費集計フォーム.xlsx

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use medexp_lib::utils::default_fiscal_year;
use medexp_lib::{
    ERRORS_LOG_FILE, Entry, EntryValidator, SortMethod, ValidatorConfig, WorkbookProjector,
};
use medical_expense_form::commands::{self, AddResult, parse_amount, parse_payment_date};
use medical_expense_form::store::DataStore;

#[derive(Parser)]
#[command(name = "medical-expense-form")]
#[command(about = "Fill in the medical expense summary form for a tax return")]
#[command(version)]
struct Args {
    /// Directory where entries and the cached template are kept
    #[arg(long, default_value = ".medexp", global = true)]
    data_dir: PathBuf,

    /// Filing year. Payment dates in this year or the next are accepted (defaults to last year)
    #[arg(long, global = true)]
    fiscal_year: Option<i32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the medical expense form template downloaded from the National Tax Agency
    Init {
        /// Path to the template xlsx file
        template: PathBuf,
    },
    /// Add one visit or purchase
    Add {
        /// Name of the patient (up to 10 characters)
        #[arg(long)]
        name: String,

        /// Hospital, pharmacy or other payee (up to 20 characters)
        #[arg(long)]
        institution: String,

        #[arg(long)]
        treatment: bool,

        #[arg(long)]
        medication: bool,

        #[arg(long)]
        care_service: bool,

        #[arg(long)]
        other: bool,

        /// Amount paid
        #[arg(long, value_parser = parse_amount)]
        expense: Option<f64>,

        /// Amount reimbursed by insurance
        #[arg(long, value_parser = parse_amount, default_value = "0")]
        reimbursed: f64,

        /// Payment date, YYYY-MM-DD
        #[arg(long, value_parser = parse_payment_date)]
        date: Option<NaiveDate>,

        /// Add the entry even if the same visit is already recorded
        #[arg(long)]
        allow_duplicate: bool,
    },
    /// Remove the last entry
    Undo,
    /// Show the recorded entries
    List {
        #[arg(long, value_enum, default_value_t = SortArg::Id)]
        sort: SortArg,
    },
    /// Show the names and institutions entered so far
    Candidates,
    /// Save the entries to a JSON file to continue later
    ExportJson {
        output: Option<PathBuf>,
    },
    /// Load entries from a JSON file saved earlier
    ImportJson {
        input: PathBuf,

        /// Replace existing entries without asking
        #[arg(long)]
        yes: bool,
    },
    /// Write the filled-in form
    Download {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Forget the cached template (entries are kept)
    ClearTemplate {
        #[arg(long)]
        yes: bool,
    },
    /// Delete every entry and the cached template
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Id,
    Name,
    Expense,
    Date,
}

impl From<SortArg> for SortMethod {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Id => SortMethod::ById,
            SortArg::Name => SortMethod::ByName,
            SortArg::Expense => SortMethod::ByMedicalExpense,
            SortArg::Date => SortMethod::ByPaymentDate,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let arguments = Args::parse();
    let store = DataStore::new(&arguments.data_dir);
    let fiscal_year = arguments.fiscal_year.unwrap_or_else(default_fiscal_year);
    let validator = EntryValidator::new(ValidatorConfig::new(fiscal_year));
    let projector = WorkbookProjector::default();

    match arguments.command {
        Command::Init { template } => {
            if let Err(e) = commands::init_template(&store, &template) {
                eprintln!("❌ Failed to load the template: {e:#}");
                std::process::exit(1);
            }
        }
        Command::Add {
            name,
            institution,
            treatment,
            medication,
            care_service,
            other,
            expense,
            reimbursed,
            date,
            allow_duplicate,
        } => {
            let candidate = Entry {
                name,
                institution,
                includes_treatment: treatment,
                includes_medication: medication,
                includes_care_service: care_service,
                includes_other_medical_expenses: other,
                medical_expense: expense,
                reimbursed_amount: reimbursed,
                payment_date: date,
            };
            match commands::add_entry(&store, &validator, candidate, allow_duplicate)? {
                AddResult::Added(id) => println!("✅ Entry {id} added"),
                AddResult::Cancelled => println!("Entry not added"),
                AddResult::Rejected(rejection) => {
                    eprintln!("❌ {rejection}");
                    std::process::exit(1);
                }
            }
        }
        Command::Undo => match commands::undo_last(&store)? {
            Some(entry) => {
                println!("✅ Removed the last entry:");
                println!("{:#?}", entry);
            }
            None => println!("There are no entries to remove"),
        },
        Command::List { sort } => {
            let entries = commands::list_entries(&store, sort.into())?;
            if entries.is_empty() {
                println!("No entries yet");
            }
            for numbered in &entries {
                println!("{}", commands::format_entry(numbered));
            }
        }
        Command::Candidates => {
            let session = store.load_session()?;
            println!("Names: {}", session.name_candidates().join(", "));
            println!("Institutions: {}", session.institution_candidates().join(", "));
        }
        Command::ExportJson { output } => {
            let path = commands::export_json(&store, output)?;
            println!("✅ Entries saved to {}", path.display());
        }
        Command::ImportJson { input, yes } => match commands::import_json(&store, &input, yes) {
            Ok(Some(count)) => println!("✅ {count} entries loaded"),
            Ok(None) => println!("Import cancelled"),
            Err(e) => {
                eprintln!("❌ {e:#}");
                eprintln!("❌ Check {} for details.", ERRORS_LOG_FILE);
                std::process::exit(1);
            }
        },
        Command::Download { output } => match commands::download(&store, &projector, output) {
            Ok(path) => println!("✅ Form written to {}", path.display()),
            Err(e) => {
                eprintln!("❌ Failed to write the form: {e:#}");
                eprintln!("❌ Check {} for details.", ERRORS_LOG_FILE);
                std::process::exit(1);
            }
        },
        Command::ClearTemplate { yes } => {
            if commands::clear_template(&store, yes)? {
                println!("✅ The cached template was deleted");
            } else if !store.has_template() {
                println!("No template is cached");
            }
        }
        Command::Reset { yes } => {
            if commands::reset(&store, yes)? {
                println!("✅ All entries and the cached template were deleted");
            }
        }
    }

    Ok(())
}
