use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use medexp_lib::{EntrySession, TemplateWorkbook, export_entries_json, import_entries_json};

const ENTRIES_FILE: &str = "entries.json";
const TEMPLATE_FILE: &str = "template.xlsx";

/// Local storage for one user: the accumulated entries and the cached template bytes.
pub struct DataStore {
    dir: PathBuf,
}

impl DataStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        DataStore {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn entries_path(&self) -> PathBuf {
        self.dir.join(ENTRIES_FILE)
    }

    pub fn template_path(&self) -> PathBuf {
        self.dir.join(TEMPLATE_FILE)
    }

    /// The saved session, or an empty one when nothing has been saved yet.
    pub fn load_session(&self) -> Result<EntrySession, anyhow::Error> {
        let path = self.entries_path();
        if !path.exists() {
            return Ok(EntrySession::new());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let entries = import_entries_json(&text)
            .with_context(|| format!("Saved entries in {} are corrupted", path.display()))?;
        return Ok(EntrySession::from_entries(entries));
    }

    pub fn save_session(&self, session: &EntrySession) -> Result<(), anyhow::Error> {
        self.ensure_dir()?;
        let json = export_entries_json(session.entries())?;
        let path = self.entries_path();
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Cache the raw template bytes after checking that they can be read as a workbook.
    pub fn cache_template(&self, bytes: &[u8]) -> Result<TemplateWorkbook, anyhow::Error> {
        let workbook = TemplateWorkbook::from_xlsx_bytes(bytes)?;
        self.ensure_dir()?;
        let path = self.template_path();
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(workbook)
    }

    /// The cached template file, untouched since it was loaded.
    pub fn load_template_bytes(&self) -> Result<Option<Vec<u8>>, anyhow::Error> {
        let path = self.template_path();
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)
            .with_context(|| format!("Cached template {} is unreadable", path.display()))?;
        return Ok(Some(bytes));
    }

    pub fn has_template(&self) -> bool {
        self.template_path().exists()
    }

    /// Forget the cached template; the saved entries stay.
    pub fn clear_template(&self) -> Result<(), anyhow::Error> {
        remove_if_exists(&self.template_path())
    }

    /// Remove the saved entries and the cached template.
    pub fn clear(&self) -> Result<(), anyhow::Error> {
        remove_if_exists(&self.entries_path())?;
        self.clear_template()
    }

    fn ensure_dir(&self) -> Result<(), anyhow::Error> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))
    }
}

fn remove_if_exists(path: &Path) -> Result<(), anyhow::Error> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}
