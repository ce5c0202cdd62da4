use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use discarr_model::{DownloadId, LedgerTimestamp};
use serde_json::Value;
use tracing::{debug, warn};

use super::{Ledger, LedgerStore};
use crate::error::LedgerError;

/// Ledger persisted as a JSON object of `"<id>": "<timestamp>"` pairs.
#[derive(Debug, Clone)]
pub struct JsonFileLedgerStore {
    path: PathBuf,
}

impl JsonFileLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStore for JsonFileLedgerStore {
    fn load(&self) -> Ledger {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(
                    path = %self.path.display(),
                    "no ledger yet, starting empty"
                );
                return Ledger::new();
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "ledger unreadable, starting empty"
                );
                return Ledger::new();
            }
        };

        decode(&contents).unwrap_or_else(|reason| {
            warn!(
                path = %self.path.display(),
                %reason,
                "ledger corrupt, resetting to empty"
            );
            Ledger::new()
        })
    }

    fn save(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        let bytes = serde_json::to_vec(&encode(ledger))?;
        write_atomically(&self.path, &bytes).map_err(|source| LedgerError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn encode(ledger: &Ledger) -> BTreeMap<String, String> {
    ledger
        .records()
        .map(|record| {
            (record.id.to_string(), record.last_healthy_at.to_string())
        })
        .collect()
}

fn decode(contents: &str) -> Result<Ledger, String> {
    // An empty file is what a freshly created ledger looks like.
    if contents.trim().is_empty() {
        return Ok(Ledger::new());
    }

    let value: Value =
        serde_json::from_str(contents).map_err(|err| err.to_string())?;
    let Value::Object(entries) = value else {
        return Err("top-level value is not an object".to_string());
    };

    let mut ledger = Ledger::new();
    for (key, raw) in entries {
        let Ok(id) = DownloadId::new(key.as_str()) else {
            warn!("dropping ledger record with empty id");
            continue;
        };
        let parsed = raw
            .as_str()
            .and_then(|text| text.parse::<LedgerTimestamp>().ok());
        match parsed {
            Some(ts) => ledger.upsert(id, ts),
            None => warn!(
                download_id = %id,
                value = %raw,
                "dropping ledger record with unreadable timestamp"
            ),
        }
    }
    Ok(ledger)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    {
        let mut f = File::create(&tmp_path)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    sync_dir(parent)
}

/// Flush the directory entry so the rename survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn ts(h: u32, m: u32) -> LedgerTimestamp {
        LedgerTimestamp::from_naive(
            NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap(),
        )
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileLedgerStore::new(dir.path().join("absent.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn empty_and_garbage_files_are_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let store = JsonFileLedgerStore::new(&path);

        fs::write(&path, "").unwrap();
        assert!(store.load().is_empty());

        fs::write(&path, "{\"42\": \"2024-05-01 ").unwrap();
        assert!(store.load().is_empty());

        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_then_load_preserves_records() {
        let dir = tempdir().unwrap();
        let store = JsonFileLedgerStore::new(dir.path().join("ledger.json"));

        let mut ledger = Ledger::new();
        ledger.upsert(DownloadId::from(42), ts(10, 0));
        ledger.upsert(DownloadId::from(7), ts(11, 30));
        store.save(&ledger).unwrap();

        assert_eq!(store.load(), ledger);
        assert!(!dir.path().join("ledger.json.tmp").exists());
    }

    #[test]
    fn sibling_ledgers_sharing_a_stem_do_not_collide() {
        let dir = tempdir().unwrap();
        let json = JsonFileLedgerStore::new(dir.path().join("movies.json"));
        let other = JsonFileLedgerStore::new(dir.path().join("movies.state"));

        let mut first = Ledger::new();
        first.upsert(DownloadId::from(1), ts(9, 0));
        let mut second = Ledger::new();
        second.upsert(DownloadId::from(2), ts(9, 30));
        json.save(&first).unwrap();
        other.save(&second).unwrap();

        assert_eq!(json.load(), first);
        assert_eq!(other.load(), second);
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn persisted_form_is_flat_string_map() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let store = JsonFileLedgerStore::new(&path);

        let mut ledger = Ledger::new();
        ledger.upsert(DownloadId::from(42), ts(10, 0));
        store.save(&ledger).unwrap();

        let raw: Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({"42": "2024-05-01 10:00:00.000000"})
        );
    }

    #[test]
    fn reads_ledgers_written_by_older_tooling() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(
            &path,
            r#"{"1311": "2023-11-02 21:14:03.512345",
                "1312": "2023-11-02 21:15:00.000001"}"#,
        )
        .unwrap();

        let ledger = JsonFileLedgerStore::new(&path).load();
        assert_eq!(ledger.len(), 2);
        assert_eq!(
            ledger.get(&DownloadId::from(1311)).unwrap().to_string(),
            "2023-11-02 21:14:03.512345"
        );
    }

    #[test]
    fn bad_records_are_dropped_individually() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(
            &path,
            r#"{"1": "2024-05-01 10:00:00.000000",
                "2": 1700000000.5, "3": "yesterday"}"#,
        )
        .unwrap();

        let ledger = JsonFileLedgerStore::new(&path).load();
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains(&DownloadId::from(1)));
    }

    #[test]
    fn save_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("nested").join("ledger.json");
        let store = JsonFileLedgerStore::new(&path);
        store.save(&Ledger::new()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }
}
