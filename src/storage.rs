//! Persistence backends for the account ledger
//!
//! The store is a flat JSON-style mapping keyed by the string form of the user
//! ID. Decoding is per record and fails closed: a bad record becomes a default
//! account and is logged, it never aborts startup.

use crate::errors::StorageError;
use crate::ledger::{Account, CaughtItem, UserId};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Raw store contents, keyed by string-encoded user ID
pub type StoreMapping = Map<String, Value>;

const LEGACY_CLAIM_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Abstract key-value store the ledger flushes into
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Read the whole mapping; a store that does not exist yet is empty
    async fn load(&self) -> Result<StoreMapping, StorageError>;

    /// Replace the whole mapping
    async fn save(&self, mapping: &StoreMapping) -> Result<(), StorageError>;
}

/// On-disk shape of one account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedAccount {
    #[serde(default)]
    pub coins: i64,
    #[serde(default)]
    pub last_claim: Option<String>,
    #[serde(default)]
    pub fishes: Vec<Value>,
}

/// Encode the ledger into the store layout
pub fn encode_accounts<'a, I>(accounts: I) -> StoreMapping
where
    I: IntoIterator<Item = (&'a UserId, &'a Account)>,
{
    accounts
        .into_iter()
        .map(|(id, account)| {
            let fishes = account
                .inventory
                .iter()
                .filter_map(|item| serde_json::to_value(item).ok())
                .collect();
            let record = PersistedAccount {
                coins: i64::try_from(account.balance).unwrap_or(i64::MAX),
                last_claim: account.last_claim.map(|ts| ts.to_rfc3339()),
                fishes,
            };
            let value = serde_json::to_value(record).unwrap_or(Value::Null);
            (id.to_string(), value)
        })
        .collect()
}

/// Decode the store layout, skipping or defaulting anything malformed
pub fn decode_accounts(mapping: StoreMapping) -> BTreeMap<UserId, Account> {
    let mut accounts = BTreeMap::new();

    for (key, value) in mapping {
        let Ok(id) = key.parse::<UserId>() else {
            warn!("Skipping stored record with non-numeric key '{}'", key);
            continue;
        };
        accounts.insert(id, decode_account(id, value));
    }

    accounts
}

fn decode_account(id: UserId, value: Value) -> Account {
    let record: PersistedAccount = match serde_json::from_value(value) {
        Ok(record) => record,
        Err(e) => {
            warn!("Stored record for user {} is malformed, resetting it: {}", id, e);
            return Account::default();
        }
    };

    let balance = u64::try_from(record.coins).unwrap_or_else(|_| {
        warn!("Stored balance {} for user {} is negative, treating as 0", record.coins, id);
        0
    });

    let last_claim = record.last_claim.as_deref().and_then(|raw| {
        let parsed = parse_claim_timestamp(raw);
        if parsed.is_none() {
            warn!("Unreadable last_claim '{}' for user {}, clearing it", raw, id);
        }
        parsed
    });

    let inventory = record
        .fishes
        .into_iter()
        .filter_map(|fish| match serde_json::from_value::<CaughtItem>(fish) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Dropping malformed inventory entry for user {}: {}", id, e);
                None
            }
        })
        .collect();

    Account {
        balance,
        last_claim,
        inventory,
    }
}

/// Accepts RFC 3339 and the older `YYYY-MM-DD HH:MM:SS` (UTC) form
pub fn parse_claim_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, LEGACY_CLAIM_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// JSON file store, written atomically through a sibling temp file
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl PersistenceBackend for JsonFileBackend {
    async fn load(&self) -> Result<StoreMapping, StorageError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No data file at {}, starting empty", self.path.display());
                return Ok(StoreMapping::new());
            }
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(mapping)) => Ok(mapping),
            Ok(other) => {
                warn!(
                    "Data file {} holds {} instead of an object, starting empty",
                    self.path.display(),
                    json_kind(&other)
                );
                Ok(StoreMapping::new())
            }
            Err(e) => {
                warn!("Data file {} is not valid JSON, starting empty: {}", self.path.display(), e);
                Ok(StoreMapping::new())
            }
        }
    }

    async fn save(&self, mapping: &StoreMapping) -> Result<(), StorageError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        mapping.serialize(&mut serializer)?;

        let temp = self.temp_path();
        tokio::fs::write(&temp, &buf)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("{}: {}", temp.display(), e)))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("{}: {}", self.path.display(), e)))?;

        debug!("Flushed {} accounts to {}", mapping.len(), self.path.display());
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Volatile store for tests and throwaway sessions
#[derive(Default)]
pub struct MemoryBackend {
    mapping: Mutex<StoreMapping>,
    fail_writes: AtomicBool,
    saves: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(mapping: StoreMapping) -> Self {
        Self {
            mapping: Mutex::new(mapping),
            ..Default::default()
        }
    }

    /// Make every subsequent `save` fail until switched back
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn contents(&self) -> StoreMapping {
        self.mapping
            .lock()
            .map(|m| m.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn load(&self) -> Result<StoreMapping, StorageError> {
        Ok(self.contents())
    }

    async fn save(&self, mapping: &StoreMapping) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::WriteFailed("memory backend refusing writes".to_string()));
        }
        let mut stored = self
            .mapping
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *stored = mapping.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::rarity::RarityTier;
    use serde_json::json;

    #[test]
    fn test_decode_fails_closed_per_record() {
        let mapping = json!({
            "1": {
                "coins": 250,
                "last_claim": "2024-05-01 12:30:00",
                "fishes": [{ "name": "Pike", "rarity": "Rare" }]
            },
            "2": { "coins": "lots" },
            "3": {
                "fishes": [
                    { "name": "Minnow", "rarity": "Common" },
                    { "name": "Ghost", "rarity": "Mythic" }
                ]
            },
            "4": { "coins": -20, "last_claim": "yesterday" },
            "not-a-user": { "coins": 5 }
        });
        let Value::Object(mapping) = mapping else { unreachable!() };

        let accounts = decode_accounts(mapping);

        assert_eq!(accounts.len(), 4);
        let first = &accounts[&UserId(1)];
        assert_eq!(first.balance, 250);
        assert!(first.last_claim.is_some());
        assert_eq!(first.inventory[0].tier, RarityTier::Rare);

        assert_eq!(accounts[&UserId(2)], Account::default());

        let third = &accounts[&UserId(3)];
        assert_eq!(third.balance, 0);
        assert_eq!(third.inventory.len(), 1);

        let fourth = &accounts[&UserId(4)];
        assert_eq!(fourth.balance, 0);
        assert!(fourth.last_claim.is_none());
    }

    #[test]
    fn test_encode_layout() {
        let mut accounts = BTreeMap::new();
        accounts.insert(
            UserId(7),
            Account {
                balance: 40,
                last_claim: parse_claim_timestamp("2024-01-02T03:04:05Z"),
                inventory: vec![CaughtItem { name: "Bass".into(), tier: RarityTier::Uncommon }],
            },
        );

        let mapping = encode_accounts(&accounts);
        assert_eq!(
            mapping["7"],
            json!({
                "coins": 40,
                "last_claim": "2024-01-02T03:04:05+00:00",
                "fishes": [{ "name": "Bass", "rarity": "Uncommon" }]
            })
        );
    }

    #[tokio::test]
    async fn test_json_backend_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.json");
        let backend = JsonFileBackend::new(&path);

        assert!(backend.load().await.expect("missing file is empty").is_empty());

        tokio::fs::write(&path, b"{ not json").await.expect("write");
        assert!(backend.load().await.expect("corrupt file is empty").is_empty());

        let mut mapping = StoreMapping::new();
        mapping.insert("9".into(), json!({ "coins": 3, "last_claim": null, "fishes": [] }));
        backend.save(&mapping).await.expect("save");

        let reloaded = backend.load().await.expect("load");
        assert_eq!(reloaded, mapping);
        assert!(!backend.temp_path().exists());
    }

    #[tokio::test]
    async fn test_memory_backend_failure_toggle() {
        let backend = MemoryBackend::new();
        backend.set_fail_writes(true);
        assert!(backend.save(&StoreMapping::new()).await.is_err());
        backend.set_fail_writes(false);
        backend.save(&StoreMapping::new()).await.expect("save");
        assert_eq!(backend.save_count(), 1);
    }
}
