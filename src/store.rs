// src/store.rs
use crate::error::{StoreError, StoreResult};
use crate::migrate;
use crate::models::{
    AccountRecord, AccountType, AccountUpdate, ExternalAccountView, FieldError, Label,
    ValidationErrors, MAX_LABELS_LEN, MAX_LOGIN_LEN, MAX_PASSWORD_LEN,
};
use crate::projection;
use crate::storage::KeyValueStore;
use chrono::Utc;
use log;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_STORAGE_KEY: &str = "accounts";

/// Per-field report for a record. Lengths count chars on the untrimmed value.
pub fn validation_errors(record: &AccountRecord) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    if record.login.trim().is_empty() {
        errors.login = Some(FieldError::Required);
    } else if record.login.chars().count() > MAX_LOGIN_LEN {
        errors.login = Some(FieldError::TooLong { max: MAX_LOGIN_LEN });
    }

    if record.account_type == AccountType::Local {
        match record.password.as_deref() {
            None => errors.password = Some(FieldError::Required),
            Some(password) if password.trim().is_empty() => {
                errors.password = Some(FieldError::Required)
            }
            Some(password) if password.chars().count() > MAX_PASSWORD_LEN => {
                errors.password = Some(FieldError::TooLong { max: MAX_PASSWORD_LEN })
            }
            Some(_) => {}
        }
    }

    let labels_len: usize = record.labels.iter().map(|l| l.text.chars().count()).sum();
    if labels_len > MAX_LABELS_LEN {
        errors.labels = Some(FieldError::TooLong { max: MAX_LABELS_LEN });
    }

    errors
}

/// Whether a record may be written to storage.
pub fn validate(record: &AccountRecord) -> bool {
    validation_errors(record).is_empty()
}

/// Ordered, in-memory account list backed by one key of a [`KeyValueStore`].
///
/// Edits live in memory; only the valid subset ever reaches storage, and only
/// when [`persist`](Self::persist) runs (directly, or via `remove` and
/// `commit_labels`).
pub struct AccountRepository<S: KeyValueStore> {
    storage: S,
    key: String,
    pretty: bool,
    accounts: Vec<AccountRecord>,
    reported_errors: HashMap<i64, ValidationErrors>,
    last_id: i64,
}

impl<S: KeyValueStore> AccountRepository<S> {
    pub fn new(storage: S, key: impl Into<String>) -> Self {
        AccountRepository {
            storage,
            key: key.into(),
            pretty: false,
            accounts: Vec::new(),
            reported_errors: HashMap::new(),
            last_id: 0,
        }
    }

    pub fn with_pretty_json(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn accounts(&self) -> &[AccountRecord] {
        &self.accounts
    }

    pub fn get(&self, id: i64) -> Option<&AccountRecord> {
        self.accounts.iter().find(|a| a.id == id)
    }

    /// Replaces the in-memory list with the stored snapshot.
    /// Missing or unreadable data leaves an empty list; nothing is raised.
    pub fn load(&mut self) {
        log::info!("Attempting to load accounts from storage key '{}'", self.key);
        self.reported_errors.clear();
        self.accounts = match self.read_snapshot() {
            Ok(accounts) => {
                log::info!("Loaded {} account(s) from storage", accounts.len());
                accounts
            }
            Err(e) => {
                log::error!("Failed to load accounts, starting with an empty list: {}", e);
                Vec::new()
            }
        };
        let max_loaded = self.accounts.iter().map(|a| a.id).max().unwrap_or(0);
        self.last_id = self.last_id.max(max_loaded);
        self.reassign_duplicate_ids();
    }

    // Older snapshots can hold two records created in the same millisecond.
    // The first keeps its id; later ones get fresh ids.
    fn reassign_duplicate_ids(&mut self) {
        let mut seen = HashSet::new();
        for index in 0..self.accounts.len() {
            let id = self.accounts[index].id;
            if seen.insert(id) {
                continue;
            }
            let fresh = self.next_id();
            log::warn!("Stored account id {} is duplicated; reassigned to {}", id, fresh);
            self.accounts[index].id = fresh;
            seen.insert(fresh);
        }
    }

    fn read_snapshot(&self) -> StoreResult<Vec<AccountRecord>> {
        let Some(raw) = self.storage.get(&self.key)? else {
            log::info!("No stored accounts under key '{}'", self.key);
            return Ok(Vec::new());
        };
        let mut snapshot: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            let msg = format!("Stored accounts are not valid JSON: {}", e);
            log::warn!("read_snapshot: {}", msg);
            StoreError::Deserialization(msg)
        })?;
        migrate::migrate_snapshot(&mut snapshot)?;
        serde_json::from_value(snapshot).map_err(|e| {
            let msg = format!("Stored accounts have an unexpected shape: {}", e);
            log::warn!("read_snapshot: {}", msg);
            StoreError::Deserialization(msg)
        })
    }

    /// Appends a blank record and returns its id. Not persisted.
    pub fn create(&mut self) -> i64 {
        let id = self.next_id();
        self.accounts.push(AccountRecord::blank(id));
        log::info!("Created blank account {}", id);
        id
    }

    // Millisecond timestamp, bumped past the highest id seen so far.
    // Once that reaches i64::MAX, the smallest positive id not in use.
    fn next_id(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        match self.last_id.checked_add(1) {
            Some(floor) => {
                let id = now.max(floor);
                self.last_id = id;
                id
            }
            None => {
                let id = self.smallest_unused_id();
                log::warn!("Account ids reached the maximum; reusing free id {}", id);
                id
            }
        }
    }

    fn smallest_unused_id(&self) -> i64 {
        let used: HashSet<i64> = self.accounts.iter().map(|a| a.id).collect();
        let mut id = 1;
        while used.contains(&id) {
            id += 1;
        }
        id
    }

    /// Removes the record if present and persists. Unknown ids are ignored.
    pub fn remove(&mut self, id: i64) {
        match self.accounts.iter().position(|a| a.id == id) {
            Some(index) => {
                self.accounts.remove(index);
                self.reported_errors.remove(&id);
                log::info!("Removed account {}", id);
                self.persist();
            }
            None => log::debug!("remove: no account with id {}", id),
        }
    }

    /// Applies one field edit in memory. Unknown ids are ignored.
    pub fn update_field(&mut self, id: i64, update: AccountUpdate) {
        match self.accounts.iter_mut().find(|a| a.id == id) {
            Some(account) => {
                log::debug!("Updating account {}: {:?}", id, field_name(&update));
                account.apply(update);
            }
            None => log::debug!("update_field: no account with id {}", id),
        }
    }

    /// Replaces the record's labels and persists. Unknown ids are ignored.
    pub fn commit_labels(&mut self, id: i64, labels: Vec<Label>) {
        match self.accounts.iter_mut().find(|a| a.id == id) {
            Some(account) => {
                account.labels = labels;
                log::info!("Committed {} label(s) for account {}", account.labels.len(), id);
                self.persist();
            }
            None => log::debug!("commit_labels: no account with id {}", id),
        }
    }

    /// Parses `"a; b"`-style text and commits the result.
    pub fn commit_label_text(&mut self, id: i64, text: &str) {
        self.commit_labels(id, migrate::parse_labels(text));
    }

    /// Recomputes the record's field errors, replacing any reported earlier.
    /// Returns `false` for unknown ids.
    pub fn revalidate(&mut self, id: i64) -> bool {
        let Some(account) = self.get(id) else {
            log::debug!("revalidate: no account with id {}", id);
            return false;
        };
        let errors = validation_errors(account);
        let valid = errors.is_empty();
        if valid {
            self.reported_errors.remove(&id);
        } else {
            self.reported_errors.insert(id, errors);
        }
        valid
    }

    pub fn reported_errors(&self, id: i64) -> Option<&ValidationErrors> {
        self.reported_errors.get(&id)
    }

    /// Writes the valid subset to storage. Failures are logged, not returned,
    /// and never touch the in-memory list.
    pub fn persist(&self) {
        if let Err(e) = self.write_snapshot() {
            log::error!("Failed to persist accounts under key '{}': {}", self.key, e);
        }
    }

    fn write_snapshot(&self) -> StoreResult<()> {
        let valid: Vec<&AccountRecord> = self.accounts.iter().filter(|a| validate(a)).collect();
        let serialized = if self.pretty {
            serde_json::to_string_pretty(&valid)
        } else {
            serde_json::to_string(&valid)
        }
        .map_err(|e| {
            let msg = format!("JSON serialization failed: {}", e);
            log::error!("write_snapshot: {}", msg);
            StoreError::Serialization(msg)
        })?;

        self.storage.set(&self.key, &serialized)?;
        let skipped = self.accounts.len() - valid.len();
        if skipped > 0 {
            log::info!(
                "Persisted {} account(s); {} incomplete account(s) kept in memory only",
                valid.len(),
                skipped
            );
        } else {
            log::info!("Persisted {} account(s)", valid.len());
        }
        Ok(())
    }

    pub fn project_all(&self) -> Vec<ExternalAccountView> {
        self.accounts.iter().map(projection::project).collect()
    }

    pub fn project_one(&self, id: i64) -> Option<ExternalAccountView> {
        self.get(id).map(projection::project)
    }
}

fn field_name(update: &AccountUpdate) -> &'static str {
    match update {
        AccountUpdate::SetLogin(_) => "login",
        AccountUpdate::SetPassword(_) => "password",
        AccountUpdate::SetType(_) => "type",
        AccountUpdate::SetLabels(_) => "labels",
    }
}
