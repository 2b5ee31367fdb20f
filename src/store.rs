//! Ledger entity store over a single sled tree.
//!
//! Records live under `<prefix>/<key>` and unique indexes under
//! `<index>/<value>` pointing at a record key. Everything shares one tree so a
//! workflow transition can read and write any record inside one serializable
//! transaction.

use crate::config::DatabaseConfig;
use crate::error::WorkflowError;
use crate::model::{GateEntry, InventoryLog, InwardProcess, Material, MaterialIssue, User};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use std::sync::Arc;

pub type TxResult<T> = ConflictableTransactionResult<T, WorkflowError>;

/// A CBOR encoded entity with its own keyspace.
pub trait Record: minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()> {
    const PREFIX: &'static str;
    /// Name used in not-found errors.
    const KIND: &'static str;

    fn storage_key(&self) -> String;

    fn key(key: &str) -> Vec<u8> {
        format!("{}/{}", Self::PREFIX, key).into_bytes()
    }
}

impl Record for User {
    const PREFIX: &'static str = "user";
    const KIND: &'static str = "user";
    fn storage_key(&self) -> String {
        self.id.clone()
    }
}

impl Record for Material {
    const PREFIX: &'static str = "material";
    const KIND: &'static str = "material";
    fn storage_key(&self) -> String {
        self.id.clone()
    }
}

impl Record for GateEntry {
    const PREFIX: &'static str = "entry";
    const KIND: &'static str = "gate entry";
    fn storage_key(&self) -> String {
        self.id.clone()
    }
}

impl Record for InwardProcess {
    const PREFIX: &'static str = "inward";
    const KIND: &'static str = "inward process";
    fn storage_key(&self) -> String {
        self.gate_entry_id.clone()
    }
}

impl Record for InventoryLog {
    const PREFIX: &'static str = "log";
    const KIND: &'static str = "inventory log";
    fn storage_key(&self) -> String {
        format!("{}/{}", self.material_id, self.id)
    }
}

impl Record for MaterialIssue {
    const PREFIX: &'static str = "issue";
    const KIND: &'static str = "material issue";
    fn storage_key(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    Username,
    MaterialCode,
    GatePass,
    IssueNote,
    Setting,
}

impl Index {
    fn key(&self, value: &str) -> Vec<u8> {
        let prefix = match self {
            Index::Username => "username",
            Index::MaterialCode => "material_code",
            Index::GatePass => "gate_pass",
            Index::IssueNote => "issue_note",
            Index::Setting => "setting",
        };
        format!("{prefix}/{value}").into_bytes()
    }
}

fn encode<R: Record>(record: &R) -> Result<Vec<u8>, WorkflowError> {
    minicbor::to_vec(record).map_err(|e| WorkflowError::Codec(e.to_string()))
}

#[derive(Clone)]
pub struct LedgerStore {
    instance: Arc<sled::Db>,
}

impl LedgerStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    pub fn open(config: &DatabaseConfig) -> Result<Self, WorkflowError> {
        let db = sled::Config::new()
            .path(&config.path)
            .cache_capacity(config.cache_capacity)
            .open()?;
        log::debug!("opened ledger store at {}", config.path.display());
        Ok(Self::new(Arc::new(db)))
    }

    pub fn get<R: Record>(&self, key: &str) -> Result<Option<R>, WorkflowError> {
        match self.instance.get(R::key(key))? {
            Some(bytes) => Ok(Some(minicbor::decode(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    pub fn require<R: Record>(&self, key: &str) -> Result<R, WorkflowError> {
        self.get(key)?
            .ok_or_else(|| WorkflowError::not_found(R::KIND, key))
    }

    /// Every record of a kind, in key order.
    pub fn scan<R: Record>(&self) -> Result<Vec<R>, WorkflowError> {
        self.scan_prefix(format!("{}/", R::PREFIX))
    }

    /// Records whose storage key starts with `parent/`.
    pub fn scan_under<R: Record>(&self, parent: &str) -> Result<Vec<R>, WorkflowError> {
        self.scan_prefix(format!("{}/{}/", R::PREFIX, parent))
    }

    fn scan_prefix<R: Record>(&self, prefix: String) -> Result<Vec<R>, WorkflowError> {
        let mut records = Vec::new();
        for kv in self.instance.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = kv?;
            records.push(minicbor::decode(bytes.as_ref())?);
        }
        Ok(records)
    }

    pub fn lookup(&self, index: Index, value: &str) -> Result<Option<String>, WorkflowError> {
        match self.instance.get(index.key(value))? {
            Some(bytes) => Ok(Some(
                String::from_utf8(bytes.to_vec()).map_err(|e| WorkflowError::Codec(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Runs `f` as one serializable transaction. sled re-runs the closure on
    /// conflict, so it must only touch the store through `tx`.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, WorkflowError>
    where
        F: Fn(&TransactionalTree) -> TxResult<T>,
    {
        Ok(self.instance.transaction(f)?)
    }

    pub fn flush(&self) -> Result<(), WorkflowError> {
        self.instance.flush()?;
        Ok(())
    }
}

pub fn abort<T>(err: impl Into<WorkflowError>) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err.into()))
}

pub fn fetch<R: Record>(tx: &TransactionalTree, key: &str) -> TxResult<Option<R>> {
    match tx.get(R::key(key))? {
        Some(bytes) => match minicbor::decode(bytes.as_ref()) {
            Ok(record) => Ok(Some(record)),
            Err(e) => abort(e),
        },
        None => Ok(None),
    }
}

pub fn require<R: Record>(tx: &TransactionalTree, key: &str) -> TxResult<R> {
    match fetch(tx, key)? {
        Some(record) => Ok(record),
        None => abort(WorkflowError::not_found(R::KIND, key)),
    }
}

pub fn put<R: Record>(tx: &TransactionalTree, record: &R) -> TxResult<()> {
    let bytes = encode(record).map_err(ConflictableTransactionError::Abort)?;
    tx.insert(R::key(&record.storage_key()), bytes)?;
    Ok(())
}

pub fn index_get(tx: &TransactionalTree, index: Index, value: &str) -> TxResult<Option<String>> {
    match tx.get(index.key(value))? {
        Some(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(target) => Ok(Some(target)),
            Err(e) => abort(WorkflowError::Codec(e.to_string())),
        },
        None => Ok(None),
    }
}

pub fn index_put(tx: &TransactionalTree, index: Index, value: &str, target: &str) -> TxResult<()> {
    tx.insert(index.key(value), target.as_bytes().to_vec())?;
    Ok(())
}

/// Draws tokens from `next` until one is unused in `index`.
pub fn unique_token(
    tx: &TransactionalTree,
    index: Index,
    next: fn() -> String,
) -> TxResult<String> {
    const ATTEMPTS: usize = 8;

    for _ in 0..ATTEMPTS {
        let token = next();
        if index_get(tx, index, &token)?.is_none() {
            return Ok(token);
        }
        log::debug!("token {token} already issued, drawing another");
    }
    abort(WorkflowError::Identifier(format!(
        "no free {index:?} token after {ATTEMPTS} attempts"
    )))
}
