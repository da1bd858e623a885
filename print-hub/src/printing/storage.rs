//! redb-based storage for failed jobs, print history, printer configs and
//! the printed-label set

use crate::models::{HistoryEntry, PrintJob, PrinterConfig, PrinterRole};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Terminally failed jobs: key = job id, value = JSON
const FAILED_TASKS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("failed_tasks");

/// Attempt history ring: key = sequence, value = JSON
const HISTORY_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("print_history");

/// Printer config per role: key = role, value = JSON
const PRINTER_CONFIGS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("printer_configs");

/// Printed labels: key = `{order_id}#{label_index}`, value = printed at (millis)
const PRINTED_LABELS_TABLE: TableDefinition<&str, i64> = TableDefinition::new("printed_labels");

#[derive(Debug, Error)]
pub enum PrintStorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type PrintStorageResult<T> = Result<T, PrintStorageError>;

/// Print pipeline storage
#[derive(Clone)]
pub struct PrintStorage {
    db: Arc<Database>,
}

impl PrintStorage {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> PrintStorageResult<Self> {
        Self::init(Database::create(path)?)
    }

    /// Open in-memory database (tests, ephemeral runs)
    pub fn open_in_memory() -> PrintStorageResult<Self> {
        Self::init(
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?,
        )
    }

    fn init(db: Database) -> PrintStorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(FAILED_TASKS_TABLE)?;
            let _ = write_txn.open_table(HISTORY_TABLE)?;
            let _ = write_txn.open_table(PRINTER_CONFIGS_TABLE)?;
            let _ = write_txn.open_table(PRINTED_LABELS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    // ========== Failed Tasks ==========

    pub fn save_failed(&self, job: &PrintJob) -> PrintStorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(FAILED_TASKS_TABLE)?;
            let value = serde_json::to_vec(job)?;
            table.insert(job.id.as_str(), value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Remove one failed job, returning it if it existed
    pub fn remove_failed(&self, id: &str) -> PrintStorageResult<Option<PrintJob>> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(FAILED_TASKS_TABLE)?;
            let bytes = table.remove(id)?.map(|guard| guard.value().to_vec());
            match bytes {
                Some(b) => Some(serde_json::from_slice::<PrintJob>(&b)?),
                None => None,
            }
        };
        txn.commit()?;
        Ok(removed)
    }

    /// Failed jobs, oldest failure first
    pub fn list_failed(&self) -> PrintStorageResult<Vec<PrintJob>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FAILED_TASKS_TABLE)?;

        let mut jobs = Vec::new();
        for result in table.iter()? {
            let (_, guard) = result?;
            jobs.push(serde_json::from_slice::<PrintJob>(guard.value())?);
        }
        jobs.sort_by_key(|j| (j.completed_at.unwrap_or(j.created_at), j.created_at));
        Ok(jobs)
    }

    /// Drain every failed job, oldest failure first
    ///
    /// Read and removal share one write transaction, so a job failing
    /// concurrently is either returned here or stays in the store.
    pub fn take_all_failed(&self) -> PrintStorageResult<Vec<PrintJob>> {
        let txn = self.db.begin_write()?;
        let mut jobs = {
            let mut table = txn.open_table(FAILED_TASKS_TABLE)?;
            let mut taken = Vec::new();
            for result in table.iter()? {
                let (key, guard) = result?;
                taken.push((key.value().to_string(), guard.value().to_vec()));
            }

            let mut jobs = Vec::with_capacity(taken.len());
            for (id, bytes) in taken {
                table.remove(id.as_str())?;
                jobs.push(serde_json::from_slice::<PrintJob>(&bytes)?);
            }
            jobs
        };
        txn.commit()?;

        jobs.sort_by_key(|j| (j.completed_at.unwrap_or(j.created_at), j.created_at));
        Ok(jobs)
    }

    pub fn failed_count(&self) -> PrintStorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FAILED_TASKS_TABLE)?;
        Ok(table.len()?)
    }

    /// Drop every failed job, returning how many were removed
    pub fn clear_all_failed(&self) -> PrintStorageResult<usize> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(FAILED_TASKS_TABLE)?;
            let mut ids = Vec::new();
            for result in table.iter()? {
                let (key, _) = result?;
                ids.push(key.value().to_string());
            }
            for id in &ids {
                table.remove(id.as_str())?;
            }
            ids.len()
        };
        txn.commit()?;
        Ok(removed)
    }

    // ========== History ==========

    /// Append an entry, dropping the oldest ones beyond `limit`
    pub fn append_history(&self, entry: &HistoryEntry, limit: usize) -> PrintStorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(HISTORY_TABLE)?;
            let next = match table.last()? {
                Some((key, _)) => key.value() + 1,
                None => 0,
            };
            let value = serde_json::to_vec(entry)?;
            table.insert(next, value.as_slice())?;

            while table.len()? > limit as u64 {
                if table.pop_first()?.is_none() {
                    break;
                }
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Most recent entries first
    pub fn list_history(&self, limit: usize) -> PrintStorageResult<Vec<HistoryEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HISTORY_TABLE)?;

        let mut entries = Vec::new();
        for result in table.iter()?.rev().take(limit) {
            let (_, guard) = result?;
            entries.push(serde_json::from_slice::<HistoryEntry>(guard.value())?);
        }
        Ok(entries)
    }

    // ========== Printer Configs ==========

    pub fn get_printer_config(
        &self,
        role: PrinterRole,
    ) -> PrintStorageResult<Option<PrinterConfig>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRINTER_CONFIGS_TABLE)?;

        match table.get(role.as_str())? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn put_printer_config(
        &self,
        role: PrinterRole,
        config: &PrinterConfig,
    ) -> PrintStorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(PRINTER_CONFIGS_TABLE)?;
            let value = serde_json::to_vec(config)?;
            table.insert(role.as_str(), value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn put_raw_printer_config(&self, role: PrinterRole, raw: &[u8]) {
        let txn = self.db.begin_write().unwrap();
        {
            let mut table = txn.open_table(PRINTER_CONFIGS_TABLE).unwrap();
            table.insert(role.as_str(), raw).unwrap();
        }
        txn.commit().unwrap();
    }

    // ========== Printed Labels ==========

    pub fn mark_label_printed(&self, key: &str, at: i64) -> PrintStorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(PRINTED_LABELS_TABLE)?;
            table.insert(key, at)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn is_label_printed(&self, key: &str) -> PrintStorageResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PRINTED_LABELS_TABLE)?;
        Ok(table.get(key)?.is_some())
    }

    /// Forget labels printed before `cutoff` (epoch millis)
    pub fn cleanup_printed_labels(&self, cutoff: i64) -> PrintStorageResult<usize> {
        let txn = self.db.begin_write()?;
        let deleted = {
            let mut table = txn.open_table(PRINTED_LABELS_TABLE)?;
            let mut to_delete = Vec::new();
            for result in table.iter()? {
                let (key, at) = result?;
                if at.value() < cutoff {
                    to_delete.push(key.value().to_string());
                }
            }
            for key in &to_delete {
                table.remove(key.as_str())?;
            }
            to_delete.len()
        };
        txn.commit()?;
        Ok(deleted)
    }

    /// Get storage statistics
    pub fn get_stats(&self) -> PrintStorageResult<PrintStorageStats> {
        let read_txn = self.db.begin_read()?;
        let failed = read_txn.open_table(FAILED_TASKS_TABLE)?;
        let history = read_txn.open_table(HISTORY_TABLE)?;
        let labels = read_txn.open_table(PRINTED_LABELS_TABLE)?;

        Ok(PrintStorageStats {
            failed_task_count: failed.len()?,
            history_count: history.len()?,
            printed_label_count: labels.len()?,
        })
    }
}

impl std::fmt::Debug for PrintStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintStorage").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintStorageStats {
    pub failed_task_count: u64,
    pub history_count: u64,
    pub printed_label_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobStatus, Order};
    use serde_json::Map;

    fn failed_job(order_id: &str, failed_at: i64) -> PrintJob {
        let mut job = PrintJob::new(
            PrinterRole::Bill,
            Arc::new(Order::new(order_id, vec![])),
            PrinterConfig::network("10.0.0.5"),
        );
        job.status = JobStatus::Failed;
        job.retry_count = 3;
        job.completed_at = Some(failed_at);
        job
    }

    fn entry(n: u32) -> HistoryEntry {
        HistoryEntry {
            task_id: format!("t{}", n),
            role: PrinterRole::Label,
            order_id: "o".into(),
            success: true,
            error: None,
            attempt: n,
            at: n as i64,
            metadata: Map::new(),
        }
    }

    #[test]
    fn test_failed_tasks_crud() {
        let storage = PrintStorage::open_in_memory().unwrap();
        let a = failed_job("a", 20);
        let b = failed_job("b", 10);
        storage.save_failed(&a).unwrap();
        storage.save_failed(&b).unwrap();

        let listed = storage.list_failed().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].order.id, "b");

        let removed = storage.remove_failed(&a.id).unwrap().unwrap();
        assert_eq!(removed.retry_count, 3);
        assert!(storage.remove_failed(&a.id).unwrap().is_none());
        assert_eq!(storage.failed_count().unwrap(), 1);

        assert_eq!(storage.clear_all_failed().unwrap(), 1);
        assert!(storage.list_failed().unwrap().is_empty());
    }

    #[test]
    fn test_take_all_failed_keeps_concurrent_failures() {
        let storage = PrintStorage::open_in_memory().unwrap();
        let writer = {
            let storage = storage.clone();
            std::thread::spawn(move || {
                for n in 0..200 {
                    storage
                        .save_failed(&failed_job(&format!("w{}", n), n))
                        .unwrap();
                }
            })
        };

        let mut taken = 0;
        while !writer.is_finished() {
            taken += storage.take_all_failed().unwrap().len();
        }
        writer.join().unwrap();
        taken += storage.take_all_failed().unwrap().len();

        assert_eq!(taken, 200);
        assert_eq!(storage.failed_count().unwrap(), 0);
    }

    #[test]
    fn test_take_all_failed_is_oldest_first() {
        let storage = PrintStorage::open_in_memory().unwrap();
        storage.save_failed(&failed_job("late", 30)).unwrap();
        storage.save_failed(&failed_job("early", 10)).unwrap();

        let taken = storage.take_all_failed().unwrap();
        let ids: Vec<_> = taken.iter().map(|j| j.order.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert!(storage.take_all_failed().unwrap().is_empty());
    }

    #[test]
    fn test_history_is_capped() {
        let storage = PrintStorage::open_in_memory().unwrap();
        for n in 0..12 {
            storage.append_history(&entry(n), 5).unwrap();
        }
        let history = storage.list_history(100).unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].task_id, "t11");
        assert_eq!(history[4].task_id, "t7");
        assert_eq!(storage.list_history(2).unwrap().len(), 2);
    }

    #[test]
    fn test_printer_config_roundtrip() {
        let storage = PrintStorage::open_in_memory().unwrap();
        assert!(storage.get_printer_config(PrinterRole::Label).unwrap().is_none());
        let cfg = PrinterConfig::network("192.168.1.50");
        storage.put_printer_config(PrinterRole::Label, &cfg).unwrap();
        let back = storage.get_printer_config(PrinterRole::Label).unwrap().unwrap();
        assert_eq!(back.host, "192.168.1.50");
        assert!(storage.get_printer_config(PrinterRole::Bill).unwrap().is_none());
    }

    #[test]
    fn test_printed_labels() {
        let storage = PrintStorage::open_in_memory().unwrap();
        storage.mark_label_printed("o1#0", 100).unwrap();
        storage.mark_label_printed("o1#1", 300).unwrap();
        assert!(storage.is_label_printed("o1#0").unwrap());
        assert!(!storage.is_label_printed("o1#2").unwrap());

        assert_eq!(storage.cleanup_printed_labels(200).unwrap(), 1);
        assert!(!storage.is_label_printed("o1#0").unwrap());
        assert_eq!(storage.get_stats().unwrap().printed_label_count, 1);
    }
}
