//! 内存事务存储（InMemoryDatabase）
//!
//! 乐观并发控制的最小实现：
//! - 已提交状态写时复制，事务开启时持有一份快照；
//! - 读写事务读取快照并叠加本事务已缓冲的写入（read-your-writes），同时记录读集；
//! - 提交时校验读集（行版本、被扫描表的版本），有变化则以 `TransactionAborted` 中止；
//! - 只读事务即快照，显式关闭后不可再读。
//!
//! 典型用途：测试、示例与本地开发；作为 `TransactionManager` 交给事务作用域使用。
//!
use super::{
    KeyRange, Mutation, ReadCapability, ReadOnlyTransaction, ReadWriteTransaction, Row, Statement,
    TransactionManager, WriteCapability,
};
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredRow {
    version: u64,
    value: Value,
}

#[derive(Debug, Clone, Default)]
struct TableState {
    version: u64,
    rows: BTreeMap<String, StoredRow>,
}

#[derive(Debug, Clone, Default)]
struct DatabaseState {
    tables: HashMap<String, Arc<TableState>>,
}

impl DatabaseState {
    fn row(&self, table: &str, key: &str) -> Option<&StoredRow> {
        self.tables.get(table)?.rows.get(key)
    }

    fn row_version(&self, table: &str, key: &str) -> u64 {
        self.row(table, key).map(|r| r.version).unwrap_or(0)
    }

    fn table_version(&self, table: &str) -> u64 {
        self.tables.get(table).map(|t| t.version).unwrap_or(0)
    }

    fn scan<'a>(
        &'a self,
        table: &'a str,
        range: &'a KeyRange,
    ) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
        self.tables
            .get(table)
            .into_iter()
            .flat_map(|t| t.rows.iter())
            .filter(move |(k, _)| range.contains(k))
            .map(|(k, r)| (k, &r.value))
    }

    fn apply(&mut self, version: u64, mutations: &[Mutation]) {
        let mut touched: Vec<&str> = Vec::new();
        for m in mutations {
            let table = Arc::make_mut(self.tables.entry(m.table().to_string()).or_default());
            match m {
                Mutation::InsertOrUpdate { key, value, .. } => {
                    table.rows.insert(
                        key.clone(),
                        StoredRow {
                            version,
                            value: value.clone(),
                        },
                    );
                }
                Mutation::Delete { key, .. } => {
                    table.rows.remove(key);
                }
            }
            if !touched.contains(&m.table()) {
                table.version = version;
                touched.push(m.table());
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 内存数据库
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    state: RwLock<Arc<DatabaseState>>,
    commit_seq: AtomicU64,
    tx_seq: AtomicU64,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Arc<DatabaseState> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 开启读写事务（基于当前已提交状态的快照）
    pub fn begin_transaction(&self) -> Arc<InMemoryTransaction> {
        let id = self.tx_seq.fetch_add(1, Ordering::Relaxed) + 1;
        Arc::new(InMemoryTransaction {
            id,
            snapshot: self.current(),
            inner: Mutex::new(TxInner::default()),
        })
    }

    /// 开启只读快照
    pub fn snapshot(&self) -> Arc<InMemorySnapshot> {
        Arc::new(InMemorySnapshot {
            state: self.current(),
            closed: AtomicBool::new(false),
        })
    }

    /// 一次性写入：无读集、不参与任何事务，立即生效
    pub fn apply(&self, mutations: Vec<Mutation>) -> Result<(), AppError> {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let version = self.commit_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let mut next = (**guard).clone();
        next.apply(version, &mutations);
        *guard = Arc::new(next);
        Ok(())
    }

    /// 校验读集并提交
    pub fn commit(&self, tx: &InMemoryTransaction) -> Result<(), AppError> {
        let mut inner_guard = lock(&tx.inner);
        let inner: &mut TxInner = &mut inner_guard;
        inner.ensure_active(tx.id)?;

        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let current: &DatabaseState = &guard;

        for ((table, key), seen) in &inner.read_rows {
            if current.row_version(table, key) != *seen {
                inner.status = TxStatus::Aborted;
                return Err(AppError::TransactionAborted {
                    reason: format!("row {table}/{key} changed since it was read"),
                });
            }
        }
        for (table, seen) in &inner.read_tables {
            if current.table_version(table) != *seen {
                inner.status = TxStatus::Aborted;
                return Err(AppError::TransactionAborted {
                    reason: format!("table {table} changed since it was scanned"),
                });
            }
        }

        if !inner.writes.is_empty() {
            let version = self.commit_seq.fetch_add(1, Ordering::SeqCst) + 1;
            let mut next = current.clone();
            next.apply(version, &inner.writes);
            *guard = Arc::new(next);
        }

        inner.status = TxStatus::Committed;
        debug!(tx_id = tx.id, writes = inner.writes.len(), "in-memory transaction committed");
        Ok(())
    }

    /// 丢弃缓冲写入
    pub fn rollback(&self, tx: &InMemoryTransaction) {
        let mut inner = lock(&tx.inner);
        if inner.status == TxStatus::Active {
            inner.status = TxStatus::RolledBack;
            inner.writes.clear();
            inner.overlay.clear();
        }
    }
}

#[async_trait]
impl TransactionManager for InMemoryDatabase {
    type Tx = InMemoryTransaction;
    type Snapshot = InMemorySnapshot;

    async fn begin(&self) -> Result<Arc<Self::Tx>, AppError> {
        Ok(self.begin_transaction())
    }

    async fn commit(&self, tx: &Self::Tx) -> Result<(), AppError> {
        InMemoryDatabase::commit(self, tx)
    }

    async fn rollback(&self, tx: &Self::Tx) {
        InMemoryDatabase::rollback(self, tx)
    }

    async fn begin_read_only(&self) -> Result<Arc<Self::Snapshot>, AppError> {
        Ok(self.snapshot())
    }

    async fn close(&self, snapshot: &Self::Snapshot) {
        snapshot.close();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum TxStatus {
    #[default]
    Active,
    Committed,
    RolledBack,
    Aborted,
}

#[derive(Debug, Default)]
struct TxInner {
    status: TxStatus,
    writes: Vec<Mutation>,
    // 每个键最后一次写入；None 表示删除
    overlay: HashMap<(String, String), Option<Value>>,
    read_rows: HashMap<(String, String), u64>,
    read_tables: HashMap<String, u64>,
}

impl TxInner {
    fn ensure_active(&self, id: u64) -> Result<(), AppError> {
        match self.status {
            TxStatus::Active => Ok(()),
            other => Err(AppError::Storage(format!(
                "transaction {id} is no longer active ({other:?})"
            ))),
        }
    }
}

/// 内存读写事务
#[derive(Debug)]
pub struct InMemoryTransaction {
    id: u64,
    snapshot: Arc<DatabaseState>,
    inner: Mutex<TxInner>,
}

impl InMemoryTransaction {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 已缓冲但尚未提交的写入数量
    pub fn buffered_writes(&self) -> usize {
        lock(&self.inner).writes.len()
    }

    fn scan_with_overlay(&self, table: &str, range: &KeyRange) -> Result<Vec<Row>, AppError> {
        let mut inner = lock(&self.inner);
        inner.ensure_active(self.id)?;
        inner
            .read_tables
            .insert(table.to_string(), self.snapshot.table_version(table));

        let mut merged: BTreeMap<String, Value> = self
            .snapshot
            .scan(table, range)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for ((t, key), value) in &inner.overlay {
            if t != table || !range.contains(key) {
                continue;
            }
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged
            .into_iter()
            .map(|(key, value)| Row { key, value })
            .collect())
    }
}

#[async_trait]
impl ReadCapability for InMemoryTransaction {
    async fn read_row(&self, table: &str, key: &str) -> Result<Option<Row>, AppError> {
        let mut inner = lock(&self.inner);
        inner.ensure_active(self.id)?;

        let overlay_key = (table.to_string(), key.to_string());
        if let Some(value) = inner.overlay.get(&overlay_key) {
            return Ok(value.clone().map(|value| Row {
                key: key.to_string(),
                value,
            }));
        }

        inner
            .read_rows
            .insert(overlay_key, self.snapshot.row_version(table, key));
        Ok(self.snapshot.row(table, key).map(|r| Row {
            key: key.to_string(),
            value: r.value.clone(),
        }))
    }

    async fn read_range(&self, table: &str, range: &KeyRange) -> Result<Vec<Row>, AppError> {
        self.scan_with_overlay(table, range)
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Row>, AppError> {
        let rows = self.scan_with_overlay(&statement.table, &KeyRange::All)?;
        Ok(filter_rows(rows, statement))
    }
}

impl WriteCapability for InMemoryTransaction {
    fn buffer_write(&self, mutations: Vec<Mutation>) -> Result<(), AppError> {
        let mut inner = lock(&self.inner);
        inner.ensure_active(self.id)?;
        for m in mutations {
            let key = (m.table().to_string(), m.key().to_string());
            let value = match &m {
                Mutation::InsertOrUpdate { value, .. } => Some(value.clone()),
                Mutation::Delete { .. } => None,
            };
            inner.overlay.insert(key, value);
            inner.writes.push(m);
        }
        Ok(())
    }
}

impl ReadWriteTransaction for InMemoryTransaction {
    fn as_read(&self) -> &dyn ReadCapability {
        self
    }

    fn as_write(&self) -> &dyn WriteCapability {
        self
    }
}

/// 内存只读快照
#[derive(Debug)]
pub struct InMemorySnapshot {
    state: Arc<DatabaseState>,
    closed: AtomicBool,
}

impl InMemorySnapshot {
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), AppError> {
        if self.is_closed() {
            return Err(AppError::Storage("read-only snapshot is closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReadCapability for InMemorySnapshot {
    async fn read_row(&self, table: &str, key: &str) -> Result<Option<Row>, AppError> {
        self.ensure_open()?;
        Ok(self.state.row(table, key).map(|r| Row {
            key: key.to_string(),
            value: r.value.clone(),
        }))
    }

    async fn read_range(&self, table: &str, range: &KeyRange) -> Result<Vec<Row>, AppError> {
        self.ensure_open()?;
        Ok(self
            .state
            .scan(table, range)
            .map(|(k, v)| Row {
                key: k.clone(),
                value: v.clone(),
            })
            .collect())
    }

    async fn query(&self, statement: &Statement) -> Result<Vec<Row>, AppError> {
        let rows = self.read_range(&statement.table, &KeyRange::All).await?;
        Ok(filter_rows(rows, statement))
    }
}

impl ReadOnlyTransaction for InMemorySnapshot {
    fn as_read(&self) -> &dyn ReadCapability {
        self
    }
}

fn filter_rows(rows: Vec<Row>, statement: &Statement) -> Vec<Row> {
    let matched = rows
        .into_iter()
        .filter(|r| statement.filters.iter().all(|f| f.matches(&r.value)));
    match statement.limit {
        Some(n) => matched.take(n).collect(),
        None => matched.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Filter;
    use serde_json::json;

    fn put(table: &str, key: &str, value: Value) -> Mutation {
        Mutation::InsertOrUpdate {
            table: table.into(),
            key: key.into(),
            value,
        }
    }

    #[tokio::test]
    async fn buffered_writes_are_visible_inside_the_transaction_only() {
        let db = InMemoryDatabase::new();
        let tx = db.begin_transaction();
        tx.buffer_write(vec![put("users", "u-1", json!({"name": "a"}))])
            .unwrap();

        let own = tx.read_row("users", "u-1").await.unwrap();
        assert_eq!(own.unwrap().value["name"], "a");

        let outside = db.snapshot().read_row("users", "u-1").await.unwrap();
        assert!(outside.is_none());

        db.commit(&tx).unwrap();
        let after = db.snapshot().read_row("users", "u-1").await.unwrap();
        assert!(after.is_some());
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let db = InMemoryDatabase::new();
        let tx = db.begin_transaction();
        tx.buffer_write(vec![put("users", "u-1", json!({}))]).unwrap();
        db.rollback(&tx);

        assert!(db.snapshot().read_row("users", "u-1").await.unwrap().is_none());
        assert!(matches!(
            tx.read_row("users", "u-1").await,
            Err(AppError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn stale_row_read_aborts_commit() {
        let db = InMemoryDatabase::new();
        db.apply(vec![put("users", "u-1", json!({"v": 1}))]).unwrap();

        let tx = db.begin_transaction();
        let _ = tx.read_row("users", "u-1").await.unwrap();
        tx.buffer_write(vec![put("users", "u-1", json!({"v": 2}))])
            .unwrap();

        db.apply(vec![put("users", "u-1", json!({"v": 99}))]).unwrap();

        let err = db.commit(&tx).unwrap_err();
        assert!(err.is_retryable(), "{err}");
        let row = db.snapshot().read_row("users", "u-1").await.unwrap().unwrap();
        assert_eq!(row.value["v"], 99);
    }

    #[tokio::test]
    async fn phantom_insert_aborts_scanning_transaction() {
        let db = InMemoryDatabase::new();
        let tx = db.begin_transaction();
        let rows = tx
            .query(
                &Statement::builder()
                    .table("orders")
                    .filters(vec![Filter::eq("user_id", "u-1")])
                    .build(),
            )
            .await
            .unwrap();
        assert!(rows.is_empty());

        db.apply(vec![put("orders", "o-1", json!({"user_id": "u-1"}))])
            .unwrap();
        assert!(matches!(
            db.commit(&tx),
            Err(AppError::TransactionAborted { .. })
        ));
    }

    #[tokio::test]
    async fn unrelated_writes_do_not_conflict() {
        let db = InMemoryDatabase::new();
        db.apply(vec![put("users", "u-1", json!({}))]).unwrap();

        let tx = db.begin_transaction();
        let _ = tx.read_row("users", "u-1").await.unwrap();
        db.apply(vec![put("users", "u-2", json!({}))]).unwrap();

        assert!(db.commit(&tx).is_ok());
    }

    #[tokio::test]
    async fn range_and_query_merge_overlay() {
        let db = InMemoryDatabase::new();
        db.apply(vec![
            put("orders", "o-1", json!({"user_id": "u-1"})),
            put("orders", "o-2", json!({"user_id": "u-2"})),
            put("orders", "o-3", json!({"user_id": "u-1"})),
        ])
        .unwrap();

        let tx = db.begin_transaction();
        tx.buffer_write(vec![
            Mutation::delete("orders", "o-3"),
            put("orders", "o-4", json!({"user_id": "u-1"})),
        ])
        .unwrap();

        let keys: Vec<String> = tx
            .query(
                &Statement::builder()
                    .table("orders")
                    .filters(vec![Filter::eq("user_id", "u-1")])
                    .build(),
            )
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, ["o-1", "o-4"]);

        let limited = tx
            .query(&Statement::builder().table("orders").limit(1).build())
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);

        let ranged = tx
            .read_range("orders", &KeyRange::Prefix("o-".into()))
            .await
            .unwrap();
        assert_eq!(ranged.len(), 3);
    }

    #[tokio::test]
    async fn closed_snapshot_refuses_reads() {
        let db = InMemoryDatabase::new();
        let snap = db.snapshot();
        snap.close();
        assert!(snap.read_row("users", "u-1").await.is_err());
    }
}
