//! 模块共用的基础设施：事务感知的表访问与命令侧依赖
//!
//! `TableStore` 先查上下文里的事务：读走 `read_capability_from_context`，写走读写事务的缓冲；
//! 上下文没有事务时才退回一次性读写。
//!
use monolith_application::context::AppContext;
use monolith_application::error::AppError;
use monolith_application::eventing::{
    DispatcherConfig, EventBus, HandlerRegistry, TransactionalEventDispatcher,
};
use monolith_application::transaction::{
    Filter, InMemoryDatabase, Mutation, ReadCapability, Row, Statement, TransactionScope,
    WriteCapability, read_capability_from_context, read_write_tx_from_context,
};
use monolith_domain::domain_event::SharedEvent;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

/// 列表查询的页大小：0 取默认值，上限 100
pub fn page_size(requested: usize) -> usize {
    match requested {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    }
}

/// 单表访问
#[derive(Clone)]
pub struct TableStore {
    db: Arc<InMemoryDatabase>,
    table: &'static str,
}

impl TableStore {
    pub fn new(db: Arc<InMemoryDatabase>, table: &'static str) -> Self {
        Self { db, table }
    }

    pub async fn get(&self, ctx: &AppContext, key: &str) -> Result<Option<Row>, AppError> {
        if let Some(reader) = read_capability_from_context(ctx) {
            return reader.read_row(self.table, key).await;
        }
        let snapshot = self.db.snapshot();
        let row = snapshot.read_row(self.table, key).await;
        snapshot.close();
        row
    }

    /// 按顶层字段等值过滤，结果按主键升序
    pub async fn find_where(
        &self,
        ctx: &AppContext,
        filters: Vec<Filter>,
        limit: Option<usize>,
    ) -> Result<Vec<Row>, AppError> {
        let statement = Statement::builder()
            .table(self.table)
            .filters(filters)
            .maybe_limit(limit)
            .build();

        if let Some(reader) = read_capability_from_context(ctx) {
            return reader.query(&statement).await;
        }
        let snapshot = self.db.snapshot();
        let rows = snapshot.query(&statement).await;
        snapshot.close();
        rows
    }

    pub fn put<T: Serialize>(&self, ctx: &AppContext, key: &str, value: &T) -> Result<(), AppError> {
        let mutation = Mutation::insert_or_update(self.table, key, value)?;
        self.write(ctx, mutation)
    }

    fn write(&self, ctx: &AppContext, mutation: Mutation) -> Result<(), AppError> {
        match read_write_tx_from_context(ctx) {
            Some(tx) => tx.buffer_write(vec![mutation]),
            None if ctx.has_transaction() => Err(AppError::Validation(format!(
                "cannot write table {} inside a read-only transaction",
                self.table
            ))),
            None => self.db.apply(vec![mutation]),
        }
    }
}

/// 命令处理器共用的事务与事件依赖
#[derive(Clone)]
pub struct TxServices {
    pub scope: Arc<dyn TransactionScope>,
    pub registry: Arc<dyn HandlerRegistry>,
    pub dispatcher: DispatcherConfig,
    pub after_commit: Arc<dyn EventBus>,
}

impl TxServices {
    /// 每次事务尝试新建一个分发器
    pub fn new_dispatcher(&self) -> Arc<TransactionalEventDispatcher> {
        TransactionalEventDispatcher::new(self.registry.clone(), self.dispatcher)
    }

    /// 事务提交之后转发事件，失败只记录日志
    pub async fn announce(&self, events: Vec<SharedEvent>) {
        if events.is_empty() {
            return;
        }
        if let Err(err) = self.after_commit.publish_all(events).await {
            warn!(error = %err, "after-commit publish failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monolith_application::transaction::{
        ReadOnlyTransactionScope, ReadWriteTransactionScope, execute,
    };
    use serde_json::json;

    #[test]
    fn page_size_defaults_and_caps() {
        assert_eq!(page_size(0), 20);
        assert_eq!(page_size(7), 7);
        assert_eq!(page_size(500), 100);
    }

    #[tokio::test]
    async fn writes_follow_the_context_transaction() {
        let db = Arc::new(InMemoryDatabase::new());
        let table = TableStore::new(db.clone(), "things");

        // 无事务：立即写入
        table.put(&AppContext::default(), "a", &json!({"n": 1})).unwrap();
        assert!(table.get(&AppContext::default(), "a").await.unwrap().is_some());

        // 读写事务失败回滚：缓冲写不可见
        let rw = ReadWriteTransactionScope::new(db.clone());
        let err = execute(&rw, &AppContext::default(), |tx_ctx| {
            let table = table.clone();
            async move {
                table.put(&tx_ctx, "b", &json!({"n": 2}))?;
                assert!(table.get(&tx_ctx, "b").await?.is_some());
                Err::<(), _>(AppError::Validation("abort".into()))
            }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(table.get(&AppContext::default(), "b").await.unwrap().is_none());

        // 只读事务内拒绝写
        let ro = ReadOnlyTransactionScope::new(db);
        let err = execute(&ro, &AppContext::default(), |tx_ctx| {
            let table = table.clone();
            async move { table.put(&tx_ctx, "c", &json!({"n": 3})) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
