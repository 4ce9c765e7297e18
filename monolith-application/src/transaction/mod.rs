//! 事务抽象（transaction）
//!
//! - 读写能力拆分：`ReadCapability`（点读/范围读/查询）与 `WriteCapability`（缓冲写入）；
//! - 上下文传播：`with_read_write_tx`/`with_read_only_tx` 注入，`read_capability_from_context` 统一读取；
//! - 事务作用域：`TransactionScope::execute` 负责开启、注入、提交/回滚与冲突重试；
//! - 存储提供者：`TransactionManager`，内置 `InMemoryDatabase` 实现。
//!
mod capability;
mod context;
mod inmemory;
mod scope;

pub use capability::{
    Filter, KeyRange, Mutation, ReadCapability, ReadOnlyTransaction, ReadWriteTransaction, Row,
    Statement, WriteCapability,
};
pub(crate) use context::ActiveTransaction;
pub use context::{
    read_capability_from_context, read_only_tx_from_context, read_write_tx_from_context,
    with_read_only_tx, with_read_write_tx,
};
pub use inmemory::{InMemoryDatabase, InMemorySnapshot, InMemoryTransaction};
pub use scope::{
    ReadOnlyTransactionScope, ReadWriteTransactionScope, RetryPolicy, TransactionManager,
    TransactionScope, TxFuture, TxWork, execute, execute_with_result,
};
