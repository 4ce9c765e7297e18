//! 事务在上下文中的传播约定
//!
//! 上下文只有一个事务槽位，读写事务与只读事务互斥：任何一种已存在时，
//! 再次注入都会得到 `AppError::NestedTransaction`，原上下文不受影响。
//! 仓储读取时优先使用 `read_capability_from_context`，为 `None` 时才退回一次性读。
//!
use super::{ReadCapability, ReadOnlyTransaction, ReadWriteTransaction};
use crate::context::AppContext;
use crate::error::AppError;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) enum ActiveTransaction {
    ReadWrite(Arc<dyn ReadWriteTransaction>),
    ReadOnly(Arc<dyn ReadOnlyTransaction>),
}

impl ActiveTransaction {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ActiveTransaction::ReadWrite(_) => "read_write",
            ActiveTransaction::ReadOnly(_) => "read_only",
        }
    }
}

fn embed(ctx: &AppContext, tx: ActiveTransaction) -> Result<AppContext, AppError> {
    if ctx.has_transaction() {
        return Err(AppError::NestedTransaction);
    }
    let mut child = ctx.clone();
    child.tx = Some(tx);
    Ok(child)
}

/// 注入读写事务，返回子上下文
pub fn with_read_write_tx(
    ctx: &AppContext,
    tx: Arc<dyn ReadWriteTransaction>,
) -> Result<AppContext, AppError> {
    embed(ctx, ActiveTransaction::ReadWrite(tx))
}

/// 注入只读事务，返回子上下文
pub fn with_read_only_tx(
    ctx: &AppContext,
    tx: Arc<dyn ReadOnlyTransaction>,
) -> Result<AppContext, AppError> {
    embed(ctx, ActiveTransaction::ReadOnly(tx))
}

pub fn read_write_tx_from_context(ctx: &AppContext) -> Option<&Arc<dyn ReadWriteTransaction>> {
    match ctx.tx.as_ref()? {
        ActiveTransaction::ReadWrite(tx) => Some(tx),
        ActiveTransaction::ReadOnly(_) => None,
    }
}

pub fn read_only_tx_from_context(ctx: &AppContext) -> Option<&Arc<dyn ReadOnlyTransaction>> {
    match ctx.tx.as_ref()? {
        ActiveTransaction::ReadOnly(tx) => Some(tx),
        ActiveTransaction::ReadWrite(_) => None,
    }
}

/// 统一的读能力：先取读写事务（可见未提交写入），再取只读事务
pub fn read_capability_from_context(ctx: &AppContext) -> Option<&dyn ReadCapability> {
    if let Some(tx) = read_write_tx_from_context(ctx) {
        return Some(tx.as_read());
    }
    read_only_tx_from_context(ctx).map(|tx| tx.as_read())
}
