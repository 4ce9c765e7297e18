//! 事务作用域（TransactionScope）
//!
//! `execute(ctx, work)`：开启事务 → 注入上下文 → 运行 `work` → 成功提交 / 失败回滚。
//! 遇到可重试冲突时整段 `work` 重新执行，每次尝试都拿到全新的上下文，
//! 因此分发器等按尝试划分的状态必须在 `work` 内部创建。`work` 内不得产生外部副作用。
//!
use super::{ReadOnlyTransaction, ReadWriteTransaction, with_read_only_tx, with_read_write_tx};
use crate::context::AppContext;
use crate::error::AppError;
use async_trait::async_trait;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

pub type TxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'a>>;

/// 可重复调用的事务工作单元
pub type TxWork<'f> = dyn Fn(AppContext) -> TxFuture<'f, ()> + Send + Sync + 'f;

/// 事务作用域
#[async_trait]
pub trait TransactionScope: Send + Sync {
    async fn execute(&self, ctx: &AppContext, work: &TxWork<'_>) -> Result<(), AppError>;
}

/// 以闭包形式执行事务
pub async fn execute<'f, S, F, Fut>(scope: &S, ctx: &AppContext, f: F) -> Result<(), AppError>
where
    S: TransactionScope + ?Sized,
    F: Fn(AppContext) -> Fut + Send + Sync + 'f,
    Fut: Future<Output = Result<(), AppError>> + Send + 'f,
{
    let work = move |tx_ctx: AppContext| -> TxFuture<'f, ()> { Box::pin(f(tx_ctx)) };
    scope.execute(ctx, &work).await
}

/// 执行事务并带出结果
///
/// 结果写入外部槽位，以最后一次成功尝试为准；事务本身失败时返回事务错误。
pub async fn execute_with_result<'f, T, S, F, Fut>(
    scope: &S,
    ctx: &AppContext,
    f: F,
) -> Result<T, AppError>
where
    T: Send + 'f,
    S: TransactionScope + ?Sized,
    F: Fn(AppContext) -> Fut + Send + Sync + 'f,
    Fut: Future<Output = Result<T, AppError>> + Send + 'f,
{
    let slot: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));

    let work = {
        let slot = slot.clone();
        move |tx_ctx: AppContext| {
            let slot = slot.clone();
            let fut = f(tx_ctx);
            async move {
                let value = fut.await?;
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
                Ok::<(), AppError>(())
            }
        }
    };

    execute(scope, ctx, work).await?;

    let value = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    value.ok_or_else(|| AppError::Storage("transaction finished without a result".into()))
}

/// 存储提供者：开启/提交/回滚读写事务，开启/关闭只读快照
#[async_trait]
pub trait TransactionManager: Send + Sync + 'static {
    type Tx: ReadWriteTransaction + 'static;
    type Snapshot: ReadOnlyTransaction + 'static;

    async fn begin(&self) -> Result<Arc<Self::Tx>, AppError>;

    /// 提交；读集失效时返回可重试的 `TransactionAborted`
    async fn commit(&self, tx: &Self::Tx) -> Result<(), AppError>;

    async fn rollback(&self, tx: &Self::Tx);

    async fn begin_read_only(&self) -> Result<Arc<Self::Snapshot>, AppError>;

    async fn close(&self, snapshot: &Self::Snapshot);
}

/// 冲突重试策略
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// 最多尝试次数（含首次）
    pub max_attempts: u32,
    /// 首次重试前的等待
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    /// 退避上限
    #[serde(with = "millis")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// 读写事务作用域：提交失败或工作单元返回可重试错误时按策略重试
pub struct ReadWriteTransactionScope<M: TransactionManager> {
    manager: Arc<M>,
    policy: RetryPolicy,
}

impl<M: TransactionManager> ReadWriteTransactionScope<M> {
    pub fn new(manager: Arc<M>) -> Self {
        Self::with_policy(manager, RetryPolicy::default())
    }

    pub fn with_policy(manager: Arc<M>, policy: RetryPolicy) -> Self {
        Self { manager, policy }
    }

    async fn attempt(&self, ctx: &AppContext, work: &TxWork<'_>) -> Result<(), AppError> {
        let tx = self.manager.begin().await?;
        let handle: Arc<dyn ReadWriteTransaction> = tx.clone();
        let tx_ctx = match with_read_write_tx(ctx, handle) {
            Ok(c) => c,
            Err(err) => {
                self.manager.rollback(&tx).await;
                return Err(err);
            }
        };

        match work(tx_ctx).await {
            Ok(()) => self.manager.commit(&tx).await,
            Err(err) => {
                self.manager.rollback(&tx).await;
                Err(err)
            }
        }
    }
}

#[async_trait]
impl<M: TransactionManager> TransactionScope for ReadWriteTransactionScope<M> {
    async fn execute(&self, ctx: &AppContext, work: &TxWork<'_>) -> Result<(), AppError> {
        if ctx.has_transaction() {
            return Err(AppError::NestedTransaction);
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if ctx.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            match self.attempt(ctx, work).await {
                Ok(()) => {
                    debug!(
                        attempt,
                        correlation_id = ctx.biz.correlation_id(),
                        "transaction committed"
                    );
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let wait = self.policy.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        backoff_ms = wait.as_millis() as u64,
                        error = %err,
                        "transaction aborted, retrying"
                    );
                    tokio::select! {
                        _ = ctx.cancellation_token().cancelled() => return Err(AppError::Cancelled),
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                Err(err) => {
                    debug!(attempt, error = %err, "transaction rolled back");
                    return Err(err);
                }
            }
        }
    }
}

/// 只读事务作用域：单次执行，结束时确定性关闭快照
pub struct ReadOnlyTransactionScope<M: TransactionManager> {
    manager: Arc<M>,
}

impl<M: TransactionManager> ReadOnlyTransactionScope<M> {
    pub fn new(manager: Arc<M>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl<M: TransactionManager> TransactionScope for ReadOnlyTransactionScope<M> {
    async fn execute(&self, ctx: &AppContext, work: &TxWork<'_>) -> Result<(), AppError> {
        if ctx.has_transaction() {
            return Err(AppError::NestedTransaction);
        }
        if ctx.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let snapshot = self.manager.begin_read_only().await?;
        let handle: Arc<dyn ReadOnlyTransaction> = snapshot.clone();
        let result = match with_read_only_tx(ctx, handle) {
            Ok(ro_ctx) => work(ro_ctx).await,
            Err(err) => Err(err),
        };
        self.manager.close(&snapshot).await;
        result
    }
}
