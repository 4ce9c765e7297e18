use crate::eventing::EventPublisher;
use crate::transaction::ActiveTransaction;
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 业务上下文信息
#[derive(Builder, Default, Debug, Clone, Serialize, Deserialize)]
pub struct BusinessContext {
    /// 关联ID
    correlation_id: Option<String>,
    /// 因果ID
    causation_id: Option<String>,
    /// 触发操作的主体类型（如用户、系统等）
    actor_type: Option<String>,
    /// 触发操作的主体ID
    actor_id: Option<String>,
}

impl BusinessContext {
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn causation_id(&self) -> Option<&str> {
        self.causation_id.as_deref()
    }

    pub fn actor_type(&self) -> Option<&str> {
        self.actor_type.as_deref()
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }
}

/// 应用层上下文（Application Context）
///
/// 承载一次应用层调用（命令/查询/事件处理）所需的横切信息：
/// - 业务语境（`BusinessContext`）：关联追踪、因果链、执行者；
/// - 取消令牌：事务作用域与分发器在每一步之前检查；
/// - 当前事务句柄：由事务作用域注入，仓储据此参与同一事务（见 [`crate::transaction`]）；
/// - 事件发布器：分发器在调用处理器前注入，处理器据此追加后续事件。
///
/// 克隆开销很小（内部均为 `Arc`/`Option`），注入事务或发布器总是返回新的上下文，
/// 原上下文保持不变。
///
/// ```rust
/// use monolith_application::context::{AppContext, BusinessContext};
///
/// let ctx = AppContext::new(
///     BusinessContext::builder()
///         .correlation_id("cor-123".to_string())
///         .actor_type("user".to_string())
///         .actor_id("u-1".to_string())
///         .build(),
/// );
/// assert_eq!(ctx.biz.correlation_id(), Some("cor-123"));
/// assert!(!ctx.has_transaction());
/// ```
#[derive(Clone, Default)]
pub struct AppContext {
    /// 业务语境（链路追踪、审计主体、操作因果）
    pub biz: BusinessContext,
    /// 幂等键（可选）
    pub idempotency_key: Option<String>,
    cancel: CancellationToken,
    pub(crate) tx: Option<ActiveTransaction>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl AppContext {
    pub fn new(biz: BusinessContext) -> Self {
        Self {
            biz,
            ..Default::default()
        }
    }

    /// 替换取消令牌，便于与外部请求的生命周期绑定
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 当前上下文是否已持有事务（读写或只读）
    pub fn has_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// 返回携带事件发布器的子上下文
    pub fn with_publisher(&self, publisher: Arc<dyn EventPublisher>) -> Self {
        let mut child = self.clone();
        child.publisher = Some(publisher);
        child
    }

    /// 处理器在分发过程中可用的发布器；事务外为 `None`
    pub fn publisher(&self) -> Option<&Arc<dyn EventPublisher>> {
        self.publisher.as_ref()
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("biz", &self.biz)
            .field("idempotency_key", &self.idempotency_key)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("tx", &self.tx.as_ref().map(ActiveTransaction::kind))
            .field("publisher", &self.publisher.is_some())
            .finish()
    }
}
