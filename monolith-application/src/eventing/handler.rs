//! 事件处理器（EventHandler）
//!
//! 处理器在发起事件的同一事务内执行，只做可回滚的工作（写仓储、发布后续事件）。
//! 外部副作用（邮件、Webhook）应放到提交之后的总线上处理，见 [`super::EventListener`]。
//!
use crate::{context::AppContext, error::AppError};
use async_trait::async_trait;
use monolith_domain::domain_event::{SharedEvent, TypedEvent};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// 事件处理器：处理某一类型的事件
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（用于错误包装与日志）
    fn handler_name(&self) -> &str;

    /// 处理事件；返回错误将中止当前 flush 并导致事务回滚
    async fn handle(&self, ctx: &AppContext, event: &SharedEvent) -> Result<(), AppError>;
}

/// 按具体事件类型编写的处理器，由 [`TypedHandler`] 适配为 [`EventHandler`]
#[async_trait]
pub trait TypedEventHandler<E: TypedEvent>: Send + Sync {
    fn handler_name(&self) -> &str;

    async fn handle(&self, ctx: &AppContext, event: &E) -> Result<(), AppError>;
}

/// 类型适配：载荷不是 `E` 时记录 debug 日志并跳过
pub struct TypedHandler<E, H> {
    inner: Arc<H>,
    _marker: PhantomData<fn() -> E>,
}

impl<E, H> TypedHandler<E, H> {
    pub fn new(inner: Arc<H>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<E, H> EventHandler for TypedHandler<E, H>
where
    E: TypedEvent,
    H: TypedEventHandler<E> + 'static,
{
    fn handler_name(&self) -> &str {
        self.inner.handler_name()
    }

    async fn handle(&self, ctx: &AppContext, event: &SharedEvent) -> Result<(), AppError> {
        let Some(typed) = event.downcast_ref::<E>() else {
            debug!(
                handler = self.inner.handler_name(),
                event_type = %event.event_type(),
                event_id = event.event_id(),
                "unexpected event payload, skipping"
            );
            return Ok(());
        };
        self.inner.handle(ctx, typed).await
    }
}

/// 闭包处理器
pub struct FnEventHandler<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> EventHandler for FnEventHandler<F>
where
    F: Fn(AppContext, SharedEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    fn handler_name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, ctx: &AppContext, event: &SharedEvent) -> Result<(), AppError> {
        (self.f)(ctx.clone(), event.clone()).await
    }
}

/// 以闭包构造处理器
pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn EventHandler>
where
    F: Fn(AppContext, SharedEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    Arc::new(FnEventHandler {
        name: name.into(),
        f,
    })
}
