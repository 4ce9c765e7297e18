//! 读侧：查询、结果 DTO 与进程内查询总线
use crate::routing::{self, Message, RouteTable};
use crate::{context::AppContext, error::AppError};
use async_trait::async_trait;
use serde::Serialize;
use std::any::type_name;
use std::sync::Arc;
use tracing::debug;

/// 查询结果的载体，不直接暴露聚合（及其待发布事件）
pub trait Dto: Serialize + Send + Sync + 'static {}

impl<T: Dto> Dto for Vec<T> {}

impl<T: Dto> Dto for Option<T> {}

/// 只读意图，一般在只读事务作用域中执行
pub trait Query: Send + Sync + 'static {
    const NAME: &'static str;

    type Dto: Dto;
}

#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    async fn handle(&self, ctx: &AppContext, q: Q) -> Result<Q::Dto, AppError>;
}

#[async_trait]
pub trait QueryBus: Send + Sync {
    async fn dispatch<Q: Query>(&self, ctx: &AppContext, q: Q) -> Result<Q::Dto, AppError>;
}

/// 结果类型由 `Query::Dto` 决定，调度端负责还原
#[derive(Default)]
pub struct InMemoryQueryBus {
    table: RouteTable<Message>,
}

impl InMemoryQueryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<Q, H>(&self, handler: Arc<H>) -> Result<(), AppError>
    where
        Q: Query,
        H: QueryHandler<Q> + 'static,
    {
        let f = routing::route(move |msg, ctx| {
            let handler = handler.clone();
            Box::pin(async move {
                let q = routing::unpack::<Q>(msg, Q::NAME)?;
                let dto = handler.handle(ctx, q).await?;
                Ok(Box::new(dto) as Message)
            })
        });
        self.table.bind::<Q>(Q::NAME, f)?;
        debug!(query = Q::NAME, "query handler registered");
        Ok(())
    }

    pub fn registered_queries(&self) -> Vec<&'static str> {
        self.table.names()
    }
}

#[async_trait]
impl QueryBus for InMemoryQueryBus {
    async fn dispatch<Q: Query>(&self, ctx: &AppContext, q: Q) -> Result<Q::Dto, AppError> {
        let f = self.table.lookup::<Q>(Q::NAME)?;
        debug!(
            query = Q::NAME,
            correlation_id = ctx.biz.correlation_id(),
            "dispatching query"
        );
        let out = f(Box::new(q), ctx).await?;
        routing::unpack::<Q::Dto>(out, type_name::<Q::Dto>())
    }
}
