//! 写侧：命令、命令处理器与进程内命令总线
//!
//! 命令处理器通常在内部开启一次读写事务作用域，
//! 在同一事务内保存聚合并冲刷其领域事件。
use crate::routing::{self, RouteTable};
use crate::{context::AppContext, error::AppError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// 改变状态的意图，如 `DeleteUser`、`SubmitOrder`
///
/// `NAME` 用于日志与路由错误信息，应保持稳定。
pub trait Command: Send + Sync + 'static {
    const NAME: &'static str;
}

#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    async fn handle(&self, ctx: &AppContext, cmd: C) -> Result<(), AppError>;
}

#[async_trait]
pub trait CommandBus: Send + Sync {
    async fn dispatch<C: Command>(&self, ctx: &AppContext, cmd: C) -> Result<(), AppError>;
}

/// 每种命令恰好一个处理器
#[derive(Default)]
pub struct InMemoryCommandBus {
    table: RouteTable<()>,
}

impl InMemoryCommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 重复注册同一命令返回 `DuplicateHandler`
    pub fn register<C, H>(&self, handler: Arc<H>) -> Result<(), AppError>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        let f = routing::route(move |msg, ctx| {
            let handler = handler.clone();
            Box::pin(async move {
                let cmd = routing::unpack::<C>(msg, C::NAME)?;
                handler.handle(ctx, cmd).await
            })
        });
        self.table.bind::<C>(C::NAME, f)?;
        debug!(command = C::NAME, "command handler registered");
        Ok(())
    }

    pub fn registered_commands(&self) -> Vec<&'static str> {
        self.table.names()
    }
}

#[async_trait]
impl CommandBus for InMemoryCommandBus {
    async fn dispatch<C: Command>(&self, ctx: &AppContext, cmd: C) -> Result<(), AppError> {
        let f = self.table.lookup::<C>(C::NAME)?;
        debug!(
            command = C::NAME,
            correlation_id = ctx.biz.correlation_id(),
            "dispatching command"
        );
        f(Box::new(cmd), ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Bump(usize);

    impl Command for Bump {
        const NAME: &'static str = "Bump";
    }

    struct BumpHandler {
        total: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CommandHandler<Bump> for BumpHandler {
        async fn handle(&self, _ctx: &AppContext, cmd: Bump) -> Result<(), AppError> {
            if cmd.0 == 0 {
                return Err(AppError::Validation("zero".into()));
            }
            self.total.fetch_add(cmd.0, Ordering::SeqCst);
            Ok(())
        }
    }

    fn bump_handler(total: &Arc<AtomicUsize>) -> Arc<BumpHandler> {
        Arc::new(BumpHandler {
            total: total.clone(),
        })
    }

    #[tokio::test]
    async fn routes_by_command_type() {
        let bus = InMemoryCommandBus::new();
        let total = Arc::new(AtomicUsize::new(0));
        bus.register::<Bump, _>(bump_handler(&total)).unwrap();

        let ctx = AppContext::default();
        bus.dispatch(&ctx, Bump(2)).await.unwrap();
        bus.dispatch(&ctx, Bump(3)).await.unwrap();
        assert_eq!(total.load(Ordering::SeqCst), 5);

        let err = bus.dispatch(&ctx, Bump(0)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(bus.registered_commands(), ["Bump"]);
    }

    #[tokio::test]
    async fn unregistered_and_duplicate_commands() {
        let bus = InMemoryCommandBus::new();
        let err = bus
            .dispatch(&AppContext::default(), Bump(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::HandlerNotFound("Bump")));

        let total = Arc::new(AtomicUsize::new(0));
        bus.register::<Bump, _>(bump_handler(&total)).unwrap();
        let dup = bus.register::<Bump, _>(bump_handler(&total)).unwrap_err();
        assert!(matches!(dup, AppError::DuplicateHandler("Bump")));
    }
}
