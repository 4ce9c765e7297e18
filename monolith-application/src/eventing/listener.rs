//! 提交后事件监听（EventListener）
//!
//! 订阅 `EventBus` 的事件流，按注册表匹配处理器并发执行：
//! - 处理器失败只记录日志，不影响其它处理器与后续事件；
//! - 处理器收到的上下文不含事务，不能参与已经提交的事务；
//! - 通过 `ListenerHandle` 关闭与等待。
//!
use super::{EventBus, HandlerRegistry};
use crate::context::AppContext;
use crate::error::AppError;
use bon::Builder;
use futures_core::stream::BoxStream;
use futures_util::{StreamExt, stream};
use monolith_domain::domain_event::SharedEvent;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 监听器配置
#[derive(Clone, Copy, Debug)]
pub struct ListenerConfig {
    /// 单个事件广播给多个处理器时的并发度
    pub handler_concurrency: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            handler_concurrency: 8,
        }
    }
}

#[derive(Builder)]
pub struct EventListener {
    event_bus: Arc<dyn EventBus>,
    registry: Arc<dyn HandlerRegistry>,
    #[builder(default)]
    config: ListenerConfig,
}

impl EventListener {
    /// 先完成订阅再返回，之后发布的事件都能被收到
    pub async fn start(self: Arc<Self>) -> ListenerHandle {
        let token = CancellationToken::new();
        let stream = self.event_bus.subscribe().await;
        let task = tokio::spawn(Self::subscribe_loop(self.clone(), stream, token.clone()));
        ListenerHandle {
            token,
            tasks: vec![task],
        }
    }

    async fn subscribe_loop(
        self: Arc<Self>,
        mut stream: BoxStream<'static, Result<SharedEvent, AppError>>,
        token: CancellationToken,
    ) {
        let concurrency = self.config.handler_concurrency.max(1);
        let ctx = AppContext::default().with_cancellation(token.child_token());

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    break;
                }
                maybe_event = stream.next() => {
                    match maybe_event {
                        Some(Ok(event)) => self.deliver(&ctx, event, concurrency).await,
                        Some(Err(err)) => {
                            warn!(error = %err, "event stream error, continuing");
                        }
                        None => {
                            break;
                        }
                    }
                }
            }
        }
        debug!("event listener stopped");
    }

    async fn deliver(&self, ctx: &AppContext, event: SharedEvent, concurrency: usize) {
        let handlers = self.registry.handlers_for(event.event_type());
        if handlers.is_empty() {
            return;
        }

        stream::iter(handlers)
            .for_each_concurrent(Some(concurrency), |h| {
                let ev = event.clone();
                async move {
                    if let Err(err) = h.handle(ctx, &ev).await {
                        warn!(
                            event_type = %ev.event_type(),
                            event_id = ev.event_id(),
                            handler = h.handler_name(),
                            error = %err,
                            "after-commit handler failed"
                        );
                    }
                }
            })
            .await;
    }
}

/// 监听器运行句柄：用于优雅关闭与等待任务结束
pub struct ListenerHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            let _ = t.await;
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventing::{EventHandlerRegistry, EventSubscriber, InMemoryEventBus, handler_fn};
    use monolith_domain::domain_event::{BaseEvent, EventType};
    use std::time::Duration;
    use tokio::sync::mpsc;

    const SUBMITTED: EventType = EventType::from_static("orders.OrderSubmitted");

    #[tokio::test]
    async fn failures_are_logged_and_delivery_continues() {
        let bus = Arc::new(InMemoryEventBus::new(16));
        let registry = Arc::new(EventHandlerRegistry::new());
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        registry
            .subscribe(
                SUBMITTED,
                handler_fn("broken", |_ctx, _ev| async {
                    Err::<(), _>(AppError::Storage("smtp down".into()))
                }),
            )
            .unwrap();
        registry
            .subscribe(
                SUBMITTED,
                handler_fn("mailer", move |ctx: AppContext, ev: SharedEvent| {
                    let tx = tx.clone();
                    async move {
                        assert!(!ctx.has_transaction());
                        let _ = tx.send(ev.aggregate_id().to_string());
                        Ok::<(), AppError>(())
                    }
                }),
            )
            .unwrap();

        let listener = Arc::new(
            EventListener::builder()
                .event_bus(bus.clone())
                .registry(registry)
                .build(),
        );
        let handle = listener.start().await;

        let events: Vec<SharedEvent> = ["o-1", "o-2"]
            .into_iter()
            .map(|id| Arc::new(BaseEvent::new(SUBMITTED, id)) as SharedEvent)
            .collect();
        bus.publish_all(events).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            let id = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            seen.push(id);
        }
        assert_eq!(seen, ["o-1", "o-2"]);

        handle.shutdown();
        handle.join().await;
    }
}
