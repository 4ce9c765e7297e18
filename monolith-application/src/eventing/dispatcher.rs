//! 事务内事件分发器（TransactionalEventDispatcher）
//!
//! 每次事务尝试新建一个实例：
//! - `publish`：只入队，不分发；
//! - `flush`：按 FIFO 逐个取出，依注册顺序同步调用处理器；处理器发布的新事件进入同一队列，
//!   在本次 flush 内继续处理；
//! - 每取出一个事件深度加一，达到上限即返回 `EventProcessingDepthExceeded`，用于切断事件环。
//!
//! 已取出的事件按顺序记录在 `delivered` 中，事务提交后由调用方转发到提交后总线。
//!
//! 队列锁只在入队/出队时持有，调用处理器期间释放，处理器内 `publish` 不会死锁。
//!
use super::registry::HandlerRegistry;
use crate::{context::AppContext, error::AppError};
use monolith_domain::domain_event::SharedEvent;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// 事件发布器：分发器在调用处理器前注入到上下文中
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: SharedEvent);

    fn publish_all(&self, events: Vec<SharedEvent>) {
        for event in events {
            self.publish(event);
        }
    }
}

pub const DEFAULT_MAX_DEPTH: usize = 10;

/// 分发器配置
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// 单次 flush 最多处理的事件数；0 视为默认值
    pub max_depth: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Default)]
struct PendingEvents {
    queue: VecDeque<SharedEvent>,
    delivered: Vec<SharedEvent>,
    depth: usize,
}

pub struct TransactionalEventDispatcher {
    registry: Arc<dyn HandlerRegistry>,
    max_depth: usize,
    pending: Mutex<PendingEvents>,
}

impl TransactionalEventDispatcher {
    pub fn new(registry: Arc<dyn HandlerRegistry>, config: DispatcherConfig) -> Arc<Self> {
        let max_depth = match config.max_depth {
            0 => DEFAULT_MAX_DEPTH,
            n => n,
        };
        Arc::new(Self {
            registry,
            max_depth,
            pending: Mutex::new(PendingEvents::default()),
        })
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// 队列中尚未处理的事件数
    pub fn pending_count(&self) -> usize {
        self.lock().queue.len()
    }

    /// 已取出处理过的事件（含处理器发布的后续事件），按 FIFO 顺序
    pub fn delivered(&self) -> Vec<SharedEvent> {
        self.lock().delivered.clone()
    }

    fn lock(&self) -> MutexGuard<'_, PendingEvents> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 处理队列直至清空
    ///
    /// 任一处理器失败即停止，错误包装为 `HandlerFailed`（带事件类型）；
    /// 超过深度上限返回 `EventProcessingDepthExceeded`。两者都应导致事务回滚。
    pub async fn flush(self: &Arc<Self>, ctx: &AppContext) -> Result<(), AppError> {
        let publisher: Arc<dyn EventPublisher> = self.clone();
        let handler_ctx = ctx.with_publisher(publisher);
        self.lock().depth = 0;

        loop {
            let event = {
                let mut pending = self.lock();
                if pending.queue.is_empty() {
                    break;
                }
                if pending.depth >= self.max_depth {
                    warn!(
                        max_depth = self.max_depth,
                        remaining = pending.queue.len(),
                        "event processing depth exceeded"
                    );
                    return Err(AppError::EventProcessingDepthExceeded {
                        max_depth: self.max_depth,
                    });
                }
                pending.depth += 1;
                match pending.queue.pop_front() {
                    Some(event) => {
                        pending.delivered.push(event.clone());
                        event
                    }
                    None => break,
                }
            };

            if ctx.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            self.dispatch(&handler_ctx, &event).await?;
        }

        Ok(())
    }

    async fn dispatch(&self, ctx: &AppContext, event: &SharedEvent) -> Result<(), AppError> {
        let handlers = self.registry.handlers_for(event.event_type());
        if handlers.is_empty() {
            debug!(event_type = %event.event_type(), "no handlers subscribed");
            return Ok(());
        }

        for handler in handlers {
            debug!(
                event_type = %event.event_type(),
                event_id = event.event_id(),
                handler = handler.handler_name(),
                "dispatching event"
            );
            if let Err(err) = handler.handle(ctx, event).await {
                warn!(
                    event_type = %event.event_type(),
                    handler = handler.handler_name(),
                    error = %err,
                    "event handler failed"
                );
                return Err(AppError::HandlerFailed {
                    event_type: event.event_type().clone(),
                    handler: handler.handler_name().to_string(),
                    source: Box::new(err),
                });
            }
        }
        Ok(())
    }
}

impl EventPublisher for TransactionalEventDispatcher {
    fn publish(&self, event: SharedEvent) {
        debug!(
            event_type = %event.event_type(),
            event_id = event.event_id(),
            "event queued"
        );
        self.lock().queue.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventing::{EventHandler, EventHandlerRegistry, EventSubscriber, handler_fn};
    use monolith_domain::domain_event::{BaseEvent, EventType};
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const A: EventType = EventType::from_static("tests.AHappened");
    const B: EventType = EventType::from_static("tests.BHappened");
    const C: EventType = EventType::from_static("tests.CHappened");

    fn event(ty: EventType) -> SharedEvent {
        Arc::new(BaseEvent::new(ty, "agg-1"))
    }

    fn recorder(log: Arc<StdMutex<Vec<String>>>, name: &'static str) -> Arc<dyn EventHandler> {
        handler_fn(name, move |_ctx, ev| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(format!("{name}:{}", ev.event_type()));
                Ok::<(), AppError>(())
            }
        })
    }

    #[tokio::test]
    async fn publish_only_buffers() {
        let reg = Arc::new(EventHandlerRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        reg.subscribe(
            A,
            handler_fn("count", move |_ctx, _ev| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), AppError>(())
                }
            }),
        )
        .unwrap();

        let d = TransactionalEventDispatcher::new(reg, DispatcherConfig::default());
        d.publish(event(A));
        d.publish(event(A));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(d.pending_count(), 2);

        d.flush(&AppContext::default()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(d.pending_count(), 0);
    }

    #[tokio::test]
    async fn fifo_and_exhaustive_including_follow_ups() {
        let reg = Arc::new(EventHandlerRegistry::new());
        let log = Arc::new(StdMutex::new(Vec::new()));

        // A 的处理器追加 C
        reg.subscribe(A, recorder(log.clone(), "h1")).unwrap();
        reg.subscribe(
            A,
            handler_fn("spawn-c", |ctx: AppContext, _ev| async move {
                if let Some(p) = ctx.publisher() {
                    p.publish(event(C));
                }
                Ok::<(), AppError>(())
            }),
        )
        .unwrap();
        reg.subscribe(B, recorder(log.clone(), "h2")).unwrap();
        reg.subscribe(C, recorder(log.clone(), "h3")).unwrap();

        let d = TransactionalEventDispatcher::new(reg, DispatcherConfig::default());
        d.publish_all(vec![event(A), event(B)]);
        d.flush(&AppContext::default()).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            [
                "h1:tests.AHappened",
                "h2:tests.BHappened",
                "h3:tests.CHappened"
            ]
        );
        assert_eq!(d.pending_count(), 0);

        let delivered: Vec<String> = d
            .delivered()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect();
        assert_eq!(
            delivered,
            ["tests.AHappened", "tests.BHappened", "tests.CHappened"]
        );
    }

    #[tokio::test]
    async fn unhandled_events_are_dropped_silently() {
        let reg = Arc::new(EventHandlerRegistry::new());
        let d = TransactionalEventDispatcher::new(reg, DispatcherConfig::default());
        d.publish(event(B));
        d.flush(&AppContext::default()).await.unwrap();
        assert_eq!(d.pending_count(), 0);
    }

    #[tokio::test]
    async fn cycles_stop_at_max_depth() {
        let reg = Arc::new(EventHandlerRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        reg.subscribe(
            A,
            handler_fn("echo", move |ctx: AppContext, ev: SharedEvent| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    if let Some(p) = ctx.publisher() {
                        p.publish(ev);
                    }
                    Ok::<(), AppError>(())
                }
            }),
        )
        .unwrap();

        let d = TransactionalEventDispatcher::new(reg, DispatcherConfig::default());
        d.publish(event(A));
        let err = d.flush(&AppContext::default()).await.unwrap_err();

        assert!(matches!(
            err,
            AppError::EventProcessingDepthExceeded { max_depth: 10 }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn zero_max_depth_falls_back_to_default() {
        let reg = Arc::new(EventHandlerRegistry::new());
        let d = TransactionalEventDispatcher::new(reg, DispatcherConfig { max_depth: 0 });
        assert_eq!(d.max_depth(), DEFAULT_MAX_DEPTH);
    }

    #[tokio::test]
    async fn first_failure_stops_and_is_wrapped() {
        let reg = Arc::new(EventHandlerRegistry::new());
        let log = Arc::new(StdMutex::new(Vec::new()));
        reg.subscribe(
            A,
            handler_fn("fails", |_ctx, _ev| async {
                Err::<(), _>(AppError::Storage("save failed".into()))
            }),
        )
        .unwrap();
        reg.subscribe(A, recorder(log.clone(), "after")).unwrap();
        reg.subscribe(B, recorder(log.clone(), "next")).unwrap();

        let d = TransactionalEventDispatcher::new(reg, DispatcherConfig::default());
        d.publish_all(vec![event(A), event(B)]);
        let err = d.flush(&AppContext::default()).await.unwrap_err();

        match &err {
            AppError::HandlerFailed {
                event_type,
                handler,
                source,
            } => {
                assert_eq!(*event_type, A);
                assert_eq!(handler, "fails");
                assert!(matches!(**source, AppError::Storage(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "handler failed for event tests.AHappened: storage: save failed"
        );
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn depth_resets_between_flushes() {
        let reg = Arc::new(EventHandlerRegistry::new());
        reg.subscribe(A, handler_fn("noop", |_ctx, _ev| async { Ok::<(), AppError>(()) }))
            .unwrap();
        let d = TransactionalEventDispatcher::new(reg, DispatcherConfig { max_depth: 2 });

        for _ in 0..3 {
            d.publish_all(vec![event(A), event(A)]);
            d.flush(&AppContext::default()).await.unwrap();
        }
    }
}
