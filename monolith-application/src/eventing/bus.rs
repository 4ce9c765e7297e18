//! 提交后事件总线
//!
//! 与事务内分发器相互独立：只在事务作用域返回 `Ok` 之后使用，投递尽力而为。
//! 订阅得到 `'static` 事件流，可直接交给 `tokio::spawn` 消费。
//!
use crate::error::AppError;
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use monolith_domain::domain_event::{Event, SharedEvent};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

#[async_trait]
pub trait EventBus: Send + Sync {
    /// 按给定顺序投递一批已提交的事件
    async fn publish_all(&self, events: Vec<SharedEvent>) -> Result<(), AppError>;

    async fn subscribe(&self) -> BoxStream<'static, Result<SharedEvent, AppError>>;
}

/// 基于 `tokio::sync::broadcast` 的进程内总线
///
/// 没有订阅者时事件直接丢弃；订阅者落后超过 `capacity` 时，流中会出现一次 `EventBus` 错误。
#[derive(Clone)]
pub struct InMemoryEventBus {
    sender: broadcast::Sender<SharedEvent>,
}

impl InMemoryEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish_all(&self, events: Vec<SharedEvent>) -> Result<(), AppError> {
        for event in events {
            let event_type = event.event_type().clone();
            match self.sender.send(event) {
                Ok(receivers) => debug!(%event_type, receivers, "event announced"),
                Err(_) => debug!(%event_type, "nobody listening, event dropped"),
            }
        }
        Ok(())
    }

    async fn subscribe(&self) -> BoxStream<'static, Result<SharedEvent, AppError>> {
        BroadcastStream::new(self.sender.subscribe())
            .map(|item| item.map_err(|lagged| AppError::EventBus(lagged.to_string())))
            .boxed()
    }
}
