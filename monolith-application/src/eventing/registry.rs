//! 处理器注册表（HandlerRegistry）
//!
//! 事件类型 → 有序处理器列表。启动期注册，运行期只读查找；不支持注销。
//! 注册表只做查找，不负责分发。
//!
use super::handler::{EventHandler, TypedEventHandler, TypedHandler};
use crate::error::AppError;
use dashmap::DashMap;
use monolith_domain::domain_event::{EventType, TypedEvent};
use std::sync::Arc;
use tracing::debug;

/// 查找某事件类型的处理器
pub trait HandlerRegistry: Send + Sync {
    /// 返回注册顺序的处理器列表（防御性拷贝，调用方修改不影响注册表）
    fn handlers_for(&self, event_type: &EventType) -> Vec<Arc<dyn EventHandler>>;
}

/// 订阅事件
pub trait EventSubscriber: Send + Sync {
    /// 追加处理器；事件类型命名不合法时返回错误
    fn subscribe(
        &self,
        event_type: EventType,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), AppError>;
}

/// 基于 DashMap 的注册表，可在并发查找的同时注册
#[derive(Default)]
pub struct EventHandlerRegistry {
    handlers: DashMap<EventType, Vec<Arc<dyn EventHandler>>>,
}

impl EventHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以 `E::EVENT_TYPE` 为键注册类型化处理器
    pub fn subscribe_typed<E, H>(&self, handler: Arc<H>) -> Result<(), AppError>
    where
        E: TypedEvent,
        H: TypedEventHandler<E> + 'static,
    {
        self.subscribe(E::EVENT_TYPE, Arc::new(TypedHandler::<E, H>::new(handler)))
    }

    /// 已有订阅的事件类型（排序后）
    pub fn subscribed_types(&self) -> Vec<EventType> {
        let mut types: Vec<EventType> = self.handlers.iter().map(|e| e.key().clone()).collect();
        types.sort();
        types
    }
}

impl EventSubscriber for EventHandlerRegistry {
    fn subscribe(
        &self,
        event_type: EventType,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), AppError> {
        event_type.validate()?;
        debug!(
            event_type = %event_type,
            handler = handler.handler_name(),
            "event handler subscribed"
        );
        self.handlers.entry(event_type).or_default().push(handler);
        Ok(())
    }
}

impl HandlerRegistry for EventHandlerRegistry {
    fn handlers_for(&self, event_type: &EventType) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .get(event_type)
            .map(|list| list.value().clone())
            .unwrap_or_default()
    }
}
