use super::EventType;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 领域事件：已经发生、不可变更的业务事实
///
/// 以 trait object 形式在分发器中流转（见 [`SharedEvent`]），
/// 处理器通过 [`downcast_ref`](trait.Event.html#method.downcast_ref) 取回具体类型。
pub trait Event: fmt::Debug + Send + Sync + 'static {
    /// 事件唯一标识（UUID v4）
    fn event_id(&self) -> &str;

    /// 事件类型，同时作为注册表的路由键
    fn event_type(&self) -> &EventType;

    /// 发生时间（UTC）
    fn occurred_at(&self) -> Timestamp;

    /// 产生该事件的聚合标识
    fn aggregate_id(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

impl dyn Event {
    pub fn downcast_ref<E: Event>(&self) -> Option<&E> {
        self.as_any().downcast_ref::<E>()
    }

    pub fn is<E: Event>(&self) -> bool {
        self.as_any().is::<E>()
    }
}

/// 事件发生时间
pub type Timestamp = DateTime<Utc>;

/// 在分发器、注册表与聚合之间共享的事件句柄
pub type SharedEvent = Arc<dyn Event>;

/// 具备静态事件类型的具体事件
///
/// 由 `#[domain_event(event_type = "...")]` 生成实现，供按类型订阅使用。
pub trait TypedEvent: Event + Clone {
    const EVENT_TYPE: EventType;
}
