//! 领域事件（Domain Event）
//!
//! 定义事件需要实现的最小接口（`Event`）、事件类型命名规则（`EventType`），
//! 以及具体事件内嵌的公共字段 `BaseEvent`。

mod base_event;
mod event;
mod event_type;

pub use base_event::BaseEvent;
pub use event::{Event, SharedEvent, Timestamp, TypedEvent};
pub use event_type::{EVENT_TYPE_PATTERN, EventType};
