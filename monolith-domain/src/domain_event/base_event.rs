use super::{Event, EventType};
use crate::error::DomainResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use uuid::Uuid;

/// 所有领域事件共享的字段
///
/// 具体事件通过 `#[serde(flatten)]` 内嵌本结构体，序列化后字段为
/// `id`、`type`、`timestamp`、`aggregate_id`。字段只读，构造后不可修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: EventType,
    #[serde(rename = "timestamp")]
    occurred_at: DateTime<Utc>,
    aggregate_id: String,
}

impl BaseEvent {
    /// 构造事件基础字段
    ///
    /// # Panics
    ///
    /// `event_type` 不满足 `module.PastTenseVerb` 命名规则时 panic。
    /// 事件类型来自代码中的常量，命名错误属于编程错误；
    /// 运行期来源的名称请使用 [`BaseEvent::try_new`]。
    pub fn new(event_type: EventType, aggregate_id: impl Into<String>) -> Self {
        match Self::try_new(event_type, aggregate_id) {
            Ok(base) => base,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn try_new(event_type: EventType, aggregate_id: impl Into<String>) -> DomainResult<Self> {
        event_type.validate()?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            occurred_at: Utc::now(),
            aggregate_id: aggregate_id.into(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }
}

impl Event for BaseEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn event_type(&self) -> &EventType {
        &self.event_type
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_event::SharedEvent;
    use std::sync::Arc;

    #[test]
    fn new_fills_identity_and_timestamp() {
        let before = Utc::now();
        let ev = BaseEvent::new(EventType::from_static("users.UserDeleted"), "u-1");

        assert!(Uuid::parse_str(ev.id()).is_ok());
        assert_eq!(ev.event_type().as_str(), "users.UserDeleted");
        assert_eq!(ev.aggregate_id(), "u-1");
        assert!(ev.occurred_at() >= before);
    }

    #[test]
    fn ids_are_unique() {
        let ty = EventType::from_static("users.UserDeleted");
        let a = BaseEvent::new(ty.clone(), "u-1");
        let b = BaseEvent::new(ty, "u-1");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    #[should_panic(expected = "invalid event type")]
    fn new_panics_on_invalid_type() {
        let _ = BaseEvent::new(EventType::from_static("UserDeleted"), "u-1");
    }

    #[test]
    fn try_new_reports_invalid_type() {
        let err = BaseEvent::try_new(EventType::from_static("users.deleted"), "u-1").unwrap_err();
        assert!(err.to_string().contains("users.deleted"));
    }

    #[test]
    fn serialized_field_names() {
        let ev = BaseEvent::new(EventType::from_static("orders.OrderCancelled"), "o-1");
        let json = serde_json::to_value(&ev).unwrap();

        assert_eq!(json["type"], "orders.OrderCancelled");
        assert_eq!(json["aggregate_id"], "o-1");
        assert!(json.get("timestamp").is_some());
        assert!(json.get("id").is_some());
    }

    #[test]
    fn downcast_through_shared_handle() {
        let shared: SharedEvent =
            Arc::new(BaseEvent::new(EventType::from_static("users.UserCreated"), "u-9"));

        assert!(shared.is::<BaseEvent>());
        let base = shared.downcast_ref::<BaseEvent>().unwrap();
        assert_eq!(base.aggregate_id(), "u-9");
    }
}
