use crate::error::{DomainError, DomainResult};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

/// 事件类型命名规则：`<模块名小写>.<过去式动词，首字母大写>`，例如 `users.UserDeleted`
pub const EVENT_TYPE_PATTERN: &str = r"^[a-z]+\.[A-Z][a-zA-Z]+$";

static EVENT_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(EVENT_TYPE_PATTERN).expect("event type pattern is a valid regex"));

/// 事件类型
///
/// 同时承担两个职责：事件的稳定名称，以及处理器注册表的键。
/// 构造本身不做校验，以便声明 `const`；校验由 [`EventType::validate`] 完成，
/// 在事件构造与订阅时强制执行。
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventType(Cow<'static, str>);

impl EventType {
    /// 以静态字符串声明事件类型（用于契约常量）
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// 运行期构造，命名不合法时返回 `InvalidEventType`
    pub fn try_new(name: impl Into<String>) -> DomainResult<Self> {
        let ty = Self(Cow::Owned(name.into()));
        ty.validate()?;
        Ok(ty)
    }

    /// 纯函数校验，不产生副作用
    pub fn validate(&self) -> DomainResult<()> {
        if EVENT_TYPE_RE.is_match(&self.0) {
            Ok(())
        } else {
            Err(DomainError::InvalidEventType {
                event_type: self.0.to_string(),
            })
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 点号之前的模块名
    pub fn module(&self) -> &str {
        self.0.split_once('.').map(|(m, _)| m).unwrap_or(&self.0)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventType({})", self.0)
    }
}

impl AsRef<str> for EventType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        EventType::try_new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_module_dot_past_tense() {
        for name in ["users.UserDeleted", "orders.OrderSubmitted", "a.Bc"] {
            assert!(EventType::try_new(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_malformed_names() {
        for name in [
            "",
            "users",
            "Users.UserDeleted",
            "users.userDeleted",
            "users.U",
            "users.User_Deleted",
            "users.UserDeleted.v2",
            "users2.UserDeleted",
            ".UserDeleted",
        ] {
            match EventType::try_new(name) {
                Err(DomainError::InvalidEventType { event_type }) => assert_eq!(event_type, name),
                other => panic!("{name} should be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn static_declaration_is_validated_lazily() {
        const BAD: EventType = EventType::from_static("not-valid");
        assert!(!BAD.is_valid());

        const GOOD: EventType = EventType::from_static("orders.OrderCancelled");
        assert!(GOOD.is_valid());
        assert_eq!(GOOD.module(), "orders");
        assert_eq!(GOOD.to_string(), "orders.OrderCancelled");
    }

    #[test]
    fn borrowed_and_owned_compare_equal() {
        let a = EventType::from_static("users.UserCreated");
        let b = EventType::try_new(String::from("users.UserCreated")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn serde_round_trip_rejects_invalid() {
        let ty = EventType::from_static("users.UserCreated");
        let json = serde_json::to_string(&ty).unwrap();
        assert_eq!(json, "\"users.UserCreated\"");

        let err = serde_json::from_str::<EventType>("\"nope\"").unwrap_err();
        assert!(err.to_string().contains("invalid event type"));
    }
}
