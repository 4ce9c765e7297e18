//! 领域层错误，在应用层经 `#[from]` 转为 `AppError::Domain`
use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    /// 事件类型不满足 `module.PastTenseVerb`
    #[error("invalid event type: {event_type} (expected `module.PastTenseVerb`)")]
    InvalidEventType { event_type: String },

    /// 当前状态不允许该操作，如删除已删除的用户
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },

    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl DomainError {
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    pub fn invalid_value(reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
