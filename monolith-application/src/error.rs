use monolith_domain::domain_event::EventType;
use monolith_domain::error::DomainError;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    // --- 事务 ---
    #[error("nested transaction: a transaction is already present in context")]
    NestedTransaction,

    #[error("transaction aborted: {reason}")]
    TransactionAborted { reason: String },

    #[error("storage: {0}")]
    Storage(String),

    #[error("cancelled")]
    Cancelled,

    // --- 事件分发 ---
    #[error("event processing depth exceeded: max_depth={max_depth}")]
    EventProcessingDepthExceeded { max_depth: usize },

    #[error("handler failed for event {event_type}: {source}")]
    HandlerFailed {
        event_type: EventType,
        handler: String,
        #[source]
        source: Box<AppError>,
    },

    #[error("event bus: {0}")]
    EventBus(String),

    // --- 命令/查询总线 ---
    #[error("handler not found: {0}")]
    HandlerNotFound(&'static str),

    #[error("handler already registered: {0}")]
    DuplicateHandler(&'static str),

    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl AppError {
    /// 是否为可重试的瞬时冲突（由事务作用域自动重试）
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::TransactionAborted { .. } => true,
            AppError::HandlerFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// 沿 `HandlerFailed` 链找到最内层的错误
    pub fn root_cause(&self) -> &AppError {
        match self {
            AppError::HandlerFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_failure_message_names_the_event() {
        let err = AppError::HandlerFailed {
            event_type: EventType::from_static("users.UserDeleted"),
            handler: "orders.user_deleted".into(),
            source: Box::new(AppError::Storage("disk full".into())),
        };
        assert_eq!(
            err.to_string(),
            "handler failed for event users.UserDeleted: storage: disk full"
        );
    }

    #[test]
    fn conflicts_stay_retryable_through_handler_wrapping() {
        let inner = AppError::TransactionAborted {
            reason: "row changed".into(),
        };
        assert!(inner.is_retryable());

        let wrapped = AppError::HandlerFailed {
            event_type: EventType::from_static("users.UserDeleted"),
            handler: "h".into(),
            source: Box::new(inner),
        };
        assert!(wrapped.is_retryable());
        assert!(matches!(
            wrapped.root_cause(),
            AppError::TransactionAborted { .. }
        ));

        assert!(!AppError::NestedTransaction.is_retryable());
        assert!(!AppError::EventProcessingDepthExceeded { max_depth: 10 }.is_retryable());
    }
}
