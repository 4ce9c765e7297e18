//! 通知模块：只订阅提交后总线，发送外部通知
//!
//! 处理器在事务之外运行，同一事件可能被重复投递，按事件 ID 去重。
//!
use crate::contracts::OrderSubmitted;
use async_trait::async_trait;
use monolith_application::context::AppContext;
use monolith_application::error::AppError;
use monolith_application::eventing::TypedEventHandler;
use monolith_domain::domain_event::Event;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// 已发出的通知（演示用的“发件箱”）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub event_id: String,
    pub order_id: String,
    pub user_id: String,
    pub action: &'static str,
}

#[derive(Default)]
struct Outbox {
    seen: HashSet<String>,
    sent: Vec<Notification>,
}

#[derive(Default)]
pub struct OrderSubmittedNotifier {
    outbox: Mutex<Outbox>,
}

impl OrderSubmittedNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }
}

#[async_trait]
impl TypedEventHandler<OrderSubmitted> for OrderSubmittedNotifier {
    fn handler_name(&self) -> &str {
        "notifications.order_submitted"
    }

    async fn handle(&self, _ctx: &AppContext, event: &OrderSubmitted) -> Result<(), AppError> {
        let mut outbox = self.outbox.lock().unwrap_or_else(PoisonError::into_inner);
        if !outbox.seen.insert(event.event_id().to_string()) {
            debug!(event_id = event.event_id(), "duplicate delivery, skipping");
            return Ok(());
        }

        info!(
            order_id = %event.order_id,
            user_id = %event.user_id,
            total = event.total_amount,
            currency = %event.currency,
            action = "order_confirmation",
            "sending email to user"
        );
        outbox.sent.push(Notification {
            event_id: event.event_id().to_string(),
            order_id: event.order_id.clone(),
            user_id: event.user_id.clone(),
            action: "order_confirmation",
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn redelivery_is_ignored() {
        let notifier = OrderSubmittedNotifier::new();
        let ev = OrderSubmitted::new("o-1", "o-1".into(), "u-1".into(), 990, "USD".into());
        let ctx = AppContext::default();

        notifier.handle(&ctx, &ev).await.unwrap();
        notifier.handle(&ctx, &ev).await.unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].order_id, "o-1");
        assert_eq!(sent[0].event_id, ev.event_id());
    }
}
