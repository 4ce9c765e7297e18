use super::domain::UserRef;
use super::repository::OrderRepository;
use crate::contracts::UserDeleted;
use async_trait::async_trait;
use monolith_application::context::AppContext;
use monolith_application::error::AppError;
use monolith_application::eventing::{EventPublisher, TypedEventHandler};
use monolith_domain::aggregate_root::AggregateRoot;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 用户删除后取消其草稿/待处理订单
///
/// 运行在删除用户的同一事务内：任一订单保存失败都会让整个删除回滚。
/// 取消产生的 `orders.OrderCancelled` 通过上下文中的发布器进入同一次 flush。
pub struct UserDeletedHandler {
    orders: Arc<dyn OrderRepository>,
}

impl UserDeletedHandler {
    pub fn new(orders: Arc<dyn OrderRepository>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl TypedEventHandler<UserDeleted> for UserDeletedHandler {
    fn handler_name(&self) -> &str {
        "orders.cancel_orders_of_deleted_user"
    }

    async fn handle(&self, ctx: &AppContext, event: &UserDeleted) -> Result<(), AppError> {
        info!(user_id = %event.user_id, "cancelling orders of deleted user");

        let user_ref = UserRef::parse(&event.user_id)?;
        let orders = self.orders.find_by_user(ctx, &user_ref).await?;

        for mut order in orders {
            if !order.status().is_open() {
                continue;
            }
            if let Err(err) = order.cancel() {
                warn!(order_id = %order.id(), error = %err, "failed to cancel order");
                continue;
            }

            self.orders.save(ctx, &order).await?;

            let events = order.pop_domain_events();
            match ctx.publisher() {
                Some(publisher) => publisher.publish_all(events),
                None => debug!(count = events.len(), "no publisher in context, events dropped"),
            }

            info!(order_id = %order.id(), user_id = %event.user_id, "cancelled order for deleted user");
        }

        Ok(())
    }
}
