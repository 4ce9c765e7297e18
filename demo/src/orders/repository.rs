use super::domain::{Money, Order, OrderError, OrderId, OrderItem, OrderStatus, UserRef};
use crate::platform::TableStore;
use async_trait::async_trait;
use monolith_application::context::AppContext;
use monolith_application::error::AppError;
use monolith_application::transaction::{Filter, InMemoryDatabase};
use monolith_domain::domain_event::Timestamp;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ORDERS_TABLE: &str = "orders";

/// 订单仓储；事务由上下文携带
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn save(&self, ctx: &AppContext, order: &Order) -> Result<(), AppError>;

    async fn find_by_id(&self, ctx: &AppContext, id: &OrderId) -> Result<Order, AppError>;

    /// 某用户的全部订单，按订单 ID 升序
    async fn find_by_user(&self, ctx: &AppContext, user: &UserRef)
    -> Result<Vec<Order>, AppError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct OrderRecord {
    id: String,
    user_id: String,
    items: Vec<OrderItem>,
    status: OrderStatus,
    total: Money,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl From<&Order> for OrderRecord {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            user_id: order.user_ref().to_string(),
            items: order.items().to_vec(),
            status: order.status(),
            total: order.total().clone(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = OrderError;

    fn try_from(r: OrderRecord) -> Result<Self, Self::Error> {
        Ok(Order::restore(
            OrderId::parse(&r.id)?,
            UserRef::parse(&r.user_id)?,
            r.items,
            r.status,
            r.total,
            r.created_at,
            r.updated_at,
        ))
    }
}

/// 基于内存事务存储的订单仓储
#[derive(Clone)]
pub struct StoreOrderRepository {
    table: TableStore,
}

impl StoreOrderRepository {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self {
            table: TableStore::new(db, ORDERS_TABLE),
        }
    }
}

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn save(&self, ctx: &AppContext, order: &Order) -> Result<(), AppError> {
        self.table
            .put(ctx, order.id().as_inner(), &OrderRecord::from(order))
    }

    async fn find_by_id(&self, ctx: &AppContext, id: &OrderId) -> Result<Order, AppError> {
        let row = self
            .table
            .get(ctx, id.as_inner())
            .await?
            .ok_or_else(|| OrderError::NotFound(id.to_string()))?;
        Ok(Order::try_from(row.decode::<OrderRecord>()?)?)
    }

    async fn find_by_user(
        &self,
        ctx: &AppContext,
        user: &UserRef,
    ) -> Result<Vec<Order>, AppError> {
        let rows = self
            .table
            .find_where(ctx, vec![Filter::eq("user_id", user.as_inner().as_str())], None)
            .await?;
        rows.iter()
            .map(|row| -> Result<Order, AppError> {
                Ok(Order::try_from(row.decode::<OrderRecord>()?)?)
            })
            .collect()
    }
}
