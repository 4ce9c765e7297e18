use super::domain::{Order, OrderId, UserRef};
use super::repository::OrderRepository;
use crate::platform::page_size;
use async_trait::async_trait;
use monolith_application::context::AppContext;
use monolith_application::error::AppError;
use monolith_application::query::{Dto, Query, QueryHandler};
use monolith_application::transaction::{TransactionScope, execute_with_result};
use monolith_domain::domain_event::Timestamp;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItemDto {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: i64,
    pub subtotal: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDto {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub items: Vec<OrderItemDto>,
    pub total_amount: i64,
    pub currency: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Dto for OrderDto {}

impl From<&Order> for OrderDto {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            user_id: order.user_ref().to_string(),
            status: order.status().to_string(),
            items: order
                .items()
                .iter()
                .map(|i| OrderItemDto {
                    product_id: i.product_id.clone(),
                    product_name: i.product_name.clone(),
                    quantity: i.quantity,
                    unit_price: i.unit_price.amount(),
                    subtotal: i.subtotal().amount(),
                })
                .collect(),
            total_amount: order.total().amount(),
            currency: order.total().currency().to_string(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderListDto {
    pub orders: Vec<OrderDto>,
    pub total_count: usize,
    pub offset: usize,
    pub limit: usize,
}

impl Dto for OrderListDto {}

#[derive(Debug, Clone)]
pub struct GetOrder {
    pub order_id: String,
}

impl Query for GetOrder {
    const NAME: &'static str = "orders.GetOrder";
    type Dto = OrderDto;
}

/// 分页列出某用户的订单；`limit` 为 0 时取 20，上限 100
#[derive(Debug, Clone)]
pub struct ListUserOrders {
    pub user_id: String,
    pub offset: usize,
    pub limit: usize,
}

impl Query for ListUserOrders {
    const NAME: &'static str = "orders.ListUserOrders";
    type Dto = OrderListDto;
}

pub struct OrderQueryHandler {
    repo: Arc<dyn OrderRepository>,
    scope: Arc<dyn TransactionScope>,
}

impl OrderQueryHandler {
    pub fn new(repo: Arc<dyn OrderRepository>, scope: Arc<dyn TransactionScope>) -> Self {
        Self { repo, scope }
    }
}

#[async_trait]
impl QueryHandler<GetOrder> for OrderQueryHandler {
    async fn handle(&self, ctx: &AppContext, q: GetOrder) -> Result<OrderDto, AppError> {
        let order_id = OrderId::parse(&q.order_id)?;

        execute_with_result(self.scope.as_ref(), ctx, |tx_ctx| {
            let repo = self.repo.clone();
            let order_id = order_id.clone();
            async move {
                let order = repo.find_by_id(&tx_ctx, &order_id).await?;
                Ok::<OrderDto, AppError>(OrderDto::from(&order))
            }
        })
        .await
    }
}

#[async_trait]
impl QueryHandler<ListUserOrders> for OrderQueryHandler {
    async fn handle(&self, ctx: &AppContext, q: ListUserOrders) -> Result<OrderListDto, AppError> {
        let user_ref = UserRef::parse(&q.user_id)?;
        let limit = page_size(q.limit);
        let offset = q.offset;

        execute_with_result(self.scope.as_ref(), ctx, |tx_ctx| {
            let repo = self.repo.clone();
            let user_ref = user_ref.clone();
            async move {
                let orders = repo.find_by_user(&tx_ctx, &user_ref).await?;
                Ok::<OrderListDto, AppError>(OrderListDto {
                    total_count: orders.len(),
                    orders: orders
                        .iter()
                        .skip(offset)
                        .take(limit)
                        .map(OrderDto::from)
                        .collect(),
                    offset,
                    limit,
                })
            }
        })
        .await
    }
}
