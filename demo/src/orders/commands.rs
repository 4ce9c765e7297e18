//! 订单写用例
//!
//! 与用户模块相同的事务模式：闭包内新建分发器、保存聚合、发布并 flush 其事件。
//!
use super::domain::{Money, Order, OrderError, OrderId, UserRef};
use super::repository::OrderRepository;
use crate::platform::TxServices;
use async_trait::async_trait;
use monolith_application::command::{Command, CommandHandler};
use monolith_application::context::AppContext;
use monolith_application::error::AppError;
use monolith_application::eventing::EventPublisher;
use monolith_application::transaction::execute_with_result;
use monolith_domain::aggregate_root::AggregateRoot;
use monolith_domain::domain_event::SharedEvent;
use std::sync::Arc;
use tracing::info;

/// 为用户创建草稿订单；ID 由调用方生成
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub order_id: OrderId,
    pub user_id: String,
}

impl CreateOrder {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            order_id: OrderId::generate(),
            user_id: user_id.into(),
        }
    }
}

impl Command for CreateOrder {
    const NAME: &'static str = "orders.CreateOrder";
}

#[derive(Debug, Clone)]
pub struct AddItem {
    pub order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    /// 单价（最小货币单位）
    pub unit_price: i64,
    pub currency: String,
}

impl Command for AddItem {
    const NAME: &'static str = "orders.AddItem";
}

#[derive(Debug, Clone)]
pub struct RemoveItem {
    pub order_id: String,
    pub product_id: String,
}

impl Command for RemoveItem {
    const NAME: &'static str = "orders.RemoveItem";
}

#[derive(Debug, Clone)]
pub struct SubmitOrder {
    pub order_id: String,
}

impl Command for SubmitOrder {
    const NAME: &'static str = "orders.SubmitOrder";
}

#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: String,
}

impl Command for CancelOrder {
    const NAME: &'static str = "orders.CancelOrder";
}

pub struct OrderCommandHandler {
    repo: Arc<dyn OrderRepository>,
    tx: TxServices,
}

impl OrderCommandHandler {
    pub fn new(repo: Arc<dyn OrderRepository>, tx: TxServices) -> Self {
        Self { repo, tx }
    }

    /// 加载订单 → 执行业务方法 → 保存 → 发布并 flush 事件
    async fn modify<F>(&self, ctx: &AppContext, order_id: &str, change: F) -> Result<(), AppError>
    where
        F: Fn(&mut Order) -> Result<(), OrderError> + Send + Sync,
    {
        let order_id = OrderId::parse(order_id)?;
        let change = &change;

        let events = execute_with_result(self.tx.scope.as_ref(), ctx, |tx_ctx| {
            let dispatcher = self.tx.new_dispatcher();
            let repo = self.repo.clone();
            let order_id = order_id.clone();
            async move {
                let mut order = repo.find_by_id(&tx_ctx, &order_id).await?;
                change(&mut order)?;
                repo.save(&tx_ctx, &order).await?;

                dispatcher.publish_all(order.pop_domain_events());
                dispatcher.flush(&tx_ctx).await?;
                Ok::<Vec<SharedEvent>, AppError>(dispatcher.delivered())
            }
        })
        .await?;

        self.tx.announce(events).await;
        Ok(())
    }
}

#[async_trait]
impl CommandHandler<CreateOrder> for OrderCommandHandler {
    #[tracing::instrument(skip_all, fields(order_id = %cmd.order_id))]
    async fn handle(&self, ctx: &AppContext, cmd: CreateOrder) -> Result<(), AppError> {
        let user_ref = UserRef::parse(&cmd.user_id)?;

        let events = execute_with_result(self.tx.scope.as_ref(), ctx, |tx_ctx| {
            let dispatcher = self.tx.new_dispatcher();
            let repo = self.repo.clone();
            let (order_id, user_ref) = (cmd.order_id.clone(), user_ref.clone());
            async move {
                let mut order = Order::create(order_id, user_ref)?;
                repo.save(&tx_ctx, &order).await?;

                dispatcher.publish_all(order.pop_domain_events());
                dispatcher.flush(&tx_ctx).await?;
                Ok::<Vec<SharedEvent>, AppError>(dispatcher.delivered())
            }
        })
        .await?;

        info!("order created");
        self.tx.announce(events).await;
        Ok(())
    }
}

#[async_trait]
impl CommandHandler<AddItem> for OrderCommandHandler {
    async fn handle(&self, ctx: &AppContext, cmd: AddItem) -> Result<(), AppError> {
        let unit_price = Money::new(cmd.unit_price, &cmd.currency)?;
        self.modify(ctx, &cmd.order_id, |order| {
            order.add_item(
                &cmd.product_id,
                &cmd.product_name,
                cmd.quantity,
                unit_price.clone(),
            )
        })
        .await
    }
}

#[async_trait]
impl CommandHandler<RemoveItem> for OrderCommandHandler {
    async fn handle(&self, ctx: &AppContext, cmd: RemoveItem) -> Result<(), AppError> {
        self.modify(ctx, &cmd.order_id, |order| order.remove_item(&cmd.product_id))
            .await
    }
}

#[async_trait]
impl CommandHandler<SubmitOrder> for OrderCommandHandler {
    #[tracing::instrument(skip_all, fields(order_id = %cmd.order_id))]
    async fn handle(&self, ctx: &AppContext, cmd: SubmitOrder) -> Result<(), AppError> {
        self.modify(ctx, &cmd.order_id, Order::submit).await?;
        info!("order submitted");
        Ok(())
    }
}

#[async_trait]
impl CommandHandler<CancelOrder> for OrderCommandHandler {
    #[tracing::instrument(skip_all, fields(order_id = %cmd.order_id))]
    async fn handle(&self, ctx: &AppContext, cmd: CancelOrder) -> Result<(), AppError> {
        self.modify(ctx, &cmd.order_id, Order::cancel).await?;
        info!("order cancelled");
        Ok(())
    }
}
