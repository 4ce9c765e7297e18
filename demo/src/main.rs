use anyhow::Result;
use demo::orders::{AddItem, CreateOrder, ListUserOrders, SubmitOrder};
use demo::users::{CreateUser, DeleteUser, GetUser};
use demo::{App, Config};
use monolith_application::command::CommandBus;
use monolith_application::context::{AppContext, BusinessContext};
use monolith_application::query::QueryBus;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // RUST_LOG 优先，其次 MONOLITH_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app = App::start(&config).await?;
    let ctx = AppContext::new(
        BusinessContext::builder()
            .correlation_id("demo-cascade".to_string())
            .actor_type("system".to_string())
            .build(),
    );

    // 用户与两张订单：一张已提交（pending），一张草稿
    let create_user = CreateUser::new("alice@example.com", "Alice", "Smith");
    let user_id = create_user.user_id.to_string();
    app.command_bus.dispatch(&ctx, create_user).await?;

    let submitted = CreateOrder::new(user_id.clone());
    let submitted_id = submitted.order_id.to_string();
    app.command_bus.dispatch(&ctx, submitted).await?;
    app.command_bus
        .dispatch(
            &ctx,
            AddItem {
                order_id: submitted_id.clone(),
                product_id: "sku-1".into(),
                product_name: "Mechanical keyboard".into(),
                quantity: 1,
                unit_price: 12_900,
                currency: "USD".into(),
            },
        )
        .await?;
    app.command_bus
        .dispatch(&ctx, SubmitOrder { order_id: submitted_id })
        .await?;

    let draft = CreateOrder::new(user_id.clone());
    app.command_bus.dispatch(&ctx, draft).await?;

    // 删除用户：取消订单在同一事务内完成
    app.command_bus
        .dispatch(&ctx, DeleteUser { user_id: user_id.clone() })
        .await?;

    let user = app
        .query_bus
        .dispatch(&ctx, GetUser { user_id: user_id.clone() })
        .await?;
    info!(user_id = %user.id, status = %user.status, "user after deletion");

    let orders = app
        .query_bus
        .dispatch(
            &ctx,
            ListUserOrders {
                user_id,
                offset: 0,
                limit: 0,
            },
        )
        .await?;
    for order in &orders.orders {
        info!(order_id = %order.id, status = %order.status, total = order.total_amount, "order after deletion");
    }

    // 给提交后监听一点时间处理通知
    tokio::time::sleep(Duration::from_millis(50)).await;
    info!(sent = app.notifier.sent().len(), "notifications sent");

    app.shutdown().await;
    Ok(())
}
