//! 应用装配：存储、事务作用域、注册表、模块与总线
use crate::config::Config;
use crate::contracts::{OrderSubmitted, UserDeleted};
use crate::notifications::OrderSubmittedNotifier;
use crate::orders::{
    AddItem, CancelOrder, CreateOrder, GetOrder, ListUserOrders, OrderCommandHandler,
    OrderQueryHandler, OrderRepository, RemoveItem, StoreOrderRepository, SubmitOrder,
    UserDeletedHandler,
};
use crate::platform::TxServices;
use crate::users::{
    CreateUser, DeleteUser, GetUser, ListUsers, StoreUserRepository, UpdateUser,
    UserCommandHandler, UserQueryHandler, UserRepository,
};
use monolith_application::error::AppError;
use monolith_application::eventing::{
    EventBus, EventHandlerRegistry, EventListener, InMemoryEventBus, ListenerHandle,
};
use monolith_application::transaction::{
    InMemoryDatabase, ReadOnlyTransactionScope, ReadWriteTransactionScope, TransactionScope,
};
use monolith_application::{InMemoryCommandBus, InMemoryQueryBus};
use std::sync::Arc;
use tracing::info;

const AFTER_COMMIT_CAPACITY: usize = 1024;

/// 仓储实现，可在测试中替换
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub orders: Arc<dyn OrderRepository>,
}

impl Repositories {
    pub fn in_memory(db: &Arc<InMemoryDatabase>) -> Self {
        Self {
            users: Arc::new(StoreUserRepository::new(db.clone())),
            orders: Arc::new(StoreOrderRepository::new(db.clone())),
        }
    }
}

pub struct App {
    pub db: Arc<InMemoryDatabase>,
    pub command_bus: InMemoryCommandBus,
    pub query_bus: InMemoryQueryBus,
    pub notifier: Arc<OrderSubmittedNotifier>,
    /// 提交后总线，额外的订阅者可直接订阅
    pub after_commit: Arc<dyn EventBus>,
    listener: ListenerHandle,
}

impl App {
    pub async fn start(config: &Config) -> Result<Self, AppError> {
        let db = Arc::new(InMemoryDatabase::new());
        let repos = Repositories::in_memory(&db);
        Self::start_with(config, db, repos).await
    }

    pub async fn start_with(
        config: &Config,
        db: Arc<InMemoryDatabase>,
        repos: Repositories,
    ) -> Result<Self, AppError> {
        let rw_scope: Arc<dyn TransactionScope> =
            Arc::new(ReadWriteTransactionScope::with_policy(db.clone(), config.retry));
        let ro_scope: Arc<dyn TransactionScope> = Arc::new(ReadOnlyTransactionScope::new(db.clone()));

        // 事务内处理器
        let in_tx = Arc::new(EventHandlerRegistry::new());
        in_tx.subscribe_typed::<UserDeleted, _>(Arc::new(UserDeletedHandler::new(
            repos.orders.clone(),
        )))?;

        // 提交后处理器
        let after_commit = Arc::new(EventHandlerRegistry::new());
        let notifier = Arc::new(OrderSubmittedNotifier::new());
        after_commit.subscribe_typed::<OrderSubmitted, _>(notifier.clone())?;

        let bus: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::new(AFTER_COMMIT_CAPACITY));
        let listener = Arc::new(
            EventListener::builder()
                .event_bus(bus.clone())
                .registry(after_commit)
                .build(),
        )
        .start()
        .await;

        let tx = TxServices {
            scope: rw_scope,
            registry: in_tx,
            dispatcher: config.dispatcher,
            after_commit: bus.clone(),
        };

        let command_bus = InMemoryCommandBus::new();
        let users = Arc::new(UserCommandHandler::new(repos.users.clone(), tx.clone()));
        command_bus.register::<CreateUser, _>(users.clone())?;
        command_bus.register::<UpdateUser, _>(users.clone())?;
        command_bus.register::<DeleteUser, _>(users)?;

        let orders = Arc::new(OrderCommandHandler::new(repos.orders.clone(), tx));
        command_bus.register::<CreateOrder, _>(orders.clone())?;
        command_bus.register::<AddItem, _>(orders.clone())?;
        command_bus.register::<RemoveItem, _>(orders.clone())?;
        command_bus.register::<SubmitOrder, _>(orders.clone())?;
        command_bus.register::<CancelOrder, _>(orders)?;

        let query_bus = InMemoryQueryBus::new();
        let user_queries = Arc::new(UserQueryHandler::new(repos.users.clone(), ro_scope.clone()));
        query_bus.register::<GetUser, _>(user_queries.clone())?;
        query_bus.register::<ListUsers, _>(user_queries)?;
        let order_queries = Arc::new(OrderQueryHandler::new(repos.orders.clone(), ro_scope));
        query_bus.register::<GetOrder, _>(order_queries.clone())?;
        query_bus.register::<ListUserOrders, _>(order_queries)?;

        info!(
            commands = command_bus.registered_commands().len(),
            queries = query_bus.registered_queries().len(),
            max_depth = config.dispatcher.max_depth,
            max_attempts = config.retry.max_attempts,
            "application wired"
        );

        Ok(Self {
            db,
            command_bus,
            query_bus,
            notifier,
            after_commit: bus,
            listener,
        })
    }

    /// 停止提交后监听并等待其退出
    pub async fn shutdown(self) {
        self.listener.shutdown();
        self.listener.join().await;
    }
}
