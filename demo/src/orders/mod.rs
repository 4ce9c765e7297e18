//! 订单模块：订单聚合、仓储、用例与 `users.UserDeleted` 的事务内处理器
pub mod commands;
pub mod domain;
pub mod handlers;
pub mod queries;
pub mod repository;

pub use commands::{
    AddItem, CancelOrder, CreateOrder, OrderCommandHandler, RemoveItem, SubmitOrder,
};
pub use domain::{Money, Order, OrderError, OrderId, OrderItem, OrderStatus, UserRef};
pub use handlers::UserDeletedHandler;
pub use queries::{GetOrder, ListUserOrders, OrderDto, OrderListDto, OrderQueryHandler};
pub use repository::{OrderRepository, StoreOrderRepository};
