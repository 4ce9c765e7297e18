//! 模块间公开的事件契约
//!
//! 模块之间只通过这里的事件类型耦合；订阅方从此处引用，而不是依赖对方的领域模型。
//!
use monolith_macros::domain_event;

// --- users ---

#[domain_event(event_type = "users.UserCreated")]
pub struct UserCreated {
    pub user_id: String,
    pub email: String,
}

#[domain_event(event_type = "users.UserDeleted")]
pub struct UserDeleted {
    pub user_id: String,
}

// --- orders ---

#[domain_event(event_type = "orders.OrderCreated")]
pub struct OrderCreated {
    pub order_id: String,
    pub user_id: String,
}

#[domain_event(event_type = "orders.OrderSubmitted")]
pub struct OrderSubmitted {
    pub order_id: String,
    pub user_id: String,
    pub total_amount: i64,
    pub currency: String,
}

#[domain_event(event_type = "orders.OrderCancelled")]
pub struct OrderCancelled {
    pub order_id: String,
    pub user_id: String,
}
