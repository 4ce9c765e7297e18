//! 事件子系统（eventing）
//!
//! - `EventHandler`/`TypedEventHandler`：事件处理逻辑；
//! - `EventHandlerRegistry`：事件类型 → 处理器列表；
//! - `TransactionalEventDispatcher`：事务内缓冲与 flush，带深度保护；
//! - `EventBus`/`InMemoryEventBus`/`EventListener`：提交之后的尽力而为投递。
//!
pub mod bus;
pub mod dispatcher;
pub mod handler;
pub mod listener;
pub mod registry;

pub use bus::{EventBus, InMemoryEventBus};
pub use dispatcher::{
    DEFAULT_MAX_DEPTH, DispatcherConfig, EventPublisher, TransactionalEventDispatcher,
};
pub use handler::{EventHandler, FnEventHandler, TypedEventHandler, TypedHandler, handler_fn};
pub use listener::{EventListener, ListenerConfig, ListenerHandle};
pub use registry::{EventHandlerRegistry, EventSubscriber, HandlerRegistry};
