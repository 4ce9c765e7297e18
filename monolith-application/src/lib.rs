//! 模块化单体的应用层（monolith-application）
//!
//! - `transaction`：事务能力、上下文传播与事务作用域（含内存实现）；
//! - `eventing`：处理器注册表、事务内分发器与提交后事件总线；
//! - `command`/`query`：进程内命令与查询总线。
//!
pub mod command;
pub mod context;
pub mod error;
pub mod eventing;
pub mod query;
mod routing;
pub mod transaction;

pub use command::InMemoryCommandBus;
pub use query::InMemoryQueryBus;
