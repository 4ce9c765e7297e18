//! 模块化单体演示：users / orders / notifications 三个模块
//!
//! - `contracts`：模块间唯一的耦合点（事件契约）；
//! - `users`、`orders`：聚合、仓储与命令/查询用例，写用例在事务内 flush 领域事件；
//! - `notifications`：只挂在提交后总线上的外部副作用；
//! - `app`：装配存储、事务作用域、注册表与总线。
//!
pub mod app;
pub mod config;
pub mod contracts;
pub mod notifications;
pub mod orders;
pub mod platform;
pub mod users;

pub use app::{App, Repositories};
pub use config::Config;
