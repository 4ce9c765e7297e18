//! 用户模块：用户聚合、仓储与用例
//!
//! 对外只暴露命令/查询与 `users.*` 事件契约；其它模块不依赖这里的领域类型。
//!
pub mod commands;
pub mod domain;
pub mod queries;
pub mod repository;

pub use commands::{CreateUser, DeleteUser, UpdateUser, UserCommandHandler};
pub use domain::{Email, Name, User, UserError, UserId, UserStatus, UserUpdated};
pub use queries::{GetUser, ListUsers, UserDto, UserListDto, UserQueryHandler};
pub use repository::{StoreUserRepository, UserRepository};
