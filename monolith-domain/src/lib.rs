//! 模块化单体的领域层基础库（monolith-domain）
//!
//! 提供事务内领域事件协作所需的最小领域抽象：
//! - 领域事件（`domain_event`）：`Event` 协议、`EventType` 命名校验与 `BaseEvent`；
//! - 聚合根（`aggregate_root`）：在业务方法中累积事件，并且只释放一次；
//! - 值对象（`value_object`）：以值相等为准、自带校验的不可变概念。
//!
//! 本 crate 不关心事务与分发，这些由应用层（`monolith-application`）负责。
//!
pub mod aggregate_root;
pub mod domain_event;
pub mod error;
pub mod value_object;

// 允许在本 crate 内部通过 ::monolith_domain 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::monolith_domain 路径。
extern crate self as monolith_domain;
