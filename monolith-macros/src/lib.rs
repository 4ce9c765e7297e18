//! 领域建模过程宏（monolith-macros）
//!
//! - `#[aggregate_root]`：注入私有事件缓冲区并实现 `AggregateRoot`
//! - `#[domain_event]`：注入 `BaseEvent`，实现 `Event`/`TypedEvent`，编译期校验事件类型命名
//! - `#[value_object]`：值对象常用派生
//!
use proc_macro::TokenStream;

mod aggregate_root;
mod domain_event;
mod utils;
mod value_object;

/// 聚合根宏
///
/// ```ignore
/// #[aggregate_root]
/// #[derive(Debug, Clone)]
/// pub struct User { id: UserId, status: UserStatus }
///
/// impl User {
///     pub fn delete(&mut self) {
///         self.domain_events.record(UserDeleted::new(self.id.to_string()));
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn aggregate_root(attr: TokenStream, item: TokenStream) -> TokenStream {
    aggregate_root::expand(attr, item)
}

/// 领域事件宏
///
/// ```ignore
/// #[domain_event(event_type = "users.UserDeleted")]
/// pub struct UserDeleted { pub user_id: String }
///
/// let ev = UserDeleted::new("u-1", "u-1".to_string());
/// ```
#[proc_macro_attribute]
pub fn domain_event(attr: TokenStream, item: TokenStream) -> TokenStream {
    domain_event::expand(attr, item)
}

/// 值对象宏
/// - 合并派生：Debug（可关闭）, Clone, PartialEq, Eq, Serialize, Deserialize
/// - 参数：`#[value_object(debug = false, display = true)]`
#[proc_macro_attribute]
pub fn value_object(attr: TokenStream, item: TokenStream) -> TokenStream {
    value_object::expand(attr, item)
}
