//! 聚合根（AggregateRoot）
//!
//! 聚合在业务方法中声明“某件事发生了”，事件先暂存在聚合私有的缓冲区中，
//! 由应用层在持久化之后一次性取出并交给分发器。
//!
//! 缓冲区字段对聚合所在模块私有，外部只能读取或取出，不能追加。
//! 通常借助 `#[aggregate_root]` 宏注入字段并实现 [`AggregateRoot`]。
//!
use crate::domain_event::{Event, SharedEvent};
use std::sync::Arc;

/// 聚合内暂存的待发布事件（按追加顺序）
#[derive(Clone, Debug, Default)]
pub struct DomainEvents {
    events: Vec<SharedEvent>,
}

impl DomainEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加事件，不做校验
    pub fn record<E: Event>(&mut self, event: E) {
        self.events.push(Arc::new(event));
    }

    /// 取出全部事件并清空缓冲区
    pub fn take(&mut self) -> Vec<SharedEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn as_slice(&self) -> &[SharedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// 聚合根能力
///
/// 只暴露读取与取出；追加通过聚合私有的 `DomainEvents` 字段完成。
pub trait AggregateRoot {
    /// 只读查看尚未取出的事件
    fn pending_domain_events(&self) -> &[SharedEvent];

    /// 取出并清空事件；再次调用返回空列表
    fn pop_domain_events(&mut self) -> Vec<SharedEvent>;

    /// 两步式用法：先 `pending_domain_events` 读取，再清空
    fn clear_domain_events(&mut self) {
        let _ = self.pop_domain_events();
    }
}
