//! 进程内总线共用的路由表：按消息类型（`TypeId`）找到唯一处理函数
use crate::{context::AppContext, error::AppError};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::BoxFuture;
use std::any::{Any, TypeId};
use std::sync::Arc;

pub(crate) type Message = Box<dyn Any + Send>;

pub(crate) type Route<Out> =
    Arc<dyn for<'a> Fn(Message, &'a AppContext) -> BoxFuture<'a, Result<Out, AppError>> + Send + Sync>;

// 让编译器按高阶生命周期推导闭包签名
pub(crate) fn route<Out, F>(f: F) -> Route<Out>
where
    F: for<'a> Fn(Message, &'a AppContext) -> BoxFuture<'a, Result<Out, AppError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

pub(crate) struct RouteTable<Out> {
    routes: DashMap<TypeId, (&'static str, Route<Out>)>,
}

impl<Out> Default for RouteTable<Out> {
    fn default() -> Self {
        Self {
            routes: DashMap::new(),
        }
    }
}

impl<Out> RouteTable<Out> {
    /// 同一消息类型只接受一次绑定
    pub(crate) fn bind<M: 'static>(&self, name: &'static str, f: Route<Out>) -> Result<(), AppError> {
        match self.routes.entry(TypeId::of::<M>()) {
            Entry::Occupied(_) => Err(AppError::DuplicateHandler(name)),
            Entry::Vacant(slot) => {
                slot.insert((name, f));
                Ok(())
            }
        }
    }

    /// 克隆出处理函数后立即释放分片锁，避免跨 await 持锁
    pub(crate) fn lookup<M: 'static>(&self, name: &'static str) -> Result<Route<Out>, AppError> {
        self.routes
            .get(&TypeId::of::<M>())
            .map(|r| r.1.clone())
            .ok_or(AppError::HandlerNotFound(name))
    }

    pub(crate) fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.routes.iter().map(|r| r.0).collect();
        names.sort_unstable();
        names
    }
}

/// 把擦除后的消息还原成具体类型
pub(crate) fn unpack<M: 'static>(msg: Message, name: &'static str) -> Result<M, AppError> {
    msg.downcast::<M>().map(|m| *m).map_err(|_| AppError::TypeMismatch {
        expected: name,
        found: "unknown",
    })
}
