use super::domain::{User, UserId};
use super::repository::UserRepository;
use crate::platform::page_size;
use async_trait::async_trait;
use monolith_application::context::AppContext;
use monolith_application::error::AppError;
use monolith_application::query::{Dto, Query, QueryHandler};
use monolith_application::transaction::{TransactionScope, execute_with_result};
use monolith_domain::domain_event::Timestamp;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDto {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub status: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Dto for UserDto {}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().to_string(),
            email: user.email().to_string(),
            first_name: user.name().first_name().to_string(),
            last_name: user.name().last_name().to_string(),
            status: user.status().to_string(),
            created_at: user.created_at(),
            updated_at: user.updated_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserListDto {
    pub users: Vec<UserDto>,
    pub total_count: usize,
    pub offset: usize,
    pub limit: usize,
}

impl Dto for UserListDto {}

#[derive(Debug, Clone)]
pub struct GetUser {
    pub user_id: String,
}

impl Query for GetUser {
    const NAME: &'static str = "users.GetUser";
    type Dto = UserDto;
}

/// `limit` 为 0 时取默认页大小
#[derive(Debug, Clone, Default)]
pub struct ListUsers {
    pub offset: usize,
    pub limit: usize,
}

impl Query for ListUsers {
    const NAME: &'static str = "users.ListUsers";
    type Dto = UserListDto;
}

/// 在只读快照中读取用户
pub struct UserQueryHandler {
    repo: Arc<dyn UserRepository>,
    scope: Arc<dyn TransactionScope>,
}

impl UserQueryHandler {
    pub fn new(repo: Arc<dyn UserRepository>, scope: Arc<dyn TransactionScope>) -> Self {
        Self { repo, scope }
    }
}

#[async_trait]
impl QueryHandler<GetUser> for UserQueryHandler {
    async fn handle(&self, ctx: &AppContext, q: GetUser) -> Result<UserDto, AppError> {
        let user_id = UserId::parse(&q.user_id)?;

        execute_with_result(self.scope.as_ref(), ctx, |tx_ctx| {
            let repo = self.repo.clone();
            let user_id = user_id.clone();
            async move {
                let user = repo.find_by_id(&tx_ctx, &user_id).await?;
                Ok::<UserDto, AppError>(UserDto::from(&user))
            }
        })
        .await
    }
}

#[async_trait]
impl QueryHandler<ListUsers> for UserQueryHandler {
    async fn handle(&self, ctx: &AppContext, q: ListUsers) -> Result<UserListDto, AppError> {
        let (offset, limit) = (q.offset, page_size(q.limit));

        execute_with_result(self.scope.as_ref(), ctx, |tx_ctx| {
            let repo = self.repo.clone();
            async move {
                let (users, total_count) = repo.list(&tx_ctx, offset, limit).await?;
                Ok::<UserListDto, AppError>(UserListDto {
                    users: users.iter().map(UserDto::from).collect(),
                    total_count,
                    offset,
                    limit,
                })
            }
        })
        .await
    }
}
