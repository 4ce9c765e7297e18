use super::domain::{Email, Name, User, UserError, UserId, UserStatus};
use crate::platform::TableStore;
use async_trait::async_trait;
use monolith_application::context::AppContext;
use monolith_application::error::AppError;
use monolith_application::transaction::{Filter, InMemoryDatabase};
use monolith_domain::domain_event::Timestamp;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const USERS_TABLE: &str = "users";

/// 用户仓储；事务由上下文携带
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn save(&self, ctx: &AppContext, user: &User) -> Result<(), AppError>;

    async fn find_by_id(&self, ctx: &AppContext, id: &UserId) -> Result<User, AppError>;

    async fn find_by_email(&self, ctx: &AppContext, email: &Email)
    -> Result<Option<User>, AppError>;

    /// 分页读取，同时返回总数
    async fn list(
        &self,
        ctx: &AppContext,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<User>, usize), AppError>;

    async fn exists(&self, ctx: &AppContext, email: &Email) -> Result<bool, AppError> {
        Ok(self.find_by_email(ctx, email).await?.is_some())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UserRecord {
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    status: UserStatus,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl From<&User> for UserRecord {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().to_string(),
            email: user.email().to_string(),
            first_name: user.name().first_name().to_string(),
            last_name: user.name().last_name().to_string(),
            status: user.status(),
            created_at: user.created_at(),
            updated_at: user.updated_at(),
        }
    }
}

impl TryFrom<UserRecord> for User {
    type Error = UserError;

    fn try_from(r: UserRecord) -> Result<Self, Self::Error> {
        Ok(User::restore(
            UserId::parse(&r.id)?,
            Email::parse(&r.email)?,
            Name::new(&r.first_name, &r.last_name)?,
            r.status,
            r.created_at,
            r.updated_at,
        ))
    }
}

/// 基于内存事务存储的用户仓储
#[derive(Clone)]
pub struct StoreUserRepository {
    table: TableStore,
}

impl StoreUserRepository {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self {
            table: TableStore::new(db, USERS_TABLE),
        }
    }
}

#[async_trait]
impl UserRepository for StoreUserRepository {
    async fn save(&self, ctx: &AppContext, user: &User) -> Result<(), AppError> {
        self.table
            .put(ctx, user.id().as_inner(), &UserRecord::from(user))
    }

    async fn find_by_id(&self, ctx: &AppContext, id: &UserId) -> Result<User, AppError> {
        let row = self
            .table
            .get(ctx, id.as_inner())
            .await?
            .ok_or_else(|| UserError::NotFound(id.to_string()))?;
        Ok(User::try_from(row.decode::<UserRecord>()?)?)
    }

    async fn find_by_email(
        &self,
        ctx: &AppContext,
        email: &Email,
    ) -> Result<Option<User>, AppError> {
        let rows = self
            .table
            .find_where(ctx, vec![Filter::eq("email", email.as_inner().as_str())], Some(1))
            .await?;
        match rows.first() {
            Some(row) => Ok(Some(User::try_from(row.decode::<UserRecord>()?)?)),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        ctx: &AppContext,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<User>, usize), AppError> {
        let rows = self.table.find_where(ctx, Vec::new(), None).await?;
        let total = rows.len();
        let users = rows
            .iter()
            .skip(offset)
            .take(limit)
            .map(|row| -> Result<User, AppError> { Ok(User::try_from(row.decode::<UserRecord>()?)?) })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((users, total))
    }
}
