//! 用户写用例
//!
//! 每个用例开启一次读写事务：在闭包内新建分发器、加载/创建聚合、保存、
//! 发布聚合事件并 flush，处理器在同一事务内执行。提交成功后再把聚合事件转发到提交后总线。
//!
use super::domain::{Email, Name, User, UserError, UserId};
use super::repository::UserRepository;
use crate::platform::TxServices;
use async_trait::async_trait;
use monolith_application::command::{Command, CommandHandler};
use monolith_application::context::AppContext;
use monolith_application::error::AppError;
use monolith_application::eventing::EventPublisher;
use monolith_application::transaction::execute_with_result;
use monolith_domain::aggregate_root::AggregateRoot;
use monolith_domain::domain_event::SharedEvent;
use std::sync::Arc;
use tracing::info;

/// 创建用户；ID 由调用方生成，便于在命令返回前拿到
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub user_id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl CreateUser {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id: UserId::generate(),
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

impl Command for CreateUser {
    const NAME: &'static str = "users.CreateUser";
}

#[derive(Debug, Clone)]
pub struct DeleteUser {
    pub user_id: String,
}

impl Command for DeleteUser {
    const NAME: &'static str = "users.DeleteUser";
}

#[derive(Debug, Clone)]
pub struct UpdateUser {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
}

impl Command for UpdateUser {
    const NAME: &'static str = "users.UpdateUser";
}

pub struct UserCommandHandler {
    repo: Arc<dyn UserRepository>,
    tx: TxServices,
}

impl UserCommandHandler {
    pub fn new(repo: Arc<dyn UserRepository>, tx: TxServices) -> Self {
        Self { repo, tx }
    }

    /// 在一次读写事务内加载用户、执行变更、保存并冲刷事件；提交后转发
    async fn modify<F>(&self, ctx: &AppContext, user_id: &UserId, change: F) -> Result<(), AppError>
    where
        F: Fn(&mut User) -> Result<(), UserError> + Send + Sync,
    {
        let change = &change;

        let events = execute_with_result(self.tx.scope.as_ref(), ctx, |tx_ctx| {
            // 分发器按尝试新建，重试时不会带上上一次的事件
            let dispatcher = self.tx.new_dispatcher();
            let repo = self.repo.clone();
            let user_id = user_id.clone();
            async move {
                let mut user = repo.find_by_id(&tx_ctx, &user_id).await?;
                change(&mut user)?;
                repo.save(&tx_ctx, &user).await?;

                dispatcher.publish_all(user.pop_domain_events());
                dispatcher.flush(&tx_ctx).await?;
                Ok::<Vec<SharedEvent>, AppError>(dispatcher.delivered())
            }
        })
        .await?;

        self.tx.announce(events).await;
        Ok(())
    }
}

#[async_trait]
impl CommandHandler<CreateUser> for UserCommandHandler {
    #[tracing::instrument(skip_all, fields(user_id = %cmd.user_id))]
    async fn handle(&self, ctx: &AppContext, cmd: CreateUser) -> Result<(), AppError> {
        // 值对象校验放在事务之外
        let email = Email::parse(&cmd.email)?;
        let name = Name::new(&cmd.first_name, &cmd.last_name)?;

        let events = execute_with_result(self.tx.scope.as_ref(), ctx, |tx_ctx| {
            let dispatcher = self.tx.new_dispatcher();
            let repo = self.repo.clone();
            let (id, email, name) = (cmd.user_id.clone(), email.clone(), name.clone());
            async move {
                if repo.exists(&tx_ctx, &email).await? {
                    return Err(UserError::EmailExists.into());
                }

                let mut user = User::create(id, email, name);
                repo.save(&tx_ctx, &user).await?;

                dispatcher.publish_all(user.pop_domain_events());
                dispatcher.flush(&tx_ctx).await?;
                Ok::<Vec<SharedEvent>, AppError>(dispatcher.delivered())
            }
        })
        .await?;

        info!("user created");
        self.tx.announce(events).await;
        Ok(())
    }
}

#[async_trait]
impl CommandHandler<UpdateUser> for UserCommandHandler {
    #[tracing::instrument(skip_all, fields(user_id = %cmd.user_id))]
    async fn handle(&self, ctx: &AppContext, cmd: UpdateUser) -> Result<(), AppError> {
        let user_id = UserId::parse(&cmd.user_id)?;
        let name = Name::new(&cmd.first_name, &cmd.last_name)?;

        self.modify(ctx, &user_id, |user| user.update_profile(name.clone()))
            .await?;
        info!("user profile updated");
        Ok(())
    }
}

#[async_trait]
impl CommandHandler<DeleteUser> for UserCommandHandler {
    #[tracing::instrument(skip_all, fields(user_id = %cmd.user_id))]
    async fn handle(&self, ctx: &AppContext, cmd: DeleteUser) -> Result<(), AppError> {
        let user_id = UserId::parse(&cmd.user_id)?;

        self.modify(ctx, &user_id, User::delete).await?;
        info!("user deleted");
        Ok(())
    }
}
