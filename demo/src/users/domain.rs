use crate::contracts::{UserCreated, UserDeleted};
use chrono::Utc;
use monolith_application::error::AppError;
use monolith_domain::domain_event::Timestamp;
use monolith_domain::error::DomainError;
use monolith_domain::value_object::ValueObject;
use monolith_macros::{aggregate_root, domain_event, value_object};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("user not found: {0}")]
    NotFound(String),
    #[error("user has been deleted")]
    Deleted,
    #[error("invalid user id: {0}")]
    InvalidId(String),

    #[error("email is required")]
    EmailRequired,
    #[error("email format is invalid")]
    EmailInvalid,
    #[error("email already exists")]
    EmailExists,

    #[error("first name is required")]
    FirstNameRequired,
    #[error("first name must be 2-50 characters")]
    FirstNameLength,
    #[error("last name is required")]
    LastNameRequired,
    #[error("last name must be 2-50 characters")]
    LastNameLength,
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(_) => AppError::NotFound(err.to_string()),
            UserError::EmailExists => AppError::Conflict(err.to_string()),
            UserError::Deleted => AppError::Domain(DomainError::invalid_state(err.to_string())),
            other => AppError::Validation(other.to_string()),
        }
    }
}

#[value_object(display = true)]
#[derive(Hash)]
pub struct UserId(String);

impl UserId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, UserError> {
        Uuid::parse_str(raw.trim())
            .map(|id| Self(id.to_string()))
            .map_err(|_| UserError::InvalidId(raw.to_string()))
    }
}

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email pattern")
});

/// 邮箱（去除首尾空白并转小写后校验）
#[value_object(display = true)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, UserError> {
        Self(raw.trim().to_lowercase()).validated()
    }
}

impl ValueObject for Email {
    type Error = UserError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.0.is_empty() {
            return Err(UserError::EmailRequired);
        }
        if !EMAIL_RE.is_match(&self.0) {
            return Err(UserError::EmailInvalid);
        }
        Ok(())
    }
}

#[value_object]
pub struct Name {
    first_name: String,
    last_name: String,
}

impl Name {
    pub fn new(first_name: &str, last_name: &str) -> Result<Self, UserError> {
        Self {
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
        }
        .validated()
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl ValueObject for Name {
    type Error = UserError;

    fn validate(&self) -> Result<(), Self::Error> {
        let len = |s: &str| s.chars().count();
        if self.first_name.is_empty() {
            return Err(UserError::FirstNameRequired);
        }
        if !(2..=50).contains(&len(&self.first_name)) {
            return Err(UserError::FirstNameLength);
        }
        if self.last_name.is_empty() {
            return Err(UserError::LastNameRequired);
        }
        if !(2..=50).contains(&len(&self.last_name)) {
            return Err(UserError::LastNameLength);
        }
        Ok(())
    }
}

#[value_object]
#[derive(Copy)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Deleted,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 用户聚合根
/// 资料变更只在用户模块内部使用，不进入跨模块契约
#[domain_event(event_type = "users.UserUpdated")]
pub struct UserUpdated {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
}

#[aggregate_root]
#[derive(Debug)]
pub struct User {
    id: UserId,
    email: Email,
    name: Name,
    status: UserStatus,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl User {
    /// 新建用户，记录 `users.UserCreated`
    pub fn create(id: UserId, email: Email, name: Name) -> Self {
        let now = Utc::now();
        let mut user = Self {
            id,
            email,
            name,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
            domain_events: Default::default(),
        };
        user.domain_events.record(UserCreated::new(
            user.id.to_string(),
            user.id.to_string(),
            user.email.to_string(),
        ));
        user
    }

    /// 从持久化状态重建，不产生事件
    pub fn restore(
        id: UserId,
        email: Email,
        name: Name,
        status: UserStatus,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            email,
            name,
            status,
            created_at,
            updated_at,
            domain_events: Default::default(),
        }
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn status(&self) -> UserStatus {
        self.status
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// 修改姓名，记录 `users.UserUpdated`
    pub fn update_profile(&mut self, name: Name) -> Result<(), UserError> {
        self.ensure_not_deleted()?;
        self.name = name;
        self.touch();
        self.domain_events.record(UserUpdated::new(
            self.id.to_string(),
            self.id.to_string(),
            self.name.first_name().to_string(),
            self.name.last_name().to_string(),
        ));
        Ok(())
    }

    pub fn deactivate(&mut self) -> Result<(), UserError> {
        self.ensure_not_deleted()?;
        self.status = UserStatus::Inactive;
        self.touch();
        Ok(())
    }

    pub fn activate(&mut self) -> Result<(), UserError> {
        self.ensure_not_deleted()?;
        self.status = UserStatus::Active;
        self.touch();
        Ok(())
    }

    /// 软删除，记录 `users.UserDeleted`；已删除的用户不能再次删除
    pub fn delete(&mut self) -> Result<(), UserError> {
        self.ensure_not_deleted()?;
        self.status = UserStatus::Deleted;
        self.touch();
        self.domain_events
            .record(UserDeleted::new(self.id.to_string(), self.id.to_string()));
        Ok(())
    }

    fn ensure_not_deleted(&self) -> Result<(), UserError> {
        if self.status == UserStatus::Deleted {
            return Err(UserError::Deleted);
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monolith_domain::aggregate_root::AggregateRoot;
    use monolith_domain::domain_event::{Event, TypedEvent};

    fn alice() -> User {
        User::create(
            UserId::generate(),
            Email::parse("  Alice@Example.COM ").unwrap(),
            Name::new("Alice", "Smith").unwrap(),
        )
    }

    #[test]
    fn email_is_normalized_and_checked() {
        assert_eq!(
            Email::parse(" Bob@Example.org").unwrap().as_inner(),
            "bob@example.org"
        );
        assert!(matches!(Email::parse("   "), Err(UserError::EmailRequired)));
        assert!(matches!(Email::parse("bob@"), Err(UserError::EmailInvalid)));
    }

    #[test]
    fn name_length_rules() {
        assert!(matches!(Name::new("A", "Smith"), Err(UserError::FirstNameLength)));
        assert!(matches!(Name::new("Al", ""), Err(UserError::LastNameRequired)));
        assert_eq!(Name::new(" Al ", "Li").unwrap().full_name(), "Al Li");
    }

    #[test]
    fn user_id_must_be_uuid() {
        assert!(UserId::parse("not-a-uuid").is_err());
        let id = UserId::generate();
        assert_eq!(UserId::parse(id.as_inner()).unwrap(), id);
    }

    #[test]
    fn create_then_delete_records_both_events() {
        let mut user = alice();
        user.delete().unwrap();

        let events = user.pop_domain_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), &UserCreated::EVENT_TYPE);
        let deleted = events[1].downcast_ref::<UserDeleted>().unwrap();
        assert_eq!(deleted.user_id, user.id().to_string());
        assert_eq!(user.status(), UserStatus::Deleted);
        assert!(user.pop_domain_events().is_empty());
    }

    #[test]
    fn profile_update_records_new_name() {
        let mut user = alice();
        let _ = user.pop_domain_events();

        user.update_profile(Name::new("Alicia", "Smith").unwrap()).unwrap();
        let events = user.pop_domain_events();
        let updated = events[0].downcast_ref::<UserUpdated>().unwrap();
        assert_eq!(updated.first_name, "Alicia");
        assert_eq!(user.name().full_name(), "Alicia Smith");
    }

    #[test]
    fn deleted_user_rejects_changes() {
        let mut user = alice();
        user.delete().unwrap();
        let _ = user.pop_domain_events();

        assert!(matches!(user.delete(), Err(UserError::Deleted)));
        assert!(matches!(user.activate(), Err(UserError::Deleted)));
        assert!(user.pending_domain_events().is_empty());
    }

    #[test]
    fn restore_records_nothing() {
        let now = Utc::now();
        let user = User::restore(
            UserId::generate(),
            Email::parse("c@d.io").unwrap(),
            Name::new("Carol", "Diaz").unwrap(),
            UserStatus::Inactive,
            now,
            now,
        );
        assert!(user.pending_domain_events().is_empty());
        assert!(!user.is_active());
    }
}
