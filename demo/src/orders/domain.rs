use crate::contracts::{OrderCancelled, OrderCreated, OrderSubmitted};
use chrono::Utc;
use monolith_application::error::AppError;
use monolith_domain::domain_event::Timestamp;
use monolith_domain::error::DomainError;
use monolith_domain::value_object::ValueObject;
use monolith_macros::{aggregate_root, value_object};
use std::fmt;
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("order not found: {0}")]
    NotFound(String),
    #[error("invalid order id: {0}")]
    InvalidId(String),
    #[error("invalid user reference: {0}")]
    InvalidUserRef(String),

    #[error("order is not in draft status")]
    NotDraft,
    #[error("order is not pending")]
    NotPending,
    #[error("order is not confirmed")]
    NotConfirmed,
    #[error("order has no items")]
    Empty,
    #[error("order is already cancelled")]
    AlreadyCancelled,
    #[error("order is already completed")]
    Completed,

    #[error("item not found in order: {0}")]
    ItemNotFound(String),
    #[error("quantity must be positive")]
    InvalidQuantity,
    #[error("currency must be a 3-letter ISO code: {0}")]
    InvalidCurrency(String),
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(_) => AppError::NotFound(err.to_string()),
            OrderError::InvalidId(_)
            | OrderError::InvalidUserRef(_)
            | OrderError::InvalidQuantity
            | OrderError::InvalidCurrency(_) => AppError::Validation(err.to_string()),
            other => AppError::Domain(DomainError::invalid_state(other.to_string())),
        }
    }
}

#[value_object(display = true)]
#[derive(Hash)]
pub struct OrderId(String);

impl OrderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, OrderError> {
        Uuid::parse_str(raw.trim())
            .map(|id| Self(id.to_string()))
            .map_err(|_| OrderError::InvalidId(raw.to_string()))
    }
}

/// 下单用户的引用（不依赖用户模块的类型）
#[value_object(display = true)]
#[derive(Hash)]
pub struct UserRef(String);

impl UserRef {
    pub fn parse(raw: &str) -> Result<Self, OrderError> {
        Uuid::parse_str(raw.trim())
            .map(|id| Self(id.to_string()))
            .map_err(|_| OrderError::InvalidUserRef(raw.to_string()))
    }
}

/// 金额（最小货币单位）+ ISO 4217 币种
#[value_object]
pub struct Money {
    amount: i64,
    currency: String,
}

impl Money {
    pub fn new(amount: i64, currency: &str) -> Result<Self, OrderError> {
        Self {
            amount,
            currency: currency.trim().to_uppercase(),
        }
        .validated()
    }

    pub fn zero(currency: &str) -> Result<Self, OrderError> {
        Self::new(0, currency)
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn add(&self, other: &Money) -> Result<Money, OrderError> {
        if self.currency != other.currency {
            return Err(OrderError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency.clone(),
        })
    }

    pub fn multiply(&self, factor: i64) -> Money {
        Money {
            amount: self.amount * factor,
            currency: self.currency.clone(),
        }
    }
}

impl ValueObject for Money {
    type Error = OrderError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(OrderError::InvalidCurrency(self.currency.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[value_object]
#[derive(Copy)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Draft,
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// 尚未进入履约流程，可随用户一起取消
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::Draft | OrderStatus::Pending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[value_object]
pub struct OrderItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(i64::from(self.quantity))
    }
}

/// 订单聚合根
#[aggregate_root]
#[derive(Debug)]
pub struct Order {
    id: OrderId,
    user_ref: UserRef,
    items: Vec<OrderItem>,
    status: OrderStatus,
    total: Money,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Order {
    /// 新建草稿订单，记录 `orders.OrderCreated`
    pub fn create(id: OrderId, user_ref: UserRef) -> Result<Self, OrderError> {
        let now = Utc::now();
        let mut order = Self {
            id,
            user_ref,
            items: Vec::new(),
            status: OrderStatus::Draft,
            total: Money::zero(DEFAULT_CURRENCY)?,
            created_at: now,
            updated_at: now,
            domain_events: Default::default(),
        };
        order.domain_events.record(OrderCreated::new(
            order.id.to_string(),
            order.id.to_string(),
            order.user_ref.to_string(),
        ));
        Ok(order)
    }

    pub fn restore(
        id: OrderId,
        user_ref: UserRef,
        items: Vec<OrderItem>,
        status: OrderStatus,
        total: Money,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            user_ref,
            items,
            status,
            total,
            created_at,
            updated_at,
            domain_events: Default::default(),
        }
    }

    pub fn id(&self) -> &OrderId {
        &self.id
    }

    pub fn user_ref(&self) -> &UserRef {
        &self.user_ref
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total(&self) -> &Money {
        &self.total
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// 追加商品；同一商品合并数量
    pub fn add_item(
        &mut self,
        product_id: &str,
        product_name: &str,
        quantity: u32,
        unit_price: Money,
    ) -> Result<(), OrderError> {
        self.ensure_draft()?;
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity);
        }
        if let Some(first) = self.items.first() {
            if first.unit_price.currency() != unit_price.currency() {
                return Err(OrderError::CurrencyMismatch {
                    left: first.unit_price.currency().to_string(),
                    right: unit_price.currency().to_string(),
                });
            }
        }

        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => item.quantity += quantity,
            None => self.items.push(OrderItem {
                product_id: product_id.to_string(),
                product_name: product_name.to_string(),
                quantity,
                unit_price,
            }),
        }
        self.recalculate_total()?;
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: &str) -> Result<(), OrderError> {
        self.ensure_draft()?;
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before {
            return Err(OrderError::ItemNotFound(product_id.to_string()));
        }
        self.recalculate_total()?;
        self.touch();
        Ok(())
    }

    /// 提交订单（draft → pending），记录 `orders.OrderSubmitted`
    pub fn submit(&mut self) -> Result<(), OrderError> {
        self.ensure_draft()?;
        if self.items.is_empty() {
            return Err(OrderError::Empty);
        }
        self.status = OrderStatus::Pending;
        self.touch();
        self.domain_events.record(OrderSubmitted::new(
            self.id.to_string(),
            self.id.to_string(),
            self.user_ref.to_string(),
            self.total.amount(),
            self.total.currency().to_string(),
        ));
        Ok(())
    }

    pub fn confirm(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Pending {
            return Err(OrderError::NotPending);
        }
        self.status = OrderStatus::Confirmed;
        self.touch();
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Confirmed {
            return Err(OrderError::NotConfirmed);
        }
        self.status = OrderStatus::Completed;
        self.touch();
        Ok(())
    }

    /// 取消订单，记录 `orders.OrderCancelled`
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::Cancelled => return Err(OrderError::AlreadyCancelled),
            OrderStatus::Completed => return Err(OrderError::Completed),
            _ => {}
        }
        self.status = OrderStatus::Cancelled;
        self.touch();
        self.domain_events.record(OrderCancelled::new(
            self.id.to_string(),
            self.id.to_string(),
            self.user_ref.to_string(),
        ));
        Ok(())
    }

    fn ensure_draft(&self) -> Result<(), OrderError> {
        if self.status != OrderStatus::Draft {
            return Err(OrderError::NotDraft);
        }
        Ok(())
    }

    fn recalculate_total(&mut self) -> Result<(), OrderError> {
        let currency = self
            .items
            .first()
            .map(|i| i.unit_price.currency().to_string())
            .unwrap_or_else(|| self.total.currency().to_string());
        let mut total = Money::zero(&currency)?;
        for item in &self.items {
            total = total.add(&item.subtotal())?;
        }
        self.total = total;
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
