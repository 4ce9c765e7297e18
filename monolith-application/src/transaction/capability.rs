use crate::error::AppError;
use async_trait::async_trait;
use bon::Builder;
use monolith_domain::error::DomainError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// 一行数据：主键 + JSON 文档
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub key: String,
    pub value: Value,
}

impl Row {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| AppError::from(DomainError::from(e)))
    }
}

/// 主键范围
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRange {
    All,
    Prefix(String),
    /// 左闭右开 `[start, end)`
    Between { start: String, end: String },
}

impl KeyRange {
    pub fn contains(&self, key: &str) -> bool {
        match self {
            KeyRange::All => true,
            KeyRange::Prefix(p) => key.starts_with(p.as_str()),
            KeyRange::Between { start, end } => key >= start.as_str() && key < end.as_str(),
        }
    }
}

/// 查询过滤条件
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// 顶层字段等值匹配
    Eq { field: String, value: Value },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Filter::Eq { field, value } => row.get(field) == Some(value),
        }
    }
}

/// 查询语句：单表、等值过滤、按主键升序
#[derive(Debug, Clone, Builder)]
pub struct Statement {
    #[builder(into)]
    pub table: String,
    #[builder(default)]
    pub filters: Vec<Filter>,
    pub limit: Option<usize>,
}

/// 写入变更（在事务提交时统一生效）
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    InsertOrUpdate {
        table: String,
        key: String,
        value: Value,
    },
    Delete {
        table: String,
        key: String,
    },
}

impl Mutation {
    pub fn insert_or_update<T: Serialize>(
        table: impl Into<String>,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, AppError> {
        let value = serde_json::to_value(value).map_err(DomainError::from)?;
        Ok(Mutation::InsertOrUpdate {
            table: table.into(),
            key: key.into(),
            value,
        })
    }

    pub fn delete(table: impl Into<String>, key: impl Into<String>) -> Self {
        Mutation::Delete {
            table: table.into(),
            key: key.into(),
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Mutation::InsertOrUpdate { table, .. } | Mutation::Delete { table, .. } => table,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Mutation::InsertOrUpdate { key, .. } | Mutation::Delete { key, .. } => key,
        }
    }
}

/// 读能力：只读事务与读写事务共同提供
#[async_trait]
pub trait ReadCapability: Send + Sync {
    async fn read_row(&self, table: &str, key: &str) -> Result<Option<Row>, AppError>;

    async fn read_range(&self, table: &str, range: &KeyRange) -> Result<Vec<Row>, AppError>;

    async fn query(&self, statement: &Statement) -> Result<Vec<Row>, AppError>;
}

/// 写能力：仅缓冲，提交时生效
pub trait WriteCapability: Send + Sync {
    fn buffer_write(&self, mutations: Vec<Mutation>) -> Result<(), AppError>;
}

/// 读写事务：读操作可见本事务已缓冲的写入
pub trait ReadWriteTransaction: ReadCapability + WriteCapability {
    fn as_read(&self) -> &dyn ReadCapability;

    fn as_write(&self) -> &dyn WriteCapability;
}

/// 只读事务：一致性快照
pub trait ReadOnlyTransaction: ReadCapability {
    fn as_read(&self) -> &dyn ReadCapability;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_range_bounds() {
        let r = KeyRange::Between {
            start: "b".into(),
            end: "d".into(),
        };
        assert!(!r.contains("a"));
        assert!(r.contains("b"));
        assert!(r.contains("c9"));
        assert!(!r.contains("d"));

        assert!(KeyRange::Prefix("user-".into()).contains("user-1"));
        assert!(!KeyRange::Prefix("user-".into()).contains("order-1"));
    }

    #[test]
    fn filter_matches_top_level_field() {
        let f = Filter::eq("user_id", "u-1");
        assert!(f.matches(&json!({"user_id": "u-1", "n": 1})));
        assert!(!f.matches(&json!({"user_id": "u-2"})));
        assert!(!f.matches(&json!({})));
    }

    #[test]
    fn statement_builder_defaults() {
        let st = Statement::builder().table("orders").build();
        assert_eq!(st.table, "orders");
        assert!(st.filters.is_empty());
        assert_eq!(st.limit, None);
    }
}
