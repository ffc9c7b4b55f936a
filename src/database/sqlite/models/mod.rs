
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub tier: AccountTier,
    pub created_date: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AccountTier {
    Free,
    Basic,
    Pro,
}

impl std::fmt::Display for AccountTier {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            AccountTier::Free => write!(f, "free"),
            AccountTier::Basic => write!(f, "basic"),
            AccountTier::Pro => write!(f, "pro"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub raw_text: String,
    /// Free-form key/value summary produced by the language model,
    /// stored as a JSON string.
    pub structured_json: Option<String>,
    pub created_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub raw_text: String,
    pub structured_json: Option<String>,
}

/// Full-field replace of a document's user-editable content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    pub title: String,
    pub raw_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub user_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub section: Option<String>,
    /// Keyword list from the ingestion summary, stored as a JSON string.
    pub keywords: Option<String>,
    pub vector_id: String,
    pub created_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChunk {
    pub id: String,
    pub document_id: String,
    pub user_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub section: Option<String>,
    pub keywords: Option<String>,
    pub vector_id: String,
}

/// One grounding reference attached to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub idx: usize,
    pub chunk_id: String,
    pub document_id: String,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct QaLogEntry {
    pub id: i64,
    pub user_id: String,
    pub question: String,
    pub answer: String,
    /// JSON-encoded list of [`Citation`] values.
    pub citations: String,
    pub created_date: NaiveDateTime,
}

impl QaLogEntry {
    #[inline]
    pub fn citations(&self) -> Result<Vec<Citation>> {
        serde_json::from_str(&self.citations).context("Failed to decode citation list")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQaLogEntry {
    pub user_id: String,
    pub question: String,
    pub answer: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub order_num: String,
    pub product: String,
    pub amount: i64,
    pub currency: String,
    pub status: OrderStatus,
    pub created_date: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
}

impl std::fmt::Display for OrderStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Paid => write!(f, "paid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub id: String,
    pub user_id: String,
    pub order_num: String,
    pub product: String,
    pub amount: i64,
    pub currency: String,
}
