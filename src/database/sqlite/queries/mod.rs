
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool};

pub struct DocumentQueries;

impl DocumentQueries {
    /// Insert a document row. Takes any executor so it can participate in
    /// the ingestion transaction.
    #[inline]
    pub async fn create<'e, E>(executor: E, new_document: &NewDocument) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "INSERT INTO documents (id, user_id, title, raw_text, structured_json, created_date)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_document.id)
        .bind(&new_document.user_id)
        .bind(&new_document.title)
        .bind(&new_document.raw_text)
        .bind(&new_document.structured_json)
        .bind(now)
        .execute(executor)
        .await
        .context("Failed to create document")?;

        Ok(())
    }

    /// Fetch a document only when it belongs to the given user.
    #[inline]
    pub async fn get_for_user(
        pool: &SqlitePool,
        id: &str,
        user_id: &str,
    ) -> Result<Option<Document>> {
        let result = sqlx::query_as::<_, Document>(
            "SELECT id, user_id, title, raw_text, structured_json, created_date
             FROM documents WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get document")?;

        Ok(result)
    }

    #[inline]
    pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Document>> {
        let documents = sqlx::query_as::<_, Document>(
            "SELECT id, user_id, title, raw_text, structured_json, created_date
             FROM documents WHERE user_id = ? ORDER BY created_date DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list documents")?;

        Ok(documents)
    }

    /// Full-field replace of title and raw text, restricted to the owning
    /// user. Returns `None` when no row matched, which is deliberately
    /// ambiguous between "missing" and "not yours".
    #[inline]
    pub async fn update_owned(
        pool: &SqlitePool,
        id: &str,
        user_id: &str,
        update: &DocumentUpdate,
    ) -> Result<Option<Document>> {
        let result = sqlx::query(
            "UPDATE documents SET title = ?, raw_text = ? WHERE id = ? AND user_id = ?",
        )
        .bind(&update.title)
        .bind(&update.raw_text)
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update document")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Self::get_for_user(pool, id, user_id).await
    }

    /// Delete a document owned by the user. Chunk rows go with it via the
    /// cascading foreign key.
    #[inline]
    pub async fn delete_owned(pool: &SqlitePool, id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await
            .context("Failed to delete document")?;

        Ok(result.rows_affected() > 0)
    }

    #[inline]
    pub async fn delete_many_owned(
        pool: &SqlitePool,
        ids: &[String],
        user_id: &str,
    ) -> Result<u64> {
        let mut deleted = 0;
        for id in ids {
            if Self::delete_owned(pool, id, user_id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents")
            .fetch_one(pool)
            .await
            .context("Failed to count documents")?;

        Ok(count.0)
    }
}

pub struct ChunkQueries;

impl ChunkQueries {
    #[inline]
    pub async fn create<'e, E>(executor: E, chunk: &NewChunk) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "INSERT INTO chunks (id, document_id, user_id, chunk_index, content, section, keywords, vector_id, created_date)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(&chunk.user_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.content)
        .bind(&chunk.section)
        .bind(&chunk.keywords)
        .bind(&chunk.vector_id)
        .bind(now)
        .execute(executor)
        .await
        .context("Failed to create chunk")?;

        Ok(())
    }

    /// Case-insensitive substring search over chunk content, scoped to the
    /// owning user. `pattern` is a SQL LIKE pattern, e.g. `%invoice%`.
    #[inline]
    pub async fn search_content(
        pool: &SqlitePool,
        user_id: &str,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<Chunk>> {
        let chunks = sqlx::query_as::<_, Chunk>(
            "SELECT id, document_id, user_id, chunk_index, content, section, keywords, vector_id, created_date
             FROM chunks WHERE user_id = ? AND content LIKE ?
             ORDER BY created_date, chunk_index LIMIT ?",
        )
        .bind(user_id)
        .bind(pattern)
        .bind(limit as i64)
        .fetch_all(pool)
        .await
        .context("Failed to search chunks")?;

        Ok(chunks)
    }

    #[inline]
    pub async fn list_for_document(
        pool: &SqlitePool,
        document_id: &str,
        user_id: &str,
    ) -> Result<Vec<Chunk>> {
        let chunks = sqlx::query_as::<_, Chunk>(
            "SELECT id, document_id, user_id, chunk_index, content, section, keywords, vector_id, created_date
             FROM chunks WHERE document_id = ? AND user_id = ? ORDER BY chunk_index",
        )
        .bind(document_id)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list chunks for document")?;

        Ok(chunks)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chunks")
            .fetch_one(pool)
            .await
            .context("Failed to count chunks")?;

        Ok(count.0)
    }
}

pub struct QaLogQueries;

impl QaLogQueries {
    /// Append one question/answer exchange. The log is append-only; there
    /// are no update or delete queries on purpose.
    #[inline]
    pub async fn create(pool: &SqlitePool, entry: &NewQaLogEntry) -> Result<QaLogEntry> {
        let citations =
            serde_json::to_string(&entry.citations).context("Failed to encode citations")?;
        let now = Utc::now().naive_utc();

        let id = sqlx::query(
            "INSERT INTO qa_logs (user_id, question, answer, citations, created_date)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.user_id)
        .bind(&entry.question)
        .bind(&entry.answer)
        .bind(&citations)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create QA log entry")?
        .last_insert_rowid();

        let row = sqlx::query_as::<_, QaLogEntry>(
            "SELECT id, user_id, question, answer, citations, created_date
             FROM qa_logs WHERE id = ?",
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .context("Failed to retrieve created QA log entry")?;

        Ok(row)
    }

    #[inline]
    pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<QaLogEntry>> {
        let entries = sqlx::query_as::<_, QaLogEntry>(
            "SELECT id, user_id, question, answer, citations, created_date
             FROM qa_logs WHERE user_id = ? ORDER BY created_date DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list QA log entries")?;

        Ok(entries)
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM qa_logs")
            .fetch_one(pool)
            .await
            .context("Failed to count QA log entries")?;

        Ok(count.0)
    }
}

pub struct UserQueries;

impl UserQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_user: &NewUser) -> Result<User> {
        let now = Utc::now().naive_utc();
        sqlx::query("INSERT INTO users (id, email, tier, created_date) VALUES (?, ?, 'free', ?)")
            .bind(&new_user.id)
            .bind(&new_user.email)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create user")?;

        Self::get_by_id(pool, &new_user.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created user"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, tier, created_date FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user")?;

        Ok(user)
    }

    /// Set the account tier, creating the user row if the identifier has
    /// never been seen before (user identifiers come from the external
    /// auth provider, not from this table).
    #[inline]
    pub async fn set_tier(pool: &SqlitePool, user_id: &str, tier: AccountTier) -> Result<User> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "INSERT INTO users (id, email, tier, created_date) VALUES (?, NULL, ?, ?)
             ON CONFLICT(id) DO UPDATE SET tier = excluded.tier",
        )
        .bind(user_id)
        .bind(tier)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to set user tier")?;

        Self::get_by_id(pool, user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve updated user"))
    }
}

pub struct OrderQueries;

impl OrderQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_order: &NewOrder) -> Result<Order> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "INSERT INTO orders (id, user_id, order_num, product, amount, currency, status, created_date)
             VALUES (?, ?, ?, ?, ?, ?, 'pending', ?)",
        )
        .bind(&new_order.id)
        .bind(&new_order.user_id)
        .bind(&new_order.order_num)
        .bind(&new_order.product)
        .bind(new_order.amount)
        .bind(&new_order.currency)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create order")?;

        Self::get_by_order_num(pool, &new_order.order_num, &new_order.user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created order"))
    }

    #[inline]
    pub async fn get_by_order_num(
        pool: &SqlitePool,
        order_num: &str,
        user_id: &str,
    ) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT id, user_id, order_num, product, amount, currency, status, created_date
             FROM orders WHERE order_num = ? AND user_id = ?",
        )
        .bind(order_num)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get order")?;

        Ok(order)
    }

    /// Transition a pending order to paid, restricted to the owning user.
    /// Returns `None` when no pending row matched.
    #[inline]
    pub async fn mark_paid_owned(
        pool: &SqlitePool,
        order_num: &str,
        user_id: &str,
    ) -> Result<Option<Order>> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'paid'
             WHERE order_num = ? AND user_id = ? AND status = 'pending'",
        )
        .bind(order_num)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to mark order paid")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Self::get_by_order_num(pool, order_num, user_id).await
    }
}
