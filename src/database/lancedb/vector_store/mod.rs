
use super::{ChunkMetadata, EmbeddingRecord};
use crate::WorkmemoError;
use crate::config::settings::EMBEDDING_DIMENSION;
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Vector database store using LanceDB for similarity search.
///
/// Every search is pre-filtered to one owning user; there is no
/// unscoped query surface.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_metadata: ChunkMetadata,
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Open (or create) the embeddings table under `db_path`.
    #[inline]
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, WorkmemoError> {
        let db_path = db_path.as_ref();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                WorkmemoError::Database(format!("Failed to create vector database directory: {}", e))
            })?;
        }

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| WorkmemoError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let store = Self {
            connection,
            table_name: "embeddings".to_string(),
        };
        store.initialize_table().await?;

        info!("Vector store initialized successfully");
        Ok(store)
    }

    /// Create the embeddings table if it doesn't exist yet.
    async fn initialize_table(&self) -> Result<(), WorkmemoError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| WorkmemoError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            debug!("Embeddings table already exists");
            return Ok(());
        }

        let schema = Self::create_schema();
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| WorkmemoError::Database(format!("Failed to create table: {}", e)))?;

        info!(
            "Embeddings table created with {} dimensions",
            EMBEDDING_DIMENSION
        );
        Ok(())
    }

    fn create_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    EMBEDDING_DIMENSION as i32,
                ),
                false,
            ),
            Field::new("chunk_id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("user_id", DataType::Utf8, false),
            Field::new("section", DataType::Utf8, true),
            Field::new("content", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    /// Store multiple embeddings in a batch. Every vector must have the
    /// fixed 1536 dimension; a mismatched batch is rejected as a whole.
    #[inline]
    pub async fn store_embeddings_batch(
        &mut self,
        records: Vec<EmbeddingRecord>,
    ) -> Result<(), WorkmemoError> {
        if records.is_empty() {
            debug!("No embeddings to store");
            return Ok(());
        }

        if let Some(bad) = records
            .iter()
            .find(|r| r.vector.len() != EMBEDDING_DIMENSION)
        {
            return Err(WorkmemoError::Embedding(format!(
                "Embedding for chunk {} has dimension {} (expected {})",
                bad.metadata.chunk_id,
                bad.vector.len(),
                EMBEDDING_DIMENSION
            )));
        }

        debug!("Storing batch of {} embeddings", records.len());

        let record_batch = Self::create_record_batch(&records)?;

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| WorkmemoError::Database(format!("Failed to open table: {}", e)))?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| WorkmemoError::Database(format!("Failed to insert embeddings: {}", e)))?;

        info!("Successfully stored {} embeddings", records.len());
        Ok(())
    }

    /// Create a RecordBatch from embedding records
    fn create_record_batch(records: &[EmbeddingRecord]) -> Result<RecordBatch, WorkmemoError> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut chunk_ids = Vec::with_capacity(len);
        let mut document_ids = Vec::with_capacity(len);
        let mut user_ids = Vec::with_capacity(len);
        let mut sections = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        let mut flat_values = Vec::with_capacity(len * EMBEDDING_DIMENSION);
        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            chunk_ids.push(record.metadata.chunk_id.as_str());
            document_ids.push(record.metadata.document_id.as_str());
            user_ids.push(record.metadata.user_id.as_str());
            sections.push(record.metadata.section.as_deref());
            contents.push(record.metadata.content.as_str());
            chunk_indices.push(record.metadata.chunk_index);
            created_ats.push(record.metadata.created_at.as_str());
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            EMBEDDING_DIMENSION as i32,
            Arc::new(values_array),
            None,
        )
        .map_err(|e| WorkmemoError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn arrow::array::Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(chunk_ids)),
            Arc::new(StringArray::from(document_ids)),
            Arc::new(StringArray::from(user_ids)),
            Arc::new(StringArray::from(sections)),
            Arc::new(StringArray::from(contents)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(Self::create_schema(), arrays)
            .map_err(|e| WorkmemoError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Search for the chunks nearest to `query_vector`, pre-filtered to
    /// the owning user. The user filter is mandatory: cross-tenant rows
    /// never leave this method.
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
        user_id: &str,
    ) -> Result<Vec<SearchResult>, WorkmemoError> {
        debug!("Searching for similar vectors with limit: {}", limit);

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| WorkmemoError::Database(format!("Failed to open table: {}", e)))?;

        let results = table
            .vector_search(query_vector)
            .map_err(|e| WorkmemoError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .only_if(format!("user_id = '{}'", user_id.replace('\'', "''")))
            .limit(limit)
            .execute()
            .await
            .map_err(|e| WorkmemoError::Database(format!("Failed to execute search: {}", e)))?;

        self.parse_search_results_stream(results).await
    }

    /// Parse search results from LanceDB stream into SearchResult structs
    async fn parse_search_results_stream(
        &self,
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>, WorkmemoError> {
        let mut search_results = Vec::new();

        while let Some(batch_result) = results
            .try_next()
            .await
            .map_err(|e| WorkmemoError::Database(format!("Failed to read result stream: {}", e)))?
        {
            let parsed_batch = Self::parse_search_batch(&batch_result)?;
            search_results.extend(parsed_batch);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    /// Parse a single record batch from search results
    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>, WorkmemoError> {
        let mut search_results = Vec::new();
        let num_rows = batch.num_rows();

        let chunk_ids = string_column(batch, "chunk_id")?;
        let document_ids = string_column(batch, "document_id")?;
        let user_ids = string_column(batch, "user_id")?;
        let sections = string_column(batch, "section")?;
        let contents = string_column(batch, "content")?;

        let chunk_indices = batch
            .column_by_name("chunk_index")
            .ok_or_else(|| WorkmemoError::Database("Missing chunk_index column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| WorkmemoError::Database("Invalid chunk_index column type".to_string()))?;

        let created_ats = string_column(batch, "created_at")?;

        // Distance column is only present on vector search results
        let distances = batch
            .column_by_name("_distance")
            .map(|col| col.as_any().downcast_ref::<Float32Array>());

        for row in 0..num_rows {
            let chunk_metadata = ChunkMetadata {
                chunk_id: chunk_ids.value(row).to_string(),
                document_id: document_ids.value(row).to_string(),
                user_id: user_ids.value(row).to_string(),
                section: if sections.is_null(row) {
                    None
                } else {
                    Some(sections.value(row).to_string())
                },
                content: contents.value(row).to_string(),
                chunk_index: chunk_indices.value(row),
                created_at: created_ats.value(row).to_string(),
            };

            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            let similarity_score = 1.0 - distance;

            search_results.push(SearchResult {
                chunk_metadata,
                similarity_score,
                distance,
            });
        }

        debug!("Parsed {} search results", search_results.len());
        Ok(search_results)
    }

    /// Delete all embeddings belonging to a document.
    #[inline]
    pub async fn delete_document_embeddings(
        &mut self,
        document_id: &str,
    ) -> Result<(), WorkmemoError> {
        debug!("Deleting embeddings for document: {}", document_id);

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| WorkmemoError::Database(format!("Failed to open table: {}", e)))?;

        let predicate = format!("document_id = '{}'", document_id.replace('\'', "''"));
        table.delete(&predicate).await.map_err(|e| {
            WorkmemoError::Database(format!("Failed to delete document embeddings: {}", e))
        })?;

        info!("Deleted embeddings for document: {}", document_id);
        Ok(())
    }

    /// Delete all embeddings belonging to a user.
    #[inline]
    pub async fn delete_user_embeddings(&mut self, user_id: &str) -> Result<(), WorkmemoError> {
        debug!("Deleting embeddings for user: {}", user_id);

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| WorkmemoError::Database(format!("Failed to open table: {}", e)))?;

        let predicate = format!("user_id = '{}'", user_id.replace('\'', "''"));
        table.delete(&predicate).await.map_err(|e| {
            WorkmemoError::Database(format!("Failed to delete user embeddings: {}", e))
        })?;

        Ok(())
    }

    /// Get the total number of embeddings stored
    #[inline]
    pub async fn count_embeddings(&self) -> Result<u64, WorkmemoError> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| WorkmemoError::Database(format!("Failed to open table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| WorkmemoError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}

fn string_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a StringArray, WorkmemoError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| WorkmemoError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| WorkmemoError::Database(format!("Invalid {} column type", name)))
}
