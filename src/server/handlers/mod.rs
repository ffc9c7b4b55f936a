
// JSON request handlers. Field validation happens here; everything below
// the handlers works with already-checked values.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ApiError;
use super::state::AppState;
use crate::database::sqlite::models::{Citation, Document, DocumentUpdate};
use crate::pipeline::{StructuredNote, structure_text};
use crate::{ingest, payments, qa};

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub raw_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub ok: bool,
    pub document_id: String,
    pub chunks: usize,
}

pub async fn ingest_note(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let (Some(user_id), Some(raw_text)) = (request.user_id, request.raw_text) else {
        return Err(ApiError::BadRequest("user_id & raw_text required"));
    };
    if user_id.is_empty() || raw_text.is_empty() {
        return Err(ApiError::BadRequest("user_id & raw_text required"));
    }

    let mut vector_store = state.vector_store.write().await;
    let outcome = ingest::ingest_document(
        &state.database,
        &mut vector_store,
        &state.llm,
        &state.config.chunking,
        &user_id,
        request.title.as_deref(),
        &raw_text,
    )
    .await?;

    Ok(Json(IngestResponse {
        ok: true,
        document_id: outcome.document_id,
        chunks: outcome.chunks,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub user_id: Option<String>,
    pub question: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
}

pub async fn ask_question(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let (Some(user_id), Some(question)) = (request.user_id, request.question) else {
        return Err(ApiError::BadRequest("user_id & question required"));
    };
    if user_id.is_empty() || question.is_empty() {
        return Err(ApiError::BadRequest("user_id & question required"));
    }

    let vector_store = state.vector_store.read().await;
    let answer = qa::ask(
        &state.database,
        &vector_store,
        &state.llm,
        &state.config.retrieval,
        &user_id,
        &question,
    )
    .await?;

    Ok(Json(AskResponse {
        answer: answer.answer,
        citations: answer.citations,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StructureRequest {
    pub raw_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StructureResponse {
    pub total: usize,
    pub tasks: Vec<StructuredNote>,
}

pub async fn structure_notes(
    State(state): State<AppState>,
    Json(request): Json<StructureRequest>,
) -> Result<Json<StructureResponse>, ApiError> {
    let Some(raw_text) = request.raw_text.filter(|text| !text.is_empty()) else {
        return Err(ApiError::BadRequest("raw_text required"));
    };

    let llm = state.llm.clone();
    let tasks = tokio::task::spawn_blocking(move || structure_text(&llm, &raw_text))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Structure task failed: {e}")))??;

    Ok(Json(StructureResponse {
        total: tasks.len(),
        tasks,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DocumentListQuery {
    pub user_id: Option<String>,
}

pub async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<DocumentListQuery>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let Some(user_id) = query.user_id.filter(|id| !id.is_empty()) else {
        return Err(ApiError::BadRequest("user_id required"));
    };

    let documents = ingest::list_documents(&state.database, &user_id).await?;
    debug!("Listed {} documents for user {user_id}", documents.len());
    Ok(Json(documents))
}

#[derive(Debug, Deserialize)]
pub struct DocumentUpdateRequest {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub raw_text: Option<String>,
}

pub async fn update_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Json(request): Json<DocumentUpdateRequest>,
) -> Result<Json<Document>, ApiError> {
    let (Some(user_id), Some(title), Some(raw_text)) =
        (request.user_id, request.title, request.raw_text)
    else {
        return Err(ApiError::BadRequest("user_id, title & raw_text required"));
    };
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id, title & raw_text required"));
    }

    let update = DocumentUpdate { title, raw_text };
    let document = ingest::update_document(&state.database, &user_id, &document_id, &update)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(document))
}

#[derive(Debug, Deserialize)]
pub struct DocumentDeleteRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Json(request): Json<DocumentDeleteRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    let Some(user_id) = request.user_id.filter(|id| !id.is_empty()) else {
        return Err(ApiError::BadRequest("user_id required"));
    };

    let mut vector_store = state.vector_store.write().await;
    let deleted =
        ingest::delete_document(&state.database, &mut vector_store, &user_id, &document_id)
            .await?;
    if !deleted {
        return Err(ApiError::NotFound);
    }

    Ok(Json(OkResponse { ok: true }))
}

#[derive(Debug, Deserialize)]
pub struct BatchDeleteRequest {
    pub user_id: Option<String>,
    pub ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct BatchDeleteResponse {
    pub deleted: u64,
}

pub async fn delete_documents(
    State(state): State<AppState>,
    Json(request): Json<BatchDeleteRequest>,
) -> Result<Json<BatchDeleteResponse>, ApiError> {
    let (Some(user_id), Some(ids)) = (request.user_id, request.ids) else {
        return Err(ApiError::BadRequest("user_id & ids required"));
    };
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("user_id & ids required"));
    }

    let mut vector_store = state.vector_store.write().await;
    let deleted =
        ingest::delete_documents(&state.database, &mut vector_store, &user_id, &ids).await?;

    Ok(Json(BatchDeleteResponse { deleted }))
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
    pub order_num: String,
}

pub async fn start_checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let Some(user_id) = request.user_id.filter(|id| !id.is_empty()) else {
        return Err(ApiError::BadRequest("user_id required"));
    };

    let checkout = payments::start_checkout(
        &state.database,
        &state.payments,
        &state.config.payments,
        &user_id,
    )
    .await?;

    Ok(Json(CheckoutResponse {
        url: checkout.url,
        order_num: checkout.order_num,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PaymentCompleteRequest {
    pub user_id: Option<String>,
    pub order_num: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentCompleteResponse {
    pub ok: bool,
    pub tier: String,
}

pub async fn complete_payment(
    State(state): State<AppState>,
    Json(request): Json<PaymentCompleteRequest>,
) -> Result<Json<PaymentCompleteResponse>, ApiError> {
    let (Some(user_id), Some(order_num)) = (request.user_id, request.order_num) else {
        return Err(ApiError::BadRequest("user_id & order_num required"));
    };
    if user_id.is_empty() || order_num.is_empty() {
        return Err(ApiError::BadRequest("user_id & order_num required"));
    }

    let (_, user) = payments::complete_payment(&state.database, &user_id, &order_num)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(PaymentCompleteResponse {
        ok: true,
        tier: user.tier.to_string(),
    }))
}
