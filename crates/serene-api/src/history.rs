use axum::{
    Extension,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::auth::AppState;
use crate::conversations::list_conversations;
use crate::error::ApiError;
use crate::extract::Params;
use crate::messages::{LimitQuery, default_limit, get_messages};
use crate::middleware::Principal;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub conversation_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

/// `GET /chat/history`: a conversation's messages when `conversationId` is
/// given, the caller's conversation list otherwise.
pub async fn history(
    State(state): State<AppState>,
    Params(query): Params<HistoryQuery>,
    Extension(principal): Extension<Principal>,
) -> Result<Response, ApiError> {
    let limit = Params(LimitQuery { limit: query.limit });

    match query.conversation_id.filter(|id| !id.is_empty()) {
        Some(id) => get_messages(State(state), Path(id), limit, Extension(principal))
            .await
            .map(IntoResponse::into_response),
        None => list_conversations(State(state), limit, Extension(principal))
            .await
            .map(IntoResponse::into_response),
    }
}
