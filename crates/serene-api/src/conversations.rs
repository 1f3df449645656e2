use axum::{
    Extension, Json,
    extract::State,
};

use serene_types::api::{ConversationListResponse, ConversationSummary};

use crate::auth::{AppState, run_blocking};
use crate::error::ApiError;
use crate::extract::Params;
use crate::messages::LimitQuery;
use crate::middleware::Principal;
use crate::time::display_timestamp;

/// Conversations the caller participates in, most recently active first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Params(query): Params<LimitQuery>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ConversationListResponse>, ApiError> {
    let limit = query.limit;

    let rows = run_blocking(&state, move |db| {
        Ok(db.list_conversations_for(&principal.email, limit)?)
    })
    .await?;

    let conversations = rows
        .into_iter()
        .map(|row| ConversationSummary {
            last_message_at: display_timestamp(&row.last_message_at),
            conversation_id: row.id,
            participants: row.participants,
            last_message: row.last_message,
        })
        .collect();

    Ok(Json(ConversationListResponse { conversations }))
}
