use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use serene_types::api::{MessageResponse, SendMessageRequest, SendMessageResponse};

use crate::auth::{AppState, run_blocking};
use crate::error::ApiError;
use crate::extract::{JsonBody, Params};
use crate::middleware::Principal;
use crate::time::display_timestamp;

pub const DEFAULT_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

pub(crate) fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// Without a conversation id this opens a new direct conversation with
/// `recipient`; with one it appends to that conversation. Either way the
/// conversation summary and the message are written in one transaction.
///
/// The sender must already be a participant to append to an existing
/// conversation, matching the check on the read path.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    JsonBody(req): JsonBody<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::validation("text must not be empty"));
    }

    let conversation_id = req.conversation_id.filter(|id| !id.trim().is_empty());
    let recipient = req.recipient.filter(|r| !r.trim().is_empty());
    let message_id = Uuid::new_v4().to_string();
    let sender = principal.email;
    let text = req.text;

    let conversation_id = match conversation_id {
        None => {
            let recipient = recipient
                .ok_or_else(|| ApiError::validation("recipient required to create conversation"))?;
            let cid = Uuid::new_v4().to_string();

            let (c, m, s) = (cid.clone(), message_id.clone(), sender.clone());
            run_blocking(&state, move |db| {
                db.create_conversation(&c, &[s.as_str(), recipient.as_str()], &m, &s, &text)?;
                Ok(())
            })
            .await?;

            info!("{} opened conversation {}", sender, cid);
            cid
        }
        Some(cid) => {
            let (c, m, s) = (cid.clone(), message_id.clone(), sender.clone());
            run_blocking(&state, move |db| {
                let conversation = db
                    .get_conversation(&c)?
                    .ok_or(ApiError::NotFound("Conversation"))?;
                if !conversation.has_participant(&s) {
                    return Err(ApiError::Forbidden);
                }

                db.append_message(&c, &m, &s, &text)?
                    .ok_or(ApiError::NotFound("Conversation"))?;
                Ok(())
            })
            .await?;

            cid
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            ok: true,
            conversation_id,
            message_id,
        }),
    ))
}

/// The newest `limit` messages of a conversation, oldest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Params(query): Params<LimitQuery>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let limit = query.limit;

    let rows = run_blocking(&state, move |db| {
        let conversation = db
            .get_conversation(&conversation_id)?
            .ok_or(ApiError::NotFound("Conversation"))?;
        if !conversation.has_participant(&principal.email) {
            return Err(ApiError::Forbidden);
        }

        Ok(db.get_recent_messages(&conversation_id, limit)?)
    })
    .await?;

    let messages = rows
        .into_iter()
        .map(|row| MessageResponse {
            sent_at: display_timestamp(&row.sent_at),
            sender: row.sender,
            text: row.text,
        })
        .collect();

    Ok(Json(messages))
}
