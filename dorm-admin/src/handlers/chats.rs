use askama::Template;
use axum::{extract::State, response::IntoResponse};
use chrono::Local;

use crate::models::Capability;
use crate::session::SessionContext;
use crate::AppState;

pub struct ChatRow {
    pub name: String,
    pub last_message: String,
    pub at: String,
    pub unread: u32,
}

#[derive(Template)]
#[template(path = "partials/chats.html")]
pub struct ChatsFragment {
    pub chats: Vec<ChatRow>,
    pub refreshed_at: Option<String>,
    pub error: Option<String>,
    pub enabled: bool,
}

/// Served from the periodic refresh cache; never calls the backend itself.
pub async fn recent_chats_fragment(
    State(state): State<AppState>,
    ctx: SessionContext,
) -> impl IntoResponse {
    let allowed = ctx.profile().is_some_and(|p| p.can(Capability::Chat));
    let Some(refresh) = state.recent_chats.as_ref().filter(|_| allowed) else {
        return ChatsFragment {
            chats: Vec::new(),
            refreshed_at: None,
            error: None,
            enabled: false,
        };
    };

    let snapshot = refresh.snapshot();
    let chats = snapshot
        .value
        .unwrap_or_default()
        .into_iter()
        .map(|chat| ChatRow {
            name: chat.name().to_string(),
            at: chat
                .last_message_at
                .with_timezone(&Local)
                .format("%d/%m %H:%M")
                .to_string(),
            last_message: chat.last_message,
            unread: chat.unread_count,
        })
        .collect();

    ChatsFragment {
        chats,
        refreshed_at: snapshot
            .refreshed_at
            .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string()),
        error: snapshot.last_error.map(|_| "Chat list is out of date".to_string()),
        enabled: true,
    }
}
