use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One LINE conversation in the recent-chats list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentChat {
    pub line_user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
    #[serde(default)]
    pub unread_count: u32,
}

impl RecentChat {
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.line_user_id)
    }
}
