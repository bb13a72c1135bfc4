use serde::{Deserialize, Serialize};

/// One side of a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallParticipant {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub audio_enabled: bool,
    pub video_enabled: bool,
}

impl CallParticipant {
    /// A participant known only by id (remote side before any track arrives)
    pub fn unknown(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            avatar: None,
            audio_enabled: false,
            video_enabled: false,
        }
    }
}
