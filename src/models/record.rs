// Status record: latest known state of one upstream

use serde::{Deserialize, Serialize};

use super::{Payload, ServerId};

/// Upstream reachability; serializes to lowercase JSON ("online"/"offline").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Online,
    Offline,
}

/// One poll result. Serialized flat: `server`, `status`, then the payload entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub server: ServerId,
    pub status: ServerStatus,
    /// Only meaningful when `status` is online; always empty otherwise.
    #[serde(flatten)]
    pub payload: Payload,
}

impl StatusRecord {
    pub fn online(server: ServerId, payload: Payload) -> Self {
        Self {
            server,
            status: ServerStatus::Online,
            payload,
        }
    }

    pub fn offline(server: ServerId) -> Self {
        Self {
            server,
            status: ServerStatus::Offline,
            payload: Payload::new(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == ServerStatus::Online
    }
}
