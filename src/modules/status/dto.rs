use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::modules::transcode::progress::ProgressSnapshot;

/// Reply to `get_status`. The encode rate stays internal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusReply {
    pub frames_processed: u64,
    pub total_frames: u64,
}

impl From<ProgressSnapshot> for StatusReply {
    fn from(snapshot: ProgressSnapshot) -> Self {
        Self {
            frames_processed: snapshot.frames_processed,
            total_frames: snapshot.total_frames,
        }
    }
}
