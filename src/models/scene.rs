use serde::{Deserialize, Serialize};

const DEFAULT_SCENE_DURATION_MS: u64 = 10_000;

/// One entry in the rotation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SceneDescriptor {
    pub id: String,
    pub duration_ms: u64,
}

impl SceneDescriptor {
    pub fn new(id: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            id: id.into(),
            duration_ms,
        }
    }
}

/// Scene row as served by `GET /v1/scenes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SceneRecord {
    pub id: String,
    /// Display time in milliseconds.
    pub duration: u64,
    #[serde(default)]
    pub order: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Rotation shown until the remote configuration resolves.
pub fn default_rotation() -> Vec<SceneDescriptor> {
    ["overview", "merchants", "wifi"]
        .into_iter()
        .map(|id| SceneDescriptor::new(id, DEFAULT_SCENE_DURATION_MS))
        .collect()
}

/// Builds the rotation from remote records: disabled and zero-length scenes
/// are dropped, the rest ordered by `order` with ties kept in arrival order.
pub fn rotation_from_records(records: Vec<SceneRecord>) -> Vec<SceneDescriptor> {
    let mut enabled: Vec<SceneRecord> = records
        .into_iter()
        .filter(|record| record.enabled && record.duration > 0)
        .collect();
    // sort_by_key is stable
    enabled.sort_by_key(|record| record.order);

    enabled
        .into_iter()
        .map(|record| SceneDescriptor::new(record.id, record.duration))
        .collect()
}
