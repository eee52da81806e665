//! Entity ID assignment (§3 "Entity ID assignment"): host hook, then
//! path-derived fallback, then (for the root write only) the caller-supplied
//! root ID.

use super::types::{DataIdResolver, EntityId};
use serde_json_bytes::{ByteString, Map, Value as JsonValue};

pub fn derive_entity_id(
    object: &Map<ByteString, JsonValue>,
    data_id: &dyn DataIdResolver,
    parent: Option<(&EntityId, &str)>,
    root_id: &EntityId,
) -> EntityId {
    if let Some(id) = data_id.resolve(object) {
        return id;
    }
    if let Some((parent_id, storage_key)) = parent {
        return arcstr::format!("{parent_id}.{storage_key}");
    }
    root_id.clone()
}
