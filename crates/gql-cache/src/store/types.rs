//! Data model shared by [`crate::Store::write`], [`crate::Store::read`], and
//! [`crate::Store::watch`]: entity nodes, the graph snapshot, and the projection
//! type that pairs read/written JSON data with the identity table that detects
//! stale reads (§4.B.1).

use serde_json_bytes::Value as JsonValue;
use std::collections::HashMap;

/// A stable entity identity (§3 "Entity ID assignment").
pub type EntityId = arcstr::ArcStr;

/// Shared, hash-cached JSON value. Wrapping projection data in this (rather
/// than a bare `JsonValue`) is what gives `write`'s returned projection and a
/// subsequent `read`'s projection pointer identity when they describe the same
/// snapshot (§4.B "Reference-equality short-circuit").
pub type SharedJson = gql_cache_ast::Arc<JsonValue>;

/// One segment of a path from an operation's root object into its JSON data,
/// used as the key of a [`Projection`]'s identity table.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

pub type Path = Vec<PathSegment>;

/// A field's stored value: either absent (`None` for nullable scalars is
/// represented as `JsonValue::Null` instead; this enum only exists for
/// reference-typed fields), a single reference, or a list of references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceValue {
    Single(Option<EntityId>),
    List(Vec<Option<EntityId>>),
}

/// One node in the normalized graph: the field-level storage for a single
/// entity (§3 "Entity node").
#[derive(Clone, Debug, Default)]
pub struct EntityNode {
    pub scalars: im::HashMap<String, JsonValue>,
    pub references: im::HashMap<String, ReferenceValue>,
}

/// The full graph: `entity ID -> entity node` (§3 "Graph snapshot"). `im::HashMap`
/// gives every write a cheap, structurally-shared copy rather than a deep clone.
pub type Snapshot = im::HashMap<EntityId, EntityNode>;

/// The paired (data, identity-table) projection returned by `write` and `read`,
/// and accepted as `previousData`/`initialData` (§4.B.1).
#[derive(Clone, Debug)]
pub struct Projection {
    pub data: SharedJson,
    pub identities: HashMap<Path, EntityId>,
}

impl Projection {
    pub fn null() -> Self {
        Self {
            data: SharedJson::new(JsonValue::Null),
            identities: HashMap::new(),
        }
    }

    /// Whether `self` and `other` were built from the same underlying
    /// allocation (object identity, not just deep equality).
    pub fn data_ptr_eq(&self, other: &Self) -> bool {
        self.data.ptr_eq(&other.data)
    }
}

/// Host identity hook (§6 "`getDataID`", §10.5): consulted on every write before
/// falling back to the path-derived ID.
pub trait DataIdResolver {
    fn resolve(&self, object: &serde_json_bytes::Map<serde_json_bytes::ByteString, JsonValue>) -> Option<EntityId>;
}

impl<F> DataIdResolver for F
where
    F: Fn(&serde_json_bytes::Map<serde_json_bytes::ByteString, JsonValue>) -> Option<EntityId>,
{
    fn resolve(&self, object: &serde_json_bytes::Map<serde_json_bytes::ByteString, JsonValue>) -> Option<EntityId> {
        self(object)
    }
}

/// A [`DataIdResolver`] that never supplies an ID, forcing every object onto
/// the path-derived fallback (§3, case 2). The default when a host has no
/// identity scheme.
#[derive(Default, Clone, Copy, Debug)]
pub struct NoDataId;

impl DataIdResolver for NoDataId {
    fn resolve(&self, _object: &serde_json_bytes::Map<serde_json_bytes::ByteString, JsonValue>) -> Option<EntityId> {
        None
    }
}
