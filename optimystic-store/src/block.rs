//! Blocks: the unit of storage and replication.

use optimystic_base::{BlockId, Revision};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An opaque, typed record with a stable identifier. `type_tag` is a
/// 2-letter tag (e.g. `"TR"` for a tree root); `data` is the
/// engine-specific payload, kept as JSON since the core itself never
/// interprets block contents beyond applying transforms to them.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub type_tag: String,
    pub rev: Revision,
    pub data: Value,
}

impl Block {
    pub fn new(id: BlockId, type_tag: impl Into<String>, data: Value) -> Self {
        Block {
            id,
            type_tag: type_tag.into(),
            rev: Revision::NONE,
            data,
        }
    }

    pub fn with_rev(mut self, rev: Revision) -> Self {
        self.rev = rev;
        self
    }

    /// Fetch a named scalar/array attribute out of `data` for a field edit
    /// to target. Attributes are top-level JSON object keys.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.data.get_mut(name)
    }
}
