//! The transform algebra: pure, total operations over the
//! per-block effect of one action (`Transform`) and the grouped,
//! per-commit effect (`Transforms`).

use std::collections::{BTreeMap, BTreeSet};

use optimystic_base::{err, BlockId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::block::Block;

/// A single edit to a named array or scalar attribute of a block.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum FieldEdit {
    /// Splice `inserted` into the named array attribute at `index`,
    /// removing `delete_count` existing elements first.
    Splice {
        field: String,
        index: usize,
        delete_count: usize,
        inserted: Vec<Value>,
    },
    /// Replace the named attribute wholesale.
    Replace { field: String, value: Value },
}

impl FieldEdit {
    fn apply(&self, data: &mut Value) {
        match self {
            FieldEdit::Replace { field, value } => {
                if let Value::Object(map) = data {
                    map.insert(field.clone(), value.clone());
                }
            }
            FieldEdit::Splice {
                field,
                index,
                delete_count,
                inserted,
            } => {
                if let Value::Object(map) = data {
                    let entry = map
                        .entry(field.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(arr) = entry {
                        let end = (*index + *delete_count).min(arr.len());
                        let start = (*index).min(arr.len());
                        arr.splice(start..end, inserted.iter().cloned());
                    }
                }
            }
        }
    }
}

/// The per-block effect of one action.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Transform {
    Insert(Block),
    Updates(Vec<FieldEdit>),
    Delete,
}

/// The transactional effect of one commit, grouped by `BlockId`. Invariant:
/// a single `BlockId` appears in at most one of the three maps.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Transforms {
    pub inserts: BTreeMap<BlockId, Block>,
    pub updates: BTreeMap<BlockId, Vec<FieldEdit>>,
    pub deletes: BTreeSet<BlockId>,
}

impl Transforms {
    pub fn empty() -> Self {
        Transforms::default()
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn block_ids(&self) -> BTreeSet<BlockId> {
        let mut ids: BTreeSet<BlockId> = self.inserts.keys().cloned().collect();
        ids.extend(self.updates.keys().cloned());
        ids.extend(self.deletes.iter().cloned());
        ids
    }

    pub fn insert(&mut self, block: Block) {
        let id = block.id.clone();
        self.updates.remove(&id);
        self.deletes.remove(&id);
        self.inserts.insert(id, block);
    }

    pub fn update(&mut self, id: BlockId, edits: Vec<FieldEdit>) {
        if let Some(existing) = self.inserts.get_mut(&id) {
            // Already inserting this block in the same Transforms: apply
            // the edits straight to the pending insert rather than
            // recording a separate updates entry (keeps the one-map-per-id
            // invariant).
            for edit in &edits {
                edit.apply(&mut existing.data);
            }
            return;
        }
        self.deletes.remove(&id);
        self.updates.entry(id).or_default().extend(edits);
    }

    pub fn delete(&mut self, id: BlockId) {
        self.inserts.remove(&id);
        self.updates.remove(&id);
        self.deletes.insert(id);
    }

    /// Deep-clone every updates list. `Transforms` is `Clone`, and because
    /// every field here owns its data (`Vec`, `BTreeMap`, `BTreeSet` of
    /// owned values), `.clone()` already produces a fully independent copy
    /// with no aliased update arrays. This exists as a named entry point
    /// so callers don't have to reason about whether `.clone()` is deep
    /// enough here; it is, by construction.
    pub fn deep_clone(&self) -> Self {
        self.clone()
    }

    /// Field-wise union with `b` winning on key collision.
    pub fn merge(a: &Transforms, b: &Transforms) -> Transforms {
        let mut out = a.clone();
        for (id, block) in &b.inserts {
            out.insert(block.clone());
            let _ = id;
        }
        for (id, edits) in &b.updates {
            // b wins outright on collision: if a touched the same id,
            // b's record for it replaces a's rather than appending.
            out.inserts.remove(id);
            out.deletes.remove(id);
            out.updates.insert(id.clone(), edits.clone());
        }
        for id in &b.deletes {
            out.delete(id.clone());
        }
        out
    }

    /// Left-fold merge over a sequence of `Transforms`.
    pub fn concat<'a>(transforms: impl IntoIterator<Item = &'a Transforms>) -> Transforms {
        transforms
            .into_iter()
            .fold(Transforms::empty(), |acc, t| Transforms::merge(&acc, t))
    }

    /// The transform that targets a given block id, if any.
    pub fn transform_for(&self, id: &BlockId) -> Option<Transform> {
        if let Some(block) = self.inserts.get(id) {
            return Some(Transform::Insert(block.clone()));
        }
        if let Some(edits) = self.updates.get(id) {
            return Some(Transform::Updates(edits.clone()));
        }
        if self.deletes.contains(id) {
            return Some(Transform::Delete);
        }
        None
    }
}

/// Apply a single transform to an optional existing block. Insert
/// overrides any existing block; updates apply in order; delete yields
/// `None`. Total and pure.
pub fn apply_transform(block: Option<Block>, transform: &Transform) -> Option<Block> {
    match transform {
        Transform::Insert(new_block) => Some(new_block.clone()),
        Transform::Delete => None,
        Transform::Updates(edits) => block.map(|mut b| {
            for edit in edits {
                edit.apply(&mut b.data);
            }
            b
        }),
    }
}

/// Apply a `Transforms` batch to a store-like map. Order matters: delete
/// then insert then update, so a block id that is deleted and re-inserted
/// in the same batch ends up inserted (and then receives its updates).
pub fn apply_to_map(transforms: &Transforms, store: &mut BTreeMap<BlockId, Block>) {
    for id in &transforms.deletes {
        store.remove(id);
    }
    for (id, block) in &transforms.inserts {
        store.insert(id.clone(), block.clone());
    }
    for (id, edits) in &transforms.updates {
        if let Some(block) = store.get_mut(id) {
            for edit in edits {
                edit.apply(&mut block.data);
            }
        }
    }
}

pub fn require_single_owner(transforms: &Transforms) -> optimystic_base::Result<()> {
    for id in transforms.inserts.keys() {
        if transforms.updates.contains_key(id) || transforms.deletes.contains(id) {
            return Err(err("block id appears in more than one transform map"));
        }
    }
    for id in transforms.updates.keys() {
        if transforms.deletes.contains(id) {
            return Err(err("block id appears in more than one transform map"));
        }
    }
    Ok(())
}
