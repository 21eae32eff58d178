//! The canonical operations projection: every touched
//! collection's `Transforms` reduced to a deterministically ordered list
//! of `insert`/`update`/`delete` operations, hashed identically by the
//! coordinator (at commit) and the validator (at re-execution).

use optimystic_base::{BlockId, CollectionId, Hash32, Result};
use optimystic_store::{Block, FieldEdit, Transforms};
use serde::Serialize;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Operation {
    Insert {
        collection_id: CollectionId,
        block_id: BlockId,
        block: Block,
    },
    Update {
        collection_id: CollectionId,
        block_id: BlockId,
        edits: Vec<FieldEdit>,
    },
    Delete {
        collection_id: CollectionId,
        block_id: BlockId,
    },
}

/// Project `(collectionId, Transforms)` pairs into the canonical
/// Operations list, sorted by `(collectionId, blockId, variant tag)`, and
/// hash its canonical JSON serialization.
pub fn operations_hash(touched: &[(CollectionId, Transforms)]) -> Result<Hash32> {
    let mut ops = Vec::new();
    for (collection_id, transforms) in touched {
        for (block_id, block) in &transforms.inserts {
            ops.push(Operation::Insert {
                collection_id: collection_id.clone(),
                block_id: block_id.clone(),
                block: block.clone(),
            });
        }
        for (block_id, edits) in &transforms.updates {
            ops.push(Operation::Update {
                collection_id: collection_id.clone(),
                block_id: block_id.clone(),
                edits: edits.clone(),
            });
        }
        for block_id in &transforms.deletes {
            ops.push(Operation::Delete {
                collection_id: collection_id.clone(),
                block_id: block_id.clone(),
            });
        }
    }
    ops.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    Hash32::from_canonical_json(&ops)
}

/// `(collectionId bytes, blockId bytes, variant tag)`: sorted by
/// collectionId then blockId then variant tag.
fn sort_key(op: &Operation) -> (Vec<u8>, Vec<u8>, u8) {
    match op {
        Operation::Insert { collection_id, block_id, .. } => {
            (collection_id.0.clone(), block_id.0.clone(), 0)
        }
        Operation::Update { collection_id, block_id, .. } => {
            (collection_id.0.clone(), block_id.0.clone(), 1)
        }
        Operation::Delete { collection_id, block_id, .. } => {
            (collection_id.0.clone(), block_id.0.clone(), 2)
        }
    }
}
