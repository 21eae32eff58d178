//! The block store: `tryGet`, `insert`, `update`, `delete`,
//! plus batch `apply`. `get` returns `None` for deleted ids; a deleted id
//! may be re-inserted later.

use std::collections::BTreeMap;
use std::sync::RwLock;

use optimystic_base::{BlockId, Result};

use crate::block::Block;
use crate::transform::{apply_to_map, FieldEdit, Transforms};

pub trait BlockStore: Send + Sync {
    fn try_get(&self, id: &BlockId) -> Result<Option<Block>>;
    fn insert(&self, block: Block) -> Result<()>;
    fn update(&self, id: &BlockId, edits: Vec<FieldEdit>) -> Result<()>;
    fn delete(&self, id: &BlockId) -> Result<()>;
    fn apply(&self, transforms: &Transforms) -> Result<()>;
}

/// The reference in-memory implementation. Clone-in / clone-out: every
/// `try_get` returns an owned copy so nothing a caller mutates can alias
/// what's stored here, and every mutation clones its input before storing
/// it.
#[derive(Default)]
pub struct InMemoryBlockStore {
    blocks: RwLock<BTreeMap<BlockId, Block>>,
}

impl InMemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlockStore for InMemoryBlockStore {
    fn try_get(&self, id: &BlockId) -> Result<Option<Block>> {
        Ok(self.blocks.read().unwrap().get(id).cloned())
    }

    fn insert(&self, block: Block) -> Result<()> {
        self.blocks.write().unwrap().insert(block.id.clone(), block);
        Ok(())
    }

    fn update(&self, id: &BlockId, edits: Vec<FieldEdit>) -> Result<()> {
        let mut t = Transforms::empty();
        t.update(id.clone(), edits);
        apply_to_map(&t, &mut self.blocks.write().unwrap());
        Ok(())
    }

    fn delete(&self, id: &BlockId) -> Result<()> {
        self.blocks.write().unwrap().remove(id);
        Ok(())
    }

    fn apply(&self, transforms: &Transforms) -> Result<()> {
        apply_to_map(transforms, &mut self.blocks.write().unwrap());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optimystic_base::Revision;
    use serde_json::json;

    #[test]
    fn get_returns_none_for_deleted_then_reinsert_works() {
        let store = InMemoryBlockStore::new();
        let id = BlockId::from("x");
        store
            .insert(Block::new(id.clone(), "XX", json!({"v": 1})).with_rev(Revision(1)))
            .unwrap();
        store.delete(&id).unwrap();
        assert!(store.try_get(&id).unwrap().is_none());
        store
            .insert(Block::new(id.clone(), "XX", json!({"v": 2})).with_rev(Revision(1)))
            .unwrap();
        assert!(store.try_get(&id).unwrap().is_some());
    }

    #[test]
    fn try_get_returns_an_owned_copy() {
        let store = InMemoryBlockStore::new();
        let id = BlockId::from("x");
        store
            .insert(Block::new(id.clone(), "XX", json!({"v": 1})).with_rev(Revision(1)))
            .unwrap();
        let mut fetched = store.try_get(&id).unwrap().unwrap();
        fetched.data = json!({"v": 999});
        assert_eq!(
            store.try_get(&id).unwrap().unwrap().data,
            json!({"v": 1})
        );
    }
}
