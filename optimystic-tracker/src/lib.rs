//! Tracker: a copy-on-write overlay over a block source. A
//! tracker presents `get` that lazily fetches from the source and
//! overlays pending transforms, records every mutation as a transform,
//! and can be reset to hand its accumulated transforms to a caller.
//!
//! Trackers stack: a `Tracker<Tracker<S>>` isolates speculative work atop
//! another tracker by taking ownership of it, so a caller that wants to
//! try something and fold the result back in uses `into_parts` / `take`
//! on its own storage rather than aliasing the outer tracker by
//! reference (which Rust's borrow rules would forbid: the inner tracker
//! would need both a shared read and the outer's own exclusive write at
//! once).

use std::collections::BTreeSet;

use optimystic_base::{BlockId, Result};
use optimystic_store::{apply_transform, Block, FieldEdit, Transforms};

/// Anything a tracker can lazily read through. Implemented for
/// `optimystic_store::BlockStore` and for `Tracker` itself, so trackers
/// can be stacked.
pub trait BlockSource {
    fn get(&self, id: &BlockId) -> Result<Option<Block>>;
}

impl<T: optimystic_store::BlockStore + ?Sized> BlockSource for T {
    fn get(&self, id: &BlockId) -> Result<Option<Block>> {
        self.try_get(id)
    }
}

pub struct Tracker<S: BlockSource> {
    source: S,
    overlay: Transforms,
}

impl<S: BlockSource> Tracker<S> {
    pub fn new(source: S) -> Self {
        Tracker {
            source,
            overlay: Transforms::empty(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Lazily fetch from the source, then overlay any pending transform
    /// recorded for this id.
    pub fn get(&self, id: &BlockId) -> Result<Option<Block>> {
        match self.overlay.transform_for(id) {
            Some(t) => Ok(apply_transform(self.source.get(id)?, &t)),
            None => self.source.get(id),
        }
    }

    pub fn insert(&mut self, block: Block) {
        self.overlay.insert(block);
    }

    pub fn update(&mut self, id: BlockId, edits: Vec<FieldEdit>) {
        self.overlay.update(id, edits);
    }

    pub fn delete(&mut self, id: BlockId) {
        self.overlay.delete(id);
    }

    /// Hand back the accumulated transforms and empty the overlay.
    pub fn reset(&mut self) -> Transforms {
        std::mem::take(&mut self.overlay)
    }

    /// Restore a previously-taken set of transforms, discarding whatever
    /// is currently overlaid, used to roll back a failed batch.
    pub fn restore(&mut self, transforms: Transforms) {
        self.overlay = transforms;
    }

    /// Peek at the accumulated transforms without consuming them.
    pub fn peek(&self) -> &Transforms {
        &self.overlay
    }

    pub fn is_empty(&self) -> bool {
        self.overlay.is_empty()
    }

    /// The subset of `ids` that this tracker has modified, used to
    /// detect remote/local conflicts.
    pub fn conflicts(&self, ids: &BTreeSet<BlockId>) -> BTreeSet<BlockId> {
        self.overlay
            .block_ids()
            .intersection(ids)
            .cloned()
            .collect()
    }

    /// Union of block ids with any pending transform.
    pub fn transformed_block_ids(&self) -> BTreeSet<BlockId> {
        self.overlay.block_ids()
    }

    /// Apply a drained set of transforms on top of this tracker's own
    /// overlay (later transform wins on collision, same as `merge`).
    pub fn merge_from(&mut self, transforms: Transforms) {
        for (_, block) in transforms.inserts {
            self.insert(block);
        }
        for (id, edits) in transforms.updates {
            self.update(id, edits);
        }
        for id in transforms.deletes {
            self.delete(id);
        }
    }

    /// Consume this tracker, returning its source and accumulated
    /// overlay separately, used to recover a tracker that was
    /// temporarily wrapped to build a speculative child atop it.
    pub fn into_parts(self) -> (S, Transforms) {
        (self.source, self.overlay)
    }

    /// Drain this tracker's overlay into `target`'s, used when a
    /// speculative child tracker (constructed over a *different*,
    /// freshly-built source than `target`) needs its work folded into
    /// `target` instead of recovered via `into_parts`.
    pub fn commit_into(&mut self, target: &mut Tracker<impl BlockSource>) {
        let t = self.reset();
        target.merge_from(t);
    }
}

impl<S: BlockSource> BlockSource for Tracker<S> {
    fn get(&self, id: &BlockId) -> Result<Option<Block>> {
        Tracker::get(self, id)
    }
}

/// Anything that can receive handler-driven mutations during `act`.
/// Implemented for every `Tracker` so handlers don't need to know
/// which layer they're writing into.
pub trait TrackerHandle {
    fn get(&self, id: &BlockId) -> Result<Option<Block>>;
    fn insert(&mut self, block: Block);
    fn update(&mut self, id: BlockId, edits: Vec<FieldEdit>);
    fn delete(&mut self, id: BlockId);
}

impl<S: BlockSource> TrackerHandle for Tracker<S> {
    fn get(&self, id: &BlockId) -> Result<Option<Block>> {
        Tracker::get(self, id)
    }

    fn insert(&mut self, block: Block) {
        Tracker::insert(self, block)
    }

    fn update(&mut self, id: BlockId, edits: Vec<FieldEdit>) {
        Tracker::update(self, id, edits)
    }

    fn delete(&mut self, id: BlockId) {
        Tracker::delete(self, id)
    }
}
