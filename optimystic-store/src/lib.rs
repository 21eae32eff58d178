mod block;
mod store;
mod transform;

pub use block::Block;
pub use store::{BlockStore, InMemoryBlockStore};
pub use transform::{
    apply_to_map, apply_transform, require_single_owner, FieldEdit, Transform, Transforms,
};
