//! Top-level library: wires the subsystem crates into one runnable node.
//! Not assumed to be the only consumer of the stack underneath it, see
//! `bin.rs` for a minimal illustration, not the canonical way to use it.

use std::collections::HashMap;
use std::sync::Arc;

pub use optimystic_admin::{init_tracing, Config, PartitionSensor};
pub use optimystic_base::{BlockId, CollectionId, EngineId, PeerId, Result};
pub use optimystic_collection::{Collection, Handler};
pub use optimystic_coordinator::{CommitOutcome, Session};
pub use optimystic_engine::{Engine, EngineRegistry, KvEngine};
pub use optimystic_net::{PeerNetwork, Stream};
pub use optimystic_ring::{assemble_cohort, responsibility_for};
pub use optimystic_store::{Block, BlockStore, InMemoryBlockStore};
pub use optimystic_transactor::Transactor;

/// One peer's local state: a transactor, the collections it currently
/// hosts, and the engines available to sessions opened against them.
pub struct Node {
    pub peer_id: PeerId,
    pub config: Config,
    transactor: Arc<Transactor>,
    store: Arc<dyn BlockStore>,
    collections: HashMap<CollectionId, Arc<Collection<Transactor>>>,
    engines: EngineRegistry,
}

impl Node {
    pub fn new(peer_id: PeerId, config: Config) -> Self {
        let store: Arc<dyn BlockStore> = Arc::new(InMemoryBlockStore::new());
        let transactor = Arc::new(Transactor::new(store.clone()));
        Node {
            peer_id,
            config,
            transactor,
            store,
            collections: HashMap::new(),
            engines: EngineRegistry::new(),
        }
    }

    pub fn register_engine(&mut self, engine: Arc<dyn Engine>) {
        self.engines.register(engine);
    }

    pub fn open_collection(
        &mut self,
        id: CollectionId,
        handlers: HashMap<String, Arc<dyn Handler>>,
    ) -> Result<Arc<Collection<Transactor>>> {
        let collection = Arc::new(Collection::create_or_open(
            self.transactor.clone(),
            self.store.clone(),
            id.clone(),
            handlers,
        )?);
        self.collections.insert(id, collection.clone());
        Ok(collection)
    }

    /// Begin a session scoped to this node's currently open collections,
    /// against `engine_id`.
    pub fn begin_session(&self, engine_id: &EngineId) -> Result<Session<Transactor>> {
        let engine = self.engines.get(engine_id)?;
        Ok(Session::begin(self.peer_id.clone(), engine, self.collections.clone()))
    }
}
