//! A small in-memory mesh of nodes, wired over `optimystic_net::mem`, for
//! integration tests that need more than one peer.

use std::collections::HashMap;
use std::sync::Arc;

use optimystic_base::{CollectionId, PeerId};
use optimystic_collection::{Collection, Handler};
use optimystic_coordinator::{handle_repo_message, CohortTransactor};
use optimystic_net::mem::{InMemoryPeerNetwork, Registry};
use optimystic_store::{BlockStore, InMemoryBlockStore};
use optimystic_transactor::Transactor;

/// `n` peers, each with its own transactor and block store, all wired to
/// answer `repo/1.0.0` for `collection_id` under `network_name`.
pub struct Mesh {
    pub network_name: String,
    pub peers: Vec<PeerId>,
    registry: Registry,
    transactors: HashMap<PeerId, Arc<Transactor>>,
}

impl Mesh {
    pub fn new(n: usize, network_name: &str, collection_id: CollectionId) -> Self {
        tracing::debug!(n, network_name, %collection_id, "wiring in-memory mesh");
        let registry = Registry::new();
        let peers: Vec<PeerId> = (0..n).map(|i| PeerId::from(format!("peer{i}").as_str())).collect();
        let mut transactors = HashMap::new();

        for peer_id in &peers {
            let store: Arc<dyn BlockStore> = Arc::new(InMemoryBlockStore::new());
            let transactor = Arc::new(Transactor::new(store));
            let network = Arc::new(registry.node(peer_id.clone()));

            let t = transactor.clone();
            let cid = collection_id.clone();
            network.register(
                &optimystic_net::namespaced(network_name, optimystic_net::REPO),
                move |_from, bytes| {
                    let message: optimystic_net::RepoMessage =
                        serde_json::from_slice(&bytes).map_err(optimystic_base::Error::new)?;
                    let results = handle_repo_message(&t, &cid, message, None);
                    serde_json::to_vec(&results).map_err(optimystic_base::Error::new)
                },
            );

            transactors.insert(peer_id.clone(), transactor);
        }

        Mesh {
            network_name: network_name.to_string(),
            peers,
            registry,
            transactors,
        }
    }

    pub fn transactor(&self, peer_id: &PeerId) -> Arc<Transactor> {
        self.transactors[peer_id].clone()
    }

    /// A `Collection` at `peer_id` that replicates every commit to
    /// `cohort_size` peers out of the whole mesh via `CohortTransactor`.
    pub fn collection(
        &self,
        peer_id: &PeerId,
        collection_id: CollectionId,
        cohort_size: usize,
        handlers: HashMap<String, Arc<dyn Handler>>,
    ) -> Collection<CohortTransactor<InMemoryPeerNetwork>> {
        let local = self.transactors[peer_id].clone();
        let network = self.registry.node(peer_id.clone());
        let cohort_transactor = Arc::new(CohortTransactor::new(
            peer_id.clone(),
            local,
            Arc::new(network),
            self.network_name.clone(),
            self.peers.clone(),
            cohort_size,
        ));
        let store: Arc<dyn BlockStore> = Arc::new(InMemoryBlockStore::new());
        Collection::create_or_open(cohort_transactor, store, collection_id, handlers).unwrap()
    }
}
