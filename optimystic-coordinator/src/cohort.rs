//! Cohort orchestration and the `repo/1.0.0` wire dispatcher. [`CohortTransactor`] is the network-backed
//! [`optimystic_collection::CollectionTransactor`]: it fans a commit out
//! to every replica in the collection's cohort and only reports success
//! once all of them have pended and committed. [`handle_repo_message`] is
//! the matching server side, run by each replica against its own
//! [`optimystic_transactor::Transactor`].

use std::sync::Arc;

use optimystic_base::{kind_err, ActionId, BlockId, CollectionId, ErrorKind, Hash32, PeerId, Result, Revision, Transaction};
use optimystic_collection::{CollectionTransactor, TransactOutcome};
use optimystic_net::{
    request_json, CommitRequest, CommitResult, GetResult, Operation, PeerNetwork, PendPolicy,
    PendRequest, RepoMessage,
};
use optimystic_ring::assemble_cohort;
use optimystic_store::{Block, Transforms};
use optimystic_transactor::{handle_commit, handle_pend_validated, PendValidationHook, Transactor};
use serde::{Deserialize, Serialize};

/// One reply per operation in an inbound [`RepoMessage`], in the same
/// order as `message.operations`.
#[derive(Serialize, Deserialize)]
pub enum OperationResult {
    Get(GetResult),
    Pend(optimystic_net::PendResult),
    Cancel,
    Commit(CommitResult),
}

/// Server side of the `repo/1.0.0` sub-protocol: dispatch every operation
/// in the batch against this replica's transactor. `validator`, when
/// present, re-executes and hash-checks any pend that carries a claimed
/// `Transaction`/`operationsHash` before it's admitted.
pub fn handle_repo_message(
    transactor: &Transactor,
    collection_id: &CollectionId,
    message: RepoMessage,
    validator: Option<&dyn PendValidationHook>,
) -> Vec<OperationResult> {
    message
        .operations
        .into_iter()
        .map(|op| match op {
            Operation::Get { block_id } => OperationResult::Get(GetResult {
                block: transactor.get(&block_id).ok().flatten(),
                block_id,
            }),
            Operation::Pend(request) => {
                OperationResult::Pend(handle_pend_validated(transactor, *request, validator))
            }
            Operation::Cancel { action_id } => {
                transactor.cancel(&action_id);
                OperationResult::Cancel
            }
            Operation::Commit(request) => OperationResult::Commit(handle_commit(
                transactor,
                collection_id,
                request.action_id.clone(),
                request.rev,
            )),
        })
        .collect()
}

/// Replicates a commit across a collection's cohort. The
/// cohort is determined once per commit from the collection id itself
/// (the collection's own key in the ring), since this transactor always
/// pends/commits a whole collection's batch atomically rather than
/// per-block.
pub struct CohortTransactor<N: PeerNetwork> {
    self_id: PeerId,
    local: Arc<Transactor>,
    network: Arc<N>,
    network_name: String,
    known_peers: Vec<PeerId>,
    cohort_size: usize,
}

impl<N: PeerNetwork> CohortTransactor<N> {
    pub fn new(
        self_id: PeerId,
        local: Arc<Transactor>,
        network: Arc<N>,
        network_name: impl Into<String>,
        known_peers: Vec<PeerId>,
        cohort_size: usize,
    ) -> Self {
        CohortTransactor {
            self_id,
            local,
            network,
            network_name: network_name.into(),
            known_peers,
            cohort_size,
        }
    }

    fn protocol(&self) -> String {
        optimystic_net::namespaced(&self.network_name, optimystic_net::REPO)
    }

    fn send_pend(&self, peer: &PeerId, request: PendRequest) -> Result<optimystic_net::PendResult> {
        let message = RepoMessage {
            operations: vec![Operation::Pend(Box::new(request))],
            expiration: None,
            coordinating_block_ids: None,
        };
        let mut stream = self.network.connect(peer, &self.protocol())?;
        let results: Vec<OperationResult> = request_json(&mut *stream, &message)?;
        match results.into_iter().next() {
            Some(OperationResult::Pend(result)) => Ok(result),
            _ => Err(kind_err(ErrorKind::Other, "malformed repo response to pend")),
        }
    }

    fn send_commit(&self, peer: &PeerId, request: CommitRequest) -> Result<CommitResult> {
        let message = RepoMessage {
            operations: vec![Operation::Commit(Box::new(request))],
            expiration: None,
            coordinating_block_ids: None,
        };
        let mut stream = self.network.connect(peer, &self.protocol())?;
        let results: Vec<OperationResult> = request_json(&mut *stream, &message)?;
        match results.into_iter().next() {
            Some(OperationResult::Commit(result)) => Ok(result),
            _ => Err(kind_err(ErrorKind::Other, "malformed repo response to commit")),
        }
    }

    fn send_cancel(&self, peer: &PeerId, action_id: ActionId) {
        let message = RepoMessage {
            operations: vec![Operation::Cancel { action_id }],
            expiration: None,
            coordinating_block_ids: None,
        };
        if let Ok(mut stream) = self.network.connect(peer, &self.protocol()) {
            let _: Result<Vec<OperationResult>> = request_json(&mut *stream, &message);
        }
    }

    fn cohort_for(&self, collection_id: &CollectionId) -> Vec<PeerId> {
        let key = optimystic_base::Hash32::from_bytes(&collection_id.0);
        assemble_cohort(&key, &self.known_peers, self.cohort_size).peers
    }
}

impl<N: PeerNetwork> CollectionTransactor for CohortTransactor<N> {
    fn get(&self, _collection_id: &CollectionId, id: &BlockId) -> Result<Option<Block>> {
        self.local.get(id)
    }

    fn transact(
        &self,
        collection_id: &CollectionId,
        transforms: &Transforms,
        action_id: ActionId,
        new_rev: Revision,
        tail_block_id: BlockId,
        transaction: Option<&Transaction>,
        operations_hash: Option<&Hash32>,
    ) -> Result<TransactOutcome> {
        let cohort = self.cohort_for(collection_id);
        let block_ids = transforms.block_ids();

        let mut acked_pend = Vec::new();
        for peer in &cohort {
            let outcome = if *peer == self.self_id {
                self.local
                    .pend(action_id.clone(), transforms.clone(), PendPolicy::Force)
                    .map(|outcome| matches!(outcome, optimystic_transactor::PendOutcome::Accepted { .. }))
            } else {
                let request = PendRequest {
                    action_id: action_id.clone(),
                    rev: Some(new_rev),
                    transforms: transforms.clone(),
                    policy: PendPolicy::Force,
                    transaction: transaction.cloned(),
                    operations_hash: operations_hash.cloned(),
                    supercluster_nominees: None,
                };
                self.send_pend(peer, request).map(|r| r.success)
            };
            match outcome {
                Ok(true) => acked_pend.push(peer.clone()),
                _ => {
                    for acked in &acked_pend {
                        if *acked == self.self_id {
                            self.local.cancel(&action_id);
                        } else {
                            self.send_cancel(acked, action_id.clone());
                        }
                    }
                    return Ok(TransactOutcome::StaleFailure {
                        pendings_on_blocks: block_ids,
                    });
                }
            }
        }

        let mut acked_commit = Vec::new();
        for peer in &cohort {
            let outcome = if *peer == self.self_id {
                self.local.commit(collection_id, action_id.clone(), new_rev)
                    .map(|o| matches!(o, optimystic_transactor::CommitOutcome::Success))
            } else {
                let request = CommitRequest {
                    action_id: action_id.clone(),
                    block_ids: block_ids.clone(),
                    header_id: None,
                    tail_id: tail_block_id.clone(),
                    rev: new_rev,
                };
                self.send_commit(peer, request).map(|r| r.success)
            };
            match outcome {
                Ok(true) => acked_commit.push(peer.clone()),
                _ => {
                    return Err(kind_err(
                        ErrorKind::PartialCommit,
                        format!(
                            "{} of {} replicas committed before a failure",
                            acked_commit.len(),
                            cohort.len()
                        ),
                    ));
                }
            }
        }

        Ok(TransactOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optimystic_net::mem::Registry;
    use optimystic_store::InMemoryBlockStore;
    use serde_json::json;

    fn wire_replica(registry: &Registry, network_name: &str, peer_id: PeerId) -> Arc<Transactor> {
        let transactor = Arc::new(Transactor::new(Arc::new(InMemoryBlockStore::new())));
        let node = registry.node(peer_id.clone());
        let collection_id = CollectionId::from("c1");
        let t = transactor.clone();
        node.register(
            &optimystic_net::namespaced(network_name, optimystic_net::REPO),
            move |_from, bytes| {
                let message: RepoMessage = serde_json::from_slice(&bytes).map_err(optimystic_base::Error::new)?;
                let results = handle_repo_message(&t, &collection_id, message, None);
                serde_json::to_vec(&results).map_err(optimystic_base::Error::new)
            },
        );
        transactor
    }

    #[test]
    fn transact_replicates_to_every_cohort_member() {
        let registry = Registry::new();
        let peers: Vec<PeerId> = (0..3).map(|i| PeerId::from(format!("p{i}").as_str())).collect();
        let remotes: Vec<Arc<Transactor>> = peers
            .iter()
            .skip(1)
            .map(|p| wire_replica(&registry, "default", p.clone()))
            .collect();

        let self_id = peers[0].clone();
        let local = Arc::new(Transactor::new(Arc::new(InMemoryBlockStore::new())));
        let network = Arc::new(registry.node(self_id.clone()));
        let cohort_transactor = CohortTransactor::new(
            self_id,
            local.clone(),
            network,
            "default",
            peers.clone(),
            3,
        );

        let mut transforms = Transforms::empty();
        transforms.insert(Block::new(BlockId::from("x"), "KV", json!({"v": 1})));
        let action_id = ActionId::new_random();
        let outcome = cohort_transactor
            .transact(
                &CollectionId::from("c1"),
                &transforms,
                action_id,
                Revision(1),
                BlockId::from("tail"),
                None,
                None,
            )
            .unwrap();
        assert!(matches!(outcome, TransactOutcome::Success));
        assert!(local.get(&BlockId::from("x")).unwrap().is_some());
        for remote in &remotes {
            assert!(remote.get(&BlockId::from("x")).unwrap().is_some());
        }
    }

    #[test]
    fn validated_pend_is_rejected_when_the_claimed_hash_does_not_match() {
        use crate::validator::Validator;
        use optimystic_base::{EngineId, Hash32, Timestamp, Transaction, TransactionStamp};
        use optimystic_collection::Handler;
        use optimystic_engine::{Engine, EngineRegistry, KvEngine};
        use optimystic_store::BlockStore;
        use optimystic_tracker::TrackerHandle;
        use std::collections::HashMap;

        struct PutHandler;
        impl Handler for PutHandler {
            fn handle(&self, action: &optimystic_log::Action, tracker: &mut dyn TrackerHandle) -> Result<()> {
                let id = BlockId::from(action.data["id"].as_str().unwrap());
                tracker.insert(Block::new(id, "KV", json!({"v": action.data["v"]})));
                Ok(())
            }
        }

        let store: Arc<dyn BlockStore> = Arc::new(InMemoryBlockStore::new());
        let transactor = Arc::new(Transactor::new(store.clone()));
        let engine = Arc::new(KvEngine::new(CollectionId::from("c1")));
        let mut registry = EngineRegistry::new();
        registry.register(engine.clone());
        let mut handlers: HashMap<String, Arc<dyn Handler>> = HashMap::new();
        handlers.insert("put".into(), Arc::new(PutHandler));
        let mut by_collection = HashMap::new();
        by_collection.insert(CollectionId::from("c1"), handlers);
        let validator = Validator::new(transactor.clone(), store, Arc::new(registry), by_collection);

        let stamp = TransactionStamp::new(PeerId::from("p1"), Timestamp(1), engine.schema_hash(), EngineId::from("kv"));
        let statements = vec!["put x {\"v\":1}".to_string()];
        let transaction = Transaction::new(stamp, statements, vec![]);

        let mut transforms = Transforms::empty();
        transforms.insert(Block::new(BlockId::from("x"), "KV", json!({"v": 1})));
        let request = PendRequest {
            action_id: ActionId::new_random(),
            rev: Some(Revision(1)),
            transforms,
            policy: PendPolicy::Force,
            transaction: Some(transaction),
            operations_hash: Some(Hash32::from_bytes(b"not the right hash")),
            supercluster_nominees: None,
        };
        let message = RepoMessage {
            operations: vec![Operation::Pend(Box::new(request))],
            expiration: None,
            coordinating_block_ids: None,
        };
        let results = handle_repo_message(&transactor, &CollectionId::from("c1"), message, Some(&validator));
        match results.into_iter().next() {
            Some(OperationResult::Pend(result)) => assert!(!result.success),
            _ => panic!("expected a pend result"),
        }
        assert!(transactor.get(&BlockId::from("x")).unwrap().is_none());
    }
}
