//! Shared test harness: an in-memory multi-node mesh fixture, plus
//! literal end-to-end multi-node scenarios exercised against the real
//! crates.

pub mod mesh;

pub use mesh::Mesh;

#[cfg(test)]
mod scenarios {
    use std::collections::HashMap;
    use std::sync::Arc;

    use optimystic_admin::PartitionSensor;
    use optimystic_base::{BlockId, CollectionId, Hash32, PeerId, Revision};
    use optimystic_collection::{Collection, Handler};
    use optimystic_coordinator::{operations_hash, responsible_or_redirect, RedirectGuard};
    use optimystic_log::Action;
    use optimystic_ring::assemble_cohort;
    use optimystic_store::{Block, BlockStore, InMemoryBlockStore, Transforms};
    use optimystic_tracker::TrackerHandle;
    use optimystic_transactor::Transactor;
    use serde_json::json;

    struct InsertHandler;
    impl Handler for InsertHandler {
        fn handle(&self, action: &Action, tracker: &mut dyn TrackerHandle) -> optimystic_base::Result<()> {
            let id = BlockId::from(action.data["id"].as_str().unwrap());
            tracker.insert(Block::new(id, "XX", json!({ "v": action.data["v"] })));
            Ok(())
        }
    }

    fn insert(id: &str, v: impl Into<serde_json::Value>) -> Action {
        Action::new("insert", json!({ "id": id, "v": v.into() }))
    }

    fn handlers() -> HashMap<String, Arc<dyn Handler>> {
        let mut h: HashMap<String, Arc<dyn Handler>> = HashMap::new();
        h.insert("insert".into(), Arc::new(InsertHandler));
        h
    }

    /// S1: single-collection linear sync.
    #[test]
    fn s1_single_collection_linear_sync() {
        let store: Arc<dyn BlockStore> = Arc::new(InMemoryBlockStore::new());
        let transactor = Arc::new(Transactor::new(store.clone()));
        let c = Collection::create_or_open(transactor, store, CollectionId::from("c1"), handlers()).unwrap();

        c.act(vec![insert("x", 1)]).unwrap();
        c.sync().unwrap();

        let entries = c.select_log(true).unwrap();
        assert_eq!(entries, vec![insert("x", 1)]);
        assert_eq!(c.action_context().rev, Revision(1));
    }

    /// S2: conflict-driven replay. Two collection handles share one
    /// transactor/store (the "two nodes share c1" of the scenario is the
    /// shared committed state each handle observes); A commits first, B's
    /// concurrent sync hits a stale failure, pulls A's entry, finds no
    /// overlapping block ids, replays b1 unchanged, and lands at rev 5.
    #[test]
    fn s2_conflict_driven_replay() {
        let store: Arc<dyn BlockStore> = Arc::new(InMemoryBlockStore::new());
        let transactor = Arc::new(Transactor::new(store.clone()));
        let a = Collection::create_or_open(transactor.clone(), store.clone(), CollectionId::from("c1"), handlers())
            .unwrap();
        let b = Collection::create_or_open(transactor, store, CollectionId::from("c1"), handlers())
            .unwrap()
            .with_filter_conflict(|local, _committed| Some(local.clone()));

        for i in 0..3 {
            a.act(vec![insert(&format!("seed{i}"), i as i64)]).unwrap();
            a.sync().unwrap();
        }
        b.update().unwrap();
        assert_eq!(a.action_context().rev, Revision(3));
        assert_eq!(b.action_context().rev, Revision(3));

        a.act(vec![insert("a1", "A")]).unwrap();
        b.act(vec![insert("b1", "B")]).unwrap();

        a.sync().unwrap();
        assert_eq!(a.action_context().rev, Revision(4));

        b.sync().unwrap();
        assert_eq!(b.action_context().rev, Revision(5));

        let tail: Vec<Action> = a.select_log(true).unwrap().into_iter().skip(3).collect();
        assert_eq!(tail, vec![insert("a1", "A"), insert("b1", "B")]);
    }

    /// S3: cohort selection.
    #[test]
    fn s3_cohort_selection() {
        let peers: Vec<PeerId> = (0..10).map(|i| PeerId::from(format!("p{i}").as_str())).collect();
        let key = Hash32::from_bytes(b"blockA");

        let cohort = assemble_cohort(&key, &peers, 5);
        assert_eq!(cohort.peers.len(), 5);

        let nearest = peers
            .iter()
            .min_by_key(|p| *optimystic_ring::xor_distance(&optimystic_ring::coord_of(p), &key).as_bytes())
            .cloned()
            .unwrap();
        assert_eq!(cohort.peers[0], nearest);

        let mut unique = cohort.peers.clone();
        unique.sort_by_key(|p| p.0.clone());
        unique.dedup();
        assert_eq!(unique.len(), cohort.peers.len());

        assert_eq!(assemble_cohort(&key, &peers, 5), cohort);
    }

    /// S4: redirect loop protection.
    #[test]
    fn s4_redirect_loop_protection() {
        let self_id = PeerId::from("not-responsible");
        let others: Vec<PeerId> = (0..10).map(|i| PeerId::from(format!("p{i}").as_str())).collect();
        let key = Hash32::from_bytes(b"K");

        let redirect = responsible_or_redirect(&self_id, &others, &key, 3, |_| vec!["addr".into()]);
        assert!(redirect.is_some());

        let mut guard = RedirectGuard::new();
        guard.follow().unwrap();
        guard.follow().unwrap();
        assert!(guard.follow().is_err());
    }

    /// S5: multi-collection operations hash.
    #[test]
    fn s5_multi_collection_operations_hash() {
        let mut u = Transforms::empty();
        u.insert(Block::new(BlockId::from("b1"), "XX", json!({"v": 1})));
        let mut o = Transforms::empty();
        o.delete(BlockId::from("b2"));

        let touched = vec![(CollectionId::from("u"), u), (CollectionId::from("o"), o)];
        let h1 = operations_hash(&touched).unwrap();
        let h2 = operations_hash(&touched).unwrap();
        assert_eq!(h1, h2);
    }

    /// S6: partition signal.
    #[test]
    fn s6_partition_signal() {
        let mut sensor = PartitionSensor::new();
        let peers: Vec<PeerId> = (0..5).map(|i| PeerId::from(format!("p{i}").as_str())).collect();
        for peer in &peers {
            for _ in 0..3 {
                sensor.record_failure(peer.clone());
            }
        }
        assert!(sensor.detect_partition());

        sensor.record_goodbye(peers[0].clone());
        assert!(!sensor.detect_partition());
    }
}
