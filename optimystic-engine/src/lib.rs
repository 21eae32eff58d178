//! Engine: translates
//! an opaque statement string into per-collection actions. Represented
//! as a trait-object table keyed by `EngineId`, registered at process
//! startup; lookup is total (missing → `UnknownEngine`).

use std::collections::HashMap;
use std::sync::Arc;

use optimystic_base::{kind_err, CollectionId, EngineId, ErrorKind, Hash32, Result};
use optimystic_log::Action;
use serde_json::Value;

pub trait Engine: Send + Sync {
    fn id(&self) -> EngineId;

    /// A hash of whatever this engine considers its current schema.
    /// Compared against a transaction's `stamp.schema_hash` by the
    /// validator; engines that don't version a schema can
    /// return a constant.
    fn schema_hash(&self) -> Hash32;

    /// Translate one statement into the actions it produces, grouped by
    /// the collection each action targets.
    fn execute(&self, statement: &str) -> Result<HashMap<CollectionId, Vec<Action>>>;
}

#[derive(Default)]
pub struct EngineRegistry {
    engines: HashMap<EngineId, Arc<dyn Engine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, engine: Arc<dyn Engine>) {
        self.engines.insert(engine.id(), engine);
    }

    pub fn get(&self, id: &EngineId) -> Result<Arc<dyn Engine>> {
        self.engines
            .get(id)
            .cloned()
            .ok_or_else(|| kind_err(ErrorKind::UnknownEngine, format!("no engine registered for {}", id.0)))
    }
}

/// Reference engine: statements of the form `"put <id> <json>"` or
/// `"del <id>"`, always targeting one collection fixed at construction.
/// Exists as the engine the test harness and examples exercise; not a
/// general-purpose query language.
pub struct KvEngine {
    collection_id: CollectionId,
}

impl KvEngine {
    pub fn new(collection_id: CollectionId) -> Self {
        KvEngine { collection_id }
    }
}

impl Engine for KvEngine {
    fn id(&self) -> EngineId {
        EngineId::from("kv")
    }

    fn schema_hash(&self) -> Hash32 {
        Hash32::from_bytes(b"optimystic-kv-engine-v1")
    }

    fn execute(&self, statement: &str) -> Result<HashMap<CollectionId, Vec<Action>>> {
        let mut words = statement.splitn(3, ' ');
        let verb = words.next().unwrap_or("");
        let action = match verb {
            "put" => {
                let id = words
                    .next()
                    .ok_or_else(|| kind_err(ErrorKind::Other, "put requires an id"))?;
                let json = words
                    .next()
                    .ok_or_else(|| kind_err(ErrorKind::Other, "put requires a json payload"))?;
                let value: Value =
                    serde_json::from_str(json).map_err(|e| kind_err(ErrorKind::Other, e.to_string()))?;
                Action::new("put", serde_json::json!({ "id": id, "v": value }))
            }
            "del" => {
                let id = words
                    .next()
                    .ok_or_else(|| kind_err(ErrorKind::Other, "del requires an id"))?;
                Action::new("del", serde_json::json!({ "id": id }))
            }
            other => return Err(kind_err(ErrorKind::Other, format!("unrecognized statement verb {other}"))),
        };
        let mut out = HashMap::new();
        out.insert(self.collection_id.clone(), vec![action]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_produces_one_insert_action() {
        let engine = KvEngine::new(CollectionId::from("c1"));
        let actions = engine.execute(r#"put x {"a":1}"#).unwrap();
        let acts = &actions[&CollectionId::from("c1")];
        assert_eq!(acts.len(), 1);
        assert_eq!(acts[0].action_type, "put");
        assert_eq!(acts[0].data["id"], "x");
    }

    #[test]
    fn del_produces_one_delete_action() {
        let engine = KvEngine::new(CollectionId::from("c1"));
        let actions = engine.execute("del x").unwrap();
        assert_eq!(actions[&CollectionId::from("c1")][0].action_type, "del");
    }

    #[test]
    fn unknown_verb_is_an_error() {
        let engine = KvEngine::new(CollectionId::from("c1"));
        assert!(engine.execute("frob x").is_err());
    }

    #[test]
    fn registry_reports_unknown_engine() {
        let registry = EngineRegistry::new();
        let err = registry.get(&EngineId::from("kv")).unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::UnknownEngine);
    }

    #[test]
    fn registry_round_trips_a_registered_engine() {
        let mut registry = EngineRegistry::new();
        registry.register(Arc::new(KvEngine::new(CollectionId::from("c1"))));
        let engine = registry.get(&EngineId::from("kv")).unwrap();
        assert_eq!(engine.id(), EngineId::from("kv"));
    }
}
