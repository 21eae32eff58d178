//! Minimal illustration of wiring one node end to end: open a collection,
//! register the reference engine, run a session, commit it.

use std::collections::HashMap;
use std::sync::Arc;

use optimystic::{
    init_tracing, Block, BlockId, CollectionId, Config, EngineId, Handler, KvEngine, Node, PeerId,
    Result,
};
use optimystic_log::Action;
use optimystic_store::FieldEdit;
use optimystic_tracker::TrackerHandle;
use serde_json::json;

struct KvHandler;

impl Handler for KvHandler {
    fn handle(&self, action: &Action, tracker: &mut dyn TrackerHandle) -> Result<()> {
        let id = BlockId::from(action.data["id"].as_str().unwrap());
        match action.action_type.as_str() {
            "put" => match tracker.get(&id)? {
                Some(_) => tracker.update(
                    id,
                    vec![FieldEdit::Replace {
                        field: "v".into(),
                        value: action.data["v"].clone(),
                    }],
                ),
                None => tracker.insert(Block::new(id, "KV", json!({"v": action.data["v"]}))),
            },
            "del" => tracker.delete(id),
            other => return Err(optimystic_base::err(format!("unhandled action type {other}"))),
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    init_tracing();

    let collection_id = CollectionId::from("demo");
    let mut node = Node::new(PeerId::from("demo-node"), Config::default());
    node.register_engine(Arc::new(KvEngine::new(collection_id.clone())));

    let mut handlers: HashMap<String, Arc<dyn Handler>> = HashMap::new();
    handlers.insert("put".into(), Arc::new(KvHandler));
    handlers.insert("del".into(), Arc::new(KvHandler));
    node.open_collection(collection_id, handlers)?;

    let session = node.begin_session(&EngineId::from("kv"))?;
    session.execute(r#"put greeting {"text":"hello"}"#)?;
    let outcome = session.commit()?;

    match outcome {
        Some(outcome) => tracing::info!(
            coordinator = %outcome.coordinator_id,
            hash = %outcome.operations_hash.to_hex(),
            "committed"
        ),
        None => tracing::info!("nothing to commit"),
    }

    Ok(())
}
