//! Collection log: the append-only log of committed actions
//! that backs one collection. Entries are themselves blocks in the
//! collection's block store; the log has no storage of its own.

mod action;

pub use action::Action;

use std::collections::BTreeSet;
use std::sync::Arc;

use optimystic_base::{err, kind_err, ActionContext, ActionId, ActionRev, BlockId, CollectionId, ErrorKind, Result, Revision};
use optimystic_store::{Block, BlockStore};
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    pub action_id: ActionId,
    pub rev: Revision,
    pub actions: Vec<Action>,
    pub block_ids: BTreeSet<BlockId>,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
struct LogHeader {
    collection_id: CollectionId,
    tail_rev: Revision,
}

pub struct AddActionsResult {
    pub tail_path: BlockId,
    pub entry: LogEntry,
}

/// One entry block per revision, at a deterministic id derived from the
/// collection id and revision; the log doesn't need a separate index
/// structure, the block store's keyspace is the index.
fn entry_block_id(collection_id: &CollectionId, rev: Revision) -> BlockId {
    BlockId(format!("{}/log/{}", collection_id, rev.0).into_bytes())
}

pub struct CollectionLog {
    store: Arc<dyn BlockStore>,
    collection_id: CollectionId,
}

impl CollectionLog {
    /// Open an existing log, or create-and-open an empty one if the
    /// header block is absent.
    pub fn create_or_open(
        store: Arc<dyn BlockStore>,
        collection_id: CollectionId,
    ) -> Result<(Self, ActionContext)> {
        let header_id = collection_id.header_block_id();
        let context = match store.try_get(&header_id)? {
            Some(block) => {
                let header: LogHeader = serde_json::from_value(block.data.clone())
                    .map_err(|e| kind_err(ErrorKind::Other, e.to_string()))?;
                ActionContext {
                    committed: Vec::new(),
                    rev: header.tail_rev,
                }
            }
            None => {
                let header = LogHeader {
                    collection_id: collection_id.clone(),
                    tail_rev: Revision::NONE,
                };
                let data = serde_json::to_value(&header).map_err(optimystic_base::Error::new)?;
                store.insert(Block::new(header_id, "CL", data))?;
                ActionContext::latest()
            }
        };
        Ok((
            CollectionLog {
                store,
                collection_id,
            },
            context,
        ))
    }

    fn header(&self) -> Result<LogHeader> {
        let header_id = self.collection_id.header_block_id();
        let block = self
            .store
            .try_get(&header_id)?
            .ok_or_else(|| kind_err(ErrorKind::LogNotFound, "log header missing"))?;
        serde_json::from_value(block.data).map_err(|e| kind_err(ErrorKind::Other, e.to_string()))
    }

    fn write_header(&self, header: &LogHeader) -> Result<()> {
        let header_id = self.collection_id.header_block_id();
        let data = serde_json::to_value(header).map_err(optimystic_base::Error::new)?;
        self.store.insert(Block::new(header_id, "CL", data))
    }

    /// Append a new entry at `new_rev`, which must be exactly one past the
    /// current tail (revisions are gap-free and strictly increasing). A
    /// mismatch means another actor advanced the tail first; that's a
    /// recoverable `StaleFailure`, not a fatal error, the caller is
    /// expected to `update()` and retry with a fresh revision.
    pub fn add_actions(
        &self,
        actions: Vec<Action>,
        action_id: ActionId,
        new_rev: Revision,
        block_ids: BTreeSet<BlockId>,
    ) -> Result<AddActionsResult> {
        let mut header = self.header()?;
        if new_rev.0 != header.tail_rev.0 + 1 {
            return Err(kind_err(
                ErrorKind::StaleFailure,
                "revision is not gap-free with the current tail",
            ));
        }
        let entry = LogEntry {
            action_id,
            rev: new_rev,
            actions,
            block_ids,
        };
        let entry_id = entry_block_id(&self.collection_id, new_rev);
        let data = serde_json::to_value(&entry).map_err(optimystic_base::Error::new)?;
        self.store.insert(Block::new(entry_id.clone(), "LE", data))?;
        header.tail_rev = new_rev;
        self.write_header(&header)?;
        Ok(AddActionsResult {
            tail_path: entry_id,
            entry,
        })
    }

    /// All entries with `rev > since_rev`, in ascending order, plus the
    /// resulting context.
    pub fn get_from(&self, since_rev: Revision) -> Result<(Vec<LogEntry>, ActionContext)> {
        let header = self.header()?;
        let mut entries = Vec::new();
        let mut rev = since_rev.next();
        while rev.0 <= header.tail_rev.0 {
            let id = entry_block_id(&self.collection_id, rev);
            let block = self
                .store
                .try_get(&id)?
                .ok_or_else(|| err("expected log entry missing"))?;
            let entry: LogEntry = serde_json::from_value(block.data)
                .map_err(|e| kind_err(ErrorKind::Other, e.to_string()))?;
            entries.push(entry);
            rev = rev.next();
        }
        let context = ActionContext {
            committed: entries
                .iter()
                .map(|e| ActionRev {
                    action_id: e.action_id.clone(),
                    rev: e.rev,
                })
                .collect(),
            rev: header.tail_rev,
        };
        Ok((entries, context))
    }

    /// Entries in log order, forward (ascending rev) or reverse
    /// (descending rev), from `from` (exclusive for forward, inclusive
    /// for reverse) or from the start/tail if `None`.
    pub fn select(&self, from: Option<Revision>, forward: bool) -> Result<Vec<LogEntry>> {
        let header = self.header()?;
        if forward {
            let (entries, _) = self.get_from(from.unwrap_or(Revision::NONE))?;
            Ok(entries)
        } else {
            let start = from.unwrap_or(header.tail_rev);
            let mut entries = Vec::new();
            let mut rev = start;
            while rev.0 >= 1 {
                let id = entry_block_id(&self.collection_id, rev);
                if let Some(block) = self.store.try_get(&id)? {
                    let entry: LogEntry = serde_json::from_value(block.data)
                        .map_err(|e| kind_err(ErrorKind::Other, e.to_string()))?;
                    entries.push(entry);
                }
                if rev.0 == 1 {
                    break;
                }
                rev = Revision(rev.0 - 1);
            }
            Ok(entries)
        }
    }

    pub fn get_action_context(&self) -> Result<ActionContext> {
        let header = self.header()?;
        Ok(ActionContext {
            committed: Vec::new(),
            rev: header.tail_rev,
        })
    }

    pub fn collection_id(&self) -> &CollectionId {
        &self.collection_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optimystic_store::InMemoryBlockStore;
    use serde_json::json;

    fn new_log() -> CollectionLog {
        let store: Arc<dyn BlockStore> = Arc::new(InMemoryBlockStore::new());
        let (log, ctx) = CollectionLog::create_or_open(store, CollectionId::from("c1")).unwrap();
        assert!(ctx.rev.is_none());
        log
    }

    #[test]
    fn create_or_open_creates_empty_log() {
        let log = new_log();
        let (entries, ctx) = log.get_from(Revision::NONE).unwrap();
        assert!(entries.is_empty());
        assert!(ctx.rev.is_none());
    }

    #[test]
    fn reopen_existing_log_resumes_tail() {
        let store: Arc<dyn BlockStore> = Arc::new(InMemoryBlockStore::new());
        let (log, _) =
            CollectionLog::create_or_open(store.clone(), CollectionId::from("c1")).unwrap();
        log.add_actions(
            vec![Action::new("insert", json!({"id": "x"}))],
            ActionId::new_random(),
            Revision(1),
            [BlockId::from("x")].into_iter().collect(),
        )
        .unwrap();
        let (_, ctx) = CollectionLog::create_or_open(store, CollectionId::from("c1")).unwrap();
        assert_eq!(ctx.rev, Revision(1));
    }

    #[test]
    fn add_actions_rejects_non_gap_free_revision() {
        let log = new_log();
        let err = log
            .add_actions(vec![], ActionId::new_random(), Revision(2), BTreeSet::new())
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::StaleFailure);
        assert!(format!("{}", err).contains("gap-free"));
    }

    #[test]
    fn select_forward_yields_actions_in_order() {
        let log = new_log();
        log.add_actions(
            vec![Action::new("insert", json!({"id": "x", "v": 1}))],
            ActionId::new_random(),
            Revision(1),
            [BlockId::from("x")].into_iter().collect(),
        )
        .unwrap();
        log.add_actions(
            vec![Action::new("insert", json!({"id": "y", "v": 2}))],
            ActionId::new_random(),
            Revision(2),
            [BlockId::from("y")].into_iter().collect(),
        )
        .unwrap();
        let entries = log.select(None, true).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].rev, Revision(1));
        assert_eq!(entries[1].rev, Revision(2));
    }

    #[test]
    fn select_reverse_yields_descending() {
        let log = new_log();
        log.add_actions(
            vec![Action::new("insert", json!({}))],
            ActionId::new_random(),
            Revision(1),
            BTreeSet::new(),
        )
        .unwrap();
        log.add_actions(
            vec![Action::new("insert", json!({}))],
            ActionId::new_random(),
            Revision(2),
            BTreeSet::new(),
        )
        .unwrap();
        let entries = log.select(None, false).unwrap();
        assert_eq!(entries[0].rev, Revision(2));
        assert_eq!(entries[1].rev, Revision(1));
    }
}
