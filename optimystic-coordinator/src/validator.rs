//! Validator: re-executes a transaction's statements against
//! an isolated set of collections layered over the same transactor, and
//! compares the resulting operations hash against the one the client
//! claimed at commit time.
//!
//! Concrete over `optimystic_transactor::Transactor` rather than generic
//! over `CollectionTransactor`, since the read-dependency check (step 3)
//! needs `Transactor::block_revision`, which isn't part of that trait.

use std::collections::{hash_map::Entry, HashMap};
use std::sync::Arc;

use optimystic_base::{CollectionId, ErrorKind, Hash32, Result, Transaction};
use optimystic_collection::{Collection, Handler};
use optimystic_engine::{Engine, EngineRegistry};
use optimystic_store::BlockStore;
use optimystic_transactor::{PendValidationHook, Transactor};

use crate::operations::operations_hash;

pub struct ValidationOutcome {
    pub valid: bool,
    pub reason: Option<String>,
    pub computed_hash: Option<Hash32>,
}

impl ValidationOutcome {
    fn invalid(reason: impl Into<String>) -> Self {
        ValidationOutcome {
            valid: false,
            reason: Some(reason.into()),
            computed_hash: None,
        }
    }

    fn valid(hash: Hash32) -> Self {
        ValidationOutcome {
            valid: true,
            reason: None,
            computed_hash: Some(hash),
        }
    }
}

pub struct Validator {
    transactor: Arc<Transactor>,
    store: Arc<dyn BlockStore>,
    engines: Arc<EngineRegistry>,
    handlers: HashMap<CollectionId, HashMap<String, Arc<dyn Handler>>>,
}

impl Validator {
    pub fn new(
        transactor: Arc<Transactor>,
        store: Arc<dyn BlockStore>,
        engines: Arc<EngineRegistry>,
        handlers: HashMap<CollectionId, HashMap<String, Arc<dyn Handler>>>,
    ) -> Self {
        Validator {
            transactor,
            store,
            engines,
            handlers,
        }
    }

    pub fn validate(&self, transaction: &Transaction, operations_hash_claim: &Hash32) -> Result<ValidationOutcome> {
        let engine = match self.engines.get(&transaction.stamp.engine_id) {
            Ok(engine) => engine,
            Err(_) => return Ok(ValidationOutcome::invalid(ErrorKind::UnknownEngine.to_string())),
        };

        if transaction.stamp.schema_hash != engine.schema_hash() {
            return Ok(ValidationOutcome::invalid(ErrorKind::SchemaMismatch.to_string()));
        }

        for read in &transaction.reads {
            let committed = self.transactor.block_revision(&read.block_id);
            if committed != read.expected_revision {
                return Ok(ValidationOutcome::invalid(ErrorKind::StaleRead.to_string()));
            }
        }

        // An isolated coordinator: fresh `Collection` instances over the
        // same transactor/store, touched only by this re-execution. They
        // are never `sync`ed, so nothing here reaches committed state.
        let mut isolated: HashMap<CollectionId, Collection<Transactor>> = HashMap::new();
        for statement in &transaction.statements {
            let actions_by_collection = match engine.execute(statement) {
                Ok(actions) => actions,
                Err(_) => return Ok(ValidationOutcome::invalid(ErrorKind::ReExecutionFailed.to_string())),
            };
            for (collection_id, actions) in actions_by_collection {
                let collection = match isolated.entry(collection_id.clone()) {
                    Entry::Occupied(o) => o.into_mut(),
                    Entry::Vacant(v) => {
                        let handlers = self.handlers.get(&collection_id).cloned().unwrap_or_default();
                        let collection = Collection::create_or_open(
                            self.transactor.clone(),
                            self.store.clone(),
                            collection_id.clone(),
                            handlers,
                        )?;
                        v.insert(collection)
                    }
                };
                if collection.act(actions).is_err() {
                    return Ok(ValidationOutcome::invalid(ErrorKind::ReExecutionFailed.to_string()));
                }
            }
        }

        let touched: Vec<(CollectionId, optimystic_store::Transforms)> = isolated
            .iter()
            .map(|(id, collection)| (id.clone(), collection.snapshot()))
            .collect();
        let computed = operations_hash(&touched)?;
        drop(isolated);

        if &computed != operations_hash_claim {
            return Ok(ValidationOutcome::invalid(ErrorKind::OperationsHashMismatch.to_string()));
        }

        Ok(ValidationOutcome::valid(computed))
    }
}

/// Lets a replica's `Transactor::pend` run this validator against a
/// claimed transaction before admitting the pend.
impl PendValidationHook for Validator {
    fn validate(&self, transaction: &Transaction, operations_hash: &Hash32) -> Result<bool> {
        Ok(Validator::validate(self, transaction, operations_hash)?.valid)
    }
}
