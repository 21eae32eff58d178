//! Actions: typed, engine-specific logical operations. A
//! handful of actions sharing one originator-assigned `ActionId` become
//! one log entry at commit time.

use optimystic_base::Hash32;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed, engine-specific logical operation (`insert`, `append`,
/// `scan`, ...). Actions are idempotent under replay given the same
/// starting state; that property is a contract on handlers, not
/// something this type enforces structurally.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Action {
    pub action_type: String,
    pub data: Value,
    pub tx_ref: Option<Hash32>,
}

impl Action {
    pub fn new(action_type: impl Into<String>, data: Value) -> Self {
        Action {
            action_type: action_type.into(),
            data,
            tx_ref: None,
        }
    }

    pub fn with_tx_ref(mut self, tx_ref: Hash32) -> Self {
        self.tx_ref = Some(tx_ref);
        self
    }
}
