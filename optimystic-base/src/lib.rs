mod error;
mod hash;
mod ids;
mod tx;

pub use error::{err, kind_err, Error, ErrorKind, Result};
pub use hash::{combine, Hash32};
pub use ids::{ActionContext, ActionId, ActionRev, BlockId, CollectionId, PeerId, Revision};
pub use tx::{EngineId, Read, Timestamp, Transaction, TransactionStamp};
