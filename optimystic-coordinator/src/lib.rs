//! Coordinator: multi-collection transaction sessions, the
//! canonical operations hash, cohort-replicated commit, responsibility
//! redirects, and the re-execution validator.

mod cohort;
mod operations;
mod redirect;
mod session;
mod validator;

pub use cohort::{handle_repo_message, CohortTransactor, OperationResult};
pub use operations::operations_hash;
pub use redirect::{responsible_or_redirect, RedirectGuard};
pub use session::{CommitOutcome, Session};
pub use validator::{ValidationOutcome, Validator};
