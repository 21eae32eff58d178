mod cohort;
mod directory;
mod distance;
mod responsibility;

pub use cohort::{assemble_cohort, Anchor, Cohort};
pub use directory::{PeerDirectory, PeerEntry, PeerState};
pub use distance::{coord_of, less_lex, xor_distance, Coord};
pub use responsibility::{responsibility_for, Responsibility};
