//! Bounded-state exploration of the pend/commit state machine, over a
//! single block and two competing actions. Mirrors [`crate::Transactor`]'s
//! `pend`/`commit`/`cancel` transitions abstractly rather than driving the
//! real `Transactor`, since stateright enumerates the whole state graph and
//! needs cheap, `Clone + Hash + Eq` states.

#![cfg(test)]

use stateright::{Model, Property};

const ACTIONS: [&str; 2] = ["a", "b"];

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
struct PendCommitState {
    /// Which actions currently hold a pend on the block.
    pending: [bool; 2],
    /// Committed revision of the block, 0 meaning never committed.
    revision: u8,
    /// Which action (if any) produced the current revision.
    committed_by: Option<usize>,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
enum PendCommitAction {
    Pend(usize),
    Cancel(usize),
    Commit(usize, u8),
}

struct PendCommitModel;

impl Model for PendCommitModel {
    type State = PendCommitState;
    type Action = PendCommitAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![PendCommitState {
            pending: [false, false],
            revision: 0,
            committed_by: None,
        }]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        for i in 0..ACTIONS.len() {
            if !state.pending[i] {
                actions.push(PendCommitAction::Pend(i));
            } else {
                actions.push(PendCommitAction::Cancel(i));
                // A pending action may attempt to commit at the correct
                // next revision or at a stale one; both are legal to
                // *attempt*, only one is legal to *succeed*.
                actions.push(PendCommitAction::Commit(i, state.revision + 1));
                actions.push(PendCommitAction::Commit(i, state.revision));
            }
        }
    }

    fn next_state(&self, last_state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut state = last_state.clone();
        match action {
            PendCommitAction::Pend(i) => {
                // Collide policy: a pend is only accepted if no other
                // action is currently pending on the block.
                let other = 1 - i;
                if state.pending[other] {
                    return None;
                }
                state.pending[i] = true;
            }
            PendCommitAction::Cancel(i) => {
                state.pending[i] = false;
            }
            PendCommitAction::Commit(i, new_rev) => {
                if !state.pending[i] {
                    return None;
                }
                state.pending[i] = false;
                if new_rev == state.revision + 1 {
                    state.revision = new_rev;
                    state.committed_by = Some(i);
                }
                // A stale commit attempt clears the pend (mirrors
                // `Transactor::commit` cancelling on `CommitOutcome::Stale`)
                // but otherwise leaves the state untouched.
            }
        }
        Some(state)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::<Self>::always("revision advances by exactly one step at a time", |_, state| {
                state.revision <= 2
            }),
            Property::<Self>::always(
                "the two actions never hold a pend on the same block simultaneously",
                |_, state| !(state.pending[0] && state.pending[1]),
            ),
        ]
    }
}

#[test]
fn pend_commit_state_machine_never_double_pends_or_over_commits() {
    use stateright::Checker;
    PendCommitModel
        .checker()
        .spawn_bfs()
        .join()
        .assert_properties();
}
