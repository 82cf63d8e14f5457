//! Roll per-module states into one ModuleSet state

use lifecycle_common::crd::{Condition, ModuleStatus, State};

/// Aggregate lifecycle state
///
/// First match wins: any module in Error, then any in Warning, then any
/// Processing, then any condition not true (Processing), else Ready.
pub fn determine_state(modules: &[ModuleStatus], conditions: &[Condition]) -> State {
    let any = |state: State| modules.iter().any(|m| m.state == state);

    if any(State::Error) {
        State::Error
    } else if any(State::Warning) {
        State::Warning
    } else if any(State::Processing) || conditions.iter().any(|c| !c.is_true()) {
        State::Processing
    } else {
        State::Ready
    }
}
