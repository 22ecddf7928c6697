use std::fmt;

use rust_fsm::state_machine;

state_machine! {
    derive(Debug, Clone, PartialEq)
    pub RoundFsm(AwaitStart)

    AwaitStart => {
        StartRound => InProgress,
        // The current player can be removed before they ever press start.
        FinishRound => End,
    },
    InProgress => {
        FinishRound => End
    }
}

impl fmt::Display for RoundFsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
