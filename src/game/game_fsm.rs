use std::fmt;

use rust_fsm::state_machine;

state_machine! {
    derive(Debug, Clone, PartialEq)
    pub GameFsm(Setup)

    Setup => {
        StartGame => Play
    },
    Play => {
        FinishGame => End
    }
}

impl fmt::Display for GameFsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
