use crate::core::models::FlowDecision;

/// Launch gate progress for one cold start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Init,
    WaitingOnPermissionsAndFlag,
    FastPathApp,
    FetchingMetrics,
    ReusingPersistedUrl,
    Terminal(FlowDecision),
}

impl FlowState {
    /// Legal edges of the launch state machine. Anything else is a no-op.
    #[must_use]
    pub fn can_transition_to(&self, next: &FlowState) -> bool {
        use FlowState::{
            FastPathApp, FetchingMetrics, Init, ReusingPersistedUrl, Terminal,
            WaitingOnPermissionsAndFlag,
        };

        if matches!(next, Terminal(FlowDecision::Pending)) {
            return false;
        }

        matches!(
            (self, next),
            (Init, WaitingOnPermissionsAndFlag)
                | (
                    WaitingOnPermissionsAndFlag,
                    FastPathApp | FetchingMetrics | ReusingPersistedUrl
                )
                | (FastPathApp, Terminal(FlowDecision::ShowApplication))
                | (ReusingPersistedUrl, Terminal(FlowDecision::ShowDestination(_)))
                | (FetchingMetrics, Terminal(_))
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Terminal(_))
    }
}
