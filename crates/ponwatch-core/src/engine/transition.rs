// ── Terminal state transitions ──
//
// One cycle's verdict for one (port, terminal id) slot, from the state on
// record and the state observed this cycle.

use crate::model::OnuState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No record existed; one is created. Reported as a registration,
    /// never as an online transition.
    Registered { online: bool },
    CameOnline,
    WentOffline,
    Unchanged { online: bool },
    /// On record but absent from this cycle's observed set.
    Vanished { was_online: bool },
    /// Neither recorded nor observed.
    Unseen,
}

pub fn classify(previous: Option<OnuState>, observed: Option<OnuState>) -> Transition {
    match (previous, observed) {
        (None, Some(now)) => Transition::Registered {
            online: now.is_online(),
        },
        (Some(OnuState::Offline), Some(OnuState::Online)) => Transition::CameOnline,
        (Some(OnuState::Online), Some(OnuState::Offline)) => Transition::WentOffline,
        (Some(_), Some(now)) => Transition::Unchanged {
            online: now.is_online(),
        },
        (Some(before), None) => Transition::Vanished {
            was_online: before.is_online(),
        },
        (None, None) => Transition::Unseen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_terminal_registers_instead_of_coming_online() {
        assert_eq!(
            classify(None, Some(OnuState::Online)),
            Transition::Registered { online: true }
        );
        assert_eq!(
            classify(None, Some(OnuState::Offline)),
            Transition::Registered { online: false }
        );
    }

    #[test]
    fn state_changes() {
        assert_eq!(
            classify(Some(OnuState::Offline), Some(OnuState::Online)),
            Transition::CameOnline
        );
        assert_eq!(
            classify(Some(OnuState::Online), Some(OnuState::Offline)),
            Transition::WentOffline
        );
        assert_eq!(
            classify(Some(OnuState::Online), Some(OnuState::Online)),
            Transition::Unchanged { online: true }
        );
    }

    #[test]
    fn absence_is_distinct_from_offline() {
        assert_eq!(
            classify(Some(OnuState::Online), None),
            Transition::Vanished { was_online: true }
        );
        assert_eq!(
            classify(Some(OnuState::Offline), None),
            Transition::Vanished { was_online: false }
        );
        assert_eq!(classify(None, None), Transition::Unseen);
    }
}
