use core::fmt::{Display, Formatter};

/// The protocol state of a port. A port is in exactly one of these at any
/// time; `Initializing` is the state before [`initialize`](super::Port::initialize)
/// and `Faulty` is terminal until re-initialization.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortState {
    #[default]
    Initializing,
    Faulty,
    Disabled,
    Listening,
    PreMaster,
    Master,
    Passive,
    Uncalibrated,
    Slave,
}

impl PortState {
    /// States in which the port receives time from a parent
    pub fn is_slave_like(self) -> bool {
        matches!(self, PortState::Slave | PortState::Uncalibrated)
    }

    /// States in which the port distributes time downstream
    pub fn is_master_like(self) -> bool {
        matches!(self, PortState::Master | PortState::PreMaster)
    }

    /// States in which the port neither sends nor accepts protocol messages
    pub fn is_inactive(self) -> bool {
        matches!(
            self,
            PortState::Initializing | PortState::Faulty | PortState::Disabled
        )
    }
}

impl Display for PortState {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            PortState::Initializing => "Initializing",
            PortState::Faulty => "Faulty",
            PortState::Disabled => "Disabled",
            PortState::Listening => "Listening",
            PortState::PreMaster => "PreMaster",
            PortState::Master => "Master",
            PortState::Passive => "Passive",
            PortState::Uncalibrated => "Uncalibrated",
            PortState::Slave => "Slave",
        };
        write!(f, "{name}")
    }
}
