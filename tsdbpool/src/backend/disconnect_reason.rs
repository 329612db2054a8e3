use std::fmt::Display;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisconnectReason {
    Old,
    Unhealthy,
    Fault,
    Dropped,
    #[default]
    Other,
}

impl Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::Old => "max keep alive time",
            Self::Unhealthy => "unhealthy",
            Self::Fault => "fault",
            Self::Dropped => "lease dropped",
            Self::Other => "other",
        };

        write!(f, "{}", reason)
    }
}
