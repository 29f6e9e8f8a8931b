use serde::{Deserialize, Serialize};

/// Whether the mirror may be read right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Availability {
    /// Reads permitted.
    Awake,
    /// A reconciliation cycle is in progress; reads are deferred.
    Sleeping,
}

impl Availability {
    pub(crate) const AWAKE: u8 = 0;
    pub(crate) const SLEEPING: u8 = 1;

    pub(crate) fn from_u8(v: u8) -> Self {
        if v == Self::AWAKE {
            Availability::Awake
        } else {
            Availability::Sleeping
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Awake => "AWAKE",
            Availability::Sleeping => "SLEEPING",
        }
    }
}
