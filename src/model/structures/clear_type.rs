use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;
use strum_macros::EnumIter;

/// How a play ended. The discriminants are the wire values clients send,
/// which do not follow quality order; use [`ClearType::rank`] to compare.
#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum ClearType {
    TrackLost = 0,
    NormalClear = 1,
    FullRecall = 2,
    PureMemory = 3,
    EasyClear = 4,
    HardClear = 5
}

impl ClearType {
    /// Quality rank, higher is better:
    /// lost < easy < normal < hard < full recall < pure memory.
    pub fn rank(self) -> u8 {
        match self {
            ClearType::TrackLost => 0,
            ClearType::EasyClear => 1,
            ClearType::NormalClear => 2,
            ClearType::HardClear => 3,
            ClearType::FullRecall => 4,
            ClearType::PureMemory => 5
        }
    }

    /// Returns whichever of the two clear types ranks higher, preferring `self` on ties.
    pub fn best_of(self, other: ClearType) -> ClearType {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

impl TryFrom<i32> for ClearType {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(ClearType::TrackLost),
            1 => Ok(ClearType::NormalClear),
            2 => Ok(ClearType::FullRecall),
            3 => Ok(ClearType::PureMemory),
            4 => Ok(ClearType::EasyClear),
            5 => Ok(ClearType::HardClear),
            _ => Err(())
        }
    }
}

impl From<ClearType> for i32 {
    fn from(c: ClearType) -> Self {
        c as i32
    }
}
