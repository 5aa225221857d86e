use serde_repr::{Deserialize_repr, Serialize_repr};
use std::convert::TryFrom;
use strum_macros::EnumIter;

#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter)]
#[repr(u8)]
pub enum Difficulty {
    Past = 0,
    Present = 1,
    Future = 2,
    Beyond = 3,
    Eternal = 4
}

impl TryFrom<i32> for Difficulty {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Difficulty::Past),
            1 => Ok(Difficulty::Present),
            2 => Ok(Difficulty::Future),
            3 => Ok(Difficulty::Beyond),
            4 => Ok(Difficulty::Eternal),
            _ => Err(())
        }
    }
}

impl From<Difficulty> for i32 {
    fn from(d: Difficulty) -> Self {
        d as i32
    }
}
