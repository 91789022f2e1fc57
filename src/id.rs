#![allow(missing_docs)]

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

macro_rules! num_id {
    ($id:ident, $t:ty) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $id($t);

        impl Deref for $id {
            type Target = $t;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<$t> for $id {
            fn from(v: $t) -> Self {
                $id(v)
            }
        }

        impl fmt::Display for $id {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

num_id!(Ssrc, u32);
num_id!(Pt, u8);
num_id!(DatagramId, u64);
num_id!(SinkId, u64);

impl DatagramId {
    /// The id following this one. Wraps, but a session never gets there.
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl SinkId {
    pub(crate) fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}
