//! Identity types for compute graphs.
//!
//! Both IDs are newtypes over `u32` that index directly into the graph's
//! kernel and data-interface vectors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index into `ComputeGraph::kernel_invocations`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct KernelIndex(pub u32);

impl KernelIndex {
    pub const INVALID: KernelIndex = KernelIndex(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for KernelIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "KernelIndex(INVALID)")
        } else {
            write!(f, "KernelIndex({})", self.0)
        }
    }
}

impl fmt::Display for KernelIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Index into `ComputeGraph::data_interfaces`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct DataInterfaceIndex(pub u32);

impl DataInterfaceIndex {
    pub const INVALID: DataInterfaceIndex = DataInterfaceIndex(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for DataInterfaceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "DataInterfaceIndex(INVALID)")
        } else {
            write!(f, "DataInterfaceIndex({})", self.0)
        }
    }
}

impl fmt::Display for DataInterfaceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
