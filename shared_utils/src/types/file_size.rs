//! FileSize Type-Safe Wrapper
//!
//! Byte counts for size budgets and output files. Binary prefixes throughout:
//! 1 KiB = 1024 bytes, 1 MiB = 1,048,576 bytes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// File size in bytes.
///
/// # Examples
/// ```
/// use shared_utils::types::file_size::FileSize;
///
/// let budget = FileSize::from_mib(10);
/// assert_eq!(budget.bytes(), 10_485_760);
/// assert_eq!(budget.bits(), 83_886_080);
/// assert_eq!(budget.display(), "10.00 MiB");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileSize(u64);

impl FileSize {
    pub const ZERO: FileSize = FileSize(0);

    pub const KIB: u64 = 1024;
    pub const MIB: u64 = 1024 * 1024;
    pub const GIB: u64 = 1024 * 1024 * 1024;

    #[inline]
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    #[inline]
    pub const fn from_kib(kib: u64) -> Self {
        Self(kib * Self::KIB)
    }

    #[inline]
    pub const fn from_mib(mib: u64) -> Self {
        Self(mib * Self::MIB)
    }

    /// Fractional MiB, truncated to whole bytes. Negative or non-finite input yields zero.
    pub fn from_mib_f64(mib: f64) -> Self {
        if !mib.is_finite() || mib <= 0.0 {
            return Self::ZERO;
        }
        Self((mib * Self::MIB as f64) as u64)
    }

    #[inline]
    pub const fn bytes(&self) -> u64 {
        self.0
    }

    /// Size in bits, saturating at `u64::MAX`.
    #[inline]
    pub const fn bits(&self) -> u64 {
        self.0.saturating_mul(8)
    }

    /// `self / budget`, `None` for a zero budget.
    pub fn ratio_of(&self, budget: FileSize) -> Option<f64> {
        if budget.0 == 0 {
            None
        } else {
            Some(self.0 as f64 / budget.0 as f64)
        }
    }

    pub fn display(&self) -> String {
        if self.0 >= Self::GIB {
            format!("{:.2} GiB", self.0 as f64 / Self::GIB as f64)
        } else if self.0 >= Self::MIB {
            format!("{:.2} MiB", self.0 as f64 / Self::MIB as f64)
        } else if self.0 >= Self::KIB {
            format!("{:.2} KiB", self.0 as f64 / Self::KIB as f64)
        } else {
            format!("{} B", self.0)
        }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileSize({} = {})", self.0, self.display())
    }
}

impl fmt::Display for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl Default for FileSize {
    fn default() -> Self {
        Self::ZERO
    }
}
