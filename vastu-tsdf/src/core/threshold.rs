//! Optional numeric bounds.

use serde::{Deserialize, Serialize};

/// A bound that is either unset or holds a value.
///
/// An unset bound never triggers. A set bound triggers for values strictly
/// greater than it, so `Threshold::new(5.0)` fires for `5.001` but not `5.0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threshold<T>(Option<T>);

impl<T: Copy + PartialOrd> Threshold<T> {
    /// Create a set bound.
    pub fn new(bound: T) -> Self {
        Self(Some(bound))
    }

    /// Create an unset bound.
    pub fn unset() -> Self {
        Self(None)
    }

    /// Build from an optional value, keeping it only if `is_valid` accepts it.
    ///
    /// Rejected values are logged and leave the bound unset.
    pub fn from_validated(
        name: &str,
        value: Option<T>,
        is_valid: impl Fn(T) -> bool,
        requirement: &str,
    ) -> Self
    where
        T: std::fmt::Debug,
    {
        match value {
            Some(v) if is_valid(v) => Self::new(v),
            Some(v) => {
                log::error!(
                    "Parameter \"{}\" has invalid value {:?}, it must be {}. Leaving it unset.",
                    name,
                    v,
                    requirement
                );
                Self::unset()
            }
            None => Self::unset(),
        }
    }

    /// Clear the bound.
    pub fn clear(&mut self) {
        self.0 = None;
    }

    /// Whether a bound is present.
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// The bound, if set.
    pub fn get(&self) -> Option<T> {
        self.0
    }

    /// True when set and `bound < value`.
    pub fn is_set_and_less_than(&self, value: T) -> bool {
        matches!(self.0, Some(bound) if bound < value)
    }
}
