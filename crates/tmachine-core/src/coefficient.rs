//! Coefficient algebra.
//!
//! A coefficient is the weight a traverser accumulates along its path.
//! Every step multiplies the incoming coefficient by its own static weight,
//! so the coefficient of an emitted traverser is the product of the weights
//! of every step it passed through.
//!
//! The algebra is chosen at compile time through the `C` type parameter of
//! the pipeline. [`Unit`] is zero-sized and its `multiply` compiles away,
//! which disables weighting without a runtime branch.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A commutative, associative weight with an identity element.
///
/// Implementations must satisfy, for all `a`, `b`, `c`:
///
/// - `a.multiply(&b) == b.multiply(&a)`
/// - `a.multiply(&b).multiply(&c) == a.multiply(&b.multiply(&c))`
/// - `Self::identity().multiply(&a) == a`
///
/// `multiply` is total: it must be defined for every representable value.
pub trait Coefficient: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Returns the identity coefficient.
    fn identity() -> Self;

    /// Combines two coefficients.
    #[must_use]
    fn multiply(&self, other: &Self) -> Self;

    /// Returns true if this is the identity coefficient.
    fn is_identity(&self) -> bool {
        *self == Self::identity()
    }
}

/// The no-op coefficient. Weighting is disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit;

impl Coefficient for Unit {
    #[inline]
    fn identity() -> Self {
        Self
    }

    #[inline]
    fn multiply(&self, _other: &Self) -> Self {
        Self
    }
}

/// An integer multiplicity (bulk).
///
/// Multiplication saturates at `u64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Count(u64);

impl Count {
    /// Creates a count.
    #[must_use]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    /// Returns the raw count.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Default for Count {
    fn default() -> Self {
        Self::identity()
    }
}

impl Coefficient for Count {
    #[inline]
    fn identity() -> Self {
        Self(1)
    }

    #[inline]
    fn multiply(&self, other: &Self) -> Self {
        Self(self.0.saturating_mul(other.0))
    }
}

impl From<u64> for Count {
    fn from(count: u64) -> Self {
        Self(count)
    }
}

impl fmt::Display for Count {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A floating point weight (cost, probability).
///
/// Floating point multiplication is commutative but only approximately
/// associative; compare with a tolerance when chaining many weights.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Weight(f64);

impl Weight {
    /// Creates a weight.
    #[must_use]
    pub const fn new(weight: f64) -> Self {
        Self(weight)
    }

    /// Returns the raw weight.
    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }
}

impl Default for Weight {
    fn default() -> Self {
        Self::identity()
    }
}

impl Coefficient for Weight {
    #[inline]
    fn identity() -> Self {
        Self(1.0)
    }

    #[inline]
    fn multiply(&self, other: &Self) -> Self {
        Self(self.0 * other.0)
    }
}

impl From<f64> for Weight {
    fn from(weight: f64) -> Self {
        Self(weight)
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
