//! Kind pairs: the (abstract, native) type pair a converter bridges.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies one converter slot by its abstract and native handle types.
///
/// Equality and hashing use only the two `TypeId`s; the label and type names
/// exist for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct KindPair {
    label: &'static str,
    abstract_type: TypeId,
    native_type: TypeId,
    abstract_name: &'static str,
    native_name: &'static str,
}

impl KindPair {
    /// Builds the kind pair for abstract type `A` and native type `N`.
    #[must_use]
    pub fn of<A: 'static, N: 'static>(label: &'static str) -> Self {
        Self {
            label,
            abstract_type: TypeId::of::<A>(),
            native_type: TypeId::of::<N>(),
            abstract_name: type_name::<A>(),
            native_name: type_name::<N>(),
        }
    }

    /// Short human label such as `block` or `item`.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    #[must_use]
    pub const fn abstract_name(&self) -> &'static str {
        self.abstract_name
    }

    #[must_use]
    pub const fn native_name(&self) -> &'static str {
        self.native_name
    }

    /// Whether this pair bridges `A` and `N`.
    #[must_use]
    pub fn is<A: 'static, N: 'static>(&self) -> bool {
        self.abstract_type == TypeId::of::<A>() && self.native_type == TypeId::of::<N>()
    }
}

impl PartialEq for KindPair {
    fn eq(&self, other: &Self) -> bool {
        self.abstract_type == other.abstract_type && self.native_type == other.native_type
    }
}

impl Eq for KindPair {}

impl Hash for KindPair {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.abstract_type.hash(state);
        self.native_type.hash(state);
    }
}

impl fmt::Display for KindPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} <-> {})",
            self.label, self.abstract_name, self.native_name
        )
    }
}
