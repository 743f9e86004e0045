//! Identity mapping table.
//!
//! A bijection between abstract handles and `(native handle, variant)` keys,
//! kept as two hash indices that are updated together under one lock. Insert
//! follows bidirectional-map `put`/`force_put` rules:
//!
//! - a native key already bound to a *different* abstract handle is a
//!   conflict unless `force` is set, in which case that binding is evicted;
//! - an abstract handle already bound to another native key is rebound and
//!   its old native key is dropped.

use hostbridge_types::MetaVariant;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// One row of an identity table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry<A, N> {
    pub kind: &'static str,
    pub abstract_handle: A,
    pub native: N,
    pub variant: MetaVariant,
}

/// What a successful [`IdentityTable::insert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was created.
    Inserted,
    /// The exact binding already existed.
    Unchanged,
    /// An existing binding on either side was replaced.
    Replaced,
}

/// The native key is bound to a different abstract handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingConflict<A> {
    pub variant: MetaVariant,
    pub existing: A,
    pub incoming: A,
}

impl<A: fmt::Debug> fmt::Display for MappingConflict<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "native key (variant {}) already maps to {:?}, refusing {:?}",
            self.variant, self.existing, self.incoming
        )
    }
}

impl<A: fmt::Debug> std::error::Error for MappingConflict<A> {}

struct Indices<A, N> {
    forward: HashMap<A, (N, MetaVariant)>,
    inverse: HashMap<(N, MetaVariant), A>,
}

pub struct IdentityTable<A, N> {
    kind: &'static str,
    indices: RwLock<Indices<A, N>>,
}

impl<A, N> IdentityTable<A, N>
where
    A: Clone + Eq + Hash,
    N: Clone + Eq + Hash,
{
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            indices: RwLock::new(Indices {
                forward: HashMap::new(),
                inverse: HashMap::new(),
            }),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Binds `abstract_handle` to `(native, variant)`.
    pub fn insert(
        &self,
        abstract_handle: A,
        native: N,
        variant: MetaVariant,
        force: bool,
    ) -> Result<InsertOutcome, MappingConflict<A>> {
        let key = (native, variant);
        let mut indices = self.indices.write();
        let mut replaced = false;

        if let Some(existing) = indices.inverse.get(&key) {
            if *existing == abstract_handle {
                return Ok(InsertOutcome::Unchanged);
            }
            if !force {
                return Err(MappingConflict {
                    variant,
                    existing: existing.clone(),
                    incoming: abstract_handle,
                });
            }
            let evicted = existing.clone();
            indices.forward.remove(&evicted);
            replaced = true;
        }

        if let Some(previous) = indices.forward.insert(abstract_handle.clone(), key.clone()) {
            indices.inverse.remove(&previous);
            replaced = true;
        }
        indices.inverse.insert(key, abstract_handle);

        Ok(if replaced {
            InsertOutcome::Replaced
        } else {
            InsertOutcome::Inserted
        })
    }

    #[must_use]
    pub fn lookup_native(&self, abstract_handle: &A) -> Option<(N, MetaVariant)> {
        self.indices.read().forward.get(abstract_handle).cloned()
    }

    #[must_use]
    pub fn lookup_abstract(&self, native: &N, variant: MetaVariant) -> Option<A> {
        self.indices
            .read()
            .inverse
            .get(&(native.clone(), variant))
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, abstract_handle: &A) -> bool {
        self.indices.read().forward.contains_key(abstract_handle)
    }

    #[must_use]
    pub fn contains_native(&self, native: &N, variant: MetaVariant) -> bool {
        self.indices
            .read()
            .inverse
            .contains_key(&(native.clone(), variant))
    }

    /// Drops the row for `abstract_handle`, returning the native key it held.
    pub fn remove_abstract(&self, abstract_handle: &A) -> Option<(N, MetaVariant)> {
        let mut indices = self.indices.write();
        let key = indices.forward.remove(abstract_handle)?;
        indices.inverse.remove(&key);
        Some(key)
    }

    /// Drops the row for `(native, variant)`, returning the abstract handle it held.
    pub fn remove_native(&self, native: &N, variant: MetaVariant) -> Option<A> {
        let mut indices = self.indices.write();
        let abstract_handle = indices.inverse.remove(&(native.clone(), variant))?;
        indices.forward.remove(&abstract_handle);
        Some(abstract_handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.read().forward.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every row, in no particular order.
    #[must_use]
    pub fn entries(&self) -> Vec<MappingEntry<A, N>> {
        self.indices
            .read()
            .forward
            .iter()
            .map(|(abstract_handle, (native, variant))| MappingEntry {
                kind: self.kind,
                abstract_handle: abstract_handle.clone(),
                native: native.clone(),
                variant: *variant,
            })
            .collect()
    }

    /// Whether both indices describe the same bijection.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let indices = self.indices.read();
        indices.forward.len() == indices.inverse.len()
            && indices
                .forward
                .iter()
                .all(|(abstract_handle, key)| indices.inverse.get(key) == Some(abstract_handle))
    }
}

impl<A, N> fmt::Debug for IdentityTable<A, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityTable")
            .field("kind", &self.kind)
            .field("len", &self.indices.read().forward.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> IdentityTable<&'static str, u32> {
        IdentityTable::new("block")
    }

    #[test]
    fn insert_and_lookup_both_ways() {
        let table = table();
        assert_eq!(
            table.insert("air", 0, MetaVariant::DEFAULT, false),
            Ok(InsertOutcome::Inserted)
        );
        assert_eq!(table.lookup_native(&"air"), Some((0, MetaVariant::DEFAULT)));
        assert_eq!(table.lookup_abstract(&0, MetaVariant::DEFAULT), Some("air"));
        assert_eq!(table.lookup_abstract(&0, MetaVariant::new(1)), None);
    }

    #[test]
    fn same_binding_is_unchanged() {
        let table = table();
        table.insert("air", 0, MetaVariant::DEFAULT, false).unwrap();
        assert_eq!(
            table.insert("air", 0, MetaVariant::DEFAULT, false),
            Ok(InsertOutcome::Unchanged)
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn conflicting_native_key_fails_without_force() {
        let table = table();
        table.insert("air", 0, MetaVariant::DEFAULT, false).unwrap();
        let conflict = table
            .insert("void", 0, MetaVariant::DEFAULT, false)
            .unwrap_err();
        assert_eq!(conflict.existing, "air");
        assert_eq!(conflict.incoming, "void");
        assert_eq!(table.lookup_abstract(&0, MetaVariant::DEFAULT), Some("air"));
        assert!(!table.contains(&"void"));
    }

    #[test]
    fn force_evicts_previous_abstract() {
        let table = table();
        table.insert("air", 0, MetaVariant::DEFAULT, false).unwrap();
        assert_eq!(
            table.insert("void", 0, MetaVariant::DEFAULT, true),
            Ok(InsertOutcome::Replaced)
        );
        assert!(!table.contains(&"air"));
        assert_eq!(table.len(), 1);
        assert!(table.is_consistent());
    }

    #[test]
    fn rebinding_abstract_drops_old_native_key() {
        let table = table();
        table.insert("air", 0, MetaVariant::DEFAULT, false).unwrap();
        assert_eq!(
            table.insert("air", 7, MetaVariant::DEFAULT, false),
            Ok(InsertOutcome::Replaced)
        );
        assert!(!table.contains_native(&0, MetaVariant::DEFAULT));
        assert!(table.contains_native(&7, MetaVariant::DEFAULT));
        assert!(table.is_consistent());
    }

    #[test]
    fn remove_clears_both_indices() {
        let table = table();
        table.insert("air", 0, MetaVariant::DEFAULT, false).unwrap();
        table.insert("stone", 1, MetaVariant::DEFAULT, false).unwrap();

        assert_eq!(table.remove_abstract(&"air"), Some((0, MetaVariant::DEFAULT)));
        assert_eq!(table.remove_native(&1, MetaVariant::DEFAULT), Some("stone"));
        assert!(table.is_empty());
        assert!(table.is_consistent());
        assert_eq!(table.remove_abstract(&"air"), None);
    }
}
