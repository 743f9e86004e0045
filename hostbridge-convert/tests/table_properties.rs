//! Property-based tests for the identity table.
//!
//! Whatever sequence of inserts and removals is applied, the table must stay
//! a bijection: every abstract handle maps to one native key, every native
//! key maps back to the same abstract handle, and a rejected insert changes
//! nothing.

use hostbridge_convert::{IdentityTable, InsertOutcome};
use hostbridge_types::MetaVariant;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Insert {
        abstract_handle: u8,
        native: u8,
        variant: u32,
        force: bool,
    },
    RemoveAbstract(u8),
    RemoveNative(u8, u32),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0u8..12, 0u8..12, 0u32..3, any::<bool>()).prop_map(
            |(abstract_handle, native, variant, force)| Op::Insert {
                abstract_handle,
                native,
                variant,
                force,
            }
        ),
        1 => (0u8..12).prop_map(Op::RemoveAbstract),
        1 => (0u8..12, 0u32..3).prop_map(|(native, variant)| Op::RemoveNative(native, variant)),
    ]
}

fn sorted_rows(table: &IdentityTable<u8, u8>) -> Vec<(u8, u8, u32)> {
    let mut rows: Vec<_> = table
        .entries()
        .into_iter()
        .map(|entry| (entry.abstract_handle, entry.native, entry.variant.value()))
        .collect();
    rows.sort_unstable();
    rows
}

proptest! {
    #[test]
    fn table_stays_a_bijection(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let table = IdentityTable::<u8, u8>::new("block");

        for op in ops {
            match op {
                Op::Insert { abstract_handle, native, variant, force } => {
                    let variant = MetaVariant::new(variant);
                    let before = sorted_rows(&table);
                    match table.insert(abstract_handle, native, variant, force) {
                        Ok(_) => {
                            prop_assert_eq!(table.lookup_native(&abstract_handle), Some((native, variant)));
                            prop_assert_eq!(table.lookup_abstract(&native, variant), Some(abstract_handle));
                        }
                        Err(conflict) => {
                            prop_assert!(!force);
                            prop_assert_ne!(conflict.existing, abstract_handle);
                            prop_assert_eq!(sorted_rows(&table), before);
                        }
                    }
                }
                Op::RemoveAbstract(abstract_handle) => {
                    table.remove_abstract(&abstract_handle);
                    prop_assert!(!table.contains(&abstract_handle));
                }
                Op::RemoveNative(native, variant) => {
                    let variant = MetaVariant::new(variant);
                    table.remove_native(&native, variant);
                    prop_assert!(!table.contains_native(&native, variant));
                }
            }

            prop_assert!(table.is_consistent());
            for entry in table.entries() {
                prop_assert_eq!(
                    table.lookup_abstract(&entry.native, entry.variant),
                    Some(entry.abstract_handle)
                );
            }
        }
    }

    #[test]
    fn reinserting_a_binding_is_unchanged(
        abstract_handle in any::<u8>(),
        native in any::<u8>(),
        variant in 0u32..8,
        force in any::<bool>(),
    ) {
        let table = IdentityTable::<u8, u8>::new("item");
        let variant = MetaVariant::new(variant);
        prop_assert_eq!(table.insert(abstract_handle, native, variant, false), Ok(InsertOutcome::Inserted));
        prop_assert_eq!(table.insert(abstract_handle, native, variant, force), Ok(InsertOutcome::Unchanged));
        prop_assert_eq!(table.len(), 1);
    }
}
