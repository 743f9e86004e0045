//! Bidirectional object conversion for hostbridge.
//!
//! For every kind of domain object (blocks, items, entities) one
//! [`Converter`] keeps a one-to-one [`IdentityTable`] between the abstraction
//! layer's handles and the host engine's handles:
//!
//! - `to_abstract` maps a host object, building its abstract counterpart on
//!   first sight;
//! - `to_native` returns the host counterpart of a mapped abstract object;
//! - `register_abstract` creates the host counterpart of a declared object.
//!
//! Per-kind knowledge lives in a [`KindAdapter`]. Converters are looked up
//! through the [`ConverterRegistry`] by their (abstract, native) type pair.

mod adapter;
mod converter;
mod error;
mod events;
pub mod guard;
mod registry;
mod table;
pub mod testing;

pub use adapter::KindAdapter;
pub use converter::{
    BindContext, BulkReport, Converter, ConverterLifecycle, ConverterOptions, ConverterStats,
    NativeConverter,
};
pub use error::{AdapterError, ConvertError, ConvertResult};
pub use events::{Declared, Registered};
pub use guard::Unwrap;
pub use registry::ConverterRegistry;
pub use table::{IdentityTable, InsertOutcome, MappingConflict, MappingEntry};
