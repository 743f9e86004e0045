//! Converter registry.
//!
//! Maps each (abstract type, native type) pair to exactly one converter.
//! Registration is only open during the converter-registration phase;
//! lookups are allowed at any time.

use crate::converter::{ConverterLifecycle, NativeConverter};
use crate::error::{ConvertError, ConvertResult};
use hostbridge_types::{KindPair, LifecyclePhase, PhaseView};
use parking_lot::RwLock;
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

type TypedConverter<A, N> = Arc<dyn NativeConverter<Abstract = A, Native = N>>;

struct Entry {
    kind: KindPair,
    /// Holds a `TypedConverter<A, N>`.
    typed: Box<dyn Any + Send + Sync>,
    /// Holds the concrete `Arc<C>`.
    concrete: Arc<dyn Any + Send + Sync>,
    lifecycle: Arc<dyn ConverterLifecycle>,
}

#[derive(Default)]
struct Slots {
    entries: Vec<Entry>,
    index: HashMap<KindPair, usize>,
}

pub struct ConverterRegistry {
    phase: PhaseView,
    slots: RwLock<Slots>,
}

impl ConverterRegistry {
    #[must_use]
    pub fn new(phase: PhaseView) -> Self {
        Self {
            phase,
            slots: RwLock::new(Slots::default()),
        }
    }

    /// Registers `converter` for its kind pair.
    pub fn register<C>(&self, converter: Arc<C>) -> ConvertResult<()>
    where
        C: NativeConverter + ConverterLifecycle + 'static,
        C::Abstract: 'static,
        C::Native: 'static,
    {
        let kind = NativeConverter::kind(converter.as_ref());
        self.phase.require(
            LifecyclePhase::ConverterRegistration,
            &format!("register {kind} converter"),
        )?;

        let mut slots = self.slots.write();
        if slots.index.contains_key(&kind) {
            return Err(ConvertError::DuplicateConverter {
                kind: kind.to_string(),
            });
        }

        let typed: TypedConverter<C::Abstract, C::Native> = converter.clone();
        let position = slots.entries.len();
        slots.entries.push(Entry {
            kind,
            typed: Box::new(typed),
            concrete: converter.clone(),
            lifecycle: converter,
        });
        slots.index.insert(kind, position);

        info!(kind = %kind, "converter registered");
        Ok(())
    }

    /// The converter bridging `A` and `N`.
    pub fn resolve<A: 'static, N: 'static>(&self) -> ConvertResult<TypedConverter<A, N>> {
        let slots = self.slots.read();
        slots
            .index
            .get(&KindPair::of::<A, N>(""))
            .and_then(|&position| {
                slots.entries[position]
                    .typed
                    .downcast_ref::<TypedConverter<A, N>>()
            })
            .cloned()
            .ok_or(ConvertError::NoConverter {
                abstract_type: type_name::<A>(),
                native_type: type_name::<N>(),
            })
    }

    /// The registered converter of concrete type `C`, for operations outside
    /// the [`NativeConverter`] surface.
    pub fn get<C: Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.slots
            .read()
            .entries
            .iter()
            .find_map(|entry| Arc::clone(&entry.concrete).downcast::<C>().ok())
    }

    #[must_use]
    pub fn contains<A: 'static, N: 'static>(&self) -> bool {
        self.slots
            .read()
            .index
            .contains_key(&KindPair::of::<A, N>(""))
    }

    /// Lifecycle handles in registration order.
    #[must_use]
    pub fn lifecycles(&self) -> Vec<Arc<dyn ConverterLifecycle>> {
        self.slots
            .read()
            .entries
            .iter()
            .map(|entry| Arc::clone(&entry.lifecycle))
            .collect()
    }

    #[must_use]
    pub fn kinds(&self) -> Vec<KindPair> {
        self.slots.read().entries.iter().map(|entry| entry.kind).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("phase", &self.phase.current())
            .field("kinds", &self.kinds())
            .finish()
    }
}
