//! Registration events carried on the [`hostbridge_events::EventBus`].

use hostbridge_types::{EventId, MetaVariant, ObjectId};

/// The abstraction layer announces a new domain object.
///
/// Converters for `A` subscribe to this during converter registration and
/// map every object they have not seen yet.
#[derive(Debug, Clone)]
pub struct Declared<A> {
    pub id: EventId,
    pub object: A,
}

impl<A> Declared<A> {
    #[must_use]
    pub fn new(object: A) -> Self {
        Self {
            id: EventId::new(),
            object,
        }
    }
}

/// A converter established the native counterpart of an abstract object.
#[derive(Debug, Clone)]
pub struct Registered<A, N> {
    pub id: EventId,
    pub kind: &'static str,
    pub object_id: ObjectId,
    pub object: A,
    pub native: N,
    pub variant: MetaVariant,
}
