use crate::error::AdapterError;
use crate::guard::Unwrap;
use hostbridge_types::{MetaVariant, ObjectId, Payload};
use std::hash::Hash;

/// Per-kind logic plugged into a [`crate::Converter`].
///
/// The adapter knows both object models for one kind (blocks, items,
/// entities): how to enumerate and construct host objects, and how to build
/// abstract objects from them. The converter supplies identity tracking, the
/// recursion guard, locking and event publication around it.
///
/// Hooks with defaults are optional; a kind without variants or persisted
/// payloads only implements the required ones.
pub trait KindAdapter: Send + Sync + 'static {
    type Abstract: Clone + Eq + Hash + Send + Sync + Unwrap<Self::Native> + 'static;
    type Native: Clone + Eq + Hash + Send + Sync + Unwrap<Self::Abstract> + 'static;

    /// Kind label used in logs and error messages.
    const KIND: &'static str;

    // ── Abstraction-layer side ───────────────────────────────────

    /// Stable identifier of an abstract object, unique within the kind.
    fn abstract_id(&self, object: &Self::Abstract) -> ObjectId;

    /// Every abstract object the abstraction layer declared so far.
    fn declared(&self) -> Vec<Self::Abstract>;

    /// Builds the abstract counterpart of a host object.
    ///
    /// Return [`AdapterError::Unsupported`] when the object cannot be
    /// introspected. Runs outside the converter's locks and may convert
    /// other objects of this kind. Threads racing on one host object may each
    /// build one; only the first is mapped, so side effects belong in
    /// [`Self::on_mapped`].
    fn build_abstract(
        &self,
        native: &Self::Native,
        variant: MetaVariant,
        payload: Payload,
    ) -> Result<Self::Abstract, AdapterError>;

    /// Called once a new mapping exists, outside the converter's locks.
    fn on_mapped(&self, object: &Self::Abstract) {
        let _ = object;
    }

    /// Persisted state of an abstract object.
    fn save(&self, object: &Self::Abstract) -> Payload {
        let _ = object;
        Payload::new()
    }

    /// Called at the start of each runtime stage, before any subsystem
    /// runs that stage.
    fn on_stage(&self, stage: &str) -> Result<(), AdapterError> {
        let _ = stage;
        Ok(())
    }

    // ── Host-engine side ─────────────────────────────────────────

    /// Every object in the host's registry for this kind.
    fn native_registry(&self) -> Vec<Self::Native>;

    /// Human-readable host name for logs and errors.
    fn native_name(&self, native: &Self::Native) -> String;

    /// Creates and registers a host object standing in for `object` under `id`.
    ///
    /// Runs outside the converter's locks; events the host publishes from
    /// here may reach the same converter.
    fn construct_native(
        &self,
        object: &Self::Abstract,
        id: &ObjectId,
    ) -> Result<Self::Native, AdapterError>;

    fn read_payload(&self, native: &Self::Native) -> Payload {
        let _ = native;
        Payload::new()
    }

    /// Variant a host object carries on its own.
    fn variant_of(&self, native: &Self::Native) -> MetaVariant {
        let _ = native;
        MetaVariant::DEFAULT
    }

    /// Looks up a host object by its registry name.
    fn find_native(&self, id: &ObjectId) -> Option<Self::Native> {
        let _ = id;
        None
    }

    /// Whether the host object has meaningful sub-variants. When false every
    /// variant collapses to [`MetaVariant::DEFAULT`].
    fn supports_variants(&self, native: &Self::Native) -> bool {
        let _ = native;
        false
    }
}
