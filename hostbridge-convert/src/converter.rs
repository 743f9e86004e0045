//! The per-kind converter.
//!
//! [`Converter`] wraps a [`KindAdapter`] with everything that is the same
//! for every kind: the identity table, the recursion guard, the insert lock
//! that serializes table writes, and event-bus wiring.
//!
//! Adapter hooks never run under the insert lock. An adapter may convert
//! other objects of its own kind while building one, and host registration
//! may publish events that reach this converter again.

use crate::adapter::KindAdapter;
use crate::error::{AdapterError, ConvertError, ConvertResult};
use crate::events::{Declared, Registered};
use crate::guard::{self, Unwrap};
use crate::table::IdentityTable;
use hostbridge_events::{EventBus, Subscription};
use hostbridge_types::{
    EventId, KindPair, LifecyclePhase, MetaVariant, ObjectId, Payload, PhaseView, PhaseViolation,
    VariantId,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Per-converter behaviour, normally derived from the bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterOptions {
    /// Namespace given to unqualified ids when a native object is created.
    pub default_namespace: String,
    /// Allow `namespace:path:variant` lookups to map sub-variants lazily.
    pub variant_fallback: bool,
    /// Log every new mapping at `info` instead of `debug`.
    pub log_registrations: bool,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            default_namespace: "bridge".to_string(),
            variant_fallback: true,
            log_registrations: false,
        }
    }
}

/// Everything a converter is attached to during converter registration.
#[derive(Debug, Clone)]
pub struct BindContext {
    pub events: Arc<EventBus>,
    pub phase: PhaseView,
    pub options: ConverterOptions,
}

struct Binding {
    events: Arc<EventBus>,
    phase: PhaseView,
    options: ConverterOptions,
    subscription: Subscription,
}

/// Counters for how conversions were answered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConverterStats {
    /// Conversions answered by the recursion guard.
    pub guard_hits: u64,
    /// Reads of the identity table.
    pub table_lookups: u64,
    /// Abstract objects built from native ones.
    pub constructed: u64,
    /// Native objects created through `register_abstract`.
    pub registered: u64,
}

#[derive(Default)]
struct Counters {
    guard_hits: AtomicU64,
    table_lookups: AtomicU64,
    constructed: AtomicU64,
    registered: AtomicU64,
}

/// Outcome of a bulk import or export pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub kind: &'static str,
    /// Objects enumerated.
    pub scanned: usize,
    /// Mappings created by this pass.
    pub mapped: usize,
    /// Objects that were already mapped or are bridge-made wrappers.
    pub skipped: usize,
    /// Native objects the adapter could not introspect.
    pub unsupported: usize,
    /// Native objects whose abstract counterpart is already bound to another
    /// native object.
    pub conflicts: usize,
}

impl BulkReport {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }
}

/// Object-safe conversion surface handed out by the registry.
pub trait NativeConverter: Send + Sync {
    type Abstract;
    type Native;

    fn kind(&self) -> KindPair;

    fn to_abstract(&self, native: &Self::Native) -> ConvertResult<Self::Abstract>;

    fn to_native(&self, object: &Self::Abstract) -> ConvertResult<Self::Native>;

    fn register_abstract(&self, object: &Self::Abstract) -> ConvertResult<Self::Native>;

    fn contains(&self, object: &Self::Abstract) -> bool;

    fn resolve_variant(&self, text: &str) -> ConvertResult<Option<Self::Abstract>>;

    fn save(&self, object: &Self::Abstract) -> Payload;
}

/// Lifecycle hooks the orchestrator drives, independent of handle types.
pub trait ConverterLifecycle: Send + Sync {
    fn kind(&self) -> KindPair;

    /// Attaches the converter to the event bus and phase clock.
    fn bind(self: Arc<Self>, context: &BindContext) -> ConvertResult<()>;

    fn bulk_import(&self) -> ConvertResult<BulkReport>;

    fn bulk_export(&self) -> ConvertResult<BulkReport>;

    /// Runs the converter's part of a runtime stage.
    fn run_stage(&self, stage: &str) -> ConvertResult<()>;

    /// Number of live mappings.
    fn mapped(&self) -> usize;
}

pub struct Converter<K: KindAdapter> {
    adapter: K,
    kind: KindPair,
    table: IdentityTable<K::Abstract, K::Native>,
    /// Serializes table writes. Holds the abstract objects whose native
    /// counterpart is being constructed.
    insert_lock: Mutex<HashSet<K::Abstract>>,
    options: ConverterOptions,
    binding: OnceLock<Binding>,
    counters: Counters,
}

impl<K: KindAdapter> Converter<K> {
    #[must_use]
    pub fn new(adapter: K) -> Self {
        Self::with_options(adapter, ConverterOptions::default())
    }

    /// Creates a converter with explicit options. Options passed to
    /// [`ConverterLifecycle::bind`] take precedence once bound.
    #[must_use]
    pub fn with_options(adapter: K, options: ConverterOptions) -> Self {
        Self {
            adapter,
            kind: KindPair::of::<K::Abstract, K::Native>(K::KIND),
            table: IdentityTable::new(K::KIND),
            insert_lock: Mutex::new(HashSet::new()),
            options,
            binding: OnceLock::new(),
            counters: Counters::default(),
        }
    }

    pub fn adapter(&self) -> &K {
        &self.adapter
    }

    pub fn kind(&self) -> KindPair {
        self.kind
    }

    pub fn table(&self) -> &IdentityTable<K::Abstract, K::Native> {
        &self.table
    }

    pub fn options(&self) -> &ConverterOptions {
        self.binding
            .get()
            .map_or(&self.options, |binding| &binding.options)
    }

    pub fn is_bound(&self) -> bool {
        self.binding.get().is_some()
    }

    pub fn stats(&self) -> ConverterStats {
        ConverterStats {
            guard_hits: self.counters.guard_hits.load(Ordering::Relaxed),
            table_lookups: self.counters.table_lookups.load(Ordering::Relaxed),
            constructed: self.counters.constructed.load(Ordering::Relaxed),
            registered: self.counters.registered.load(Ordering::Relaxed),
        }
    }

    pub fn contains(&self, object: &K::Abstract) -> bool {
        self.table.contains(object)
    }

    pub fn mapped(&self) -> usize {
        self.table.len()
    }

    // ── Conversions ──────────────────────────────────────────────

    /// Returns the abstract counterpart of `native`, building and mapping it
    /// on first sight.
    pub fn to_abstract(&self, native: &K::Native) -> ConvertResult<K::Abstract> {
        self.to_abstract_variant(native, self.adapter.variant_of(native))
    }

    /// Like [`Self::to_abstract`] for an explicit sub-variant. The variant is
    /// ignored for native objects without variants.
    pub fn to_abstract_variant(
        &self,
        native: &K::Native,
        variant: MetaVariant,
    ) -> ConvertResult<K::Abstract> {
        if let Some(object) = self.guarded::<_, K::Abstract>(native) {
            return Ok(object);
        }

        let variant = self.normalize(native, variant);
        if let Some(object) = self.lookup(native, variant) {
            return Ok(object);
        }
        self.map_native(native, variant).map(|(object, _)| object)
    }

    /// Returns the native counterpart of `object`. Never creates one.
    pub fn to_native(&self, object: &K::Abstract) -> ConvertResult<K::Native> {
        self.to_native_variant(object).map(|(native, _)| native)
    }

    pub fn to_native_variant(
        &self,
        object: &K::Abstract,
    ) -> ConvertResult<(K::Native, MetaVariant)> {
        if let Some(native) = self.guarded::<_, K::Native>(object) {
            let variant = self.adapter.variant_of(&native);
            return Ok((native, variant));
        }

        self.counters.table_lookups.fetch_add(1, Ordering::Relaxed);
        self.table
            .lookup_native(object)
            .ok_or_else(|| ConvertError::UnmappedAbstractObject {
                kind: K::KIND,
                id: self.adapter.abstract_id(object),
            })
    }

    /// Creates the native counterpart of a domain object and maps it.
    ///
    /// A backward wrapper is bound to the native object it already wraps.
    /// Publishes one [`Registered`] event when bound to a bus. Registering an
    /// object whose registration is still under way, e.g. from an event the
    /// host published while constructing it, fails with
    /// [`ConvertError::RegistrationInProgress`].
    pub fn register_abstract(&self, object: &K::Abstract) -> ConvertResult<K::Native> {
        let id = self.adapter.abstract_id(object);
        let claim = self.claim(object, &id)?;

        let (native, variant) = match self.guarded::<_, K::Native>(object) {
            Some(native) => {
                let variant = self.adapter.variant_of(&native);
                (native, variant)
            }
            None => {
                let qualified = id.qualified(&self.options().default_namespace);
                let native = self
                    .adapter
                    .construct_native(object, &qualified)
                    .map_err(|err| Self::adapter_error(err, qualified.to_string()))?;
                (native, MetaVariant::DEFAULT)
            }
        };

        {
            let _pending = self.insert_lock.lock();
            self.insert(object, &native, variant)?;
        }
        drop(claim);
        self.counters.registered.fetch_add(1, Ordering::Relaxed);

        self.log_mapping("registered", &id, &native, variant);
        self.publish_registered(id, object, &native, variant);
        Ok(native)
    }

    pub fn save(&self, object: &K::Abstract) -> Payload {
        self.adapter.save(object)
    }

    /// Forgets the mapping of `object`, e.g. after the host unloaded it.
    pub fn unmap_abstract(&self, object: &K::Abstract) -> Option<K::Native> {
        let (native, variant) = self.table.remove_abstract(object)?;
        debug!(
            kind = K::KIND,
            id = %self.adapter.abstract_id(object),
            variant = %variant,
            "unmapped"
        );
        Some(native)
    }

    pub fn unmap_native(&self, native: &K::Native, variant: MetaVariant) -> Option<K::Abstract> {
        let object = self.table.remove_native(native, variant)?;
        debug!(
            kind = K::KIND,
            native = %self.adapter.native_name(native),
            variant = %variant,
            "unmapped"
        );
        Some(object)
    }

    /// Maps a sub-variant named as `namespace:path:variant` that bulk import
    /// did not enumerate.
    ///
    /// Returns `Ok(None)` when the fallback is disabled, the text is not a
    /// variant id, the host has no such object, or the object has no
    /// variants. Only allowed from bulk import onward.
    pub fn resolve_variant(&self, text: &str) -> ConvertResult<Option<K::Abstract>> {
        if !self.options().variant_fallback {
            return Ok(None);
        }
        if let Some(binding) = self.binding.get() {
            let actual = binding.phase.current();
            if actual < LifecyclePhase::BulkImport {
                return Err(PhaseViolation {
                    operation: format!("resolve {} variant '{text}'", K::KIND),
                    expected: LifecyclePhase::BulkImport,
                    actual,
                }
                .into());
            }
        }

        let Ok(variant_id) = VariantId::parse(text) else {
            return Ok(None);
        };
        let Some(native) = self.adapter.find_native(&variant_id.id) else {
            debug!(kind = K::KIND, id = %variant_id.id, "variant fallback found no host object");
            return Ok(None);
        };
        if !self.adapter.supports_variants(&native) {
            return Ok(None);
        }
        self.to_abstract_variant(&native, variant_id.variant).map(Some)
    }

    // ── Bulk passes ──────────────────────────────────────────────

    /// Maps every host object that is not mapped yet.
    pub fn bulk_import(&self) -> ConvertResult<BulkReport> {
        self.require_phase(LifecyclePhase::BulkImport, "bulk import")?;
        let mut report = BulkReport::new(K::KIND);

        for native in self.adapter.native_registry() {
            report.scanned += 1;
            // Wrappers the bridge made are mapped by register_abstract.
            if self.guarded::<_, K::Abstract>(&native).is_some() {
                report.skipped += 1;
                continue;
            }

            let variant = self.normalize(&native, self.adapter.variant_of(&native));
            if self.lookup(&native, variant).is_some() {
                report.skipped += 1;
                continue;
            }

            match self.map_native(&native, variant) {
                Ok((_, true)) => report.mapped += 1,
                Ok((_, false)) => report.skipped += 1,
                Err(ConvertError::UnsupportedNativeObject { native, reason, .. }) => {
                    warn!(
                        kind = K::KIND,
                        native = %native,
                        reason = %reason,
                        "skipping native object the adapter cannot introspect"
                    );
                    report.unsupported += 1;
                }
                Err(ConvertError::IdentityTaken { id, bound, incoming, .. }) => {
                    warn!(
                        kind = K::KIND,
                        id = %id,
                        bound = %bound,
                        native = %incoming,
                        "skipping native object whose identity is already taken"
                    );
                    report.conflicts += 1;
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            kind = K::KIND,
            scanned = report.scanned,
            mapped = report.mapped,
            skipped = report.skipped,
            unsupported = report.unsupported,
            conflicts = report.conflicts,
            "bulk import finished"
        );
        Ok(report)
    }

    /// Creates native counterparts for every declared object not mapped yet.
    pub fn bulk_export(&self) -> ConvertResult<BulkReport> {
        self.require_phase(LifecyclePhase::BulkExport, "bulk export")?;
        let mut report = BulkReport::new(K::KIND);

        for object in self.adapter.declared() {
            report.scanned += 1;
            if self.table.contains(&object) {
                report.skipped += 1;
                continue;
            }
            match self.register_abstract(&object) {
                Ok(_) => report.mapped += 1,
                Err(
                    ConvertError::AlreadyRegistered { .. }
                    | ConvertError::RegistrationInProgress { .. },
                ) => report.skipped += 1,
                Err(err) => return Err(err),
            }
        }

        info!(
            kind = K::KIND,
            scanned = report.scanned,
            mapped = report.mapped,
            skipped = report.skipped,
            "bulk export finished"
        );
        Ok(report)
    }

    /// Hands a runtime stage to the adapter.
    pub fn run_stage(&self, stage: &str) -> ConvertResult<()> {
        self.require_phase(LifecyclePhase::Runtime, "stage")?;
        debug!(kind = K::KIND, stage, "running converter stage");
        self.adapter
            .on_stage(stage)
            .map_err(|err| ConvertError::Adapter {
                kind: K::KIND,
                subject: format!("stage '{stage}'"),
                source: match err {
                    AdapterError::Other(source) => source,
                    unsupported @ AdapterError::Unsupported(_) => {
                        anyhow::Error::new(unsupported)
                    }
                },
            })
    }

    // ── Internals ────────────────────────────────────────────────

    fn guarded<S, T>(&self, value: &S) -> Option<T>
    where
        S: Unwrap<T>,
    {
        let counterpart = guard::short_circuit(value)?;
        self.counters.guard_hits.fetch_add(1, Ordering::Relaxed);
        Some(counterpart)
    }

    fn lookup(&self, native: &K::Native, variant: MetaVariant) -> Option<K::Abstract> {
        self.counters.table_lookups.fetch_add(1, Ordering::Relaxed);
        self.table.lookup_abstract(native, variant)
    }

    fn normalize(&self, native: &K::Native, variant: MetaVariant) -> MetaVariant {
        if self.adapter.supports_variants(native) {
            variant
        } else {
            MetaVariant::DEFAULT
        }
    }

    /// Construct-on-miss. Returns the abstract object and whether this call
    /// created the mapping.
    ///
    /// The object is built before taking the insert lock. When another call
    /// mapped the key in the meantime, its object wins and ours is dropped.
    fn map_native(
        &self,
        native: &K::Native,
        variant: MetaVariant,
    ) -> ConvertResult<(K::Abstract, bool)> {
        let payload = self.adapter.read_payload(native);
        let object = self
            .adapter
            .build_abstract(native, variant, payload)
            .map_err(|err| Self::adapter_error(err, self.adapter.native_name(native)))?;

        {
            let _pending = self.insert_lock.lock();
            if let Some(existing) = self.lookup(native, variant) {
                return Ok((existing, false));
            }
            self.insert(&object, native, variant)?;
            self.counters.constructed.fetch_add(1, Ordering::Relaxed);
        }

        let id = self.adapter.abstract_id(&object);
        self.log_mapping("mapped", &id, native, variant);
        self.adapter.on_mapped(&object);
        Ok((object, true))
    }

    /// Marks `object` as being registered. Released when the claim drops.
    fn claim(
        &self,
        object: &K::Abstract,
        id: &ObjectId,
    ) -> ConvertResult<Claim<'_, K::Abstract>> {
        let mut pending = self.insert_lock.lock();
        if self.table.contains(object) {
            return Err(ConvertError::AlreadyRegistered {
                kind: K::KIND,
                id: id.clone(),
            });
        }
        if !pending.insert(object.clone()) {
            return Err(ConvertError::RegistrationInProgress {
                kind: K::KIND,
                id: id.clone(),
            });
        }
        Ok(Claim {
            pending: &self.insert_lock,
            object: object.clone(),
        })
    }

    /// Inserts a new mapping. Must be called with the insert lock held.
    ///
    /// Never rebinds: an abstract object already mapped to a different
    /// native key keeps its mapping.
    fn insert(
        &self,
        object: &K::Abstract,
        native: &K::Native,
        variant: MetaVariant,
    ) -> ConvertResult<()> {
        if let Some((bound, bound_variant)) = self.table.lookup_native(object)
            && (bound != *native || bound_variant != variant)
        {
            return Err(ConvertError::IdentityTaken {
                kind: K::KIND,
                id: self.adapter.abstract_id(object),
                bound: self.adapter.native_name(&bound),
                incoming: self.adapter.native_name(native),
            });
        }

        self.table
            .insert(object.clone(), native.clone(), variant, false)
            .map(|_| ())
            .map_err(|conflict| ConvertError::DuplicateMapping {
                kind: K::KIND,
                native: self.adapter.native_name(native),
                variant,
                existing: self.adapter.abstract_id(&conflict.existing),
                incoming: self.adapter.abstract_id(&conflict.incoming),
            })
    }

    fn adapter_error(err: AdapterError, subject: String) -> ConvertError {
        match err {
            AdapterError::Unsupported(reason) => ConvertError::UnsupportedNativeObject {
                kind: K::KIND,
                native: subject,
                reason,
            },
            AdapterError::Other(source) => ConvertError::Adapter {
                kind: K::KIND,
                subject,
                source,
            },
        }
    }

    fn require_phase(&self, expected: LifecyclePhase, operation: &str) -> ConvertResult<()> {
        match self.binding.get() {
            Some(binding) => Ok(binding
                .phase
                .require(expected, &format!("{} {operation}", K::KIND))?),
            None => Ok(()),
        }
    }

    fn log_mapping(
        &self,
        action: &'static str,
        id: &ObjectId,
        native: &K::Native,
        variant: MetaVariant,
    ) {
        let native = self.adapter.native_name(native);
        if self.options().log_registrations {
            info!(kind = K::KIND, id = %id, native = %native, variant = %variant, "{action}");
        } else {
            debug!(kind = K::KIND, id = %id, native = %native, variant = %variant, "{action}");
        }
    }

    fn publish_registered(
        &self,
        object_id: ObjectId,
        object: &K::Abstract,
        native: &K::Native,
        variant: MetaVariant,
    ) {
        let Some(binding) = self.binding.get() else {
            return;
        };
        binding.events.publish(Registered {
            id: EventId::new(),
            kind: K::KIND,
            object_id,
            object: object.clone(),
            native: native.clone(),
            variant,
        });
    }
}

struct Claim<'a, A: Eq + Hash> {
    pending: &'a Mutex<HashSet<A>>,
    object: A,
}

impl<A: Eq + Hash> Drop for Claim<'_, A> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.object);
    }
}

impl<K: KindAdapter> fmt::Debug for Converter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("kind", &self.kind)
            .field("mapped", &self.table.len())
            .field(
                "subscription",
                &self.binding.get().map(|binding| binding.subscription.id()),
            )
            .finish()
    }
}

impl<K: KindAdapter> NativeConverter for Converter<K> {
    type Abstract = K::Abstract;
    type Native = K::Native;

    fn kind(&self) -> KindPair {
        self.kind
    }

    fn to_abstract(&self, native: &K::Native) -> ConvertResult<K::Abstract> {
        Converter::to_abstract(self, native)
    }

    fn to_native(&self, object: &K::Abstract) -> ConvertResult<K::Native> {
        Converter::to_native(self, object)
    }

    fn register_abstract(&self, object: &K::Abstract) -> ConvertResult<K::Native> {
        Converter::register_abstract(self, object)
    }

    fn contains(&self, object: &K::Abstract) -> bool {
        Converter::contains(self, object)
    }

    fn resolve_variant(&self, text: &str) -> ConvertResult<Option<K::Abstract>> {
        Converter::resolve_variant(self, text)
    }

    fn save(&self, object: &K::Abstract) -> Payload {
        Converter::save(self, object)
    }
}

impl<K: KindAdapter> ConverterLifecycle for Converter<K> {
    fn kind(&self) -> KindPair {
        self.kind
    }

    fn bind(self: Arc<Self>, context: &BindContext) -> ConvertResult<()> {
        if self.is_bound() {
            return Err(ConvertError::AlreadyBound { kind: K::KIND });
        }

        let weak = Arc::downgrade(&self);
        let subscription = context.events.subscribe::<Declared<K::Abstract>, _>(
            format!("converter:{}", K::KIND),
            move |event| {
                let Some(converter) = weak.upgrade() else {
                    return Ok(());
                };
                match converter.register_abstract(&event.object) {
                    Ok(_)
                    | Err(
                        ConvertError::AlreadyRegistered { .. }
                        | ConvertError::RegistrationInProgress { .. },
                    ) => Ok(()),
                    Err(err) => Err(err.into()),
                }
            },
        )?;

        let binding = Binding {
            events: Arc::clone(&context.events),
            phase: context.phase.clone(),
            options: context.options.clone(),
            subscription,
        };
        if let Err(binding) = self.binding.set(binding) {
            binding.events.unsubscribe(&binding.subscription)?;
            return Err(ConvertError::AlreadyBound { kind: K::KIND });
        }

        info!(kind = %self.kind, "converter bound to event bus");
        Ok(())
    }

    fn bulk_import(&self) -> ConvertResult<BulkReport> {
        Converter::bulk_import(self)
    }

    fn bulk_export(&self) -> ConvertResult<BulkReport> {
        Converter::bulk_export(self)
    }

    fn run_stage(&self, stage: &str) -> ConvertResult<()> {
        Converter::run_stage(self, stage)
    }

    fn mapped(&self) -> usize {
        Converter::mapped(self)
    }
}
