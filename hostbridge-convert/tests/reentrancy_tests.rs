use hostbridge_convert::testing::{BlockAdapter, BlockFactory, BlockWorld, HostBlock, NativeBlock};
use hostbridge_convert::{
    AdapterError, BindContext, ConvertError, Converter, ConverterLifecycle, ConverterOptions,
    Declared, KindAdapter, Registered,
};
use hostbridge_events::EventBus;
use hostbridge_types::{LifecyclePhase, MetaVariant, ObjectId, Payload, PhaseClock};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, OnceLock, Weak};
use std::thread;
use std::time::Duration;

fn oid(s: &str) -> ObjectId {
    ObjectId::parse(s).unwrap()
}

/// Block adapter whose hooks call back into their own converter: derived
/// blocks convert their base block while being built, and the host announces
/// further declared blocks while constructing one.
struct ReentrantBlocks {
    inner: BlockAdapter,
    converter: OnceLock<Weak<Converter<ReentrantBlocks>>>,
    events: OnceLock<Arc<EventBus>>,
    bases: Mutex<HashMap<ObjectId, NativeBlock>>,
    announcements: Mutex<HashMap<ObjectId, BlockFactory>>,
    bases_seen: Mutex<Vec<ObjectId>>,
}

impl ReentrantBlocks {
    fn new(world: &BlockWorld) -> Self {
        Self {
            inner: world.adapter(),
            converter: OnceLock::new(),
            events: OnceLock::new(),
            bases: Mutex::new(HashMap::new()),
            announcements: Mutex::new(HashMap::new()),
            bases_seen: Mutex::new(Vec::new()),
        }
    }

    fn derive(&self, derived: &NativeBlock, base: &NativeBlock) {
        self.bases.lock().insert(derived.name().clone(), base.clone());
    }

    fn announce_on_construct(&self, constructed: &str, announced: BlockFactory) {
        self.announcements.lock().insert(oid(constructed), announced);
    }
}

impl KindAdapter for ReentrantBlocks {
    type Abstract = BlockFactory;
    type Native = NativeBlock;

    const KIND: &'static str = "block";

    fn abstract_id(&self, object: &BlockFactory) -> ObjectId {
        self.inner.abstract_id(object)
    }

    fn declared(&self) -> Vec<BlockFactory> {
        self.inner.declared()
    }

    fn build_abstract(
        &self,
        native: &NativeBlock,
        variant: MetaVariant,
        payload: Payload,
    ) -> Result<BlockFactory, AdapterError> {
        let base = self.bases.lock().get(native.name()).cloned();
        if let Some(base) = base {
            let converter = self
                .converter
                .get()
                .and_then(Weak::upgrade)
                .ok_or_else(|| anyhow::anyhow!("converter dropped"))?;
            let base = converter.to_abstract(&base).map_err(anyhow::Error::from)?;
            self.bases_seen.lock().push(base.id().clone());
        }
        self.inner.build_abstract(native, variant, payload)
    }

    fn on_mapped(&self, object: &BlockFactory) {
        self.inner.on_mapped(object);
    }

    fn native_registry(&self) -> Vec<NativeBlock> {
        self.inner.native_registry()
    }

    fn native_name(&self, native: &NativeBlock) -> String {
        self.inner.native_name(native)
    }

    fn construct_native(
        &self,
        object: &BlockFactory,
        id: &ObjectId,
    ) -> Result<NativeBlock, AdapterError> {
        let announced = self.announcements.lock().remove(object.id());
        if let (Some(announced), Some(events)) = (announced, self.events.get()) {
            events.publish(Declared::new(announced));
        }
        self.inner.construct_native(object, id)
    }
}

fn converter(adapter: ReentrantBlocks) -> Arc<Converter<ReentrantBlocks>> {
    let converter = Arc::new(Converter::new(adapter));
    converter
        .adapter()
        .converter
        .set(Arc::downgrade(&converter))
        .unwrap();
    converter
}

fn bind_at(converter: &Arc<Converter<ReentrantBlocks>>, phase: LifecyclePhase) -> Arc<EventBus> {
    let mut clock = PhaseClock::new();
    while clock.current() < phase {
        clock.advance().unwrap();
    }
    let events = Arc::new(EventBus::new());
    converter.adapter().events.set(Arc::clone(&events)).unwrap();
    Arc::clone(converter)
        .bind(&BindContext {
            events: Arc::clone(&events),
            phase: clock.view(),
            options: ConverterOptions::default(),
        })
        .unwrap();
    events
}

/// Runs `work` on another thread and fails the test if it never returns.
fn within_deadline<T: Send + 'static>(work: impl FnOnce() -> T + Send + 'static) -> T {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(work());
    });
    rx.recv_timeout(Duration::from_secs(5))
        .expect("conversion did not return")
}

// ── Building ─────────────────────────────────────────────────────

#[test]
fn derived_block_converts_its_base_while_building() {
    let world = BlockWorld::new();
    let stone = world.host.add(HostBlock::new(oid("minecraft:stone")));
    let slab = world.host.add(HostBlock::new(oid("minecraft:stone_slab")));
    let adapter = ReentrantBlocks::new(&world);
    adapter.derive(&slab, &stone);
    let converter = converter(adapter);

    let worker = Arc::clone(&converter);
    let factory = within_deadline(move || worker.to_abstract(&slab).map(|f| f.id().clone()));

    assert_eq!(factory.unwrap().as_str(), "stone_slab");
    assert_eq!(converter.mapped(), 2);
    assert_eq!(*converter.adapter().bases_seen.lock(), vec![oid("stone")]);
    assert_eq!(converter.to_abstract(&stone).unwrap().id().as_str(), "stone");
    assert_eq!(world.domain.adopted().len(), 2);
}

#[test]
fn bulk_import_with_derived_blocks_maps_each_once() {
    let world = BlockWorld::new();
    let slab = world.host.add(HostBlock::new(oid("minecraft:stone_slab")));
    let stone = world.host.add(HostBlock::new(oid("minecraft:stone")));
    let adapter = ReentrantBlocks::new(&world);
    adapter.derive(&slab, &stone);
    let converter = converter(adapter);

    let worker = Arc::clone(&converter);
    let first = within_deadline(move || worker.bulk_import()).unwrap();
    assert_eq!(first.mapped, 1);
    assert_eq!(first.skipped, 1);
    assert_eq!(converter.mapped(), 2);

    let second = converter.bulk_import().unwrap();
    assert_eq!(second.mapped, 0);
    assert_eq!(converter.mapped(), 2);
    assert_eq!(world.domain.adopted().len(), 2);
}

// ── Host registration ────────────────────────────────────────────

#[test]
fn host_announcing_another_block_during_export_registers_both() {
    let world = BlockWorld::new();
    let furnace = BlockFactory::declared(oid("mymod:furnace"));
    let lit = BlockFactory::declared(oid("mymod:lit_furnace"));
    world.domain.declare(furnace.clone());
    let adapter = ReentrantBlocks::new(&world);
    adapter.announce_on_construct("mymod:furnace", lit.clone());
    let converter = converter(adapter);
    bind_at(&converter, LifecyclePhase::BulkExport);

    let worker = Arc::clone(&converter);
    let report = within_deadline(move || worker.bulk_export()).unwrap();

    assert_eq!(report.mapped, 1);
    assert!(converter.contains(&furnace));
    assert!(converter.contains(&lit));
    assert_eq!(converter.mapped(), 2);
}

#[test]
fn host_announcing_the_block_under_construction_registers_it_once() {
    let world = BlockWorld::new();
    let furnace = BlockFactory::declared(oid("mymod:furnace"));
    let adapter = ReentrantBlocks::new(&world);
    adapter.announce_on_construct("mymod:furnace", furnace.clone());
    let converter = converter(adapter);
    let events = bind_at(&converter, LifecyclePhase::Runtime);

    let registered = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&registered);
    events
        .subscribe::<Registered<BlockFactory, NativeBlock>, _>("counter", move |_| {
            *sink.lock() += 1;
            Ok(())
        })
        .unwrap();

    let worker = Arc::clone(&converter);
    let target = furnace.clone();
    let native = within_deadline(move || worker.register_abstract(&target)).unwrap();

    assert_eq!(native.name().as_str(), "mymod:furnace");
    assert_eq!(converter.mapped(), 1);
    assert_eq!(*registered.lock(), 1);
    assert!(matches!(
        converter.register_abstract(&furnace).unwrap_err(),
        ConvertError::AlreadyRegistered { .. }
    ));
}

#[test]
fn registration_in_progress_is_reported_not_awaited() {
    let world = BlockWorld::new();
    let furnace = BlockFactory::declared(oid("mymod:furnace"));
    let adapter = ReentrantBlocks::new(&world);
    adapter.announce_on_construct("mymod:furnace", furnace.clone());
    let converter = converter(adapter);
    let events = bind_at(&converter, LifecyclePhase::Runtime);

    // A second subscriber registers directly and sees the claim.
    let observed = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&observed);
    let weak = Arc::downgrade(&converter);
    events
        .subscribe::<Declared<BlockFactory>, _>("observer", move |event| {
            if let Some(converter) = weak.upgrade() {
                *sink.lock() = converter.register_abstract(&event.object).err();
            }
            Ok(())
        })
        .unwrap();

    let worker = Arc::clone(&converter);
    within_deadline(move || worker.register_abstract(&furnace).map(|_| ())).unwrap();

    assert!(matches!(
        observed.lock().take(),
        Some(ConvertError::RegistrationInProgress { kind: "block", ref id }) if id.as_str() == "mymod:furnace"
    ));
    assert_eq!(converter.mapped(), 1);
}
