use hostbridge_convert::testing::{BlockAdapter, BlockFactory, BlockWorld, HostBlock, NativeBlock};
use hostbridge_convert::{
    ConvertError, Converter, ConverterLifecycle, ConverterRegistry, NativeConverter,
};
use hostbridge_types::{LifecyclePhase, ObjectId, PhaseClock};
use std::sync::Arc;

fn oid(s: &str) -> ObjectId {
    ObjectId::parse(s).unwrap()
}

fn registration_clock() -> PhaseClock {
    let mut clock = PhaseClock::new();
    clock.advance().unwrap();
    assert_eq!(clock.current(), LifecyclePhase::ConverterRegistration);
    clock
}

// ── Registration ─────────────────────────────────────────────────

#[test]
fn register_then_resolve() {
    let clock = registration_clock();
    let registry = ConverterRegistry::new(clock.view());
    let world = BlockWorld::new();
    let air = world.host.add(HostBlock::new(oid("minecraft:air")));

    registry.register(Arc::new(world.converter())).unwrap();

    let converter = registry.resolve::<BlockFactory, NativeBlock>().unwrap();
    assert_eq!(converter.kind().label(), "block");
    assert_eq!(converter.to_abstract(&air).unwrap().id().as_str(), "air");
    assert!(registry.contains::<BlockFactory, NativeBlock>());
    assert_eq!(registry.len(), 1);
}

#[test]
fn second_converter_for_same_pair_is_rejected() {
    let clock = registration_clock();
    let registry = ConverterRegistry::new(clock.view());
    let world = BlockWorld::new();

    registry.register(Arc::new(world.converter())).unwrap();
    let err = registry.register(Arc::new(world.converter())).unwrap_err();

    assert!(matches!(err, ConvertError::DuplicateConverter { ref kind } if kind.starts_with("block")));
    assert_eq!(registry.len(), 1);
}

#[test]
fn register_outside_registration_phase_fails() {
    let clock = PhaseClock::new();
    let registry = ConverterRegistry::new(clock.view());

    let err = registry
        .register(Arc::new(BlockWorld::new().converter()))
        .unwrap_err();
    assert!(matches!(
        err,
        ConvertError::PhaseViolation(ref violation)
            if violation.expected == LifecyclePhase::ConverterRegistration
                && violation.actual == LifecyclePhase::Preparation
    ));
    assert!(registry.is_empty());
}

#[test]
fn registration_closes_after_its_phase() {
    let mut clock = registration_clock();
    let registry = ConverterRegistry::new(clock.view());
    clock.advance().unwrap();

    assert!(registry.register(Arc::new(BlockWorld::new().converter())).is_err());
}

// ── Lookup ───────────────────────────────────────────────────────

#[test]
fn resolve_unknown_pair_fails() {
    let clock = registration_clock();
    let registry = ConverterRegistry::new(clock.view());
    registry.register(Arc::new(BlockWorld::new().converter())).unwrap();

    let err = registry.resolve::<String, u32>().err().unwrap();
    assert!(matches!(
        err,
        ConvertError::NoConverter { abstract_type, native_type }
            if abstract_type.ends_with("String") && native_type == "u32"
    ));
}

#[test]
fn get_returns_concrete_converter() {
    let clock = registration_clock();
    let registry = ConverterRegistry::new(clock.view());
    registry.register(Arc::new(BlockWorld::new().converter())).unwrap();

    let converter = registry.get::<Converter<BlockAdapter>>().unwrap();
    assert_eq!(converter.options().default_namespace, "bridge");
    assert!(registry.get::<String>().is_none());
}

#[test]
fn lifecycles_follow_registration_order() {
    let clock = registration_clock();
    let registry = ConverterRegistry::new(clock.view());
    registry.register(Arc::new(BlockWorld::new().converter())).unwrap();

    let lifecycles = registry.lifecycles();
    assert_eq!(lifecycles.len(), 1);
    assert_eq!(lifecycles[0].kind().label(), "block");
    assert_eq!(registry.kinds()[0].label(), "block");
}
