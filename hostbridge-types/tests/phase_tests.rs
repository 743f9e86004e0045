use hostbridge_types::{Error, KindPair, LifecyclePhase, PhaseClock};

// ── LifecyclePhase ────────────────────────────────────────────────

#[test]
fn phases_are_totally_ordered() {
    for window in LifecyclePhase::ALL.windows(2) {
        assert!(window[0] < window[1]);
    }
}

#[test]
fn next_walks_the_whole_sequence() {
    let mut phase = LifecyclePhase::Preparation;
    let mut seen = vec![phase];
    while let Some(next) = phase.next() {
        seen.push(next);
        phase = next;
    }
    assert_eq!(seen, LifecyclePhase::ALL.to_vec());
}

#[test]
fn phase_display_is_snake_case() {
    assert_eq!(LifecyclePhase::ConverterRegistration.to_string(), "converter_registration");
    assert_eq!(LifecyclePhase::Runtime.as_str(), "runtime");
}

#[test]
fn phase_serde_matches_display() {
    let json = serde_json::to_string(&LifecyclePhase::BulkExport).unwrap();
    assert_eq!(json, "\"bulk_export\"");
}

// ── PhaseClock / PhaseView ────────────────────────────────────────

#[test]
fn clock_starts_in_preparation() {
    let clock = PhaseClock::new();
    assert_eq!(clock.current(), LifecyclePhase::Preparation);
}

#[test]
fn view_observes_clock_advances() {
    let mut clock = PhaseClock::new();
    let view = clock.view();
    assert!(view.is(LifecyclePhase::Preparation));

    assert_eq!(clock.advance().unwrap(), LifecyclePhase::ConverterRegistration);
    assert!(view.is(LifecyclePhase::ConverterRegistration));
    assert!(view.at_least(LifecyclePhase::Preparation));
    assert!(!view.at_least(LifecyclePhase::BulkImport));
}

#[test]
fn clock_never_regresses() {
    let mut clock = PhaseClock::new();
    let view = clock.view();
    let mut samples = vec![view.current()];
    while clock.advance().is_ok() {
        samples.push(view.current());
    }
    assert!(samples.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(samples.last(), Some(&LifecyclePhase::Runtime));
}

#[test]
fn advancing_past_runtime_fails() {
    let mut clock = PhaseClock::new();
    for _ in 0..4 {
        clock.advance().unwrap();
    }
    assert!(matches!(
        clock.advance(),
        Err(Error::PhaseExhausted(LifecyclePhase::Runtime))
    ));
    assert_eq!(clock.current(), LifecyclePhase::Runtime);
}

#[test]
fn require_reports_expected_and_actual() {
    let clock = PhaseClock::new();
    let err = clock
        .view()
        .require(LifecyclePhase::ConverterRegistration, "register converter")
        .unwrap_err();
    assert_eq!(err.expected, LifecyclePhase::ConverterRegistration);
    assert_eq!(err.actual, LifecyclePhase::Preparation);
    assert_eq!(
        err.to_string(),
        "`register converter` is only allowed during converter_registration, but the bridge is in preparation"
    );
}

#[test]
fn require_passes_in_matching_phase() {
    let clock = PhaseClock::new();
    assert!(clock.view().require(LifecyclePhase::Preparation, "declare").is_ok());
}

// ── KindPair ──────────────────────────────────────────────────────

struct Block;
struct NativeBlock;
struct Item;

#[test]
fn kind_pair_equality_ignores_label() {
    assert_eq!(
        KindPair::of::<Block, NativeBlock>("block"),
        KindPair::of::<Block, NativeBlock>("other")
    );
    assert_ne!(
        KindPair::of::<Block, NativeBlock>("block"),
        KindPair::of::<Item, NativeBlock>("block")
    );
}

#[test]
fn kind_pair_is_checks_types() {
    let kind = KindPair::of::<Block, NativeBlock>("block");
    assert!(kind.is::<Block, NativeBlock>());
    assert!(!kind.is::<NativeBlock, Block>());
}

#[test]
fn kind_pair_display_names_both_sides() {
    let kind = KindPair::of::<Block, NativeBlock>("block");
    let text = kind.to_string();
    assert!(text.starts_with("block ("));
    assert!(text.contains("Block <-> "));
    assert!(text.ends_with("NativeBlock)"));
}
