#![cfg(feature = "rtrb")]

use modweave::{
    engine::{EngineBuilder, ModEngine},
    params::ParamRange,
    routing::event::ControlHandle,
    sources::{Off, SourceCatalogue, Steady},
};

const SAMPLE_RATE: f32 = 48_000.0;
const BLOCK: usize = 128;

/// Three slots over two parameters, with a constant full-scale source at
/// catalogue id 1. Target choice list: None, Freq, Cutoff, then the three
/// amount parameters, six entries in all.
fn rig() -> (ModEngine, ControlHandle) {
    let mut catalogue = SourceCatalogue::new();
    catalogue.push("Off", Box::new(Off));
    catalogue.push("One", Box::new(Steady::new(1.0)));

    let mut builder = EngineBuilder::new();
    builder.catalogue(catalogue);
    builder.param("Freq", ParamRange::linear(0.0, 1.0), 0.5);
    builder.param("Cutoff", ParamRange::linear(0.0, 1.0), 0.5);
    builder.slots(3);
    let (mut engine, handle) = builder.build();
    engine.prepare(SAMPLE_RATE, BLOCK);
    (engine, handle)
}

/// Normalized choice value for an index in a list of `count` entries.
fn choice(index: usize, count: usize) -> f32 {
    index as f32 / (count - 1) as f32
}

/// Slot S is in P's back-references iff S targets P, for every pair.
fn assert_bindings_consistent(engine: &ModEngine) {
    for handle in engine.registry().handles() {
        for slot in 0..engine.router().slot_count() {
            assert_eq!(
                engine.registry().param(handle).is_modulated_by(slot),
                engine.router().slot(slot).target() == Some(handle),
                "slot {} vs {:?}",
                slot,
                engine.registry().param(handle).id()
            );
        }
    }
}

#[test]
fn queued_reassignment_scenario() {
    let (mut engine, mut handle) = rig();
    let freq = engine.lookup("Freq").unwrap();
    let cutoff = engine.lookup("Cutoff").unwrap();
    let count = engine.router().target_choice_count();

    // Slot 0 -> Freq
    assert!(handle.set_slot_target(0, choice(1, count)));
    engine.run_block(BLOCK);
    assert!(engine.registry().param(freq).is_modulated_by(0));
    assert_eq!(engine.registry().param(freq).modulators().len(), 1);
    assert_bindings_consistent(&engine);

    // Slot 0 -> Cutoff; Freq must be cleaned up
    assert!(handle.set_slot_target(0, choice(2, count)));
    engine.run_block(BLOCK);
    assert!(engine.registry().param(freq).modulators().is_empty());
    assert!(engine.registry().param(cutoff).is_modulated_by(0));
    assert_bindings_consistent(&engine);

    // Slot 0 -> None
    assert!(handle.set_slot_target(0, choice(0, count)));
    engine.run_block(BLOCK);
    assert!(engine.registry().param(cutoff).modulators().is_empty());
    assert_eq!(engine.router().slot(0).target(), None);
    assert_bindings_consistent(&engine);
}

#[test]
fn repeated_choice_is_idempotent() {
    let (mut engine, mut handle) = rig();
    let freq = engine.lookup("Freq").unwrap();
    let count = engine.router().target_choice_count();

    for _ in 0..3 {
        assert!(handle.set_slot_target(1, choice(1, count)));
    }
    engine.run_block(BLOCK);

    assert_eq!(engine.registry().param(freq).modulators().len(), 1);
    assert!(engine.registry().param(freq).is_modulated_by(1));
    assert_bindings_consistent(&engine);
}

#[test]
fn rewiring_applies_between_blocks() {
    let (mut engine, mut handle) = rig();
    let freq = engine.lookup("Freq").unwrap();
    let cutoff = engine.lookup("Cutoff").unwrap();
    let count = engine.router().target_choice_count();
    let amount_0 = engine.router().slot(0).amount();

    handle.set_slot_target(0, choice(1, count));
    handle.set_slot_source(0, 1.0); // id 1, the constant source
    handle.set_param_base(amount_0, 0.25);

    // Let the amount glide settle, then check the modulated value
    for _ in 0..100 {
        engine.run_block(BLOCK);
    }
    let last = engine.values(freq)[BLOCK - 1];
    assert!((last - 0.75).abs() < 1e-3, "expected 0.75, got {}", last);
    assert!((engine.values(cutoff)[BLOCK - 1] - 0.5).abs() < 1e-4);

    // Swap the target; the modulation must follow it
    handle.set_slot_target(0, choice(2, count));
    for _ in 0..2 {
        engine.run_block(BLOCK);
    }
    assert!((engine.values(freq)[BLOCK - 1] - 0.5).abs() < 1e-3);
    assert!((engine.values(cutoff)[BLOCK - 1] - 0.75).abs() < 1e-3);
    assert_bindings_consistent(&engine);
}

#[test]
fn output_stays_within_amount_bound() {
    // An LFO at full swing through amount 0.5 may move the parameter by
    // at most 0.5 in the normalized domain.
    let mut builder = EngineBuilder::new();
    builder.param("Level", ParamRange::linear(0.0, 1.0), 0.5);
    builder.slots(1);
    builder.bind_slot(0, "Level", 1, 0.5); // builtin id 1 = LFO Sine
    let mut engine = builder.build_local();
    engine.prepare(SAMPLE_RATE, 256);

    let level = engine.lookup("Level").unwrap();
    for _ in 0..200 {
        engine.run_block(256);
        for &v in engine.values(level) {
            assert!((v - 0.5).abs() <= 0.5 + 1e-5, "out of bound: {}", v);
        }
    }
}

#[test]
fn block_length_always_matches_request() {
    let (mut engine, _handle) = rig();
    let freq = engine.lookup("Freq").unwrap();

    engine.run_block(BLOCK);
    assert_eq!(engine.values(freq).len(), BLOCK);

    engine.run_block(32);
    assert_eq!(engine.values(freq).len(), 32);

    engine.prepare(SAMPLE_RATE, 512);
    engine.run_block(512);
    assert_eq!(engine.values(freq).len(), 512);
}

#[test]
fn full_ring_drops_instead_of_blocking() {
    let (_engine, mut handle) = rig();

    // Never drained: the ring must eventually refuse instead of blocking
    let mut accepted = 0usize;
    for _ in 0..10_000 {
        if handle.set_slot_source(0, 0.5) {
            accepted += 1;
        }
    }
    assert!(accepted < 10_000);
    assert!(accepted > 0);
}

#[cfg(feature = "serde")]
#[test]
fn malformed_blob_falls_back_to_unbound() {
    let (mut engine, mut handle) = rig();
    let freq = engine.lookup("Freq").unwrap();
    let count = engine.router().target_choice_count();

    handle.set_slot_target(0, choice(1, count));
    engine.run_block(BLOCK);
    assert!(engine.registry().param(freq).is_modulated_by(0));

    assert!(engine.restore_blob(b"]garbage[").is_err());
    for slot in 0..engine.router().slot_count() {
        assert_eq!(engine.router().slot(slot).target(), None);
    }
    assert!(engine.registry().param(freq).modulators().is_empty());
}

#[cfg(feature = "serde")]
#[test]
fn blob_round_trip_rebuilds_backrefs() {
    let (mut engine, mut handle) = rig();
    let count = engine.router().target_choice_count();

    handle.set_slot_target(2, choice(2, count));
    handle.set_slot_source(2, 1.0);
    engine.run_block(BLOCK);

    let blob = engine.capture_blob().unwrap();

    let (mut fresh, _fresh_handle) = rig();
    fresh.restore_blob(&blob).unwrap();

    let fresh_cutoff = fresh.lookup("Cutoff").unwrap();
    assert_eq!(fresh.router().slot(2).target(), Some(fresh_cutoff));
    assert_eq!(fresh.router().slot(2).source(), 1);
    assert!(fresh.registry().param(fresh_cutoff).is_modulated_by(2));
    assert_bindings_consistent(&fresh);
}
