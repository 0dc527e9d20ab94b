//! End-to-end engine scenarios
//!
//! Drives the public `Engine` API the way a benchmark script does:
//! allocate, fill, run the kernel repeatedly, read telemetry, release.
//!
//! Coverage targets:
//! - Small dense scenario (4x4)
//! - LLM FFN projection scenario (11008x4096 weight, 100 calls)
//! - Error paths: zero or oversized dimension, use after delete, shape mismatch
//! - Mode switching and statistics reset

use sparsim::gemm::{MicroKernel, ScalarKernel};
use sparsim::{
    CommandList, CompressionMode, Engine, EngineConfig, ExecutionMode, SharedEngine, SkipPolicy,
    SparsimError,
};

fn reference(engine: &Engine, a: sparsim::TensorHandle, b: sparsim::TensorHandle) -> Vec<f32> {
    let ta = engine.tensor(a).unwrap();
    let tb = engine.tensor(b).unwrap();
    let (m, k) = ta.shape();
    let n = tb.cols();
    let mut c = vec![0.0; m * n];
    ScalarKernel.gemm(ta.data(), tb.data(), &mut c, m, n, k);
    c
}

fn assert_close(got: &[f32], want: &[f32]) {
    assert_eq!(got.len(), want.len());
    for (i, (g, w)) in got.iter().zip(want).enumerate() {
        assert!(
            (g - w).abs() <= 1e-4 * w.abs().max(1.0),
            "element {i}: {g} vs {w}"
        );
    }
}

// ============================================================================
// A. Small dense scenario
// ============================================================================

#[test]
fn test_4x4_dense_scenario() {
    let mut engine = Engine::new();
    let a = engine.create_tensor(4, 4).unwrap();
    let b = engine.create_tensor(4, 4).unwrap();
    let c = engine.create_tensor(4, 4).unwrap();
    engine.randomize_tensor(a).unwrap();
    engine.randomize_tensor(b).unwrap();

    engine.execute_gemm(a, b, c, 0.5).unwrap();

    let out = engine.tensor_data(c).unwrap();
    assert_ne!(out[0], 0.0);
    // accuracy mode computes the full product regardless of sparsity
    assert_close(out, &reference(&engine, a, b));

    for h in [a, b, c] {
        engine.delete_tensor(h).unwrap();
    }
    assert_eq!(engine.live_tensors(), 0);
}

#[test]
fn test_create_returns_zeros() {
    let mut engine = Engine::new();
    let h = engine.create_tensor(3, 5).unwrap();
    let data = engine.tensor_data(h).unwrap();
    assert_eq!(data.len(), 15);
    assert!(data.iter().all(|&v| v == 0.0));
}

#[test]
fn test_randomize_range_and_determinism() {
    let mut e1 = Engine::from_config(EngineConfig::default().with_seed(5)).unwrap();
    let mut e2 = Engine::from_config(EngineConfig::default().with_seed(5)).unwrap();
    let h1 = e1.create_tensor(32, 32).unwrap();
    let h2 = e2.create_tensor(32, 32).unwrap();
    e1.randomize_tensor(h1).unwrap();
    e2.randomize_tensor(h2).unwrap();

    let d1 = e1.tensor_data(h1).unwrap();
    assert!(d1.iter().all(|v| (-1.0..1.0).contains(v)));
    assert_eq!(d1, e2.tensor_data(h2).unwrap());
}

// ============================================================================
// B. LLM FFN projection scenario
// ============================================================================

#[test]
fn test_ffn_projection_100_calls() {
    let mut engine = Engine::new();
    let x = engine.create_tensor(4096, 1).unwrap();
    let w = engine.create_tensor(11008, 4096).unwrap();
    let out = engine.create_tensor(11008, 1).unwrap();
    engine.randomize_tensor(x).unwrap();
    engine.randomize_tensor(w).unwrap();

    engine.set_benchmark_mode(true);
    for _ in 0..100 {
        engine.execute_gemm(w, x, out, 0.5).unwrap();
    }

    let snap = engine.snapshot();
    assert!(snap.work.invocations >= 100);
    assert_eq!(snap.work.accelerated_invocations, 100);
    assert_eq!(snap.cache.reused_calls, 99);
    assert!(snap.l1_hit_rate > 0.0 && snap.l1_hit_rate <= 1.0);
    assert!(snap.compression_ratio > 1.0);
    // half of the K terms skipped
    assert!((snap.work.effective_speedup() - 2.0).abs() < 1e-9);

    let report = engine.report();
    assert!(report.contains("L1 cache hit rate"));
    assert!(report.contains("Compression ratio"));
    assert!(report.contains("100"));
}

// ============================================================================
// C. Error paths
// ============================================================================

#[test]
fn test_zero_rows_rejected() {
    let mut engine = Engine::new();
    assert!(matches!(
        engine.create_tensor(0, 4),
        Err(SparsimError::InvalidDimension { rows: 0, cols: 4 })
    ));
    assert!(matches!(
        engine.create_tensor(4, -1),
        Err(SparsimError::InvalidDimension { .. })
    ));
    assert_eq!(engine.live_tensors(), 0);
}

#[test]
fn test_oversized_dimensions_rejected() {
    let mut engine = Engine::new();
    assert!(matches!(
        engine.create_tensor(1 << 31, 1 << 31),
        Err(SparsimError::InvalidDimension { .. })
    ));
    assert!(matches!(
        engine.create_tensor(i64::MAX, 2),
        Err(SparsimError::InvalidDimension { .. })
    ));
    assert_eq!(engine.live_tensors(), 0);

    let t = engine.create_tensor(3, 5).unwrap();
    assert_eq!(engine.tensor(t).unwrap().shape(), (3, 5));
}

#[test]
fn test_use_after_delete() {
    let mut engine = Engine::new();
    let a = engine.create_tensor(2, 2).unwrap();
    let c = engine.create_tensor(2, 2).unwrap();
    engine.delete_tensor(a).unwrap();

    assert!(matches!(
        engine.randomize_tensor(a),
        Err(SparsimError::InvalidHandle { .. })
    ));
    assert!(matches!(
        engine.tensor_data(a),
        Err(SparsimError::InvalidHandle { .. })
    ));
    assert!(matches!(
        engine.execute_gemm(a, c, c, 0.0),
        Err(SparsimError::InvalidHandle { .. })
    ));
    assert!(matches!(
        engine.delete_tensor(a),
        Err(SparsimError::InvalidHandle { .. })
    ));

    // a recycled slot does not revive the old handle
    let fresh = engine.create_tensor(2, 2).unwrap();
    assert_ne!(fresh, a);
    assert!(engine.tensor_data(a).is_err());
}

#[test]
fn test_shape_mismatch_variants() {
    let mut engine = Engine::new();
    let a = engine.create_tensor(3, 4).unwrap();
    let b = engine.create_tensor(4, 2).unwrap();
    let bad_b = engine.create_tensor(5, 2).unwrap();
    let c = engine.create_tensor(3, 2).unwrap();
    let bad_c = engine.create_tensor(2, 2).unwrap();

    assert!(engine.execute_gemm(a, b, c, 0.0).is_ok());
    for (lhs, rhs, out) in [(a, bad_b, c), (a, b, bad_c)] {
        assert!(matches!(
            engine.execute_gemm(lhs, rhs, out, 0.0),
            Err(SparsimError::DimensionMismatch { .. })
        ));
    }
    assert_eq!(engine.work().invocations, 1);
}

// ============================================================================
// D. Modes and statistics
// ============================================================================

#[test]
fn test_zero_sparsity_equal_in_both_modes() {
    let mut engine = Engine::new();
    let a = engine.create_tensor(37, 300).unwrap();
    let b = engine.create_tensor(300, 11).unwrap();
    let c = engine.create_tensor(37, 11).unwrap();
    engine.randomize_tensor(a).unwrap();
    engine.randomize_tensor(b).unwrap();
    let want = reference(&engine, a, b);

    for mode in [ExecutionMode::Dense, ExecutionMode::Accelerated] {
        engine.execute_gemm_with_mode(a, b, c, 0.0, mode).unwrap();
        assert_close(engine.tensor_data(c).unwrap(), &want);
    }
}

#[test]
fn test_mode_switch_takes_effect_next_call() {
    let mut engine = Engine::new();
    let a = engine.create_tensor(1, 8).unwrap();
    let b = engine.create_tensor(8, 1).unwrap();
    let c = engine.create_tensor(1, 1).unwrap();
    engine.tensor_data_mut(a).unwrap().fill(1.0);
    engine.tensor_data_mut(b).unwrap().fill(1.0);

    engine.execute_gemm(a, b, c, 0.5).unwrap();
    assert_eq!(engine.tensor_data(c).unwrap(), &[8.0]);

    engine.set_benchmark_mode(true);
    engine.execute_gemm(a, b, c, 0.5).unwrap();
    assert_eq!(engine.tensor_data(c).unwrap(), &[4.0]);

    engine.set_benchmark_mode(false);
    engine.execute_gemm(a, b, c, 0.5).unwrap();
    assert_eq!(engine.tensor_data(c).unwrap(), &[8.0]);
}

#[test]
fn test_reset_cache_restores_baseline() {
    let mut engine = Engine::new();
    engine.set_benchmark_mode(true);
    let a = engine.create_tensor(16, 16).unwrap();
    engine.execute_gemm(a, a, a, 0.3).unwrap();

    engine.reset_cache();
    assert_eq!(engine.l1_hit_rate(), 0.0);
    assert_eq!(engine.compression_ratio(), 1.0);
    assert!(engine.benchmark_mode());

    let snap = engine.snapshot();
    assert_eq!(snap.work.invocations, 0);
    assert_eq!(snap.power.total_energy_pj, 0.0);
}

#[test]
fn test_classic_compression_stays_at_one() {
    let config = EngineConfig::default().with_compression(CompressionMode::Classic);
    let mut engine = Engine::from_config(config).unwrap();
    let a = engine.create_tensor(8, 8).unwrap();
    engine.execute_gemm(a, a, a, 0.9).unwrap();
    assert_eq!(engine.compression_ratio(), 1.0);
    assert!(engine.snapshot().observed_sparsity > 0.8);
}

#[test]
fn test_magnitude_policy_keeps_dominant_terms() {
    let config = EngineConfig::default().with_skip_policy(SkipPolicy::Magnitude);
    let mut engine = Engine::from_config(config).unwrap();
    engine.set_benchmark_mode(true);
    let w = engine.create_tensor(1, 4).unwrap();
    let x = engine.create_tensor(4, 1).unwrap();
    let out = engine.create_tensor(1, 1).unwrap();
    engine.tensor_data_mut(w).unwrap().fill(1.0);
    engine
        .tensor_data_mut(x)
        .unwrap()
        .copy_from_slice(&[0.01, 5.0, -0.02, 3.0]);

    engine.execute_gemm(w, x, out, 0.5).unwrap();
    assert_eq!(engine.tensor_data(out).unwrap(), &[8.0]);
}

#[test]
fn test_command_list_matches_direct_calls() {
    let mut direct = Engine::new();
    let mut batched = Engine::new();
    let mut handles = Vec::new();
    for engine in [&mut direct, &mut batched] {
        let a = engine.create_tensor(12, 20).unwrap();
        let b = engine.create_tensor(20, 3).unwrap();
        let c = engine.create_tensor(12, 3).unwrap();
        engine.randomize_tensor(a).unwrap();
        engine.randomize_tensor(b).unwrap();
        engine.set_benchmark_mode(true);
        handles.push((a, b, c));
    }

    let (a, b, c) = handles[0];
    for _ in 0..3 {
        direct.execute_gemm(a, b, c, 0.4).unwrap();
    }
    let (a2, b2, c2) = handles[1];
    let mut list = CommandList::new();
    list.record_gemm(a2, b2, c2, 0.4);
    for _ in 0..3 {
        list.execute(&mut batched).unwrap();
    }

    assert_eq!(direct.tensor_data(c).unwrap(), batched.tensor_data(c2).unwrap());
    assert_eq!(direct.snapshot(), batched.snapshot());
}

#[test]
fn test_shared_engine_serializes_calls() {
    let shared = SharedEngine::from(Engine::new());
    let (a, c) = shared.with(|e| {
        let a = e.create_tensor(32, 32).unwrap();
        let c = e.create_tensor(32, 32).unwrap();
        e.randomize_tensor(a).unwrap();
        (a, c)
    });

    std::thread::scope(|s| {
        for _ in 0..4 {
            let shared = shared.clone();
            s.spawn(move || {
                for _ in 0..10 {
                    shared.with(|e| e.execute_gemm(a, a, c, 0.5)).unwrap();
                }
            });
        }
    });

    let engine = shared.lock();
    assert_eq!(engine.work().invocations, 40);
    assert!(engine.l1_hit_rate() <= 1.0);
}
