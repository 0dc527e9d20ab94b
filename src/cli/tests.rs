use super::*;

// -------------------------------------------------------------------------
// Format Size Tests
// -------------------------------------------------------------------------

#[test]
fn test_format_size_bytes() {
    assert_eq!(format_size(0), "0 B");
    assert_eq!(format_size(1023), "1023 B");
}

#[test]
fn test_format_size_units() {
    assert_eq!(format_size(1536), "1.5 KB");
    assert_eq!(format_size(10 * 1024 * 1024), "10.0 MB");
    assert_eq!(format_size(7 * 1024 * 1024 * 1024), "7.0 GB");
}

// -------------------------------------------------------------------------
// Bench Tests
// -------------------------------------------------------------------------

fn small_bench() -> BenchConfig {
    BenchConfig {
        dim: 64,
        hidden: 160,
        tokens: 5,
        ..BenchConfig::default()
    }
}

#[test]
fn test_bench_counts_invocations() {
    let summary = run_bench(&small_bench()).unwrap();
    assert_eq!(summary.gemms_per_token, 2);
    assert_eq!(summary.telemetry.work.invocations, 10);
    assert_eq!(summary.telemetry.work.accelerated_invocations, 10);
    assert!(summary.telemetry.benchmark_mode);
    assert!(summary.tokens_per_sec > 0.0);
    assert_eq!(summary.telemetry.live_tensors, 5);
    // x, W_up, h, W_down, y
    assert_eq!(summary.tensor_bytes, (64 + 160 * 64 + 160 + 64 * 160 + 64) * 4);
}

#[test]
fn test_bench_dense_skips_nothing() {
    let summary = run_bench(&BenchConfig {
        dense: true,
        ..small_bench()
    })
    .unwrap();
    assert!(!summary.telemetry.benchmark_mode);
    assert_eq!(summary.telemetry.work.macs_skipped, 0);
    assert_eq!(summary.telemetry.work.accelerated_invocations, 0);
}

#[test]
fn test_bench_fused_lowers_energy_only() {
    let plain = run_bench(&small_bench()).unwrap();
    let fused = run_bench(&BenchConfig {
        fused: true,
        ..small_bench()
    })
    .unwrap();
    assert_eq!(fused.telemetry.work, plain.telemetry.work);
    assert!(fused.telemetry.power.total_energy_pj < plain.telemetry.power.total_energy_pj);
}

#[test]
fn test_bench_rejects_bad_dimension() {
    let err = run_bench(&BenchConfig {
        dim: 0,
        ..small_bench()
    })
    .unwrap_err();
    assert!(matches!(err, SparsimError::InvalidDimension { .. }));
}

#[test]
fn test_bench_missing_config_is_load_error() {
    let err = run_bench(&BenchConfig {
        config: Some(PathBuf::from("/no/such/sparsim.json")),
        ..small_bench()
    })
    .unwrap_err();
    assert!(matches!(err, SparsimError::Load { .. }));
}

#[test]
fn test_bench_summary_serializes() {
    let summary = run_bench(&small_bench()).unwrap();
    let json = serde_json::to_string(&summary).unwrap();
    assert!(json.contains("tokens_per_sec"));
    assert!(json.contains("l1_hit_rate"));
}

// -------------------------------------------------------------------------
// Verify Tests
// -------------------------------------------------------------------------

#[test]
fn test_verify_passes() {
    let report = run_verify(17, 9, 300, 1e-4, 7).unwrap();
    assert!(report.max_rel_error <= 1e-4);
}

#[test]
fn test_verify_rejects_bad_shape() {
    assert!(run_verify(0, 4, 4, 1e-4, 7).is_err());
}

// -------------------------------------------------------------------------
// GGUF Tests
// -------------------------------------------------------------------------

#[test]
fn test_make_and_inspect_gguf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.gguf");
    let written = make_gguf(&path, 291, 19).unwrap();
    assert_eq!(written.version, 3);
    assert_eq!(GgufHeader::read_from(&path).unwrap(), written);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 24);
}

// -------------------------------------------------------------------------
// Argument Parsing Tests
// -------------------------------------------------------------------------

#[test]
fn test_parse_bench_defaults() {
    use clap::Parser;

    let cli = Cli::try_parse_from(["sparsim", "bench"]).unwrap();
    match cli.command {
        Commands::Bench {
            dim,
            hidden,
            tokens,
            sparsity,
            dense,
            fused,
            ..
        } => {
            assert_eq!((dim, hidden, tokens), (4096, 11008, 100));
            assert_eq!(sparsity, 0.5);
            assert!(!dense);
            assert!(!fused);
        },
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn test_parse_gguf_make() {
    use clap::Parser;

    let cli = Cli::try_parse_from(["sparsim", "gguf-make", "out.gguf", "--tensors", "3"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::GgufMake { tensors: 3, kv: 0, .. }
    ));
}
