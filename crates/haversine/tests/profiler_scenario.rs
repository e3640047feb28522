#![expect(missing_docs)]

use haversine::{
    Arena, ParserOptions,
    distance::mean_haversine,
    generator::{GeneratorOptions, generate_json},
    pairs::decode_pairs,
    parse, profile_scope,
    profiler::{Clock, ManualClock, OsClock, Profiler, RepetitionProfiler},
};

/// Instruments the full pipeline the way the binary does and checks that
/// the report accounts for every phase.
#[cfg(not(feature = "disable-profiler"))]
#[test]
fn pipeline_regions_nest() {
    let mut profiler = Profiler::new("pipeline");
    let arena = Arena::default();

    let pairs = {
        let mut scope = profile_scope!(profiler, "generate");
        let generated = generate_json(&GeneratorOptions {
            count: 1_000,
            ..GeneratorOptions::default()
        })
        .unwrap();

        let document = {
            let _parse = profile_scope!(scope, "parse", bytes = generated.json.len() as u64);
            parse(generated.json.as_bytes(), &arena, ParserOptions::default()).unwrap()
        };
        let pairs = decode_pairs(&document).unwrap();
        assert_eq!(pairs, generated.pairs);
        pairs
    };

    let mean = {
        let mut scope = profile_scope!(profiler, "sum");
        for _ in &pairs {
            scope.add_bytes(32).unwrap();
        }
        mean_haversine(&pairs)
    };
    assert!(mean > 0.0);

    let report = profiler.end().unwrap();
    assert!(profiler.end().is_none());

    let generate = report.region("generate").unwrap();
    let parsing = report.region("parse").unwrap();
    let sum = report.region("sum").unwrap();

    assert_eq!((generate.calls, parsing.calls, sum.calls), (1, 1, 1));
    assert!(generate.inclusive_ticks >= generate.exclusive_ticks + parsing.inclusive_ticks);
    assert_eq!(sum.bytes, 32 * 1_000);
    assert!(report.total_ticks >= generate.inclusive_ticks + sum.inclusive_ticks);

    let table = report.to_string();
    assert!(table.contains("Name[n]"));
    assert!(table.contains("parse [1]"));
    assert!(!table.contains("profiler_scenario.rs"));
    assert!(format!("{report:#}").contains(&format!("parse [1] {}:", file!())));
}

#[cfg(not(feature = "disable-profiler"))]
#[test]
fn loop_call_counts() {
    let clock = ManualClock::new(1_000_000);
    let mut profiler = Profiler::with_clock("loop", clock.clone());
    for _ in 0..250 {
        let _scope = profile_scope!(profiler, "body");
        clock.advance(4);
    }
    let report = profiler.end().unwrap();
    let body = report.region("body").unwrap();
    assert_eq!(body.calls, 250);
    assert_eq!(body.inclusive_ticks, 1_000);
    assert!((report.total_seconds - 0.001).abs() < 1e-12);
}

#[test]
fn repetition_over_real_work() {
    let generated = generate_json(&GeneratorOptions {
        count: 200,
        ..GeneratorOptions::default()
    })
    .unwrap();
    let mut arena = Arena::with_capacity(1 << 20);

    let mut repetition = RepetitionProfiler::new("parse", 20, OsClock::new());
    let report = repetition
        .run(|trial| {
            arena.reset();
            let document =
                parse(generated.json.as_bytes(), &arena, ParserOptions::default()).unwrap();
            assert_eq!(decode_pairs(&document).unwrap().len(), 200);
            trial.add_bytes(generated.json.len() as u64);
        })
        .unwrap();

    assert_eq!(report.trials, 20);
    assert!(report.min.seconds <= report.median.seconds);
    assert!(report.median.seconds <= report.max.seconds);
    assert!(report.min.seconds <= report.mean.seconds);
    assert!(report.mean.seconds <= report.max.seconds);
    assert!(OsClock::new().frequency() > 0);
}
