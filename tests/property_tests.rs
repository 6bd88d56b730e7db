//! Property tests for the invariants every engine must hold on arbitrary input

use modmine::engines::bottleneck::{ModImpact, mod_impacts};
use modmine::engines::graph::{EdgeType, GraphEdge, detect_cycles};
use modmine::engines::pattern::PatternAnalysis;
use modmine::engines::{
    BottleneckAnalysis, CancelSignal, CompatibilityMiningEngine, MemoryAnalysis,
};
use modmine::models::{CompatibilityData, ConflictSeverity, PerformanceMetric, ReportedConflict};
use modmine::orchestrator::{RiskLevel, compatibility_score, performance_score, risk_score};
use modmine::{AnalysisData, AnalysisOrchestrator};
use proptest::prelude::*;

const MODS: [&str; 5] = ["Alpha", "Bravo Textures", "Charlie Scripts", "Delta ENB", "Echo"];

fn record_strategy() -> impl Strategy<Value = CompatibilityData> {
    (0..MODS.len(), 0..MODS.len(), any::<bool>(), 0u64..1_000)
        .prop_filter("distinct mods", |(a, b, _, _)| a != b)
        .prop_map(|(a, b, compatible, ts)| {
            CompatibilityData::new(MODS[a], MODS[b], compatible).tested_by("prop", ts)
        })
}

fn edge_strategy() -> impl Strategy<Value = GraphEdge<u8>> {
    (0u8..12, 0u8..12, prop_oneof![
        Just(EdgeType::DependsOn),
        Just(EdgeType::References),
        Just(EdgeType::Requires),
        Just(EdgeType::ConflictsWith),
    ])
    .prop_map(|(source, target, edge_type)| GraphEdge {
        source,
        target,
        edge_type,
        weight: 1.0,
    })
}

proptest! {
    #[test]
    fn matrix_is_symmetric_and_bounded(log in prop::collection::vec(record_strategy(), 1..40)) {
        let engine = CompatibilityMiningEngine::new();
        let matrix = engine.build(log.clone());

        prop_assert_eq!(matrix.data_points, log.len());
        for (a, row) in &matrix.matrix {
            prop_assert!(!row.contains_key(a));
            for (b, score) in row {
                let mirrored = matrix.get(b, a).expect("mirrored entry");
                prop_assert_eq!(score, mirrored);
                prop_assert!((-1.0..=1.0).contains(&score.score));
                prop_assert!((0.0..=1.0).contains(&score.confidence));
            }
        }
    }

    #[test]
    fn rebuilding_from_the_same_log_is_idempotent(
        log in prop::collection::vec(record_strategy(), 1..20),
    ) {
        let engine = CompatibilityMiningEngine::new();
        let first = engine.build(log.clone());
        let second = engine.build(engine.evidence_log());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn impact_confidence_is_bounded_and_monotone(
        fps in -200.0f64..200.0,
        memory in -8192.0f64..8192.0,
        load in -60.0f64..60.0,
        extra in 0.0f64..50.0,
    ) {
        let impact = ModImpact {
            fps_delta: fps,
            memory_delta_mb: memory,
            load_time_delta_sec: load,
            pairs: 1,
        };
        let worse = ModImpact {
            fps_delta: fps - extra * fps.signum(),
            ..impact
        };
        prop_assert!((0.0..=1.0).contains(&impact.confidence()));
        prop_assert!(worse.confidence() >= impact.confidence());
    }

    #[test]
    fn paired_impacts_average_over_pairs(
        baseline in 20.0f64..120.0,
        drops in prop::collection::vec(0.0f64..40.0, 1..6),
    ) {
        let mut metrics = vec![PerformanceMetric::new(["Base"], baseline, 0.0, 0.0, 0)];
        for (i, drop) in drops.iter().enumerate() {
            metrics.push(PerformanceMetric::new(
                ["Base".to_string(), format!("Mod {}", i)],
                baseline - drop,
                0.0,
                0.0,
                i as u64 + 1,
            ));
        }

        let impacts = mod_impacts(&metrics, &CancelSignal::never()).unwrap();
        for (i, drop) in drops.iter().enumerate() {
            let impact = &impacts[&format!("Mod {}", i)];
            prop_assert_eq!(impact.pairs, 1);
            prop_assert!((impact.fps_delta + drop).abs() < 1e-9);
        }
    }

    #[test]
    fn detected_cycles_are_closed_walks(edges in prop::collection::vec(edge_strategy(), 0..40)) {
        for cycle in detect_cycles(&edges) {
            prop_assert!(!cycle.is_empty());
            for i in 0..cycle.len() {
                let from = cycle[i];
                let to = cycle[(i + 1) % cycle.len()];
                prop_assert!(
                    edges.iter().any(|e| e.source == from
                        && e.target == to
                        && e.edge_type.is_dependency()),
                    "missing dependency edge {} -> {}", from, to
                );
            }
        }
    }

    #[test]
    fn acyclic_edges_have_no_cycles(pairs in prop::collection::vec((0u8..30, 0u8..30), 0..60)) {
        // Edges only point from lower to higher ids
        let edges: Vec<GraphEdge<u8>> = pairs
            .into_iter()
            .filter(|(a, b)| a < b)
            .map(|(source, target)| GraphEdge {
                source,
                target,
                edge_type: EdgeType::DependsOn,
                weight: 1.0,
            })
            .collect();
        prop_assert!(detect_cycles(&edges).is_empty());
    }

    #[test]
    fn risk_grows_with_critical_conflicts(minor in 0usize..5, critical in 0usize..5) {
        let mut reported: Vec<ReportedConflict> = (0..minor)
            .map(|i| ReportedConflict::new(format!("Minor {}", i), "NPC_", ConflictSeverity::Minor))
            .collect();
        let before = risk_score(
            &PatternAnalysis::default(),
            &BottleneckAnalysis::default(),
            &MemoryAnalysis::default(),
            &reported,
        );
        reported.extend(
            (0..critical).map(|i| {
                ReportedConflict::new(format!("Crit {}", i), "NPC_", ConflictSeverity::Critical)
            }),
        );
        let after = risk_score(
            &PatternAnalysis::default(),
            &BottleneckAnalysis::default(),
            &MemoryAnalysis::default(),
            &reported,
        );

        prop_assert_eq!(before, 0);
        prop_assert_eq!(after, 30 * critical as u32);
        prop_assert!(RiskLevel::from_score(after) >= RiskLevel::from_score(before));
    }

    #[test]
    fn summary_scores_stay_in_range(
        scores in prop::collection::vec(-1.0f64..=1.0, 1..5),
        fps in prop::collection::vec((0.0f64..240.0, prop::option::of(0.0f64..=100.0)), 0..10),
    ) {
        let mods: Vec<String> = (0..=scores.len()).map(|i| format!("Mod {}", i)).collect();
        let value = compatibility_score(&mods, |a, b| {
            let index = (a.len() + b.len()) % scores.len();
            scores[index]
        });
        prop_assert!((0.0..=100.0).contains(&value));

        let metrics: Vec<PerformanceMetric> = fps
            .into_iter()
            .map(|(fps, stability)| {
                let metric = PerformanceMetric::new(["Mod 0"], fps, 0.0, 0.0, 0);
                match stability {
                    Some(stability) => metric.with_stability(stability),
                    None => metric,
                }
            })
            .collect();
        let value = performance_score(&metrics);
        prop_assert!((0.0..=100.0 + 1e-9).contains(&value));
    }
}

fn reported_strategy(mods: usize) -> impl Strategy<Value = ReportedConflict> {
    (
        0..mods,
        prop_oneof![Just("NPC_"), Just("WEAP"), Just("CELL")],
        prop_oneof![
            Just(ConflictSeverity::Minor),
            Just(ConflictSeverity::Major),
            Just(ConflictSeverity::Critical),
        ],
    )
        .prop_map(|(index, record_type, severity)| {
            ReportedConflict::new(format!("Mod {}", index), record_type, severity)
        })
}

fn conflict_bundle() -> impl Strategy<Value = (AnalysisData, usize)> {
    (2usize..30).prop_flat_map(|mods| {
        (
            prop::collection::vec(reported_strategy(mods), 0..80),
            0..mods,
        )
            .prop_map(move |(conflicts, target)| {
                let data = AnalysisData {
                    mods: (0..mods).map(|i| format!("Mod {}", i)).collect(),
                    conflicts,
                    ..Default::default()
                };
                (data, target)
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn analysed_risk_never_drops_with_a_critical_conflict((data, target) in conflict_bundle()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let orchestrator = AnalysisOrchestrator::default();

        let mut more = data.clone();
        more.conflicts.push(ReportedConflict::new(
            format!("Mod {}", target),
            "NPC_",
            ConflictSeverity::Critical,
        ));
        let (before, after) = runtime.block_on(async {
            let before = orchestrator.run_comprehensive_analysis(data).await.unwrap();
            let after = orchestrator.run_comprehensive_analysis(more).await.unwrap();
            (before, after)
        });

        prop_assert!(after.summary.risk_score >= before.summary.risk_score);
        prop_assert!(after.summary.risk_level >= before.summary.risk_level);
        prop_assert!(after.patterns.anomalies.len() >= before.patterns.anomalies.len());
    }
}
