//! End-to-end tests for the analysis orchestrator
//!
//! These tests drive every engine through the public entry points:
//! - Comprehensive analysis over telemetry, reported conflicts and plugins
//! - Quick pairwise checks and load-order analysis
//! - Training all models from one bundle
//! - Deadline handling for the bottleneck scan and training

use modmine::engines::bottleneck::BottleneckType;
use modmine::engines::memory::LeakType;
use modmine::models::{
    CompatibilityData, ConflictSeverity, ConflictTrainingData, EspFile, EspRecord, HistoricalData,
    LinkedRecord, MemorySnapshot, PerformanceData, PerformanceMetric, QuestObjective,
    QuestPrerequisite, QuestRecord, ReportedConflict, SessionOutcome, Severity,
};
use modmine::orchestrator::IssueType;
use modmine::{
    AnalysisConfig, AnalysisData, AnalysisError, AnalysisOrchestrator, CancelSignal, RiskLevel,
    TrainingBundle,
};

const HOUR: u64 = 3_600_000;

fn mods(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn linked(signature: &str, form_id: u32, dependencies: &[u32]) -> EspRecord {
    EspRecord::Other(LinkedRecord {
        signature: signature.to_string(),
        form_id: Some(form_id),
        dependencies: dependencies.to_vec(),
        ..Default::default()
    })
}

fn quest(form_id: u32, name: &str, objective: &str, requires: &[u32]) -> EspRecord {
    EspRecord::Quest(QuestRecord {
        form_id: Some(form_id),
        name: name.to_string(),
        objectives: vec![QuestObjective {
            id: format!("{}-1", name),
            text: objective.to_string(),
            rewards: Vec::new(),
        }],
        prerequisites: requires
            .iter()
            .map(|id| QuestPrerequisite {
                quest_id: *id,
                required: true,
            })
            .collect(),
    })
}

#[tokio::test]
async fn test_weather_mods_without_evidence() {
    let orchestrator = AnalysisOrchestrator::default();

    let score = orchestrator
        .compatibility_engine()
        .query("Realistic Weather Overhaul", "Enhanced Weather Overhaul");

    assert!((score.score - 0.2).abs() < 1e-9);
    assert!((score.confidence - 0.3).abs() < 1e-9);
}

#[tokio::test]
async fn test_five_compatible_records() {
    let orchestrator = AnalysisOrchestrator::default();
    let bundle = TrainingBundle {
        compatibility: (0..5)
            .map(|i| CompatibilityData::new("A", "B", true).tested_by("tester", i))
            .collect(),
        ..Default::default()
    };

    let summary = orchestrator
        .train_all_models(bundle, CancelSignal::never())
        .await
        .unwrap();

    let matrix = summary.matrix.expect("matrix rebuilt");
    assert_eq!(matrix.data_points, 5);
    let score = orchestrator.compatibility_engine().query("A", "B");
    assert!((score.score - 1.0).abs() < 1e-9);
    assert_eq!(score.confidence, 1.0);
    assert_eq!(orchestrator.quick_conflict_check("B", "A").compatibility, score.score);
}

#[tokio::test]
async fn test_single_mod_fps_drop_is_a_bottleneck() {
    let orchestrator = AnalysisOrchestrator::default();
    let data = AnalysisData {
        performance_metrics: vec![
            PerformanceMetric::new(["X"], 40.0, 2000.0, 5.0, 1000),
            PerformanceMetric::new(Vec::<String>::new(), 60.0, 2000.0, 5.0, 2000),
        ],
        ..Default::default()
    };

    let report = orchestrator.run_comprehensive_analysis(data).await.unwrap();

    let bottleneck = &report.bottlenecks.bottlenecks[0];
    assert_eq!(bottleneck.mod_name, "X");
    assert_eq!(bottleneck.impact, -20.0);
    assert!(matches!(
        bottleneck.bottleneck_type,
        BottleneckType::Cpu | BottleneckType::Gpu
    ));
    assert!((bottleneck.confidence - 0.67).abs() < 0.01);

    assert_eq!(report.summary.total_mods, 1);
    assert!((report.summary.performance_score - 50.0 / 60.0 * 100.0).abs() < 1e-9);
    assert!(
        report
            .issues
            .iter()
            .any(|issue| issue.issue_type == IssueType::Performance
                && issue.severity == Severity::Medium)
    );
}

#[tokio::test]
async fn test_hourly_growth_flags_a_leak() {
    let orchestrator = AnalysisOrchestrator::default();
    let data = AnalysisData {
        mods: mods(&["Texture Pack", "Leaky Mod"]),
        vram_snapshots: vec![
            MemorySnapshot::new(0, 1000.0),
            MemorySnapshot::new(HOUR, 1100.0),
        ],
        ..Default::default()
    };

    let report = orchestrator.run_comprehensive_analysis(data).await.unwrap();

    assert_eq!(report.memory.leak_detection.len(), 1);
    let leak = &report.memory.leak_detection[0];
    assert!((leak.growth_mb_per_hour - 100.0).abs() < 1e-9);
    assert_eq!(leak.confidence, 1.0);
    assert_eq!(leak.leak_type, LeakType::Asset);
    assert_eq!(leak.mod_name, "Leaky Mod");

    assert_eq!(report.issues[0].issue_type, IssueType::Memory);
    assert_eq!(report.issues[0].severity, Severity::Critical);
    assert!(report.summary.risk_score >= 25);
    assert!(report.summary.risk_level >= RiskLevel::Medium);
}

#[tokio::test]
async fn test_reported_conflicts_are_scored_and_ranked() {
    let orchestrator = AnalysisOrchestrator::default();
    let data = AnalysisData {
        mods: mods(&["Armor Overhaul", "Weapon Pack", "Weather Plus", "City Mod"]),
        conflicts: vec![
            ReportedConflict::new("Weapon Pack", "WEAP", ConflictSeverity::Minor),
            ReportedConflict::new("Armor Overhaul", "ARMO", ConflictSeverity::Critical),
        ],
        ..Default::default()
    };

    let report = orchestrator.run_comprehensive_analysis(data).await.unwrap();

    assert_eq!(report.summary.risk_score, 30);
    assert_eq!(report.summary.risk_level, RiskLevel::Medium);
    assert_eq!(report.issues[0].severity, Severity::Critical);
    assert_eq!(report.issues[0].affected_mods, vec!["Armor Overhaul"]);
    assert_eq!(report.issues.last().map(|i| i.severity), Some(Severity::Low));
    for pair in report.issues.windows(2) {
        assert!(pair[0].severity >= pair[1].severity);
    }
}

#[tokio::test]
async fn test_record_cycle_among_unrelated_edges() {
    let orchestrator = AnalysisOrchestrator::default();

    let mut records: Vec<EspRecord> = (100..110)
        .map(|id| linked("NPC_", id, &[id + 1]))
        .collect();
    records.push(linked("NPC_", 110, &[]));
    records.push(linked("PERK", 1, &[2]));
    records.push(linked("PERK", 2, &[3]));
    records.push(linked("PERK", 3, &[1]));

    let data = AnalysisData {
        mods: mods(&["Cyclic.esp"]),
        plugins: vec![EspFile::new("Cyclic.esp", records)],
        ..Default::default()
    };
    let report = orchestrator.run_comprehensive_analysis(data).await.unwrap();

    let graph = &report.content.graph;
    assert_eq!(graph.edges.len(), 13);
    assert_eq!(graph.cycles.len(), 1);
    let mut cycle = graph.cycles[0].nodes.clone();
    cycle.sort();
    assert_eq!(cycle, vec![1, 2, 3]);
    assert!(report.content.conflicts.is_empty());

    let dependency = report
        .issues
        .iter()
        .find(|issue| issue.issue_type == IssueType::Dependency)
        .expect("cycle reported as an issue");
    assert_eq!(dependency.severity, Severity::High);
    assert_eq!(dependency.affected_mods, vec!["Cyclic.esp"]);
}

#[tokio::test]
async fn test_quest_conflicts_across_plugins() {
    let orchestrator = AnalysisOrchestrator::default();
    let data = AnalysisData {
        plugins: vec![
            EspFile::new(
                "QuestsA.esp",
                vec![quest(0x10, "Bandit Camp", "Clear the camp", &[0x20])],
            ),
            EspFile::new(
                "QuestsB.esp",
                vec![quest(0x20, "bandit camp", "Rebuild the camp", &[0x10])],
            ),
        ],
        ..Default::default()
    };

    let report = orchestrator.run_comprehensive_analysis(data).await.unwrap();

    assert_eq!(report.quests.cycles.len(), 1);
    assert!(!report.quests.cycles[0].breakable);
    assert!(report.quests.completion_paths.is_empty());

    let quest_issues: Vec<_> = report
        .issues
        .iter()
        .filter(|issue| issue.issue_type == IssueType::Quest)
        .collect();
    assert!(quest_issues.len() >= 2);
    assert_eq!(quest_issues[0].severity, Severity::High);
    assert!(quest_issues.iter().any(|issue| {
        issue.affected_mods.contains(&"QuestsA.esp".to_string())
            && issue.affected_mods.contains(&"QuestsB.esp".to_string())
    }));
}

#[tokio::test]
async fn test_scan_deadline_leaves_bottlenecks_empty() {
    let mut config = AnalysisConfig::default();
    config.limits.bottleneck_scan_timeout_secs = 0;
    let orchestrator = AnalysisOrchestrator::new(config);

    let data = AnalysisData {
        mods: mods(&["Base", "Heavy ENB"]),
        performance_metrics: vec![
            PerformanceMetric::new(["Base"], 60.0, 2000.0, 5.0, 0),
            PerformanceMetric::new(["Base", "Heavy ENB"], 30.0, 2500.0, 6.0, 1),
        ],
        ..Default::default()
    };
    let report = tokio_test::assert_ok!(orchestrator.run_comprehensive_analysis(data).await);

    assert!(report.bottlenecks.bottlenecks.is_empty());
    assert!(report.bottlenecks.critical_path.is_empty());
    assert_eq!(report.summary.total_mods, 2);
    assert!(report.summary.performance_score < 100.0);

    let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    for section in [
        "summary",
        "patterns",
        "bottlenecks",
        "memory",
        "compatibility",
        "content",
        "quests",
        "issues",
        "recommendations",
    ] {
        assert!(value.get(section).is_some(), "missing {}", section);
    }

    let metrics = orchestrator.metrics();
    assert_eq!(
        metrics
            .analyses_completed
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );
    assert_eq!(
        metrics
            .analyses_failed
            .load(std::sync::atomic::Ordering::Relaxed),
        0
    );
}

#[tokio::test]
async fn test_scan_deadline_still_analyses_load_order() {
    let mut config = AnalysisConfig::default();
    config.limits.bottleneck_scan_timeout_secs = 0;
    let orchestrator = AnalysisOrchestrator::new(config);

    let order = mods(&["Base", "Heavy ENB"]);
    let performance = PerformanceData {
        metrics: vec![
            PerformanceMetric::new(["Base"], 60.0, 2000.0, 5.0, 0),
            PerformanceMetric::new(["Base", "Heavy ENB"], 30.0, 2500.0, 6.0, 1),
        ],
        ..Default::default()
    };
    let analysis = tokio_test::assert_ok!(
        orchestrator
            .analyze_load_order(order.clone(), performance)
            .await
    );
    assert_eq!(analysis.recommended_order, order);
}

#[tokio::test]
async fn test_more_critical_conflicts_never_lower_risk() {
    let orchestrator = AnalysisOrchestrator::default();
    let mut conflicts = Vec::new();
    for i in 0..56 {
        conflicts.push(ReportedConflict::new(
            format!("Mod {}", i),
            "NPC_",
            ConflictSeverity::Minor,
        ));
    }
    for i in 56..70 {
        for _ in 0..22 {
            conflicts.push(ReportedConflict::new(
                format!("Mod {}", i),
                "NPC_",
                ConflictSeverity::Minor,
            ));
        }
    }
    let mut data = AnalysisData {
        mods: (0..100).map(|i| format!("Mod {}", i)).collect(),
        conflicts,
        ..Default::default()
    };

    let before = orchestrator
        .run_comprehensive_analysis(data.clone())
        .await
        .unwrap();
    data.conflicts.push(ReportedConflict::new(
        "Mod 56",
        "WEAP",
        ConflictSeverity::Critical,
    ));
    let after = orchestrator.run_comprehensive_analysis(data).await.unwrap();

    assert_eq!(
        before.patterns.anomalies.len(),
        after.patterns.anomalies.len()
    );
    assert_eq!(after.summary.risk_score, before.summary.risk_score + 30);
    assert!(after.summary.risk_level >= before.summary.risk_level);
}

#[tokio::test]
async fn test_flat_combinations_do_not_look_like_a_leak() {
    let orchestrator = AnalysisOrchestrator::default();
    // Six flat hours on the base setup, then six flat hours with textures added
    let mut metrics: Vec<PerformanceMetric> = (0..6u64)
        .map(|hour| PerformanceMetric::new(["Base"], 60.0, 2000.0, 5.0, hour * HOUR))
        .collect();
    metrics.extend((6..12u64).map(|hour| {
        PerformanceMetric::new(["Base", "Texture Pack"], 55.0, 6000.0, 5.0, hour * HOUR)
    }));
    let data = AnalysisData {
        mods: mods(&["Base", "Texture Pack"]),
        performance_metrics: metrics,
        ..Default::default()
    };

    let report = orchestrator.run_comprehensive_analysis(data).await.unwrap();

    assert!(report.memory.leak_detection.is_empty());
    assert!(
        !report
            .issues
            .iter()
            .any(|issue| issue.issue_type == IssueType::Memory)
    );
}

#[tokio::test]
async fn test_analyze_load_order_reports_conflicts() {
    let orchestrator = AnalysisOrchestrator::default();
    orchestrator
        .train_all_models(
            TrainingBundle {
                conflicts: vec![ConflictTrainingData::new("Mod A", "Mod B", true); 10],
                ..Default::default()
            },
            CancelSignal::never(),
        )
        .await
        .unwrap();

    let order = mods(&["Mod A", "Mod B", "Mod C"]);
    let performance = PerformanceData {
        metrics: vec![
            PerformanceMetric::new(["Mod A", "Mod B"], 30.0, 0.0, 0.0, 0),
            PerformanceMetric::new(["Mod A", "Mod B", "Mod C"], 60.0, 0.0, 0.0, 0),
        ],
        ..Default::default()
    };
    let analysis = orchestrator
        .analyze_load_order(order.clone(), performance)
        .await
        .unwrap();

    assert_eq!(analysis.recommended_order, order);
    assert!(!analysis.order_optimized);
    for conflict in &analysis.conflicts {
        assert!(conflict.probability > 0.3);
    }
    assert!(
        analysis
            .expected_improvements
            .iter()
            .any(|improvement| improvement.gain > 0.0)
    );
}

#[tokio::test]
async fn test_train_all_models_and_status() {
    let orchestrator = AnalysisOrchestrator::default();
    let before = orchestrator.engine_status();
    assert!(before.pattern_engine && before.bottleneck_mining && before.memory_analysis);
    assert!(!before.conflict_prediction);
    assert_eq!(before.matrix_mods, 0);

    let bundle = TrainingBundle {
        history: vec![
            HistoricalData {
                mods: mods(&["Mod A", "Mod B"]),
                outcome: SessionOutcome::Failure,
            };
            4
        ],
        conflicts: vec![
            ConflictTrainingData::new("Mod A", "Mod B", true),
            ConflictTrainingData::new("Mod A", "Mod C", false),
        ],
        compatibility: vec![
            CompatibilityData::new("Mod A", "Mod C", true),
            CompatibilityData::new("Mod B", "Mod C", false),
        ],
    };
    let summary = orchestrator
        .train_all_models(bundle, orchestrator.training_signal())
        .await
        .unwrap();

    assert_eq!(summary.patterns_learned, Some(1));
    assert_eq!(summary.conflict_model.map(|model| model.training_size), Some(2));

    let after = orchestrator.engine_status();
    assert_eq!(after.patterns_learned, 1);
    assert!(after.conflict_prediction);
    assert_eq!(after.matrix_mods, 3);

    let check = orchestrator.quick_conflict_check("Mod A", "Mod B");
    assert_eq!(check.prediction.mod_a, "Mod A");
    assert_eq!(check.patterns.len(), 1);
}

#[tokio::test]
async fn test_cancelled_training_leaves_model_untouched() {
    let orchestrator = AnalysisOrchestrator::default();
    let cancel = CancelSignal::never();
    cancel.cancel();

    let err = tokio_test::assert_err!(
        orchestrator
            .train_all_models(
                TrainingBundle {
                    conflicts: vec![ConflictTrainingData::new("A", "B", true)],
                    ..Default::default()
                },
                cancel,
            )
            .await
    );

    assert!(matches!(err, AnalysisError::Cancelled { .. }));
    assert!(!orchestrator.engine_status().conflict_prediction);
}

#[tokio::test]
async fn test_report_serializes() {
    let orchestrator = AnalysisOrchestrator::default();
    let data = AnalysisData {
        mods: mods(&["SKSE64", "Immersive Armors"]),
        ..Default::default()
    };

    let report = orchestrator.run_comprehensive_analysis(data).await.unwrap();
    let json = report.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    for section in [
        "summary",
        "patterns",
        "bottlenecks",
        "memory",
        "compatibility",
        "content",
        "quests",
        "issues",
        "recommendations",
    ] {
        assert!(value.get(section).is_some(), "missing section {}", section);
    }
    // 0.8 heuristic for a utility pair maps to 90
    assert!((report.summary.compatibility_score - 90.0).abs() < 1e-9);
}
