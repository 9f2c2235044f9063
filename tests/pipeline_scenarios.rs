use anyhow::Result;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use ppe_witness::{
    ArtifactKind, ClassLabel, FilesystemArtifactStore, FilesystemStoreConfig,
    InMemoryArtifactStore, InMemoryNotifier, JsonReportNotifier, Pipeline, PipelineSettings,
    RawDetection, ReplayBackend, SessionState, SessionSummary, StubBackend, SyntheticConfig,
    SyntheticSource, ViolationPolicy,
};

const FPS: f64 = 25.0;

fn source(frames: u64) -> SyntheticSource {
    SyntheticSource::new(SyntheticConfig {
        frames,
        fps: FPS,
        width: 96,
        height: 72,
        ..SyntheticConfig::default()
    })
    .expect("synthetic source")
}

fn person(x: f32) -> RawDetection {
    RawDetection::new("Person", [x, 10.0, x + 20.0, 60.0], 0.9)
}

fn hardhat(x: f32) -> RawDetection {
    RawDetection::new("Hardhat", [x, 10.0, x + 20.0, 24.0], 0.9)
}

fn run_in_memory(
    settings: PipelineSettings,
    frames: u64,
    detector: StubBackend,
) -> Result<(SessionSummary, Vec<String>)> {
    let mut pipeline = Pipeline::new(
        settings,
        source(frames),
        detector,
        InMemoryArtifactStore::new(),
        InMemoryNotifier::new(),
    )?;
    let summary = pipeline.run(&AtomicBool::new(false))?;
    assert_eq!(pipeline.state(), SessionState::Done);
    let names = pipeline
        .store()
        .names()
        .into_iter()
        .map(str::to_string)
        .collect();
    Ok((summary, names))
}

#[test]
fn sustained_violation_is_throttled_and_snapshotted() -> Result<()> {
    let (summary, names) = run_in_memory(
        PipelineSettings::default(),
        160,
        StubBackend::new(vec![person(10.0)]),
    )?;

    assert_eq!(summary.total_frames, 160);
    assert_eq!(summary.violation_frames, 160);
    assert_eq!(
        names,
        vec!["violation_00001_1", "summary_00070", "summary_00140"]
    );
    Ok(())
}

#[test]
fn violator_captures_are_spaced_by_the_throttle_interval() -> Result<()> {
    let (summary, _) = run_in_memory(
        PipelineSettings::default(),
        450,
        StubBackend::new(vec![person(10.0), person(50.0)]),
    )?;

    let captured: Vec<u64> = summary
        .artifacts
        .iter()
        .filter(|artifact| artifact.kind == ArtifactKind::ViolatorCrop)
        .map(|artifact| artifact.frame_index)
        .collect();
    assert_eq!(captured, vec![1, 201, 401]);
    for pair in captured.windows(2) {
        let spacing = Duration::from_secs_f64((pair[1] - pair[0]) as f64 / FPS);
        assert!(spacing >= Duration::from_secs(8));
    }

    let summaries = summary
        .artifacts
        .iter()
        .filter(|artifact| artifact.kind == ArtifactKind::Summary)
        .count();
    assert_eq!(summaries, 6);
    Ok(())
}

#[test]
fn identical_sessions_produce_identical_summaries() -> Result<()> {
    let script = || {
        StubBackend::with_script(vec![
            vec![person(10.0), hardhat(10.0)],
            vec![person(10.0), person(50.0), hardhat(10.0)],
            vec![],
            vec![person(50.0), hardhat(10.0)],
        ])
    };
    let (first, first_names) = run_in_memory(PipelineSettings::default(), 300, script())?;
    let (second, second_names) = run_in_memory(PipelineSettings::default(), 300, script())?;

    assert_eq!(first, second);
    assert_eq!(first.digest()?, second.digest()?);
    assert_eq!(first_names, second_names);
    Ok(())
}

#[test]
fn policies_disagree_on_a_misplaced_hardhat() -> Result<()> {
    // Two workers, two hardhats, but one hardhat sits away from both heads.
    let detections = vec![person(10.0), person(50.0), hardhat(10.0), hardhat(75.0)];
    let verdicts: Vec<(ViolationPolicy, u64)> = [
        ViolationPolicy::Presence,
        ViolationPolicy::CountDeficit,
        ViolationPolicy::PerPerson,
    ]
    .into_iter()
    .map(|policy| {
        let settings = PipelineSettings {
            policy,
            snapshot_interval: policy.default_snapshot_interval(),
            ..PipelineSettings::default()
        };
        run_in_memory(settings, 10, StubBackend::new(detections.clone()))
            .map(|(summary, _)| (policy, summary.violation_frames))
    })
    .collect::<Result<_>>()?;

    assert_eq!(
        verdicts,
        vec![
            (ViolationPolicy::Presence, 0),
            (ViolationPolicy::CountDeficit, 0),
            (ViolationPolicy::PerPerson, 10),
        ]
    );
    Ok(())
}

#[test]
fn low_confidence_equipment_does_not_count() -> Result<()> {
    let (summary, _) = run_in_memory(
        PipelineSettings {
            policy: ViolationPolicy::Presence,
            ..PipelineSettings::default()
        },
        5,
        StubBackend::new(vec![
            person(10.0),
            RawDetection::new("Hardhat", [10.0, 10.0, 30.0, 24.0], 0.3),
        ]),
    )?;

    assert_eq!(summary.violation_frames, 5);
    assert_eq!(summary.counted(ClassLabel::Hardhat), Some(0));
    assert_eq!(summary.persons, 5);
    Ok(())
}

#[test]
fn replayed_recording_writes_artifacts_and_report() -> Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let recording = concat!(
        r#"{"frame": 1, "detections": [{"label": "Person", "box": [10, 10, 30, 60], "confidence": 0.92}, {"label": "Hardhat", "box": [10, 10, 30, 24], "confidence": 0.81}]}"#,
        "\n",
        r#"{"frame": 2, "detections": [{"label": "Person", "box": [10, 10, 30, 60], "confidence": 0.9}, {"label": "Person", "box": [50, 10, 70, 60], "confidence": 0.88}, {"label": "Hardhat", "box": [10, 10, 30, 24], "confidence": 0.8}]}"#,
        "\n",
        "\n",
        r#"{"frame": 4, "detections": []}"#,
        "\n",
    );
    let recording_path = temp_dir.path().join("detections.jsonl");
    std::fs::write(&recording_path, recording)?;
    let replay = ReplayBackend::from_path(&recording_path)?;
    assert_eq!(replay.frame_count(), 4);

    let artifact_dir = temp_dir.path().join("violator_images");
    std::fs::create_dir_all(&artifact_dir)?;
    std::fs::write(artifact_dir.join("violation_00009_1.jpg"), b"stale")?;
    let report_path = temp_dir.path().join("report.json");

    let mut pipeline = Pipeline::new(
        PipelineSettings::default(),
        source(replay.frame_count()),
        replay,
        FilesystemArtifactStore::new(FilesystemStoreConfig {
            root: artifact_dir.clone(),
            ..FilesystemStoreConfig::default()
        }),
        JsonReportNotifier::new(report_path.clone()),
    )?;
    let summary = pipeline.run(&AtomicBool::new(false))?;

    assert_eq!(summary.total_frames, 4);
    assert_eq!(summary.violation_frames, 1);
    assert_eq!(summary.persons, 3);
    assert_eq!(summary.counted(ClassLabel::Hardhat), Some(2));
    assert!(summary
        .report_text()
        .contains("- 3 persons, only 2 hardhats"));

    assert!(!artifact_dir.join("violation_00009_1.jpg").exists());
    let crop = image::open(artifact_dir.join("violation_00002_1.jpg"))?;
    assert_eq!((crop.width(), crop.height()), (150, 200));

    let report: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&report_path)?)?;
    assert_eq!(report["digest"], summary.digest()?);
    assert_eq!(report["summary"]["violation_frames"], 1);
    assert_eq!(report["summary"]["artifacts"][0]["name"], "violation_00002_1");
    Ok(())
}
