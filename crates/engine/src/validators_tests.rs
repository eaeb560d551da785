// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use myc_core::FakeClock;
use myc_storage::eventlog::MemorySink;
use myc_storage::CanaryConfig;
use tempfile::TempDir;

fn doctor(
    tmp: &TempDir,
    sink: Arc<MemorySink>,
    mode: ValidatorMode,
    canary: CanaryConfig,
) -> DoctorRunner<FakeClock> {
    let config = DoctorConfig {
        command: String::new(),
        timeout_seconds: 30,
        mode,
        canary,
    };
    DoctorRunner::new(
        config,
        PathsContext::with_home(tmp.path()),
        "demo",
        RunId::new("run-a"),
        sink,
        FakeClock::new(),
    )
}

fn canary_env() -> CanaryConfig {
    CanaryConfig { mode: CanaryMode::Env, env_var: "ORCH_CANARY".into(), warn_on_unexpected_pass: true }
}

fn canary_off() -> CanaryConfig {
    CanaryConfig::default()
}

fn canary_events(sink: &MemorySink) -> Vec<String> {
    sink.types().into_iter().filter(|t| t.starts_with("doctor.canary.")).collect()
}

#[test]
fn summary_formatter_shape() {
    assert_eq!(
        format_summary(true, 2, 1, "skipped"),
        "Effective: yes | Concerns: 2 | Recs: 1 | Canary: skipped"
    );
    assert_eq!(
        format_summary(false, 0, 0, "off"),
        "Effective: no | Concerns: 0 | Recs: 0 | Canary: off"
    );
}

#[tokio::test]
async fn passing_doctor_emits_pass_and_writes_log() {
    let tmp = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::default());
    let runner = doctor(&tmp, sink.clone(), ValidatorMode::Block, canary_off());

    let result = runner.run("7", "demo task", 1, tmp.path(), "echo hi").await;
    assert_eq!(result.status, ValidatorStatus::Pass);
    assert!(!result.blocks());
    assert!(sink.types().contains(&"doctor.pass".to_string()));

    let log = result.report_path.unwrap();
    assert_eq!(std::fs::read_to_string(log).unwrap().trim(), "hi");
}

#[tokio::test]
async fn failing_doctor_blocks_in_block_mode() {
    let tmp = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::default());
    let runner = doctor(&tmp, sink.clone(), ValidatorMode::Block, canary_off());

    let result = runner.run("7", "demo task", 1, tmp.path(), "exit 3").await;
    assert_eq!(result.status, ValidatorStatus::Fail);
    assert!(result.blocks());
    assert!(sink.types().contains(&"doctor.fail".to_string()));
}

#[tokio::test]
async fn canary_off_emits_exactly_one_skipped() {
    let tmp = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::default());
    let runner = doctor(&tmp, sink.clone(), ValidatorMode::Block, canary_off());

    runner.run("7", "demo task", 1, tmp.path(), "true").await;
    assert_eq!(canary_events(&sink), vec!["doctor.canary.skipped"]);
}

#[tokio::test]
async fn canary_expected_fail_when_doctor_honors_env() {
    let tmp = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::default());
    let runner = doctor(&tmp, sink.clone(), ValidatorMode::Block, canary_env());

    // Fails iff ORCH_CANARY is set: exactly what a healthy doctor does.
    let result = runner
        .run("7", "demo task", 1, tmp.path(), "test -z \"$ORCH_CANARY\"")
        .await;
    assert_eq!(result.status, ValidatorStatus::Pass);
    let events = canary_events(&sink);
    assert_eq!(events, vec!["doctor.canary.start", "doctor.canary.expected_fail"]);
}

#[tokio::test]
async fn canary_unexpected_pass_warns_by_default() {
    let tmp = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::default());
    let runner = doctor(&tmp, sink.clone(), ValidatorMode::Block, canary_env());

    let result = runner.run("7", "demo task", 1, tmp.path(), "true").await;
    // warn_on_unexpected_pass keeps the pass but records the canary.
    assert_eq!(result.status, ValidatorStatus::Pass);
    assert!(result.trigger.is_none());
    assert!(canary_events(&sink).contains(&"doctor.canary.unexpected_pass".to_string()));
}

#[tokio::test]
async fn canary_unexpected_pass_fails_doctor_in_block_mode() {
    let tmp = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::default());
    let mut canary = canary_env();
    canary.warn_on_unexpected_pass = false;
    let runner = doctor(&tmp, sink.clone(), ValidatorMode::Block, canary);

    let result = runner.run("7", "demo task", 1, tmp.path(), "true").await;
    assert_eq!(result.status, ValidatorStatus::Fail);
    assert_eq!(result.trigger.as_deref(), Some("doctor_canary_failed"));
    assert!(result.blocks());
}

#[tokio::test]
async fn canary_skipped_when_doctor_already_failed() {
    let tmp = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::default());
    let runner = doctor(&tmp, sink.clone(), ValidatorMode::Block, canary_env());

    runner.run("7", "demo task", 1, tmp.path(), "false").await;
    assert_eq!(canary_events(&sink), vec!["doctor.canary.skipped"]);
}

#[tokio::test]
async fn pipeline_reuses_reports_on_disk() {
    let tmp = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::default());
    let paths = PathsContext::with_home(tmp.path());

    struct CountingRunner(std::sync::atomic::AtomicUsize);
    #[async_trait]
    impl ValidatorRunner for CountingRunner {
        async fn run(
            &self,
            _kind: ValidatorKind,
            _request: &ValidatorRequest,
        ) -> Result<ValidatorVerdict, EngineError> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(ValidatorVerdict {
                status: ValidatorStatus::Pass,
                effective: true,
                concerns: 1,
                recommendations: 2,
            })
        }
    }

    let runner = Arc::new(CountingRunner(std::sync::atomic::AtomicUsize::new(0)));
    let mut config = ValidatorsConfig::default();
    config.test.mode = ValidatorMode::Warn;
    let pipeline = ValidatorPipeline::new(
        config,
        runner.clone(),
        paths,
        "demo",
        RunId::new("run-a"),
        sink,
        FakeClock::new(),
    );

    let request = ValidatorRequest {
        task_id: "7".into(),
        workspace: tmp.path().to_path_buf(),
        changed_files: vec![],
    };
    let first = pipeline.run_for_task("demo task", 1, &request).await;
    let second = pipeline.run_for_task("demo task", 1, &request).await;
    assert_eq!(runner.0.load(std::sync::atomic::Ordering::SeqCst), 1, "report must be reused");
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].summary, second[0].summary);
    assert_eq!(
        first[0].summary.as_deref(),
        Some("Effective: yes | Concerns: 1 | Recs: 2 | Canary: off")
    );
}

#[tokio::test]
async fn pipeline_skips_disabled_validators() {
    let tmp = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::default());
    let pipeline = ValidatorPipeline::new(
        ValidatorsConfig::default(), // all off
        Arc::new(MockValidatorRunner),
        PathsContext::with_home(tmp.path()),
        "demo",
        RunId::new("run-a"),
        sink.clone(),
        FakeClock::new(),
    );
    let request = ValidatorRequest {
        task_id: "7".into(),
        workspace: tmp.path().to_path_buf(),
        changed_files: vec![],
    };
    let results = pipeline.run_for_task("demo task", 1, &request).await;
    assert!(results.is_empty());
    assert!(sink.types().is_empty());
}
