use simbatch_core::{BatchError, ErrorInfo, FailureReport, RunFailure};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("name", "mtu")
        .with_context("reason", "example")
}

#[test]
fn schema_error_surface() {
    let err = BatchError::AxisNameConflict(sample_info("space.axis_conflict", "axis declared twice"));
    assert_eq!(err.info().code, "space.axis_conflict");
    assert!(err.info().context.contains_key("name"));

    let err = BatchError::UnknownInput(sample_info("spec.unknown_input", "no such input"));
    assert_eq!(err.info().code, "spec.unknown_input");
}

#[test]
fn process_failure_carries_exit_code() {
    let err = BatchError::ProcessFailed {
        code: Some(3),
        info: ErrorInfo::new("sandbox.process_failed", "job exited"),
    };
    assert_eq!(err.exit_code(), Some(3));
    assert!(err.to_string().contains("exit code 3"));

    let killed = BatchError::ProcessFailed {
        code: None,
        info: ErrorInfo::new("sandbox.process_failed", "job killed"),
    };
    assert_eq!(killed.exit_code(), None);
    assert!(killed.to_string().contains("<signal>"));
}

#[test]
fn failure_report_sorts_and_names_indices() {
    let failure = |index: usize| RunFailure {
        index,
        sandbox: format!("runs/{index}"),
        error: BatchError::ConfigMissing(ErrorInfo::new("sandbox.config_missing", "missing")),
    };
    let report = FailureReport::new("/tmp/campaign", 5, vec![failure(3), failure(1)]);
    assert_eq!(report.indices(), vec![1, 3]);
    assert_eq!(report.summary.context["indices"], "1,3");
    let err = BatchError::Campaign(report);
    assert_eq!(err.info().code, "campaign.runs_failed");
    let text = err.to_string();
    assert!(text.contains("2 of 5 runs failed"));
    assert!(text.contains("run 1 (runs/1)"));
}

#[test]
fn errors_roundtrip_through_json() {
    let err = BatchError::ProcessFailed {
        code: Some(2),
        info: sample_info("sandbox.process_failed", "boom").with_hint("inspect out/stdout.txt"),
    };
    let text = serde_json::to_string(&err).expect("encode");
    let decoded: BatchError = serde_json::from_str(&text).expect("decode");
    assert_eq!(decoded, err);
}
