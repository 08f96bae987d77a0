use super::BenchError;
use super::logging;

#[test]
fn test_logging_init_accepts_levels() {
    logging::init("info");
    logging::init("debug");
    logging::init("warning");
}

#[test]
fn test_quiet_runs_log_at_warn() {
    assert_eq!(logging::level_for(true), "warn");
    assert_eq!(logging::level_for(false), "info");
}

#[test]
fn test_errors_render_their_context() {
    let err = BenchError::Publish {
        topic: "/test-0".to_string(),
        reason: "closed".to_string(),
    };
    assert_eq!(err.to_string(), "publish to '/test-0' failed: closed");

    let err = BenchError::WorkerLost("publisher");
    assert_eq!(err.to_string(), "publisher exited without reporting a result");
}
