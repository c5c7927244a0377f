use ens_core::errors::{EnsembleError, ErrorInfo};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("kind", "CentralTendency")
        .with_context("reason", "example")
}

#[test]
fn config_error_surface() {
    let err = EnsembleError::Config(sample_info("ensemble.output_filename", "no filename"));
    assert_eq!(err.code(), "ensemble.output_filename");
    assert!(err.info().context.contains_key("kind"));
}

#[test]
fn precondition_error_surface() {
    let err = EnsembleError::Precondition(sample_info("ensemble.not_finalized", "not finalized"));
    assert_eq!(err.info().code, "ensemble.not_finalized");
    assert!(err.info().context.contains_key("reason"));
}

#[test]
fn not_found_error_surface() {
    let err = EnsembleError::NotFound(sample_info("registry.unregistered", "unknown key"));
    assert_eq!(err.code(), "registry.unregistered");
}

#[test]
fn data_and_unsupported_error_surface() {
    let data = EnsembleError::Data(sample_info("central_tendency.empty", "no data"));
    let unsupported = EnsembleError::Unsupported(sample_info("ensemble.distributed", "no"));
    assert_eq!(data.code(), "central_tendency.empty");
    assert_eq!(unsupported.code(), "ensemble.distributed");
}

#[test]
fn display_includes_context_and_hint() {
    let err = EnsembleError::Config(
        ErrorInfo::new("E1", "bad mode")
            .with_context("mode", "bogus")
            .with_hint("use tracer, tracer_and_file or file"),
    );
    let rendered = err.to_string();
    assert!(rendered.starts_with("config error: bad mode (code: E1)"));
    assert!(rendered.contains("mode=bogus"));
    assert!(rendered.contains("hint: use tracer"));
}

#[test]
fn errors_serialize_with_family_tag() {
    let err = EnsembleError::NotFound(ErrorInfo::new("N1", "missing"));
    let json = serde_json::to_value(&err).expect("serialize");
    assert_eq!(json["family"], "NotFound");
    assert_eq!(json["detail"]["code"], "N1");
    let back: EnsembleError = serde_json::from_value(json).expect("deserialize");
    assert_eq!(back, err);
}

#[test]
fn decorating_keeps_the_family() {
    let err = EnsembleError::Data(ErrorInfo::new("stat.empty_ensemble", "no values"))
        .with_context("kind", "CentralTendency")
        .with_hint("check the generator");
    assert!(matches!(err, EnsembleError::Data(_)));
    assert_eq!(err.info().context.get("kind").map(String::as_str), Some("CentralTendency"));
    assert_eq!(err.info().hint.as_deref(), Some("check the generator"));
}
