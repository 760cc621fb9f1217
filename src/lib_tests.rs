// Tests for lib.rs core types
//
// Covers cancellation, error mapping onto the sector taxonomy, and the
// configuration defaults and serialization.

use super::*;

// ==================== CANCELLATION TESTS ====================

#[test]
fn test_cancel_token_initially_clear() {
    let token = CancelToken::new();
    assert!(!token.is_cancelled(), "Fresh token should not be cancelled");
}

#[test]
fn test_cancel_token_shared_between_clones() {
    let token = CancelToken::new();
    let handler_side = token.clone();
    handler_side.cancel();
    assert!(token.is_cancelled(), "Clones must observe the same flag");

    token.reset();
    assert!(!handler_side.is_cancelled());
}

#[test]
fn test_cancel_token_across_threads() {
    let token = CancelToken::new();
    let remote = token.clone();
    std::thread::spawn(move || remote.cancel())
        .join()
        .unwrap();
    assert!(token.is_cancelled());
}

// ==================== FLUX ERROR TESTS ====================

#[test]
fn test_hardware_error_keeps_kind() {
    let err = FluxError::hardware(ErrorKind::WriteProtected, "tab set");
    assert_eq!(err.kind(), ErrorKind::WriteProtected);
    assert!(err.is_fatal());
    assert!(err.to_string().contains("tab set"));
}

#[test]
fn test_out_of_range_is_sector_not_found() {
    let err = FluxError::OutOfRange("C90/H0/S1".to_string());
    assert_eq!(err.kind(), ErrorKind::SectorNotFound);
    assert!(!err.is_fatal());
    assert!(err.kind().is_retryable());
}

#[test]
fn test_other_errors_are_unknown() {
    let errors = vec![
        FluxError::from(GeometryError::ZeroDimension("heads")),
        FluxError::Codec {
            encoding: Encoding::Gcr,
            message: "no sync".to_string(),
        },
        FluxError::InvalidInput("bad".to_string()),
        FluxError::Interrupted,
    ];
    for err in errors {
        assert_eq!(err.kind(), ErrorKind::Unknown, "{}", err);
        assert!(!err.is_fatal());
    }
}

#[test]
fn test_io_error_conversion() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: FluxError = io.into();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert!(err.is_fatal());
}

#[test]
fn test_geometry_error_display() {
    let err = FluxError::from(GeometryError::UnsupportedSectorSize(300));
    assert!(err.to_string().contains("Invalid geometry"));
    assert!(err.to_string().contains("300"));
}

// ==================== CONFIG TESTS ====================

#[test]
fn test_recovery_config_defaults() {
    let config = RecoveryConfig::default();
    assert_eq!(config.encoding, Encoding::Mfm);
    assert_eq!(config.revolutions, 1);
    assert_eq!(config.multiread_attempts, 5);
    assert_eq!(config.convergence_window, 2);
    assert!(config.pattern_writes);
    assert_eq!(config.pattern_scope, PatternScope::Sector);
    assert!(config.bad_sector_log.is_none());
}

#[test]
fn test_recovery_config_partial_json() {
    let config: RecoveryConfig =
        serde_json::from_str(r#"{"encoding": "fm", "pattern_scope": "track", "revolutions": 3}"#).unwrap();
    assert_eq!(config.encoding, Encoding::Fm);
    assert_eq!(config.pattern_scope, PatternScope::Track);
    assert_eq!(config.revolutions, 3);
    assert_eq!(config.multiread_attempts, 5, "Missing fields fall back to defaults");
}

#[test]
fn test_recovery_config_round_trip() {
    let config = RecoveryConfig {
        drive_unit: 1,
        bad_sector_log: Some(PathBuf::from("/tmp/bad.log")),
        ..RecoveryConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    let back: RecoveryConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}
