/// Integration tests for the standalone surface scan
///
/// Tests cover: progress ordering, cancellation at track boundaries,
/// device loss mid-scan, per-track summaries and the rendered surface map.

mod common;

use common::fixtures::{blank_drive, hd_geometry, open_adapter, small_geometry};
use fluxrescue::hardware::Damage;
use fluxrescue::scan::{get_scan_statistics, get_track_info, SectorProgress};
use fluxrescue::ui::summary::{render_scan_summary, render_surface_map};
use fluxrescue::*;

// ==================== FULL SCAN TESTS ====================

#[test]
fn test_progress_covers_every_sector_in_order() {
    let config = RecoveryConfig::default();
    let geometry = hd_geometry();
    let drive = blank_drive(geometry).with_damage(1000, Damage::Permanent);
    let mut adapter = open_adapter(drive, geometry, &config);

    let mut seen: Vec<SectorProgress> = Vec::new();
    let result = scan_all_sectors(&mut adapter, &config, &mut |p| seen.push(*p), &CancelToken::new());

    assert!(result.is_complete());
    assert_eq!(result.tracks_scanned, 160);
    assert_eq!(seen.len(), 2880);
    assert!(seen.windows(2).all(|w| w[0].sector_index < w[1].sector_index));
    assert!(seen.iter().all(|p| p.total_sectors == 2880));

    let bad: Vec<_> = seen.iter().filter(|p| !p.is_good).collect();
    assert_eq!(bad.len(), 1);
    assert_eq!(bad[0].sector_index, 1000);
    assert_eq!(bad[0].error_kind, ErrorKind::CrcError);
    assert!(!adapter.device().is_motor_on());
}

#[test]
fn test_track_info_and_statistics() {
    let config = RecoveryConfig {
        multiread_attempts: 0,
        ..RecoveryConfig::default()
    };
    let geometry = small_geometry();
    let drive = blank_drive(geometry)
        .with_damage(9, Damage::Permanent)
        .with_damage(11, Damage::Missing)
        .with_damage(170, Damage::Weak { heals_after_writes: 1 });
    let mut adapter = open_adapter(drive, geometry, &config);

    let result = scan_all_sectors(&mut adapter, &config, &mut |_| {}, &CancelToken::new());

    // LBA 9 and 11 are sectors 1 and 3 of cylinder 0, head 1
    let info = get_track_info(&result.map, TrackId::new(0, 1));
    assert_eq!(info.bad, 2);
    assert_eq!(info.good, 7);
    assert_eq!(info.bad_sectors, vec![1, 3]);
    assert!(get_track_info(&result.map, TrackId::new(0, 0)).is_clean());

    let stats = get_scan_statistics(&result.map);
    assert_eq!(stats.bad, 3);
    assert_eq!(stats.bad_tracks, 2);
    assert_eq!(stats.by_kind.get(&ErrorKind::CrcError), Some(&2));
    assert_eq!(stats.by_kind.get(&ErrorKind::SectorNotFound), Some(&1));
}

// ==================== INTERRUPTION TESTS ====================

#[test]
fn test_cancel_stops_at_track_boundary() {
    let config = RecoveryConfig::default();
    let geometry = hd_geometry();
    let mut adapter = open_adapter(blank_drive(geometry), geometry, &config);
    let cancel = CancelToken::new();

    // Requested while the third track is being reported
    let result = scan_all_sectors(
        &mut adapter,
        &config,
        &mut |p| {
            if p.sector_index == 40 {
                cancel.cancel();
            }
        },
        &cancel,
    );

    assert_eq!(result.aborted, Some(AbortReason::Cancelled));
    assert_eq!(result.tracks_scanned, 3);
    let counts = result.map.counts();
    assert_eq!(counts.good, 54);
    assert_eq!(counts.unscanned, 2880 - 54);
    assert_eq!(adapter.device().captures(), 3);
    assert!(!adapter.device().is_motor_on());
}

#[test]
fn test_disconnect_aborts_scan_with_partial_map() {
    let config = RecoveryConfig::default();
    let geometry = small_geometry();
    let drive = blank_drive(geometry).disconnect_after_captures(6);
    let mut adapter = open_adapter(drive, geometry, &config);

    let result = scan_all_sectors(&mut adapter, &config, &mut |_| {}, &CancelToken::new());

    match &result.aborted {
        Some(AbortReason::Fatal { kind, lba, .. }) => {
            assert_eq!(*kind, ErrorKind::DeviceDisconnected);
            assert_eq!(*lba, Some(54));
        }
        other => panic!("expected a fatal abort, got {:?}", other),
    }
    assert_eq!(result.tracks_scanned, 6);
    assert_eq!(result.map.counts().good, 54);
    assert!(result.map.is_settled());
}

#[test]
fn test_scan_without_selected_drive_aborts() {
    let config = RecoveryConfig::default();
    let geometry = small_geometry();
    let mut adapter = SectorFluxAdapter::new(
        blank_drive(geometry),
        fluxrescue::hardware::SimulatedCodec::new(),
        geometry,
        &config,
    )
    .unwrap();

    let result = scan_all_sectors(&mut adapter, &config, &mut |_| {}, &CancelToken::new());

    assert!(!result.is_complete());
    assert_eq!(result.tracks_scanned, 0);
    assert_eq!(result.map.counts().unscanned, 180);
}

// ==================== RENDERING TESTS ====================

#[test]
fn test_rendered_scan_output() {
    let config = RecoveryConfig::default();
    let geometry = small_geometry();
    let drive = blank_drive(geometry).with_damage(10, Damage::Permanent);
    let mut adapter = open_adapter(drive, geometry, &config);

    let result = scan_all_sectors(&mut adapter, &config, &mut |_| {}, &CancelToken::new());

    let map = console::strip_ansi_codes(&render_surface_map(&result.map)).to_string();
    let rows: Vec<&str> = map.lines().collect();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0], "C00 ......... | .X.......");
    assert_eq!(rows[9], "C09 ......... | .........");

    let summary = console::strip_ansi_codes(&render_scan_summary(&result)).to_string();
    assert!(summary.contains("10c/2h/9s"), "{}", summary);
    assert!(summary.contains("Bad:       1"));
    assert!(!summary.contains("Stopped early"));
}
