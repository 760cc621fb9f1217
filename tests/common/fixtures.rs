/// Simulated media and adapters for integration tests

use fluxrescue::hardware::{SimulatedCodec, SimulatedDrive};
use fluxrescue::recovery::ProgressEvent;
use fluxrescue::*;

pub type SimAdapter = SectorFluxAdapter<SimulatedDrive, SimulatedCodec>;

/// 3.5" high density, 2880 sectors
pub fn hd_geometry() -> Geometry {
    Geometry::from_format("1.44m").expect("1.44m is a built-in format")
}

/// 180 sectors, fast enough for property tests
pub fn small_geometry() -> Geometry {
    Geometry::new(10, 2, 9, 512)
}

pub fn blank_drive(geometry: Geometry) -> SimulatedDrive {
    SimulatedDrive::formatted(geometry, Encoding::Mfm).expect("valid geometry")
}

/// Adapter over `drive` with unit 0 selected
pub fn open_adapter(drive: SimulatedDrive, geometry: Geometry, config: &RecoveryConfig) -> SimAdapter {
    let mut adapter = SectorFluxAdapter::new(drive, SimulatedCodec::new(), geometry, config)
        .expect("adapter construction");
    adapter.open(0).expect("select unit 0");
    adapter
}

/// Run a recovery and collect every progress event it emitted
pub fn recover(
    adapter: &mut SimAdapter,
    config: &RecoveryConfig,
    mode: &RecoveryMode,
) -> (RecoveryReport, Vec<ProgressEvent>) {
    let mut events = Vec::new();
    let report = RecoveryEngine::new(adapter, config)
        .recover_disk(mode, &mut |event| events.push(event.clone()), &CancelToken::new())
        .expect("valid recovery mode");
    (report, events)
}

/// Read the whole medium again with a cold cache, so the map reflects what
/// is actually recorded rather than what a run believed it wrote
pub fn rescan(adapter: &mut SimAdapter, config: &RecoveryConfig) -> SectorMap {
    let result = scan_all_sectors(adapter, config, &mut |_| {}, &CancelToken::new());
    assert!(result.is_complete(), "rescan stopped early: {:?}", result.aborted);
    result.map
}
