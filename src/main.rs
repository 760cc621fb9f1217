use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use fluxrescue::geometry::{formats, FORMATS};
use fluxrescue::hardware::{Damage, SimulatedCodec, SimulatedDrive};
use fluxrescue::recovery::{ProgressEvent, RecoveryScope};
use fluxrescue::scan::get_scan_statistics;
use fluxrescue::settings;
use fluxrescue::ui::{progress::pass_line, summary, RunProgress};
use fluxrescue::*;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

type SimAdapter = SectorFluxAdapter<SimulatedDrive, SimulatedCodec>;

#[derive(Parser)]
#[command(name = "fluxrescue")]
#[command(about = "Surface scan and multi-pass magnetic restoration for degraded floppy media")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in disk formats
    Formats,

    /// Read every sector once and report the surface condition
    Scan {
        #[command(flatten)]
        disk: DiskArgs,

        /// Print the per-track surface map
        #[arg(long)]
        map: bool,
    },

    /// Run the multi-pass recovery loop
    Recover {
        #[command(flatten)]
        disk: DiskArgs,

        /// Run exactly this many pattern/rescan cycles
        #[arg(long, conflicts_with = "max_passes")]
        passes: Option<u32>,

        /// Stop on convergence or after this many cycles
        #[arg(long, default_value_t = 10)]
        max_passes: u32,

        /// Only work on these sectors (comma-separated LBAs)
        #[arg(long, value_delimiter = ',')]
        targets: Vec<Lba>,

        /// Multiread attempts for inconclusive sectors (0 disables)
        #[arg(long)]
        multiread: Option<u32>,

        /// Skip restoration pattern writes between passes
        #[arg(long)]
        no_patterns: bool,

        /// Write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the per-track surface map
        #[arg(long)]
        map: bool,
    },

    /// Re-evaluate the pass history of a saved report
    Analyze {
        /// Report written by `recover --output`
        report: PathBuf,
    },
}

/// Medium selection and simulated damage
#[derive(Args)]
struct DiskArgs {
    /// Disk format name (see `formats`)
    #[arg(short, long, default_value = "1.44m")]
    format: String,

    /// Sectors that read bad until their track is rewritten
    #[arg(long, value_delimiter = ',')]
    weak: Vec<Lba>,

    /// Track writes a weak sector needs before it reads back clean
    #[arg(long, default_value_t = 1)]
    heals_after: u32,

    /// Sectors with a drifting bit error (recoverable by multiread)
    #[arg(long, value_delimiter = ',')]
    marginal: Vec<Lba>,

    /// Sectors whose ID mark is destroyed
    #[arg(long, value_delimiter = ',')]
    missing: Vec<Lba>,

    /// Sectors that never read back cleanly
    #[arg(long, value_delimiter = ',')]
    permanent: Vec<Lba>,

    /// Scatter this many randomly damaged sectors
    #[arg(long, default_value_t = 0)]
    random_damage: usize,

    /// Seed for --random-damage
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Present the medium as write-protected
    #[arg(long)]
    write_protect: bool,
}

/// The part of a saved report needed to re-run the convergence analysis
#[derive(Deserialize)]
struct SavedReport {
    statistics: RecoveryStatistics,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.log_json);

    let cancel = CancelToken::new();
    setup_signal_handlers(cancel.clone())?;

    match &cli.command {
        Commands::Formats => list_formats(cli.json),
        Commands::Scan { disk, map } => {
            let config = settings::load_config(cli.config.as_deref())?;
            run_scan(disk, config, *map, cli.json, &cancel)
        }
        Commands::Recover {
            disk,
            passes,
            max_passes,
            targets,
            multiread,
            no_patterns,
            output,
            map,
        } => {
            let mut config = settings::load_config(cli.config.as_deref())?;
            if *no_patterns {
                config.pattern_writes = false;
            }

            let mut mode = match passes {
                Some(n) => RecoveryMode::fixed_passes(*n),
                None => RecoveryMode::convergence(*max_passes),
            };
            if !targets.is_empty() {
                mode = mode.targeted(targets.iter().copied());
            }
            if let Some(attempts) = multiread {
                mode = mode.with_multiread(*attempts);
            }

            run_recover(disk, config, &mode, output.as_deref(), *map, cli.json, &cancel)
        }
        Commands::Analyze { report } => analyze_report(report, cli.json),
    }
}

fn init_logging(debug: bool, json: bool) {
    let default = if debug { "fluxrescue=debug" } else { "fluxrescue=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// Ctrl-C stops the run at the next track boundary
fn setup_signal_handlers(cancel: CancelToken) -> Result<()> {
    use signal_hook::{consts::SIGINT, iterator::Signals};

    let mut signals = Signals::new([SIGINT])?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            if sig == SIGINT {
                eprintln!("\nInterrupt received, stopping after the current track...");
                cancel.cancel();
            }
        }
    });

    Ok(())
}

fn progress_bar(scope_len: u64, json: bool) -> RunProgress {
    if cfg!(feature = "progress-bars") && !json {
        RunProgress::new(scope_len)
    } else {
        RunProgress::hidden()
    }
}

fn list_formats(json: bool) -> Result<()> {
    if json {
        let listing: Vec<_> = FORMATS
            .iter()
            .map(|f| {
                serde_json::json!({
                    "name": f.name,
                    "description": f.description,
                    "geometry": f.geometry,
                    "encoding": f.encoding,
                    "image_size": f.image_size(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("{:<10} {:<24} {:<20} {:<5} {:>9}", "NAME", "DESCRIPTION", "GEOMETRY", "ENC", "BYTES");
    for f in FORMATS {
        println!(
            "{:<10} {:<24} {:<20} {:<5} {:>9}",
            f.name,
            f.description,
            f.geometry.to_string(),
            f.encoding.to_string(),
            f.image_size()
        );
    }
    Ok(())
}

fn open_simulated(disk: &DiskArgs, config: &mut RecoveryConfig) -> Result<SimAdapter> {
    let format = formats::find(&disk.format)
        .with_context(|| format!("Unknown disk format '{}' (see `fluxrescue formats`)", disk.format))?;
    let geometry = format.geometry;
    config.encoding = format.encoding;

    let mut drive = SimulatedDrive::formatted(geometry, format.encoding)
        .context("Failed to format simulated medium")?
        .with_write_protect(disk.write_protect);

    let damage = [
        (
            &disk.weak,
            Damage::Weak {
                heals_after_writes: disk.heals_after,
            },
        ),
        (&disk.marginal, Damage::Marginal),
        (&disk.missing, Damage::Missing),
        (&disk.permanent, Damage::Permanent),
    ];
    for (lbas, kind) in damage {
        for &lba in lbas {
            if lba >= geometry.total_sectors {
                bail!("LBA {} is beyond the last sector of a {} disk", lba, format.name);
            }
            drive.set_damage(lba, kind);
        }
    }
    if disk.random_damage > 0 {
        let injected = drive.inject_random_damage(disk.random_damage, disk.seed);
        tracing::info!(count = injected.len(), seed = disk.seed, lbas = ?injected, "Injected random damage");
    }

    let mut adapter = SectorFluxAdapter::new(drive, SimulatedCodec::new(), geometry, config)?;
    adapter
        .open(config.drive_unit)
        .with_context(|| format!("Failed to open drive unit {}", config.drive_unit))?;
    Ok(adapter)
}

fn run_scan(disk: &DiskArgs, mut config: RecoveryConfig, show_map: bool, json: bool, cancel: &CancelToken) -> Result<()> {
    let mut adapter = open_simulated(disk, &mut config)?;
    let mut progress = progress_bar(adapter.geometry().total_sectors, json);

    let result = scan_all_sectors(&mut adapter, &config, &mut |p| progress.on_sector(p), cancel);
    progress.finish();
    adapter.close()?;

    if json {
        let out = serde_json::json!({
            "geometry": result.map.geometry(),
            "complete": result.is_complete(),
            "aborted": result.aborted,
            "tracks_scanned": result.tracks_scanned,
            "statistics": get_scan_statistics(&result.map),
            "bad_lbas": result.map.bad_lbas(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", summary::render_scan_summary(&result));
        if show_map {
            print!("\n{}", summary::render_surface_map(&result.map));
        }
    }

    if let Some(reason) = result.aborted {
        bail!("Scan stopped: {}", reason);
    }
    Ok(())
}

fn run_recover(
    disk: &DiskArgs,
    mut config: RecoveryConfig,
    mode: &RecoveryMode,
    output: Option<&Path>,
    show_map: bool,
    json: bool,
    cancel: &CancelToken,
) -> Result<()> {
    let mut adapter = open_simulated(disk, &mut config)?;
    let scope_len = match &mode.scope {
        RecoveryScope::Full => adapter.geometry().total_sectors,
        RecoveryScope::Targeted(lbas) => lbas.len() as u64,
    };
    let mut progress = progress_bar(scope_len, json);

    let report = {
        let mut engine = RecoveryEngine::new(&mut adapter, &config);
        engine
            .recover_disk(mode, &mut |event: &ProgressEvent| progress.on_event(event), cancel)
            .context("Recovery could not start")?
    };
    progress.finish();
    adapter.close()?;

    let report_json = report.to_json()?;
    if let Some(path) = output {
        std::fs::write(path, &report_json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Report written");
    }

    if json {
        println!("{}", report_json);
    } else {
        print!("{}", summary::render_recovery_summary(&report));
        if show_map {
            print!("\n{}", summary::render_surface_map(&report.map));
        }
    }

    if let Outcome::Aborted(reason) = &report.outcome {
        bail!("Recovery aborted: {}", reason);
    }
    Ok(())
}

fn analyze_report(path: &Path, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report {}", path.display()))?;
    let saved: SavedReport = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a recovery report", path.display()))?;

    let stats = saved.statistics;
    let recommendation = analyze_convergence(&stats);

    if json {
        let out = serde_json::json!({
            "passes": stats.len(),
            "initial_bad_count": stats.initial_bad_count(),
            "final_bad_count": stats.final_bad_count(),
            "recovered_addresses": stats.recovered_addresses(),
            "recommendation": recommendation,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for record in stats.passes() {
        println!("{}", pass_line(record));
    }
    println!("\n{}: {}", recommendation, recommendation.description());
    Ok(())
}
