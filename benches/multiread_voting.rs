/// Multiread voting benchmarks
///
/// Measures bit-majority voting across sector copies and the cost of a
/// multiread recovery of a marginal sector through the simulated drive.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fluxrescue::adapter::voting::majority_vote;
use fluxrescue::hardware::{Damage, SimulatedCodec, SimulatedDrive};
use fluxrescue::scan::scan_all_sectors;
use fluxrescue::{CancelToken, Encoding, Geometry, RecoveryConfig, SectorFluxAdapter};

// Copies of one sector, each with a different single-bit error
fn noisy_copies(len: usize, copies: usize) -> Vec<Vec<u8>> {
    let original: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
    (0..copies)
        .map(|n| {
            let mut copy = original.clone();
            let bit = (n * 131) % (len * 8);
            copy[bit / 8] ^= 0x80 >> (bit % 8);
            copy
        })
        .collect()
}

fn bench_majority_vote(c: &mut Criterion) {
    let mut group = c.benchmark_group("majority_vote");

    for &len in &[128usize, 512, 1024] {
        for &copies in &[3usize, 5, 9] {
            let input = noisy_copies(len, copies);
            group.throughput(Throughput::Bytes((len * copies) as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("{}B", len), copies),
                &input,
                |b, input| b.iter(|| majority_vote(black_box(input.as_slice()))),
            );
        }
    }

    group.finish();
}

// Full-disk scan of a 720k medium with a handful of marginal sectors
fn bench_scan_with_multiread(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_with_multiread");
    group.sample_size(10);

    let geometry = Geometry::new(80, 2, 9, 512);
    for &attempts in &[0u32, 5] {
        let config = RecoveryConfig {
            multiread_attempts: attempts,
            ..RecoveryConfig::default()
        };
        group.bench_with_input(BenchmarkId::new("attempts", attempts), &config, |b, config| {
            b.iter(|| {
                let mut drive = SimulatedDrive::formatted(geometry, Encoding::Mfm).unwrap();
                for lba in [10, 400, 901, 1200] {
                    drive.set_damage(lba, Damage::Marginal);
                }
                let mut adapter =
                    SectorFluxAdapter::new(drive, SimulatedCodec::new(), geometry, config).unwrap();
                adapter.open(0).unwrap();
                let result = scan_all_sectors(&mut adapter, config, &mut |_| {}, &CancelToken::new());
                black_box(result.map.bad_count())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_majority_vote, bench_scan_with_multiread);
criterion_main!(benches);
