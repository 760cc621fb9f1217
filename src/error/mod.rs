/// Error taxonomy and bad sector bookkeeping
///
/// - `classification`: the closed set of sector/hardware outcome kinds and
///   the fatal/retryable predicates every other layer branches on
/// - `bad_sector`: append-only text log of sectors finalized bad by a run
pub mod bad_sector;
pub mod classification;

pub use bad_sector::BadSectorLog;
pub use classification::{ErrorKind, Severity};
