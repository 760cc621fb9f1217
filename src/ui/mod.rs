/// Terminal presentation for the CLI
///
/// - `progress`: live progress bar fed from scan/recovery callbacks
/// - `summary`: end-of-run text reports and the surface map
pub mod progress;
pub mod summary;

pub use progress::RunProgress;
