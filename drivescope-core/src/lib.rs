use colored::Colorize;

pub mod audit;
pub mod checkpoint;
pub mod classify;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod report;
pub mod roles;
pub mod sink;
pub mod walker;

pub use audit::{AuditOptions, WalkReport, WalkSummary, authorize, discover_drives, walk_files};
pub use checkpoint::{CheckpointStore, WalkCheckpoint};
pub use error::{AuditError, Result};
pub use walker::{Budget, TreeWalker, WalkOutcome, WalkerConfig};

pub fn print_banner() {
    println!(
        "{} {}",
        "drivescope".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
    println!("{}", "shared drive sharing inventory".bright_white());
    println!();
}
