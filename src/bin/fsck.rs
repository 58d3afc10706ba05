use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use bwfs::{check, CheckOptions};

/// Check, and optionally repair, a black & white filesystem.
///
/// Exit codes: 0 clean, 1 repaired, 4 errors remain, 8 operational failure.
#[derive(Parser)]
#[command(name = "fsck-bwfs")]
struct Cli {
    /// Check even when the volume looks clean (kept for compatibility;
    /// every check always runs)
    #[arg(short = 'f')]
    force: bool,

    /// Repair every inconsistency without asking
    #[arg(short = 'y')]
    repair: bool,

    /// Verbose progress output
    #[arg(short = 'v')]
    verbose: bool,

    /// Filesystem directory
    dir: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        })
        .init();
    if cli.force {
        log::debug!("-f accepted; the full check runs unconditionally");
    }

    if !cli.dir.is_dir() {
        eprintln!(
            "fsck-bwfs: '{}' is not an accessible directory",
            cli.dir.display()
        );
        return ExitCode::from(8);
    }

    let (status, report) = check(&cli.dir, CheckOptions { repair: cli.repair });

    println!("errors found: {}", report.errors_found);
    println!("errors fixed: {}", report.errors_fixed);
    println!("warnings:     {}", report.warnings);
    for ino in &report.orphans {
        println!("orphaned inode: {ino}");
    }
    println!("filesystem {status}");

    ExitCode::from(status.exit_code() as u8)
}
