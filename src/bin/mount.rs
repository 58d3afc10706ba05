use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fuser::MountOption;

use bwfs::{BwfsFuse, FileSystem};

/// Mount a black & white filesystem through FUSE.
#[derive(Parser)]
#[command(name = "mount-bwfs")]
struct Cli {
    /// Filesystem directory (the folder of block images)
    fs_dir: PathBuf,

    /// Mount point
    mount_point: PathBuf,

    /// Allow other users to access the mount
    #[arg(long)]
    allow_other: bool,

    /// Unmount automatically when this process exits
    #[arg(long)]
    auto_unmount: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let fs_dir = match cli.fs_dir.canonicalize() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("mount-bwfs: {}: {err}", cli.fs_dir.display());
            return ExitCode::FAILURE;
        }
    };

    let fs = match FileSystem::mount(fs_dir) {
        Ok(fs) => fs,
        Err(err) => {
            eprintln!("mount-bwfs: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut options = vec![MountOption::FSName("bwfs".to_string())];
    if cli.allow_other {
        options.push(MountOption::AllowOther);
    }
    if cli.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }

    match fuser::mount2(BwfsFuse::new(fs), &cli.mount_point, &options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mount-bwfs: {err}");
            ExitCode::FAILURE
        }
    }
}
