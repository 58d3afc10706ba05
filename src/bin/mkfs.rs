use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// Format a directory as a black & white filesystem.
#[derive(Parser)]
#[command(name = "mkfs-bwfs")]
struct Cli {
    /// Number of logical blocks in the new volume
    #[arg(short = 'b', long = "blocks", default_value_t = 1024)]
    blocks: u32,

    /// Target directory (created if absent)
    dir: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match bwfs::format(&cli.dir, cli.blocks) {
        Ok(sb) => {
            println!(
                "{} formatted with {} blocks (root inode {})",
                cli.dir.display(),
                sb.total_blocks,
                sb.root_inode
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("mkfs-bwfs: {err}");
            ExitCode::FAILURE
        }
    }
}
