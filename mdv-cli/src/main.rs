mod bytes;
mod column;
mod export;
mod info;
mod logging;

use std::path::PathBuf;

use clap::Parser;

use crate::bytes::exec_bytes;
use crate::column::exec_column;
use crate::export::{ExportArgs, exec_export};
use crate::info::exec_info;
use crate::logging::{default_env_filter, setup_logger};

#[derive(clap::Parser)]
#[command(name = "mdv", version, about = "Inspect and export MDV projects")]
struct Cli {
    /// Log at trace level unless RUST_LOG is set.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Package data sources as gzip blobs with a JSON offset index.
    Export {
        project: PathBuf,

        /// Directory to write `{name}.gz` and `{name}.json` into. Defaults to `<project>/binarydata`.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Gzip level, 0 to 9.
        #[arg(short, long, default_value_t = 6)]
        compression_level: u32,

        /// Export only this data source.
        #[arg(short, long)]
        datasource: Option<String>,
    },
    /// Print data sources, their columns and links.
    Info { project: PathBuf },
    /// Print the decoded values of a column, one per line.
    Column {
        project: PathBuf,
        datasource: String,
        field: String,
    },
    /// Fetch raw bytes of columns and subgroup rows.
    Bytes {
        project: PathBuf,
        datasource: String,

        /// Column fields, or `stub:row` for one row of a subgroup.
        #[arg(required = true)]
        units: Vec<String>,

        /// Write the payload to this file instead of printing a summary.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logger(default_env_filter(cli.verbose));

    match cli.command {
        Commands::Export {
            project,
            out,
            compression_level,
            datasource,
        } => exec_export(ExportArgs {
            project,
            out,
            compression_level,
            datasource,
        }),
        Commands::Info { project } => exec_info(&project),
        Commands::Column {
            project,
            datasource,
            field,
        } => exec_column(&project, &datasource, &field),
        Commands::Bytes {
            project,
            datasource,
            units,
            out,
        } => exec_bytes(&project, &datasource, &units, out.as_deref()),
    }
}
