use std::path::PathBuf;

use anyhow::Context;
use log::info;
use mdv_project::{MdvProject, ProjectOptions};

pub struct ExportArgs {
    pub project: PathBuf,
    pub out: Option<PathBuf>,
    pub compression_level: u32,
    pub datasource: Option<String>,
}

pub fn exec_export(args: ExportArgs) -> anyhow::Result<()> {
    let options = ProjectOptions::default().with_compression_level(args.compression_level);
    let project = MdvProject::open_with_options(&args.project, options)
        .with_context(|| format!("opening project {}", args.project.display()))?;
    let out = args.out.unwrap_or_else(|| args.project.join("binarydata"));

    let written = match args.datasource {
        Some(name) => vec![project.export_datasource(&name, &out)?],
        None => project.export_all(&out)?,
    };

    for paths in &written {
        println!("{}\t{}", paths.blob.display(), paths.index.display());
    }
    info!("wrote {} data sources to {}", written.len(), out.display());
    Ok(())
}
