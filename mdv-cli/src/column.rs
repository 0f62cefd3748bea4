use std::io::{BufWriter, Write};
use std::path::Path;

use mdv_project::MdvProject;

pub fn exec_column(path: &Path, datasource: &str, field: &str) -> anyhow::Result<()> {
    let project = MdvProject::open(path)?;
    let column = project.get_column(datasource, field)?;

    let mut out = BufWriter::new(std::io::stdout().lock());
    for value in column.to_strings() {
        writeln!(out, "{value}")?;
    }
    out.flush()?;
    Ok(())
}
