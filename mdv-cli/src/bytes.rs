use std::fs;
use std::path::Path;

use anyhow::{Context, anyhow};
use mdv_project::{ByteRequest, DataSourceDescriptor, MdvProject};

/// A column field if the data source has one by that name, else `stub:row` for a known subgroup.
fn parse_unit(ds: &DataSourceDescriptor, unit: &str) -> anyhow::Result<ByteRequest> {
    if ds.column(unit).is_some() {
        return Ok(ByteRequest::column(unit));
    }
    if let Some((stub, row)) = unit.rsplit_once(':') {
        if ds.subgroup(stub).is_some() {
            let row = row
                .parse::<usize>()
                .with_context(|| format!("bad row in {unit}"))?;
            return Ok(ByteRequest::subgroup_row(stub, row));
        }
    }
    Err(anyhow!("{unit} is neither a column nor a subgroup row of {}", ds.name))
}

pub fn exec_bytes(
    path: &Path,
    datasource: &str,
    units: &[String],
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let project = MdvProject::open(path)?;
    let ds = project.get_datasource_metadata(datasource)?;
    let requests = units
        .iter()
        .map(|unit| parse_unit(&ds, unit))
        .collect::<anyhow::Result<Vec<_>>>()?;

    match out {
        Some(file) => {
            let payload = project.get_byte_data(datasource, &requests)?;
            fs::write(file, &payload).with_context(|| format!("writing {}", file.display()))?;
            println!("{} bytes written to {}", payload.len(), file.display());
        }
        None => {
            for (unit, request) in units.iter().zip(&requests) {
                let part = project.get_byte_data(datasource, std::slice::from_ref(request))?;
                println!("{unit}\t{} bytes", part.len());
            }
        }
    }
    Ok(())
}
