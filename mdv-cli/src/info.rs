use std::path::Path;

use mdv_project::MdvProject;

pub fn exec_info(path: &Path) -> anyhow::Result<()> {
    let project = MdvProject::open(path)?;
    let datasources = project.datasources()?;
    println!("{} data sources in {}", datasources.len(), path.display());

    for ds in datasources {
        println!("{}: {} rows", ds.name, ds.size);
        for column in &ds.columns {
            let datatype = column
                .datatype
                .as_ref()
                .map_or_else(|| "?".to_string(), ToString::to_string);
            if column.name == column.field {
                println!("  {} [{datatype}]", column.field);
            } else {
                println!("  {} ({}) [{datatype}]", column.field, column.name);
            }
        }
        for (target, link) in &ds.links {
            let Some(rows_as_columns) = &link.rows_as_columns else {
                println!("  -> {target}");
                continue;
            };
            println!(
                "  -> {target} rows as columns \"{}\" named by {}",
                rows_as_columns.name, rows_as_columns.name_column
            );
            for (stub, subgroup) in &rows_as_columns.subgroups {
                println!(
                    "     {stub}: {} \"{}\" {}",
                    subgroup.name, subgroup.label, subgroup.kind
                );
            }
        }
    }
    Ok(())
}
