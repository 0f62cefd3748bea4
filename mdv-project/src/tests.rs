use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};

use flate2::read::GzDecoder;
use mdv_codec::{
    ColumnDescriptor, Datatype, DecodedColumn, DenseMatrix, SparseRow, SparseRows,
    SubgroupData, SubgroupKind, datums,
};
use mdv_container::{TypedArray, from_le_bytes};
use mdv_error::{ErrorKind, MdvResult};
use rstest::{fixture, rstest};
use serde_json::json;
use tempfile::TempDir;

use crate::{
    AddDataSourceOptions, ByteRequest, ColumnInput, DataSourceDescriptor, ExportIndex,
    MdvProject, MetadataStore, ProjectOptions,
};

struct Fixture {
    dir: TempDir,
    project: MdvProject,
}

fn cells() -> Vec<ColumnInput> {
    vec![
        ColumnInput::new("cluster", datums([Some("a"), Some("b"), Some("a"), None]))
            .with_datatype(Datatype::Text),
        ColumnInput::new("tags", datums(["x,y", "", "y", "z"])).with_datatype(Datatype::Multitext),
        ColumnInput::new("score", datums(["1", "2.5", "bad", "4"]))
            .with_name("Score")
            .with_datatype(Datatype::Double),
        ColumnInput::new("barcode", datums(["AAAC", "AAAG", "AAAT", "AACA"]))
            .with_datatype(Datatype::Unique),
        ColumnInput::new("count", datums([1.0f64, 1.5, 2.0, 3.0])).with_datatype(Datatype::Int32),
    ]
}

#[fixture]
fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let project = MdvProject::open(dir.path().join("project")).unwrap();

    project
        .add_datasource("cells", cells(), AddDataSourceOptions::default())
        .unwrap();
    project
        .add_datasource(
            "genes",
            vec![ColumnInput::new("name", datums(["g1", "g2", "g3"]))],
            AddDataSourceOptions::default(),
        )
        .unwrap();

    project
        .add_rows_as_columns_link("cells", "genes", "name", "Gene Scores")
        .unwrap();
    let sparse = SparseRows::try_new(vec![10.0, 20.0, 30.0], vec![0, 2, 1], vec![0, 2, 3, 3]).unwrap();
    project
        .add_rows_as_columns_subgroup(
            "cells",
            "genes",
            "gs",
            &SubgroupData::Sparse(sparse),
            None,
            Some("Sparse Scores"),
        )
        .unwrap();
    let dense = DenseMatrix::from_row_major(3, 4, (0..12).map(|v| v as f32).collect()).unwrap();
    project
        .add_rows_as_columns_subgroup(
            "cells",
            "genes",
            "ds",
            &SubgroupData::Dense(dense),
            Some("dense_scores"),
            None,
        )
        .unwrap();

    Fixture { dir, project }
}

fn inflate(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out).unwrap();
    out
}

fn read_index(path: &Path) -> ExportIndex {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[rstest]
fn ingest_skips_columns_that_cannot_be_encoded() {
    let dir = tempfile::tempdir().unwrap();
    let project = MdvProject::open(dir.path()).unwrap();
    let report = project
        .add_datasource("cells", cells(), AddDataSourceOptions::default())
        .unwrap();

    assert_eq!(report.added, vec!["cluster", "tags", "score", "barcode"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, "count");
    assert_eq!(report.skipped[0].1.kind(), ErrorKind::Encoding);

    let ds = project.get_datasource_metadata("cells").unwrap();
    assert_eq!(ds.size, 4);
    let fields: Vec<_> = ds.columns.iter().map(|c| c.field.as_str()).collect();
    assert_eq!(fields, vec!["cluster", "tags", "score", "barcode"]);
    assert_eq!(ds.column("score").unwrap().name, "Score");
    assert_eq!(ds.column("score").unwrap().min_max, Some([1.0, 4.0]));
}

#[rstest]
fn ingest_rejects_ragged_columns() {
    let dir = tempfile::tempdir().unwrap();
    let project = MdvProject::open(dir.path()).unwrap();
    let report = project
        .add_datasource(
            "t",
            vec![
                ColumnInput::new("a", datums([1i64, 2])),
                ColumnInput::new("b", datums([1i64])),
                ColumnInput::new("a", datums([3i64, 4])),
            ],
            AddDataSourceOptions::default(),
        )
        .unwrap();
    assert_eq!(report.added, vec!["a"]);
    let kinds: Vec<_> = report.skipped.iter().map(|(f, e)| (f.as_str(), e.kind())).collect();
    assert_eq!(kinds, vec![("b", ErrorKind::Encoding), ("a", ErrorKind::Schema)]);
    assert_eq!(
        project.get_column_metadata("t", "a").unwrap().datatype,
        Some(Datatype::Integer)
    );
}

#[rstest]
fn existing_datasource_needs_replace(fixture: Fixture) {
    let err = fixture
        .project
        .add_datasource("genes", Vec::new(), AddDataSourceOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);

    let options = AddDataSourceOptions {
        replace_data: true,
        size: Some(2),
    };
    fixture
        .project
        .add_datasource("genes", vec![ColumnInput::new("name", datums(["p", "q"]))], options)
        .unwrap();
    let genes = fixture.project.get_datasource_metadata("genes").unwrap();
    assert_eq!(genes.size, 2);
    assert_eq!(
        fixture.project.get_column("genes", "name").unwrap(),
        DecodedColumn::Strings(vec!["p".into(), "q".into()])
    );
}

#[rstest]
fn columns_decode_to_logical_values(fixture: Fixture) {
    let project = &fixture.project;
    assert_eq!(
        project.get_column("cells", "cluster").unwrap(),
        DecodedColumn::Strings(vec!["a".into(), "b".into(), "a".into(), "ND".into()])
    );
    assert_eq!(
        project.get_column("cells", "tags").unwrap(),
        DecodedColumn::Strings(vec!["x,y".into(), "".into(), "y".into(), "z".into()])
    );
    let DecodedColumn::Float(score) = project.get_column("cells", "score").unwrap() else {
        unreachable!()
    };
    assert_eq!(score[1], 2.5);
    assert!(score[2].is_nan());
    assert_eq!(
        project.get_column("cells", "barcode").unwrap().to_strings()[3],
        "AACA"
    );

    let err = project.get_column("cells", "count").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

#[rstest]
fn datasource_table_decodes_every_column(fixture: Fixture) {
    let project = &fixture.project;
    let table = project.get_datasource_table("cells").unwrap();
    let fields: Vec<_> = table.iter().map(|(c, _)| c.field.as_str()).collect();
    assert_eq!(fields, ["cluster", "tags", "score", "barcode"]);
    for (column, decoded) in &table {
        assert_eq!(decoded.len(), 4);
        if column.datatype != Some(Datatype::Double) {
            assert_eq!(*decoded, project.get_column("cells", &column.field).unwrap());
        }
    }

    let err = project.get_datasource_table("proteins").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

#[rstest]
fn annotations_join_on_the_index_column(fixture: Fixture) {
    let project = &fixture.project;
    let annotations = vec![
        ColumnInput::new("barcode", datums(["AAAT", "AAAC", "AAAC", "TTTT"])),
        ColumnInput::new("celltype", datums([Some("T"), Some("B"), Some("X"), Some("Q")]))
            .with_name("Cell Type"),
        ColumnInput::new("batch", datums([1i64, 2, 3, 4])),
        ColumnInput::new("ragged", datums(["r"])),
    ];
    let report = project
        .add_annotations("cells", "barcode", annotations, "unknown")
        .unwrap();
    assert_eq!(report.added, ["celltype", "batch"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, "ragged");
    assert_eq!(report.skipped[0].1.kind(), ErrorKind::Encoding);

    let strings = |v: &[&str]| DecodedColumn::Strings(v.iter().map(|s| s.to_string()).collect());
    assert_eq!(
        project.get_column("cells", "celltype").unwrap(),
        strings(&["B", "unknown", "T", "unknown"])
    );
    assert_eq!(
        project.get_column("cells", "batch").unwrap(),
        strings(&["2", "unknown", "1", "unknown"])
    );
    let celltype = project.get_column_metadata("cells", "celltype").unwrap();
    assert_eq!(celltype.name, "Cell Type");
    assert_eq!(celltype.datatype, Some(Datatype::Text));

    let replaced = vec![
        ColumnInput::new("barcode", datums(["AACA"])),
        ColumnInput::new("celltype", datums(["NK"])),
    ];
    project
        .add_annotations("cells", "barcode", replaced, "none")
        .unwrap();
    assert_eq!(
        project.get_column("cells", "celltype").unwrap(),
        strings(&["none", "none", "none", "NK"])
    );
    let fields: Vec<_> = project
        .get_datasource_metadata("cells")
        .unwrap()
        .columns
        .into_iter()
        .map(|c| c.field)
        .collect();
    assert_eq!(fields, ["cluster", "tags", "score", "barcode", "celltype", "batch"]);
}

#[rstest]
fn annotations_need_the_index_column(fixture: Fixture) {
    let project = &fixture.project;
    let before = project.get_datasource_metadata("cells").unwrap();

    let without_keys = vec![ColumnInput::new("celltype", datums(["T"]))];
    let err = project
        .add_annotations("cells", "barcode", without_keys, "ND")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);

    let unknown_index = vec![
        ColumnInput::new("sample", datums(["s1"])),
        ColumnInput::new("celltype", datums(["T"])),
    ];
    let err = project
        .add_annotations("cells", "sample", unknown_index, "ND")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);

    assert_eq!(project.get_datasource_metadata("cells").unwrap(), before);
}

#[rstest]
fn column_bytes_are_the_stored_payload(fixture: Fixture) {
    let project = &fixture.project;
    let score = project.get_column_bytes("cells", "score").unwrap();
    assert_eq!(score.len(), 16);
    assert_eq!(from_le_bytes::<f32>(&score)[3], 4.0);

    let cluster = project.get_column_bytes("cells", "cluster").unwrap();
    assert_eq!(cluster.as_ref(), &[0, 1, 0, 2]);

    let barcode = project.get_column_bytes("cells", "barcode").unwrap();
    assert_eq!(barcode.as_ref(), b"AAACAAAGAAATAACA");

    assert_eq!(
        project.get_column_bytes("cells", "nope").unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        project.get_column_bytes("nope", "score").unwrap_err().kind(),
        ErrorKind::Schema
    );
}

#[rstest]
fn subgroup_rows_are_served_by_stub(fixture: Fixture) {
    let project = &fixture.project;

    let row = SparseRow::from_wire(&project.get_subgroup_row_bytes("cells", "gs", 0).unwrap()).unwrap();
    assert_eq!(row.indices, vec![0, 2]);
    assert_eq!(row.values, vec![10.0, 20.0]);
    let row = SparseRow::from_wire(&project.get_subgroup_row_bytes("cells", "gs", 1).unwrap()).unwrap();
    assert_eq!(row.indices, vec![1]);
    assert_eq!(row.values, vec![30.0]);
    let empty = project.get_subgroup_row_bytes("cells", "gs", 2).unwrap();
    assert_eq!(empty.as_ref(), &0u32.to_le_bytes());

    let dense = project.get_subgroup_row_bytes("cells", "ds", 2).unwrap();
    assert_eq!(from_le_bytes::<f32>(&dense), vec![8.0, 9.0, 10.0, 11.0]);

    for (stub, row) in [("gs", 3), ("ds", 3), ("missing", 0)] {
        let err = project.get_subgroup_row_bytes("cells", stub, row).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

#[rstest]
fn byte_data_concatenates_in_request_order(fixture: Fixture) {
    let project = &fixture.project;
    let requests = [
        ByteRequest::subgroup_row("gs", 1),
        ByteRequest::column("cluster"),
        ByteRequest::subgroup_row("gs", 0),
        ByteRequest::subgroup_row("ds", 0),
    ];
    let payload = project.get_byte_data("cells", &requests).unwrap();

    let mut expected = Vec::new();
    expected.extend_from_slice(&project.get_subgroup_row_bytes("cells", "gs", 1).unwrap());
    expected.extend_from_slice(&project.get_column_bytes("cells", "cluster").unwrap());
    expected.extend_from_slice(&project.get_subgroup_row_bytes("cells", "gs", 0).unwrap());
    expected.extend_from_slice(&project.get_subgroup_row_bytes("cells", "ds", 0).unwrap());
    assert_eq!(payload.as_ref(), expected.as_slice());

    let err = project
        .get_byte_data("cells", &[ByteRequest::column("cluster"), ByteRequest::column("x")])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[rstest]
fn export_index_is_contiguous_and_ordered(fixture: Fixture) {
    let out = fixture.dir.path().join("static");
    let paths = fixture.project.export_datasource("cells", &out).unwrap();
    assert_eq!(paths.blob, out.join("cells.gz"));
    assert_eq!(paths.index, out.join("cells.json"));

    let blob = fs::read(&paths.blob).unwrap();
    let index = read_index(&paths.index);
    assert_eq!(
        index.keys().collect::<Vec<_>>(),
        vec!["cluster", "tags", "score", "barcode", "gs0", "gs1", "gs2", "ds0", "ds1", "ds2"]
    );

    let mut next = 0;
    for (_, range) in index.iter() {
        assert_eq!(range.start, next);
        assert!(range.end_inclusive >= range.start);
        next = range.end_inclusive + 1;
    }
    assert_eq!(next, blob.len() as u64);
    assert_eq!(index.blob_len(), blob.len() as u64);

    for (key, range) in index.iter() {
        let segment = inflate(&blob[range.as_range().unwrap()]);
        let expected = match key.split_at(2) {
            ("gs" | "ds", row) if row.parse::<usize>().is_ok() => fixture
                .project
                .get_subgroup_row_bytes("cells", &key[..2], row.parse().unwrap())
                .unwrap(),
            _ => fixture.project.get_column_bytes("cells", key).unwrap(),
        };
        assert_eq!(segment, expected.as_ref(), "segment {key}");
    }
}

#[rstest]
fn concurrent_exports_share_an_output_directory(fixture: Fixture) {
    let dir = fixture.project.dir().to_path_buf();
    let out = fixture.dir.path().join("static");
    for _ in 0..10 {
        let results: Vec<MdvResult<_>> = std::thread::scope(|scope| {
            let exports: Vec<_> = (0..2)
                .map(|_| {
                    scope.spawn(|| {
                        MdvProject::open(&dir)
                            .and_then(|project| project.export_datasource("cells", &out))
                    })
                })
                .collect();
            exports.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for result in results {
            result.unwrap();
        }
        let blob = fs::read(out.join("cells.gz")).unwrap();
        assert_eq!(read_index(&out.join("cells.json")).blob_len(), blob.len() as u64);
    }

    let mut names: Vec<_> = fs::read_dir(&out)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["cells.gz", "cells.json"]);
}

#[test]
fn dense_vectors_of_an_empty_data_source() {
    let dir = tempfile::tempdir().unwrap();
    let project = MdvProject::open(dir.path()).unwrap();
    project
        .add_datasource(
            "a",
            Vec::new(),
            AddDataSourceOptions {
                size: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
    project
        .add_datasource(
            "b",
            vec![ColumnInput::new("name", datums(["n1", "n2"]))],
            AddDataSourceOptions::default(),
        )
        .unwrap();
    project.add_rows_as_columns_link("a", "b", "name", "B").unwrap();
    let empty = DenseMatrix::from_row_major(2, 0, Vec::new()).unwrap();
    project
        .add_rows_as_columns_subgroup("a", "b", "d", &SubgroupData::Dense(empty), None, None)
        .unwrap();

    assert!(project.get_subgroup_row_bytes("a", "d", 1).unwrap().is_empty());
    let paths = project.export_datasource("a", dir.path().join("static")).unwrap();
    let index = read_index(&paths.index);
    assert_eq!(index.keys().collect::<Vec<_>>(), vec!["d0", "d1"]);
    let blob = fs::read(&paths.blob).unwrap();
    assert!(inflate(&blob[index.get("d1").unwrap().as_range().unwrap()]).is_empty());
}

#[rstest]
fn export_is_repeatable(fixture: Fixture) {
    let first = fixture.dir.path().join("a");
    let second = fixture.dir.path().join("b");
    let a = fixture.project.export_all(&first).unwrap();
    let b = fixture.project.export_all(&second).unwrap();
    assert_eq!(a.len(), 2);
    assert_eq!(b.len(), 2);
    for name in ["cells.json", "genes.json", "cells.gz", "genes.gz"] {
        assert_eq!(
            fs::read(first.join(name)).unwrap(),
            fs::read(second.join(name)).unwrap(),
            "{name}"
        );
    }
    let genes = read_index(&first.join("genes.json"));
    assert_eq!(genes.keys().collect::<Vec<_>>(), vec!["name"]);
}

#[rstest]
fn export_aborts_on_missing_array(fixture: Fixture) {
    let mut ds = fixture.project.get_datasource_metadata("cells").unwrap();
    ds.columns
        .push(ColumnDescriptor::new("ghost").with_datatype(Datatype::Double));
    fixture.project.set_datasource_metadata(ds).unwrap();

    let out = fixture.dir.path().join("static");
    let err = fixture.project.export_datasource("cells", &out).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
}

#[rstest]
fn compression_level_is_configurable(fixture: Fixture) {
    let stored = MdvProject::open_with_options(
        fixture.project.dir(),
        ProjectOptions::default().with_compression_level(0),
    )
    .unwrap();
    let out = fixture.dir.path().join("stored");
    let paths = stored.export_datasource("cells", &out).unwrap();
    let index = read_index(&paths.index);
    let blob = fs::read(&paths.blob).unwrap();
    let range = index.get("barcode").unwrap();
    assert_eq!(inflate(&blob[range.as_range().unwrap()]), b"AAACAAAGAAATAACA");
    assert!(range.compressed_len() > 16);
}

#[rstest]
fn set_column_replaces_and_restates(fixture: Fixture) {
    let project = &fixture.project;
    let updated = project
        .set_column(
            "cells",
            ColumnDescriptor::new("score").with_datatype(Datatype::Integer),
            &datums([5i64, 6, 7, 8]),
        )
        .unwrap();
    assert_eq!(updated.min_max, Some([5.0, 8.0]));
    assert_eq!(updated.name, "score");
    let ds = project.get_datasource_metadata("cells").unwrap();
    assert_eq!(ds.columns.len(), 4);
    assert_eq!(ds.column("score").unwrap(), &updated);

    let err = project
        .set_column("cells", ColumnDescriptor::new("short"), &datums([1i64]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);
    assert!(project.get_datasource_metadata("cells").unwrap().column("short").is_none());
}

#[rstest]
fn raw_data_is_validated(fixture: Fixture) {
    let project = &fixture.project;
    let mut column = ColumnDescriptor::new("state").with_datatype(Datatype::Text);
    column.values = Some(vec!["on".into(), "off".into()]);

    project
        .set_column_with_raw_data("cells", column.clone(), &TypedArray::U8(vec![0, 1, 1, 0]))
        .unwrap();
    assert_eq!(
        project.get_column("cells", "state").unwrap().to_strings(),
        vec!["on", "off", "off", "on"]
    );

    let err = project
        .set_column_with_raw_data("cells", column.clone(), &TypedArray::U8(vec![0, 1, 2, 0]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    let err = project
        .set_column_with_raw_data("cells", column, &TypedArray::F32(vec![0.0; 4]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

#[rstest]
fn remove_column_tolerates_missing(fixture: Fixture) {
    let project = &fixture.project;
    assert!(project.remove_column("cells", "tags").unwrap());
    assert!(!project.remove_column("cells", "tags").unwrap());
    assert!(project.get_column_metadata("cells", "tags").is_err());
    assert_eq!(
        project.get_column_bytes("cells", "tags").unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[rstest]
fn column_metadata_keys(fixture: Fixture) {
    let project = &fixture.project;
    project
        .set_column_metadata("cells", "cluster", "colors", json!(["#f00", "#0f0", "#00f"]))
        .unwrap();
    project
        .set_column_metadata("cells", "cluster", "name", json!("Cluster"))
        .unwrap();
    let column = project.get_column_metadata("cells", "cluster").unwrap();
    assert_eq!(column.name, "Cluster");
    assert_eq!(column.extra["colors"], json!(["#f00", "#0f0", "#00f"]));
    assert_eq!(column.values.as_ref().map(Vec::len), Some(3));

    assert!(project.set_column_metadata("cells", "cluster", "field", json!("x")).is_err());
    assert!(project.set_column_metadata("cells", "cluster", "name", json!(3)).is_err());
    assert_eq!(
        project
            .set_column_metadata("cells", "nope", "name", json!("x"))
            .unwrap_err()
            .kind(),
        ErrorKind::Schema
    );
}

#[rstest]
fn links_are_filtered_by_kind(fixture: Fixture) {
    let project = &fixture.project;
    project
        .insert_link("cells", "genes", "interactions", json!({"pivot_column": "cluster"}))
        .unwrap();

    let links = project.get_links("cells", Some("rows_as_columns")).unwrap();
    assert_eq!(links.len(), 1);
    let (to, link) = &links[0];
    assert_eq!(to, "genes");
    let rows_as_columns = link.rows_as_columns.as_ref().unwrap();
    assert_eq!(rows_as_columns.name, "Gene Scores");
    assert_eq!(rows_as_columns.subgroups["gs"].label, "Sparse Scores");
    assert_eq!(rows_as_columns.subgroups["ds"].name, "dense_scores");
    assert_eq!(rows_as_columns.subgroups["ds"].kind, SubgroupKind::Dense);

    assert_eq!(project.get_links("cells", Some("interactions")).unwrap().len(), 1);
    assert!(project.get_links("cells", Some("other")).unwrap().is_empty());
    assert!(project.get_links("genes", None).unwrap().is_empty());

    assert!(project.insert_link("cells", "nowhere", "x", json!({})).is_err());
}

#[rstest]
fn link_and_subgroup_preconditions(fixture: Fixture) {
    let project = &fixture.project;
    let err = project
        .add_rows_as_columns_link("cells", "genes", "symbol", "Genes")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);

    // vectors must be as long as cells has rows
    let short = DenseMatrix::from_row_major(3, 2, vec![0.0; 6]).unwrap();
    let err = project
        .add_rows_as_columns_subgroup("cells", "genes", "bad", &SubgroupData::Dense(short), None, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);
    let ds = project.get_datasource_metadata("cells").unwrap();
    assert!(ds.subgroup("bad").is_none());

    let any = DenseMatrix::from_row_major(4, 3, vec![0.0; 12]).unwrap();
    let err = project
        .add_rows_as_columns_subgroup("genes", "cells", "x", &SubgroupData::Dense(any), None, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

#[rstest]
fn subgroups_never_share_storage(fixture: Fixture) {
    let project = &fixture.project;
    let empty = SparseRows::try_new(Vec::new(), Vec::new(), vec![0, 0, 0, 0]).unwrap();

    let err = project
        .add_rows_as_columns_subgroup(
            "cells",
            "genes",
            "zz",
            &SubgroupData::Sparse(empty.clone()),
            Some("gs"),
            None,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    let row = SparseRow::from_wire(&project.get_subgroup_row_bytes("cells", "gs", 0).unwrap()).unwrap();
    assert_eq!(row.indices, vec![0, 2]);
    assert_eq!(row.values, vec![10.0, 20.0]);
    assert!(project.get_datasource_metadata("cells").unwrap().subgroup("zz").is_none());

    project
        .add_datasource(
            "proteins",
            vec![ColumnInput::new("id", datums(["p1", "p2", "p3"]))],
            AddDataSourceOptions::default(),
        )
        .unwrap();
    project
        .add_rows_as_columns_link("cells", "proteins", "id", "Protein Scores")
        .unwrap();
    let err = project
        .add_rows_as_columns_subgroup(
            "cells",
            "proteins",
            "gs",
            &SubgroupData::Sparse(empty.clone()),
            Some("protein_scores"),
            None,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);

    // restating a stub under a new name moves its arrays
    project
        .add_rows_as_columns_subgroup(
            "cells",
            "genes",
            "gs",
            &SubgroupData::Sparse(empty),
            Some("gs_v2"),
            None,
        )
        .unwrap();
    let group = project.dir().join("datafile").join("cells");
    assert!(!group.join("gs").exists());
    assert!(group.join("gs_v2").is_dir());
    assert_eq!(
        project.get_subgroup_row_bytes("cells", "gs", 0).unwrap().as_ref(),
        &0u32.to_le_bytes()
    );
}

#[rstest]
fn delete_datasource_removes_everything(fixture: Fixture) {
    let project = &fixture.project;
    project.delete_datasource("genes").unwrap();
    assert_eq!(
        project
            .datasources()
            .unwrap()
            .into_iter()
            .map(|ds| ds.name)
            .collect::<Vec<_>>(),
        vec!["cells"]
    );
    assert!(!project.dir().join("datafile").join("genes").exists());
    assert_eq!(
        project.delete_datasource("genes").unwrap_err().kind(),
        ErrorKind::Schema
    );
}

#[rstest]
fn reopened_project_sees_the_same_state(fixture: Fixture) {
    let before = fixture.project.datasources().unwrap();
    let reopened = MdvProject::open(fixture.project.dir()).unwrap();
    assert_eq!(reopened.datasources().unwrap(), before);
    assert!(fixture.project.dir().join("lock").exists());
    assert!(fixture.project.dir().join("datasources.json").exists());
}

#[derive(Default)]
struct MemoryStore(Mutex<Vec<DataSourceDescriptor>>);

impl MetadataStore for MemoryStore {
    fn list_datasources(&self) -> MdvResult<Vec<DataSourceDescriptor>> {
        Ok(self.0.lock().unwrap().clone())
    }

    fn set_datasource(&self, descriptor: DataSourceDescriptor) -> MdvResult<()> {
        let mut all = self.0.lock().unwrap();
        all.retain(|ds| ds.name != descriptor.name);
        all.push(descriptor);
        Ok(())
    }

    fn remove_datasource(&self, name: &str) -> MdvResult<bool> {
        let mut all = self.0.lock().unwrap();
        let before = all.len();
        all.retain(|ds| ds.name != name);
        Ok(all.len() != before)
    }
}

#[test]
fn custom_metadata_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::default());
    let project = MdvProject::open_with_store(
        dir.path(),
        ProjectOptions::default().with_container_dir("arrays"),
        store.clone(),
    )
    .unwrap();
    project
        .add_datasource(
            "t",
            vec![ColumnInput::new("v", datums([1.5f64, 2.5]))],
            AddDataSourceOptions::default(),
        )
        .unwrap();

    assert_eq!(store.list_datasources().unwrap().len(), 1);
    assert!(!dir.path().join("datasources.json").exists());
    assert!(dir.path().join("arrays").join("t").is_dir());
    assert_eq!(
        project.get_column("t", "v").unwrap(),
        DecodedColumn::Float(vec![1.5, 2.5])
    );
}
