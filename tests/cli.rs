mod common;

use std::{fs, path::Path};

use assert_cmd::Command;
use common::{ExportRow, TestWorkspace, export_csv};
use nrc_tracker::{config::Config, data::Cell, schema::CanonicalRow};
use predicates::{prelude::*, str::contains};
use rust_xlsxwriter::Workbook;

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("nrc-tracker").expect("binary exists");
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn sample_rows() -> Vec<ExportRow> {
    vec![
        ExportRow::new("W1", "T1", "OPEN").description("Seat track corrosion"),
        ExportRow::new("W1", "T2", "CLOSED").hours(8.0, 10.0),
        ExportRow::new("W2", "T1", "DEFER"),
    ]
}

fn import(workspace: &TestWorkspace, rows: &[ExportRow]) {
    let input = workspace.write("export.csv", &export_csv(rows));
    bin()
        .args(["import", "-i"])
        .arg(&input)
        .arg("-s")
        .arg(workspace.store_dir())
        .assert()
        .success();
}

fn stored_rows(store: &Path) -> Vec<CanonicalRow> {
    let contents = fs::read_to_string(store.join("records.json")).expect("read records");
    serde_json::from_str(&contents).expect("parse records")
}

#[test]
fn import_reports_counts_and_writes_the_store() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("export.csv", &export_csv(&sample_rows()));
    bin()
        .args(["import", "-i"])
        .arg(&input)
        .arg("-s")
        .arg(workspace.store_dir())
        .assert()
        .success()
        .stdout(contains("Imported 3 row(s): 3 new, 0 updated"))
        .stdout(contains("Store now holds 3 record(s)"));

    let rows = stored_rows(&workspace.store_dir());
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].date, "01.01.2023");
    assert_eq!(rows[1].ratio, "125.00");
    assert!(workspace.store_dir().join("aux").join("import_meta.json").exists());
}

#[test]
fn reimport_keeps_annotations() {
    let workspace = TestWorkspace::new();
    import(&workspace, &sample_rows());
    bin()
        .args(["annotate", "-s"])
        .arg(workspace.store_dir())
        .args(["-k", "W1_T1", "--note", "parts ordered", "--department", "AVI,MEC"])
        .assert()
        .success();

    let mut changed = sample_rows();
    changed[0].status = "CLOSED".to_string();
    import(&workspace, &changed);

    let rows = stored_rows(&workspace.store_dir());
    let row = rows.iter().find(|row| row.work_order == "W1" && row.task_card == "T1").unwrap();
    assert_eq!(row.status, "CLOSED");
    assert_eq!(row.note, "parts ordered");
    assert_eq!(row.department, "AVI,MEC");
}

#[test]
fn view_filters_sorts_and_pages() {
    let workspace = TestWorkspace::new();
    import(&workspace, &sample_rows());
    bin()
        .args(["view", "-s"])
        .arg(workspace.store_dir())
        .args(["--facet", "status=OPEN,DEFER", "--sort", "work_order:desc"])
        .assert()
        .success()
        .stdout(contains("WO ▼"))
        .stdout(contains("Page 1 / 1 (2 record(s))"))
        .stdout(contains("Open: 1  Closed: 0  Deferred: 1"))
        .stdout(contains("Last import:"));

    bin()
        .args(["view", "-s"])
        .arg(workspace.store_dir())
        .args(["--page-size", "1", "--page", "2"])
        .assert()
        .success()
        .stdout(contains("Page 2 / 3 (3 record(s))"));
}

#[test]
fn view_reports_empty_results() {
    let workspace = TestWorkspace::new();
    import(&workspace, &sample_rows());
    bin()
        .args(["view", "-s"])
        .arg(workspace.store_dir())
        .args(["--search", "no such card"])
        .assert()
        .success()
        .stdout(contains("No records match the current filters."))
        .stdout(contains("Page 1 / 1 (0 record(s))"));
}

#[test]
fn view_exports_filtered_rows_as_csv() {
    let workspace = TestWorkspace::new();
    import(&workspace, &sample_rows());
    let output = workspace.path().join("open.csv");
    bin()
        .args(["view", "-s"])
        .arg(workspace.store_dir())
        .args(["--search", "seat", "-o"])
        .arg(&output)
        .assert()
        .success();

    let contents = fs::read_to_string(&output).expect("read output");
    let lines = contents.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Aircraft,Department,WO,Task Card"));
    assert!(lines[1].contains("Seat track corrosion"));
}

#[test]
fn map_sets_aircraft_and_facets_lists_them() {
    let workspace = TestWorkspace::new();
    import(&workspace, &sample_rows());
    bin()
        .args(["map", "-s"])
        .arg(workspace.store_dir())
        .args(["--set", "W1=TC-JAA", "--set", "W2=TC-JAB", "--list"])
        .assert()
        .success()
        .stdout(contains("W1\tTC-JAA"))
        .stdout(contains("W2\tTC-JAB"));

    bin()
        .args(["facets", "-s"])
        .arg(workspace.store_dir())
        .args(["-f", "aircraft"])
        .assert()
        .success()
        .stdout("TC-JAA\nTC-JAB\n");

    bin()
        .args(["facets", "-s"])
        .arg(workspace.store_dir())
        .args(["-f", "colour"])
        .assert()
        .failure()
        .stderr(contains("unknown facet 'colour'"));
}

#[test]
fn annotate_rejects_unknown_departments() {
    let workspace = TestWorkspace::new();
    import(&workspace, &sample_rows());
    bin()
        .args(["annotate", "-s"])
        .arg(workspace.store_dir())
        .args(["-k", "W1_T1", "--department", "Catering"])
        .assert()
        .failure()
        .stderr(contains("department 'Catering' is not in the configured list"));

    let rows = stored_rows(&workspace.store_dir());
    assert!(rows.iter().all(|row| row.department.is_empty()));
}

#[test]
fn import_rejects_narrow_files() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("narrow.csv", "WO,TC,Desc\nW1,T1,x\n");
    bin()
        .args(["import", "-i"])
        .arg(&input)
        .arg("-s")
        .arg(workspace.store_dir())
        .assert()
        .failure()
        .stderr(contains("schema mismatch"));
    assert!(!workspace.store_dir().join("records.json").exists());
}

#[test]
fn import_rejects_header_only_files() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("empty.csv", &export_csv(&[]));
    bin()
        .args(["import", "-i"])
        .arg(&input)
        .arg("-s")
        .arg(workspace.store_dir())
        .assert()
        .failure()
        .stderr(contains("invalid import format"));
}

fn write_workbook(path: &Path, rows: &[ExportRow]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let header = common::export_header();
    let body = rows.iter().map(ExportRow::to_cells);
    for (r, cells) in std::iter::once(header).chain(body).enumerate() {
        for (c, cell) in cells.iter().enumerate() {
            let (row, col) = (r as u32, c as u16);
            let written = match cell {
                Cell::Number(n) => sheet.write_number(row, col, *n).map(|_| ()),
                Cell::Text(text) => sheet.write_string(row, col, text).map(|_| ()),
                Cell::Empty => Ok(()),
            };
            written.expect("write cell");
        }
    }
    workbook.save(path).expect("save workbook");
}

#[test]
fn import_reads_xlsx_workbooks() {
    let workspace = TestWorkspace::new();
    let input = workspace.path().join("export.xlsx");
    write_workbook(&input, &sample_rows());
    bin()
        .args(["import", "-i"])
        .arg(&input)
        .arg("-s")
        .arg(workspace.store_dir())
        .assert()
        .success()
        .stdout(contains("Imported 3 row(s): 3 new"));

    let rows = stored_rows(&workspace.store_dir());
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].date, "01.01.2023");
    assert_eq!(rows[0].description, "Seat track corrosion");
    assert_eq!(rows[1].ratio, "125.00");

    bin()
        .args(["import", "-i"])
        .arg(&input)
        .arg("-s")
        .arg(workspace.store_dir())
        .assert()
        .success()
        .stdout(contains("0 new, 0 updated, 3 unchanged"));
}

#[test]
fn import_treats_decimal_serials_as_dates() {
    let workspace = TestWorkspace::new();
    let row = ExportRow::new("W1", "T1", "OPEN").date(Cell::Text("44927.0".into()));
    let input = workspace.write("serials.csv", &export_csv(&[row]));
    bin()
        .args(["import", "-i"])
        .arg(&input)
        .arg("-s")
        .arg(workspace.store_dir())
        .assert()
        .success();
    assert_eq!(stored_rows(&workspace.store_dir())[0].date, "01.01.2023");
}

#[test]
fn import_reads_semicolon_exports_from_stdin() {
    let workspace = TestWorkspace::new();
    let csv = export_csv(&sample_rows()).replace(',', ";");
    bin()
        .args(["import", "-i", "-", "--delimiter", ";", "-s"])
        .arg(workspace.store_dir())
        .write_stdin(csv)
        .assert()
        .success()
        .stdout(contains("3 new"));
}

#[test]
fn config_init_writes_loadable_defaults() {
    let workspace = TestWorkspace::new();
    let path = workspace.path().join("tracker.yaml");
    bin()
        .args(["config", "init"])
        .arg(&path)
        .assert()
        .success();

    let config = Config::load(&path).expect("load written config");
    assert_eq!(config, Config::default());

    let custom = workspace.write(
        "custom.yaml",
        "view:\n  page_size: 1\ndepartments: [Catering]\n",
    );
    import(&workspace, &sample_rows());
    bin()
        .args(["annotate", "-s"])
        .arg(workspace.store_dir())
        .arg("-c")
        .arg(&custom)
        .args(["-k", "W2_T1", "--department", "Catering"])
        .assert()
        .success();
    bin()
        .args(["view", "-s"])
        .arg(workspace.store_dir())
        .arg("-c")
        .arg(&custom)
        .assert()
        .success()
        .stdout(contains("Page 1 / 3").and(contains("Catering").not()));
}
