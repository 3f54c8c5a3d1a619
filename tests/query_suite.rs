use std::io::Write;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use sqlite_probe::analyzer::btree::{find_rowid, index_lookup, index_range, scan};
use sqlite_probe::error::ProbeError;
use sqlite_probe::model::Record;
use sqlite_probe::parser::varint::encode_varint;
use sqlite_probe::query::run_suite;
use sqlite_probe::{Database, QueryConfig};

const PS: usize = 4096;

// ---------------------------------------------------------------------------
// Synthetic database files, built byte-by-byte to the on-disk format.
// ---------------------------------------------------------------------------

fn file_header(ps: usize, page_count: u32) -> Vec<u8> {
    let mut header = vec![0u8; 100];
    header[..16].copy_from_slice(b"SQLite format 3\0");
    let raw: u16 = if ps == 65536 { 1 } else { ps as u16 };
    header[16..18].copy_from_slice(&raw.to_be_bytes());
    header[28..32].copy_from_slice(&page_count.to_be_bytes());
    header
}

/// Lay out one B-tree page: header, cell pointer array, and the cells
/// packed against the end of the page in pointer order.
fn build_page(
    ps: usize,
    flag: u8,
    right_most: Option<u32>,
    cells: &[Vec<u8>],
    prefix: Option<Vec<u8>>,
) -> Vec<u8> {
    let mut page = vec![0u8; ps];
    let base = prefix.as_ref().map_or(0, |p| p.len());
    if let Some(prefix) = prefix {
        page[..base].copy_from_slice(&prefix);
    }

    page[base] = flag;
    page[base + 3..base + 5].copy_from_slice(&(cells.len() as u16).to_be_bytes());

    let mut content_end = ps;
    let mut pointers = Vec::new();
    for cell in cells {
        content_end -= cell.len();
        page[content_end..content_end + cell.len()].copy_from_slice(cell);
        pointers.push(content_end as u16);
    }
    page[base + 5..base + 7].copy_from_slice(&(content_end as u16).to_be_bytes());

    let header_size = if right_most.is_some() { 12 } else { 8 };
    if let Some(right) = right_most {
        page[base + 8..base + 12].copy_from_slice(&right.to_be_bytes());
    }

    let array = base + header_size;
    for (i, pointer) in pointers.iter().enumerate() {
        page[array + 2 * i..array + 2 * i + 2].copy_from_slice(&pointer.to_be_bytes());
    }
    page
}

enum Col<'a> {
    Int(i64),
    Text(&'a str),
}

fn record_payload(cols: &[Col]) -> Vec<u8> {
    let mut serials = Vec::new();
    let mut body = Vec::new();
    for col in cols {
        match col {
            Col::Int(v) => {
                serials.extend(encode_varint(6));
                body.extend(v.to_be_bytes());
            }
            Col::Text(s) => {
                serials.extend(encode_varint(13 + 2 * s.len() as u64));
                body.extend(s.as_bytes());
            }
        }
    }
    let header_size = serials.len() as u64 + 1;
    assert!(header_size <= 127, "test records keep a one-byte header size");

    let mut payload = encode_varint(header_size);
    payload.extend(serials);
    payload.extend(body);
    payload
}

fn table_leaf_cell(rowid: i64, payload: &[u8]) -> Vec<u8> {
    let mut cell = encode_varint(payload.len() as u64);
    cell.extend(encode_varint(rowid as u64));
    cell.extend_from_slice(payload);
    cell
}

fn table_interior_cell(child: u32, rowid: i64) -> Vec<u8> {
    let mut cell = child.to_be_bytes().to_vec();
    cell.extend(encode_varint(rowid as u64));
    cell
}

fn index_leaf_cell(payload: &[u8]) -> Vec<u8> {
    let mut cell = encode_varint(payload.len() as u64);
    cell.extend_from_slice(payload);
    cell
}

fn index_interior_cell(child: u32, payload: &[u8]) -> Vec<u8> {
    let mut cell = child.to_be_bytes().to_vec();
    cell.extend(encode_varint(payload.len() as u64));
    cell.extend_from_slice(payload);
    cell
}

fn schema_record(kind: &str, name: &str, root_page: i64) -> Vec<u8> {
    record_payload(&[
        Col::Text(kind),
        Col::Text(name),
        Col::Text("Employee"),
        Col::Int(root_page),
        Col::Text("CREATE TABLE Employee(...)"),
    ])
}

/// (prefix, first, middle, last) for the five test employees, ids 101-105.
const EMPLOYEES: [(i64, &str, &str, &str, &str); 5] = [
    (101, "Mr", "Adam", "B", "Rowe"),
    (102, "Ms", "Beth", "C", "Stone"),
    (103, "Dr", "Carl", "D", "Young"),
    (104, "Mr", "Dina", "E", "Rowe"),
    (105, "Ms", "Evan", "F", "Price"),
];

fn employee_payload(id: i64) -> Vec<u8> {
    let (_, prefix, first, middle, last) = EMPLOYEES
        .iter()
        .copied()
        .find(|e| e.0 == id)
        .expect("known employee id");
    record_payload(&[
        Col::Int(id),
        Col::Text(prefix),
        Col::Text(first),
        Col::Text(middle),
        Col::Text(last),
    ])
}

fn key_rowid_payload(key: i64, rowid: i64) -> Vec<u8> {
    record_payload(&[Col::Int(key), Col::Int(rowid)])
}

fn write_db(dir: &TempDir, name: &str, pages: Vec<Vec<u8>>) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("create db file");
    for page in pages {
        file.write_all(&page).expect("write page");
    }
    path
}

/// A two-level table B-tree: interior root on page 2 over leaves 3 and 4,
/// rowids 1-5 holding employees 101-105.
fn table_pages(ps: usize) -> Vec<Vec<u8>> {
    let leaf3 = build_page(
        ps,
        0x0d,
        None,
        &[
            table_leaf_cell(1, &employee_payload(101)),
            table_leaf_cell(2, &employee_payload(102)),
        ],
        None,
    );
    let leaf4 = build_page(
        ps,
        0x0d,
        None,
        &[
            table_leaf_cell(3, &employee_payload(103)),
            table_leaf_cell(4, &employee_payload(104)),
            table_leaf_cell(5, &employee_payload(105)),
        ],
        None,
    );
    let interior = build_page(ps, 0x05, Some(4), &[table_interior_cell(3, 2)], None);
    vec![interior, leaf3, leaf4]
}

fn no_index_db(dir: &TempDir, name: &str, ps: usize) -> PathBuf {
    let schema = build_page(
        ps,
        0x0d,
        None,
        &[table_leaf_cell(1, &schema_record("table", "Employee", 2))],
        Some(file_header(ps, 4)),
    );
    let mut pages = vec![schema];
    pages.extend(table_pages(ps));
    write_db(dir, name, pages)
}

/// The non-clustered layout adds an index B-tree on pages 5-7: interior
/// root holding the entry (103, 3) over leaves with (101, 1)-(102, 2) and
/// (104, 4)-(105, 5).
fn unclustered_db(dir: &TempDir, name: &str, ps: usize) -> PathBuf {
    let schema = build_page(
        ps,
        0x0d,
        None,
        &[
            table_leaf_cell(1, &schema_record("table", "Employee", 2)),
            table_leaf_cell(2, &schema_record("index", "sqlite_autoindex_Employee_1", 5)),
        ],
        Some(file_header(ps, 7)),
    );
    let mut pages = vec![schema];
    pages.extend(table_pages(ps));

    let index_leaf6 = build_page(
        ps,
        0x0a,
        None,
        &[
            index_leaf_cell(&key_rowid_payload(101, 1)),
            index_leaf_cell(&key_rowid_payload(102, 2)),
        ],
        None,
    );
    let index_leaf7 = build_page(
        ps,
        0x0a,
        None,
        &[
            index_leaf_cell(&key_rowid_payload(104, 4)),
            index_leaf_cell(&key_rowid_payload(105, 5)),
        ],
        None,
    );
    let index_interior = build_page(
        ps,
        0x02,
        Some(7),
        &[index_interior_cell(6, &key_rowid_payload(103, 3))],
        None,
    );
    pages.push(index_interior);
    pages.push(index_leaf6);
    pages.push(index_leaf7);
    write_db(dir, name, pages)
}

/// WITHOUT ROWID: the Employee root itself is an index B-tree whose
/// records are the full rows keyed by the primary key.
fn clustered_db(dir: &TempDir, name: &str, ps: usize) -> PathBuf {
    let schema = build_page(
        ps,
        0x0d,
        None,
        &[table_leaf_cell(1, &schema_record("table", "Employee", 2))],
        Some(file_header(ps, 4)),
    );
    let leaf3 = build_page(
        ps,
        0x0a,
        None,
        &[
            index_leaf_cell(&employee_payload(101)),
            index_leaf_cell(&employee_payload(102)),
        ],
        None,
    );
    let leaf4 = build_page(
        ps,
        0x0a,
        None,
        &[
            index_leaf_cell(&employee_payload(104)),
            index_leaf_cell(&employee_payload(105)),
        ],
        None,
    );
    let interior = build_page(
        ps,
        0x02,
        Some(4),
        &[index_interior_cell(3, &employee_payload(103))],
        None,
    );
    write_db(dir, name, vec![schema, interior, leaf3, leaf4])
}

fn collect_ids(db: &Database, root: u32) -> Vec<i64> {
    let mut ids = Vec::new();
    scan(db, root, &mut |record: &Record| -> Option<()> {
        ids.push(record.integer(0).expect("integer id column"));
        None
    })
    .expect("scan succeeds");
    ids
}

// ---------------------------------------------------------------------------
// End-to-end behavior
// ---------------------------------------------------------------------------

#[test]
fn opens_and_reads_header() {
    let dir = TempDir::new().unwrap();
    let path = no_index_db(&dir, "a.db", PS);

    let db = Database::open(&path).unwrap();
    assert_eq!(db.header().page_size, PS as u32);
    assert_eq!(db.page_count(), 4);
}

#[test]
fn catalog_maps_names_to_root_pages() {
    let dir = TempDir::new().unwrap();
    let path = unclustered_db(&dir, "c.db", PS);

    let db = Database::open(&path).unwrap();
    let catalog = db.catalog().unwrap();
    assert_eq!(catalog.root_page("Employee").unwrap(), 2);
    assert_eq!(catalog.root_page("sqlite_autoindex_Employee_1").unwrap(), 5);
    assert!(matches!(
        catalog.root_page("Missing"),
        Err(ProbeError::RootNotFound(_))
    ));
    assert_eq!(db.telemetry().header_reads(), 1);
}

#[test]
fn scan_visits_every_record_in_rowid_order() {
    let dir = TempDir::new().unwrap();
    let path = no_index_db(&dir, "a.db", PS);

    let db = Database::open(&path).unwrap();
    let root = db.catalog().unwrap().root_page("Employee").unwrap();
    assert_eq!(collect_ids(&db, root), vec![101, 102, 103, 104, 105]);

    // interior root plus both leaves
    assert_eq!(db.telemetry().data_page_reads(), 3);
    assert_eq!(db.telemetry().header_reads(), 1);
}

#[test]
fn scan_terminates_on_the_first_match() {
    let dir = TempDir::new().unwrap();
    let path = no_index_db(&dir, "a.db", PS);

    let db = Database::open(&path).unwrap();
    let root = db.catalog().unwrap().root_page("Employee").unwrap();
    let hit = scan(&db, root, &mut |record: &Record| {
        (record.integer(0) == Some(102)).then(|| record.text(2).unwrap().to_string())
    })
    .unwrap();

    assert_eq!(hit.as_deref(), Some("Beth"));
    // root interior and the first leaf only
    assert_eq!(db.telemetry().data_page_reads(), 2);
}

#[test]
fn find_rowid_descends_once_per_level() {
    let dir = TempDir::new().unwrap();
    let path = no_index_db(&dir, "a.db", PS);

    let db = Database::open(&path).unwrap();
    let root = db.catalog().unwrap().root_page("Employee").unwrap();

    let record = find_rowid(&db, root, 4).unwrap().expect("rowid 4 exists");
    assert_eq!(record.integer(0), Some(104));
    assert_eq!(record.text(4), Some("Rowe"));
    // interior root and one leaf; the header read came from the catalog
    assert_eq!(db.telemetry().data_page_reads(), 2);

    assert!(find_rowid(&db, root, 99).unwrap().is_none());
}

#[test]
fn index_lookup_returns_the_rowid() {
    let dir = TempDir::new().unwrap();
    let path = unclustered_db(&dir, "c.db", PS);

    let db = Database::open(&path).unwrap();
    let index_root = db
        .catalog()
        .unwrap()
        .root_page("sqlite_autoindex_Employee_1")
        .unwrap();

    let rowid = index_lookup(&db, index_root, 101, &mut |record: &Record| {
        record.integer(1)
    })
    .unwrap();
    assert_eq!(rowid, Some(1));
    assert_eq!(db.telemetry().index_internal_reads(), 1);
    assert_eq!(db.telemetry().index_leaf_reads(), 1);

    // the separator entry in the interior page is itself a hit
    db.telemetry().reset_all();
    let rowid = index_lookup(&db, index_root, 103, &mut |record: &Record| {
        record.integer(1)
    })
    .unwrap();
    assert_eq!(rowid, Some(3));
    assert_eq!(db.telemetry().index_internal_reads(), 1);
    assert_eq!(db.telemetry().index_leaf_reads(), 0);

    let rowid = index_lookup(&db, index_root, 999, &mut |record: &Record| {
        record.integer(1)
    })
    .unwrap();
    assert_eq!(rowid, None);
}

#[test]
fn index_range_matches_the_key_slice() {
    let dir = TempDir::new().unwrap();
    let path = unclustered_db(&dir, "c.db", PS);

    let db = Database::open(&path).unwrap();
    let index_root = db
        .catalog()
        .unwrap()
        .root_page("sqlite_autoindex_Employee_1")
        .unwrap();

    let (lo, hi) = (102, 104);
    let rowids = index_range(&db, index_root, lo, hi, &mut |record: &Record| {
        match record.integer(0) {
            Some(key) if lo <= key && key <= hi => record.integer(1).into_iter().collect(),
            _ => Vec::new(),
        }
    })
    .unwrap();

    let mut sorted = rowids.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![2, 3, 4]);
}

#[test]
fn clustered_lookups_touch_only_index_pages() {
    let dir = TempDir::new().unwrap();
    let path = clustered_db(&dir, "d.db", PS);

    let db = Database::open(&path).unwrap();
    let root = db.catalog().unwrap().root_page("Employee").unwrap();

    let name = index_lookup(&db, root, 103, &mut |record: &Record| {
        record.text(2).map(str::to_string)
    })
    .unwrap();
    assert_eq!(name.as_deref(), Some("Carl"));
    assert_eq!(db.telemetry().data_page_reads(), 0);
    assert!(db.telemetry().index_internal_reads() > 0);

    let ids = index_range(&db, root, 102, 104, &mut |record: &Record| {
        match record.integer(0) {
            Some(id) if (102..=104).contains(&id) => vec![id],
            _ => Vec::new(),
        }
    })
    .unwrap();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![102, 103, 104]);
}

#[test]
fn overflow_payload_reassembles_exactly() {
    let dir = TempDir::new().unwrap();

    // One record whose payload spills: P = 5000 at U = 4096 leaves 908
    // bytes local and 4092 on a single overflow page.
    let text: String = (0..4988u32)
        .map(|i| (b'a' + (i % 26) as u8) as char)
        .collect();
    let mut payload = record_payload(&[Col::Int(201), Col::Text(&text)]);
    assert_eq!(payload.len(), 5000);

    let overflow_tail = payload.split_off(908);
    assert_eq!(overflow_tail.len(), 4092);

    let mut cell = encode_varint(5000);
    cell.extend(encode_varint(1));
    cell.extend_from_slice(&payload);
    cell.extend_from_slice(&3u32.to_be_bytes());

    let schema = build_page(
        PS,
        0x0d,
        None,
        &[table_leaf_cell(1, &schema_record("table", "Employee", 2))],
        Some(file_header(PS, 3)),
    );
    let leaf = build_page(PS, 0x0d, None, &[cell], None);
    let mut overflow_page = vec![0u8; PS];
    overflow_page[4..].copy_from_slice(&overflow_tail);

    let path = write_db(&dir, "overflow.db", vec![schema, leaf, overflow_page]);

    let db = Database::open(&path).unwrap();
    let root = db.catalog().unwrap().root_page("Employee").unwrap();
    let record = find_rowid(&db, root, 1).unwrap().expect("record exists");

    assert_eq!(record.integer(0), Some(201));
    assert_eq!(record.text(1), Some(text.as_str()));
    // the leaf and its overflow page share the data bucket
    assert_eq!(db.telemetry().data_page_reads(), 2);
}

#[test]
fn cyclic_tree_is_rejected() {
    let dir = TempDir::new().unwrap();

    let schema = build_page(
        PS,
        0x0d,
        None,
        &[table_leaf_cell(1, &schema_record("table", "Employee", 2))],
        Some(file_header(PS, 2)),
    );
    // the interior page points back at itself
    let interior = build_page(PS, 0x05, Some(2), &[table_interior_cell(2, 10)], None);
    let path = write_db(&dir, "cyclic.db", vec![schema, interior]);

    let db = Database::open(&path).unwrap();
    let err = collect_scan_error(&db);
    assert!(matches!(err, ProbeError::PageCycle(2)));
}

fn collect_scan_error(db: &Database) -> ProbeError {
    let root = db.catalog().unwrap().root_page("Employee").unwrap();
    scan(db, root, &mut |_: &Record| None::<()>).unwrap_err()
}

#[test]
fn telemetry_is_identical_across_a_reset() {
    let dir = TempDir::new().unwrap();
    let path = unclustered_db(&dir, "c.db", PS);
    let db = Database::open(&path).unwrap();
    let root = db.catalog().unwrap().root_page("Employee").unwrap();

    db.telemetry().reset_all();
    let _ = collect_ids(&db, root);
    let first = db.telemetry().counters();

    db.telemetry().reset_all();
    let _ = collect_ids(&db, root);
    assert_eq!(db.telemetry().counters(), first);
}

#[test]
fn run_suite_reports_twelve_query_blocks() {
    let dir = TempDir::new().unwrap();
    let config = QueryConfig {
        no_index_4k: no_index_db(&dir, "a.db", PS),
        no_index_16k: no_index_db(&dir, "b.db", 16384),
        unclustered_4k: unclustered_db(&dir, "c.db", PS),
        clustered_4k: clustered_db(&dir, "d.db", PS),
        last_name: "Rowe".to_string(),
        emp_id: 103,
        emp_id_range: (102, 104),
        ..QueryConfig::default()
    };

    let mut out = Vec::new();
    run_suite(&config, &mut out).unwrap();
    let report = String::from_utf8(out).unwrap();

    let count_line = |line: &str| report.lines().filter(|l| *l == line).count();

    assert_eq!(report.matches("DB: ").count(), 12);
    assert_eq!(report.matches("Average page access time").count(), 12);
    assert_eq!(report.matches("Header page read counts: ").count(), 12);

    // 101 matches the four scan queries only; 104 additionally falls in
    // the range, so the same line shows up in the four range reports too
    assert_eq!(count_line("Emp ID: 101, Full Name: Adam B Rowe"), 4);
    assert_eq!(count_line("Emp ID: 104, Full Name: Dina E Rowe"), 8);
    // one equality line per database
    assert_eq!(count_line("Full Name: Carl D Young"), 4);
    // range results cover 102-104 on every layout
    assert_eq!(count_line("Emp ID: 103, Full Name: Carl D Young"), 4);
    assert_eq!(count_line("Emp ID: 102, Full Name: Beth C Stone"), 4);
}
