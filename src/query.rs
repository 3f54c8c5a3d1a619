use std::io::Write;
use std::path::Path;

use log::info;

use crate::analyzer::btree::{find_rowid, index_lookup, index_range, scan};
use crate::config::QueryConfig;
use crate::error::Result;
use crate::model::{Record, Value};
use crate::Database;

/// Name of the single table every database layout carries.
pub const EMPLOYEE_TABLE: &str = "Employee";

/// Conventional name of the auto-generated primary-key index.
pub fn auto_index_name(table: &str) -> String {
    format!("sqlite_autoindex_{table}_1")
}

/// How a database layout indexes the primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexLayout {
    /// No explicit index; every query scans the table B-tree
    None,
    /// Auxiliary index B-tree mapping key to rowid
    NonClustered,
    /// WITHOUT ROWID: the table root itself is an index B-tree
    Clustered,
}

/// The three query shapes of the suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    ScanLastName,
    PkEquality,
    PkRange,
}

struct Target<'a> {
    path: &'a Path,
    label: &'a str,
    layout: IndexLayout,
}

/// Run the full suite: three queries against each of the four layouts,
/// writing result lines and the telemetry report per query.
pub fn run_suite(config: &QueryConfig, out: &mut dyn Write) -> Result<()> {
    let targets = [
        Target {
            path: &config.no_index_4k,
            label: "no explicit index, 4 KiB pages",
            layout: IndexLayout::None,
        },
        Target {
            path: &config.no_index_16k,
            label: "no explicit index, 16 KiB pages",
            layout: IndexLayout::None,
        },
        Target {
            path: &config.unclustered_4k,
            label: "non-clustered primary-key index on \"Emp ID\", 4 KiB pages",
            layout: IndexLayout::NonClustered,
        },
        Target {
            path: &config.clustered_4k,
            label: "clustered primary key (WITHOUT ROWID), 4 KiB pages",
            layout: IndexLayout::Clustered,
        },
    ];
    let queries = [
        QueryKind::ScanLastName,
        QueryKind::PkEquality,
        QueryKind::PkRange,
    ];
    info!(
        "query suite: {} databases x {} queries",
        targets.len(),
        queries.len()
    );

    let mut first = true;
    for target in &targets {
        for &query in &queries {
            if !first {
                writeln!(out)?;
            }
            first = false;
            run_query(target, query, config, out)?;
        }
    }
    Ok(())
}

fn run_query(
    target: &Target,
    query: QueryKind,
    config: &QueryConfig,
    out: &mut dyn Write,
) -> Result<()> {
    writeln!(out, "DB: {}", target.label)?;
    writeln!(out, "Query: {}", describe(query, config))?;

    let db = Database::open(target.path)?;
    let outcome = execute(&db, target.layout, query, config);

    // telemetry gathered before a failure still gets reported
    let lines = match outcome {
        Ok(lines) => lines,
        Err(err) => {
            db.telemetry().write_report(out)?;
            return Err(err);
        }
    };
    for line in &lines {
        writeln!(out, "{line}")?;
    }
    db.telemetry().write_report(out)?;
    db.telemetry().reset_all();
    Ok(())
}

fn describe(query: QueryKind, config: &QueryConfig) -> String {
    match query {
        QueryKind::ScanLastName => format!(
            "employee id and full name of every employee whose last name is {:?} (scan)",
            config.last_name
        ),
        QueryKind::PkEquality => format!(
            "full name of employee #{} (equality search)",
            config.emp_id
        ),
        QueryKind::PkRange => {
            let (lo, hi) = config.emp_id_range;
            format!(
                "employee id and full name of employees with \"Emp ID\" between #{lo} and #{hi} (range search)"
            )
        }
    }
}

/// Route one query to the traversal its layout calls for and collect the
/// output lines.
fn execute(
    db: &Database,
    layout: IndexLayout,
    query: QueryKind,
    config: &QueryConfig,
) -> Result<Vec<String>> {
    match (query, layout) {
        (QueryKind::ScanLastName, _) => scan_last_name(db, config),
        (QueryKind::PkEquality, IndexLayout::None) => equality_by_scan(db, config),
        (QueryKind::PkEquality, IndexLayout::NonClustered) => equality_via_index(db, config),
        (QueryKind::PkEquality, IndexLayout::Clustered) => equality_clustered(db, config),
        (QueryKind::PkRange, IndexLayout::None) => range_by_scan(db, config),
        (QueryKind::PkRange, IndexLayout::NonClustered) => range_via_index(db, config),
        (QueryKind::PkRange, IndexLayout::Clustered) => range_clustered(db, config),
    }
}

/// Scan queries run against the table B-tree on every layout; the
/// predicate collects matches and never terminates the traversal.
fn scan_last_name(db: &Database, config: &QueryConfig) -> Result<Vec<String>> {
    let root = db.catalog()?.root_page(EMPLOYEE_TABLE)?;
    let mut lines = Vec::new();
    scan(db, root, &mut |record: &Record| -> Option<()> {
        if record.text(config.last_name_col) == Some(config.last_name.as_str()) {
            lines.push(id_and_full_name(record, config));
        }
        None
    })?;
    Ok(lines)
}

fn equality_by_scan(db: &Database, config: &QueryConfig) -> Result<Vec<String>> {
    let root = db.catalog()?.root_page(EMPLOYEE_TABLE)?;
    let found = scan(db, root, &mut |record: &Record| {
        (record.integer(config.emp_id_col) == Some(config.emp_id))
            .then(|| full_name(record, config))
    })?;
    Ok(found.into_iter().collect())
}

/// Non-clustered equality: the index record is (key, rowid); the index
/// lookup yields the rowid and the table B-tree yields the row.
fn equality_via_index(db: &Database, config: &QueryConfig) -> Result<Vec<String>> {
    let catalog = db.catalog()?;
    let index_root = catalog.root_page(&auto_index_name(EMPLOYEE_TABLE))?;
    let table_root = catalog.root_page(EMPLOYEE_TABLE)?;

    let rowid = index_lookup(db, index_root, config.emp_id, &mut |record: &Record| {
        record.integer(1)
    })?;
    let Some(rowid) = rowid else {
        return Ok(Vec::new());
    };

    let record = find_rowid(db, table_root, rowid)?;
    Ok(record.map(|r| full_name(&r, config)).into_iter().collect())
}

/// Clustered equality: the table root itself is an index B-tree holding
/// the full rows, keyed by the primary key.
fn equality_clustered(db: &Database, config: &QueryConfig) -> Result<Vec<String>> {
    let root = db.catalog()?.root_page(EMPLOYEE_TABLE)?;
    let line = index_lookup(db, root, config.emp_id, &mut |record: &Record| {
        Some(full_name(record, config))
    })?;
    Ok(line.into_iter().collect())
}

fn range_by_scan(db: &Database, config: &QueryConfig) -> Result<Vec<String>> {
    let (lo, hi) = config.emp_id_range;
    let root = db.catalog()?.root_page(EMPLOYEE_TABLE)?;
    let mut lines = Vec::new();
    scan(db, root, &mut |record: &Record| -> Option<()> {
        if let Some(id) = record.integer(config.emp_id_col) {
            if lo <= id && id <= hi {
                lines.push(id_and_full_name(record, config));
            }
        }
        None
    })?;
    Ok(lines)
}

/// Non-clustered range: collect the in-range rowids from the index, then
/// fetch each row from the table B-tree.
fn range_via_index(db: &Database, config: &QueryConfig) -> Result<Vec<String>> {
    let (lo, hi) = config.emp_id_range;
    let catalog = db.catalog()?;
    let index_root = catalog.root_page(&auto_index_name(EMPLOYEE_TABLE))?;
    let table_root = catalog.root_page(EMPLOYEE_TABLE)?;

    let rowids = index_range(db, index_root, lo, hi, &mut |record: &Record| {
        match record.integer(0) {
            Some(key) if lo <= key && key <= hi => record.integer(1).into_iter().collect(),
            _ => Vec::new(),
        }
    })?;

    let mut lines = Vec::with_capacity(rowids.len());
    for rowid in rowids {
        if let Some(record) = find_rowid(db, table_root, rowid)? {
            lines.push(id_and_full_name(&record, config));
        }
    }
    Ok(lines)
}

fn range_clustered(db: &Database, config: &QueryConfig) -> Result<Vec<String>> {
    let (lo, hi) = config.emp_id_range;
    let root = db.catalog()?.root_page(EMPLOYEE_TABLE)?;
    index_range(db, root, lo, hi, &mut |record: &Record| {
        match record.integer(config.emp_id_col) {
            Some(id) if lo <= id && id <= hi => vec![id_and_full_name(record, config)],
            _ => Vec::new(),
        }
    })
}

fn column(record: &Record, index: usize) -> String {
    record
        .value(index)
        .map(Value::to_string)
        .unwrap_or_else(|| "NULL".to_string())
}

fn full_name(record: &Record, config: &QueryConfig) -> String {
    format!(
        "Full Name: {} {} {}",
        column(record, config.first_name_col),
        column(record, config.middle_name_col),
        column(record, config.last_name_col)
    )
}

fn id_and_full_name(record: &Record, config: &QueryConfig) -> String {
    format!(
        "Emp ID: {}, Full Name: {} {} {}",
        column(record, config.emp_id_col),
        column(record, config.first_name_col),
        column(record, config.middle_name_col),
        column(record, config.last_name_col)
    )
}
