use log::debug;

use crate::error::{ProbeError, Result};
use crate::model::{Catalog, CatalogEntry, ObjectKind, PageKind, Record, Value};
use crate::parser::cell::parse_cell;
use crate::parser::record::read_record;
use crate::telemetry::PageClass;
use crate::Database;

/// Parse the schema root on page 1 into the catalog. The page read is
/// charged to the Header bucket.
pub fn read_catalog(db: &Database) -> Result<Catalog> {
    let page = db.read_page(1)?;
    db.telemetry().record(PageClass::Header);

    if page.kind() != PageKind::LeafTable {
        return Err(ProbeError::BadSchemaRecord(
            "schema root is not a leaf table page".to_string(),
        ));
    }

    let mut entries = Vec::with_capacity(page.cell_count());
    for &cell_offset in &page.cell_pointers {
        let cell = parse_cell(&page, cell_offset, db.usable_size())?;
        let record = read_record(db.pager(), db.telemetry(), &page, &cell)?.ok_or_else(|| {
            ProbeError::BadSchemaRecord("schema cell carries no record".to_string())
        })?;
        if let Some(entry) = catalog_entry(&record)? {
            debug!(
                "catalog: {} {} at root page {}",
                entry.kind.as_str(),
                entry.name,
                entry.root_page
            );
            entries.push(entry);
        }
    }
    Ok(Catalog::new(entries))
}

/// A schema record is (type, name, tbl_name, root_page, sql). Only tables
/// and indexes carry a root page the reader can traverse; other object
/// kinds are skipped.
fn catalog_entry(record: &Record) -> Result<Option<CatalogEntry>> {
    if record.values.len() < 5 {
        return Err(ProbeError::BadSchemaRecord(format!(
            "expected 5 schema columns, found {}",
            record.values.len()
        )));
    }

    let kind = match record.text(0).and_then(ObjectKind::from_str) {
        Some(kind) => kind,
        None => return Ok(None),
    };

    let name = record
        .text(1)
        .ok_or_else(|| ProbeError::BadSchemaRecord("object name is not text".to_string()))?
        .to_string();

    let root_page = match record.value(3) {
        Some(Value::Integer(n)) if *n > 0 => *n as u32,
        other => {
            return Err(ProbeError::BadSchemaRecord(format!(
                "root page of {name:?} is not a positive integer: {other:?}"
            )))
        }
    };

    Ok(Some(CatalogEntry {
        kind,
        name,
        root_page,
    }))
}
