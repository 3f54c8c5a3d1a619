use std::cmp::Ordering;

use log::debug;

use crate::error::{ProbeError, Result};
use crate::model::{Cell, Page, Record};
use crate::parser::cell::parse_cell;
use crate::parser::record::read_record;
use crate::telemetry::PageClass;
use crate::Database;

/// Read a page for traversal: reject a page number already on the current
/// root-to-leaf path, charge the read to the page's bucket, and push it
/// onto the path.
fn visit(db: &Database, number: u32, path: &mut Vec<u32>) -> Result<Page> {
    if path.contains(&number) {
        return Err(ProbeError::PageCycle(number));
    }
    let page = db.read_page(number)?;
    db.telemetry().record(PageClass::of(page.kind()));
    debug!(
        "visit page {number}: {:?}, {} cells",
        page.kind(),
        page.cell_count()
    );
    path.push(number);
    Ok(page)
}

fn record_for_cell(db: &Database, page: &Page, cell: &Cell) -> Result<Option<Record>> {
    read_record(db.pager(), db.telemetry(), page, cell)
}

/// Depth-first scan over a B-tree. Cells are walked in cell-array order,
/// each cell's left child before the cell's own record, the right-most
/// child last. Returns the first value the predicate yields; interior
/// table cells carry no record and only contribute their child.
pub fn scan<T, F>(db: &Database, root: u32, predicate: &mut F) -> Result<Option<T>>
where
    F: FnMut(&Record) -> Option<T>,
{
    scan_page(db, root, predicate, &mut Vec::new())
}

fn scan_page<T, F>(
    db: &Database,
    number: u32,
    predicate: &mut F,
    path: &mut Vec<u32>,
) -> Result<Option<T>>
where
    F: FnMut(&Record) -> Option<T>,
{
    let page = visit(db, number, path)?;

    for &cell_offset in &page.cell_pointers {
        let cell = parse_cell(&page, cell_offset, db.usable_size())?;

        if let Some(child) = cell.left_child() {
            if let Some(found) = scan_page(db, child, predicate, path)? {
                path.pop();
                return Ok(Some(found));
            }
        }

        if let Some(record) = record_for_cell(db, &page, &cell)? {
            if let Some(found) = predicate(&record) {
                path.pop();
                return Ok(Some(found));
            }
        }
    }

    if let Some(right) = page.right_most_child() {
        if let Some(found) = scan_page(db, right, predicate, path)? {
            path.pop();
            return Ok(Some(found));
        }
    }

    path.pop();
    Ok(None)
}

/// Equality lookup by rowid on a table B-tree: at every interior page
/// descend exactly once, into the left child of the first cell whose rowid
/// bounds the target (or the right-most child past them all); at the leaf,
/// walk the ascending rowids until a match or overshoot.
pub fn find_rowid(db: &Database, root: u32, target: i64) -> Result<Option<Record>> {
    let mut path = Vec::new();
    let mut number = root;

    loop {
        let page = visit(db, number, &mut path)?;

        if page.kind().is_interior() {
            let mut next = page.right_most_child();
            for &cell_offset in &page.cell_pointers {
                let cell = parse_cell(&page, cell_offset, db.usable_size())?;
                if let Cell::TableInterior(interior) = &cell {
                    if target <= interior.rowid {
                        next = Some(interior.left_child);
                        break;
                    }
                }
            }
            match next {
                Some(child) => number = child,
                None => return Ok(None),
            }
            continue;
        }

        for &cell_offset in &page.cell_pointers {
            let cell = parse_cell(&page, cell_offset, db.usable_size())?;
            if let Cell::TableLeaf(leaf) = &cell {
                match leaf.rowid.cmp(&target) {
                    Ordering::Equal => return record_for_cell(db, &page, &cell),
                    Ordering::Greater => return Ok(None),
                    Ordering::Less => {}
                }
            }
        }
        return Ok(None);
    }
}

/// Equality lookup on an index B-tree. Column 0 of every index record is
/// the key. A key match returns the extractor's value; a smaller target
/// descends into that cell's left child, exactly once per level; past all
/// cells the search follows the right-most child.
pub fn index_lookup<T, F>(db: &Database, root: u32, key: i64, extract: &mut F) -> Result<Option<T>>
where
    F: FnMut(&Record) -> Option<T>,
{
    let mut path = Vec::new();
    let mut number = root;

    loop {
        let page = visit(db, number, &mut path)?;

        let mut next = None;
        let mut bounded = false;
        for &cell_offset in &page.cell_pointers {
            let cell = parse_cell(&page, cell_offset, db.usable_size())?;
            let Some(record) = record_for_cell(db, &page, &cell)? else {
                continue;
            };
            let cell_key = index_key(&record, page.number)?;

            match key.cmp(&cell_key) {
                Ordering::Equal => return Ok(extract(&record)),
                Ordering::Less => {
                    next = cell.left_child();
                    bounded = true;
                    break;
                }
                Ordering::Greater => {}
            }
        }
        if !bounded {
            next = page.right_most_child();
        }

        match next {
            Some(child) => number = child,
            // a leaf with every key on the wrong side
            None => return Ok(None),
        }
    }
}

/// Range lookup on an index B-tree, inclusive on both bounds. The
/// extractor runs on every record the walk decodes and its results are
/// appended in traversal order. Subtrees whose separator key lies below
/// the range are skipped; the cell walk stops once the key passes the
/// upper bound. The right-most child is always visited; the extractor
/// filters out-of-range keys.
pub fn index_range<T, F>(
    db: &Database,
    root: u32,
    lo: i64,
    hi: i64,
    extract: &mut F,
) -> Result<Vec<T>>
where
    F: FnMut(&Record) -> Vec<T>,
{
    let mut out = Vec::new();
    range_page(db, root, lo, hi, extract, &mut Vec::new(), &mut out)?;
    Ok(out)
}

fn range_page<T, F>(
    db: &Database,
    number: u32,
    lo: i64,
    hi: i64,
    extract: &mut F,
    path: &mut Vec<u32>,
    out: &mut Vec<T>,
) -> Result<()>
where
    F: FnMut(&Record) -> Vec<T>,
{
    let page = visit(db, number, path)?;

    for &cell_offset in &page.cell_pointers {
        let cell = parse_cell(&page, cell_offset, db.usable_size())?;
        let Some(record) = record_for_cell(db, &page, &cell)? else {
            continue;
        };
        let key = index_key(&record, page.number)?;

        if let Some(child) = cell.left_child() {
            if lo <= key {
                range_page(db, child, lo, hi, extract, path, out)?;
            } else {
                // the subtree and its separator both sit below the range
                continue;
            }
        }

        out.extend(extract(&record));
        if hi < key {
            break;
        }
    }

    if let Some(right) = page.right_most_child() {
        range_page(db, right, lo, hi, extract, path, out)?;
    }

    path.pop();
    Ok(())
}

fn index_key(record: &Record, page: u32) -> Result<i64> {
    record.integer(0).ok_or_else(|| {
        ProbeError::BadSchemaRecord(format!("index key on page {page} is not an integer"))
    })
}
