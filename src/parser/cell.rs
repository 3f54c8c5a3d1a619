use crate::error::{ProbeError, Result};
use crate::model::{
    Cell, IndexInteriorCell, IndexLeafCell, Page, PageKind, TableInteriorCell, TableLeafCell,
};
use crate::parser::varint::{signed_varint_at, varint_at};

/// Maximum payload bytes a cell stores locally before spilling to overflow
/// pages: U - 35 for table pages, ((U - 12) * 64 / 255) - 23 for index
/// pages.
pub fn max_local_payload(usable_size: u32, is_table: bool) -> usize {
    if is_table {
        (usable_size - 35) as usize
    } else {
        ((usable_size - 12) as usize * 64 / 255) - 23
    }
}

/// Minimum local payload, ((U - 12) * 32 / 255) - 23 for every page kind.
pub fn min_local_payload(usable_size: u32) -> usize {
    ((usable_size - 12) as usize * 32 / 255) - 23
}

/// How many of `payload_size` bytes are stored in the cell itself. The
/// remainder, if any, lives on the overflow chain.
pub fn local_payload_size(payload_size: u64, usable_size: u32, is_table: bool) -> usize {
    let payload_size = payload_size as usize;
    let max_local = max_local_payload(usable_size, is_table);
    if payload_size <= max_local {
        return payload_size;
    }

    let min_local = min_local_payload(usable_size);
    let spill = min_local + (payload_size - min_local) % (usable_size as usize - 4);
    if spill <= max_local {
        spill
    } else {
        min_local
    }
}

/// Parse the cell at `cell_offset` (an entry of the page's cell pointer
/// array) according to the page kind.
pub fn parse_cell(page: &Page, cell_offset: u16, usable_size: u32) -> Result<Cell> {
    let offset = cell_offset as usize;

    match page.kind() {
        PageKind::LeafTable => parse_table_leaf_cell(page, offset, usable_size),
        PageKind::InteriorTable => parse_table_interior_cell(page, offset),
        PageKind::LeafIndex => parse_index_leaf_cell(page, offset, usable_size),
        PageKind::InteriorIndex => parse_index_interior_cell(page, offset, usable_size),
    }
}

/// `payload_size_varint || rowid_varint || payload [|| overflow_ptr]`
fn parse_table_leaf_cell(page: &Page, offset: usize, usable_size: u32) -> Result<Cell> {
    let data = &page.data;
    let (payload_size, len) = varint_at(data, offset, page.number)?;
    let (rowid, rowid_len) = signed_varint_at(data, offset + len, page.number)?;

    let payload_start = offset + len + rowid_len;
    let local_len = local_payload_size(payload_size, usable_size, true);
    let overflow_page = read_overflow_pointer(page, payload_start, local_len, payload_size)?;

    Ok(Cell::TableLeaf(TableLeafCell {
        rowid,
        payload_size,
        payload_start,
        local_len,
        overflow_page,
    }))
}

/// `left_child_ptr(4) || rowid_varint`
fn parse_table_interior_cell(page: &Page, offset: usize) -> Result<Cell> {
    let left_child = read_u32(page, offset)?;
    let (rowid, _) = signed_varint_at(&page.data, offset + 4, page.number)?;
    Ok(Cell::TableInterior(TableInteriorCell { left_child, rowid }))
}

/// `payload_size_varint || payload [|| overflow_ptr]`
fn parse_index_leaf_cell(page: &Page, offset: usize, usable_size: u32) -> Result<Cell> {
    let (payload_size, len) = varint_at(&page.data, offset, page.number)?;

    let payload_start = offset + len;
    let local_len = local_payload_size(payload_size, usable_size, false);
    let overflow_page = read_overflow_pointer(page, payload_start, local_len, payload_size)?;

    Ok(Cell::IndexLeaf(IndexLeafCell {
        payload_size,
        payload_start,
        local_len,
        overflow_page,
    }))
}

/// `left_child_ptr(4) || payload_size_varint || payload [|| overflow_ptr]`
fn parse_index_interior_cell(page: &Page, offset: usize, usable_size: u32) -> Result<Cell> {
    let left_child = read_u32(page, offset)?;
    let (payload_size, len) = varint_at(&page.data, offset + 4, page.number)?;

    let payload_start = offset + 4 + len;
    let local_len = local_payload_size(payload_size, usable_size, false);
    let overflow_page = read_overflow_pointer(page, payload_start, local_len, payload_size)?;

    Ok(Cell::IndexInterior(IndexInteriorCell {
        left_child,
        payload_size,
        payload_start,
        local_len,
        overflow_page,
    }))
}

/// The 4-byte first-overflow-page number directly follows the local
/// payload bytes, present only when the payload spills.
fn read_overflow_pointer(
    page: &Page,
    payload_start: usize,
    local_len: usize,
    payload_size: u64,
) -> Result<Option<u32>> {
    if payload_size as usize <= local_len {
        return Ok(None);
    }
    read_u32(page, payload_start + local_len).map(Some)
}

fn read_u32(page: &Page, offset: usize) -> Result<u32> {
    let bytes = page
        .data
        .get(offset..offset + 4)
        .ok_or(ProbeError::ShortRead {
            page: page.number,
            got: page.data.len(),
            want: offset + 4,
        })?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
