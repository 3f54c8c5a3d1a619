use crate::error::{ProbeError, Result};
use crate::model::DbHeader;

const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Size of the file header that precedes the B-tree content of page 1.
pub const FILE_HEADER_SIZE: usize = 100;

/// Parse the 100-byte file header.
pub fn parse_db_header(data: &[u8]) -> Result<DbHeader> {
    if data.len() < FILE_HEADER_SIZE {
        return Err(ProbeError::ShortRead {
            page: 1,
            got: data.len(),
            want: FILE_HEADER_SIZE,
        });
    }

    if &data[0..16] != SQLITE_MAGIC {
        return Err(ProbeError::InvalidMagic);
    }

    // Page size (bytes 16-17); the value 1 denotes 65536
    let page_size_raw = u16::from_be_bytes([data[16], data[17]]);
    let page_size = if page_size_raw == 1 {
        65536
    } else {
        page_size_raw as u32
    };

    // Reserved bytes per page (byte 20)
    let reserved_bytes_per_page = data[20];

    // Database size in pages (bytes 28-31)
    let page_count = u32::from_be_bytes([data[28], data[29], data[30], data[31]]);

    Ok(DbHeader {
        page_size,
        reserved_bytes_per_page,
        page_count,
    })
}
