use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Instant;

use log::debug;

use crate::error::{ProbeError, Result};
use crate::model::DbHeader;
use crate::parser::header::{parse_db_header, FILE_HEADER_SIZE};
use crate::telemetry::Telemetry;

/// Positioned, page-aligned reads over one open database file. Every read
/// is timed and charged to the telemetry latency accumulator by the
/// caller-supplied sink.
pub struct Pager {
    file: RefCell<File>,
    page_size: u32,
    usable_size: u32,
    page_count: u32,
}

impl Pager {
    /// Open a database file: parse the 100-byte header prefix and size the
    /// pager from it.
    pub fn open(path: &Path) -> Result<(Self, DbHeader)> {
        let mut file = File::open(path)?;

        let mut prefix = [0u8; FILE_HEADER_SIZE];
        file.read_exact(&mut prefix)?;
        let header = parse_db_header(&prefix)?;

        // Legacy files leave the header page count at 0; fall back to the
        // file length.
        let page_count = if header.page_count > 0 {
            header.page_count
        } else {
            (file.metadata()?.len() / header.page_size as u64) as u32
        };

        let pager = Pager {
            file: RefCell::new(file),
            page_size: header.page_size,
            usable_size: header.usable_size(),
            page_count,
        };
        Ok((pager, header))
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn usable_size(&self) -> u32 {
        self.usable_size
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Read page `number` (1-based): seek to `(number - 1) * page_size`,
    /// read exactly one page, and sample the elapsed wall-clock time into
    /// `telemetry`.
    pub fn read_page(&self, number: u32, telemetry: &Telemetry) -> Result<Vec<u8>> {
        if number == 0 || number > self.page_count {
            return Err(ProbeError::BadPageNumber(number));
        }

        let offset = (number as u64 - 1) * self.page_size as u64;
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(offset))?;

        let mut buf = vec![0u8; self.page_size as usize];
        let started = Instant::now();
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        telemetry.sample_latency(elapsed_ms);
        debug!("read page {number} in {elapsed_ms:.4} ms");

        if filled < buf.len() {
            return Err(ProbeError::ShortRead {
                page: number,
                got: filled,
                want: buf.len(),
            });
        }
        Ok(buf)
    }
}
