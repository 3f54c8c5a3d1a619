use std::collections::HashSet;

use log::trace;

use crate::error::{ProbeError, Result};
use crate::pager::Pager;
use crate::telemetry::{PageClass, Telemetry};

/// Harvest `overflow_len` payload bytes from the overflow chain starting
/// at `first_page`, appending them to `out`. Each overflow page holds
/// `usable_size - 4` payload bytes after its 4-byte next pointer; every
/// read is charged to `class`, the bucket of the owning page.
pub fn harvest_overflow(
    pager: &Pager,
    telemetry: &Telemetry,
    class: PageClass,
    owner_page: u32,
    first_page: u32,
    overflow_len: usize,
    out: &mut Vec<u8>,
) -> Result<()> {
    let per_page = pager.usable_size() as usize - 4;
    let mut seen = HashSet::new();
    let mut next = first_page;
    let mut remaining = overflow_len;

    while remaining > 0 {
        if next == 0 {
            // chain ended with payload still outstanding
            return Err(ProbeError::PayloadSizeMismatch {
                page: owner_page,
                got: overflow_len - remaining,
                want: overflow_len,
            });
        }
        if !seen.insert(next) {
            return Err(ProbeError::OverflowLoop(next));
        }

        let data = pager.read_page(next, telemetry)?;
        telemetry.record(class);

        let take = remaining.min(per_page);
        out.extend_from_slice(&data[4..4 + take]);
        remaining -= take;
        trace!("overflow page {next}: took {take} bytes, {remaining} remaining");

        next = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    }
    Ok(())
}
