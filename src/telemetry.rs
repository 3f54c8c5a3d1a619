use std::cell::Cell;
use std::io::{self, Write};

use crate::model::PageKind;

/// Telemetry bucket a page read is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageClass {
    /// The schema root on page 1
    Header,
    /// Table B-tree pages, interior or leaf
    Data,
    /// Interior index B-tree pages
    IndexInternal,
    /// Leaf index B-tree pages
    IndexLeaf,
}

impl PageClass {
    pub fn of(kind: PageKind) -> Self {
        match kind {
            PageKind::InteriorTable | PageKind::LeafTable => PageClass::Data,
            PageKind::InteriorIndex => PageClass::IndexInternal,
            PageKind::LeafIndex => PageClass::IndexLeaf,
        }
    }
}

/// Per-query I/O telemetry: read counters partitioned by page class and a
/// latency accumulator for the average page access time. Lives inside the
/// query's `Database` value; interior mutability keeps the read path on
/// `&self` (everything is single-threaded).
#[derive(Debug, Default)]
pub struct Telemetry {
    header_reads: Cell<u64>,
    data_page_reads: Cell<u64>,
    index_internal_reads: Cell<u64>,
    index_leaf_reads: Cell<u64>,
    total_ms: Cell<f64>,
    pages_measured: Cell<u64>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge one page read to `class`.
    pub fn record(&self, class: PageClass) {
        let counter = match class {
            PageClass::Header => &self.header_reads,
            PageClass::Data => &self.data_page_reads,
            PageClass::IndexInternal => &self.index_internal_reads,
            PageClass::IndexLeaf => &self.index_leaf_reads,
        };
        counter.set(counter.get() + 1);
    }

    /// Accumulate the wall-clock time of one positioned read.
    pub fn sample_latency(&self, elapsed_ms: f64) {
        self.total_ms.set(self.total_ms.get() + elapsed_ms);
        self.pages_measured.set(self.pages_measured.get() + 1);
    }

    pub fn header_reads(&self) -> u64 {
        self.header_reads.get()
    }

    pub fn data_page_reads(&self) -> u64 {
        self.data_page_reads.get()
    }

    pub fn index_internal_reads(&self) -> u64 {
        self.index_internal_reads.get()
    }

    pub fn index_leaf_reads(&self) -> u64 {
        self.index_leaf_reads.get()
    }

    pub fn pages_measured(&self) -> u64 {
        self.pages_measured.get()
    }

    /// Average page access time in milliseconds, 0 when nothing was read.
    pub fn average_ms(&self) -> f64 {
        let pages = self.pages_measured.get();
        if pages == 0 {
            0.0
        } else {
            self.total_ms.get() / pages as f64
        }
    }

    /// Counter snapshot, in report order.
    pub fn counters(&self) -> [u64; 4] {
        [
            self.header_reads.get(),
            self.data_page_reads.get(),
            self.index_internal_reads.get(),
            self.index_leaf_reads.get(),
        ]
    }

    /// The five per-query report lines.
    pub fn write_report(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "    Header page read counts: {}", self.header_reads())?;
        writeln!(out, "    Data page read counts: {}", self.data_page_reads())?;
        writeln!(
            out,
            "    Index internal page read counts: {}",
            self.index_internal_reads()
        )?;
        writeln!(
            out,
            "    Index leaf page read counts: {}",
            self.index_leaf_reads()
        )?;
        writeln!(
            out,
            "    Average page access time in milliseconds: {:.6}ms",
            self.average_ms()
        )
    }

    /// Zero every counter and the latency accumulator.
    pub fn reset_all(&self) {
        self.header_reads.set(0);
        self.data_page_reads.set(0);
        self.index_internal_reads.set(0);
        self.index_leaf_reads.set(0);
        self.total_ms.set(0.0);
        self.pages_measured.set(0);
    }
}
