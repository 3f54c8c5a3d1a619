pub mod analyzer;
pub mod config;
pub mod error;
pub mod model;
pub mod pager;
pub mod parser;
pub mod query;
pub mod telemetry;

use std::path::Path;

pub use crate::config::QueryConfig;
pub use crate::error::{ProbeError, Result};

use crate::model::{Catalog, DbHeader, Page};
use crate::pager::Pager;
use crate::parser::page::parse_btree_page;
use crate::telemetry::Telemetry;

/// One open database file: the pager, the parsed file header, and the
/// telemetry block for the current query. Dropped at the end of the query,
/// which closes the file handle.
pub struct Database {
    pager: Pager,
    header: DbHeader,
    telemetry: Telemetry,
}

impl Database {
    /// Open a database file and parse its header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (pager, header) = Pager::open(path.as_ref())?;
        Ok(Self {
            pager,
            header,
            telemetry: Telemetry::new(),
        })
    }

    pub fn header(&self) -> &DbHeader {
        &self.header
    }

    pub fn page_count(&self) -> u32 {
        self.pager.page_count()
    }

    pub fn usable_size(&self) -> u32 {
        self.pager.usable_size()
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Read and parse one B-tree page. The latency sample happens inside
    /// the pager; charging the read to a telemetry bucket is the caller's
    /// job, since classification depends on what the page is used for.
    pub fn read_page(&self, number: u32) -> Result<Page> {
        let data = self.pager.read_page(number, &self.telemetry)?;
        parse_btree_page(data, number)
    }

    /// Parse the schema root into the catalog.
    pub fn catalog(&self) -> Result<Catalog> {
        analyzer::schema::read_catalog(self)
    }
}
