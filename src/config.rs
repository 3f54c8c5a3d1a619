use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

/// Configuration for the query suite: the four database layouts, the
/// query constants, and the Employee column positions. Every field has a
/// default, so a configuration file only needs to name what it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// 4 KiB pages, no explicit index
    pub no_index_4k: PathBuf,
    /// 16 KiB pages, no explicit index
    pub no_index_16k: PathBuf,
    /// 4 KiB pages, non-clustered primary-key index
    pub unclustered_4k: PathBuf,
    /// 4 KiB pages, clustered primary key (WITHOUT ROWID)
    pub clustered_4k: PathBuf,

    /// Last name the scan queries match
    pub last_name: String,
    /// Primary key the equality queries match
    pub emp_id: i64,
    /// Inclusive primary-key range for the range queries
    pub emp_id_range: (i64, i64),

    pub emp_id_col: usize,
    pub first_name_col: usize,
    pub middle_name_col: usize,
    pub last_name_col: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            no_index_4k: PathBuf::from("employee-noindex-4k.db"),
            no_index_16k: PathBuf::from("employee-noindex-16k.db"),
            unclustered_4k: PathBuf::from("employee-unclustered-4k.db"),
            clustered_4k: PathBuf::from("employee-clustered-4k.db"),
            last_name: "Rowe".to_string(),
            emp_id: 181162,
            emp_id_range: (171800, 171899),
            emp_id_col: 0,
            first_name_col: 2,
            middle_name_col: 3,
            last_name_col: 4,
        }
    }
}

impl QueryConfig {
    /// Load from a JSON file; absent fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: QueryConfig =
            serde_json::from_str(r#"{"last_name": "Diaz", "emp_id": 7}"#).unwrap();
        assert_eq!(config.last_name, "Diaz");
        assert_eq!(config.emp_id, 7);
        assert_eq!(config.emp_id_range, (171800, 171899));
        assert_eq!(config.last_name_col, 4);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<QueryConfig>(r#"{"page_size": 4096}"#).is_err());
    }
}
