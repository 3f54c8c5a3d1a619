use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SQLite magic header")]
    InvalidMagic,

    #[error("Short read on page {page}: got {got} of {want} bytes")]
    ShortRead { page: u32, got: usize, want: usize },

    #[error("Invalid page number: {0}")]
    BadPageNumber(u32),

    #[error("Truncated varint at offset {offset} of page {page}")]
    TruncatedVarint { page: u32, offset: usize },

    #[error("Unknown page kind {flag:#04x} on page {page}")]
    UnknownPageKind { page: u32, flag: u8 },

    #[error("Invalid UTF-8 in text column on page {page}")]
    InvalidUtf8 { page: u32 },

    #[error("Payload size mismatch on page {page}: reconstructed {got} of {want} bytes")]
    PayloadSizeMismatch { page: u32, got: usize, want: usize },

    #[error("Overflow chain revisits page {0}")]
    OverflowLoop(u32),

    #[error("B-tree traversal revisits page {0}")]
    PageCycle(u32),

    #[error("Bad schema record: {0}")]
    BadSchemaRecord(String),

    #[error("No table or index named {0:?} in the catalog")]
    RootNotFound(String),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProbeError>;
