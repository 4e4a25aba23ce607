//! Error types for the layout model

/// Errors raised while interpreting raw tag bytes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// Page address outside the tag's page space
    #[error("page {0} is outside the tag (max {max})", max = crate::layout::TOTAL_PAGES - 1)]
    PageOutOfRange(u8),

    /// Dump is not exactly one full tag image
    #[error("dump is {actual} bytes, expected {expected}")]
    DumpLength {
        /// Required size
        expected: usize,
        /// Size received
        actual: usize,
    },

    /// Header read did not return four pages
    #[error("header read returned {0} bytes")]
    HeaderLength(usize),

    /// Serial number has the wrong width
    #[error("serial is {0} bytes, expected 7")]
    SerialLength(usize),
}
