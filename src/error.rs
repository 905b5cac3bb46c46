use std::io;

pub type Result<T> = std::result::Result<T, FontError>;

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("Input too small: {0} bytes")]
    InputTooSmall(usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt container: {0}")]
    CorruptContainer(String),

    #[error("Required table not found: {0}")]
    MissingTable(&'static str),

    #[error("Unsupported cmap subtable format: {0}")]
    UnsupportedCmap(u16),

    #[error("Composite glyph cycle involving glyph {0}")]
    CompositeCycle(u16),

    #[error("CharString operand or call stack overflow")]
    CharStringOverflow,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}
