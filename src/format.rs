use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unsupported object command: {0:#06x}")]
    UnsupportedCommand(u16),
    #[error("unexpected end of file while reading object stream")]
    UnexpectedEof,
    #[error("unterminated null-terminated string in object stream")]
    UnterminatedString,
    #[error("label name is not valid UTF-8: {0:?}")]
    InvalidLabelName(Vec<u8>),
    #[error("{0} trailing byte(s) after end of object")]
    TrailingData(usize),
}

pub mod obj;
