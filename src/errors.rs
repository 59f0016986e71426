use std::fmt::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DDSError
{
    InvalidIndex,
    DimensionMismatch,
    ShapeMismatch,
    NotLexicographic,
    NotDownwardClosed,
    MergedBlocks,
    InvalidConfiguration,
    LZ4DecompressionFailed,
    ReadBufferFailed,
    WriteBufferFailed,
    SerializationFailed,
    DeserializationFailed,
    FileIOError,
}
impl std::error::Error for DDSError {}

impl Display for DDSError
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", *self)
    }
}
