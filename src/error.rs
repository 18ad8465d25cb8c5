use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("no multicast-capable interface is available")]
    ErrNoInterface,
    #[error("service not found")]
    ErrServiceNotFound,
    #[error("peer is stopped")]
    ErrPeerStopped,

    // Wire codec errors.
    #[error("insufficient data for base length type")]
    ErrBaseLen,
    #[error("insufficient data for calculated length type")]
    ErrCalcLen,
    #[error("segment prefix is reserved")]
    ErrReserved,
    #[error("too many compression pointers")]
    ErrTooManyPtr,
    #[error("invalid compression pointer")]
    ErrInvalidPtr,
    #[error("segment length too long")]
    ErrSegTooLong,
    #[error("zero length segment")]
    ErrZeroSegLen,
    #[error("name too long")]
    ErrNameTooLong,
    #[error("character string exceeds maximum length (255)")]
    ErrStringTooLong,
    #[error("insufficient data for resource body length")]
    ErrResourceLen,
    #[error("resource length too long")]
    ErrResTooLong,
    #[error("too many Questions")]
    ErrTooManyQuestions,
    #[error("too many Answers")]
    ErrTooManyAnswers,
    #[error("too many Authorities")]
    ErrTooManyAuthorities,
    #[error("too many Additionals")]
    ErrTooManyAdditionals,

    #[error("{0}")]
    Io(#[source] IoError),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}
