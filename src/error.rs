use std::fmt;
use std::io;

#[derive(Debug)]
pub enum Error {
    Launch(String),
    Crawl(String),
    Timeout(u64),
    Decode(String),
    Persist(String),
    State(&'static str),
    Truncated(u64, u64),
    Thread(&'static str),
    Sys(String),
    Io(io::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Error::Launch(msg)       => write!(f, "launch failed: {}", msg),
            Error::Crawl(msg)        => write!(f, "crawl failed: {}", msg),
            Error::Timeout(secs)     => write!(f, "timeout after {}s", secs),
            Error::Decode(msg)       => write!(f, "decode failed: {}", msg),
            Error::Persist(msg)      => write!(f, "persist failed: {}", msg),
            Error::State(msg)        => write!(f, "invalid state: {}", msg),
            Error::Truncated(r, w)   => write!(f, "truncated: read {} wrote {}", r, w),
            Error::Thread(name)      => write!(f, "{} thread panicked", name),
            Error::Sys(msg)          => write!(f, "system error: {}", msg),
            Error::Io(err)           => write!(f, "i/o error: {}", err),
        }
    }
}
