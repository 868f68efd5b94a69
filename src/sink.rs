use std::fs;
use std::path::{Path, PathBuf};
use log::info;
use crate::error::Error;

/// Persistence boundary for finished artifacts. Local directories and
/// remote object stores are interchangeable behind this contract.
pub trait Sink {
    fn put(&self, name: &str, body: &[u8]) -> Result<(), Error>;
}

pub struct DirSink {
    dir: PathBuf,
}

impl DirSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| Error::Persist(e.to_string()))?;
        Ok(Self { dir })
    }
}

impl Sink for DirSink {
    fn put(&self, name: &str, body: &[u8]) -> Result<(), Error> {
        let path = self.dir.join(name);
        fs::write(&path, body).map_err(|e| Error::Persist(e.to_string()))?;
        info!("stored {} ({} bytes)", path.display(), body.len());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn dir_sink_writes_artifact() {
        let dir  = tempdir().expect("tempdir");
        let sink = DirSink::new(dir.path().join("pcaps")).expect("sink");

        sink.put("0_example_0.pcap", b"bytes").expect("put");

        let stored = fs::read(dir.path().join("pcaps/0_example_0.pcap")).expect("read");
        assert_eq!(stored, b"bytes");
    }

    #[test]
    fn dir_sink_rejects_unwritable_target() {
        let dir  = tempdir().expect("tempdir");
        let sink = DirSink::new(dir.path()).expect("sink");

        match sink.put("no/such/dir.pcap", b"bytes") {
            Err(Error::Persist(_)) => (),
            other                  => panic!("expected persist error, got {:?}", other),
        }
    }
}
