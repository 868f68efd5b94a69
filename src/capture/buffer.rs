use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use crate::error::Error;

pub const CHUNK: usize = 4096;

/// Drains a capture stream through a bounded queue into a shared byte
/// buffer. One reader, one writer; the bounded channel provides
/// backpressure when the writer falls behind.
pub struct Buffer {
    reader: JoinHandle<Result<u64, Error>>,
    writer: JoinHandle<Result<u64, Error>>,
    data:   Arc<Mutex<Vec<u8>>>,
}

impl Buffer {
    pub fn attach<R: Read + Send + 'static>(stream: R, depth: usize) -> Self {
        let (tx, rx) = bounded(depth);

        let data = Arc::new(Mutex::new(Vec::new()));
        let sink = data.clone();

        let reader = thread::spawn(move || read(stream, tx));
        let writer = thread::spawn(move || write(rx, sink));

        Self { reader, writer, data }
    }

    /// Shared handle to the bytes drained so far. Survives `finish`,
    /// so a failed drain can still recover a partial artifact.
    pub fn sink(&self) -> Arc<Mutex<Vec<u8>>> {
        self.data.clone()
    }

    /// Wait for end-of-stream and a fully drained queue. Returns the
    /// byte count written, which must equal the count read.
    pub fn finish(self) -> Result<u64, Error> {
        let read    = self.reader.join().map_err(|_| Error::Thread("reader"))??;
        let written = self.writer.join().map_err(|_| Error::Thread("writer"))??;

        if read != written {
            return Err(Error::Truncated(read, written));
        }

        Ok(written)
    }
}

fn read<R: Read>(mut stream: R, tx: Sender<Vec<u8>>) -> Result<u64, Error> {
    let mut chunk = [0u8; CHUNK];
    let mut total = 0u64;

    loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        total += n as u64;

        // receiver gone, stop reading
        if tx.send(chunk[..n].to_vec()).is_err() {
            break;
        }
    }

    Ok(total)
}

fn write(rx: Receiver<Vec<u8>>, sink: Arc<Mutex<Vec<u8>>>) -> Result<u64, Error> {
    let mut total = 0u64;

    // runs until the sender drops, which only happens once every
    // queued chunk has been received in order
    for chunk in rx {
        total += chunk.len() as u64;
        sink.lock().extend_from_slice(&chunk);
    }

    Ok(total)
}
