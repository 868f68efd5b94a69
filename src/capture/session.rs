use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use log::{debug, warn};
use parking_lot::Mutex;
use crate::error::Error;
use super::buffer::Buffer;
use super::supervisor::{self, Handle};

#[derive(Clone, Debug)]
pub struct Config {
    pub program:   String,
    pub interface: String,
    pub filter:    Option<String>,
    pub output:    Output,
    pub grace:     Duration,
    pub depth:     usize,
}

#[derive(Clone, Debug)]
pub enum Output {
    Pipe,
    File(PathBuf),
}

#[derive(Clone, Debug)]
pub struct Task {
    pub index:    usize,
    pub label:    String,
    pub urls:     Vec<String>,
    pub duration: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct Artifact {
    pub name:    String,
    pub bytes:   Vec<u8>,
    pub partial: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum State {
    Idle,
    Starting,
    Capturing,
    Stopping,
    Finalized,
    Failed,
}

/// Brackets one capture process around one crawl. `start` launches the
/// capture and begins buffering, `stop` is a two-phase barrier: stop
/// the producer, then drain the queue. Stopping early would race the
/// process's final flush and silently truncate the artifact.
pub struct Session {
    cfg:      Config,
    state:    State,
    handle:   Option<Handle>,
    buffer:   Option<Buffer>,
    data:     Option<Arc<Mutex<Vec<u8>>>>,
    name:     Option<String>,
    path:     Option<PathBuf>,
    artifact: Option<Artifact>,
}

impl Session {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg:      cfg,
            state:    State::Idle,
            handle:   None,
            buffer:   None,
            data:     None,
            name:     None,
            path:     None,
            artifact: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn pgid(&self) -> Option<i32> {
        self.handle.as_ref().map(Handle::pgid)
    }

    pub fn start(&mut self, task: &Task) -> Result<(), Error> {
        if self.state != State::Idle {
            return Err(Error::State("start requires an idle session"));
        }

        self.state = State::Starting;

        let name = name(task)?;
        let mut cmd = self.command(task, &name);

        let mut handle = match supervisor::start(&mut cmd) {
            Ok(handle) => handle,
            Err(e)     => {
                self.state = State::Failed;
                return Err(e);
            },
        };

        if let Output::Pipe = self.cfg.output {
            let stdout = match handle.stdout() {
                Some(stdout) => stdout,
                None         => {
                    self.state = State::Failed;
                    let _ = supervisor::stop(&mut handle, self.cfg.grace);
                    return Err(Error::Launch("no stdout pipe".to_string()));
                },
            };

            let buffer = Buffer::attach(stdout, self.cfg.depth);
            self.data   = Some(buffer.sink());
            self.buffer = Some(buffer);
        }

        debug!("session {}: capturing on {}", name, self.cfg.interface);

        self.name   = Some(name);
        self.handle = Some(handle);
        self.state  = State::Capturing;

        Ok(())
    }

    /// Stop the capture process, drain the buffer, and yield the
    /// artifact. A second call returns the same artifact. Failures
    /// mid-stop still recover whatever bytes were buffered, marked
    /// partial.
    pub fn stop(&mut self) -> Result<Artifact, Error> {
        match self.state {
            State::Capturing                  => (),
            State::Finalized | State::Failed  => {
                return self.artifact.clone().ok_or(Error::State("no artifact"));
            },
            _ => return Err(Error::State("stop requires a capturing session")),
        }

        self.state = State::Stopping;

        let name = self.name.clone().unwrap_or_default();
        let mut failed = false;

        if let Some(handle) = self.handle.as_mut() {
            match supervisor::stop(handle, self.cfg.grace) {
                Ok(stopped) if stopped.forced => {
                    warn!("session {}: forced termination, artifact may be truncated", name);
                },
                Ok(_)  => (),
                Err(e) => {
                    warn!("session {}: stop failed: {}", name, e);
                    failed = true;
                },
            }
        }
        self.handle = None;

        let bytes = match (self.buffer.take(), self.data.take()) {
            (Some(buffer), Some(data)) => match buffer.finish() {
                Ok(n) => {
                    debug!("session {}: drained {} bytes", name, n);
                    unwrap(data)
                },
                Err(e) => {
                    warn!("session {}: drain failed: {}", name, e);
                    failed = true;
                    unwrap(data)
                },
            },
            _ => match &self.path {
                Some(path) => match fs::read(path) {
                    Ok(bytes) => bytes,
                    Err(e)    => {
                        warn!("session {}: cannot read {:?}: {}", name, path, e);
                        failed = true;
                        Vec::new()
                    },
                },
                None => Vec::new(),
            },
        };

        let artifact = Artifact { name, bytes, partial: failed };

        self.state    = if failed { State::Failed } else { State::Finalized };
        self.artifact = Some(artifact.clone());

        Ok(artifact)
    }

    fn command(&mut self, task: &Task, name: &str) -> Command {
        let mut cmd = Command::new(&self.cfg.program);
        cmd.arg("-i").arg(&self.cfg.interface);

        match &self.cfg.output {
            Output::Pipe => {
                cmd.arg("-w").arg("-").arg("-F").arg("pcap");
                cmd.stdout(Stdio::piped());
            },
            Output::File(dir) => {
                let path = dir.join(name);
                cmd.arg("-w").arg(&path);
                cmd.stdout(Stdio::null());
                self.path = Some(path);
            },
        }

        if let Some(duration) = task.duration {
            cmd.arg("-a").arg(format!("duration:{}", duration.as_secs()));
        }

        if let Some(filter) = &self.cfg.filter {
            cmd.arg("-f").arg(filter);
        }

        cmd
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // cancellation safety net: no exit path leaves the capture
        // process group running
        if let Some(handle) = self.handle.as_mut() {
            let _ = supervisor::stop(handle, Duration::from_millis(100));
        }
    }
}

fn unwrap(data: Arc<Mutex<Vec<u8>>>) -> Vec<u8> {
    match Arc::try_unwrap(data) {
        Ok(mutex) => mutex.into_inner(),
        Err(data) => data.lock().clone(),
    }
}

fn name(task: &Task) -> Result<String, Error> {
    let now = time::now_utc();
    let ts  = now.strftime("%Y%m%d%H%M%S").map_err(|e| Error::Sys(e.to_string()))?;
    Ok(format!("{}_{}_{}{:06}.pcap", task.index, clean(&task.label), ts, now.tm_nsec / 1000))
}

fn clean(label: &str) -> String {
    label.chars().map(|c| {
        match c.is_ascii_alphanumeric() || c == '-' || c == '.' {
            true  => c,
            false => '_',
        }
    }).collect()
}
