use std::io::{self, Read};
use std::os::unix::process::CommandExt;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use libc::{SIGINT, SIGKILL};
use log::warn;
use crate::error::Error;

const PROBE: Duration = Duration::from_millis(200);
const POLL:  Duration = Duration::from_millis(20);

pub struct Handle {
    child: Child,
    pgid:  i32,
    done:  bool,
}

pub struct Stopped {
    pub forced: bool,
}

impl Handle {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn pgid(&self) -> i32 {
        self.pgid
    }

    pub fn stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }
}

/// Launch the capture process in its own process group so the whole
/// group can be signaled on stop. The command's stdout must already be
/// configured by the caller (piped or null depending on output mode).
pub fn start(cmd: &mut Command) -> Result<Handle, Error> {
    cmd.stdin(Stdio::null()).stderr(Stdio::piped());

    let child = unsafe {
        cmd.pre_exec(|| match libc::setsid() {
            -1 => Err(io::Error::last_os_error()),
            _  => Ok(()),
        })
    }.spawn().map_err(|e| Error::Launch(e.to_string()))?;

    let pgid = child.id() as i32;
    let mut handle = Handle { child, pgid, done: false };

    // tshark exits almost immediately on a bad interface or missing
    // permissions, so probe briefly before declaring the launch good.
    let deadline = Instant::now() + PROBE;
    while Instant::now() < deadline {
        if let Some(status) = handle.child.try_wait()? {
            let stderr = drain(&mut handle.child);
            handle.done = true;
            return Err(Error::Launch(format!("{}: {}", status, stderr.trim())));
        }
        thread::sleep(POLL);
    }

    // tshark keeps rewriting its packet counter on stderr; left unread
    // the pipe fills and blocks the capture mid-crawl
    if let Some(stderr) = handle.child.stderr.take() {
        thread::spawn(move || discard(stderr));
    }

    Ok(handle)
}

/// Interrupt the process group and wait up to `grace` for a clean exit,
/// then kill the group outright. Safe to call again after the process
/// has exited, and after a previous stop.
pub fn stop(handle: &mut Handle, grace: Duration) -> Result<Stopped, Error> {
    if handle.done || handle.child.try_wait()?.is_some() {
        handle.done = true;
        return Ok(Stopped { forced: false });
    }

    signal(handle.pgid, SIGINT)?;

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if handle.child.try_wait()?.is_some() {
            handle.done = true;
            return Ok(Stopped { forced: false });
        }
        thread::sleep(POLL);
    }

    warn!("process group {} ignored interrupt, killing", handle.pgid);

    signal(handle.pgid, SIGKILL)?;
    handle.child.wait()?;
    handle.done = true;

    Ok(Stopped { forced: true })
}

pub fn alive(pgid: i32) -> bool {
    unsafe { libc::killpg(pgid, 0) == 0 }
}

fn signal(pgid: i32, sig: i32) -> Result<(), Error> {
    match unsafe { libc::killpg(pgid, sig) } {
        0                                        => Ok(()),
        _ if errno::errno().0 == libc::ESRCH     => Ok(()),
        _ => Err(Error::Sys(format!("killpg({}, {}): {}", pgid, sig, errno::errno()))),
    }
}

fn discard<R: Read>(mut stream: R) {
    let mut chunk = [0u8; 4096];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(_)          => (),
        }
    }
}

fn drain(child: &mut Child) -> String {
    let mut buf = String::new();
    if let Some(mut stderr) = child.stderr.take() {
        let _ = stderr.read_to_string(&mut buf);
    }
    buf
}
