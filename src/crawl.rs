use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use log::{debug, warn};
use crate::error::Error;

const POLL: Duration = Duration::from_millis(50);

/// The crawl collaborator: visit the URLs, return when done. The
/// capture core never looks at its output.
pub trait Crawler {
    fn crawl(&self, urls: &[String], timeout: Duration) -> Result<(), Error>;
}

/// Runs an external browser-driver command with the URLs appended as
/// arguments, in its own process group so a timed-out crawl can be
/// killed without leaving browser children behind.
pub struct ExecCrawler {
    program: String,
    args:    Vec<String>,
}

impl ExecCrawler {
    pub fn new(command: &str) -> Result<Self, Error> {
        let mut parts = command.split_whitespace().map(String::from);

        let program = match parts.next() {
            Some(program) => program,
            None          => return Err(Error::Crawl("empty crawler command".to_string())),
        };

        Ok(Self { program, args: parts.collect() })
    }
}

impl Crawler for ExecCrawler {
    fn crawl(&self, urls: &[String], timeout: Duration) -> Result<(), Error> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
           .args(urls)
           .stdin(Stdio::null())
           .stdout(Stdio::null())
           .stderr(Stdio::null());

        let mut child = unsafe {
            cmd.pre_exec(|| match libc::setsid() {
                -1 => Err(io::Error::last_os_error()),
                _  => Ok(()),
            })
        }.spawn().map_err(|e| Error::Crawl(e.to_string()))?;

        let pgid = child.id() as i32;
        debug!("crawler pid {} visiting {} urls", child.id(), urls.len());

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return match status.success() {
                    true  => Ok(()),
                    false => Err(Error::Crawl(status.to_string())),
                };
            }

            if Instant::now() >= deadline {
                warn!("crawler exceeded {}s, killing group {}", timeout.as_secs(), pgid);
                unsafe { libc::killpg(pgid, libc::SIGKILL) };
                child.wait()?;
                return Err(Error::Timeout(timeout.as_secs()));
            }

            thread::sleep(POLL);
        }
    }
}
