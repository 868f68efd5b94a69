use std::ffi::CString;
use std::fs;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use anyhow::Result;
use clap::{value_t, ArgMatches};
use log::{info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag::register;
use crate::capture::{Artifact, Config, Output, Session, Task};
use crate::crawl::{Crawler, ExecCrawler};
use crate::error::Error;
use crate::sink::{DirSink, Sink};

const GB: u64 = 1024 * 1024 * 1024;

pub fn run(args: &ArgMatches) -> Result<()> {
    let urls      = value_t!(args, "urls",      String)?;
    let interface = value_t!(args, "interface", String)?;
    let output    = value_t!(args, "output",    String)?;
    let program   = value_t!(args, "program",   String)?;
    let crawler   = value_t!(args, "crawler",   String)?;
    let timeout   = value_t!(args, "timeout",   u64)?;
    let grace     = value_t!(args, "grace",     u64)?;
    let settle    = value_t!(args, "settle",    u64)?;
    let min_free  = value_t!(args, "min-free",  u64)?;

    let filter    = args.value_of("filter").map(String::from);
    let duration: Option<u64> = args.value_of("duration").map(str::parse).transpose()?;
    let file_mode = args.is_present("file-mode");

    let outdir = PathBuf::from(&output);
    let cfg    = Config {
        program:   program,
        interface: interface,
        filter:    filter,
        output:    match file_mode {
            true  => Output::File(outdir.clone()),
            false => Output::Pipe,
        },
        grace:     Duration::from_secs(grace),
        depth:     1024,
    };

    let crawler = ExecCrawler::new(&crawler)?;
    let sink    = DirSink::new(&outdir)?;
    let tasks   = load(&urls, duration.map(Duration::from_secs))?;

    let shutdown = Arc::new(AtomicBool::new(false));
    register(SIGTERM, shutdown.clone())?;
    register(SIGINT,  shutdown.clone())?;

    let timeout = Duration::from_secs(timeout);
    let settle  = Duration::from_secs(settle);

    let mut done   = 0usize;
    let mut failed = 0usize;

    let total = tasks.len();

    for (pos, task) in tasks.iter().enumerate() {
        if shutdown.load(Ordering::Acquire) {
            info!("shutdown requested, stopping batch");
            break;
        }

        match free_space(&outdir) {
            Ok(free) if free < min_free * GB => {
                warn!("only {} GB free, below {} GB threshold, stopping batch", free / GB, min_free);
                break;
            },
            Ok(_)  => (),
            Err(e) => warn!("disk space check failed: {}", e),
        }

        info!("task {} {}: {} urls", task.index, task.label, task.urls.len());

        match execute(&cfg, task, &crawler, &sink, timeout) {
            Ok(artifact) => {
                info!("task {} done: {} ({} bytes)", task.index, artifact.name, artifact.bytes.len());
                done += 1;
            },
            Err(e) => {
                warn!("task {} failed: {}", task.index, e);
                failed += 1;
            },
        }

        if settling(pos + 1, total, &shutdown) {
            thread::sleep(settle);
        }
    }

    info!("batch finished: {} ok, {} failed", done, failed);

    Ok(())
}

/// One full session bracket: start the capture, drive the crawl to
/// completion, stop and drain, persist. A crawl failure is logged but
/// the capture is still finalized and stored.
pub fn execute(
    cfg:     &Config,
    task:    &Task,
    crawler: &dyn Crawler,
    sink:    &dyn Sink,
    timeout: Duration,
) -> Result<Artifact, Error> {
    let mut session = Session::new(cfg.clone());
    session.start(task)?;

    let crawled  = crawler.crawl(&task.urls, timeout);
    let artifact = session.stop()?;

    if let Err(e) = crawled {
        warn!("crawl for {} failed: {}", artifact.name, e);
    }

    if artifact.partial {
        warn!("artifact {} is partial", artifact.name);
    }

    sink.put(&artifact.name, &artifact.bytes)?;

    Ok(artifact)
}

/// One task per line: a bare host gets an http scheme, the label comes
/// from the host or the last two path segments.
pub fn load(path: &str, duration: Option<Duration>) -> Result<Vec<Task>> {
    let text = fs::read_to_string(path)?;

    Ok(text.lines().map(str::trim).filter(|line| {
        !line.is_empty() && !line.starts_with('#')
    }).enumerate().map(|(index, line)| {
        let url = match line.contains("://") {
            true  => line.to_string(),
            false => format!("http://{}", line),
        };

        Task {
            index:    index,
            label:    label(&url),
            urls:     vec![url],
            duration: duration,
        }
    }).collect())
}

fn label(url: &str) -> String {
    let rest = url.splitn(2, "://").last().unwrap_or(url);
    let segs: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    match segs.as_slice() {
        []         => "unknown".to_string(),
        [host]     => host.to_string(),
        [.., a, b] => format!("{}_{}", a, b),
    }
}

/// No settle pause after the last task or once shutdown is requested.
fn settling(next: usize, total: usize, shutdown: &AtomicBool) -> bool {
    next < total && !shutdown.load(Ordering::Acquire)
}

fn free_space(path: &Path) -> Result<u64, Error> {
    let cstr = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| Error::Sys(e.to_string()))?;

    let mut vfs: libc::statvfs = unsafe { mem::zeroed() };

    match unsafe { libc::statvfs(cstr.as_ptr(), &mut vfs) } {
        0 => Ok(vfs.f_bavail as u64 * vfs.f_frsize as u64),
        _ => Err(Error::Sys(format!("statvfs: {}", errno::errno()))),
    }
}
