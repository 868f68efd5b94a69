use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use anyhow::Result;
use clap::{value_t, ArgMatches};
use log::{info, warn};
use crate::analyze::{analyze_batch, csv};

pub fn report(args: &ArgMatches) -> Result<()> {
    let dir  = value_t!(args, "dir", String)?;
    let out  = args.value_of("csv").map(String::from);
    let json = args.is_present("json");

    let mut paths: Vec<PathBuf> = fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().map(|ext| ext == "pcap").unwrap_or(false))
        .collect();
    paths.sort();

    info!("analyzing {} artifacts in {}", paths.len(), dir);

    let mut artifacts = Vec::with_capacity(paths.len());
    for path in &paths {
        let name = path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        artifacts.push((name, fs::read(path)?));
    }

    let rows = analyze_batch(artifacts);

    for row in &rows {
        match &row.error {
            None    => info!("{}: ok", row.name),
            Some(e) => warn!("{}: {}", row.name, e),
        }
    }

    let mut w: Box<dyn Write> = match out {
        Some(path) => Box::new(File::create(path)?),
        None       => Box::new(io::stdout()),
    };

    match json {
        true  => serde_json::to_writer_pretty(&mut w, &rows)?,
        false => csv(&rows, &mut w)?,
    }
    w.flush()?;

    Ok(())
}
