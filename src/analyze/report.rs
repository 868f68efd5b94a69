use std::io::Write;
use pcap::Capture;
use serde::Serialize;
use tempfile::NamedTempFile;
use crate::error::Error;
use super::decode::decode;
use super::reconstruct::{Reconstructor, Summary};

pub const COLUMNS: &[&str] = &[
    "file_name",
    "total_packets",
    "total_flows",
    "total_bidirectional_flows",
    "avg_packet_length",
    "tcp_count",
    "tcp_ratio",
    "udp_count",
    "udp_ratio",
    "tcp_handshake_packets",
    "completed_tcp_handshakes",
    "skipped_records",
    "error",
];

#[derive(Clone, Debug, Serialize)]
pub struct Row {
    pub name:    String,
    pub summary: Option<Summary>,
    pub error:   Option<String>,
}

/// Replay one artifact's bytes into flow statistics. Malformed or
/// truncated capture data fails with a decode error; individual frames
/// that cannot be parsed are counted as skipped instead.
pub fn analyze_one(bytes: &[u8]) -> Result<Summary, Error> {
    let mut file = NamedTempFile::new()?;
    file.write_all(bytes)?;
    file.flush()?;

    let mut cap = Capture::from_file(file.path()).map_err(|e| Error::Decode(e.to_string()))?;
    let mut recon = Reconstructor::new();

    loop {
        match cap.next() {
            Ok(pkt) => match decode(pkt) {
                Some(rec) => recon.process(&rec),
                None      => recon.skip(),
            },
            Err(pcap::Error::NoMorePackets) => break,
            Err(e) => return Err(Error::Decode(e.to_string())),
        }
    }

    Ok(recon.summary())
}

/// Analyze each artifact independently. A failed artifact becomes a
/// failed row; it never aborts the rest of the batch.
pub fn analyze_batch<I>(artifacts: I) -> Vec<Row>
where
    I: IntoIterator<Item = (String, Vec<u8>)>,
{
    artifacts.into_iter().map(|(name, bytes)| {
        match analyze_one(&bytes) {
            Ok(summary) => Row { name, summary: Some(summary), error: None    },
            Err(e)      => Row { name, summary: None,          error: Some(e.to_string()) },
        }
    }).collect()
}

/// Fixed-column table, one row per artifact, ratios rendered as
/// percentages as in the reference reports.
pub fn csv<W: Write>(rows: &[Row], mut w: W) -> Result<(), Error> {
    writeln!(w, "{}", COLUMNS.join(","))?;

    for row in rows {
        match (&row.summary, &row.error) {
            (Some(s), _) => writeln!(
                w,
                "{},{},{},{},{:.2},{},{:.2}%,{},{:.2}%,{},{},{},",
                field(&row.name),
                s.total_packets,
                s.total_flows,
                s.total_bidirectional_flows,
                s.avg_packet_length,
                s.tcp_count,
                s.tcp_ratio * 100.0,
                s.udp_count,
                s.udp_ratio * 100.0,
                s.tcp_handshake_packets,
                s.completed_tcp_handshakes,
                s.skipped_records,
            )?,
            (None, Some(e)) => writeln!(
                w,
                "{},,,,,,,,,,,,{}",
                field(&row.name),
                field(e),
            )?,
            (None, None) => writeln!(w, "{},,,,,,,,,,,,", field(&row.name))?,
        }
    }

    Ok(())
}

fn field(s: &str) -> String {
    match s.contains(',') || s.contains('"') {
        true  => format!("\"{}\"", s.replace('"', "\"\"")),
        false => s.to_string(),
    }
}
