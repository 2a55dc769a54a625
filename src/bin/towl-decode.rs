//! # TOWL Decoder
//!
//! Reads collection-server log lines on stdin and prints every telemetry
//! record found in TOWL query names as one JSON object per line.
//!
//! ```bash
//! tail -f /var/log/named/queries.log | towl-decode dns.example.com
//! ```
//!
//! Resolvers retry and log the same lookup more than once; each distinct query
//! name is decoded only once.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use towl::config::SUBDOMAIN;
use towl::dns::decoder::{decode_query_name, find_query_names};
use towl::store::TelemetryRecord;

/// One output line
#[derive(Debug, Serialize)]
struct RecordLine<'a> {
    device_id: &'a str,
    #[serde(flatten)]
    record: &'a TelemetryRecord,
    latitude: f64,
    longitude: f64,
    hdop: Option<f32>,
    elapsed_s: i64,
}

/// Totals for one decoding run
#[derive(Debug, Default, PartialEq, Eq)]
struct DecodeSummary {
    queries: usize,
    records: usize,
    duplicates: usize,
    rejected: usize,
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays pure JSON Lines
    let (writer, _guard) = tracing_appender::non_blocking(io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(writer)
        .init();

    let subdomain = std::env::args().nth(1).unwrap_or_else(|| SUBDOMAIN.to_string());
    info!("Decoding TOWL queries under {}", subdomain);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let summary = decode_stream(stdin.lock(), stdout.lock(), &subdomain)?;

    info!(
        "Decoded {} records from {} queries ({} duplicates, {} rejected)",
        summary.records, summary.queries, summary.duplicates, summary.rejected
    );
    Ok(())
}

/// Decode every TOWL query name in `input`, writing JSON Lines to `output`
fn decode_stream<R: BufRead, W: Write>(input: R, mut output: W, subdomain: &str) -> Result<DecodeSummary> {
    let mut seen = HashSet::new();
    let mut summary = DecodeSummary::default();

    for line in input.lines() {
        let line = line.context("Failed to read input")?;

        for name in find_query_names(&line, subdomain) {
            if !seen.insert(name.to_ascii_lowercase()) {
                summary.duplicates += 1;
                debug!("Skipping repeated query {}", name);
                continue;
            }

            let decoded = match decode_query_name(name, subdomain) {
                Ok(d) => d,
                Err(e) => {
                    warn!("Rejected {}: {}", name, e);
                    summary.rejected += 1;
                    continue;
                }
            };

            summary.queries += 1;
            for record in &decoded.records {
                let out = RecordLine {
                    device_id: &decoded.device_id,
                    record,
                    latitude: record.latitude(),
                    longitude: record.longitude(),
                    hdop: record.hdop(),
                    elapsed_s: record.elapsed_seconds(),
                };
                serde_json::to_writer(&mut output, &out)?;
                writeln!(output)?;
                summary.records += 1;
            }
        }
    }

    output.flush()?;
    Ok(summary)
}
