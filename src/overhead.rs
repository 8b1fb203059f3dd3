// PAYLESS: Adaptive Flow Statistics Polling for Software-Defined Networks
// Copyright (C) 2024-2025 The Payless Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//! Extract the monitoring overhead over time from statistics files into a CSV.

use std::path::PathBuf;

use clap::Parser;
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use serde::Serialize;

use payless::{
    export::{OverheadMode, StatsSnapshot},
    util,
};
use payless_utils::other::get_timestamp;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Statistics files written by the monitoring runs.
    #[arg(required = true)]
    stats_files: Vec<PathBuf>,
    /// Output file. Defaults to `overhead_<timestamp>.csv`.
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Either `cumulative` (total requests so far) or `relative` (requests per interval).
    #[arg(short, long, default_value_t = OverheadMode::Cumulative)]
    mode: OverheadMode,
}

#[derive(Debug, Serialize)]
struct Record<'a> {
    file: &'a str,
    algorithm: &'a str,
    second: u64,
    requests: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();
    let args = Args::parse();

    let snapshots: Vec<(String, StatsSnapshot)> = args
        .stats_files
        .par_iter()
        .progress_count(args.stats_files.len() as u64)
        .filter_map(|path| match StatsSnapshot::read(path) {
            Ok(snap) => Some((path.display().to_string(), snap)),
            Err(e) => {
                log::error!("Skipping {}: {e}", path.display());
                None
            }
        })
        .collect();

    let out = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("overhead_{}.csv", get_timestamp())));
    let mut csv_writer = csv::Writer::from_path(&out)?;
    for (file, snap) in snapshots.iter() {
        let series = snap.overhead_series(args.mode);
        log::info!(
            "{file} ({}): {} requests in {} seconds",
            snap.algorithm,
            snap.final_overhead(),
            series.last().map(|(s, _)| *s).unwrap_or_default()
        );
        for (second, requests) in series {
            csv_writer.serialize(Record {
                file,
                algorithm: &snap.algorithm,
                second,
                requests,
            })?;
        }
    }
    csv_writer.flush()?;
    log::info!("Wrote {} overhead to {out:?}", args.mode);

    Ok(())
}
