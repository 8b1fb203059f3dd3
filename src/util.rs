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
//! Utility module collection of functions

use std::path::{Path, PathBuf};

/// Initialize logging from `log4rs.yml`, or from `RUST_LOG` if that file cannot be used.
pub fn init_logging() {
    if let Err(e) = log4rs::init_file("log4rs.yml", Default::default()) {
        pretty_env_logger::init();
        log::warn!("Cannot use log4rs.yml ({e}), logging to stderr");
    }
}

/// Statistics file of one run, next to `base`. The file name of `base` is prefixed with the run
/// number and the algorithm name, if given: `<algorithm>-<run>-<file name>`.
pub fn run_output(base: impl AsRef<Path>, algorithm: Option<&str>, run: Option<usize>) -> PathBuf {
    let base = base.as_ref();
    let mut file_name = base
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "stats.json".to_string());
    if let Some(run) = run {
        file_name = format!("{run}-{file_name}");
    }
    if let Some(algorithm) = algorithm {
        file_name = format!("{algorithm}-{file_name}");
    }
    base.with_file_name(file_name)
}
