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
use std::{path::PathBuf, time::Duration};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use payless::{
    algorithm::{parse_algorithm, AlgorithmKind},
    config::{MonitorConfig, Parameters},
    framework::MonitoringFramework,
    sim::{Scenario, SimulatedNetwork},
    util, Tau,
};

/// Run monitoring experiments on a simulated network.
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Path to the scenario file.
    scenario_file: PathBuf,
    /// The monitoring algorithms to use.
    #[arg(required = true, value_parser = parse_algorithm)]
    algorithms: Vec<AlgorithmKind>,
    /// The file in which to write the monitored stats.
    #[arg(short, long, default_value = "stats.json")]
    out: PathBuf,
    /// Number of runs per algorithm.
    #[arg(long, default_value_t = 1)]
    runs: usize,
    /// Minimum value for tau in milliseconds.
    #[arg(long, env = "PAYLESS_TAU_MIN", default_value_t = 500)]
    payless_tau_min: Tau,
    /// Maximum value for tau in milliseconds.
    #[arg(long, env = "PAYLESS_TAU_MAX", default_value_t = 5000)]
    payless_tau_max: Tau,
    /// Factor by which tau grows for quiet flows.
    #[arg(long, env = "PAYLESS_ALPHA", default_value_t = 2)]
    payless_alpha: u64,
    /// Divisor by which tau shrinks for busy flows.
    #[arg(long, env = "PAYLESS_BETA", default_value_t = 6)]
    payless_beta: u64,
    /// Flows with less bytes per poll are polled less often.
    #[arg(long, env = "PAYLESS_DELTA_1", default_value_t = 1_000_000)]
    payless_delta_1: u64,
    /// Flows with more bytes per poll are polled more often.
    #[arg(long, env = "PAYLESS_DELTA_2", default_value_t = 1_000_000)]
    payless_delta_2: u64,
    /// Polling interval of the periodic baselines in milliseconds.
    #[arg(long, default_value_t = 1000)]
    polling_interval: u64,
    /// Interval in milliseconds at which payless picks up flows it was not told about.
    #[arg(long, default_value_t = 1000)]
    reconcile_interval: u64,
    /// Seconds to keep monitoring after the scenario ended.
    #[arg(long, default_value_t = 15)]
    linger: u64,
}

impl Args {
    fn config(&self, stats_file: PathBuf) -> MonitorConfig {
        MonitorConfig {
            parameters: Parameters {
                tau_min: self.payless_tau_min,
                tau_max: self.payless_tau_max,
                alpha: self.payless_alpha,
                beta: self.payless_beta,
                delta_1: self.payless_delta_1,
                delta_2: self.payless_delta_2,
            },
            polling_interval: Duration::from_millis(self.polling_interval),
            reconcile_interval: Duration::from_millis(self.reconcile_interval),
            stats_file,
            ..Default::default()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    util::init_logging();
    let args = Args::parse();

    let scenario = Scenario::from_file(&args.scenario_file)?;
    log::info!(
        "Loaded scenario with {} switches and {} flows, lasting {:?}",
        scenario.switches.len(),
        scenario.flows.len(),
        scenario.duration()
    );

    let bar = ProgressBar::new((args.algorithms.len() * args.runs) as u64);
    bar.set_style(ProgressStyle::with_template("{wide_bar} {pos}/{len} time: {elapsed}, {msg} ")?);
    bar.tick();

    'experiments: for kind in args.algorithms.iter() {
        log::info!("Performing experiment for algorithm {kind}");
        for run in 0..args.runs {
            let stats_file = util::run_output(
                &args.out,
                (args.algorithms.len() > 1).then(|| kind.to_string()).as_deref(),
                (args.runs != 1).then_some(run),
            );
            bar.set_message(format!("{kind} run {run}"));

            let mut scenario = scenario.clone();
            scenario.seed = scenario.seed.wrapping_add(run as u64);
            let (net, events) = SimulatedNetwork::new(scenario)?;
            let framework = MonitoringFramework::new(*kind, args.config(stats_file), net.clone())?;
            let linger = Duration::from_secs(args.linger);

            // one runtime per run, such that no task of a previous run survives
            let interrupted = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(async {
                    let mut interrupted = false;
                    let until = async {
                        tokio::select! {
                            _ = async {
                                net.play().await;
                                tokio::time::sleep(linger).await;
                            } => {}
                            _ = tokio::signal::ctrl_c() => {
                                log::warn!("Interrupted, stopping the experiment");
                                interrupted = true;
                            }
                        }
                    };
                    framework.run(events, until).await;
                    interrupted
                });

            log::info!(
                "{kind} run {run}: {} statistics requests",
                framework.overhead()
            );
            bar.inc(1);
            if interrupted {
                break 'experiments;
            }
        }
    }
    bar.finish();

    Ok(())
}
