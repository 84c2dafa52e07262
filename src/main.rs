use anyhow::{Context, bail};
use clap::Parser;
use env_logger::{Builder, Target};
use log::{LevelFilter, error, info, warn};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::coexistence::{ControlEventQueue, ModeControlLoop, bind_commands};
use crate::common::{ChannelMap, SolutionConfig, TestbedConfig};
use crate::control::{CommandDispatcher, ControllerProxy, ReportSink, SolutionIdentity};
use crate::testbed::{DryRunTestbed, MacManager};

mod coexistence;
mod common;
mod control;
mod telemetry;
mod testbed;

const SOLUTION_CONFIG_FILE: &str = "solution.toml";

/// WiSHFUL Zigbee solution: interference-aware channel and traffic control.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Directory holding solution.toml, global_config.yaml, nodes.yaml and the channel mapping CSV
    #[arg(long, value_name = "DIR")]
    config: PathBuf,

    /// Log debug messages
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    /// Write the log to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    logfile: Option<PathBuf>,
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else if cli.quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    };

    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::Warn)
        .filter(Some("zigbee_solution"), level)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.module_path().unwrap_or("zigbee_solution"),
                record.level(),
                record.args()
            )
        });
    if let Some(path) = &cli.logfile {
        let file = File::create(path).with_context(|| format!("cannot create log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn load_channel_targets(config: &SolutionConfig, config_dir: &Path) -> anyhow::Result<Vec<u32>> {
    let mapping = ChannelMap::load(&config_dir.join(&config.control_loop.channel_mapping))?;
    let channel = config.control_loop.interfering_channel;
    match mapping.targets(channel) {
        Some(targets) => {
            info!("Interfering channel {} maps to {:?}", channel, targets);
            Ok(targets.to_vec())
        }
        None => bail!("channel mapping has no entry for interfering channel {}", channel),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    info!("Starting up");

    let config = SolutionConfig::load_or_default(&cli.config.join(SOLUTION_CONFIG_FILE))?;
    let testbed_config = TestbedConfig::load(&cli.config)?;
    let channel_targets = load_channel_targets(&config, &cli.config)?;

    let control_events: &'static ControlEventQueue = Box::leak(Box::new(ControlEventQueue::new()));
    let mut dispatcher = CommandDispatcher::new();
    bind_commands(&mut dispatcher, control_events.sender(), channel_targets);

    let identity = SolutionIdentity {
        network_name: config.solution.network_name.clone(),
        solution_name: config.solution.solution_name.clone(),
        command_list: dispatcher.command_names(),
        event_list: config.solution.event_list.clone(),
    };
    let proxy = Arc::new(ControllerProxy::new(identity, config.controller.clone()));

    let mut listener_started = false;
    match proxy.connect() {
        Ok(()) => {
            if proxy.register() {
                proxy
                    .start_command_listener(dispatcher)
                    .context("cannot start the command listener")?;
                listener_started = true;
            } else {
                error!("Registration failed, running without commands from the solution controller");
            }
        }
        Err(err) => error!("Cannot reach the solution controller ({}), running without it", err),
    }

    let mut testbed = DryRunTestbed::from_config(&testbed_config);
    let reports: Arc<dyn ReportSink> = proxy.clone();
    testbed
        .subscribe_mac_stats(telemetry::monitor_reporter(config.telemetry.clone(), reports.clone()))
        .context("cannot subscribe to MAC statistics")?;

    let mut control_loop =
        ModeControlLoop::new(testbed, config.control_loop.clone(), control_events.receiver()).with_report_sink(reports);
    control_loop.configure().context("initial TSCH configuration failed")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = shutdown.clone();
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst)).context("cannot install Ctrl-C handler")?;

    control_loop.run(&shutdown);

    if listener_started && !proxy.is_listening() {
        warn!("Command listener had already stopped");
    }
    proxy.shutdown();
    info!("Shut down");
    Ok(())
}
