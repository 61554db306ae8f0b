//! MeshNet simulator
//!
//! Runs a scenario and serves the master's serial link over TCP.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use meshnet_common::SystemClock;
use meshnet_packet::MASTER_ADDR;
use meshnet_runner::{RunnerError, Scenario, Simulation, SyncUartManager};

/// MeshNet simulator - runs a master and its nodes over a simulated mesh.
#[derive(Parser, Debug)]
#[command(name = "meshnet")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a scenario until interrupted
    Simulate {
        /// Scenario file (YAML)
        #[arg(long, short, value_name = "FILE")]
        scenario: PathBuf,

        /// TCP port carrying the master's serial link
        #[arg(long, short, default_value = "4000")]
        port: u16,

        /// Loop period in milliseconds (overrides the scenario)
        #[arg(long)]
        tick_ms: Option<u64>,

        /// Stop after this many seconds
        #[arg(long)]
        duration_secs: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| if cli.verbose { "debug" } else { "info" }.to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();
    meshnet_metrics::describe_metrics();

    let result = match cli.command {
        Commands::Simulate {
            scenario,
            port,
            tick_ms,
            duration_secs,
        } => simulate(scenario, port, tick_ms, duration_secs),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn simulate(
    path: PathBuf,
    port: u16,
    tick_ms: Option<u64>,
    duration_secs: Option<u64>,
) -> Result<(), RunnerError> {
    tracing::info!("Loading scenario {:?}", path);
    let mut scenario = Scenario::load(&path)?;
    if let Some(tick_ms) = tick_ms {
        scenario.tick_ms = tick_ms;
    }
    scenario.validate()?;

    let runtime = tokio::runtime::Runtime::new()?;
    let mut uart = SyncUartManager::new(runtime.handle().clone());
    uart.register_node(
        MASTER_ADDR,
        scenario.master.name.clone(),
        "master".to_string(),
        Some(port),
    );
    for node in &scenario.nodes {
        uart.register_node(node.address, node.name.clone(), "node".to_string(), None);
    }
    uart.start()?;

    let serial = uart
        .serial_port(MASTER_ADDR)
        .ok_or_else(|| RunnerError::scenario("master serial port was not started"))?;
    let mut sim = Simulation::new(&scenario, serial, SystemClock::new())?;
    uart.print_node_table();

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })?;

    tracing::info!(
        "Running {} nodes every {} ms, Ctrl-C to stop",
        scenario.nodes.len(),
        scenario.tick_ms
    );
    sim.run(
        Duration::from_millis(scenario.tick_ms),
        duration_secs.map(Duration::from_secs),
        &stop,
    );
    Ok(())
}
