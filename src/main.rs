// SPDX-FileCopyrightText: © 2024 Tenstorrent Inc.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use aiclk::aiclk_core::{ArbMax, ArbMin};
use aiclk::aiclk_if::msg::REQUEST_MSG_LEN;
use aiclk::aiclk_if::{AiclkMsg, BoardConfig, Response, TelemetrySnapshot};
use aiclk::aiclk_ref::error::SimError;
use aiclk::aiclk_ref::{LoadModel, SimBoard};
use aiclk::Simulation;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};

/// Runs the AICLK governor against a simulated board.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CommandLineArguments {
    /// Board configuration (.yaml, .yml or .json), defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// AICLK the board boots at, MHz
    #[arg(long, default_value_t = 800, global = true)]
    boot_aiclk: u32,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the control loop and print governor telemetry as JSON lines
    Simulate(SimulateArgs),
    /// Send raw request words to a freshly booted governor
    Message {
        /// Request words, decimal or 0x prefixed hex
        #[arg(required = true, value_parser = parse_word)]
        words: Vec<u32>,
    },
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Number of DVFS ticks to run
    #[arg(short, long, default_value_t = 1000)]
    ticks: usize,

    /// Print telemetry every N ticks
    #[arg(short, long, default_value_t = 100)]
    print_every: usize,

    /// Cable power limit reported by the board controller, W
    #[arg(long)]
    power_limit: Option<u16>,

    /// Constant board input power, W; derived from AICLK when omitted
    #[arg(long)]
    input_power: Option<u16>,

    /// Board power drawn independent of AICLK, W
    #[arg(long, default_value_t = 50.0)]
    idle_power: f32,

    /// Vcore power per GHz per V², W
    #[arg(long, default_value_t = 400.0)]
    dynamic_coeff: f32,

    /// ASIC temperature, °C
    #[arg(long, default_value_t = 60.0)]
    asic_temp: f32,

    /// GDDR temperature, °C
    #[arg(long, default_value_t = 55.0)]
    gddr_temp: f32,

    /// Hold the busy floor at fmax
    #[arg(long, default_value_t = false)]
    busy: bool,

    /// Force AICLK to this frequency, MHz
    #[arg(long)]
    force: Option<u32>,

    /// Take a max arbiter (e.g. thm, doppler_slow) out of the resolution; its throttler keeps running
    #[arg(long = "disable-arb", value_name = "NAME")]
    disable_arb: Vec<ArbMax>,

    /// Take a min arbiter (fmin, busy) out of the resolution
    #[arg(long = "disable-min-arb", value_name = "NAME")]
    disable_min_arb: Vec<ArbMin>,
}

fn parse_word(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };

    parsed.map_err(|err| format!("{value} is not a request word: {err}"))
}

#[derive(Serialize)]
struct MessageResult {
    status: u8,
    response: Response,
}

fn simulate(
    config: &BoardConfig,
    boot_aiclk: u32,
    args: SimulateArgs,
) -> Result<(), SimError> {
    let mut board = SimBoard::new(boot_aiclk, &config.chip_limits);
    board.telemetry = TelemetrySnapshot {
        asic_temperature: args.asic_temp,
        gddr_temperature: args.gddr_temp,
        input_power: args.input_power.unwrap_or_default(),
        ..Default::default()
    };
    if args.input_power.is_none() {
        board = board.with_load(LoadModel {
            idle_power: args.idle_power,
            dynamic_coeff: args.dynamic_coeff,
        });
    }

    let mut sim = Simulation::new(board, config)?;

    for arb in &args.disable_arb {
        info!("max arbiter {arb} disabled");
        sim.dvfs_mut().enable_arb_max(*arb, false);
    }
    for arb in &args.disable_min_arb {
        info!("min arbiter {arb} disabled");
        sim.dvfs_mut().enable_arb_min(*arb, false);
    }

    if let Some(limit) = args.power_limit {
        sim.board_power_limit(&limit.to_le_bytes())?;
    }
    if args.busy {
        sim.request(&AiclkMsg::AiclkGoBusy.to_request());
    }
    if let Some(freq) = args.force {
        let (status, _) = sim.request(&AiclkMsg::ForceAiclk { freq }.to_request());
        if status != 0 {
            return Err(SimError::Custom(format!(
                "governor rejected forced AICLK of {freq} MHz"
            )));
        }
    }

    let print_every = args.print_every.max(1);
    for tick in 1..=args.ticks {
        sim.step();

        if tick % print_every == 0 || tick == args.ticks {
            let line = serde_json::to_string(&sim.telemetry())
                .map_err(|err| SimError::Custom(err.to_string()))?;
            println!("{line}");
        }
    }

    info!(
        aiclk = sim.board().aiclk(),
        voltage = sim.board().voltage(),
        "simulation finished after {} ticks",
        args.ticks
    );

    Ok(())
}

fn message(config: &BoardConfig, boot_aiclk: u32, words: &[u32]) -> Result<(), SimError> {
    if words.len() > REQUEST_MSG_LEN {
        return Err(SimError::Custom(format!(
            "a request holds at most {REQUEST_MSG_LEN} words, got {}",
            words.len()
        )));
    }

    let mut request = [0; REQUEST_MSG_LEN];
    for (slot, word) in request.iter_mut().zip(words) {
        *slot = *word;
    }

    let board = SimBoard::new(boot_aiclk, &config.chip_limits);
    let mut sim = Simulation::new(board, config)?;

    let (status, response) = sim.request(&request);
    let line = serde_json::to_string(&MessageResult { status, response })
        .map_err(|err| SimError::Custom(err.to_string()))?;
    println!("{line}");

    Ok(())
}

fn main() -> Result<(), SimError> {
    let args = CommandLineArguments::parse();

    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => BoardConfig::load(path)?,
        None => BoardConfig::default(),
    };

    match args.command {
        Command::Simulate(sim) => simulate(&config, args.boot_aiclk, sim),
        Command::Message { words } => message(&config, args.boot_aiclk, &words),
    }
}
