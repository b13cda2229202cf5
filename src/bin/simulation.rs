//! Production Line Sensor Simulation
//!
//! Generates JSON payloads for testing linewatch:
//! - Electrical device: running cycles of three-phase current with an inrush
//!   transient, completed by an idle reading or aborted by a synch pulse
//! - Vibration sensor: per-axis RMS acceleration readings
//!
//! Faults are injected at a configurable rate so the detectors have
//! something to find.
//!
//! # Usage
//! ```bash
//! ./simulation electrical --cycles 200 | ./linewatch electrical --stdin --dry-run
//! ./simulation vibration --readings 1000 --seed 7 > vibration.jsonl
//! ```

use clap::{Parser, Subcommand};
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use serde_json::json;
use std::io::{self, Write};
use std::time::Duration;

// ============================================================================
// Signal Constants
// ============================================================================

/// Steady-state phase current amplitude (A)
const BASE_CURRENT: f64 = 10.0;
/// Inrush peak as a multiple of the steady-state amplitude
const INRUSH_FACTOR: f64 = 4.0;
/// Inrush decay time constant (samples)
const INRUSH_DECAY_SAMPLES: f64 = 6.0;
/// Mains periods per running reading
const PERIODS_PER_READING: f64 = 2.0;
/// Phase current multiplier on a faulty cycle
const FAULT_CURRENT_FACTOR: f64 = 1.35;
/// Baseline per-axis RMS acceleration (g)
const BASE_VIBRATION: [f64; 3] = [0.42, 0.37, 0.55];
/// Axis RMS multiplier on a faulty reading
const FAULT_VIBRATION_FACTOR: f64 = 3.0;
/// Simulated time between readings (ms)
const READING_PERIOD_MS: i64 = 100;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "linewatch-simulation")]
#[command(about = "Sensor payload simulation for linewatch testing")]
#[command(version = "1.0")]
struct Args {
    #[command(subcommand)]
    kind: Kind,

    #[arg(long, global = true, default_value = "L1")]
    line: String,

    #[arg(long, global = true, default_value = "press-01")]
    machine: String,

    /// Device or sensor name
    #[arg(long, global = true, default_value = "drive-1")]
    name: String,

    /// Probability that a cycle / reading is faulty
    #[arg(long, global = true, default_value = "0.05")]
    fault_rate: f64,

    /// Real-time delay between emitted lines (ms, 0 = as fast as possible)
    #[arg(long, global = true, default_value = "0")]
    interval_ms: u64,

    /// Random seed for reproducibility
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Suppress mission log (only output payloads)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Kind {
    /// Three-phase current cycles
    Electrical {
        /// Number of cycles to run
        #[arg(long, default_value = "100")]
        cycles: u32,

        /// Running readings per cycle
        #[arg(long, default_value = "5")]
        readings_per_cycle: u32,

        /// Samples per phase in each reading
        #[arg(long, default_value = "20")]
        samples: u32,

        /// Probability that a cycle is aborted by a synch pulse
        #[arg(long, default_value = "0.02")]
        abort_rate: f64,
    },
    /// Per-axis vibration RMS readings
    Vibration {
        /// Number of readings
        #[arg(long, default_value = "1000")]
        readings: u32,
    },
}

// ============================================================================
// Simulation State
// ============================================================================

struct SimulationState {
    rng: StdRng,
    timestamp_ms: i64,
    line: String,
    machine: String,
    name: String,
    fault_rate: f64,

    // Statistics
    lines_emitted: u64,
    faults_injected: u64,
    cycles_aborted: u64,

    noise: Normal<f64>,
}

impl SimulationState {
    fn new(args: &Args) -> Result<Self, Box<dyn std::error::Error>> {
        let rng = match args.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            rng,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            line: args.line.clone(),
            machine: args.machine.clone(),
            name: args.name.clone(),
            fault_rate: args.fault_rate.clamp(0.0, 1.0),
            lines_emitted: 0,
            faults_injected: 0,
            cycles_aborted: 0,
            noise: Normal::new(0.0, 0.02)?,
        })
    }

    fn next_timestamp(&mut self) -> i64 {
        self.timestamp_ms += READING_PERIOD_MS;
        self.timestamp_ms
    }

    fn roll_fault(&mut self) -> bool {
        let fault = self.rng.gen_bool(self.fault_rate);
        if fault {
            self.faults_injected += 1;
        }
        fault
    }

    /// One phase's samples for reading `reading` of a cycle.
    fn phase_samples(&mut self, phase: usize, reading: u32, samples: u32, amplitude: f64) -> Vec<f64> {
        let offset = phase as f64 * 2.0 * std::f64::consts::PI / 3.0;
        (0..samples)
            .map(|i| {
                let n = f64::from(reading * samples + i);
                let t = n / f64::from(samples) * PERIODS_PER_READING;
                let envelope = 1.0 + (INRUSH_FACTOR - 1.0) * (-n / INRUSH_DECAY_SAMPLES).exp();
                let wave = (2.0 * std::f64::consts::PI * t + offset).sin().abs();
                let value = amplitude * envelope * wave * (1.0 + self.noise.sample(&mut self.rng));
                (value * 1000.0).round() / 1000.0
            })
            .collect()
    }

    fn electrical_payload(&mut self, state: &str, synch: bool, currents: [Vec<f64>; 3]) -> serde_json::Value {
        let [l1, l2, l3] = currents;
        json!({
            "LineName": self.line,
            "MachineName": self.machine,
            "DeviceName": self.name,
            "DeviceState": state,
            "SynchPulse": synch,
            "TimeStamp": self.next_timestamp(),
            "ElectricalData": { "CurrentL1": l1, "CurrentL2": l2, "CurrentL3": l3 }
        })
    }

    /// Running readings of one cycle, then the reading that ends it.
    fn electrical_cycle(&mut self, readings: u32, samples: u32, abort_rate: f64) -> Vec<serde_json::Value> {
        let fault = self.roll_fault();
        let mut payloads = Vec::with_capacity(readings as usize + 1);

        for reading in 0..readings {
            let currents = std::array::from_fn(|phase| {
                // a faulty cycle overloads phase 3, which also skews asymmetry
                let amplitude = if fault && phase == 2 {
                    BASE_CURRENT * FAULT_CURRENT_FACTOR
                } else {
                    BASE_CURRENT
                };
                self.phase_samples(phase, reading, samples, amplitude)
            });
            payloads.push(self.electrical_payload("Running", false, currents));
        }

        let aborted = self.rng.gen_bool(abort_rate.clamp(0.0, 1.0));
        if aborted {
            self.cycles_aborted += 1;
        }
        payloads.push(self.electrical_payload("Idle", aborted, [Vec::new(), Vec::new(), Vec::new()]));
        payloads
    }

    fn vibration_reading(&mut self) -> serde_json::Value {
        let factor = if self.roll_fault() { FAULT_VIBRATION_FACTOR } else { 1.0 };
        let [x, y, z] = BASE_VIBRATION.map(|base| {
            let value = base * factor * (1.0 + self.noise.sample(&mut self.rng) * 2.5);
            (value * 10_000.0).round() / 10_000.0
        });
        json!({
            "LineName": self.line,
            "MachineName": self.machine,
            "SensorName": self.name,
            "VibAccelTotRmsX": x,
            "VibAccelTotRmsY": y,
            "VibAccelTotRmsZ": z,
            "TimeStamp": self.next_timestamp()
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn log_mission(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("[sim] {}", message);
    }
}

fn emit(
    out: &mut impl Write,
    state: &mut SimulationState,
    payload: &serde_json::Value,
    interval_ms: u64,
) -> io::Result<()> {
    writeln!(out, "{}", payload)?;
    out.flush()?;
    state.lines_emitted += 1;
    if interval_ms > 0 {
        std::thread::sleep(Duration::from_millis(interval_ms));
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut state = SimulationState::new(&args)?;

    log_mission(&"=".repeat(60), args.quiet);
    log_mission("LINEWATCH SENSOR SIMULATION", args.quiet);
    log_mission(&"=".repeat(60), args.quiet);
    log_mission(&format!("  Line / Machine: {} / {}", args.line, args.machine), args.quiet);
    log_mission(&format!("  Source: {}", args.name), args.quiet);
    log_mission(&format!("  Fault rate: {:.1}%", state.fault_rate * 100.0), args.quiet);
    if let Some(seed) = args.seed {
        log_mission(&format!("  Random seed: {}", seed), args.quiet);
    }
    log_mission(&"=".repeat(60), args.quiet);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match args.kind {
        Kind::Electrical {
            cycles,
            readings_per_cycle,
            samples,
            abort_rate,
        } => {
            for cycle in 1..=cycles {
                for payload in state.electrical_cycle(readings_per_cycle, samples, abort_rate) {
                    emit(&mut out, &mut state, &payload, args.interval_ms)?;
                }
                if cycle % 25 == 0 {
                    log_mission(
                        &format!(
                            "Progress: {}/{} cycles | faults: {} | aborted: {}",
                            cycle, cycles, state.faults_injected, state.cycles_aborted
                        ),
                        args.quiet,
                    );
                }
            }
        }
        Kind::Vibration { readings } => {
            for reading in 1..=readings {
                let payload = state.vibration_reading();
                emit(&mut out, &mut state, &payload, args.interval_ms)?;
                if reading % 250 == 0 {
                    log_mission(
                        &format!(
                            "Progress: {}/{} readings | faults: {}",
                            reading, readings, state.faults_injected
                        ),
                        args.quiet,
                    );
                }
            }
        }
    }

    out.flush()?;

    log_mission(&"=".repeat(60), args.quiet);
    log_mission("SIMULATION COMPLETE", args.quiet);
    log_mission(&format!("Lines emitted: {}", state.lines_emitted), args.quiet);
    log_mission(&format!("Faults injected: {}", state.faults_injected), args.quiet);
    log_mission(&format!("Cycles aborted: {}", state.cycles_aborted), args.quiet);
    log_mission(&"=".repeat(60), args.quiet);

    Ok(())
}
