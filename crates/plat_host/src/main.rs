mod config;
mod csr;
mod error;
mod generator;
mod local_mem;
mod poll;
mod sim;
mod stats;
mod verify;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use config::HarnessConfig;
use csr::CsrManager;
use plat_common::test_data::ATOMIC_NUM_UPDATES;
use plat_core::atomic_check::AtomicWidth;
use plat_io::parser::parse_u64;
use sim::{SimConfig, SimulatedAfu};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Platform interface test-data tools and local memory test harness")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the expected hash for a generated sequence
    Gen {
        #[arg(long, default_value_t = 64)]
        bytes: usize,
        #[arg(long, value_parser = parse_u64, default_value = "0xf00")]
        seed: u64,
        #[arg(long, default_value_t = 1)]
        count: usize,
        /// Also write the generated vectors to this file
        #[arg(long)]
        dump: Option<String>,
    },
    /// Check a readback dump against the generator
    Check {
        #[arg(short, long)]
        dump: String,
        #[arg(long, default_value_t = 64)]
        bytes: usize,
        #[arg(long, value_parser = parse_u64, default_value = "0xf00")]
        seed: u64,
        /// Print the host channel read hash of the dump instead
        #[arg(long)]
        lines: bool,
        #[arg(long, default_value_t = 1)]
        burst_size: usize,
        /// Check host channel writes stamped from this IOVA instead
        #[arg(long, value_parser = parse_u64)]
        iova: Option<u64>,
        #[arg(long)]
        num_lines: Option<usize>,
        /// Check an atomic run of this entry width (32 or 64) instead.
        /// The dump is the atomic buffer.
        #[arg(long)]
        atomic: Option<u32>,
        /// Write-back buffer dump of the atomic run
        #[arg(long)]
        wb: Option<String>,
        #[arg(long, default_value_t = ATOMIC_NUM_UPDATES)]
        num_updates: usize,
    },
    /// Recompute every hash in a golden vector file
    Verify {
        #[arg(short, long)]
        golden: String,
    },
    /// Run the local memory test on the simulated AFU
    Sweep {
        #[arg(long, default_value_t = 2)]
        engines: u32,
        #[arg(long, default_value_t = 64)]
        width: u32,
        #[arg(long, default_value_t = 16)]
        max_burst: u32,
        #[arg(long)]
        natural_bursts: bool,
        /// Use RTL simulation (ASE) timing
        #[arg(long)]
        ase: bool,
        #[arg(long)]
        poll_ms: Option<u64>,
        #[arg(long)]
        max_polls: Option<u32>,
        /// Bandwidth run time per measurement
        #[arg(long)]
        run_ms: Option<u64>,
        /// Engine that never finishes
        #[arg(long)]
        stall: Option<u32>,
        /// Engine that corrupts the first line it writes
        #[arg(long)]
        corrupt: Option<u32>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Gen {
            bytes,
            seed,
            count,
            dump,
        } => {
            generator::generate(bytes, seed, count, dump.as_deref())?;
        }
        Commands::Check {
            dump,
            bytes,
            seed,
            lines,
            burst_size,
            iova,
            num_lines,
            atomic,
            wb,
            num_updates,
        } => {
            if let Some(bits) = atomic {
                let Some(width) = AtomicWidth::from_bits(bits) else {
                    bail!("--atomic must be 32 or 64, got {}", bits);
                };
                let Some(wb) = wb else {
                    bail!("--atomic needs --wb");
                };
                if !generator::check_atomic(&dump, &wb, width, num_updates)? {
                    bail!("atomic buffers check failed");
                }
            } else if let Some(iova) = iova {
                let Some(num_lines) = num_lines else {
                    bail!("--iova needs --num-lines");
                };
                if !generator::check_written(&dump, iova, num_lines)? {
                    bail!("written lines check failed");
                }
            } else if lines {
                generator::line_hash(&dump, burst_size)?;
            } else if !generator::check_dump(&dump, bytes, seed)? {
                bail!("dump does not match the generator");
            }
        }
        Commands::Verify { golden } => {
            let mismatches = verify::run_verify(&golden)?;
            if mismatches > 0 {
                bail!("{} golden vectors mismatched", mismatches);
            }
        }
        Commands::Sweep {
            engines,
            width,
            max_burst,
            natural_bursts,
            ase,
            poll_ms,
            max_polls,
            run_ms,
            stall,
            corrupt,
        } => {
            let mut config = HarnessConfig::new(ase);
            if let Some(ms) = poll_ms {
                config = config.with_poll_interval(Duration::from_millis(ms));
            }
            if let Some(n) = max_polls {
                config = config.with_max_polls(n);
            }
            if let Some(ms) = run_ms {
                config = config.with_run_time(Duration::from_millis(ms));
            }

            let sim_config = SimConfig {
                num_engines: engines,
                data_byte_width: width,
                max_burst_size: max_burst,
                natural_bursts,
                ..SimConfig::default()
            }
            .validate()?;
            let mut csr = CsrManager::new(SimulatedAfu::new(sim_config));
            if let Some(eng) = stall {
                csr.backend_mut().stall_engine(eng, true);
            }
            if let Some(eng) = corrupt {
                csr.backend_mut().corrupt_engine(eng, true);
            }

            let afu = csr.backend().config();
            println!(
                "Simulated AFU: {} engines, {} MHz{}",
                afu.num_engines,
                afu.clock_mhz,
                if config.simulation { " (ASE timing)" } else { "" }
            );
            let (id_high, id_low) = csr.afu_id()?;
            println!("AFU ID: {:016x}{:016x}", id_high, id_low);

            let stats = local_mem::run_local_mem_test(&mut csr, &config)?;
            stats.print_report();
            if stats.failed > 0 {
                bail!("{} local memory runs failed", stats.failed);
            }
        }
    }
    Ok(())
}
