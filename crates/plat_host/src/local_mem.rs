//! Local memory parameter test.
//!
//! Drives every local memory test engine through a sweep of small regions
//! (burst sizes, burst counts and read/write modes), comparing the hash the
//! engine computes over data it read back with the software checker. Then
//! measures bandwidth with all engines running unlimited bursts in
//! parallel.

use crate::config::HarnessConfig;
use crate::csr::{CsrBackend, CsrManager};
use crate::error::{HarnessError, Result};
use crate::poll::{wait_engines_done, wait_engines_idle, wait_engines_started};
use crate::stats::SweepStats;
use plat_common::engine;
use plat_common::test_data::LOCAL_MEM_SEED_BASE;
use plat_core::chk_gen;
use rayon::prelude::*;
use std::thread;
use tracing::{info, warn};

/// Burst counts tested for every burst size.
pub const NUM_BURSTS: [u32; 4] = [1, 3, 7, 15];

/// Static engine properties, decoded from the capability word in CSR 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineCaps {
    pub data_byte_width: u32,
    pub max_burst_size: u32,
    pub natural_bursts: bool,
    pub avalon: bool,
    pub ordered_reads: bool,
}

impl EngineCaps {
    pub fn decode(status: u64) -> Self {
        Self {
            data_byte_width: (status >> engine::CAP_DATA_WIDTH_SHIFT) as u32,
            max_burst_size: (status & engine::CAP_MAX_BURST_MASK) as u32,
            natural_bursts: (status >> engine::CAP_NATURAL_BURSTS_BIT) & 1 == 1,
            avalon: (status >> engine::CAP_ENGINE_TYPE_BIT) & 1 == 1,
            ordered_reads: (status >> engine::CAP_ORDERED_READS_BIT) & 1 == 1,
        }
    }

    pub fn print(&self, eng: u32) {
        println!("  Engine {} type: {}", eng, engine::type_name(self.avalon));
        println!("  Engine {} data byte width: {}", eng, self.data_byte_width);
        println!("  Engine {} max burst size: {}", eng, self.max_burst_size);
        println!("  Engine {} natural bursts: {}", eng, self.natural_bursts as u32);
        println!(
            "  Engine {} ordered read responses: {}",
            eng, self.ordered_reads as u32
        );
    }
}

/// Traffic directions of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Write,
    Read,
    ReadWrite,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Write, Mode::Read, Mode::ReadWrite];

    pub fn reads(self) -> bool {
        matches!(self, Mode::Read | Mode::ReadWrite)
    }

    pub fn writes(self) -> bool {
        matches!(self, Mode::Write | Mode::ReadWrite)
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Write => "Write:",
            Mode::Read => "Read: ",
            Mode::ReadWrite => "R+W:  ",
        }
    }
}

/// Burst sizes covered by the small-region sweep.
///
/// Every size up to 4, then `size * 3 + 1` capped at the maximum. Engines
/// with natural bursts only take powers of two.
pub fn burst_sizes(caps: &EngineCaps) -> Vec<u32> {
    let max = caps.max_burst_size;
    let mut sizes = Vec::new();
    let mut size = 1;
    while size <= max {
        sizes.push(size);
        size = if caps.natural_bursts {
            size << 1
        } else if size < 4 || size == max {
            size + 1
        } else {
            (size * 3 + 1).min(max)
        };
    }
    sizes
}

/// Burst sizes covered by the bandwidth test: 1 to 4, then powers of two.
pub fn bandwidth_burst_sizes(caps: &EngineCaps) -> Vec<u32> {
    let mut sizes = Vec::new();
    let mut size = 1;
    while size <= caps.max_burst_size {
        sizes.push(size);
        size = if caps.natural_bursts || size >= 4 {
            size << 1
        } else {
            size + 1
        };
    }
    sizes
}

/// One point of the small-region sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPoint {
    pub burst_size: u32,
    pub num_bursts: u32,
    /// Hash the engine must report after reading the region.
    pub expected_hash: u64,
}

/// Seed written to engine `eng` for the small-region sweep.
pub fn engine_seed(eng: u32) -> u64 {
    LOCAL_MEM_SEED_BASE + eng as u64
}

/// Computes the expected hash of every sweep point, in sweep order.
pub fn sweep_points(eng: u32, caps: &EngineCaps) -> Result<Vec<SweepPoint>> {
    let seed = engine_seed(eng);
    let byte_len = caps.data_byte_width as usize;

    let grid: Vec<(u32, u32)> = burst_sizes(caps)
        .into_iter()
        .flat_map(|bs| NUM_BURSTS.iter().map(move |&nb| (bs, nb)))
        .collect();

    grid.par_iter()
        .map(|&(burst_size, num_bursts)| -> Result<SweepPoint> {
            let count = num_bursts as usize * burst_size as usize;
            Ok(SweepPoint {
                burst_size,
                num_bursts,
                expected_hash: chk_gen(byte_len, seed, count)?,
            })
        })
        .collect()
}

/// Prints the status and counters of engine `eng`.
pub fn dump_engine_state<B: CsrBackend>(csr: &mut CsrManager<B>, eng: u32) -> Result<()> {
    let status = csr.eng_read(eng, engine::REG_STATUS)?;
    println!("  Engine {} state:", eng);
    println!("    active: {}", (status >> engine::STATUS_ACTIVE_BIT) & 1);
    println!("    running: {}", (status >> engine::STATUS_RUNNING_BIT) & 1);
    println!("    in reset: {}", (status >> engine::STATUS_IN_RESET_BIT) & 1);
    println!(
        "    waitrequest: {}",
        (status >> engine::STATUS_WAITREQUEST_BIT) & 1
    );
    println!(
        "    read burst requests: {}",
        csr.eng_read(eng, engine::REG_RD_BURSTS)?
    );
    println!(
        "    read line responses: {}",
        csr.eng_read(eng, engine::REG_RD_LINES)?
    );
    println!(
        "    write line requests: {}",
        csr.eng_read(eng, engine::REG_WR_LINES)?
    );
    Ok(())
}

/// Runs the small-region sweep on one engine.
///
/// Hash mismatches are counted in the returned stats and the sweep goes on.
/// A hung engine aborts the sweep: its state is dumped and the
/// [`HarnessError::Hang`] is returned.
pub fn test_small_regions<B: CsrBackend>(
    csr: &mut CsrManager<B>,
    eng: u32,
    caps: &EngineCaps,
    config: &HarnessConfig,
) -> Result<SweepStats> {
    println!(
        "Testing engine {}, maximum burst size {}:",
        eng, caps.max_burst_size
    );

    let mut stats = SweepStats::new();
    let mask = 1u64 << eng;

    for point in sweep_points(eng, caps)? {
        for mode in Mode::ALL {
            print!(
                "  {} {:2} bursts of {:2} lines",
                mode.label(),
                point.num_bursts,
                point.burst_size
            );

            csr.eng_write(
                eng,
                engine::REG_RD_CONFIG,
                engine::burst_config(mode.reads(), point.num_bursts, point.burst_size),
            )?;
            csr.eng_write(
                eng,
                engine::REG_WR_CONFIG,
                engine::burst_config(mode.writes(), point.num_bursts, point.burst_size),
            )?;
            csr.eng_write(eng, engine::REG_SEED, engine_seed(eng))?;
            csr.enable_engines(mask)?;

            let trips = match wait_engines_done(csr, mask, &config.poll) {
                Ok(trips) => trips,
                Err(err @ HarnessError::Hang { .. }) => {
                    println!(" - HANG!\n");
                    println!(
                        "Aborting - enabled mask 0x{:x}, active mask 0x{:x}",
                        csr.engines_enabled()?,
                        csr.engines_active()?
                    );
                    dump_engine_state(csr, eng)?;
                    return Err(err);
                }
                Err(err) => return Err(err),
            };

            csr.disable_engines(mask)?;

            let hw_hash = csr.eng_read(eng, engine::REG_RD_HASH)?;
            let checked = mode != Mode::Write;
            let passed = !checked || hw_hash == point.expected_hash;
            if passed {
                println!(" - PASS");
            } else {
                println!(" - FAIL");
                println!(
                    "  0x{:016x}, expected 0x{:016x}",
                    hw_hash, point.expected_hash
                );
                warn!(
                    eng,
                    burst_size = point.burst_size,
                    num_bursts = point.num_bursts,
                    "read hash mismatch"
                );
            }
            stats.record(passed, checked, trips);
        }
    }

    Ok(stats)
}

/// Bandwidth measured on one engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineBandwidth {
    pub eng: u32,
    pub read_gbps: f64,
    pub write_gbps: f64,
}

impl EngineBandwidth {
    pub fn print(&self, mode: Mode) {
        match mode {
            Mode::Read => println!("  [eng {}] Read GB/s:  {:.6}", self.eng, self.read_gbps),
            Mode::Write => println!("  [eng {}] Write GB/s: {:.6}", self.eng, self.write_gbps),
            Mode::ReadWrite => println!(
                "  [eng {}] R+W GB/s:   {:.6} (read {:.6}, write {:.6})",
                self.eng,
                self.read_gbps + self.write_gbps,
                self.read_gbps,
                self.write_gbps
            ),
        }
    }
}

/// GB/s for `lines` lines of `byte_width` bytes moved in `cycles` cycles of
/// a `mhz` clock.
pub fn gbps(byte_width: u32, lines: u64, mhz: f64, cycles: u64) -> f64 {
    if cycles == 0 {
        return 0.0;
    }
    byte_width as f64 * lines as f64 * mhz / (1000.0 * cycles as f64)
}

/// Runs engines in `engine_mask` with unlimited bursts for the configured
/// run time and reports their bandwidth.
///
/// `afu_mhz` caches the engine clock: it is measured after the first run
/// and reused afterwards.
pub fn run_bandwidth<B: CsrBackend>(
    csr: &mut CsrManager<B>,
    engine_mask: u64,
    caps: &[EngineCaps],
    burst_size: u32,
    mode: Mode,
    config: &HarnessConfig,
    afu_mhz: &mut f64,
) -> Result<Vec<EngineBandwidth>> {
    let engines = || (0..caps.len() as u32).filter(move |e| (engine_mask >> e) & 1 == 1);

    for eng in engines() {
        // num_bursts of zero: run until disabled.
        csr.eng_write(
            eng,
            engine::REG_RD_CONFIG,
            engine::burst_config(mode.reads(), 0, burst_size),
        )?;
        csr.eng_write(
            eng,
            engine::REG_WR_CONFIG,
            engine::burst_config(mode.writes(), 0, burst_size),
        )?;
        csr.eng_write(eng, engine::REG_SEED, eng as u64)?;
    }

    csr.enable_engines(engine_mask)?;
    wait_engines_started(csr, &config.poll)?;
    thread::sleep(config.run_time);
    csr.disable_engines(engine_mask)?;
    wait_engines_idle(csr, &config.poll)?;

    if *afu_mhz == 0.0 {
        *afu_mhz = csr.clock_mhz()?;
        println!("  AFU clock is {:.1} MHz", *afu_mhz);
    }
    let cycles = csr.clock_cycles()?;

    let mut results = Vec::new();
    for eng in engines() {
        let read_lines = csr.eng_read(eng, engine::REG_RD_LINES)?;
        let write_lines = csr.eng_read(eng, engine::REG_WR_LINES)?;
        if read_lines == 0 && write_lines == 0 {
            println!("  FAIL: no memory traffic detected!");
            return Err(HarnessError::NoTraffic { eng });
        }

        let width = caps[eng as usize].data_byte_width;
        let bw = EngineBandwidth {
            eng,
            read_gbps: gbps(width, read_lines, *afu_mhz, cycles),
            write_gbps: gbps(width, write_lines, *afu_mhz, cycles),
        };
        bw.print(mode);
        results.push(bw);
    }
    Ok(results)
}

/// Full local memory test: engine discovery, small-region sweep on each
/// engine, then parallel bandwidth at increasing burst sizes.
///
/// Stops after the first engine with sweep failures; the returned stats
/// then cover only the engines tested so far.
pub fn run_local_mem_test<B: CsrBackend>(
    csr: &mut CsrManager<B>,
    config: &HarnessConfig,
) -> Result<SweepStats> {
    let (id_high, id_low) = (csr.eng_glob_read(1)?, csr.eng_glob_read(0)?);
    println!("Test ID: {:016x} {:016x}", id_high, id_low);

    let num_engines = csr.num_engines()?;
    println!("Engines: {}", num_engines);

    let mut caps = Vec::with_capacity(num_engines as usize);
    for eng in 0..num_engines {
        let c = EngineCaps::decode(csr.eng_read(eng, engine::REG_STATUS)?);
        c.print(eng);
        caps.push(c);
    }
    println!();

    let mut stats = SweepStats::new();
    for (eng, c) in caps.iter().enumerate() {
        let engine_stats = test_small_regions(csr, eng as u32, c, config)?;
        stats.merge(&engine_stats);
        if engine_stats.failed > 0 {
            warn!(eng, failed = engine_stats.failed, "quitting after sweep failures");
            return Ok(stats);
        }
    }

    let Some(first) = caps.first() else {
        return Ok(stats);
    };

    // All engines are assumed to share the first engine's burst limits.
    let all_engines = (1u64 << num_engines) - 1;
    let mut afu_mhz = 0.0;
    for burst_size in bandwidth_burst_sizes(first) {
        println!("\nTesting burst size {}:", burst_size);
        for mode in [Mode::Read, Mode::Write, Mode::ReadWrite] {
            run_bandwidth(csr, all_engines, &caps, burst_size, mode, config, &mut afu_mhz)?;
        }
    }
    info!(afu_mhz, runs = stats.total(), "local memory test complete");

    Ok(stats)
}
