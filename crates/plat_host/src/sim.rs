//! Software model of the local memory test AFU.
//!
//! Implements [`CsrBackend`] with the same register map and engine behavior
//! as the hardware, using the `plat_core` generator and checker in place of
//! the RTL ones. This enables:
//!
//! 1. Running the full test flow (configure, start, poll, check) without an
//!    FPGA, e.g. in CI.
//! 2. Exercising failure paths that are hard to provoke on hardware, such as
//!    corrupted memory or a hung engine.
//!
//! Time only advances when the host looks: every read of the active mask is
//! one "tick". A finished engine stays active for
//! `busy_polls` ticks, and a streaming engine moves one burst per tick.

use crate::csr::CsrBackend;
use crate::error::{HarnessError, Result};
use plat_common::{csr, engine};
use plat_core::{TestDataChk, TestDataGen};
use tracing::{debug, trace};

/// Static description of the simulated AFU.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub num_engines: u32,
    /// Bytes per memory line (the data vector length).
    pub data_byte_width: u32,
    pub max_burst_size: u32,
    /// Engines only issue power-of-two bursts.
    pub natural_bursts: bool,
    /// Avalon rather than CCI-P memory interface.
    pub avalon: bool,
    pub ordered_reads: bool,
    pub clock_mhz: u64,
    pub pclk_mhz: u64,
    /// Active-mask reads a finished engine stays active for.
    pub busy_polls: u32,
    /// Engine clock cycles charged per line moved.
    pub cycles_per_line: u64,
    /// AFU UUID as `(high, low)`.
    pub afu_id: (u64, u64),
    /// Test ID reported in global registers 1:0.
    pub test_id: (u64, u64),
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_engines: 2,
            data_byte_width: 64,
            max_burst_size: 16,
            natural_bursts: false,
            avalon: true,
            ordered_reads: true,
            clock_mhz: 250,
            pclk_mhz: 200,
            busy_polls: 2,
            cycles_per_line: 10,
            afu_id: (0x4a6f_a2e7_7fd4_4c4b, 0x9b5d_11b0_a6a8_ba1f),
            test_id: (0x7a1a_7e57, 0x0000_0000_10ca_1e11),
        }
    }
}

impl SimConfig {
    /// Checks that the configuration fits the capability register.
    ///
    /// The data width is reported in an 8-bit field, so it must be a
    /// non-zero multiple of 8 bytes no larger than 248.
    pub fn validate(self) -> Result<Self> {
        let width = self.data_byte_width;
        if width == 0 || width > 0xff || width % 8 != 0 {
            return Err(HarnessError::config(format!(
                "data width {} bytes must be a non-zero multiple of 8 below 256",
                width
            )));
        }
        Ok(self)
    }
}

#[derive(Debug, Default)]
struct SimEngine {
    rd_cfg: u64,
    wr_cfg: u64,
    seed: u64,
    /// Local memory, `data_byte_width / 8` words per line.
    memory: Vec<u64>,
    rd_bursts: u64,
    rd_lines: u64,
    wr_lines: u64,
    rd_hash: u64,
    /// Ticks left before a finished run goes idle.
    busy: u32,
    /// Running with `num_bursts == 0`.
    streaming: bool,
    started: bool,
    stalled: bool,
    corrupt: bool,
}

/// The simulated AFU.
#[derive(Debug)]
pub struct SimulatedAfu {
    config: SimConfig,
    engines: Vec<SimEngine>,
    glob: [u64; csr::NUM_GLOB_REGS as usize],
    enabled: u64,
    cycles: u64,
}

impl SimulatedAfu {
    pub fn new(config: SimConfig) -> Self {
        let num_engines = config.num_engines.min(csr::MAX_ENGINES);
        let mut glob = [0; csr::NUM_GLOB_REGS as usize];
        glob[0] = config.test_id.1;
        glob[1] = config.test_id.0;

        Self {
            engines: (0..num_engines).map(|_| SimEngine::default()).collect(),
            config: SimConfig {
                num_engines,
                ..config
            },
            glob,
            enabled: 0,
            cycles: 0,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Makes engine `eng` accept a start but never finish.
    pub fn stall_engine(&mut self, eng: u32, stalled: bool) {
        if let Some(e) = self.engines.get_mut(eng as usize) {
            e.stalled = stalled;
        }
    }

    /// Flips a bit in the first line engine `eng` writes from now on.
    pub fn corrupt_engine(&mut self, eng: u32, corrupt: bool) {
        if let Some(e) = self.engines.get_mut(eng as usize) {
            e.corrupt = corrupt;
        }
    }

    fn all_engines(&self) -> u64 {
        (1u64 << self.engines.len()) - 1
    }

    fn line_words(&self) -> usize {
        self.config.data_byte_width as usize / 8
    }

    fn capabilities(&self) -> u64 {
        let c = &self.config;
        ((c.data_byte_width as u64 & 0xff) << engine::CAP_DATA_WIDTH_SHIFT)
            | ((c.ordered_reads as u64) << engine::CAP_ORDERED_READS_BIT)
            | ((c.avalon as u64) << engine::CAP_ENGINE_TYPE_BIT)
            | ((c.natural_bursts as u64) << engine::CAP_NATURAL_BURSTS_BIT)
            | (c.max_burst_size as u64 & engine::CAP_MAX_BURST_MASK)
    }

    fn is_active(e: &SimEngine) -> bool {
        e.streaming || e.busy > 0 || (e.stalled && e.started)
    }

    fn active_mask(&self) -> u64 {
        self.engines
            .iter()
            .enumerate()
            .filter(|(_, e)| Self::is_active(e))
            .fold(0, |mask, (i, _)| mask | 1u64 << i)
    }

    fn status(&self, eng: usize) -> u64 {
        let e = &self.engines[eng];
        let running = (self.enabled >> eng) & 1;
        self.capabilities()
            | ((!e.started as u64) << engine::STATUS_IN_RESET_BIT)
            | (running << engine::STATUS_RUNNING_BIT)
            | ((Self::is_active(e) as u64) << engine::STATUS_ACTIVE_BIT)
            | ((e.stalled as u64) << engine::STATUS_WAITREQUEST_BIT)
    }

    /// Advances simulated time by one host observation.
    fn tick(&mut self) {
        let mut lines = 0;
        for e in self.engines.iter_mut() {
            if e.streaming {
                lines += Self::stream_burst(e);
            } else if e.busy > 0 {
                e.busy -= 1;
            }
        }
        self.cycles += lines * self.config.cycles_per_line;
        trace!(cycles = self.cycles, "tick");
    }

    /// One burst of continuous traffic. Data is not checked in this mode.
    fn stream_burst(e: &mut SimEngine) -> u64 {
        let (rd_en, _, rd_size) = engine::decode_burst_config(e.rd_cfg);
        let (wr_en, _, wr_size) = engine::decode_burst_config(e.wr_cfg);
        let mut lines = 0;
        if rd_en {
            e.rd_bursts += 1;
            e.rd_lines += rd_size as u64;
            lines += rd_size as u64;
        }
        if wr_en {
            e.wr_lines += wr_size as u64;
            lines += wr_size as u64;
        }
        lines
    }

    fn start_engine(&mut self, eng: usize) -> Result<()> {
        let width = self.config.data_byte_width as usize;
        let words = self.line_words();
        let busy = self.config.busy_polls;
        let cycles_per_line = self.config.cycles_per_line;
        let e = &mut self.engines[eng];

        let (rd_en, rd_bursts, rd_size) = engine::decode_burst_config(e.rd_cfg);
        let (wr_en, wr_bursts, wr_size) = engine::decode_burst_config(e.wr_cfg);

        e.started = true;
        e.rd_bursts = 0;
        e.rd_lines = 0;
        e.wr_lines = 0;

        // num_bursts of zero on an enabled side means run until disabled.
        if (rd_en && rd_bursts == 0) || (wr_en && wr_bursts == 0) {
            e.streaming = true;
            let lines = Self::stream_burst(e);
            self.cycles += lines * cycles_per_line;
            return Ok(());
        }

        let mut lines = 0u64;
        if wr_en {
            let num_lines = wr_bursts as usize * wr_size as usize;
            if e.memory.len() < num_lines * words {
                e.memory.resize(num_lines * words, 0);
            }

            let mut data_gen = TestDataGen::new(width, e.seed)?;
            for line in e.memory.chunks_exact_mut(words).take(num_lines) {
                line.copy_from_slice(data_gen.data());
                data_gen.advance();
            }
            if e.corrupt && num_lines > 0 {
                e.memory[0] ^= 1;
            }
            e.wr_lines = num_lines as u64;
            lines += num_lines as u64;
        }

        if rd_en {
            let num_lines = rd_bursts as usize * rd_size as usize;
            if e.memory.len() < num_lines * words {
                e.memory.resize(num_lines * words, 0);
            }

            let mut chk = TestDataChk::new(width)?;
            for line in e.memory.chunks_exact(words).take(num_lines) {
                chk.update(line)?;
            }
            e.rd_hash = chk.reduce();
            e.rd_bursts = rd_bursts as u64;
            e.rd_lines = num_lines as u64;
            lines += num_lines as u64;
        }

        e.busy = busy;
        self.cycles += lines * cycles_per_line;
        debug!(eng, lines, rd_hash = e.rd_hash, "engine run complete");
        Ok(())
    }

    fn enable(&mut self, mask: u64) -> Result<()> {
        let mask = mask & self.all_engines();
        if self.enabled == 0 && mask != 0 {
            // Counters describe the most recent run.
            self.cycles = 0;
        }
        for eng in 0..self.engines.len() {
            if (mask >> eng) & 1 == 1 && (self.enabled >> eng) & 1 == 0 {
                self.start_engine(eng)?;
            }
        }
        self.enabled |= mask;
        Ok(())
    }

    fn disable(&mut self, mask: u64) {
        let busy = self.config.busy_polls;
        for (eng, e) in self.engines.iter_mut().enumerate() {
            if (mask >> eng) & 1 == 1 && e.streaming {
                // Drain outstanding requests.
                e.streaming = false;
                e.busy = busy;
            }
        }
        self.enabled &= !mask;
    }

    fn read_engine(&self, eng: usize, idx: u32) -> u64 {
        let e = &self.engines[eng];
        match idx {
            engine::REG_STATUS => self.status(eng),
            engine::REG_RD_BURSTS => e.rd_bursts,
            engine::REG_RD_LINES => e.rd_lines,
            engine::REG_WR_LINES => e.wr_lines,
            engine::REG_RD_HASH => e.rd_hash,
            _ => 0,
        }
    }

    fn write_engine(&mut self, eng: usize, idx: u32, value: u64) {
        let e = &mut self.engines[eng];
        match idx {
            engine::REG_RD_CONFIG => e.rd_cfg = value,
            engine::REG_WR_CONFIG => e.wr_cfg = value,
            engine::REG_SEED => e.seed = value,
            _ => {}
        }
    }

    /// Splits an engine CSR index into `(engine, register)` if it names an
    /// implemented engine.
    fn engine_slot(&self, idx: u64) -> Option<(usize, u32)> {
        if idx < csr::ENG_BASE {
            return None;
        }
        let eng = ((idx - csr::ENG_BASE) >> 4) as usize;
        (eng < self.engines.len()).then_some((eng, (idx & 0xf) as u32))
    }
}

fn check_offset(offset: u64) -> Result<u64> {
    if offset % 8 != 0 {
        return Err(HarnessError::mmio(offset, "unaligned 64-bit access"));
    }
    Ok(offset / 8)
}

impl CsrBackend for SimulatedAfu {
    fn read64(&mut self, offset: u64) -> Result<u64> {
        let idx = check_offset(offset)?;
        let value = match idx {
            csr::AFU_DFH => 0x1000_0000_0000_1000,
            csr::AFU_ID_L => self.config.afu_id.1,
            csr::AFU_ID_H => self.config.afu_id.0,
            csr::RD_CTRL_CONFIG_INFO => {
                csr::config_info(self.engines.len() as u32, self.config.pclk_mhz)
            }
            csr::RD_CTRL_ENG_RUN_MASK => self.enabled,
            csr::RD_CTRL_ENG_ACTIVE_MASK => {
                let mask = self.active_mask();
                self.tick();
                mask
            }
            csr::RD_CTRL_ENG_CYCLES => self.cycles,
            csr::RD_CTRL_ENG_PCLK_CYCLES => {
                self.cycles * self.config.pclk_mhz / self.config.clock_mhz.max(1)
            }
            i if (csr::ENG_GLOB_BASE..csr::ENG_GLOB_BASE + csr::NUM_GLOB_REGS as u64)
                .contains(&i) =>
            {
                self.glob[(i - csr::ENG_GLOB_BASE) as usize]
            }
            i => match self.engine_slot(i) {
                Some((eng, reg)) => self.read_engine(eng, reg),
                None => 0,
            },
        };
        Ok(value)
    }

    fn write64(&mut self, offset: u64, value: u64) -> Result<()> {
        let idx = check_offset(offset)?;
        match idx {
            csr::WR_CTRL_ENG_ENABLE_MASK => self.enable(value)?,
            csr::WR_CTRL_ENG_DISABLE_MASK => self.disable(value),
            i if (csr::ENG_GLOB_BASE..csr::ENG_GLOB_BASE + csr::NUM_GLOB_REGS as u64)
                .contains(&i) =>
            {
                self.glob[(i - csr::ENG_GLOB_BASE) as usize] = value;
            }
            i => match self.engine_slot(i) {
                Some((eng, reg)) => self.write_engine(eng, reg, value),
                None => return Err(HarnessError::mmio(offset, "write to read-only register")),
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csr::CsrManager;
    use crate::poll::{PollPolicy, wait_engines_done};
    use plat_core::chk_gen;
    use std::time::Duration;

    const FAST: PollPolicy = PollPolicy {
        interval: Duration::ZERO,
        max_trips: 10,
    };

    fn sim(config: SimConfig) -> CsrManager<SimulatedAfu> {
        CsrManager::new(SimulatedAfu::new(config))
    }

    fn run(
        csr: &mut CsrManager<SimulatedAfu>,
        eng: u32,
        rd: bool,
        wr: bool,
        bursts: u32,
        size: u32,
    ) {
        csr.eng_write(eng, engine::REG_RD_CONFIG, engine::burst_config(rd, bursts, size))
            .unwrap();
        csr.eng_write(eng, engine::REG_WR_CONFIG, engine::burst_config(wr, bursts, size))
            .unwrap();
        csr.eng_write(eng, engine::REG_SEED, 0xf00 + eng as u64).unwrap();
        csr.enable_engines(1 << eng).unwrap();
        wait_engines_done(csr, 1 << eng, &FAST).unwrap();
        csr.disable_engines(1 << eng).unwrap();
    }

    #[test]
    fn reports_configuration() {
        let mut csr = sim(SimConfig {
            num_engines: 3,
            ..SimConfig::default()
        });
        assert_eq!(csr.num_engines().unwrap(), 3);
        assert_eq!(csr.afu_id().unwrap(), SimConfig::default().afu_id);
        assert_eq!(csr.eng_glob_read(0).unwrap(), SimConfig::default().test_id.1);

        let status = csr.eng_read(0, engine::REG_STATUS).unwrap();
        assert_eq!(status & engine::CAP_MAX_BURST_MASK, 16);
        assert_eq!(status >> engine::CAP_DATA_WIDTH_SHIFT, 64);
        assert_eq!((status >> engine::STATUS_IN_RESET_BIT) & 1, 1);
    }

    #[test]
    fn width_must_fit_capability_field() {
        for width in [0, 12, 256, 4096] {
            let config = SimConfig {
                data_byte_width: width,
                ..SimConfig::default()
            };
            assert!(matches!(config.validate(), Err(HarnessError::Config { .. })));
        }
        for width in [8, 64, 248] {
            let config = SimConfig {
                data_byte_width: width,
                ..SimConfig::default()
            }
            .validate()
            .unwrap();
            let mut csr = sim(config);
            let status = csr.eng_read(0, engine::REG_STATUS).unwrap();
            assert_eq!(status >> engine::CAP_DATA_WIDTH_SHIFT, width as u64);
        }
    }

    #[test]
    fn write_then_read_matches_generator() {
        let mut csr = sim(SimConfig::default());
        run(&mut csr, 1, true, true, 3, 4);
        assert_eq!(
            csr.eng_read(1, engine::REG_RD_HASH).unwrap(),
            chk_gen(64, 0xf01, 12).unwrap()
        );
        assert_eq!(csr.eng_read(1, engine::REG_RD_LINES).unwrap(), 12);
        assert_eq!(csr.eng_read(1, engine::REG_WR_LINES).unwrap(), 12);
        assert_eq!(csr.eng_read(1, engine::REG_RD_BURSTS).unwrap(), 3);
    }

    #[test]
    fn read_only_sees_previous_write() {
        let mut csr = sim(SimConfig::default());
        run(&mut csr, 0, false, true, 7, 2);
        run(&mut csr, 0, true, false, 7, 2);
        assert_eq!(
            csr.eng_read(0, engine::REG_RD_HASH).unwrap(),
            chk_gen(64, 0xf00, 14).unwrap()
        );
    }

    #[test]
    fn corruption_changes_hash() {
        let mut csr = sim(SimConfig::default());
        csr.backend_mut().corrupt_engine(0, true);
        run(&mut csr, 0, true, true, 1, 1);
        assert_ne!(
            csr.eng_read(0, engine::REG_RD_HASH).unwrap(),
            chk_gen(64, 0xf00, 1).unwrap()
        );
    }

    #[test]
    fn stalled_engine_hangs() {
        let mut csr = sim(SimConfig::default());
        csr.backend_mut().stall_engine(0, true);
        csr.eng_write(0, engine::REG_RD_CONFIG, engine::burst_config(true, 1, 1))
            .unwrap();
        csr.enable_engines(1).unwrap();
        let err = wait_engines_done(&mut csr, 1, &FAST).unwrap_err();
        assert!(matches!(err, HarnessError::Hang { trips: 10 }));

        let status = csr.eng_read(0, engine::REG_STATUS).unwrap();
        assert_eq!((status >> engine::STATUS_ACTIVE_BIT) & 1, 1);
        assert_eq!((status >> engine::STATUS_WAITREQUEST_BIT) & 1, 1);
    }

    #[test]
    fn busy_polls_delay_completion() {
        let mut csr = sim(SimConfig {
            busy_polls: 3,
            ..SimConfig::default()
        });
        csr.eng_write(0, engine::REG_RD_CONFIG, engine::burst_config(true, 1, 1))
            .unwrap();
        csr.enable_engines(1).unwrap();
        assert_eq!(wait_engines_done(&mut csr, 1, &FAST).unwrap(), 3);
    }

    #[test]
    fn clock_is_recovered_from_counters() {
        let mut csr = sim(SimConfig {
            clock_mhz: 400,
            pclk_mhz: 100,
            ..SimConfig::default()
        });
        run(&mut csr, 0, true, true, 15, 16);
        assert_eq!(csr.clock_cycles().unwrap(), 2 * 15 * 16 * 10);
        assert_eq!(csr.clock_mhz().unwrap(), 400.0);
    }

    #[test]
    fn streaming_runs_until_disabled() {
        let mut csr = sim(SimConfig::default());
        csr.eng_write(0, engine::REG_RD_CONFIG, engine::burst_config(true, 0, 4))
            .unwrap();
        csr.eng_write(0, engine::REG_WR_CONFIG, engine::burst_config(false, 0, 4))
            .unwrap();
        csr.enable_engines(1).unwrap();
        for _ in 0..5 {
            assert_eq!(csr.engines_active().unwrap(), 1);
        }
        csr.disable_engines(1).unwrap();
        crate::poll::wait_engines_idle(&mut csr, &FAST).unwrap();

        // One burst at start plus one per observation while enabled.
        assert_eq!(csr.eng_read(0, engine::REG_RD_LINES).unwrap(), 6 * 4);
        assert_eq!(csr.eng_read(0, engine::REG_WR_LINES).unwrap(), 0);
    }

    #[test]
    fn rejects_bad_accesses() {
        let mut afu = SimulatedAfu::new(SimConfig::default());
        assert!(afu.read64(4).is_err());
        assert!(afu.write64(csr::AFU_ID_L * 8, 1).is_err());
        // Engines past the configured count read as zero.
        assert_eq!(afu.read64(csr::eng_index(5, 0) * 8).unwrap(), 0);
    }
}
