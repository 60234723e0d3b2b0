//! CSR access for the test AFUs.
//!
//! The AFUs expose a 64-bit CSR space through MMIO. [`CsrBackend`] is the
//! raw access seam (a driver-backed region, or the software model in
//! [`crate::sim`]); [`CsrManager`] layers the AFU's register map on top.

use crate::error::{HarnessError, Result};
use plat_common::csr;
use tracing::debug;

/// Raw 64-bit MMIO access to one AFU region.
///
/// Offsets are in bytes and must be 8-byte aligned. Reads take `&mut self`
/// because reading status registers may advance device state.
pub trait CsrBackend {
    /// Reads the 64-bit register at `offset`.
    ///
    /// # Errors
    ///
    /// Returns error if the access is rejected by the device or driver.
    fn read64(&mut self, offset: u64) -> Result<u64>;

    /// Writes `value` to the 64-bit register at `offset`.
    ///
    /// # Errors
    ///
    /// Returns error if the access is rejected by the device or driver.
    fn write64(&mut self, offset: u64, value: u64) -> Result<()>;
}

/// Register-level view of a test AFU.
pub struct CsrManager<B: CsrBackend> {
    backend: B,
}

impl<B: CsrBackend> CsrManager<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Generic read. `idx` is in 64-bit word units, so index 1 is byte 8.
    pub fn read(&mut self, idx: u64) -> Result<u64> {
        self.backend.read64(idx * 8)
    }

    /// Generic write. `idx` is in 64-bit word units.
    pub fn write(&mut self, idx: u64, value: u64) -> Result<()> {
        self.backend.write64(idx * 8, value)
    }

    /// AFU UUID as `(high, low)`.
    pub fn afu_id(&mut self) -> Result<(u64, u64)> {
        Ok((self.read(csr::AFU_ID_H)?, self.read(csr::AFU_ID_L)?))
    }

    pub fn num_engines(&mut self) -> Result<u32> {
        let config = self.read(csr::RD_CTRL_CONFIG_INFO)?;
        Ok(csr::config_num_engines(config))
    }

    /// Engine clock frequency in MHz, derived from the known pClk.
    ///
    /// Only meaningful after at least one engine has been enabled and then
    /// disabled: the cycle counters run only while engines are enabled, and
    /// both counters must be stopped to be read consistently. Returns 0.0
    /// while any engine is enabled or before any cycles were counted.
    pub fn clock_mhz(&mut self) -> Result<f64> {
        if self.engines_enabled()? != 0 {
            return Ok(0.0);
        }

        let pclk_mhz = csr::config_pclk_mhz(self.read(csr::RD_CTRL_CONFIG_INFO)?);
        let clk_cycles = self.clock_cycles()?;
        let pclk_cycles = self.read(csr::RD_CTRL_ENG_PCLK_CYCLES)?;
        if clk_cycles == 0 || pclk_cycles == 0 {
            return Ok(0.0);
        }

        Ok(pclk_mhz as f64 * (clk_cycles as f64 / pclk_cycles as f64))
    }

    /// Cycles spent enabled, in the engine clock domain.
    pub fn clock_cycles(&mut self) -> Result<u64> {
        self.read(csr::RD_CTRL_ENG_CYCLES)
    }

    /// Enables engines. Each bit in the mask selects one engine.
    pub fn enable_engines(&mut self, engine_mask: u64) -> Result<()> {
        debug!(engine_mask, "enable engines");
        self.write(csr::WR_CTRL_ENG_ENABLE_MASK, engine_mask)
    }

    pub fn disable_engines(&mut self, engine_mask: u64) -> Result<()> {
        debug!(engine_mask, "disable engines");
        self.write(csr::WR_CTRL_ENG_DISABLE_MASK, engine_mask)
    }

    /// Engines selected by [`Self::enable_engines`].
    pub fn engines_enabled(&mut self) -> Result<u64> {
        self.read(csr::RD_CTRL_ENG_RUN_MASK)
    }

    /// Engines with requests in flight, possibly after being disabled.
    pub fn engines_active(&mut self) -> Result<u64> {
        self.read(csr::RD_CTRL_ENG_ACTIVE_MASK)
    }

    pub fn eng_glob_read(&mut self, idx: u32) -> Result<u64> {
        check_glob(idx)?;
        self.read(csr::glob_index(idx))
    }

    pub fn eng_glob_write(&mut self, idx: u32, value: u64) -> Result<()> {
        check_glob(idx)?;
        self.write(csr::glob_index(idx), value)
    }

    /// Reads private register `idx` of engine `eng`.
    pub fn eng_read(&mut self, eng: u32, idx: u32) -> Result<u64> {
        check_eng(eng, idx)?;
        self.read(csr::eng_index(eng, idx))
    }

    /// Writes private register `idx` of engine `eng`.
    pub fn eng_write(&mut self, eng: u32, idx: u32, value: u64) -> Result<()> {
        check_eng(eng, idx)?;
        self.write(csr::eng_index(eng, idx), value)
    }
}

fn check_glob(idx: u32) -> Result<()> {
    if idx >= csr::NUM_GLOB_REGS {
        return Err(HarnessError::CsrIndex { eng: 0, idx });
    }
    Ok(())
}

fn check_eng(eng: u32, idx: u32) -> Result<()> {
    if eng >= csr::MAX_ENGINES || idx >= csr::NUM_ENG_REGS {
        return Err(HarnessError::CsrIndex { eng, idx });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Plain register file that records every access.
    #[derive(Default)]
    struct RegFile {
        regs: HashMap<u64, u64>,
        writes: Vec<(u64, u64)>,
    }

    impl CsrBackend for RegFile {
        fn read64(&mut self, offset: u64) -> Result<u64> {
            Ok(self.regs.get(&offset).copied().unwrap_or(0))
        }

        fn write64(&mut self, offset: u64, value: u64) -> Result<()> {
            self.writes.push((offset, value));
            self.regs.insert(offset, value);
            Ok(())
        }
    }

    #[test]
    fn indices_are_word_offsets() {
        let mut csr = CsrManager::new(RegFile::default());
        csr.write(1, 0xabc).unwrap();
        assert_eq!(csr.backend().writes, [(8, 0xabc)]);
        assert_eq!(csr.read(1).unwrap(), 0xabc);
    }

    #[test]
    fn engine_registers_are_packed() {
        let mut csr = CsrManager::new(RegFile::default());
        csr.eng_write(3, 2, 7).unwrap();
        csr.eng_glob_write(1, 9).unwrap();
        assert_eq!(
            csr.backend().writes,
            [((0x400 | 3 << 4 | 2) * 8, 7), ((0x20 + 1) * 8, 9)]
        );
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let mut csr = CsrManager::new(RegFile::default());
        assert!(matches!(
            csr.eng_read(16, 0),
            Err(HarnessError::CsrIndex { eng: 16, idx: 0 })
        ));
        assert!(csr.eng_write(0, 16, 1).is_err());
        assert!(csr.eng_glob_read(16).is_err());
        assert!(csr.backend().writes.is_empty());
        assert!(csr.eng_read(15, 15).is_ok());
    }

    #[test]
    fn config_word_decodes() {
        let mut csr = CsrManager::new(RegFile::default());
        csr.write(csr::RD_CTRL_CONFIG_INFO, csr::config_info(4, 200)).unwrap();
        assert_eq!(csr.num_engines().unwrap(), 4);
    }

    #[test]
    fn clock_needs_stopped_counters() {
        let mut csr = CsrManager::new(RegFile::default());
        csr.write(csr::RD_CTRL_CONFIG_INFO, csr::config_info(1, 100)).unwrap();
        assert_eq!(csr.clock_mhz().unwrap(), 0.0);

        csr.write(csr::RD_CTRL_ENG_CYCLES, 3000).unwrap();
        csr.write(csr::RD_CTRL_ENG_PCLK_CYCLES, 1000).unwrap();
        assert_eq!(csr.clock_mhz().unwrap(), 300.0);

        csr.write(csr::RD_CTRL_ENG_RUN_MASK, 1).unwrap();
        assert_eq!(csr.clock_mhz().unwrap(), 0.0);
    }
}
