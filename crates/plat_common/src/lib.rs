//! Common definitions shared by the platform interface test harness.
//!
//! This crate provides the CSR index map exposed by the test AFUs, the bit
//! layout of the per-engine configuration and status registers, and the
//! constants that the software and hardware test-data generators must agree
//! on. It is `no_std` so the same definitions can be used by host tools and
//! by any embedded model of the engines.

#![no_std]

/// CSR index map of the test AFUs.
///
/// All indices are in 64-bit word units: index 1 is byte offset 8 in the
/// MMIO space. Read and write views of the control block overlap, so the
/// same index means different registers depending on direction.
pub mod csr {
    /// Device feature header.
    pub const AFU_DFH: u64 = 0;

    /// Low 64 bits of the AFU UUID.
    pub const AFU_ID_L: u64 = 1;

    /// High 64 bits of the AFU UUID.
    pub const AFU_ID_H: u64 = 2;

    /// Configuration word.
    ///
    /// Bits 7:0 hold the number of engines. Bits 23:8 hold the frequency of
    /// the reference pClk in MHz, used to derive the engine clock frequency.
    pub const RD_CTRL_CONFIG_INFO: u64 = 0x10;

    /// Mask of engines currently enabled (one bit per engine).
    pub const RD_CTRL_ENG_RUN_MASK: u64 = 0x11;

    /// Mask of engines with requests still in flight.
    ///
    /// An engine may be disabled but still active while outstanding
    /// requests drain.
    pub const RD_CTRL_ENG_ACTIVE_MASK: u64 = 0x12;

    /// Cycles spent enabled, counted in the engine clock domain.
    pub const RD_CTRL_ENG_CYCLES: u64 = 0x13;

    /// Cycles spent enabled, counted in the pClk domain.
    pub const RD_CTRL_ENG_PCLK_CYCLES: u64 = 0x14;

    /// Writing a mask enables the selected engines.
    pub const WR_CTRL_ENG_ENABLE_MASK: u64 = 0x10;

    /// Writing a mask disables the selected engines.
    pub const WR_CTRL_ENG_DISABLE_MASK: u64 = 0x11;

    /// First of the 16 global engine CSRs.
    pub const ENG_GLOB_BASE: u64 = 0x020;

    /// First private engine CSR. Engine `e`, register `i` is at
    /// `ENG_BASE | e << 4 | i`.
    pub const ENG_BASE: u64 = 0x400;

    /// Number of global engine CSRs.
    pub const NUM_GLOB_REGS: u32 = 16;

    /// Number of private CSRs per engine.
    pub const NUM_ENG_REGS: u32 = 16;

    /// Maximum number of engines addressable through `ENG_BASE`.
    pub const MAX_ENGINES: u32 = 16;

    /// Index of private register `idx` of engine `eng`.
    #[inline]
    pub const fn eng_index(eng: u32, idx: u32) -> u64 {
        ENG_BASE | ((eng as u64) << 4) | idx as u64
    }

    /// Index of global engine register `idx`.
    #[inline]
    pub const fn glob_index(idx: u32) -> u64 {
        ENG_GLOB_BASE + idx as u64
    }

    /// Engine count encoded in the configuration word.
    #[inline]
    pub const fn config_num_engines(config: u64) -> u32 {
        (config & 0xff) as u32
    }

    /// pClk frequency in MHz encoded in the configuration word.
    #[inline]
    pub const fn config_pclk_mhz(config: u64) -> u64 {
        (config >> 8) & 0xffff
    }

    /// Builds a configuration word.
    #[inline]
    pub const fn config_info(num_engines: u32, pclk_mhz: u64) -> u64 {
        ((pclk_mhz & 0xffff) << 8) | (num_engines as u64 & 0xff)
    }
}

/// Register layout of the local memory test engine.
///
/// Each engine owns 16 private CSRs (see [`csr::eng_index`]). The read side
/// of register 0 mixes static capabilities with live status bits.
pub mod engine {
    /// Write: read-traffic configuration. Read: capabilities and status.
    pub const REG_RD_CONFIG: u32 = 0;

    /// Write: write-traffic configuration.
    pub const REG_WR_CONFIG: u32 = 1;

    /// Write: seed for the write data generator.
    pub const REG_SEED: u32 = 2;

    /// Read: capabilities and status word.
    pub const REG_STATUS: u32 = 0;

    /// Read: number of read burst requests issued.
    pub const REG_RD_BURSTS: u32 = 1;

    /// Read: number of read line responses received.
    pub const REG_RD_LINES: u32 = 2;

    /// Read: number of write line requests issued.
    pub const REG_WR_LINES: u32 = 3;

    /// Read: reduced hash of all data read by the engine.
    pub const REG_RD_HASH: u32 = 5;

    /// Bit that enables a traffic direction in a burst configuration word.
    pub const CFG_ENABLE_BIT: u32 = 48;

    /// Maximum burst size field (bits 14:0) of the capability word.
    pub const CAP_MAX_BURST_MASK: u64 = 0x7fff;

    /// Engine issues only power-of-two bursts.
    pub const CAP_NATURAL_BURSTS_BIT: u32 = 15;

    /// Engine is held in reset.
    pub const STATUS_IN_RESET_BIT: u32 = 32;

    /// Engine is running.
    pub const STATUS_RUNNING_BIT: u32 = 33;

    /// Engine has requests in flight.
    pub const STATUS_ACTIVE_BIT: u32 = 34;

    /// Engine type: 0 is CCI-P, 1 is Avalon.
    pub const CAP_ENGINE_TYPE_BIT: u32 = 35;

    /// Read responses arrive in request order.
    pub const CAP_ORDERED_READS_BIT: u32 = 39;

    /// Memory interface is asserting waitrequest.
    pub const STATUS_WAITREQUEST_BIT: u32 = 40;

    /// Data bus width in bytes (bits 63:56).
    pub const CAP_DATA_WIDTH_SHIFT: u32 = 56;

    /// Packs a burst configuration word.
    ///
    /// A `num_bursts` of zero asks the engine to run until it is disabled.
    #[inline]
    pub const fn burst_config(enable: bool, num_bursts: u32, burst_size: u32) -> u64 {
        ((enable as u64) << CFG_ENABLE_BIT) | ((num_bursts as u64) << 32) | burst_size as u64
    }

    /// Unpacks a burst configuration word into `(enable, num_bursts, burst_size)`.
    #[inline]
    pub const fn decode_burst_config(cfg: u64) -> (bool, u32, u32) {
        (
            (cfg >> CFG_ENABLE_BIT) & 1 == 1,
            ((cfg >> 32) & 0xffff) as u32,
            (cfg & 0xffff) as u32,
        )
    }

    /// Human-readable engine type name.
    pub const fn type_name(is_avalon: bool) -> &'static str {
        if is_avalon { "Avalon" } else { "CCI-P" }
    }
}

/// Constants shared by the software and hardware test-data generators.
///
/// The hardware generator and checker are bit-identical to the software
/// versions, so these values must never change independently of the RTL.
pub mod test_data {
    /// Initial value of every hash bucket.
    pub const HASH32_DEFAULT_INIT: u32 = 0x14d6;

    /// Feedback taps applied when bit 0 of the hash shifts out.
    ///
    /// Bits 0, 1, 2, 4 and 6 of the rotated hash are flipped.
    pub const HASH32_FEEDBACK: u32 = 0x57;

    /// Seed pattern tiled across a data vector by the generator reset.
    pub const GEN_INIT_PATTERN: [u64; 8] = [
        0x8607_6172_2b16_4a00,
        0x54de_0dc9_7b56_4cbf,
        0x8519_a51b_2767_a2fa,
        0x33b2_3fb3_ab3c_4277,
        0xafcc_6ba3_db67_f2b3,
        0x7665_5f3e_9ba8_4438,
        0xb173_761f_0b5a_083b,
        0x8644_5546_2459_4bbf,
    ];

    /// Seed base used by the local memory test; engine `e` uses `base + e`.
    pub const LOCAL_MEM_SEED_BASE: u64 = 0xf00;

    /// Marker the host channel engine writes to word 7 of every line.
    pub const WRITE_LINE_MARKER: u64 = 0xdead_beef;

    /// Bytes in a host channel cache line.
    pub const CACHE_LINE_BYTES: usize = 64;

    /// Size of the atomic update and write-back buffers.
    pub const ATOMIC_BUF_BYTES: usize = 4096;

    /// Atomic requests the atomic engine issues per run.
    pub const ATOMIC_NUM_UPDATES: usize = 251;

    /// Atomic request tags are `(ATOMIC_TAG_BASE + idx) & ATOMIC_TAG_MASK`.
    /// The tag is both the operand and the compare value.
    pub const ATOMIC_TAG_BASE: u64 = 0x100;

    pub const ATOMIC_TAG_MASK: u64 = 0x1ff;

    /// Value stored by a compare-and-swap that matches.
    pub const ATOMIC_CAS_VALUE: u64 = 0x12345;
}
