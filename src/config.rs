//! SPS-derived configuration consumed by the rate-distortion core.
//!
//! The surrounding encoder parses parameter sets elsewhere; this module only
//! models the handful of fields the cost and context machinery reads: bit
//! depths, transform dynamic range, tool flags, reshaper model data and the
//! lossless cost mode.

use bitflags::bitflags;

use crate::buf::BitDepths;
use crate::error::{RdError, Result};

bitflags! {
    /// SPS tool flags observed by this core.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SpsFlags: u32 {
        /// Extended-precision transform processing.
        const EXTENDED_PRECISION = 1 << 0;
        /// Range-extension Rice parameter derivation.
        const RICE_EXTENSION = 1 << 1;
        /// Sign-data hiding.
        const SIGN_HIDING = 1 << 2;
        /// Palette mode enabled.
        const PLT_MODE = 1 << 3;
        /// Transform skip enabled.
        const TRANSFORM_SKIP = 1 << 4;
    }
}

/// Sequence-level parameters consumed by the core.
#[derive(Debug, Clone)]
pub struct SpsParams {
    /// Coded bit depths per channel.
    pub bit_depths: BitDepths,
    /// Tool flags.
    pub flags: SpsFlags,
    /// Max log2 transform dynamic range for luma.
    pub max_log2_tr_dynamic_range_luma: u8,
    /// Max log2 transform dynamic range for chroma.
    pub max_log2_tr_dynamic_range_chroma: u8,
}

impl Default for SpsParams {
    fn default() -> Self {
        Self {
            bit_depths: BitDepths::default(),
            flags: SpsFlags::SIGN_HIDING,
            max_log2_tr_dynamic_range_luma: 15,
            max_log2_tr_dynamic_range_chroma: 15,
        }
    }
}

impl SpsParams {
    /// Create parameters for the given bit depths with default tool flags.
    pub fn new(bit_depths: BitDepths) -> Self {
        Self { bit_depths, ..Default::default() }
    }

    /// Builder: set tool flags.
    pub fn with_flags(mut self, flags: SpsFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Max log2 transform dynamic range for the given channel.
    pub fn max_log2_tr_dynamic_range(&self, ch: crate::buf::ChannelType) -> u8 {
        match ch {
            crate::buf::ChannelType::Luma => self.max_log2_tr_dynamic_range_luma,
            crate::buf::ChannelType::Chroma => self.max_log2_tr_dynamic_range_chroma,
        }
    }

    /// Validate field ranges.
    pub fn validate(&self) -> Result<()> {
        for bd in [self.bit_depths.luma, self.bit_depths.chroma] {
            if !(8..=16).contains(&bd) {
                return Err(RdError::BitDepth(bd));
            }
        }
        if self.max_log2_tr_dynamic_range_luma > 20 || self.max_log2_tr_dynamic_range_chroma > 20 {
            return Err(RdError::Config(
                "max transform dynamic range exceeds 20 bits".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cost computation mode for the Lagrangian objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CostMode {
    /// Standard lossy coding.
    #[default]
    StandardLossy,
    /// Sequence-level lossless (mixed lossless/lossy).
    SequenceLevelLossless,
    /// Lossless coding: any non-zero distortion invalidates a candidate.
    Lossless,
}

/// Dynamic-range / transfer classification of the reshaped signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalType {
    /// Standard dynamic range.
    #[default]
    Sdr,
    /// Perceptual quantizer (HDR-PQ).
    Pq,
    /// Hybrid log-gamma.
    Hlg,
}

/// Number of code-word bins in the reshaper model.
pub const RESHAPE_CW_BINS: usize = 16;

/// Per-slice luma reshaper model, as signalled in the APS.
#[derive(Debug, Clone, Default)]
pub struct ReshapeModel {
    /// Model present for the current slice.
    pub present: bool,
    /// First used bin index.
    pub min_bin_idx: u32,
    /// Last used bin index.
    pub max_bin_idx: u32,
    /// Signed code-word delta per bin.
    pub bin_cw_delta: [i32; RESHAPE_CW_BINS],
}

impl ReshapeModel {
    /// Model using `cw` code words in every bin of `[min_bin, max_bin]`.
    pub fn uniform(min_bin: u32, max_bin: u32, cw_delta: i32) -> Self {
        Self {
            present: true,
            min_bin_idx: min_bin,
            max_bin_idx: max_bin,
            bin_cw_delta: [cw_delta; RESHAPE_CW_BINS],
        }
    }
}
