//! Rate-distortion cost engine.
//!
//! Owns the Lagrangian state of one encoding context: the multiplier
//! `lambda`, its derived distortion scale `2^SCALE_BITS / lambda`, the
//! SAD-domain motion lambda, per-chroma distortion weights, the paired
//! lambda adjustment used under the adaptive color transform, and (with the
//! `wcg` feature) the luma-adaptive perceptual weighting tables.
//!
//! One instance per encoding context: the engine is mutated per slice and
//! must not be shared mutably across threads working on different slices.

use tracing::debug;

use crate::buf::{BitDepths, ComponentId, Distortion, Pel, PelBuf};
#[cfg(feature = "wcg")]
use crate::buf::{distortion_precision_adjustment, ChromaFormat, Intermediate};
use crate::config::CostMode;
#[cfg(feature = "wcg")]
use crate::config::{ReshapeModel, SignalType, RESHAPE_CW_BINS};
use crate::dist::{DistFuncKind, DistParam};
#[cfg(feature = "wcg")]
use crate::error::{RdError, Result};

/// Fixed-point precision of fractional bit estimates.
pub const SCALE_BITS: u32 = 15;

/// Fixed-point precision of the chroma residual scale factor.
pub const CSCALE_FP_PREC: u32 = 11;

/// Fractional bits of the luma-adaptive MSE weights.
#[cfg(feature = "wcg")]
pub const MSE_WEIGHT_FRAC_BITS: u32 = 16;

/// Unity in MSE-weight fixed point.
#[cfg(feature = "wcg")]
pub const MSE_WEIGHT_ONE: i64 = 1 << MSE_WEIGHT_FRAC_BITS;

/// Per-component QP offsets of the adaptive color transform.
const DELTA_QP_ACT: [i32; 3] = [-5, 5, 3];

/// Row sub-sampling policy applied when populating a [`DistParam`].
///
/// Trades RD-search accuracy for encoder speed in a standardized way; the
/// thresholds must not be altered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubShiftMode {
    /// Evaluate every row.
    #[default]
    Off,
    /// Largest power-of-two row stride keeping the height divisible:
    /// shift 4 above 32 rows, 3 above 16, 2 above 8, else 1.
    Adaptive,
    /// Every second row for blocks taller than 8 rows and at most 64 wide.
    FlatNarrow,
    /// Every second row for blocks taller than 8 rows.
    Flat,
}

/// Rate-distortion cost engine state.
#[derive(Debug, Clone)]
pub struct RdCost {
    lambda: f64,
    dist_scale: f64,
    lambda_motion_sad: f64,
    motion_lambda: f64,
    cost_scale: u32,
    cost_mode: CostMode,
    is_lossless_rd: bool,
    distortion_weight: [f64; 3],
    lambda_store: [[f64; 3]; 2],
    dist_scale_store: [[f64; 3]; 2],
    reset_store: bool,
    pair_check: u8,
    #[cfg(feature = "wcg")]
    lambda_unadjusted: f64,
    #[cfg(feature = "wcg")]
    dist_scale_unadjusted: f64,
    #[cfg(feature = "wcg")]
    signal_type: SignalType,
    #[cfg(feature = "wcg")]
    luma_bit_depth: u8,
    #[cfg(feature = "wcg")]
    chroma_format: ChromaFormat,
    #[cfg(feature = "wcg")]
    luma_weight_lut: Vec<f64>,
    #[cfg(feature = "wcg")]
    reshape_weight_lut: Vec<i64>,
    #[cfg(feature = "wcg")]
    chroma_weight: i64,
}

impl Default for RdCost {
    fn default() -> Self {
        Self::new()
    }
}

impl RdCost {
    /// Create an engine with neutral weights and lossy cost mode.
    pub fn new() -> Self {
        Self {
            lambda: 1.0,
            dist_scale: f64::from(1u32 << SCALE_BITS),
            lambda_motion_sad: 1.0,
            motion_lambda: 0.0,
            cost_scale: 0,
            cost_mode: CostMode::StandardLossy,
            is_lossless_rd: false,
            distortion_weight: [1.0; 3],
            lambda_store: [[0.0; 3]; 2],
            dist_scale_store: [[0.0; 3]; 2],
            reset_store: true,
            pair_check: 0,
            #[cfg(feature = "wcg")]
            lambda_unadjusted: 1.0,
            #[cfg(feature = "wcg")]
            dist_scale_unadjusted: f64::from(1u32 << SCALE_BITS),
            #[cfg(feature = "wcg")]
            signal_type: SignalType::Sdr,
            #[cfg(feature = "wcg")]
            luma_bit_depth: 10,
            #[cfg(feature = "wcg")]
            chroma_format: ChromaFormat::Cf420,
            #[cfg(feature = "wcg")]
            luma_weight_lut: Vec::new(),
            #[cfg(feature = "wcg")]
            reshape_weight_lut: Vec::new(),
            #[cfg(feature = "wcg")]
            chroma_weight: MSE_WEIGHT_ONE,
        }
    }

    /// Current Lagrange multiplier.
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Current distortion scale (`2^SCALE_BITS / lambda`).
    pub fn dist_scale(&self) -> f64 {
        self.dist_scale
    }

    /// SAD-domain lambda for pure motion cost estimates.
    pub fn lambda_motion_sad(&self) -> f64 {
        self.lambda_motion_sad
    }

    /// Set the Lagrange multiplier for the upcoming slice.
    ///
    /// Derives the distortion scale and the SAD-domain motion lambda.
    pub fn set_lambda(&mut self, lambda: f64, bit_depths: BitDepths) {
        debug_assert!(lambda > 0.0);
        self.lambda = lambda;
        self.dist_scale = f64::from(1u32 << SCALE_BITS) / lambda;
        self.lambda_motion_sad = lambda.sqrt();
        self.reset_store = true;
        #[cfg(feature = "wcg")]
        {
            self.luma_bit_depth = bit_depths.luma;
        }
        let _ = bit_depths;
        debug!(lambda, dist_scale = self.dist_scale, "lambda updated");
    }

    /// Configure the cost mode; `is_lossless_rd` arms the lossless
    /// distortion sentinel in [`calc_rd_cost`](Self::calc_rd_cost).
    pub fn set_cost_mode(&mut self, mode: CostMode, is_lossless_rd: bool) {
        self.cost_mode = mode;
        self.is_lossless_rd = is_lossless_rd;
        debug!(?mode, is_lossless_rd, "cost mode updated");
    }

    /// Set the multiplicative distortion weight of a component.
    pub fn set_distortion_weight(&mut self, comp: ComponentId, weight: f64) {
        self.distortion_weight[comp.idx()] = weight;
    }

    /// Latch the SAD-domain lambda as the active motion lambda.
    pub fn select_motion_lambda(&mut self) {
        self.motion_lambda = self.lambda_motion_sad;
    }

    /// Set the motion-vector cost scale shift.
    pub fn set_cost_scale(&mut self, scale: u32) {
        self.cost_scale = scale;
    }

    /// Current motion-vector cost scale shift.
    pub fn cost_scale(&self) -> u32 {
        self.cost_scale
    }

    /// Motion-estimation rate cost of `bits` estimate bits.
    pub fn motion_cost(&self, bits: u32) -> Distortion {
        (self.motion_lambda * f64::from(bits) / 65536.0) as Distortion
    }

    /// Lagrangian cost of a candidate: `dist_scale * distortion + bits`.
    ///
    /// In lossless mode with the lossless-RD flag armed, any non-zero
    /// distortion invalidates the candidate with an infinite-cost sentinel.
    pub fn calc_rd_cost(&self, frac_bits: u64, distortion: Distortion) -> f64 {
        if self.cost_mode == CostMode::Lossless && distortion != 0 && self.is_lossless_rd {
            return f64::MAX;
        }
        self.dist_scale * distortion as f64 + frac_bits as f64
    }

    /// As [`calc_rd_cost`](Self::calc_rd_cost) but optionally priced with
    /// the saved unadjusted lambda.
    #[cfg(feature = "wcg")]
    pub fn calc_rd_cost_unadjusted(
        &self,
        frac_bits: u64,
        distortion: Distortion,
        use_unadjusted_lambda: bool,
    ) -> f64 {
        if self.cost_mode == CostMode::Lossless && distortion != 0 && self.is_lossless_rd {
            return f64::MAX;
        }
        let scale = if use_unadjusted_lambda {
            self.dist_scale_unadjusted
        } else {
            self.dist_scale
        };
        scale * distortion as f64 + frac_bits as f64
    }

    /// Snapshot the current lambda as the unadjusted reference.
    #[cfg(feature = "wcg")]
    pub fn save_unadjusted_lambda(&mut self) {
        self.lambda_unadjusted = self.lambda;
        self.dist_scale_unadjusted = self.dist_scale;
    }

    /// The saved unadjusted lambda.
    #[cfg(feature = "wcg")]
    pub fn unadjusted_lambda(&self) -> f64 {
        self.lambda_unadjusted
    }

    /// Toggle between the unadjusted lambda and the one adjusted by the
    /// adaptive-color-transform QP offset of `comp`.
    ///
    /// Calls must alternate `forward = true` / `forward = false`; breaking
    /// the pairing is a caller bug and aborts. With `apply_chroma_scale`
    /// the adjusted lambda is further divided by the squared fixed-point
    /// chroma residual scale `((1 << CSCALE_FP_PREC) / res_scale_inv)^2`.
    pub fn lambda_adjust_color_trans(
        &mut self,
        forward: bool,
        comp: ComponentId,
        apply_chroma_scale: bool,
        res_scale_inv: i32,
    ) {
        if self.reset_store {
            for c in 0..3 {
                let rate = 2f64.powf(f64::from(DELTA_QP_ACT[c]) / 3.0);
                self.lambda_store[0][c] = self.lambda;
                self.dist_scale_store[0][c] = self.dist_scale;
                self.lambda_store[1][c] = self.lambda * rate;
                self.dist_scale_store[1][c] = f64::from(1u32 << SCALE_BITS) / self.lambda_store[1][c];
            }
            self.reset_store = false;
        }

        if forward {
            assert!(self.pair_check == 0, "lambda has been already adjusted");
            self.pair_check = 1;
        } else {
            assert!(self.pair_check == 1, "lambda has not been adjusted");
            self.pair_check = 0;
        }

        self.lambda = self.lambda_store[self.pair_check as usize][comp.idx()];
        self.dist_scale = self.dist_scale_store[self.pair_check as usize][comp.idx()];

        if apply_chroma_scale {
            assert!(
                self.pair_check == 1 && comp != ComponentId::Y,
                "wrong lambda adjustment for chroma scaling"
            );
            let c_res_scale = f64::from(1u32 << CSCALE_FP_PREC) / f64::from(res_scale_inv);
            self.lambda /= c_res_scale * c_res_scale;
            self.dist_scale = f64::from(1u32 << SCALE_BITS) / self.lambda;
        }

        #[cfg(feature = "wcg")]
        if self.pair_check == 0 {
            assert!(
                self.dist_scale == self.dist_scale_unadjusted,
                "lambda should be adjusted back to the original value"
            );
        }
    }

    // -----------------------------------------------------------------------
    // DistParam population
    // -----------------------------------------------------------------------

    /// Parameter block over a buffer pair, full-row evaluation.
    pub fn dist_param<'a>(
        &self,
        org: PelBuf<'a>,
        cur: PelBuf<'a>,
        bit_depth: u8,
        comp_id: ComponentId,
        use_hadamard: bool,
        use_mr: bool,
    ) -> DistParam<'a> {
        let mut dp = DistParam::new(org, cur, bit_depth, comp_id);
        dp.use_mr = use_mr;
        dp.dist_func = Self::select_kernel(use_hadamard, use_mr, org.width);
        dp
    }

    /// Parameter block for motion search against a reference plane,
    /// applying the standardized row sub-sampling policy.
    pub fn dist_param_sub_sampled<'a>(
        &self,
        org: PelBuf<'a>,
        cur_buf: &'a [Pel],
        cur_stride: usize,
        bit_depth: u8,
        comp_id: ComponentId,
        mode: SubShiftMode,
        step: usize,
        use_hadamard: bool,
        use_mr: bool,
    ) -> DistParam<'a> {
        let cur = PelBuf::new(cur_buf, cur_stride, org.width, org.height);
        let mut dp = DistParam::new(org, cur, bit_depth, comp_id);
        dp.step = step;
        dp.use_mr = use_mr;
        dp.dist_func = Self::select_kernel(use_hadamard, use_mr, org.width);
        dp.sub_shift = match mode {
            SubShiftMode::Off => 0,
            SubShiftMode::Adaptive => {
                if org.height > 32 && org.height % 16 == 0 {
                    4
                } else if org.height > 16 && org.height % 8 == 0 {
                    3
                } else if org.height > 8 && org.height % 4 == 0 {
                    2
                } else if org.height % 2 == 0 {
                    1
                } else {
                    0
                }
            }
            SubShiftMode::FlatNarrow => u32::from(org.height > 8 && org.width <= 64),
            SubShiftMode::Flat => u32::from(org.height > 8),
        };
        dp
    }

    /// Parameter block for the decoder-side motion refinement SAD: raw
    /// pointer pair, direct sub-shift, no Hadamard or mean removal.
    pub fn dist_param_motion<'a>(
        &self,
        org_buf: &'a [Pel],
        org_stride: usize,
        cur_buf: &'a [Pel],
        cur_stride: usize,
        bit_depth: u8,
        comp_id: ComponentId,
        width: u32,
        height: u32,
        sub_shift: u32,
        step: usize,
        bio_applied: bool,
    ) -> DistParam<'a> {
        let org = PelBuf::new(org_buf, org_stride, width, height);
        let cur = PelBuf::new(cur_buf, cur_stride, width, height);
        let mut dp = DistParam::new(org, cur, bit_depth, comp_id);
        dp.sub_shift = sub_shift;
        dp.step = step;
        dp.dist_func = if bio_applied {
            DistFuncKind::SadIntermediate.resolve(width)
        } else {
            DistFuncKind::Sad.resolve(width)
        };
        dp
    }

    /// Parameter block for masked motion cost estimation.
    pub fn dist_param_masked<'a>(
        &self,
        org: PelBuf<'a>,
        cur_buf: &'a [Pel],
        cur_stride: usize,
        mask: &'a [Pel],
        mask_offset: usize,
        mask_stride: isize,
        mask_step_x: isize,
        mask_stride2: isize,
        bit_depth: u8,
        comp_id: ComponentId,
    ) -> DistParam<'a> {
        let cur = PelBuf::new(cur_buf, cur_stride, org.width, org.height);
        let mut dp = DistParam::new(org, cur, bit_depth, comp_id);
        dp.mask = Some(mask);
        dp.mask_offset = mask_offset;
        dp.mask_stride = mask_stride;
        dp.mask_step_x = mask_step_x;
        dp.mask_stride2 = mask_stride2;
        dp.dist_func = DistFuncKind::SadWithMask.resolve(org.width);
        dp
    }

    fn select_kernel(use_hadamard: bool, use_mr: bool, width: u32) -> crate::dist::DistFunc {
        let kind = match (use_hadamard, use_mr) {
            (false, false) => DistFuncKind::Sad,
            (false, true) => DistFuncKind::Mrsad,
            (true, false) => DistFuncKind::Had,
            (true, true) => DistFuncKind::Mrhad,
        };
        kind.resolve(width)
    }

    // -----------------------------------------------------------------------
    // End-to-end distortion
    // -----------------------------------------------------------------------

    /// Distortion of a block pair under `kind`, with the per-component
    /// distortion reweighting applied for chroma.
    pub fn get_dist_part(
        &self,
        org: PelBuf<'_>,
        cur: PelBuf<'_>,
        bit_depth: u8,
        comp_id: ComponentId,
        kind: DistFuncKind,
    ) -> Distortion {
        let mut dp = DistParam::new(org, cur, bit_depth, comp_id);
        dp.dist_func = kind.resolve(org.width);
        let dist = dp.distortion();
        if comp_id.is_chroma() {
            (self.distortion_weight[comp_id.idx()] * dist as f64) as Distortion
        } else {
            dist
        }
    }

    /// Luma-adaptive weighted distortion of a block pair.
    ///
    /// Chroma under an SDR/HLG reshaping signal takes the flat
    /// chroma-weight SSE fast path; everything else goes through the
    /// per-sample reshape-LUT weighted SSE with subsampled luma addressing.
    #[cfg(feature = "wcg")]
    pub fn get_dist_part_weighted(
        &self,
        org: PelBuf<'_>,
        cur: PelBuf<'_>,
        bit_depth: u8,
        comp_id: ComponentId,
        org_luma: PelBuf<'_>,
    ) -> Distortion {
        let mut dp = DistParam::new(org, cur, bit_depth, comp_id);
        dp.org_luma = Some(if comp_id.is_chroma() { org_luma } else { org });

        let mut dist = if comp_id.is_chroma()
            && matches!(self.signal_type, SignalType::Sdr | SignalType::Hlg)
        {
            dp.dist_func = DistFuncKind::Sse.resolve(org.width);
            let sse = dp.distortion();
            ((self.chroma_weight * sse as i64 + (1 << MSE_WEIGHT_FRAC_BITS >> 1))
                >> MSE_WEIGHT_FRAC_BITS) as Distortion
        } else {
            dp.c_shift_x = self.chroma_format.component_scale_x(comp_id);
            dp.c_shift_y = self.chroma_format.component_scale_y(comp_id);
            self.weighted_sse_dispatch(&dp)
        };

        if comp_id.is_chroma() {
            dist = (self.distortion_weight[comp_id.idx()] * dist as f64) as Distortion;
        }
        dist
    }

    // -----------------------------------------------------------------------
    // Perceptual weighting tables (wcg)
    // -----------------------------------------------------------------------

    /// Set the reshape signal classification and geometry.
    #[cfg(feature = "wcg")]
    pub fn set_reshape_info(
        &mut self,
        signal_type: SignalType,
        luma_bit_depth: u8,
        chroma_format: ChromaFormat,
    ) {
        self.signal_type = signal_type;
        self.luma_bit_depth = luma_bit_depth;
        self.chroma_format = chroma_format;
    }

    /// The fixed HDR tone-curve weight for a 10-bit-domain luma level.
    #[cfg(feature = "wcg")]
    fn hdr_weight(x: f64) -> f64 {
        let y = (0.015 * x - 1.5 - 6.0).clamp(-3.0, 6.0);
        2f64.powf(y / 3.0)
    }

    /// Build the floating-point luma-level weight LUT from the fixed HDR
    /// tone curve.
    #[cfg(feature = "wcg")]
    pub fn init_luma_level_to_weight_table(&mut self, bit_depth: u8) {
        let lut_size = 1usize << bit_depth;
        self.luma_bit_depth = bit_depth;
        if self.luma_weight_lut.is_empty() {
            self.luma_weight_lut = vec![1.0; lut_size];
        }
        for i in 0..lut_size {
            let x = match bit_depth.cmp(&10) {
                std::cmp::Ordering::Less => (i << (10 - bit_depth)) as f64,
                std::cmp::Ordering::Greater => (i >> (bit_depth - 10)) as f64,
                std::cmp::Ordering::Equal => i as f64,
            };
            self.luma_weight_lut[i] = Self::hdr_weight(x);
        }
        debug!(bit_depth, "luma weight table initialized");
    }

    /// Build the fixed-point reshape weight LUT; for PQ content the HDR
    /// tone curve seeds both tables.
    #[cfg(feature = "wcg")]
    pub fn init_luma_level_to_weight_table_reshape(&mut self) {
        let lut_size = 1usize << self.luma_bit_depth;
        if self.reshape_weight_lut.is_empty() {
            self.reshape_weight_lut = vec![MSE_WEIGHT_ONE; lut_size];
        }
        if self.luma_weight_lut.is_empty() {
            self.luma_weight_lut = vec![1.0; lut_size];
        }
        if self.signal_type == SignalType::Pq {
            for i in 0..lut_size {
                let x = match self.luma_bit_depth.cmp(&10) {
                    std::cmp::Ordering::Less => (i << (10 - self.luma_bit_depth)) as f64,
                    std::cmp::Ordering::Greater => (i >> (self.luma_bit_depth - 10)) as f64,
                    std::cmp::Ordering::Equal => i as f64,
                };
                let weight = Self::hdr_weight(x);
                self.reshape_weight_lut[i] = (weight * MSE_WEIGHT_ONE as f64) as i64;
                self.luma_weight_lut[i] = weight;
            }
        }
    }

    /// Rebuild the reshape weight LUT from the slice reshaper model.
    ///
    /// `wt_table` holds the per-bin code-word counts, `chroma_weight_total`
    /// the derived chroma weight. Only SDR/HLG reshaping carries a model.
    #[cfg(feature = "wcg")]
    pub fn update_reshape_luma_level_to_weight_table(
        &mut self,
        model: &ReshapeModel,
        wt_table: &[Pel],
        chroma_weight_total: f64,
    ) -> Result<()> {
        if !matches!(self.signal_type, SignalType::Sdr | SignalType::Hlg) {
            return Err(RdError::SignalType(
                "reshaper weight update requires SDR or HLG signalling".to_string(),
            ));
        }
        if !model.present {
            return Err(RdError::ReshapeModel(
                "slice reshape model not present".to_string(),
            ));
        }
        if wt_table.len() < RESHAPE_CW_BINS {
            return Err(RdError::ReshapeModel(format!(
                "weight table holds {} bins, need {}",
                wt_table.len(),
                RESHAPE_CW_BINS
            )));
        }

        let lut_size = 1usize << self.luma_bit_depth;
        if self.reshape_weight_lut.is_empty() {
            self.reshape_weight_lut = vec![MSE_WEIGHT_ONE; lut_size];
        }
        let hist_bin_width = lut_size / RESHAPE_CW_BINS;
        let w_bin = 1.0;

        for i in 0..RESHAPE_CW_BINS {
            let weight = if (i as u32) < model.min_bin_idx || (i as u32) > model.max_bin_idx {
                1.0
            } else if model.bin_cw_delta[i] == 1
                || model.bin_cw_delta[i] == -(hist_bin_width as i32)
            {
                w_bin
            } else {
                let w = f64::from(wt_table[i]) / hist_bin_width as f64;
                w * w
            };
            for j in 0..hist_bin_width {
                self.reshape_weight_lut[i * hist_bin_width + j] =
                    (weight * MSE_WEIGHT_ONE as f64) as i64;
            }
        }
        self.chroma_weight = (chroma_weight_total * MSE_WEIGHT_ONE as f64) as i64;
        debug!("reshape weight table rebuilt from slice model");
        Ok(())
    }

    /// Rebuild the reshape LUT through the inverse luma mapping, for
    /// chroma mode decision in the mapped domain.
    #[cfg(feature = "wcg")]
    pub fn update_reshape_luma_level_to_weight_table_chroma_md(&mut self, inverse_lut: &[Pel]) {
        let lut_size = 1usize << self.luma_bit_depth;
        for i in 0..lut_size {
            self.reshape_weight_lut[i] =
                (self.luma_weight_lut[inverse_lut[i] as usize] * MSE_WEIGHT_ONE as f64) as i64;
        }
    }

    /// Restore the reshape LUT to the plain fixed-point image of the
    /// floating-point table.
    #[cfg(feature = "wcg")]
    pub fn restore_reshape_luma_level_to_weight_table(&mut self) {
        let lut_size = 1usize << self.luma_bit_depth;
        for i in 0..lut_size {
            self.reshape_weight_lut[i] = (self.luma_weight_lut[i] * MSE_WEIGHT_ONE as f64) as i64;
        }
    }

    /// Weighted squared error of one sample pair, weight taken from the
    /// reshape LUT at the co-located original luma level.
    #[cfg(feature = "wcg")]
    pub fn weighted_mse(
        &self,
        comp_id: ComponentId,
        org: Pel,
        cur: Pel,
        shift: u32,
        org_luma: Pel,
    ) -> Distortion {
        debug_assert!(org >= 0, "sample value must be positive");
        if comp_id == ComponentId::Y {
            debug_assert_eq!(org, org_luma, "luma sample values must be equal");
        }
        let diff = Intermediate::from(org) - Intermediate::from(cur);
        let weight = self.reshape_weight_lut[org_luma as usize];
        ((weight * (diff * diff) + (1 << MSE_WEIGHT_FRAC_BITS >> 1))
            >> (MSE_WEIGHT_FRAC_BITS + shift)) as Distortion
    }

    #[cfg(feature = "wcg")]
    fn weighted_sse_dispatch(&self, dp: &DistParam) -> Distortion {
        match dp.org.width {
            2 => self.weighted_sse_fixed::<2>(dp),
            4 => self.weighted_sse_fixed::<4>(dp),
            8 => self.weighted_sse_fixed::<8>(dp),
            16 => self.weighted_sse_fixed::<16>(dp),
            32 => self.weighted_sse_fixed::<32>(dp),
            64 => self.weighted_sse_fixed::<64>(dp),
            _ => self.weighted_sse_any(dp),
        }
    }

    #[cfg(feature = "wcg")]
    fn weighted_sse_fixed<const W: usize>(&self, dp: &DistParam) -> Distortion {
        if dp.apply_weight {
            assert_eq!(dp.org.width as usize, W, "invalid size");
            return (dp
                .weight_fn
                .expect("weighted prediction requested without an installed helper"))(dp);
        }
        debug_assert_eq!(dp.org.width as usize, W);
        self.weighted_sse_rows(dp, W)
    }

    #[cfg(feature = "wcg")]
    fn weighted_sse_any(&self, dp: &DistParam) -> Distortion {
        if dp.apply_weight {
            return (dp
                .weight_fn
                .expect("weighted prediction requested without an installed helper"))(dp);
        }
        self.weighted_sse_rows(dp, dp.org.width as usize)
    }

    #[cfg(feature = "wcg")]
    fn weighted_sse_rows(&self, dp: &DistParam, cols: usize) -> Distortion {
        let org_luma = dp.org_luma.expect("weighted SSE requires original luma");
        let shift = distortion_precision_adjustment(dp.bit_depth) << 1;
        let mut sum: Distortion = 0;
        for y in 0..dp.org.height {
            let org = dp.org.row(y);
            let cur = &dp.cur.buf[y as usize * dp.cur.stride..][..cols];
            let luma_row =
                &org_luma.buf[(y as usize) * (org_luma.stride << dp.c_shift_y)..];
            for n in 0..cols {
                sum += self.weighted_mse(
                    dp.comp_id,
                    org[n],
                    cur[n],
                    shift,
                    luma_row[n << dp.c_shift_x],
                );
            }
        }
        sum
    }
}
