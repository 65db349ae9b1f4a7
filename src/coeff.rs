//! Per-transform-unit coefficient coding context.
//!
//! One context is constructed per transform-unit component and walked over
//! the coefficient groups in reverse diagonal scan order, by both the
//! encoder and the decoder. Construction derives the immutable geometry
//! (group sizes, scan tables, last-position context offsets, dynamic-range
//! bounds); [`CoeffCodingContext::init_subblock`] advances the mutable
//! per-subblock state.
//!
//! The two residual-coding syntax variants derive their group-significance
//! contexts from opposite neighborhoods: regular residual coding looks at
//! the *right/lower* groups, transform-skip residual coding at the
//! *left/above* groups. The asymmetry is normative.

use crate::buf::{clip3, floor_log2, ChannelType, ComponentId};
use crate::config::{SpsFlags, SpsParams};
use crate::ctx::{ctx_sets, CtxSet};
use crate::scan::{
    group_idx, grouped_scan, log2_tx_subblock_size, nonzero_tu_size, ungrouped_scan, ScanElement,
};

/// Block-based delta pulse code modulation mode of the transform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BdpcmMode {
    /// No BDPCM.
    #[default]
    None,
    /// Horizontal prediction direction.
    Horizontal,
    /// Vertical prediction direction.
    Vertical,
}

impl BdpcmMode {
    /// Whether BDPCM is active.
    pub fn is_active(self) -> bool {
        self != Self::None
    }
}

/// Golomb-Rice parameter derivation strategy, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiceDerivation {
    /// Table lookup over the clamped neighbor template sum.
    Standard,
    /// Range-extension derivation: threshold/shift ladder ahead of the
    /// table, with history-assisted state.
    Extended,
}

/// Rice parameter table over the clamped template sum.
const GO_RICE_PARS: [u32; 32] = [
    0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 2, 2,
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
];

/// Template-sum thresholds of the extended derivation ladder.
const RICE_THRESHOLDS: [u32; 4] = [32, 128, 512, 2048];

/// Shifts paired with the ladder rungs.
const RICE_SHIFTS: [u32; 5] = [0, 2, 4, 6, 8];

/// Luma last-position prefix context offsets, indexed by log2 size.
const PREFIX_CTX: [u32; 8] = [0, 0, 0, 3, 6, 10, 15, 21];

/// Significance bitset over the coefficient groups of one transform unit
/// (at most 16x16 groups over the 32x32 nonzero area).
#[derive(Debug, Clone, Default)]
struct GroupFlags([u64; 4]);

impl GroupFlags {
    #[inline]
    fn set(&mut self, idx: usize) {
        self.0[idx >> 6] |= 1u64 << (idx & 63);
    }

    #[inline]
    fn get(&self, idx: usize) -> bool {
        (self.0[idx >> 6] >> (idx & 63)) & 1 != 0
    }
}

#[inline]
fn sgn(v: i32) -> i32 {
    i32::from(v > 0) - i32::from(v < 0)
}

/// State machine driving entropy coding of one transform-unit component.
#[derive(Debug, Clone)]
pub struct CoeffCodingContext {
    comp_id: ComponentId,
    ch_type: ChannelType,
    width: u32,
    height: u32,
    log2_cg_width: u32,
    log2_cg_height: u32,
    log2_cg_size: u32,
    width_in_groups: u32,
    height_in_groups: u32,
    log2_block_width: u32,
    log2_block_height: u32,
    max_num_coeff: u32,
    sign_hiding: bool,
    extended_precision: bool,
    max_log2_tr_dynamic_range: u8,
    scan: &'static [ScanElement],
    scan_cg: &'static [ScanElement],
    ctx_set_last_x: CtxSet,
    ctx_set_last_y: CtxSet,
    max_last_pos_x: u32,
    max_last_pos_y: u32,
    last_offset_x: u32,
    last_offset_y: u32,
    last_shift_x: u32,
    last_shift_y: u32,
    min_coeff: i32,
    max_coeff: i32,
    scan_pos_last: i32,
    subset_id: i32,
    subset_pos: u32,
    subset_pos_x: u32,
    subset_pos_y: u32,
    min_sub_pos: i32,
    max_sub_pos: i32,
    sig_group_ctx_id: u32,
    tmpl_cp_sum1: i32,
    tmpl_cp_diag: i32,
    sig_flag_ctx_set: [CtxSet; 3],
    par_flag_ctx_set: CtxSet,
    gt1_flag_ctx_set: CtxSet,
    gt2_flag_ctx_set: CtxSet,
    sig_group_ctx_id_ts: u32,
    sig_coeff_group_flag: GroupFlags,
    bdpcm: BdpcmMode,
    rice_derivation: RiceDerivation,
    base_level: i32,
    hist_value: u32,
    update_hist: bool,
}

impl CoeffCodingContext {
    /// Build a fresh context for a `width` x `height` transform block of
    /// `comp_id`. No state survives from previous transform units.
    pub fn new(
        width: u32,
        height: u32,
        comp_id: ComponentId,
        sps: &SpsParams,
        sign_hiding: bool,
        bdpcm: BdpcmMode,
    ) -> Self {
        let ch_type = comp_id.channel_type();
        let log2_block_width = floor_log2(width);
        let log2_block_height = floor_log2(height);
        let (log2_cg_width, log2_cg_height) =
            log2_tx_subblock_size(log2_block_width, log2_block_height);
        let width_in_groups = nonzero_tu_size(width) >> log2_cg_width;
        let height_in_groups = nonzero_tu_size(height) >> log2_cg_height;
        let dyn_range = sps.max_log2_tr_dynamic_range(ch_type);

        let (last_offset_x, last_offset_y, last_shift_x, last_shift_y) =
            if ch_type == ChannelType::Chroma {
                (
                    0,
                    0,
                    clip3(0, 2, (width >> 3) as i32) as u32,
                    clip3(0, 2, (height >> 3) as i32) as u32,
                )
            } else {
                (
                    PREFIX_CTX[log2_block_width as usize],
                    PREFIX_CTX[log2_block_height as usize],
                    (log2_block_width + 1) >> 2,
                    (log2_block_height + 1) >> 2,
                )
            };

        let rice_derivation = if sps.flags.contains(SpsFlags::RICE_EXTENSION) {
            RiceDerivation::Extended
        } else {
            RiceDerivation::Standard
        };

        let luma = ch_type == ChannelType::Luma;
        Self {
            comp_id,
            ch_type,
            width,
            height,
            log2_cg_width,
            log2_cg_height,
            log2_cg_size: log2_cg_width + log2_cg_height,
            width_in_groups,
            height_in_groups,
            log2_block_width,
            log2_block_height,
            max_num_coeff: width * height,
            sign_hiding,
            extended_precision: sps.flags.contains(SpsFlags::EXTENDED_PRECISION),
            max_log2_tr_dynamic_range: dyn_range,
            scan: grouped_scan(
                floor_log2(nonzero_tu_size(width)),
                floor_log2(nonzero_tu_size(height)),
            ),
            scan_cg: ungrouped_scan(floor_log2(width_in_groups), floor_log2(height_in_groups)),
            ctx_set_last_x: if luma {
                ctx_sets::LAST_X_LUMA
            } else {
                ctx_sets::LAST_X_CHROMA
            },
            ctx_set_last_y: if luma {
                ctx_sets::LAST_Y_LUMA
            } else {
                ctx_sets::LAST_Y_CHROMA
            },
            max_last_pos_x: group_idx(nonzero_tu_size(width) - 1),
            max_last_pos_y: group_idx(nonzero_tu_size(height) - 1),
            last_offset_x,
            last_offset_y,
            last_shift_x,
            last_shift_y,
            min_coeff: -(1 << dyn_range),
            max_coeff: (1 << dyn_range) - 1,
            scan_pos_last: -1,
            subset_id: -1,
            subset_pos: 0,
            subset_pos_x: 0,
            subset_pos_y: 0,
            min_sub_pos: -1,
            max_sub_pos: -1,
            sig_group_ctx_id: 0,
            tmpl_cp_sum1: -1,
            tmpl_cp_diag: -1,
            sig_flag_ctx_set: [
                ctx_sets::sig_flag(ch_type, 0),
                ctx_sets::sig_flag(ch_type, 1),
                ctx_sets::sig_flag(ch_type, 2),
            ],
            par_flag_ctx_set: if luma {
                ctx_sets::PAR_FLAG_LUMA
            } else {
                ctx_sets::PAR_FLAG_CHROMA
            },
            gt1_flag_ctx_set: if luma {
                ctx_sets::GT1_FLAG_LUMA
            } else {
                ctx_sets::GT1_FLAG_CHROMA
            },
            gt2_flag_ctx_set: if luma {
                ctx_sets::GT2_FLAG_LUMA
            } else {
                ctx_sets::GT2_FLAG_CHROMA
            },
            sig_group_ctx_id_ts: 0,
            sig_coeff_group_flag: GroupFlags::default(),
            bdpcm,
            rice_derivation,
            base_level: 4,
            hist_value: 0,
            update_hist: sps.flags.contains(SpsFlags::RICE_EXTENSION),
        }
    }

    // -----------------------------------------------------------------------
    // Geometry accessors
    // -----------------------------------------------------------------------

    /// Component being coded.
    pub fn comp_id(&self) -> ComponentId {
        self.comp_id
    }

    /// Channel type of the component.
    pub fn ch_type(&self) -> ChannelType {
        self.ch_type
    }

    /// Block width in samples.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Block height in samples.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// log2 block width / height.
    pub fn log2_block_dims(&self) -> (u32, u32) {
        (self.log2_block_width, self.log2_block_height)
    }

    /// Max log2 transform dynamic range of the channel.
    pub fn max_log2_tr_dynamic_range(&self) -> u8 {
        self.max_log2_tr_dynamic_range
    }

    /// log2 coefficient-group width / height.
    pub fn log2_cg_dims(&self) -> (u32, u32) {
        (self.log2_cg_width, self.log2_cg_height)
    }

    /// log2 number of coefficients per group.
    pub fn log2_cg_size(&self) -> u32 {
        self.log2_cg_size
    }

    /// Coefficient groups per row.
    pub fn width_in_groups(&self) -> u32 {
        self.width_in_groups
    }

    /// Coefficient groups per column.
    pub fn height_in_groups(&self) -> u32 {
        self.height_in_groups
    }

    /// Total number of coefficient groups.
    pub fn num_groups(&self) -> u32 {
        self.width_in_groups * self.height_in_groups
    }

    /// Total number of coefficients in the block.
    pub fn max_num_coeff(&self) -> u32 {
        self.max_num_coeff
    }

    /// Whether sign-data hiding applies.
    pub fn sign_hiding(&self) -> bool {
        self.sign_hiding
    }

    /// Whether extended-precision processing is active.
    pub fn extended_precision(&self) -> bool {
        self.extended_precision
    }

    /// BDPCM mode of the block.
    pub fn bdpcm(&self) -> BdpcmMode {
        self.bdpcm
    }

    /// Smallest representable coefficient level.
    pub fn min_coeff(&self) -> i32 {
        self.min_coeff
    }

    /// Largest representable coefficient level.
    pub fn max_coeff(&self) -> i32 {
        self.max_coeff
    }

    /// Largest last-position prefix group index in x.
    pub fn max_last_pos_x(&self) -> u32 {
        self.max_last_pos_x
    }

    /// Largest last-position prefix group index in y.
    pub fn max_last_pos_y(&self) -> u32 {
        self.max_last_pos_y
    }

    /// Horizontal position of a scan index.
    #[inline]
    pub fn pos_x(&self, scan_pos: usize) -> u32 {
        u32::from(self.scan[scan_pos].x)
    }

    /// Vertical position of a scan index.
    #[inline]
    pub fn pos_y(&self, scan_pos: usize) -> u32 {
        u32::from(self.scan[scan_pos].y)
    }

    /// Raster index of a scan index within the full block.
    #[inline]
    pub fn blk_pos(&self, scan_pos: usize) -> usize {
        (self.pos_y(scan_pos) * self.width + self.pos_x(scan_pos)) as usize
    }

    // -----------------------------------------------------------------------
    // Subblock state machine
    // -----------------------------------------------------------------------

    /// Record the last significant scan position found by the coder.
    pub fn set_scan_pos_last(&mut self, scan_pos: i32) {
        self.scan_pos_last = scan_pos;
    }

    /// Last significant scan position, `-1` until found.
    pub fn scan_pos_last(&self) -> i32 {
        self.scan_pos_last
    }

    /// Enter coefficient group `subset_id` (reverse scan order), marking
    /// it significant when `sig_group_flag` is set, and derive both
    /// group-significance context ids.
    ///
    /// Subblock-dependent accessors are only valid between this call and
    /// the next one.
    pub fn init_subblock(&mut self, subset_id: usize, sig_group_flag: bool) {
        self.subset_id = subset_id as i32;
        self.subset_pos = u32::from(self.scan_cg[subset_id].idx);
        self.subset_pos_y = self.subset_pos / self.width_in_groups;
        self.subset_pos_x = self.subset_pos - self.subset_pos_y * self.width_in_groups;
        self.min_sub_pos = (subset_id << self.log2_cg_size) as i32;
        self.max_sub_pos = self.min_sub_pos + (1 << self.log2_cg_size) - 1;
        if sig_group_flag {
            self.sig_coeff_group_flag.set(self.subset_pos as usize);
        }

        let cg_pos_x = self.subset_pos_x;
        let cg_pos_y = self.subset_pos_y;
        // Regular residual coding: right and lower neighbor groups.
        let sig_right = u32::from(
            cg_pos_x + 1 < self.width_in_groups
                && self.sig_coeff_group_flag.get((self.subset_pos + 1) as usize),
        );
        let sig_lower = u32::from(
            cg_pos_y + 1 < self.height_in_groups
                && self
                    .sig_coeff_group_flag
                    .get((self.subset_pos + self.width_in_groups) as usize),
        );
        let sig_group_set = if self.ch_type == ChannelType::Luma {
            ctx_sets::SIG_COEFF_GROUP_LUMA
        } else {
            ctx_sets::SIG_COEFF_GROUP_CHROMA
        };
        self.sig_group_ctx_id = sig_group_set.ctx(sig_right | sig_lower);

        // Transform-skip residual coding: left and above neighbor groups.
        let sig_left = u32::from(
            cg_pos_x > 0 && self.sig_coeff_group_flag.get((self.subset_pos - 1) as usize),
        );
        let sig_above = u32::from(
            cg_pos_y > 0
                && self
                    .sig_coeff_group_flag
                    .get((self.subset_pos - self.width_in_groups) as usize),
        );
        self.sig_group_ctx_id_ts = ctx_sets::TS_SIG_COEFF_GROUP.ctx(sig_left + sig_above);
    }

    /// Current subset id.
    pub fn subset_id(&self) -> i32 {
        self.subset_id
    }

    /// Current coefficient-group position (x, y) in group units.
    pub fn cg_pos(&self) -> (u32, u32) {
        (self.subset_pos_x, self.subset_pos_y)
    }

    /// First scan position of the current subblock.
    pub fn min_sub_pos(&self) -> i32 {
        self.min_sub_pos
    }

    /// Last scan position of the current subblock.
    pub fn max_sub_pos(&self) -> i32 {
        self.max_sub_pos
    }

    /// Whether the current subblock is marked significant.
    pub fn is_sig_group(&self) -> bool {
        self.sig_coeff_group_flag.get(self.subset_pos as usize)
    }

    /// Group-significance context id (regular residual coding).
    pub fn sig_group_ctx_id(&self) -> u32 {
        self.sig_group_ctx_id
    }

    /// Group-significance context id (transform-skip residual coding).
    pub fn sig_group_ctx_id_ts(&self) -> u32 {
        self.sig_group_ctx_id_ts
    }

    // -----------------------------------------------------------------------
    // Last-position contexts
    // -----------------------------------------------------------------------

    /// Context id of bin `bin_idx` of the last-position x prefix.
    pub fn last_x_ctx_id(&self, bin_idx: u32) -> u32 {
        self.ctx_set_last_x
            .ctx(self.last_offset_x + (bin_idx >> self.last_shift_x))
    }

    /// Context id of bin `bin_idx` of the last-position y prefix.
    pub fn last_y_ctx_id(&self, bin_idx: u32) -> u32 {
        self.ctx_set_last_y
            .ctx(self.last_offset_y + (bin_idx >> self.last_shift_y))
    }

    // -----------------------------------------------------------------------
    // Coefficient contexts (regular residual coding)
    // -----------------------------------------------------------------------

    /// Significance context id for `scan_pos` under dependent-quantization
    /// `state`, from the decoded right/lower neighbor template. Caches the
    /// template sum and diagonal for the following par/gtx contexts.
    pub fn sig_ctx_id_abs(&mut self, scan_pos: usize, coeff: &[i32], state: i32) -> u32 {
        let pos_x = self.pos_x(scan_pos);
        let pos_y = self.pos_y(scan_pos);
        let base = (pos_y * self.width + pos_x) as usize;
        let width = self.width as usize;
        let diag = pos_x + pos_y;

        let mut num_pos = 0i32;
        let mut sum_abs = 0i32;
        let mut update = |v: i32| {
            let a = v.abs();
            sum_abs += a.min(4 + (a & 1));
            num_pos += i32::from(v != 0);
        };

        if pos_x + 1 < self.width {
            update(coeff[base + 1]);
            if pos_x + 2 < self.width {
                update(coeff[base + 2]);
            }
            if pos_y + 1 < self.height {
                update(coeff[base + width + 1]);
            }
        }
        if pos_y + 1 < self.height {
            update(coeff[base + width]);
            if pos_y + 2 < self.height {
                update(coeff[base + 2 * width]);
            }
        }

        let mut ctx_ofs = ((sum_abs + 1) >> 1).min(3) as u32 + if diag < 2 { 4 } else { 0 };
        if self.ch_type == ChannelType::Luma && diag < 5 {
            ctx_ofs += 4;
        }

        self.tmpl_cp_diag = diag as i32;
        self.tmpl_cp_sum1 = sum_abs - num_pos;

        self.sig_flag_ctx_set[state.max(1) as usize - 1].ctx(ctx_ofs)
    }

    /// Shared context offset for the parity and greater-than-x flags,
    /// derived from the cached template sum and diagonal.
    pub fn ctx_offset_abs(&self) -> u32 {
        if self.tmpl_cp_diag == -1 {
            return 0;
        }
        let mut offset = self.tmpl_cp_sum1.min(4) + 1;
        offset += if self.tmpl_cp_diag == 0 {
            if self.ch_type == ChannelType::Luma {
                15
            } else {
                5
            }
        } else if self.ch_type == ChannelType::Luma {
            if self.tmpl_cp_diag < 3 {
                10
            } else if self.tmpl_cp_diag < 10 {
                5
            } else {
                0
            }
        } else {
            0
        };
        offset as u32
    }

    /// Parity-flag context id at `offset` (see [`Self::ctx_offset_abs`]).
    pub fn par_flag_ctx_id(&self, offset: u32) -> u32 {
        self.par_flag_ctx_set.ctx(offset)
    }

    /// Greater-than-1 flag context id at `offset`.
    pub fn gt1_flag_ctx_id(&self, offset: u32) -> u32 {
        self.gt1_flag_ctx_set.ctx(offset)
    }

    /// Greater-than-2 flag context id at `offset`.
    pub fn gt2_flag_ctx_id(&self, offset: u32) -> u32 {
        self.gt2_flag_ctx_set.ctx(offset)
    }

    // -----------------------------------------------------------------------
    // Coefficient contexts (transform-skip residual coding)
    // -----------------------------------------------------------------------

    /// Transform-skip significance context from left/above presence.
    pub fn sig_ctx_id_abs_ts(&self, scan_pos: usize, coeff: &[i32]) -> u32 {
        let pos_x = self.pos_x(scan_pos);
        let pos_y = self.pos_y(scan_pos);
        let base = (pos_y * self.width + pos_x) as usize;
        let width = self.width as usize;

        let mut num_pos = 0u32;
        if pos_x > 0 {
            num_pos += u32::from(coeff[base - 1] != 0);
        }
        if pos_y > 0 {
            num_pos += u32::from(coeff[base - width] != 0);
        }
        ctx_sets::TS_SIG_FLAG.ctx(num_pos)
    }

    /// Transform-skip parity context (single context).
    pub fn parity_ctx_id_abs_ts(&self) -> u32 {
        ctx_sets::TS_PAR_FLAG.ctx(0)
    }

    /// Transform-skip greater-than-x context at cutoff `cutoff`.
    pub fn gtx_ctx_id_abs_ts(&self, cutoff: u32) -> u32 {
        ctx_sets::TS_GTX_FLAG.ctx(cutoff)
    }

    /// Transform-skip greater-than-1 context: left/above presence, with a
    /// fixed context under BDPCM.
    pub fn lrg1_ctx_id_abs_ts(&self, scan_pos: usize, coeff: &[i32]) -> u32 {
        let num_pos = if self.bdpcm.is_active() {
            3
        } else {
            let pos_x = self.pos_x(scan_pos);
            let pos_y = self.pos_y(scan_pos);
            let base = (pos_y * self.width + pos_x) as usize;
            let width = self.width as usize;
            let mut n = 0u32;
            if pos_x > 0 {
                n += u32::from(coeff[base - 1] != 0);
            }
            if pos_y > 0 {
                n += u32::from(coeff[base - width] != 0);
            }
            n
        };
        ctx_sets::TS_LRG1_FLAG.ctx(num_pos)
    }

    /// Transform-skip sign context from the left/above sign pattern.
    pub fn sign_ctx_id_abs_ts(&self, scan_pos: usize, coeff: &[i32]) -> u32 {
        let pos_x = self.pos_x(scan_pos);
        let pos_y = self.pos_y(scan_pos);
        let base = (pos_y * self.width + pos_x) as usize;
        let width = self.width as usize;

        let left_sign = if pos_x > 0 { sgn(coeff[base - 1]) } else { 0 };
        let above_sign = if pos_y > 0 { sgn(coeff[base - width]) } else { 0 };
        let bdpcm = self.bdpcm.is_active();

        let inc = if (left_sign == 0 && above_sign == 0) || left_sign == -above_sign {
            if bdpcm {
                3
            } else {
                0
            }
        } else if left_sign >= 0 && above_sign >= 0 {
            if bdpcm {
                4
            } else {
                1
            }
        } else if bdpcm {
            5
        } else {
            2
        };
        ctx_sets::TS_RESIDUAL_SIGN.ctx(inc)
    }

    // -----------------------------------------------------------------------
    // Rice parameter derivation
    // -----------------------------------------------------------------------

    /// Absolute-level template sum of up to five decoded neighbors, less
    /// `5 * base_level`, clamped to the table domain `[0, 31]`.
    pub fn template_abs_sum(&self, scan_pos: usize, coeff: &[i32], base_level: i32) -> u32 {
        clip3(0, 31, self.template_abs_sum_raw(scan_pos, coeff) - 5 * base_level) as u32
    }

    /// Unclamped absolute-level template sum.
    pub fn template_abs_sum_raw(&self, scan_pos: usize, coeff: &[i32]) -> i32 {
        let pos_x = self.pos_x(scan_pos);
        let pos_y = self.pos_y(scan_pos);
        let base = (pos_y * self.width + pos_x) as usize;
        let width = self.width as usize;

        let mut sum = 0i32;
        if pos_x + 1 < self.width {
            sum += coeff[base + 1].abs();
            if pos_x + 2 < self.width {
                sum += coeff[base + 2].abs();
            }
            if pos_y + 1 < self.height {
                sum += coeff[base + width + 1].abs();
            }
        }
        if pos_y + 1 < self.height {
            sum += coeff[base + width].abs();
            if pos_y + 2 < self.height {
                sum += coeff[base + 2 * width].abs();
            }
        }
        sum
    }

    /// Derive the Rice parameter for the configured strategy from a
    /// template sum (clamped for [`RiceDerivation::Standard`], raw for
    /// [`RiceDerivation::Extended`]).
    pub fn derive_rice(&self, sum_abs: u32) -> u32 {
        match self.rice_derivation {
            RiceDerivation::Standard => GO_RICE_PARS[sum_abs.min(31) as usize],
            RiceDerivation::Extended => {
                let mut shift = RICE_SHIFTS[0];
                for (i, &threshold) in RICE_THRESHOLDS.iter().enumerate() {
                    if sum_abs >= threshold {
                        shift = RICE_SHIFTS[i + 1];
                    }
                }
                GO_RICE_PARS[(sum_abs >> shift).min(31) as usize] + shift
            }
        }
    }

    /// Selected derivation strategy.
    pub fn rice_derivation(&self) -> RiceDerivation {
        self.rice_derivation
    }

    /// Base level of the current derivation state.
    pub fn base_level(&self) -> i32 {
        self.base_level
    }

    /// Replace the derivation base level.
    pub fn set_base_level(&mut self, base_level: i32) {
        self.base_level = base_level;
    }

    /// Running history value of the extended derivation.
    pub fn hist_value(&self) -> u32 {
        self.hist_value
    }

    /// Fold a coded level magnitude into the derivation history
    /// (extended strategy only).
    pub fn update_rice_history(&mut self, level: i32) {
        if self.update_hist && level != 0 {
            self.hist_value = (self.hist_value + floor_log2(level.unsigned_abs()) + 2) >> 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SpsFlags, SpsParams};

    fn sps() -> SpsParams {
        SpsParams::default()
    }

    fn luma_ctx(w: u32, h: u32) -> CoeffCodingContext {
        CoeffCodingContext::new(w, h, ComponentId::Y, &sps(), true, BdpcmMode::None)
    }

    #[test]
    fn test_8x8_luma_geometry() {
        let cctx = luma_ctx(8, 8);
        assert_eq!(cctx.log2_cg_dims(), (2, 2));
        assert_eq!(cctx.width_in_groups(), 2);
        assert_eq!(cctx.height_in_groups(), 2);
        assert_eq!(cctx.num_groups(), 4);
        assert_eq!(cctx.max_num_coeff(), 64);
        assert_eq!(cctx.scan_pos_last(), -1);
        // Luma last-position contexts: prefix offset 3, shift 1 for log2 3.
        assert_eq!(cctx.last_x_ctx_id(0), ctx_sets::LAST_X_LUMA.ctx(3));
        assert_eq!(cctx.last_x_ctx_id(4), ctx_sets::LAST_X_LUMA.ctx(5));
    }

    #[test]
    fn test_chroma_last_shift() {
        let cctx = CoeffCodingContext::new(16, 16, ComponentId::Cb, &sps(), true, BdpcmMode::None);
        // Chroma: no prefix offset, shift = clip3(0, 2, 16 >> 3) = 2.
        assert_eq!(cctx.last_x_ctx_id(0), ctx_sets::LAST_X_CHROMA.ctx(0));
        assert_eq!(cctx.last_x_ctx_id(7), ctx_sets::LAST_X_CHROMA.ctx(1));
    }

    #[test]
    fn test_narrow_block_group_shape() {
        let cctx = luma_ctx(2, 16);
        // 2x16 uses 2x8 coefficient groups: one group per row of groups.
        assert_eq!(cctx.log2_cg_dims(), (1, 3));
        assert_eq!(cctx.width_in_groups(), 1);
        assert_eq!(cctx.height_in_groups(), 2);
    }

    #[test]
    fn test_zero_out_region_64() {
        let cctx = luma_ctx(64, 64);
        // Only the 32x32 nonzero area holds coefficient groups.
        assert_eq!(cctx.width_in_groups(), 8);
        assert_eq!(cctx.height_in_groups(), 8);
        assert_eq!(cctx.max_last_pos_x(), 9);
        // The raster index still addresses the full 64-wide block.
        assert_eq!(cctx.max_num_coeff(), 64 * 64);
    }

    #[test]
    fn test_init_subblock_top_left_no_neighbors() {
        let mut cctx = luma_ctx(8, 8);
        cctx.init_subblock(0, false);
        // DC group: no right/lower significance recorded yet.
        assert_eq!(cctx.sig_group_ctx_id(), ctx_sets::SIG_COEFF_GROUP_LUMA.ctx(0));
        assert_eq!(cctx.sig_group_ctx_id_ts(), ctx_sets::TS_SIG_COEFF_GROUP.ctx(0));
        assert_eq!(cctx.cg_pos(), (0, 0));
        assert_eq!(cctx.min_sub_pos(), 0);
        assert_eq!(cctx.max_sub_pos(), 15);
    }

    #[test]
    fn test_init_subblock_neighbor_asymmetry() {
        // 8x8 luma: group grid is 2x2, diagonal group scan order is
        // DC(0,0), (0,1), (1,0), (1,1).
        let mut cctx = luma_ctx(8, 8);

        // Reverse scan: last group (1,1) significant.
        cctx.init_subblock(3, true);
        assert_eq!(cctx.cg_pos(), (1, 1));
        // Its regular context saw no right/lower neighbors.
        assert_eq!(cctx.sig_group_ctx_id(), ctx_sets::SIG_COEFF_GROUP_LUMA.ctx(0));

        // Group (1,0): the significant (1,1) group is its lower neighbor.
        cctx.init_subblock(2, false);
        assert_eq!(cctx.cg_pos(), (1, 0));
        assert_eq!(cctx.sig_group_ctx_id(), ctx_sets::SIG_COEFF_GROUP_LUMA.ctx(1));
        // The transform-skip variant looks left/above instead: nothing.
        assert_eq!(cctx.sig_group_ctx_id_ts(), ctx_sets::TS_SIG_COEFF_GROUP.ctx(0));

        // Group (0,1): lower neighbor absent, right neighbor (1,1) set.
        cctx.init_subblock(1, true);
        assert_eq!(cctx.cg_pos(), (0, 1));
        assert_eq!(cctx.sig_group_ctx_id(), ctx_sets::SIG_COEFF_GROUP_LUMA.ctx(1));
        // TS sees the above group (0,0)? Not significant; left is off-grid.
        assert_eq!(cctx.sig_group_ctx_id_ts(), ctx_sets::TS_SIG_COEFF_GROUP.ctx(0));

        // DC group: right (1,0) not significant, lower (0,1) significant.
        cctx.init_subblock(0, false);
        assert_eq!(cctx.sig_group_ctx_id(), ctx_sets::SIG_COEFF_GROUP_LUMA.ctx(1));
    }

    #[test]
    fn test_ts_context_counts_left_and_above() {
        // Forward walk marking groups significant: the TS context counts
        // left + above (0..=2), unlike the OR of the regular variant.
        let mut cctx = luma_ctx(16, 16);
        // Group scan over a 4x4 grid; find the subset whose group sits at
        // (1, 1) and mark (0, 1) and (1, 0) significant first.
        let find = |cctx: &CoeffCodingContext, gx: u32, gy: u32| {
            (0..cctx.num_groups() as usize)
                .find(|&i| {
                    let mut probe = cctx.clone();
                    probe.init_subblock(i, false);
                    probe.cg_pos() == (gx, gy)
                })
                .unwrap()
        };
        let s01 = find(&cctx, 0, 1);
        let s10 = find(&cctx, 1, 0);
        let s11 = find(&cctx, 1, 1);
        cctx.init_subblock(s01, true);
        cctx.init_subblock(s10, true);
        cctx.init_subblock(s11, false);
        assert_eq!(cctx.sig_group_ctx_id_ts(), ctx_sets::TS_SIG_COEFF_GROUP.ctx(2));
    }

    #[test]
    fn test_sig_ctx_id_abs_dc_empty_template() {
        let mut cctx = luma_ctx(8, 8);
        let coeff = vec![0i32; 64];
        // DC: diagonal 0 adds 4 + 4 (luma diag < 5), empty template adds 0.
        let ctx = cctx.sig_ctx_id_abs(0, &coeff, 0);
        assert_eq!(ctx, ctx_sets::SIG_FLAG_LUMA_0.ctx(8));
        // Template cache now reflects the empty neighborhood.
        assert_eq!(cctx.ctx_offset_abs(), 1 + 15);
    }

    #[test]
    fn test_sig_ctx_id_abs_counts_template() {
        let mut cctx = luma_ctx(8, 8);
        let mut coeff = vec![0i32; 64];
        coeff[1] = 1; // right of DC
        coeff[8] = 2; // below DC
        let ctx = cctx.sig_ctx_id_abs(0, &coeff, 0);
        // sum = min(5,1) + min(4,2) = 3 -> (3+1)>>1 = 2; diag terms 8.
        assert_eq!(ctx, ctx_sets::SIG_FLAG_LUMA_0.ctx(10));
        // par/gtx offset: min(sum - numPos, 4) + 1 + 15 at DC.
        assert_eq!(cctx.ctx_offset_abs(), (3 - 2) + 1 + 15);
    }

    #[test]
    fn test_sig_ctx_state_tiers() {
        let mut cctx = luma_ctx(8, 8);
        let coeff = vec![0i32; 64];
        let t0 = cctx.sig_ctx_id_abs(0, &coeff, 0);
        let t1 = cctx.sig_ctx_id_abs(0, &coeff, 1);
        let t2 = cctx.sig_ctx_id_abs(0, &coeff, 2);
        let t3 = cctx.sig_ctx_id_abs(0, &coeff, 3);
        assert_eq!(t0, t1);
        assert_eq!(t2, ctx_sets::SIG_FLAG_LUMA_1.ctx(8));
        assert_eq!(t3, ctx_sets::SIG_FLAG_LUMA_2.ctx(8));
    }

    #[test]
    fn test_ts_sign_context_patterns() {
        let cctx = luma_ctx(4, 4);
        let mut coeff = vec![0i32; 16];
        // Scan position of (1, 1): neighbors at (0,1) and (1,0).
        let pos_11 = (0..16).find(|&i| cctx.pos_x(i) == 1 && cctx.pos_y(i) == 1).unwrap();

        assert_eq!(cctx.sign_ctx_id_abs_ts(pos_11, &coeff), ctx_sets::TS_RESIDUAL_SIGN.ctx(0));

        coeff[4] = 5; // above (x=1,y=0)? raster idx y*4+x: (1,0) -> 1; (0,1) -> 4
        coeff[1] = 5;
        assert_eq!(cctx.sign_ctx_id_abs_ts(pos_11, &coeff), ctx_sets::TS_RESIDUAL_SIGN.ctx(1));

        coeff[4] = -5;
        coeff[1] = 5;
        // Opposite signs cancel.
        assert_eq!(cctx.sign_ctx_id_abs_ts(pos_11, &coeff), ctx_sets::TS_RESIDUAL_SIGN.ctx(0));

        coeff[1] = -5;
        assert_eq!(cctx.sign_ctx_id_abs_ts(pos_11, &coeff), ctx_sets::TS_RESIDUAL_SIGN.ctx(2));
    }

    #[test]
    fn test_ts_sign_context_bdpcm_offsets() {
        let cctx =
            CoeffCodingContext::new(4, 4, ComponentId::Y, &sps(), true, BdpcmMode::Horizontal);
        let coeff = vec![0i32; 16];
        let pos_11 = (0..16).find(|&i| cctx.pos_x(i) == 1 && cctx.pos_y(i) == 1).unwrap();
        assert_eq!(cctx.sign_ctx_id_abs_ts(pos_11, &coeff), ctx_sets::TS_RESIDUAL_SIGN.ctx(3));
        assert_eq!(cctx.lrg1_ctx_id_abs_ts(pos_11, &coeff), ctx_sets::TS_LRG1_FLAG.ctx(3));
    }

    #[test]
    fn test_rice_standard_table() {
        let cctx = luma_ctx(8, 8);
        assert_eq!(cctx.rice_derivation(), RiceDerivation::Standard);
        assert_eq!(cctx.derive_rice(0), 0);
        assert_eq!(cctx.derive_rice(7), 1);
        assert_eq!(cctx.derive_rice(14), 2);
        assert_eq!(cctx.derive_rice(31), 2);
        assert_eq!(cctx.derive_rice(1000), 2);
    }

    #[test]
    fn test_rice_extended_ladder() {
        let sps = SpsParams::default().with_flags(SpsFlags::RICE_EXTENSION);
        let cctx = CoeffCodingContext::new(8, 8, ComponentId::Y, &sps, true, BdpcmMode::None);
        assert_eq!(cctx.rice_derivation(), RiceDerivation::Extended);
        // Below the first threshold: plain table.
        assert_eq!(cctx.derive_rice(14), 2);
        // 40 >= 32: shift 2, 40 >> 2 = 10 -> 1 + 2.
        assert_eq!(cctx.derive_rice(40), 3);
        // 600 >= 512: shift 6, 600 >> 6 = 9 -> 1 + 6.
        assert_eq!(cctx.derive_rice(600), 7);
        // Huge sums saturate the table at 2 plus the max shift.
        assert_eq!(cctx.derive_rice(1 << 20), 10);
    }

    #[test]
    fn test_rice_history_update() {
        let sps = SpsParams::default().with_flags(SpsFlags::RICE_EXTENSION);
        let mut cctx = CoeffCodingContext::new(8, 8, ComponentId::Y, &sps, true, BdpcmMode::None);
        assert_eq!(cctx.hist_value(), 0);
        cctx.update_rice_history(8);
        assert_eq!(cctx.hist_value(), (0 + 3 + 2) >> 1);
        cctx.update_rice_history(0);
        assert_eq!(cctx.hist_value(), 2);

        // The standard strategy never touches history.
        let mut std_ctx = luma_ctx(8, 8);
        std_ctx.update_rice_history(100);
        assert_eq!(std_ctx.hist_value(), 0);
    }

    #[test]
    fn test_template_abs_sum() {
        let cctx = luma_ctx(4, 4);
        let mut coeff = vec![0i32; 16];
        coeff[1] = 3; // (1,0)
        coeff[2] = 2; // (2,0)
        coeff[4] = 4; // (0,1)
        coeff[5] = 1; // (1,1)
        coeff[8] = 6; // (0,2)
        // All five template neighbors of DC populated: 3+2+4+1+6 = 16.
        assert_eq!(cctx.template_abs_sum_raw(0, &coeff), 16);
        assert_eq!(cctx.template_abs_sum(0, &coeff, 0), 16);
        // base level 4 subtracts 20 and clamps at 0.
        assert_eq!(cctx.template_abs_sum(0, &coeff, 4), 0);
    }

    #[test]
    fn test_dynamic_range_bounds() {
        let cctx = luma_ctx(8, 8);
        assert_eq!(cctx.min_coeff(), -(1 << 15));
        assert_eq!(cctx.max_coeff(), (1 << 15) - 1);
    }
}
