//! Spatial context derivation.
//!
//! Stateless functions deriving entropy-context increments from the
//! already-decoded left/above neighborhood of the current block. Every
//! neighbor access goes through [`CuLookup::cu_restricted`], so units in a
//! different independent slice or tile look exactly like units outside the
//! picture. The returned values are increments within their context set
//! (see [`crate::ctx::ctx_sets`]); the entropy coder adds the set base.

use crate::buf::{floor_log2, ChannelType};
use crate::unit::{CuInfo, CuLookup, PartitionState};

/// Context increments for the split-flag syntax family, all derived from
/// a single left/above neighbor lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitCtx {
    /// Do-split context (0..=8).
    pub split: u32,
    /// Quad-split context (0..=5).
    pub qt: u32,
    /// Horizontal/vertical preference context (0..=4).
    pub hv: u32,
    /// Binary-tree horizontal context.
    pub bt_hor: u32,
    /// Binary-tree vertical context.
    pub bt_ver: u32,
}

/// Derive all split-flag contexts for the current partitioner position.
pub fn ctx_split(lookup: &impl CuLookup, part: &PartitionState) -> SplitCtx {
    let pos = part.area.pos();
    let cu_left = lookup.cu_restricted(pos.offset(-1, 0), part.slice_idx, part.tile_idx, part.ch_type);
    let cu_above = lookup.cu_restricted(pos.offset(0, -1), part.slice_idx, part.tile_idx, part.ch_type);
    let can = &part.can_split;

    // Do-split: neighbors smaller than the current block argue for a
    // split, plus a term from how many split types remain allowed.
    let mut split = 0u32;
    if let Some(left) = cu_left {
        split += u32::from(left.area.height < part.area.height);
    }
    if let Some(above) = cu_above {
        split += u32::from(above.area.width < part.area.width);
    }

    let mut num_split = 0u32;
    if can.qt {
        num_split += 2;
    }
    num_split += u32::from(can.bt_hor);
    num_split += u32::from(can.bt_ver);
    num_split += u32::from(can.tt_hor);
    num_split += u32::from(can.tt_ver);
    num_split = num_split.saturating_sub(1);

    split += 3 * (num_split >> 1);

    // Quad-split: deeper QT neighbors plus a depth bucket.
    let mut qt = 0u32;
    if let Some(left) = cu_left {
        qt += u32::from(left.qt_depth > part.qt_depth);
    }
    if let Some(above) = cu_above {
        qt += u32::from(above.qt_depth > part.qt_depth);
    }
    qt += if part.qt_depth < 2 { 0 } else { 3 };

    // Horizontal/vertical preference: allowed-split counts first, then a
    // neighbor-depth-ratio tie-break.
    let num_hor = can.num_hor();
    let num_ver = can.num_ver();
    let hv = if num_ver == num_hor {
        let w_above = cu_above.map_or(1, |cu| cu.area.width);
        let h_left = cu_left.map_or(1, |cu| cu.area.height);
        let dep_above = part.area.width / w_above;
        let dep_left = part.area.height / h_left;

        if dep_above == dep_left || cu_left.is_none() || cu_above.is_none() {
            0
        } else if dep_above < dep_left {
            1
        } else {
            2
        }
    } else if num_ver < num_hor {
        3
    } else {
        4
    };

    let bt_hor = u32::from(part.mtt_depth <= 1);
    let bt_ver = if part.mtt_depth <= 1 { 3 } else { 2 };

    SplitCtx { split, qt, hv, bt_hor, bt_ver }
}

/// Mode-constraint context: 1 when either luma neighbor is intra.
pub fn ctx_mode_cons_flag(lookup: &impl CuLookup, part: &PartitionState) -> u32 {
    debug_assert_eq!(part.ch_type, ChannelType::Luma);
    let pos = part.area.pos();
    let cu_left = lookup.cu_restricted(pos.offset(-1, 0), part.slice_idx, part.tile_idx, part.ch_type);
    let cu_above = lookup.cu_restricted(pos.offset(0, -1), part.slice_idx, part.tile_idx, part.ch_type);

    u32::from(
        cu_above.is_some_and(|cu| cu.is_intra()) || cu_left.is_some_and(|cu| cu.is_intra()),
    )
}

fn luma_neighbors<'a>(
    lookup: &'a impl CuLookup,
    cu: &CuInfo,
) -> (Option<&'a CuInfo>, Option<&'a CuInfo>) {
    let pos = cu.area.pos();
    let left = lookup.cu_restricted(pos.offset(-1, 0), cu.slice_idx, cu.tile_idx, ChannelType::Luma);
    let above = lookup.cu_restricted(pos.offset(0, -1), cu.slice_idx, cu.tile_idx, ChannelType::Luma);
    (left, above)
}

/// Skip-flag context: one point per skipped neighbor.
pub fn ctx_skip_flag(lookup: &impl CuLookup, cu: &CuInfo) -> u32 {
    let (left, above) = luma_neighbors(lookup, cu);
    u32::from(left.is_some_and(|c| c.skip)) + u32::from(above.is_some_and(|c| c.skip))
}

/// Prediction-mode context: 1 when either neighbor is intra.
pub fn ctx_pred_mode_flag(lookup: &impl CuLookup, cu: &CuInfo) -> u32 {
    let (left, above) = luma_neighbors(lookup, cu);
    u32::from(above.is_some_and(|c| c.is_intra()) || left.is_some_and(|c| c.is_intra()))
}

/// Affine-flag context: one point per affine neighbor.
pub fn ctx_affine_flag(lookup: &impl CuLookup, cu: &CuInfo) -> u32 {
    let (left, above) = luma_neighbors(lookup, cu);
    u32::from(left.is_some_and(|c| c.affine)) + u32::from(above.is_some_and(|c| c.affine))
}

/// IBC-flag context: one point per IBC neighbor, looked up in the unit's
/// own channel.
pub fn ctx_ibc_flag(lookup: &impl CuLookup, cu: &CuInfo) -> u32 {
    let pos = cu.area.pos();
    let left = lookup.cu_restricted(pos.offset(-1, 0), cu.slice_idx, cu.tile_idx, cu.ch_type);
    let above = lookup.cu_restricted(pos.offset(0, -1), cu.slice_idx, cu.tile_idx, cu.ch_type);
    u32::from(left.is_some_and(|c| c.is_ibc())) + u32::from(above.is_some_and(|c| c.is_ibc()))
}

/// MIP-flag context: one point per MIP neighbor, overridden to the fixed
/// context 3 for blocks with an aspect ratio beyond 2:1.
pub fn ctx_mip_flag(lookup: &impl CuLookup, cu: &CuInfo) -> u32 {
    let (left, above) = luma_neighbors(lookup, cu);
    let ctx = u32::from(left.is_some_and(|c| c.mip_flag)) + u32::from(above.is_some_and(|c| c.mip_flag));

    if cu.area.width > 2 * cu.area.height || cu.area.height > 2 * cu.area.width {
        3
    } else {
        ctx
    }
}

/// Coded-block-flag context: luma under ISP keys off the previous
/// subpartition's CBF, Cr keys off Cb's CBF, everything else is context 0.
pub fn ctx_qt_cbf(comp: crate::buf::ComponentId, prev_cbf: bool, isp: bool) -> u32 {
    use crate::buf::ComponentId;
    if isp && comp == ComponentId::Y {
        return 2 + u32::from(prev_cbf);
    }
    if comp == ComponentId::Cr {
        return u32::from(prev_cbf);
    }
    0
}

/// Inter-direction context, a closed-form function of block size.
pub fn ctx_inter_dir(width: u32, height: u32) -> u32 {
    7 - ((floor_log2(width) + floor_log2(height) + 1) >> 1)
}

/// Run mode of the previously coded palette run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PltRunMode {
    /// Index run.
    Index,
    /// Copy-above run.
    Copy,
}

/// Run lengths at or above this distance share the last context bucket.
pub const PLT_RUN_IDX_THRESHOLD: u32 = 64;

const fn build_run_lut(buckets: [u8; 5]) -> [u8; 65] {
    let mut lut = [0u8; 65];
    let mut i = 0;
    while i < lut.len() {
        lut[i] = if i < buckets.len() { buckets[i] } else { buckets[4] };
        i += 1;
    }
    lut
}

static PLT_RUN_INDEX_LUT: [u8; 65] = build_run_lut([0, 1, 2, 3, 4]);
static PLT_RUN_COPY_LUT: [u8; 65] = build_run_lut([0, 1, 1, 2, 2]);

/// Palette copy-run context from the previous run type and the bucketed,
/// threshold-clamped run distance.
pub fn ctx_plt_copy_flag(prev_run_type: PltRunMode, dist: u32) -> u32 {
    let lut: &[u8; 65] = match prev_run_type {
        PltRunMode::Index => &PLT_RUN_INDEX_LUT,
        PltRunMode::Copy => &PLT_RUN_COPY_LUT,
    };
    u32::from(lut[dist.min(PLT_RUN_IDX_THRESHOLD) as usize])
}
