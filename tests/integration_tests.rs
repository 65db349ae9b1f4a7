//! Integration tests for the rate-distortion core.
//!
//! These tests exercise the public surface across modules: metric
//! dispatch, Lagrangian costing, coefficient-context geometry and the
//! spatial context derivation, plus property tests over the metric
//! algebra.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use vvc_rdcost::{
    coeff::{BdpcmMode, CoeffCodingContext},
    ctx::ctx_sets,
    derive::{ctx_affine_flag, ctx_skip_flag, ctx_split},
    dist::{DistFuncKind, DistParam},
    unit::{Area, CodingGrid, CuInfo, PartitionState, SplitOptions},
    BitDepths, ChannelType, ComponentId, CostMode, Distortion, Pel, PelBuf, RdCost, SpsParams,
};

fn pel_buf(data: &[Pel], w: u32, h: u32) -> PelBuf<'_> {
    PelBuf::new(data, w as usize, w, h)
}

fn metric(org: &[Pel], cur: &[Pel], w: u32, h: u32, bd: u8, kind: DistFuncKind) -> Distortion {
    let mut dp = DistParam::new(pel_buf(org, w, h), pel_buf(cur, w, h), bd, ComponentId::Y);
    dp.dist_func = kind.resolve(w);
    dp.distortion()
}

// ============================================================================
// Metric library scenarios
// ============================================================================

#[test]
fn test_identical_16x16_blocks_score_zero_everywhere() {
    let block = vec![128 as Pel; 256];
    for kind in [DistFuncKind::Sad, DistFuncKind::Sse, DistFuncKind::Had] {
        assert_eq!(metric(&block, &block, 16, 16, 10, kind), 0);
    }
}

#[test]
fn test_sad4_constant_difference_8bit() {
    // org = 100, cur = 110 over 4x4: 16 * 10 = 160; the precision
    // adjustment for 8-bit content is zero.
    let org = vec![100 as Pel; 16];
    let cur = vec![110 as Pel; 16];
    assert_eq!(metric(&org, &cur, 4, 4, 8, DistFuncKind::Sad), 160);
}

#[test]
fn test_mrsad_cancels_uniform_offset() {
    let org: Vec<Pel> = (0..64).map(|i| (i * 3 % 128) as Pel).collect();
    for k in [-31i16, -7, 7, 31] {
        let cur: Vec<Pel> = org.iter().map(|&v| v + k).collect();
        assert_eq!(metric(&org, &cur, 8, 8, 8, DistFuncKind::Mrsad), 0, "k = {}", k);
    }
}

#[test]
fn test_hadamard_zero_difference_all_sizes() {
    for (w, h) in [
        (2u32, 2u32), (4, 4), (8, 8), (16, 16), (32, 32), (64, 64),
        (4, 8), (8, 4), (8, 16), (16, 8), (16, 64), (64, 16), (2, 4),
    ] {
        let block = vec![512 as Pel; (w * h) as usize];
        assert_eq!(metric(&block, &block, w, h, 10, DistFuncKind::Had), 0, "{}x{}", w, h);
    }
}

// ============================================================================
// RdCost engine scenarios
// ============================================================================

#[test]
fn test_lossless_mode_sentinel() {
    let mut rd = RdCost::new();
    rd.set_lambda(4.2, BitDepths::default());
    rd.set_cost_mode(CostMode::Lossless, true);

    assert_eq!(rd.calc_rd_cost(100, 0), 100.0);
    assert_eq!(rd.calc_rd_cost(100, 1), f64::MAX);
}

#[test]
fn test_chroma_distortion_weight_is_multiplicative() {
    let mut rd = RdCost::new();
    rd.set_distortion_weight(ComponentId::Cb, 0.8);
    rd.set_distortion_weight(ComponentId::Cr, 1.2);

    let org = vec![90 as Pel; 64];
    let cur = vec![100 as Pel; 64];
    let o = pel_buf(&org, 8, 8);
    let c = pel_buf(&cur, 8, 8);

    let raw = rd.get_dist_part(o, c, 8, ComponentId::Y, DistFuncKind::Sse);
    let cb = rd.get_dist_part(o, c, 8, ComponentId::Cb, DistFuncKind::Sse);
    let cr = rd.get_dist_part(o, c, 8, ComponentId::Cr, DistFuncKind::Sse);
    assert_eq!(cb, (0.8 * raw as f64) as Distortion);
    assert_eq!(cr, (1.2 * raw as f64) as Distortion);
}

#[test]
#[should_panic(expected = "already adjusted")]
fn test_color_transform_pairing_is_enforced() {
    let mut rd = RdCost::new();
    rd.set_lambda(10.0, BitDepths::default());
    #[cfg(feature = "wcg")]
    rd.save_unadjusted_lambda();

    rd.lambda_adjust_color_trans(true, ComponentId::Y, false, 0);
    // Second forward call without the matching reverse call: caller bug.
    rd.lambda_adjust_color_trans(true, ComponentId::Y, false, 0);
}

// ============================================================================
// Coefficient coding context scenarios
// ============================================================================

#[test]
fn test_8x8_luma_group_geometry_and_edge_context() {
    let sps = SpsParams::default();
    let mut cctx = CoeffCodingContext::new(8, 8, ComponentId::Y, &sps, true, BdpcmMode::None);

    let (log2_w, log2_h) = cctx.log2_cg_dims();
    assert_eq!(8 >> log2_w, cctx.width_in_groups());
    assert_eq!(8 >> log2_h, cctx.height_in_groups());
    assert_eq!(cctx.num_groups(), 4);

    // Top-left subblock at the picture edge: right/lower groups absent,
    // so the significance-group context collapses to the set base.
    cctx.init_subblock(0, false);
    assert_eq!(cctx.sig_group_ctx_id(), ctx_sets::SIG_COEFF_GROUP_LUMA.ctx(0));
}

#[test]
fn test_subblock_walk_reverse_scan() {
    let sps = SpsParams::default();
    let mut cctx = CoeffCodingContext::new(16, 16, ComponentId::Y, &sps, true, BdpcmMode::None);

    // Walk all subblocks in reverse scan order, marking each significant;
    // spans must tile the coefficient range exactly.
    let mut covered = vec![false; cctx.max_num_coeff() as usize];
    for subset in (0..cctx.num_groups() as usize).rev() {
        cctx.init_subblock(subset, true);
        for pos in cctx.min_sub_pos()..=cctx.max_sub_pos() {
            assert!(!covered[pos as usize]);
            covered[pos as usize] = true;
        }
    }
    assert!(covered.iter().all(|&c| c));
}

// ============================================================================
// Spatial context derivation scenarios
// ============================================================================

#[test]
fn test_picture_corner_contexts_collapse_to_baseline() {
    let grid = CodingGrid::new(128, 128, ChannelType::Luma);
    let cu = CuInfo {
        area: Area::new(0, 0, 16, 16),
        ..Default::default()
    };
    assert_eq!(ctx_skip_flag(&grid, &cu), 0);
    assert_eq!(ctx_affine_flag(&grid, &cu), 0);

    let part = PartitionState {
        area: Area::new(0, 0, 64, 64),
        ch_type: ChannelType::Luma,
        qt_depth: 0,
        mtt_depth: 0,
        slice_idx: 0,
        tile_idx: 0,
        can_split: SplitOptions::default(),
    };
    let ctx = ctx_split(&grid, &part);
    assert_eq!(ctx.qt, 0);
    assert_eq!(ctx.hv, 0);
}

#[test]
fn test_skip_context_sees_only_same_slice_neighbors() {
    let mut grid = CodingGrid::new(128, 128, ChannelType::Luma);
    let mut left = CuInfo {
        area: Area::new(0, 16, 16, 16),
        skip: true,
        ..Default::default()
    };
    left.slice_idx = 0;
    grid.add(left);

    let mut cur = CuInfo {
        area: Area::new(16, 16, 16, 16),
        ..Default::default()
    };
    cur.slice_idx = 0;
    assert_eq!(ctx_skip_flag(&grid, &cur), 1);
    // Same picture position, but the current block belongs to another
    // independent slice: the neighbor must vanish.
    cur.slice_idx = 1;
    assert_eq!(ctx_skip_flag(&grid, &cur), 0);
}

// ============================================================================
// Metric algebra properties
// ============================================================================

proptest! {
    #[test]
    fn prop_sad_is_symmetric(
        org in prop::collection::vec(0i16..1024, 64),
        cur in prop::collection::vec(0i16..1024, 64),
    ) {
        let a = metric(&org, &cur, 8, 8, 10, DistFuncKind::Sad);
        let b = metric(&cur, &org, 8, 8, 10, DistFuncKind::Sad);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_sad_of_self_is_zero(org in prop::collection::vec(0i16..1024, 256)) {
        prop_assert_eq!(metric(&org, &org, 16, 16, 10, DistFuncKind::Sad), 0);
    }

    #[test]
    fn prop_sse_is_non_negative_and_zero_on_self(
        org in prop::collection::vec(0i16..1024, 64),
        cur in prop::collection::vec(0i16..1024, 64),
    ) {
        prop_assert_eq!(metric(&org, &org, 8, 8, 10, DistFuncKind::Sse), 0);
        // Distortion is unsigned; equality with itself suffices to pin the
        // zero case, non-negativity holds by type.
        let _ = metric(&org, &cur, 8, 8, 10, DistFuncKind::Sse);
    }

    #[test]
    fn prop_mrsad_uniform_bias_removed(
        org in prop::collection::vec(0i16..512, 64),
        k in -64i16..64,
    ) {
        let cur: Vec<Pel> = org.iter().map(|&v| v + k).collect();
        prop_assert_eq!(metric(&org, &cur, 8, 8, 10, DistFuncKind::Mrsad), 0);
    }

    #[test]
    fn prop_early_exit_threshold_above_result_is_lossless(
        org in prop::collection::vec(0i16..256, 64),
        cur in prop::collection::vec(0i16..256, 64),
    ) {
        let exact = metric(&org, &cur, 8, 8, 8, DistFuncKind::SadIntermediate);
        let mut dp = DistParam::new(
            pel_buf(&org, 8, 8),
            pel_buf(&cur, 8, 8),
            8,
            ComponentId::Y,
        );
        dp.dist_func = DistFuncKind::SadIntermediate.resolve(8);
        dp.maximum_distortion_for_early_exit = exact;
        prop_assert_eq!(dp.distortion(), exact);
    }

    #[test]
    fn prop_rd_cost_monotone_in_distortion(
        bits in 0u64..1_000_000,
        d1 in 0u64..1_000_000,
        extra in 1u64..1_000_000,
    ) {
        let mut rd = RdCost::new();
        rd.set_lambda(16.0, BitDepths::default());
        let lo = rd.calc_rd_cost(bits, d1);
        let hi = rd.calc_rd_cost(bits, d1 + extra);
        prop_assert!(hi > lo);
    }
}
