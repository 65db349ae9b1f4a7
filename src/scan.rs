//! Diagonal scan-order tables.
//!
//! Coefficient coding walks transform blocks in up-right diagonal order,
//! grouped into coefficient groups (subblocks) that are themselves visited
//! diagonally. The tables are generated once per process for every log2
//! size up to the 32x32 nonzero area and borrowed as `&'static` slices.

use std::sync::OnceLock;

use crate::buf::floor_log2;

/// One scan position: raster index within its own grid plus coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanElement {
    /// Raster index (`y * grid_width + x`).
    pub idx: u16,
    /// Horizontal position.
    pub x: u16,
    /// Vertical position.
    pub y: u16,
}

/// Largest log2 dimension with a scan table (32; the nonzero area cap).
pub const MAX_LOG2_SCAN_DIM: usize = 5;

const NUM_SIZES: usize = MAX_LOG2_SCAN_DIM + 1;

/// Coefficients beyond this size are zeroed out by the transform stage.
pub const ZERO_OUT_TU_SIZE: u32 = 32;

/// Width/height of the region that can hold non-zero coefficients.
#[inline]
pub fn nonzero_tu_size(size: u32) -> u32 {
    size.min(ZERO_OUT_TU_SIZE)
}

/// Normative coefficient-group (subblock) log2 dimensions for a transform
/// block of the given log2 size: 4x4 by default, 2x2 for tiny blocks, and
/// 2x8 / 8x2 for narrow blocks with more than 8 coefficients.
pub fn log2_tx_subblock_size(log2_width: u32, log2_height: u32) -> (u32, u32) {
    let mut log2_sb_w = if log2_width.min(log2_height) < 2 { 1 } else { 2 };
    let mut log2_sb_h = log2_sb_w;
    if log2_width + log2_height > 3 {
        if log2_width < 2 {
            log2_sb_w = log2_width;
            log2_sb_h = 4 - log2_sb_w;
        } else if log2_height < 2 {
            log2_sb_h = log2_height;
            log2_sb_w = 4 - log2_sb_h;
        }
    }
    (log2_sb_w, log2_sb_h)
}

/// Last-significant-position group index for a coordinate.
///
/// `0,1,2,3` stay distinct; beyond that positions pair up into
/// exponentially widening groups (`4,4,5,5,6,6,6,6,...`).
#[inline]
pub fn group_idx(pos: u32) -> u32 {
    if pos < 4 {
        pos
    } else {
        let l = floor_log2(pos);
        (l << 1) | ((pos >> (l - 1)) & 1)
    }
}

/// Smallest coordinate belonging to a last-position group.
#[inline]
pub fn min_in_group(group: u32) -> u32 {
    if group < 4 {
        group
    } else {
        (2 | (group & 1)) << ((group >> 1) - 1)
    }
}

/// Generate the up-right diagonal scan over a `width` x `height` grid.
///
/// Diagonals are traversed from the top (`x = 0`) moving down-left to
/// up-right, starting at DC.
fn diag_scan(width: u32, height: u32) -> Vec<ScanElement> {
    let mut out = Vec::with_capacity((width * height) as usize);
    let (mut x, mut y) = (0u32, 0u32);
    for _ in 0..width * height {
        out.push(ScanElement {
            idx: (y * width + x) as u16,
            x: x as u16,
            y: y as u16,
        });
        if y == 0 || x == width - 1 {
            // Start of the next diagonal, clamped to the bottom edge.
            y = x + y + 1;
            x = 0;
            if y >= height {
                x = y - (height - 1);
                y = height - 1;
            }
        } else {
            x += 1;
            y -= 1;
        }
    }
    out
}

/// Generate the grouped diagonal scan: coefficient groups in diagonal
/// order, positions within each group in diagonal order. Raster indices
/// are relative to the full `width` x `height` grid.
fn grouped_diag_scan(width: u32, height: u32, log2_cg_w: u32, log2_cg_h: u32) -> Vec<ScanElement> {
    let cg_w = 1u32 << log2_cg_w;
    let cg_h = 1u32 << log2_cg_h;
    let groups = diag_scan(width >> log2_cg_w, height >> log2_cg_h);
    let within = diag_scan(cg_w, cg_h);

    let mut out = Vec::with_capacity((width * height) as usize);
    for g in &groups {
        let base_x = u32::from(g.x) << log2_cg_w;
        let base_y = u32::from(g.y) << log2_cg_h;
        for p in &within {
            let x = base_x + u32::from(p.x);
            let y = base_y + u32::from(p.y);
            out.push(ScanElement {
                idx: (y * width + x) as u16,
                x: x as u16,
                y: y as u16,
            });
        }
    }
    out
}

struct ScanRom {
    ungrouped: Vec<Vec<Vec<ScanElement>>>,
    grouped: Vec<Vec<Vec<ScanElement>>>,
}

impl ScanRom {
    fn build() -> Self {
        let mut ungrouped = Vec::with_capacity(NUM_SIZES);
        let mut grouped = Vec::with_capacity(NUM_SIZES);
        for log2_w in 0..NUM_SIZES as u32 {
            let mut urow = Vec::with_capacity(NUM_SIZES);
            let mut grow = Vec::with_capacity(NUM_SIZES);
            for log2_h in 0..NUM_SIZES as u32 {
                let (w, h) = (1u32 << log2_w, 1u32 << log2_h);
                urow.push(diag_scan(w, h));
                let (cg_w, cg_h) = log2_tx_subblock_size(log2_w, log2_h);
                if cg_w <= log2_w && cg_h <= log2_h {
                    grow.push(grouped_diag_scan(w, h, cg_w, cg_h));
                } else {
                    grow.push(diag_scan(w, h));
                }
            }
            ungrouped.push(urow);
            grouped.push(grow);
        }
        Self { ungrouped, grouped }
    }

    fn get() -> &'static ScanRom {
        static ROM: OnceLock<ScanRom> = OnceLock::new();
        ROM.get_or_init(ScanRom::build)
    }
}

/// Ungrouped diagonal scan for a `1 << log2_w` x `1 << log2_h` grid.
pub fn ungrouped_scan(log2_w: u32, log2_h: u32) -> &'static [ScanElement] {
    assert!(
        (log2_w as usize) < NUM_SIZES && (log2_h as usize) < NUM_SIZES,
        "no scan table for {}x{}",
        1u32 << log2_w,
        1u32 << log2_h
    );
    &ScanRom::get().ungrouped[log2_w as usize][log2_h as usize]
}

/// Grouped diagonal scan for a `1 << log2_w` x `1 << log2_h` block, using
/// the normative coefficient-group size for that geometry.
pub fn grouped_scan(log2_w: u32, log2_h: u32) -> &'static [ScanElement] {
    assert!(
        (log2_w as usize) < NUM_SIZES && (log2_h as usize) < NUM_SIZES,
        "no scan table for {}x{}",
        1u32 << log2_w,
        1u32 << log2_h
    );
    &ScanRom::get().grouped[log2_w as usize][log2_h as usize]
}
