//! Coding-unit partition-tree data model.
//!
//! Context derivation only ever sees the *neighbor-visible* subset of a
//! coding unit: geometry, depths and a few mode flags. The partition tree
//! itself lives in the surrounding coding structure; this module defines
//! the [`CuLookup`] accessor contract to it, including the slice/tile
//! availability rule that parallel decoding depends on, plus a minimal
//! grid-backed implementation used by tests and reference callers.

use crate::buf::ChannelType;

/// Sample position within a channel's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl Position {
    /// Create a position.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// This position displaced by `(dx, dy)`.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }
}

/// Rectangular block area within a channel's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Area {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in samples.
    pub width: u32,
    /// Height in samples.
    pub height: u32,
}

impl Area {
    /// Create an area.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Top-left corner.
    pub fn pos(&self) -> Position {
        Position::new(self.x as i32, self.y as i32)
    }

    /// Whether `pos` lies inside the area.
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= self.x as i32
            && pos.y >= self.y as i32
            && (pos.x as i64) < i64::from(self.x) + i64::from(self.width)
            && (pos.y as i64) < i64::from(self.y) + i64::from(self.height)
    }
}

/// Prediction mode of a coding unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredMode {
    /// Intra prediction.
    #[default]
    Intra,
    /// Inter prediction.
    Inter,
    /// Intra block copy.
    Ibc,
    /// Palette mode.
    Palette,
}

/// Neighbor-visible state of one decoded coding unit.
#[derive(Debug, Clone)]
pub struct CuInfo {
    /// Block geometry in its channel's coordinates.
    pub area: Area,
    /// Channel the unit codes.
    pub ch_type: ChannelType,
    /// Total coding-tree depth.
    pub depth: u8,
    /// Quad-tree depth component.
    pub qt_depth: u8,
    /// Multi-type-tree depth component.
    pub mtt_depth: u8,
    /// Prediction mode.
    pub pred_mode: PredMode,
    /// Skip flag.
    pub skip: bool,
    /// Affine motion flag.
    pub affine: bool,
    /// Matrix intra prediction flag.
    pub mip_flag: bool,
    /// Independent-slice index the unit belongs to.
    pub slice_idx: u32,
    /// Tile index the unit belongs to.
    pub tile_idx: u32,
}

impl Default for CuInfo {
    fn default() -> Self {
        Self {
            area: Area::new(0, 0, 0, 0),
            ch_type: ChannelType::Luma,
            depth: 0,
            qt_depth: 0,
            mtt_depth: 0,
            pred_mode: PredMode::Intra,
            skip: false,
            affine: false,
            mip_flag: false,
            slice_idx: 0,
            tile_idx: 0,
        }
    }
}

impl CuInfo {
    /// Whether the unit is intra-predicted.
    pub fn is_intra(&self) -> bool {
        self.pred_mode == PredMode::Intra
    }

    /// Whether the unit uses intra block copy.
    pub fn is_ibc(&self) -> bool {
        self.pred_mode == PredMode::Ibc
    }
}

/// Allowed-split set for the current block, as decided by the partitioner.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitOptions {
    /// Leaving the block unsplit is allowed.
    pub no_split: bool,
    /// Quad split allowed.
    pub qt: bool,
    /// Horizontal binary split allowed.
    pub bt_hor: bool,
    /// Vertical binary split allowed.
    pub bt_ver: bool,
    /// Horizontal ternary split allowed.
    pub tt_hor: bool,
    /// Vertical ternary split allowed.
    pub tt_ver: bool,
}

impl SplitOptions {
    /// Number of allowed horizontal splits (binary + ternary).
    pub fn num_hor(&self) -> u32 {
        u32::from(self.bt_hor) + u32::from(self.tt_hor)
    }

    /// Number of allowed vertical splits (binary + ternary).
    pub fn num_ver(&self) -> u32 {
        u32::from(self.bt_ver) + u32::from(self.tt_ver)
    }
}

/// Current partitioner position used by split-context derivation.
#[derive(Debug, Clone)]
pub struct PartitionState {
    /// Current block in its channel's coordinates.
    pub area: Area,
    /// Channel being partitioned.
    pub ch_type: ChannelType,
    /// Current quad-tree depth.
    pub qt_depth: u8,
    /// Current multi-type-tree depth.
    pub mtt_depth: u8,
    /// Independent-slice index of the current block.
    pub slice_idx: u32,
    /// Tile index of the current block.
    pub tile_idx: u32,
    /// Splits the partitioner allows here.
    pub can_split: SplitOptions,
}

/// Read-only accessor to the coding-unit partition tree.
///
/// Implementations expose only *already coded* units: a position that has
/// not been decoded yet behaves exactly like one outside the picture.
pub trait CuLookup {
    /// Coded unit covering `pos` in channel `ch`, if any.
    fn cu_at(&self, pos: Position, ch: ChannelType) -> Option<&CuInfo>;

    /// Neighbor lookup honoring slice/tile restrictions: a unit in a
    /// different independent slice or a different tile is treated the same
    /// as one outside the picture.
    fn cu_restricted(
        &self,
        pos: Position,
        cur_slice: u32,
        cur_tile: u32,
        ch: ChannelType,
    ) -> Option<&CuInfo> {
        let cu = self.cu_at(pos, ch)?;
        if cu.slice_idx != cur_slice || cu.tile_idx != cur_tile {
            return None;
        }
        Some(cu)
    }
}

/// Granularity of the coding-unit grid in samples.
const GRID_UNIT: u32 = 4;

/// Minimal grid-backed [`CuLookup`] implementation over one channel.
///
/// Units are registered in decode order; positions not yet covered by a
/// registered unit report no neighbor.
#[derive(Debug)]
pub struct CodingGrid {
    ch_type: ChannelType,
    width_in_units: u32,
    height_in_units: u32,
    cus: Vec<CuInfo>,
    map: Vec<Option<u32>>,
}

impl CodingGrid {
    /// Empty grid over a `width` x `height` channel plane.
    pub fn new(width: u32, height: u32, ch_type: ChannelType) -> Self {
        let width_in_units = width.div_ceil(GRID_UNIT);
        let height_in_units = height.div_ceil(GRID_UNIT);
        Self {
            ch_type,
            width_in_units,
            height_in_units,
            cus: Vec::new(),
            map: vec![None; (width_in_units * height_in_units) as usize],
        }
    }

    /// Register a coded unit, claiming every grid cell its area covers.
    pub fn add(&mut self, cu: CuInfo) {
        debug_assert_eq!(cu.ch_type, self.ch_type);
        let idx = self.cus.len() as u32;
        let x0 = cu.area.x / GRID_UNIT;
        let y0 = cu.area.y / GRID_UNIT;
        let x1 = (cu.area.x + cu.area.width).div_ceil(GRID_UNIT);
        let y1 = (cu.area.y + cu.area.height).div_ceil(GRID_UNIT);
        for uy in y0..y1.min(self.height_in_units) {
            for ux in x0..x1.min(self.width_in_units) {
                self.map[(uy * self.width_in_units + ux) as usize] = Some(idx);
            }
        }
        self.cus.push(cu);
    }
}

impl CuLookup for CodingGrid {
    fn cu_at(&self, pos: Position, ch: ChannelType) -> Option<&CuInfo> {
        if ch != self.ch_type || pos.x < 0 || pos.y < 0 {
            return None;
        }
        let ux = pos.x as u32 / GRID_UNIT;
        let uy = pos.y as u32 / GRID_UNIT;
        if ux >= self.width_in_units || uy >= self.height_in_units {
            return None;
        }
        let idx = self.map[(uy * self.width_in_units + ux) as usize]?;
        Some(&self.cus[idx as usize])
    }
}
