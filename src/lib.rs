//! Rate-distortion decision core for a VVC/H.266-class encoder.
//!
//! This crate implements the cost and context machinery that drives a
//! block-partition search: distortion metrics, Lagrangian cost management,
//! and the entropy-context derivation the bit estimator relies on.
//!
//! # Features
//!
//! - **Distortion Metrics**: SAD, full-bit-depth SAD, mean-removed SAD,
//!   SSE, Hadamard SATD (with the mean-scaled DC reduction) and its
//!   mean-removed variant, and masked SAD — all with size-specialized
//!   kernels selected by block width
//! - **RdCost Engine**: Lagrange multiplier management with derived
//!   distortion scaling, lossless-mode sentinels, per-component distortion
//!   weights, standardized row sub-sampling policies, and the paired lambda
//!   adjustment used under the adaptive color transform
//! - **Perceptual Weighting** (`wcg` feature): luma-adaptive MSE weighting
//!   from the fixed HDR tone curve or a per-slice reshaper model
//! - **Coefficient Coding Context**: per-transform-unit subblock state
//!   machine over reverse diagonal scan order, with last-position,
//!   significance, parity, greater-than-x and transform-skip contexts and
//!   both Golomb-Rice parameter derivation strategies
//! - **Spatial Context Derivation**: split, skip, prediction-mode, affine,
//!   IBC, MIP, CBF, inter-direction and palette-run contexts from the
//!   decoded left/above neighborhood, honoring slice/tile restrictions
//!
//! # Architecture
//!
//! The partition search evaluates a candidate by asking [`RdCost`] for a
//! [`DistParam`] over the original and reconstructed blocks, running the
//! resolved kernel, and combining the distortion with an estimated bit
//! count via [`RdCost::calc_rd_cost`]. The bit estimator in turn feeds its
//! entropy coder the context ids produced by [`CoeffCodingContext`] and the
//! functions in [`derive`].
//!
//! # Example
//!
//! ```
//! use vvc_rdcost::{BitDepths, ComponentId, DistFuncKind, PelBuf, RdCost};
//!
//! let org = vec![128i16; 16 * 16];
//! let cur = vec![131i16; 16 * 16];
//!
//! let mut rd = RdCost::new();
//! rd.set_lambda(16.5, BitDepths::default());
//!
//! let dist = rd.get_dist_part(
//!     PelBuf::new(&org, 16, 16, 16),
//!     PelBuf::new(&cur, 16, 16, 16),
//!     10,
//!     ComponentId::Y,
//!     DistFuncKind::Sad,
//! );
//! let cost = rd.calc_rd_cost(250, dist);
//! assert!(cost > 250.0);
//! ```

#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub mod buf;
pub mod coeff;
pub mod config;
pub mod ctx;
pub mod derive;
pub mod dist;
pub mod error;
pub mod rdcost;
pub mod scan;
pub mod unit;

// Re-export the sample and buffer types.
pub use buf::{BitDepths, ChannelType, ChromaFormat, ComponentId, Distortion, Pel, PelBuf};

// Re-export error types.
pub use error::{RdError, Result};

// Re-export configuration types.
pub use config::{CostMode, ReshapeModel, SignalType, SpsFlags, SpsParams};

// Re-export the metric library surface.
pub use dist::{DistFunc, DistFuncKind, DistParam};

// Re-export the engine.
pub use rdcost::{RdCost, SubShiftMode, SCALE_BITS};

// Re-export coefficient coding context types.
pub use coeff::{BdpcmMode, CoeffCodingContext, RiceDerivation};

// Re-export the partition-tree data model.
pub use unit::{Area, CodingGrid, CuInfo, CuLookup, PartitionState, Position, SplitOptions};

// Re-export spatial context derivation results.
pub use derive::{PltRunMode, SplitCtx};
