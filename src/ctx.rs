//! Context-set catalog for the adaptive probability models.
//!
//! The entropy coder owns the probability states; this crate only hands it
//! integer context ids. A [`CtxSet`] is a contiguous span of ids; the
//! increment added on top of the base is the normative part derived by the
//! context-modelling code. Set cardinalities match the syntax they serve.

/// A contiguous span of context-model ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtxSet {
    offset: u16,
    size: u16,
}

impl CtxSet {
    /// Define a set at `offset` holding `size` contexts.
    pub const fn new(offset: u16, size: u16) -> Self {
        Self { offset, size }
    }

    /// Absolute id of the `inc`-th context of the set.
    #[inline]
    pub fn ctx(&self, inc: u32) -> u32 {
        debug_assert!(inc < u32::from(self.size), "context increment out of range");
        u32::from(self.offset) + inc
    }

    /// First id of the set.
    pub fn base(&self) -> u32 {
        u32::from(self.offset)
    }

    /// Number of contexts in the set.
    pub fn size(&self) -> u32 {
        u32::from(self.size)
    }
}

macro_rules! ctx_layout {
    ($(($name:ident, $size:expr)),+ $(,)?) => {
        ctx_layout!(@accum 0u16; $(($name, $size)),+);
    };
    (@accum $offset:expr; ($name:ident, $size:expr)) => {
        #[allow(missing_docs)]
        pub const $name: CtxSet = CtxSet::new($offset, $size);
        /// Total number of context models in the catalog.
        pub const NUM_CTX_MODELS: u16 = $offset + $size;
    };
    (@accum $offset:expr; ($name:ident, $size:expr), $(($names:ident, $sizes:expr)),+) => {
        #[allow(missing_docs)]
        pub const $name: CtxSet = CtxSet::new($offset, $size);
        ctx_layout!(@accum $offset + $size; $(($names, $sizes)),+);
    };
}

/// Catalog of the context sets produced by this crate.
///
/// Ids are assigned sequentially; the coder sizes its model array from
/// [`NUM_CTX_MODELS`](ctx_sets::NUM_CTX_MODELS).
pub mod ctx_sets {
    use super::CtxSet;

    ctx_layout! {
        // Partitioning.
        (SPLIT_FLAG, 9),
        (SPLIT_QT_FLAG, 6),
        (SPLIT_HV_FLAG, 5),
        (SPLIT12_FLAG, 4),
        (MODE_CONS_FLAG, 2),
        // CU mode flags.
        (SKIP_FLAG, 3),
        (PRED_MODE, 2),
        (AFFINE_FLAG, 3),
        (IBC_FLAG, 3),
        (MIP_FLAG, 4),
        (INTER_DIR, 6),
        // Coded-block flags.
        (QT_CBF_LUMA, 4),
        (QT_CBF_CB, 2),
        (QT_CBF_CR, 2),
        // Last significant position prefixes.
        (LAST_X_LUMA, 20),
        (LAST_X_CHROMA, 4),
        (LAST_Y_LUMA, 20),
        (LAST_Y_CHROMA, 4),
        // Coefficient-group significance.
        (SIG_COEFF_GROUP_LUMA, 2),
        (SIG_COEFF_GROUP_CHROMA, 2),
        // Significance flags, three dependent-quantization state tiers.
        (SIG_FLAG_LUMA_0, 12),
        (SIG_FLAG_CHROMA_0, 8),
        (SIG_FLAG_LUMA_1, 12),
        (SIG_FLAG_CHROMA_1, 8),
        (SIG_FLAG_LUMA_2, 12),
        (SIG_FLAG_CHROMA_2, 8),
        // Parity and greater-than-x flags.
        (PAR_FLAG_LUMA, 21),
        (PAR_FLAG_CHROMA, 11),
        (GT1_FLAG_LUMA, 21),
        (GT1_FLAG_CHROMA, 11),
        (GT2_FLAG_LUMA, 21),
        (GT2_FLAG_CHROMA, 11),
        // Transform-skip residual coding.
        (TS_SIG_COEFF_GROUP, 3),
        (TS_SIG_FLAG, 3),
        (TS_PAR_FLAG, 1),
        (TS_GTX_FLAG, 5),
        (TS_LRG1_FLAG, 4),
        (TS_RESIDUAL_SIGN, 6),
        // Palette runs.
        (PLT_RUN_INDEX, 5),
        (PLT_RUN_COPY, 3),
    }

    /// Significance-flag set for a channel and dependent-quantization
    /// state tier (0..=2).
    pub fn sig_flag(ch: crate::buf::ChannelType, tier: usize) -> CtxSet {
        match (ch, tier) {
            (crate::buf::ChannelType::Luma, 0) => SIG_FLAG_LUMA_0,
            (crate::buf::ChannelType::Chroma, 0) => SIG_FLAG_CHROMA_0,
            (crate::buf::ChannelType::Luma, 1) => SIG_FLAG_LUMA_1,
            (crate::buf::ChannelType::Chroma, 1) => SIG_FLAG_CHROMA_1,
            (crate::buf::ChannelType::Luma, 2) => SIG_FLAG_LUMA_2,
            (crate::buf::ChannelType::Chroma, 2) => SIG_FLAG_CHROMA_2,
            _ => panic!("invalid sig-flag tier"),
        }
    }
}
