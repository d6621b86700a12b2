//! Pipeline stages and their external names.
//!
//! The user shader format addresses stages by the textual names mpv gave
//! them, which do not line up one-to-one with the renderer's own stage
//! enumeration: `MAINPRESUB` is the plain RGB stage and `MAIN` is RGB with
//! overlays applied. The table below is the single source of truth for both
//! directions.

bitflags!(
    /// A set of pipeline stages a pass can execute on.
    ///
    /// Each renderer invocation carries exactly one of these bits; hook
    /// passes accumulate unions of them.
    pub struct Stages: u32 {
        /// Raw RGB input.
        const RGB_INPUT = 1 << 0;
        /// Raw luma plane input.
        const LUMA_INPUT = 1 << 1;
        /// Raw chroma plane input.
        const CHROMA_INPUT = 1 << 2;
        /// Raw alpha plane input.
        const ALPHA_INPUT = 1 << 3;
        /// Raw XYZ input.
        const XYZ_INPUT = 1 << 4;
        /// Chroma after upscaling to luma resolution.
        const CHROMA_SCALED = 1 << 5;
        /// Alpha after upscaling to luma resolution.
        const ALPHA_SCALED = 1 << 6;
        /// Merged planes, native colorspace.
        const NATIVE = 1 << 7;
        /// Converted to RGB.
        const RGB = 1 << 8;
        /// RGB with overlays applied.
        const RGB_OVERLAY = 1 << 9;
        /// Linear light.
        const LINEAR = 1 << 10;
        /// Sigmoidized for upscaling.
        const SIGMOID = 1 << 11;
        /// Immediately before the scaler kernel.
        const PREKERNEL = 1 << 12;
        /// Immediately after the scaler kernel.
        const POSTKERNEL = 1 << 13;
        /// After scaling to output resolution.
        const SCALED = 1 << 14;
        /// Final output.
        const OUTPUT = 1 << 15;
    }
);

const STAGE_NAMES: &[(&str, Stages)] = &[
    ("RGB", Stages::RGB_INPUT),
    ("LUMA", Stages::LUMA_INPUT),
    ("CHROMA", Stages::CHROMA_INPUT),
    ("ALPHA", Stages::ALPHA_INPUT),
    ("XYZ", Stages::XYZ_INPUT),
    ("CHROMA_SCALED", Stages::CHROMA_SCALED),
    ("ALPHA_SCALED", Stages::ALPHA_SCALED),
    ("NATIVE", Stages::NATIVE),
    ("MAINPRESUB", Stages::RGB),
    ("MAIN", Stages::RGB_OVERLAY),
    ("LINEAR", Stages::LINEAR),
    ("SIGMOID", Stages::SIGMOID),
    ("PREKERNEL", Stages::PREKERNEL),
    ("POSTKERNEL", Stages::POSTKERNEL),
    ("SCALED", Stages::SCALED),
    ("OUTPUT", Stages::OUTPUT),
];

/// Map an external stage name to its stage bit.
///
/// Unknown names map to the empty set.
pub fn from_name(name: &[u8]) -> Stages {
    for &(n, stage) in STAGE_NAMES {
        if n.as_bytes() == name {
            return stage;
        }
    }
    Stages::empty()
}

/// Map a single stage bit back to its external name.
///
/// Anything that is not exactly one known stage maps to `"UNKNOWN"`.
pub fn name(stage: Stages) -> &'static str {
    for &(n, s) in STAGE_NAMES {
        if s == stage {
            return n;
        }
    }
    "UNKNOWN"
}
