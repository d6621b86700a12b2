//! The GPU abstraction consumed by this crate.
//!
//! Texture creation, the format table and size limits are the renderer's
//! business; everything the parser and dispatcher need from a device fits
//! behind the [`Gpu`] trait. Texture handles are an associated type so the
//! renderer keeps full control over their representation and lifetime.

use std::borrow::Cow;

use thiserror::Error;

use crate::shader::ShaderBuilder;

/// Per-dimension texture size limits of the device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Limits {
    /// Maximum width of a 1D texture.
    pub max_tex_1d_dim: u32,
    /// Maximum width/height of a 2D texture.
    pub max_tex_2d_dim: u32,
    /// Maximum width/height/depth of a 3D texture.
    pub max_tex_3d_dim: u32,
}

bitflags!(
    /// Capabilities of a texture format.
    pub struct FmtCaps: u32 {
        /// The format can be read with a sampler.
        const SAMPLEABLE = 1 << 0;
        /// The format supports linear filtering.
        const LINEAR = 1 << 1;
    }
);

/// One entry of the device's texture format table.
#[derive(Clone, Debug, PartialEq)]
pub struct Fmt {
    /// The name user shaders use to request this format, e.g. `rgba8`.
    pub name: Cow<'static, str>,
    /// Whether the in-memory representation is hidden from the host.
    /// Opaque formats cannot be initialized from inline data.
    pub opaque: bool,
    ///
    pub caps: FmtCaps,
    /// Bytes per texel.
    pub texel_size: usize,
}

/// Texture magnification/minification behavior.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SampleMode {
    ///
    Nearest,
    ///
    Linear,
}

impl Default for SampleMode {
    fn default() -> Self {
        SampleMode::Nearest
    }
}

/// Texture addressing outside the unit rectangle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddressMode {
    ///
    Clamp,
    ///
    Repeat,
    ///
    Mirror,
}

impl Default for AddressMode {
    fn default() -> Self {
        AddressMode::Clamp
    }
}

/// Parameters for creating a texture with initial contents.
///
/// A dimension of 0 means the dimension is unused; a plain 2D texture has
/// `d == 0`.
#[derive(Clone, Debug)]
pub struct TexParams<'a> {
    ///
    pub w: u32,
    ///
    pub h: u32,
    ///
    pub d: u32,
    ///
    pub format: Fmt,
    ///
    pub sample_mode: SampleMode,
    ///
    pub address_mode: AddressMode,
    /// Texel payload, tightly packed, exactly filling the texture.
    pub initial_data: &'a [u8],
}

/// Texture creation failure.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum TexError {
    ///
    #[error("out of memory")]
    OutOfMemory,
    ///
    #[error("unsupported texture parameters")]
    Unsupported,
}

/// The device surface consumed by the parser and dispatcher.
pub trait Gpu: Sized {
    /// A texture handle. Cheap to clone; released via [`Gpu::tex_destroy`].
    type Tex: Clone;
    /// The shader code generator passes are emitted into.
    type Shader: ShaderBuilder<Tex = Self::Tex>;

    /// The device's texture size limits.
    fn limits(&self) -> Limits;

    /// The device's texture format table.
    fn formats(&self) -> &[Fmt];

    /// Create a texture pre-populated with `params.initial_data`.
    fn tex_create(&self, params: &TexParams<'_>) -> Result<Self::Tex, TexError>;

    /// Width and height of an existing texture.
    fn tex_size(&self, tex: &Self::Tex) -> (u32, u32);

    /// Release a texture handle.
    fn tex_destroy(&self, tex: Self::Tex);
}
