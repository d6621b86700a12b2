//! The shader code-generation surface.
//!
//! The dispatcher never manufactures shader code wholesale; it drives an
//! emitter owned by the renderer, appending preamble text, binding textures
//! and declaring variables through this trait. Identifiers handed back by
//! the emitter are opaque; the dispatcher only splices them into `#define`
//! lines.

use std::fmt;

use thiserror::Error;

/// An identifier in the generated shader, as coined by the emitter.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Ident(pub String);

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifiers produced by binding a texture for sampling.
#[derive(Clone, Debug)]
pub struct BoundTex {
    /// The sampler itself.
    pub raw: Ident,
    /// Sampling position, normalized.
    pub pos: Ident,
    /// Texture size in texels.
    pub size: Ident,
    /// Reciprocal of the size.
    pub pt: Ident,
}

/// The emitter refused a texture binding.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("failed binding texture to shader")]
pub struct BindError;

/// Shader emission as consumed by the hook dispatcher.
///
/// `append_header` text lands in the preamble (macro definitions, the user
/// pass body); `append_main` text lands at the point the pass result is
/// computed.
pub trait ShaderBuilder {
    /// The texture handle type, matching the GPU's.
    type Tex;

    /// Append text to the shader preamble.
    fn append_header(&mut self, text: &str);

    /// Append text at the main position.
    fn append_main(&mut self, text: &str);

    /// Bind a texture for sampling over `rect`, returning the identifiers
    /// for its sampler, position, size and inverse size.
    fn bind_tex(
        &mut self,
        name: &str,
        tex: &Self::Tex,
        rect: &crate::Rect,
    ) -> Result<BoundTex, BindError>;

    /// Bind a texture as a plain sampled descriptor, returning the sampler
    /// identifier.
    fn bind_lut(&mut self, tex: &Self::Tex) -> Result<Ident, BindError>;

    /// Declare an integer shader variable.
    fn var_int(&mut self, name: &str, value: i32, dynamic: bool) -> Ident;

    /// Declare a float shader variable.
    fn var_float(&mut self, name: &str, value: f64, dynamic: bool) -> Ident;

    /// Declare a 2-vector shader variable.
    fn var_vec2(&mut self, name: &str, value: [f64; 2], dynamic: bool) -> Ident;

    /// Request a compute dispatch with the given block size. Returns
    /// whether the emitter can honor it.
    fn try_compute(&mut self, block_w: i32, block_h: i32) -> bool;

    /// Assert the output size of the pass. Returns whether the emitter can
    /// honor it.
    fn require_size(&mut self, width: f32, height: f32) -> bool;
}
