/*!
User-shader hooks for GPU video pipelines.

This crate ingests text documents written in the mpv-flavoured user shader
format (`.hook` files) and turns them into reusable [`UserShader`] objects
that a renderer invokes at named stages of its processing pipeline. Each
invocation may run one or more user-supplied shader passes that read from
previously produced textures, compute a new image, and optionally save their
result under a name for later passes to consume.

The renderer side of the contract is expressed through two traits:

  - [`Gpu`] provides texture creation, the texture format table and size
    limits. Nothing here talks to a real device; the renderer plugs in its
    own backend.
  - [`ShaderBuilder`] is the code-generation surface: appending preamble
    text, binding textures, declaring shader variables, requesting compute
    dispatch and asserting the output size.

Everything operates on data, synchronously, on the caller's thread.
*/

#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate log;

pub use crate::dispatch::{
    HookError, HookParams, HookStatus, HookTex, SaveParams, UserShader,
};
pub use crate::gpu::{AddressMode, Fmt, FmtCaps, Gpu, Limits, SampleMode, TexError, TexParams};
pub use crate::hook::{Hook, Transform2x2};
pub use crate::parse::ParseError;
pub use crate::shader::{BindError, BoundTex, Ident, ShaderBuilder};
pub use crate::stage::Stages;
pub use crate::szexp::{EvalError, SizeLookup, SzExp, SzExpr, SzExprError};
pub use crate::tex::ShaderTex;

pub mod bstr;
pub mod dispatch;
pub mod gpu;
pub mod hook;
pub mod parse;
pub mod shader;
pub mod stage;
pub mod szexp;
pub mod tex;

/// Maximum number of `HOOK` directives per pass.
pub const SHADER_MAX_HOOKS: usize = 16;
/// Maximum number of `BIND` directives per pass.
pub const SHADER_MAX_BINDS: usize = 16;
/// Maximum number of tokens in a size expression.
pub const MAX_SZEXP_SIZE: usize = 32;

/// An axis-aligned rectangle, in texel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    ///
    pub x0: f32,
    ///
    pub y0: f32,
    ///
    pub x1: f32,
    ///
    pub y1: f32,
}

impl Rect {
    /// A rectangle spanning `(0, 0)` to `(w, h)`.
    pub fn sized(w: f32, h: f32) -> Self {
        Rect {
            x0: 0.0,
            y0: 0.0,
            x1: w,
            y1: h,
        }
    }

    /// Width of the rectangle.
    pub fn w(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height of the rectangle.
    pub fn h(&self) -> f32 {
        self.y1 - self.y0
    }
}
