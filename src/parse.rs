//! The document driver.
//!
//! A user shader document is a sequence of sections, each introduced by a
//! run of `//!` header lines. Sections whose first header is `//!TEXTURE`
//! declare named textures; everything else is a hook pass. The driver walks
//! the document and feeds each parsed record to a registration callback; a
//! callback refusing a record aborts the parse.

use bytes::Bytes;
use thiserror::Error;

use crate::bstr;
use crate::gpu::{Gpu, TexError};
use crate::hook::{parse_hook, Hook};
use crate::tex::{parse_tex, ShaderTex};
use crate::{SHADER_MAX_BINDS, SHADER_MAX_HOOKS};

/// Document parse failure. Any of these aborts the whole document.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ParseError {
    /// The document contains no `//!` header at all.
    #[error("shader contains no headers")]
    NoHeaders,
    /// More than [`SHADER_MAX_HOOKS`](crate::SHADER_MAX_HOOKS) `HOOK` directives.
    #[error("passes may only hook up to {} textures", SHADER_MAX_HOOKS)]
    TooManyHooks,
    /// More than [`SHADER_MAX_BINDS`](crate::SHADER_MAX_BINDS) `BIND` directives.
    #[error("passes may only bind up to {} textures", SHADER_MAX_BINDS)]
    TooManyBinds,
    /// A directive whose payload would not parse.
    #[error("error while parsing {0}")]
    Directive(&'static str),
    /// A header line with an unknown keyword.
    #[error("unrecognized command '{0}'")]
    UnknownDirective(String),
    /// A `SIZE` operand out of the device's range.
    #[error("SIZE {value} exceeds GPU texture size limits ({limit})")]
    SizeLimit {
        ///
        value: i64,
        ///
        limit: u32,
    },
    /// A `FORMAT` name missing from the device's table, or opaque.
    #[error("unrecognized/unavailable FORMAT name '{0}'")]
    UnknownFormat(String),
    /// A `FORMAT` without the sampleable capability.
    #[error("FORMAT '{0}' is not sampleable")]
    NotSampleable(String),
    /// A texture section with no `FORMAT` directive.
    #[error("no FORMAT specified")]
    MissingFormat,
    /// `FILTER LINEAR` on a format without the linear capability.
    #[error("the specified texture format cannot be linear filtered")]
    NotLinearFilterable,
    /// A texture payload that is not valid hex.
    #[error("texture body is not a valid hexadecimal sequence")]
    BadHex,
    /// A texture payload of the wrong length.
    #[error("texture size mismatch: got {got} bytes, expected {expected}")]
    TexSizeMismatch {
        ///
        got: usize,
        ///
        expected: usize,
    },
    /// The device refused the texture.
    #[error("failed uploading custom texture")]
    TexCreate(#[source] TexError),
    /// A registration callback refused a record.
    #[error("section rejected by registration callback")]
    Rejected,
}

/// Parse a whole document, dispatching each section to the matching section
/// parser and feeding the results to the registration callbacks.
///
/// Text preceding the first `//!` line is skipped. A callback returning
/// `false` aborts the parse.
pub fn parse_document<G, FH, FT>(
    gpu: &G,
    mut body: Bytes,
    mut register_hook: FH,
    mut register_tex: FT,
) -> Result<(), ParseError>
where
    G: Gpu,
    FH: FnMut(Hook) -> bool,
    FT: FnMut(ShaderTex<G>) -> bool,
{
    // Skip all garbage (e.g. comments) before the first header
    let pos = match bstr::find(&body, b"//!") {
        Some(pos) => pos,
        None => {
            error!("Shader appears to contain no headers?");
            return Err(ParseError::NoHeaders);
        }
    };
    body = body.slice(pos..);

    // Loop over the file
    while !body.is_empty() {
        // Peek at the first header to dispatch the right type
        if body.starts_with(b"//!TEXTURE") {
            let tex = parse_tex(gpu, &mut body)?;
            if !register_tex(tex) {
                return Err(ParseError::Rejected);
            }
            continue;
        }

        let hook = parse_hook(&mut body)?;
        if !register_hook(hook) {
            return Err(ParseError::Rejected);
        }
    }

    Ok(())
}
