//! Hook sections: one user-authored pass each.
//!
//! A hook section is a run of `//!` directive lines followed by the pass
//! body, which runs up to the next `//!` line or the end of the document.
//! Directives configure where the pass fires, what it binds, how big its
//! output is and whether it runs as a compute shader.

use arrayvec::ArrayVec;
use bytes::Bytes;

use crate::bstr;
use crate::parse::ParseError;
use crate::szexp::SzExpr;
use crate::{SHADER_MAX_BINDS, SHADER_MAX_HOOKS};

/// A 2x2 linear transform plus translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2x2 {
    ///
    pub mat: [[f32; 2]; 2],
    ///
    pub c: [f32; 2],
}

impl Default for Transform2x2 {
    fn default() -> Self {
        Transform2x2 {
            mat: [[1.0, 0.0], [0.0, 1.0]],
            c: [0.0, 0.0],
        }
    }
}

/// The parsed form of one hook section.
///
/// All names and the body are windows into the document buffer.
#[derive(Clone, Debug)]
pub struct Hook {
    /// Human-readable description, from `DESC`.
    pub pass_desc: Bytes,
    /// Stage names this pass fires on, from `HOOK`.
    pub hook_tex: ArrayVec<Bytes, SHADER_MAX_HOOKS>,
    /// Texture names this pass binds as inputs, from `BIND`.
    pub bind_tex: ArrayVec<Bytes, SHADER_MAX_BINDS>,
    /// Name the output is saved under, from `SAVE`.
    pub save_tex: Option<Bytes>,
    /// The verbatim shader source of the pass.
    pub pass_body: Bytes,
    /// Output position offset, from `OFFSET`.
    pub offset: Transform2x2,
    /// Number of components the pass produces, from `COMPONENTS`.
    pub components: i32,
    /// Output width program, from `WIDTH`. Defaults to `HOOKED.w`.
    pub width: SzExpr,
    /// Output height program, from `HEIGHT`. Defaults to `HOOKED.h`.
    pub height: SzExpr,
    /// Execution gate program, from `WHEN`. Defaults to `1`.
    pub cond: SzExpr,
    /// Whether the pass dispatches as a compute shader.
    pub is_compute: bool,
    ///
    pub block_w: i32,
    ///
    pub block_h: i32,
    ///
    pub threads_w: i32,
    ///
    pub threads_h: i32,
}

impl Default for Hook {
    fn default() -> Self {
        Hook {
            pass_desc: Bytes::from_static(b"(unknown)"),
            hook_tex: ArrayVec::new(),
            bind_tex: ArrayVec::new(),
            save_tex: None,
            pass_body: Bytes::new(),
            offset: Transform2x2::default(),
            components: 0,
            width: SzExpr::var_w(Bytes::from_static(b"HOOKED")),
            height: SzExpr::var_h(Bytes::from_static(b"HOOKED")),
            cond: SzExpr::constant(1.0),
            is_compute: false,
            block_w: 0,
            block_h: 0,
            threads_w: 0,
            threads_h: 0,
        }
    }
}

/// Parse one hook section from the front of `body`.
///
/// On success `body` is left pointing at the next section (or is empty).
pub fn parse_hook(body: &mut Bytes) -> Result<Hook, ParseError> {
    let mut out = Hook::default();

    // Parse all headers
    loop {
        let (line, rest) = bstr::get_line(body);
        let mut line = bstr::strip(&line);

        // Check for the presence of the magic line beginning
        if !bstr::eat_start(&mut line, b"//!") {
            break;
        }

        *body = rest;

        // Parse the supported commands
        if bstr::eat_start(&mut line, b"HOOK") {
            if out.hook_tex.try_push(bstr::strip(&line)).is_err() {
                error!(
                    "Passes may only hook up to {} textures!",
                    SHADER_MAX_HOOKS
                );
                return Err(ParseError::TooManyHooks);
            }
            continue;
        }

        if bstr::eat_start(&mut line, b"BIND") {
            if out.bind_tex.try_push(bstr::strip(&line)).is_err() {
                error!(
                    "Passes may only bind up to {} textures!",
                    SHADER_MAX_BINDS
                );
                return Err(ParseError::TooManyBinds);
            }
            continue;
        }

        if bstr::eat_start(&mut line, b"SAVE") {
            out.save_tex = Some(bstr::strip(&line));
            continue;
        }

        if bstr::eat_start(&mut line, b"DESC") {
            out.pass_desc = bstr::strip(&line);
            continue;
        }

        if bstr::eat_start(&mut line, b"OFFSET") {
            let floats = parse_floats(&line, 2);
            if floats.len() < 2 {
                error!("Error while parsing OFFSET!");
                return Err(ParseError::Directive("OFFSET"));
            }
            out.offset.c = [floats[0], floats[1]];
            continue;
        }

        if bstr::eat_start(&mut line, b"WIDTH") {
            out.width = SzExpr::parse(&line).map_err(|err| {
                error!("Error while parsing WIDTH! ({})", err);
                ParseError::Directive("WIDTH")
            })?;
            continue;
        }

        if bstr::eat_start(&mut line, b"HEIGHT") {
            out.height = SzExpr::parse(&line).map_err(|err| {
                error!("Error while parsing HEIGHT! ({})", err);
                ParseError::Directive("HEIGHT")
            })?;
            continue;
        }

        if bstr::eat_start(&mut line, b"WHEN") {
            out.cond = SzExpr::parse(&line).map_err(|err| {
                error!("Error while parsing WHEN! ({})", err);
                ParseError::Directive("WHEN")
            })?;
            continue;
        }

        if bstr::eat_start(&mut line, b"COMPONENTS") {
            match parse_ints(&line, 1).first() {
                Some(&n) => out.components = n,
                None => {
                    error!("Error while parsing COMPONENTS!");
                    return Err(ParseError::Directive("COMPONENTS"));
                }
            }
            continue;
        }

        if bstr::eat_start(&mut line, b"COMPUTE") {
            let ints = parse_ints(&line, 4);
            match ints.len() {
                2 | 4 => {
                    out.block_w = ints[0];
                    out.block_h = ints[1];
                    if ints.len() == 4 {
                        out.threads_w = ints[2];
                        out.threads_h = ints[3];
                    }
                    out.is_compute = true;
                }
                _ => {
                    error!("Error while parsing COMPUTE!");
                    return Err(ParseError::Directive("COMPUTE"));
                }
            }
            continue;
        }

        // Unknown command type
        let cmd = String::from_utf8_lossy(&line).to_string();
        error!("Unrecognized command '{}'!", cmd);
        return Err(ParseError::UnknownDirective(cmd));
    }

    // The rest of the file up until the next magic line beginning (if any)
    // shall be the shader body
    match bstr::find(body, b"//!") {
        Some(pos) => {
            out.pass_body = body.slice(..pos);
            *body = body.slice(pos..);
        }
        None => {
            out.pass_body = body.clone();
            *body = Bytes::new();
        }
    }

    // Sanity checking
    if out.hook_tex.is_empty() {
        warn!("Pass has no hooked textures (will be ignored)!");
    }

    Ok(out)
}

/// Up to `max` whitespace-separated floats from the front of `line`,
/// stopping at the first token that does not parse.
fn parse_floats(line: &Bytes, max: usize) -> Vec<f32> {
    parse_numbers(line, max)
}

/// Up to `max` whitespace-separated integers from the front of `line`,
/// stopping at the first token that does not parse.
fn parse_ints(line: &Bytes, max: usize) -> Vec<i32> {
    parse_numbers(line, max)
}

pub(crate) fn parse_numbers<T: std::str::FromStr>(line: &Bytes, max: usize) -> Vec<T> {
    let mut out = Vec::new();
    let mut rest = line.clone();
    while out.len() < max && !rest.is_empty() {
        let (word, tail) = bstr::split_char(&rest, b' ');
        rest = tail;
        let word = bstr::strip(&word);
        if word.is_empty() {
            continue;
        }
        match String::from_utf8_lossy(&word).parse::<T>() {
            Ok(v) => out.push(v),
            Err(_) => break,
        }
    }
    out
}
