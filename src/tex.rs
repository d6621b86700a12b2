//! Texture sections: named lookup textures with inline payloads.
//!
//! A `//!TEXTURE` section declares a texture of up to three dimensions,
//! resolves its format against the device's format table, and carries its
//! texel payload inline as a hex string. The texture is created on the spot
//! and lives for the lifetime of the shader object.

use bytes::Bytes;

use crate::bstr;
use crate::gpu::{AddressMode, FmtCaps, Gpu, SampleMode, TexParams};
use crate::hook::parse_numbers;
use crate::parse::ParseError;

/// A named texture declared by the document.
pub struct ShaderTex<G: Gpu> {
    /// The name passes bind this texture under.
    pub name: Bytes,
    /// The created texture, pre-populated with the decoded payload.
    pub tex: G::Tex,
}

impl<G: Gpu> Clone for ShaderTex<G> {
    fn clone(&self) -> Self {
        ShaderTex {
            name: self.name.clone(),
            tex: self.tex.clone(),
        }
    }
}

impl<G: Gpu> std::fmt::Debug for ShaderTex<G>
where
    G::Tex: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderTex")
            .field("name", &self.name)
            .field("tex", &self.tex)
            .finish()
    }
}

/// Parse one `//!TEXTURE` section from the front of `body` and create the
/// texture it declares.
///
/// On success `body` is left pointing at the next section (or is empty).
pub fn parse_tex<G: Gpu>(gpu: &G, body: &mut Bytes) -> Result<ShaderTex<G>, ParseError> {
    let mut name = Bytes::from_static(b"USER_TEX");
    let mut w: u32 = 1;
    let mut h: u32 = 1;
    let mut d: u32 = 0;
    let mut format = None;
    let mut sample_mode = SampleMode::default();
    let mut address_mode = AddressMode::default();

    loop {
        let (line, rest) = bstr::get_line(body);
        let mut line = bstr::strip(&line);

        if !bstr::eat_start(&mut line, b"//!") {
            break;
        }

        *body = rest;

        if bstr::eat_start(&mut line, b"TEXTURE") {
            name = bstr::strip(&line);
            continue;
        }

        if bstr::eat_start(&mut line, b"SIZE") {
            let sizes = parse_numbers::<i64>(&line, 3);
            let limits = gpu.limits();
            let lim = match sizes.len() {
                1 => limits.max_tex_1d_dim,
                2 => limits.max_tex_2d_dim,
                3 => limits.max_tex_3d_dim,
                _ => {
                    error!("Error while parsing SIZE!");
                    return Err(ParseError::Directive("SIZE"));
                }
            };

            // Sanity check against GPU size limits
            for &value in &sizes {
                if value < 1 || value > lim as i64 {
                    error!(
                        "SIZE {} exceeds GPU's texture size limits ({})!",
                        value, lim
                    );
                    return Err(ParseError::SizeLimit { value, limit: lim });
                }
            }

            // Dimensions not declared stay zeroed
            w = sizes[0] as u32;
            h = sizes.get(1).map(|&v| v as u32).unwrap_or(0);
            d = sizes.get(2).map(|&v| v as u32).unwrap_or(0);
            continue;
        }

        if bstr::eat_start(&mut line, b"FORMAT ") {
            let line = bstr::strip(&line);
            let fmt = match gpu
                .formats()
                .iter()
                .find(|fmt| fmt.name.as_bytes() == &line[..])
            {
                Some(fmt) if !fmt.opaque => fmt,
                _ => {
                    error!(
                        "Unrecognized/unavailable FORMAT name: '{}'!",
                        String::from_utf8_lossy(&line)
                    );
                    return Err(ParseError::UnknownFormat(
                        String::from_utf8_lossy(&line).to_string(),
                    ));
                }
            };

            if !fmt.caps.contains(FmtCaps::SAMPLEABLE) {
                error!("Chosen FORMAT '{}' is not sampleable!", fmt.name);
                return Err(ParseError::NotSampleable(fmt.name.to_string()));
            }

            format = Some(fmt.clone());
            continue;
        }

        if bstr::eat_start(&mut line, b"FILTER") {
            let line = bstr::strip(&line);
            sample_mode = match &line[..] {
                b"LINEAR" => SampleMode::Linear,
                b"NEAREST" => SampleMode::Nearest,
                _ => {
                    error!("Unrecognized FILTER: '{}'!", String::from_utf8_lossy(&line));
                    return Err(ParseError::Directive("FILTER"));
                }
            };
            continue;
        }

        if bstr::eat_start(&mut line, b"BORDER") {
            let line = bstr::strip(&line);
            address_mode = match &line[..] {
                b"CLAMP" => AddressMode::Clamp,
                b"REPEAT" => AddressMode::Repeat,
                b"MIRROR" => AddressMode::Mirror,
                _ => {
                    error!("Unrecognized BORDER: '{}'!", String::from_utf8_lossy(&line));
                    return Err(ParseError::Directive("BORDER"));
                }
            };
            continue;
        }

        let cmd = String::from_utf8_lossy(&line).to_string();
        error!("Unrecognized command '{}'!", cmd);
        return Err(ParseError::UnknownDirective(cmd));
    }

    let format = match format {
        Some(format) => format,
        None => {
            error!("No FORMAT specified!");
            return Err(ParseError::MissingFormat);
        }
    };

    if sample_mode == SampleMode::Linear && !format.caps.contains(FmtCaps::LINEAR) {
        error!("The specified texture format cannot be linear filtered!");
        return Err(ParseError::NotLinearFilterable);
    }

    // Decode the rest of the section (up to the next //! marker) as raw hex
    // data for the texture
    let hexdata = match bstr::find(body, b"//!") {
        Some(pos) => {
            let data = body.slice(..pos);
            *body = body.slice(pos..);
            data
        }
        None => {
            let data = body.clone();
            *body = Bytes::new();
            data
        }
    };

    let payload = hex::decode(bstr::strip(&hexdata)).map_err(|_| {
        error!(
            "Error while parsing TEXTURE body: must be a valid hexadecimal \
             sequence, on a single line!"
        );
        ParseError::BadHex
    })?;

    let texels = w as usize * h.max(1) as usize * d.max(1) as usize;
    let expected = texels * format.texel_size;
    if payload.len() != expected {
        error!(
            "Shader TEXTURE size mismatch: got {} bytes, expected {}!",
            payload.len(),
            expected
        );
        return Err(ParseError::TexSizeMismatch {
            got: payload.len(),
            expected,
        });
    }

    let params = TexParams {
        w,
        h,
        d,
        format,
        sample_mode,
        address_mode,
        initial_data: &payload,
    };
    let tex = gpu.tex_create(&params).map_err(|err| {
        error!("Failed uploading custom texture: {}", err);
        ParseError::TexCreate(err)
    })?;

    Ok(ShaderTex { name, tex })
}
