//! Hook selection, gating, binding and emission.
//!
//! The renderer drives a [`UserShader`] through every frame: once per stage
//! it calls [`UserShader::hook`], possibly several times when more than one
//! pass fires on that stage, then reports saved outputs back through
//! [`UserShader::save`] and clears per-frame state with
//! [`UserShader::reset`] at the end of the frame.

use bytes::Bytes;
use rand_xoshiro::rand_core::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use thiserror::Error;

use crate::gpu::Gpu;
use crate::hook::Hook;
use crate::parse::{parse_document, ParseError};
use crate::shader::ShaderBuilder;
use crate::stage::{self, Stages};
use crate::szexp::{EvalError, SizeLookup};
use crate::tex::ShaderTex;
use crate::Rect;

bitflags!(
    /// Status word returned by [`UserShader::hook`].
    pub struct HookStatus: u32 {
        /// The renderer should capture this pass's output and report it
        /// back via [`UserShader::save`].
        const SAVE = 1 << 0;
        /// More passes fire on this stage; invoke the dispatcher again
        /// with an incremented count.
        const AGAIN = 1 << 1;
    }
);

/// Hook execution failure. The renderer should skip this pass for the
/// current frame and call [`UserShader::reset`] at the end of it.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum HookError {
    /// A size or gate expression failed to evaluate.
    #[error(transparent)]
    Eval(#[from] EvalError),
    /// The emitter could not honor the compute dispatch.
    #[error("failed dispatching compute shader")]
    Compute,
    /// The emitter could not honor the requested output size.
    #[error("incompatible shader size requirements")]
    OutputSize,
    /// A texture binding was refused.
    #[error("failed binding texture '{0}'")]
    Bind(String),
}

/// A texture as handed over by the renderer for one invocation.
pub struct HookTex<G: Gpu> {
    ///
    pub tex: G::Tex,
    /// The rectangle of the texture holding the image.
    pub src_rect: Rect,
    /// Scale normalizing sampled values, emitted as `{name}_mul`.
    pub mul: f32,
}

impl<G: Gpu> Clone for HookTex<G> {
    fn clone(&self) -> Self {
        HookTex {
            tex: self.tex.clone(),
            src_rect: self.src_rect,
            mul: self.mul,
        }
    }
}

/// Everything the renderer supplies for one dispatcher invocation.
pub struct HookParams<'a, G: Gpu> {
    ///
    pub gpu: &'a G,
    /// The stage being executed; exactly one bit.
    pub stage: Stages,
    /// Which invocation at this stage this is, starting at 0.
    pub count: usize,
    /// The texture currently being processed.
    pub tex: HookTex<G>,
    /// The frame's overall source rectangle.
    pub src_rect: Rect,
    /// The frame's overall destination rectangle.
    pub dst_rect: Rect,
    /// The shader being generated for this pass.
    pub sh: &'a mut G::Shader,
}

/// The renderer reporting a previously requested save.
pub struct SaveParams<G: Gpu> {
    /// The stage the saved pass executed on; exactly one bit.
    pub stage: Stages,
    /// The invocation count of the saved pass.
    pub count: usize,
    /// The captured output.
    pub tex: HookTex<G>,
}

struct HookPass {
    exec_stages: Stages,
    hook: Hook,
}

struct PassTex<G: Gpu> {
    name: Bytes,
    tex: HookTex<G>,
}

/// A parsed user shader document, ready for dispatch.
///
/// Owns the document text and the textures declared by it. The renderer
/// must serialise all calls; nothing here is re-entrant. Call
/// [`UserShader::destroy`] to release the declared textures; dropping the
/// object without it leaks them on the device.
pub struct UserShader<G: Gpu> {
    passes: Vec<HookPass>,
    lut_textures: Vec<ShaderTex<G>>,
    stages: Stages,
    save_stages: Stages,

    // Dynamic per frame
    pass_textures: Vec<PassTex<G>>,

    // State for PRNG/frame count
    frame_count: i32,
    prng: Xoshiro256Plus,
}

// Determined by fair die roll
const PRNG_SEED: [u64; 4] = [
    0xb76d71f9443c228a,
    0x93a02092fc4807e8,
    0x06d81748f838bd07,
    0x9381ee129dddce6c,
];

fn seeded_prng() -> Xoshiro256Plus {
    let mut seed = [0u8; 32];
    for (chunk, word) in seed.chunks_exact_mut(8).zip(PRNG_SEED.iter()) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    Xoshiro256Plus::from_seed(seed)
}

fn prng_step(prng: &mut Xoshiro256Plus) -> f64 {
    (prng.next_u64() >> 11) as f64 * 2f64.powi(-53)
}

/// The composite name lookup for size expressions: the hooked texture, the
/// frame rectangles, then any saved pass texture, first match wins.
struct TexSizeLookup<'a, G: Gpu> {
    gpu: &'a G,
    hooked: &'a HookTex<G>,
    src_rect: Rect,
    dst_rect: Rect,
    pass_textures: &'a [PassTex<G>],
}

impl<G: Gpu> SizeLookup for TexSizeLookup<'_, G> {
    fn lookup(&self, name: &[u8]) -> Option<(f32, f32)> {
        if name == b"HOOKED" {
            let (w, h) = self.gpu.tex_size(&self.hooked.tex);
            return Some((w as f32, h as f32));
        }

        if name == b"NATIVE_CROPPED" {
            return Some((self.src_rect.w(), self.src_rect.h()));
        }

        if name == b"OUTPUT" {
            return Some((self.dst_rect.w(), self.dst_rect.h()));
        }

        let ptex = self.pass_textures.iter().find(|pt| pt.name == name)?;
        let (w, h) = self.gpu.tex_size(&ptex.tex.tex);
        Some((w as f32, h as f32))
    }
}

/// Bind `htex` for sampling under `name` and emit the per-texture macro
/// preamble: the raw sampler, position/size/inverse-size, rectangle origin,
/// normalisation scale, the identity coordinate map, the mpv-compatible
/// rotation, and the sampling helpers.
fn bind_hook_tex<G: Gpu>(
    sh: &mut G::Shader,
    name: &[u8],
    htex: &HookTex<G>,
) -> Result<(), HookError> {
    let name = String::from_utf8_lossy(name);
    let bound = sh
        .bind_tex("hook_tex", &htex.tex, &htex.src_rect)
        .map_err(|_| {
            error!("Failed binding texture '{}'!", name);
            HookError::Bind(name.to_string())
        })?;

    sh.append_header(&format!("#define {}_raw {} \n", name, bound.raw));
    sh.append_header(&format!("#define {}_pos {} \n", name, bound.pos));
    sh.append_header(&format!("#define {}_size {} \n", name, bound.size));
    sh.append_header(&format!("#define {}_pt {} \n", name, bound.pt));

    let off = sh.var_vec2(
        "offset",
        [htex.src_rect.x0 as f64, htex.src_rect.y0 as f64],
        false,
    );
    sh.append_header(&format!("#define {}_off {} \n", name, off));

    let scale = htex.mul;
    sh.append_header(&format!("#define {}_mul {:.6} \n", name, scale));

    // Sampling positions are already relative to the bound rectangle
    sh.append_header(&format!("#define {}_map(pos) (pos) \n", name));

    // Compatibility with mpv
    sh.append_header(&format!("#define {}_rot mat2(1.0, 0.0, 0.0, 1.0) \n", name));

    // Sampling function boilerplate
    sh.append_header(&format!(
        "#define {}_tex(pos) ({:.6} * vec4(texture({}, pos))) \n",
        name, scale, bound.raw
    ));
    sh.append_header(&format!(
        "#define {}_texOff(off) ({}_tex({} + {} * vec2(off))) \n",
        name, name, bound.pos, bound.pt
    ));

    Ok(())
}

const HOOKED_ALIASES: [&str; 10] = [
    "raw", "pos", "size", "rot", "off", "pt", "map", "mul", "tex", "texOff",
];

impl<G: Gpu> UserShader<G> {
    /// Parse a user shader document into a dispatchable object.
    ///
    /// Every texture section creates its texture up front; on any parse
    /// failure all partially constructed state is released and the error
    /// returned.
    pub fn parse(gpu: &G, text: &str) -> Result<Self, ParseError> {
        let doc = Bytes::copy_from_slice(text.as_bytes());

        let mut passes: Vec<HookPass> = Vec::new();
        let mut lut_textures: Vec<ShaderTex<G>> = Vec::new();
        let mut save_stages = Stages::empty();

        let result = parse_document(
            gpu,
            doc,
            |hook| {
                let mut exec_stages = Stages::empty();
                for name in &hook.hook_tex {
                    exec_stages |= stage::from_name(name);
                }
                // Any bind name that is itself a stage name forces that
                // stage's input to be captured, as does binding HOOKED.
                for name in &hook.bind_tex {
                    save_stages |= stage::from_name(name);
                    if &name[..] == b"HOOKED" {
                        save_stages |= exec_stages;
                    }
                }

                info!(
                    "Registering hook pass: {}",
                    String::from_utf8_lossy(&hook.pass_desc)
                );
                passes.push(HookPass { exec_stages, hook });
                true
            },
            |tex| {
                info!(
                    "Registering named texture '{}'",
                    String::from_utf8_lossy(&tex.name)
                );
                lut_textures.push(tex);
                true
            },
        );

        if let Err(err) = result {
            for tex in lut_textures {
                gpu.tex_destroy(tex.tex);
            }
            return Err(err);
        }

        // Execute on the save stages as well, so any input a later pass
        // might bind gets captured when it comes by.
        let mut stages = save_stages;
        for pass in &passes {
            stages |= pass.exec_stages;
        }

        Ok(UserShader {
            passes,
            lut_textures,
            stages,
            save_stages,
            pass_textures: Vec::new(),
            frame_count: 0,
            prng: seeded_prng(),
        })
    }

    /// The set of stages this object wants to be invoked on.
    pub fn stages(&self) -> Stages {
        self.stages
    }

    /// Release the textures declared by the document.
    pub fn destroy(self, gpu: &G) {
        for tex in self.lut_textures {
            gpu.tex_destroy(tex.tex);
        }
    }

    /// Discard all per-frame pass textures. The renderer calls this at the
    /// end of every frame, and after abandoning a frame on error.
    pub fn reset(&mut self) {
        self.pass_textures.clear();
    }

    /// Execute the `count`-th pass firing on `params.stage`, if any.
    ///
    /// Returns an empty status once no pass is left at this stage for the
    /// current frame; `AGAIN` while more remain; `SAVE` when the renderer
    /// should capture the output and report it via [`UserShader::save`].
    pub fn hook(&mut self, params: HookParams<'_, G>) -> Result<HookStatus, HookError> {
        let HookParams {
            gpu,
            stage,
            count,
            tex,
            src_rect,
            dst_rect,
            sh,
        } = params;
        let stage_name = stage::name(stage);

        // Save the input texture if needed, but only once per hook
        if count == 0 && self.save_stages.intersects(stage) {
            trace!("Saving input texture '{}' for binding", stage_name);
            self.pass_textures.push(PassTex {
                name: Bytes::from_static(stage_name.as_bytes()),
                tex: tex.clone(),
            });
        }

        // Walk the passes to find the one to execute *and* the total number
        // firing on this stage, which decides the AGAIN status.
        let mut total_count = 0;
        let mut pass_idx = None;
        for (i, pass) in self.passes.iter().enumerate() {
            if pass.exec_stages.intersects(stage) {
                if total_count >= count && pass_idx.is_none() {
                    pass_idx = Some(i);
                }
                total_count += 1;
            }
        }

        // No more passes, hooray!
        let pass_idx = match pass_idx {
            Some(i) => i,
            None => return Ok(HookStatus::empty()),
        };
        let hook = &self.passes[pass_idx].hook;

        trace!(
            "Executing hook pass {}/{} on stage '{}': {}",
            count,
            total_count,
            stage_name,
            String::from_utf8_lossy(&hook.pass_desc)
        );

        let lookup = TexSizeLookup {
            gpu,
            hooked: &tex,
            src_rect,
            dst_rect,
            pass_textures: &self.pass_textures,
        };

        let mut status = HookStatus::empty();

        // Test for execution condition
        let run = hook.cond.eval(&lookup)?;
        if run != 0.0 {
            if hook.is_compute && !sh.try_compute(hook.block_w, hook.block_h) {
                error!("Failed dispatching COMPUTE shader");
                return Err(HookError::Compute);
            }

            let out_w = hook.width.eval(&lookup)?;
            let out_h = hook.height.eval(&lookup)?;
            if !sh.require_size(out_w, out_h) {
                error!(
                    "Incompatible shader size requirements? Perhaps you \
                     tried resizing a non-resizable pass"
                );
                return Err(HookError::OutputSize);
            }

            for texname in &hook.bind_tex {
                if &texname[..] == b"HOOKED" {
                    bind_hook_tex::<G>(sh, stage_name.as_bytes(), &tex)?;
                    for alias in &HOOKED_ALIASES {
                        sh.append_header(&format!(
                            "#define HOOKED_{} {}_{} \n",
                            alias, stage_name, alias
                        ));
                    }
                    continue;
                }

                if let Some(lut) = self.lut_textures.iter().find(|t| t.name == *texname) {
                    // Directly bind this, no need to bother with the whole
                    // macro preamble
                    let id = sh.bind_lut(&lut.tex).map_err(|_| {
                        let name = String::from_utf8_lossy(texname).to_string();
                        error!("Failed binding texture '{}'!", name);
                        HookError::Bind(name)
                    })?;
                    sh.append_header(&format!(
                        "#define {} {} \n",
                        String::from_utf8_lossy(texname),
                        id
                    ));
                    continue;
                }

                if let Some(ptex) = self.pass_textures.iter().find(|t| t.name == *texname) {
                    bind_hook_tex::<G>(sh, texname, &ptex.tex)?;
                }
            }

            // Set up the input variables
            self.frame_count += 1;
            let id = sh.var_int("frame", self.frame_count, true);
            sh.append_header(&format!("#define frame {} \n", id));

            let random = prng_step(&mut self.prng);
            let id = sh.var_float("random", random, true);
            sh.append_header(&format!("#define random {} \n", id));

            let id = sh.var_vec2(
                "input_size",
                [src_rect.w() as f64, src_rect.h() as f64],
                false,
            );
            sh.append_header(&format!("#define input_size {} \n", id));

            let id = sh.var_vec2(
                "target_size",
                [dst_rect.w() as f64, dst_rect.h() as f64],
                false,
            );
            sh.append_header(&format!("#define target_size {} \n", id));

            let id = sh.var_vec2(
                "tex_offset",
                [tex.src_rect.x0 as f64, tex.src_rect.y0 as f64],
                false,
            );
            sh.append_header(&format!("#define tex_offset {} \n", id));

            // Load the user shader itself
            sh.append_header(&String::from_utf8_lossy(&hook.pass_body));

            if hook.is_compute {
                sh.append_main("hook(); \n");
            } else {
                sh.append_main("vec4 color = hook(); \n");
            }

            if hook.save_tex.is_some() {
                status |= HookStatus::SAVE;
            }
        } else {
            trace!("Skipping hook due to condition");
        }

        if count + 1 < total_count {
            status |= HookStatus::AGAIN;
        }

        Ok(status)
    }

    /// Record a saved pass output under its `SAVE` name, making it
    /// available to later passes in the same frame.
    ///
    /// Locates the pass with the same selection rule as [`UserShader::hook`].
    pub fn save(&mut self, params: &SaveParams<G>) {
        let mut total_count = 0;
        let mut found = None;
        for pass in &self.passes {
            if pass.exec_stages.intersects(params.stage) {
                if total_count >= params.count {
                    found = Some(pass);
                    break;
                }
                total_count += 1;
            }
        }

        let name = match found.and_then(|pass| pass.hook.save_tex.clone()) {
            Some(name) => name,
            None => {
                error!("Save reported for a pass that requested none!");
                return;
            }
        };

        trace!(
            "Saving output texture '{}' from hook execution on '{}'",
            String::from_utf8_lossy(&name),
            stage::name(params.stage)
        );

        self.pass_textures.push(PassTex {
            name,
            tex: params.tex.clone(),
        });
    }
}
