//! A no-op device and shader emitter for exercising the parser and
//! dispatcher without a GPU. Everything is recorded so tests can assert on
//! what the dispatcher asked for.
#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use usershader::{
    AddressMode, BindError, BoundTex, Fmt, FmtCaps, Gpu, HookParams, HookTex, Ident, Limits,
    Rect, SampleMode, ShaderBuilder, Stages, TexError, TexParams,
};

#[derive(Clone, Debug)]
pub struct MockTex(pub Rc<TexData>);

#[derive(Debug)]
pub struct TexData {
    pub w: u32,
    pub h: u32,
    pub d: u32,
    pub format: String,
    pub sample_mode: SampleMode,
    pub address_mode: AddressMode,
    pub data: Vec<u8>,
}

pub struct MockGpu {
    pub formats: Vec<Fmt>,
    pub limits: Limits,
    pub destroyed: Cell<usize>,
    pub fail_create: Cell<bool>,
}

fn fmt(name: &'static str, opaque: bool, caps: FmtCaps, texel_size: usize) -> Fmt {
    Fmt {
        name: name.into(),
        opaque,
        caps,
        texel_size,
    }
}

impl MockGpu {
    pub fn new() -> Self {
        MockGpu {
            formats: vec![
                fmt("rgba8", false, FmtCaps::SAMPLEABLE | FmtCaps::LINEAR, 4),
                fmt("rgba16hf", false, FmtCaps::SAMPLEABLE | FmtCaps::LINEAR, 8),
                fmt("r8", false, FmtCaps::SAMPLEABLE | FmtCaps::LINEAR, 1),
                fmt("rgba32i", false, FmtCaps::SAMPLEABLE, 16),
                fmt("opaque4", true, FmtCaps::SAMPLEABLE, 4),
            ],
            limits: Limits {
                max_tex_1d_dim: 4096,
                max_tex_2d_dim: 4096,
                max_tex_3d_dim: 512,
            },
            destroyed: Cell::new(0),
            fail_create: Cell::new(false),
        }
    }

    /// A bare texture handle, as the renderer would pass for the hooked
    /// image.
    pub fn tex(&self, w: u32, h: u32) -> MockTex {
        MockTex(Rc::new(TexData {
            w,
            h,
            d: 0,
            format: "rgba8".into(),
            sample_mode: SampleMode::Nearest,
            address_mode: AddressMode::Clamp,
            data: Vec::new(),
        }))
    }
}

impl Gpu for MockGpu {
    type Tex = MockTex;
    type Shader = MockShader;

    fn limits(&self) -> Limits {
        self.limits
    }

    fn formats(&self) -> &[Fmt] {
        &self.formats
    }

    fn tex_create(&self, params: &TexParams<'_>) -> Result<MockTex, TexError> {
        if self.fail_create.get() {
            return Err(TexError::Unsupported);
        }
        Ok(MockTex(Rc::new(TexData {
            w: params.w,
            h: params.h,
            d: params.d,
            format: params.format.name.to_string(),
            sample_mode: params.sample_mode,
            address_mode: params.address_mode,
            data: params.initial_data.to_vec(),
        })))
    }

    fn tex_size(&self, tex: &MockTex) -> (u32, u32) {
        (tex.0.w, tex.0.h)
    }

    fn tex_destroy(&self, _tex: MockTex) {
        self.destroyed.set(self.destroyed.get() + 1);
    }
}

#[derive(Default)]
pub struct MockShader {
    pub header: String,
    pub main: String,
    pub ints: Vec<(String, i32)>,
    pub floats: Vec<(String, f64)>,
    pub vec2s: Vec<(String, [f64; 2])>,
    pub bound: usize,
    pub luts: usize,
    pub compute: Option<(i32, i32)>,
    pub out_size: Option<(f32, f32)>,
    pub fail_bind: bool,
    pub fail_compute: bool,
    pub fail_size: bool,
    next_id: usize,
}

impl MockShader {
    pub fn new() -> Self {
        MockShader::default()
    }

    fn ident(&mut self, stem: &str) -> Ident {
        let id = self.next_id;
        self.next_id += 1;
        Ident(format!("_{}_{}", stem, id))
    }
}

impl ShaderBuilder for MockShader {
    type Tex = MockTex;

    fn append_header(&mut self, text: &str) {
        self.header.push_str(text);
    }

    fn append_main(&mut self, text: &str) {
        self.main.push_str(text);
    }

    fn bind_tex(
        &mut self,
        _name: &str,
        _tex: &MockTex,
        _rect: &Rect,
    ) -> Result<BoundTex, BindError> {
        if self.fail_bind {
            return Err(BindError);
        }
        self.bound += 1;
        Ok(BoundTex {
            raw: self.ident("raw"),
            pos: self.ident("pos"),
            size: self.ident("size"),
            pt: self.ident("pt"),
        })
    }

    fn bind_lut(&mut self, _tex: &MockTex) -> Result<Ident, BindError> {
        if self.fail_bind {
            return Err(BindError);
        }
        self.luts += 1;
        Ok(self.ident("lut"))
    }

    fn var_int(&mut self, name: &str, value: i32, _dynamic: bool) -> Ident {
        self.ints.push((name.to_string(), value));
        self.ident(name)
    }

    fn var_float(&mut self, name: &str, value: f64, _dynamic: bool) -> Ident {
        self.floats.push((name.to_string(), value));
        self.ident(name)
    }

    fn var_vec2(&mut self, name: &str, value: [f64; 2], _dynamic: bool) -> Ident {
        self.vec2s.push((name.to_string(), value));
        self.ident(name)
    }

    fn try_compute(&mut self, block_w: i32, block_h: i32) -> bool {
        if self.fail_compute {
            return false;
        }
        self.compute = Some((block_w, block_h));
        true
    }

    fn require_size(&mut self, width: f32, height: f32) -> bool {
        if self.fail_size {
            return false;
        }
        self.out_size = Some((width, height));
        true
    }
}

/// Invocation parameters with the conventional test geometry: a 64x32
/// hooked texture rectangle, a 1280x720 source and a 1920x1080 target.
pub fn params<'a>(
    gpu: &'a MockGpu,
    sh: &'a mut MockShader,
    tex: &MockTex,
    stage: Stages,
    count: usize,
) -> HookParams<'a, MockGpu> {
    HookParams {
        gpu,
        stage,
        count,
        tex: HookTex {
            tex: tex.clone(),
            src_rect: Rect::sized(64.0, 32.0),
            mul: 1.0,
        },
        src_rect: Rect::sized(1280.0, 720.0),
        dst_rect: Rect::sized(1920.0, 1080.0),
        sh,
    }
}
