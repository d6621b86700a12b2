//! Document-level parsing against the mock device.

mod common;

use bytes::Bytes;

use common::MockGpu;
use usershader::parse::parse_document;
use usershader::{ParseError, Stages, UserShader};

fn parse_doc(
    gpu: &MockGpu,
    doc: &str,
) -> Result<(Vec<usershader::Hook>, Vec<usershader::ShaderTex<MockGpu>>), ParseError> {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut hooks = Vec::new();
    let mut texs = Vec::new();
    parse_document(
        gpu,
        Bytes::copy_from_slice(doc.as_bytes()),
        |hook| {
            hooks.push(hook);
            true
        },
        |tex| {
            texs.push(tex);
            true
        },
    )?;
    Ok((hooks, texs))
}

const SIMPLE_HOOK: &str = "//!HOOK RGB\n\
                           //!BIND HOOKED\n\
                           //!DESC test\n\
                           void hook() {}\n";

#[test]
fn single_hook_document() {
    let gpu = MockGpu::new();
    let (hooks, texs) = parse_doc(&gpu, SIMPLE_HOOK).unwrap();

    assert_eq!(hooks.len(), 1);
    assert!(texs.is_empty());
    assert_eq!(hooks[0].hook_tex.as_slice(), &[&b"RGB"[..]]);
    assert_eq!(hooks[0].bind_tex.as_slice(), &[&b"HOOKED"[..]]);
    assert_eq!(hooks[0].pass_desc, &b"test"[..]);
    assert_eq!(hooks[0].pass_body, &b"void hook() {}\n"[..]);
}

#[test]
fn single_hook_stages() {
    let gpu = MockGpu::new();
    let shader = UserShader::parse(&gpu, SIMPLE_HOOK).unwrap();

    // Fires on RGB input, and wants to be invoked there anyway to capture
    // the hooked input for binding.
    assert_eq!(shader.stages(), Stages::RGB_INPUT);
}

#[test]
fn leading_garbage_is_skipped() {
    let gpu = MockGpu::new();
    let doc = format!("// vim: set ft=glsl\n\nsome prose\n{}", SIMPLE_HOOK);
    let (hooks, _) = parse_doc(&gpu, &doc).unwrap();
    assert_eq!(hooks.len(), 1);
}

#[test]
fn document_without_headers() {
    let gpu = MockGpu::new();
    assert_eq!(
        parse_doc(&gpu, "void main() {}\n").unwrap_err(),
        ParseError::NoHeaders
    );
    assert_eq!(parse_doc(&gpu, "").unwrap_err(), ParseError::NoHeaders);
}

#[test]
fn parsing_does_not_mutate_input() {
    let gpu = MockGpu::new();
    let doc = String::from(SIMPLE_HOOK);
    let copy = doc.clone();
    let _ = parse_doc(&gpu, &doc).unwrap();
    assert_eq!(doc, copy);
}

#[test]
fn multiple_sections_in_order() {
    let gpu = MockGpu::new();
    let doc = "//!TEXTURE weights\n\
               //!SIZE 2\n\
               //!FORMAT r8\n\
               0011\n\
               //!HOOK LUMA\n\
               //!BIND weights\n\
               first\n\
               //!HOOK CHROMA\n\
               second\n";
    let (hooks, texs) = parse_doc(&gpu, doc).unwrap();

    assert_eq!(texs.len(), 1);
    assert_eq!(texs[0].name, &b"weights"[..]);
    assert_eq!(hooks.len(), 2);
    assert_eq!(hooks[0].pass_body, &b"first\n"[..]);
    assert_eq!(hooks[1].pass_body, &b"second\n"[..]);
}

#[test]
fn rejecting_callback_aborts() {
    let gpu = MockGpu::new();
    let err = parse_document(
        &gpu,
        Bytes::copy_from_slice(SIMPLE_HOOK.as_bytes()),
        |_| false,
        |_| true,
    )
    .unwrap_err();
    assert_eq!(err, ParseError::Rejected);
}

mod texture_sections {
    use super::*;

    fn tex_doc(size: &str, format: &str, filter: &str, hex: &str) -> String {
        format!(
            "//!TEXTURE mylut\n//!SIZE {}\n//!FORMAT {}\n//!FILTER {}\n//!BORDER CLAMP\n{}\n",
            size, format, filter, hex
        )
    }

    #[test]
    fn texture_with_payload() {
        let gpu = MockGpu::new();
        let doc = tex_doc("2 2", "rgba8", "NEAREST", &"ab".repeat(16));
        let (_, texs) = parse_doc(&gpu, &doc).unwrap();

        assert_eq!(texs.len(), 1);
        assert_eq!(texs[0].name, &b"mylut"[..]);
        let data = &texs[0].tex.0;
        assert_eq!((data.w, data.h, data.d), (2, 2, 0));
        assert_eq!(data.format, "rgba8");
        assert_eq!(data.data, [0xab; 16]);
    }

    #[test]
    fn payload_length_must_match() {
        let gpu = MockGpu::new();
        // 2x2 rgba8 needs exactly 16 bytes
        let short = tex_doc("2 2", "rgba8", "NEAREST", &"ab".repeat(15));
        assert_eq!(
            parse_doc(&gpu, &short).unwrap_err(),
            ParseError::TexSizeMismatch {
                got: 15,
                expected: 16
            }
        );

        let long = tex_doc("2 2", "rgba8", "NEAREST", &"ab".repeat(17));
        assert_eq!(
            parse_doc(&gpu, &long).unwrap_err(),
            ParseError::TexSizeMismatch {
                got: 17,
                expected: 16
            }
        );
    }

    #[test]
    fn default_size_and_modes() {
        let gpu = MockGpu::new();
        let doc = "//!TEXTURE mylut\n//!FORMAT r8\nff\n";
        let (_, texs) = parse_doc(&gpu, doc).unwrap();

        // SIZE defaults to a single 1x1 texel, NEAREST and CLAMP
        let data = &texs[0].tex.0;
        assert_eq!((data.w, data.h, data.d), (1, 1, 0));
        assert_eq!(data.sample_mode, usershader::SampleMode::Nearest);
        assert_eq!(data.address_mode, usershader::AddressMode::Clamp);
    }

    #[test]
    fn three_dimensional_sizes() {
        let gpu = MockGpu::new();
        let doc = tex_doc("2 2 2", "r8", "NEAREST", &"00".repeat(8));
        let (_, texs) = parse_doc(&gpu, &doc).unwrap();
        let data = &texs[0].tex.0;
        assert_eq!((data.w, data.h, data.d), (2, 2, 2));
    }

    #[test]
    fn size_out_of_limits() {
        let gpu = MockGpu::new();
        let doc = tex_doc("5000 2", "r8", "NEAREST", "00");
        assert_eq!(
            parse_doc(&gpu, &doc).unwrap_err(),
            ParseError::SizeLimit {
                value: 5000,
                limit: 4096
            }
        );

        let doc = tex_doc("0", "r8", "NEAREST", "00");
        assert!(matches!(
            parse_doc(&gpu, &doc).unwrap_err(),
            ParseError::SizeLimit { value: 0, .. }
        ));
    }

    #[test]
    fn format_is_mandatory() {
        let gpu = MockGpu::new();
        let doc = "//!TEXTURE mylut\n//!SIZE 1\nff\n";
        assert_eq!(parse_doc(&gpu, doc).unwrap_err(), ParseError::MissingFormat);
    }

    #[test]
    fn unknown_and_opaque_formats() {
        let gpu = MockGpu::new();
        let doc = tex_doc("1", "nonesuch", "NEAREST", "ff");
        assert!(matches!(
            parse_doc(&gpu, &doc).unwrap_err(),
            ParseError::UnknownFormat(_)
        ));

        let doc = tex_doc("1", "opaque4", "NEAREST", "ffffffff");
        assert!(matches!(
            parse_doc(&gpu, &doc).unwrap_err(),
            ParseError::UnknownFormat(_)
        ));
    }

    #[test]
    fn linear_filter_needs_linear_cap() {
        let gpu = MockGpu::new();
        let doc = tex_doc("1", "rgba32i", "LINEAR", &"00".repeat(16));
        assert_eq!(
            parse_doc(&gpu, &doc).unwrap_err(),
            ParseError::NotLinearFilterable
        );

        // NEAREST is fine on the same format
        let doc = tex_doc("1", "rgba32i", "NEAREST", &"00".repeat(16));
        assert!(parse_doc(&gpu, &doc).is_ok());
    }

    #[test]
    fn payload_must_be_hex() {
        let gpu = MockGpu::new();
        let doc = tex_doc("1", "r8", "NEAREST", "zz");
        assert_eq!(parse_doc(&gpu, &doc).unwrap_err(), ParseError::BadHex);
    }

    #[test]
    fn device_refusal_is_propagated() {
        let gpu = MockGpu::new();
        gpu.fail_create.set(true);
        let doc = tex_doc("1", "r8", "NEAREST", "ff");
        assert!(matches!(
            parse_doc(&gpu, &doc).unwrap_err(),
            ParseError::TexCreate(_)
        ));
    }

    #[test]
    fn parse_failure_releases_created_textures() {
        let gpu = MockGpu::new();
        let doc = "//!TEXTURE good\n\
                   //!FORMAT r8\n\
                   ff\n\
                   //!TEXTURE bad\n\
                   //!FORMAT nonesuch\n\
                   ff\n";
        assert!(UserShader::parse(&gpu, doc).is_err());
        assert_eq!(gpu.destroyed.get(), 1);
    }
}
