//! Build script for convolution-wgpu crate
//!
//! Validates the WGSL stages of the convolution program and embeds minified
//! copies of them in the build output directory, so a broken shader fails the
//! build instead of the first render.

use std::path::PathBuf;

/// Shader stages compiled into the crate, as (source file, output file)
const SHADER_STAGES: &[(&str, &str)] = &[("shaders/convolution.vert.wgsl", "convolution.vert.wgsl"), ("shaders/convolution.frag.wgsl", "convolution.frag.wgsl")];

/// Minifies WGSL shader source code to reduce binary size
///
/// Uses naga to parse, validate, and regenerate the WGSL code in a more compact form.
/// Entry point names are preserved by the minifier.
fn minify_wgsl(path: &str, shader: &str) -> String {
    let mut module = match naga::front::wgsl::parse_str(shader) {
        Ok(module) => module,
        Err(e) => panic!("Failed to parse {path}:\n{}", e.emit_to_string(shader)),
    };

    wgsl_minifier::minify_module(&mut module);

    let mut validator = naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all());
    let info = match validator.validate(&module) {
        Ok(info) => info,
        Err(e) => panic!("Failed to validate {path}:\n{}", e.as_inner()),
    };
    let output = naga::back::wgsl::write_string(&module, &info, naga::back::wgsl::WriterFlags::empty()).unwrap();

    wgsl_minifier::minify_wgsl_source(&output)
}

/// Writes the minified shader stages into OUT_DIR
fn write_shaders() {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR not set"));

    for (source_path, output_name) in SHADER_STAGES {
        println!("cargo:rerun-if-changed={source_path}");

        let source = std::fs::read_to_string(manifest_dir.join(source_path)).unwrap_or_else(|e| panic!("Failed to read {source_path}: {e}"));
        let minified = minify_wgsl(source_path, &source);
        std::fs::write(out_dir.join(output_name), minified).unwrap_or_else(|e| panic!("Failed to write {output_name}: {e}"));
    }
}

/// Build script main function
///
/// Sets up conditional compilation flags and embeds the shader stages.
fn main() {
    // Configure conditional compilation aliases for platform-specific backends
    cfg_aliases::cfg_aliases! {
        // Browser builds render through WebGL2 or WebGPU
        web: { target_arch = "wasm32" },
    }

    write_shaders();
}
