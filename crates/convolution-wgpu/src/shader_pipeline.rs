//! The convolution program and its fixed binding contract
//!
//! One vertex/fragment program is compiled at startup and reused for every
//! pass. Only the uniform values change between passes; the bindings and
//! vertex attributes stay the same.
//!
//! Bindings (group 0):
//! - 0: source texture (`texture_2d<f32>`)
//! - 1: nearest, clamp-to-edge sampler
//! - 2: [`ConvolutionUniforms`]
//!
//! Vertex attributes: location 0 is the position in pixels, location 1 the
//! texture coordinate.

use crate::error::{Error, Result};
use crate::texture_pool::POOL_FORMAT;
use std::collections::BTreeSet;
use std::num::NonZeroU64;

/// Vertex stage of the built-in program, validated and minified at build time
pub const VERTEX_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/convolution.vert.wgsl"));

/// Fragment stage of the built-in program, validated and minified at build time
pub const FRAGMENT_SHADER: &str = include_str!(concat!(env!("OUT_DIR"), "/convolution.frag.wgsl"));

/// Entry point of the vertex stage
pub const VERTEX_ENTRY_POINT: &str = "vs_main";

/// Entry point of the fragment stage
pub const FRAGMENT_ENTRY_POINT: &str = "fs_main";

/// Vertices in the full-surface rectangle (two triangles)
pub const RECTANGLE_VERTEX_COUNT: u32 = 6;

/// Texture coordinates matching [`rectangle`] vertex for vertex
pub const RECTANGLE_TEXCOORDS: [[f32; 2]; 6] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];

const UNIFORM_GROUP: u32 = 0;
const TEXTURE_BINDING: u32 = 0;
const SAMPLER_BINDING: u32 = 1;
const UNIFORM_BINDING: u32 = 2;
const POSITION_LOCATION: u32 = 0;
const TEXCOORD_LOCATION: u32 = 1;

/// Uniform block shared by both shader stages
///
/// Kernel rows are padded to `vec4` to satisfy uniform array stride rules.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Zeroable, bytemuck::Pod)]
#[repr(C)]
pub struct ConvolutionUniforms {
    /// Size of the render target in pixels
    pub resolution: [f32; 2],
    /// Size of the sampled texture in pixels
    pub texture_size: [f32; 2],
    /// Row-major kernel, one padded row per element
    pub kernel: [[f32; 4]; 3],
    /// Normalization divisor, strictly positive
    pub kernel_weight: f32,
    /// +1 for image-space targets, -1 for the display surface
    pub flip_y: f32,
    /// Keeps the block a multiple of 16 bytes
    pub padding: [f32; 2],
}

impl ConvolutionUniforms {
    /// Size of the uniform block in bytes
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Builds the uniform block for one pass
    pub fn new(resolution: (u32, u32), texture_size: (u32, u32), kernel: &[f32; 9], kernel_weight: f32, flip_y: f32) -> Self {
        Self {
            resolution: [resolution.0 as f32, resolution.1 as f32],
            texture_size: [texture_size.0 as f32, texture_size.1 as f32],
            kernel: [
                [kernel[0], kernel[1], kernel[2], 0.0],
                [kernel[3], kernel[4], kernel[5], 0.0],
                [kernel[6], kernel[7], kernel[8], 0.0],
            ],
            kernel_weight,
            flip_y,
            padding: [0.0; 2],
        }
    }

    /// Returns the kernel coefficients without row padding
    pub fn coefficients(&self) -> [f32; 9] {
        let [a, b, c] = self.kernel;
        [a[0], a[1], a[2], b[0], b[1], b[2], c[0], c[1], c[2]]
    }
}

/// Returns the two triangles covering a rectangle given in pixels
pub fn rectangle(x: f32, y: f32, width: f32, height: f32) -> [[f32; 2]; 6] {
    let (x1, x2) = (x, x + width);
    let (y1, y2) = (y, y + height);
    [[x1, y1], [x2, y1], [x1, y2], [x1, y2], [x2, y1], [x2, y2]]
}

/// WGSL sources of a vertex and a fragment stage
#[derive(Debug, Clone, Copy)]
pub struct ShaderSources<'a> {
    /// Vertex stage source
    pub vertex: &'a str,
    /// Fragment stage source
    pub fragment: &'a str,
}

impl ShaderSources<'static> {
    /// Sources of the built-in convolution program
    pub const BUILTIN: Self = Self {
        vertex: VERTEX_SHADER,
        fragment: FRAGMENT_SHADER,
    };
}

/// Parses and validates one stage
fn compile_stage(stage: &str, source: &str) -> Result<naga::Module> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| Error::ShaderCompileFailure(format!("{stage} stage: {}", e.emit_to_string(source))))?;

    let mut validator = naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::empty());
    validator
        .validate(&module)
        .map_err(|e| Error::ShaderCompileFailure(format!("{stage} stage: {}", e.as_inner())))?;

    Ok(module)
}

/// Finds the entry point of `stage` named `name`
fn find_entry_point<'m>(module: &'m naga::Module, stage: naga::ShaderStage, name: &str) -> Result<&'m naga::EntryPoint> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage && ep.name == name)
        .ok_or_else(|| Error::ProgramLinkFailure(format!("missing {stage:?} entry point `{name}`")))
}

/// Collects user-defined locations of a value, looking through structs
fn collect_locations(module: &naga::Module, ty: naga::Handle<naga::Type>, binding: Option<&naga::Binding>, locations: &mut BTreeSet<u32>) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            locations.insert(*location);
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), locations);
                }
            }
        }
    }
}

/// Locations consumed by an entry point's arguments
fn input_locations(module: &naga::Module, entry_point: &naga::EntryPoint) -> BTreeSet<u32> {
    let mut locations = BTreeSet::new();
    for argument in &entry_point.function.arguments {
        collect_locations(module, argument.ty, argument.binding.as_ref(), &mut locations);
    }
    locations
}

/// Locations produced by an entry point's result
fn output_locations(module: &naga::Module, entry_point: &naga::EntryPoint) -> BTreeSet<u32> {
    let mut locations = BTreeSet::new();
    if let Some(result) = &entry_point.function.result {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut locations);
    }
    locations
}

/// Checks that a stage declares the shared uniform block with the host layout
fn check_uniform_block(stage: &str, module: &naga::Module) -> Result<()> {
    let block = module
        .global_variables
        .iter()
        .map(|(_, global)| global)
        .find(|global| {
            global.space == naga::AddressSpace::Uniform
                && global
                    .binding
                    .as_ref()
                    .is_some_and(|binding| binding.group == UNIFORM_GROUP && binding.binding == UNIFORM_BINDING)
        })
        .ok_or_else(|| Error::ProgramLinkFailure(format!("{stage} stage does not declare the uniform block at @binding({UNIFORM_BINDING})")))?;

    let size = module.types[block.ty].inner.size(module.to_ctx()) as u64;
    if size != ConvolutionUniforms::SIZE {
        return Err(Error::ProgramLinkFailure(format!(
            "{stage} stage uniform block is {size} bytes, expected {}",
            ConvolutionUniforms::SIZE
        )));
    }

    Ok(())
}

/// Compiles both stages and checks that they link into a program matching the contract
///
/// Parse and validation errors are reported as [`Error::ShaderCompileFailure`];
/// interface mismatches as [`Error::ProgramLinkFailure`].
pub fn validate_program(sources: &ShaderSources<'_>) -> Result<()> {
    let vertex = compile_stage("vertex", sources.vertex)?;
    let fragment = compile_stage("fragment", sources.fragment)?;

    let vertex_entry = find_entry_point(&vertex, naga::ShaderStage::Vertex, VERTEX_ENTRY_POINT)?;
    let fragment_entry = find_entry_point(&fragment, naga::ShaderStage::Fragment, FRAGMENT_ENTRY_POINT)?;

    let attributes = input_locations(&vertex, vertex_entry);
    let expected_attributes = BTreeSet::from([POSITION_LOCATION, TEXCOORD_LOCATION]);
    if attributes != expected_attributes {
        return Err(Error::ProgramLinkFailure(format!("vertex attributes at locations {attributes:?}, expected {expected_attributes:?}")));
    }

    let varyings = output_locations(&vertex, vertex_entry);
    let consumed = input_locations(&fragment, fragment_entry);
    if let Some(missing) = consumed.difference(&varyings).next() {
        return Err(Error::ProgramLinkFailure(format!("fragment input @location({missing}) is not written by the vertex stage")));
    }

    check_uniform_block("vertex", &vertex)?;
    check_uniform_block("fragment", &fragment)?;

    Ok(())
}

/// Compiled convolution program with one render pipeline per target format
#[derive(Debug)]
pub struct ShaderPipeline {
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    offscreen_pipeline: wgpu::RenderPipeline,
    display_pipeline: wgpu::RenderPipeline,
    display_format: wgpu::TextureFormat,
}

impl ShaderPipeline {
    /// Compiles the built-in program for a display of the given format
    pub async fn builtin(device: &wgpu::Device, display_format: wgpu::TextureFormat) -> Result<Self> {
        Self::compile(device, &ShaderSources::BUILTIN, display_format).await
    }

    /// Compiles a program from WGSL sources
    ///
    /// On failure the pipeline is unusable and nothing may be rendered with it.
    pub async fn compile(device: &wgpu::Device, sources: &ShaderSources<'_>, display_format: wgpu::TextureFormat) -> Result<Self> {
        validate_program(sources)?;

        // Anything wgpu rejects past naga's checks is a link-time mismatch
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Convolution vertex stage"),
            source: wgpu::ShaderSource::Wgsl(sources.vertex.into()),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Convolution fragment stage"),
            source: wgpu::ShaderSource::Wgsl(sources.fragment.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Convolution bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: TEXTURE_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: SAMPLER_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: UNIFORM_BINDING,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(ConvolutionUniforms::SIZE),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Convolution pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // Nearest filtering keeps every tap on an exact texel
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Convolution sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 0.0,
            compare: None,
            anisotropy_clamp: 1,
            border_color: None,
        });

        let create_pipeline = |label: &str, format: wgpu::TextureFormat| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex_module,
                    entry_point: Some(VERTEX_ENTRY_POINT),
                    compilation_options: Default::default(),
                    buffers: &[POSITION_LAYOUT, TEXCOORD_LAYOUT],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_module,
                    entry_point: Some(FRAGMENT_ENTRY_POINT),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    // flip_y reverses the winding of the final pass
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview: None,
                cache: None,
            })
        };

        let offscreen_pipeline = create_pipeline("Convolution offscreen pipeline", POOL_FORMAT);
        let display_pipeline = create_pipeline("Convolution display pipeline", display_format);

        if let Some(error) = device.pop_error_scope().await {
            return Err(Error::ProgramLinkFailure(error.to_string()));
        }

        tracing::debug!("Compiled convolution program (display format {display_format:?})");

        Ok(Self {
            bind_group_layout,
            sampler,
            offscreen_pipeline,
            display_pipeline,
            display_format,
        })
    }

    /// Render pipeline for image-space pool targets
    pub fn offscreen_pipeline(&self) -> &wgpu::RenderPipeline {
        &self.offscreen_pipeline
    }

    /// Render pipeline for the display surface
    pub fn display_pipeline(&self) -> &wgpu::RenderPipeline {
        &self.display_pipeline
    }

    /// Format the display pipeline renders to
    pub fn display_format(&self) -> wgpu::TextureFormat {
        self.display_format
    }

    /// Binds a source texture and one uniform slot for a single pass
    pub fn create_bind_group(&self, device: &wgpu::Device, label: &str, source: &wgpu::TextureView, uniforms: &wgpu::Buffer, offset: wgpu::BufferAddress) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: TEXTURE_BINDING,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: UNIFORM_BINDING,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: uniforms,
                        offset,
                        size: NonZeroU64::new(ConvolutionUniforms::SIZE),
                    }),
                },
            ],
        })
    }
}

/// Position attribute: one `vec2<f32>` in pixels per vertex
const POSITION_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![0 => Float32x2],
};

/// Texture coordinate attribute: one `vec2<f32>` per vertex
const TEXCOORD_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![1 => Float32x2],
};

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX_SOURCE: &str = include_str!("../shaders/convolution.vert.wgsl");
    const FRAGMENT_SOURCE: &str = include_str!("../shaders/convolution.frag.wgsl");

    fn sources<'a>(vertex: &'a str, fragment: &'a str) -> ShaderSources<'a> {
        ShaderSources { vertex, fragment }
    }

    #[test]
    fn test_uniform_block_is_80_bytes() {
        assert_eq!(ConvolutionUniforms::SIZE, 80);
    }

    #[test]
    fn test_builtin_program_links() {
        validate_program(&ShaderSources::BUILTIN).unwrap();
        validate_program(&sources(VERTEX_SOURCE, FRAGMENT_SOURCE)).unwrap();
    }

    #[test]
    fn test_syntax_error_is_compile_failure() {
        let broken = FRAGMENT_SOURCE.replace("let one_pixel", "let one_pixel one_pixel");

        match validate_program(&sources(VERTEX_SOURCE, &broken)) {
            Err(Error::ShaderCompileFailure(message)) => assert!(message.starts_with("fragment stage")),
            other => panic!("expected ShaderCompileFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_type_error_is_compile_failure() {
        let broken = VERTEX_SOURCE.replace("out.texcoord = texcoord;", "out.texcoord = 1.0;");

        assert!(matches!(validate_program(&sources(&broken, FRAGMENT_SOURCE)), Err(Error::ShaderCompileFailure(_))));
    }

    #[test]
    fn test_missing_entry_point_is_link_failure() {
        let renamed = FRAGMENT_SOURCE.replace("fn fs_main", "fn fragment_main");

        assert!(matches!(validate_program(&sources(VERTEX_SOURCE, &renamed)), Err(Error::ProgramLinkFailure(_))));
    }

    #[test]
    fn test_unwritten_varying_is_link_failure() {
        let mismatched = FRAGMENT_SOURCE.replace("@location(0) texcoord", "@location(3) texcoord");

        assert!(matches!(validate_program(&sources(VERTEX_SOURCE, &mismatched)), Err(Error::ProgramLinkFailure(_))));
    }

    #[test]
    fn test_attribute_contract_is_enforced() {
        let moved = VERTEX_SOURCE.replace("@location(1) texcoord: vec2<f32>)", "@location(2) texcoord: vec2<f32>)");

        assert!(matches!(validate_program(&sources(&moved, FRAGMENT_SOURCE)), Err(Error::ProgramLinkFailure(_))));
    }

    #[test]
    fn test_uniform_layout_mismatch_is_link_failure() {
        let grown = FRAGMENT_SOURCE.replace("    padding: vec2<f32>,\n", "    padding: vec2<f32>,\n    extra: vec4<f32>,\n");
        assert_ne!(grown, FRAGMENT_SOURCE);

        assert!(matches!(validate_program(&sources(VERTEX_SOURCE, &grown)), Err(Error::ProgramLinkFailure(_))));
    }

    #[test]
    fn test_rectangle_covers_two_triangles() {
        let vertices = rectangle(0.0, 0.0, 4.0, 3.0);

        assert_eq!(vertices.len(), RECTANGLE_VERTEX_COUNT as usize);
        assert_eq!(vertices, [[0.0, 0.0], [4.0, 0.0], [0.0, 3.0], [0.0, 3.0], [4.0, 0.0], [4.0, 3.0]]);

        // Texture coordinates follow the same corner order
        for (position, texcoord) in vertices.iter().zip(RECTANGLE_TEXCOORDS) {
            assert_eq!([position[0] / 4.0, position[1] / 3.0], texcoord);
        }
    }

    #[test]
    fn test_uniform_kernel_round_trips_through_padding() {
        let kernel = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let uniforms = ConvolutionUniforms::new((4, 3), (4, 3), &kernel, 45.0, -1.0);

        assert_eq!(uniforms.coefficients(), kernel);
        assert_eq!(uniforms.kernel[1], [4.0, 5.0, 6.0, 0.0]);
        assert_eq!(uniforms.resolution, [4.0, 3.0]);
        assert_eq!(uniforms.flip_y, -1.0);
    }
}
