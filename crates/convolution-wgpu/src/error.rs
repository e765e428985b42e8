//! Error types for the convolution pipeline
//!
//! Construction failures (`ContextUnavailable`, `ShaderCompileFailure`,
//! `ProgramLinkFailure`) leave the pipeline unusable. Every other variant only
//! aborts the render in progress; the previously presented frame stays visible.

/// Errors raised while building or driving the convolution pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No GPU adapter or device could be obtained
    #[error("GPU rendering context is unavailable: {0}")]
    ContextUnavailable(String),

    /// A shader stage failed to parse or validate
    #[error("shader failed to compile: {0}")]
    ShaderCompileFailure(String),

    /// The shader stages do not form a program matching the pipeline contract
    #[error("shader program failed to link: {0}")]
    ProgramLinkFailure(String),

    /// An effect referenced a kernel name that is not registered
    #[error("unknown kernel `{0}`")]
    UnknownKernel(String),

    /// A frame's pixel buffer does not describe a `width` x `height` RGBA8 image
    #[error("invalid frame: {width}x{height} needs {expected} bytes, got {actual}")]
    InvalidFrame {
        /// Frame width in pixels
        width: u32,
        /// Frame height in pixels
        height: u32,
        /// Expected buffer length in bytes
        expected: usize,
        /// Actual buffer length in bytes
        actual: usize,
    },

    /// The display surface could not provide a texture for this render
    #[error("display surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
