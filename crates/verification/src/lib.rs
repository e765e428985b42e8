//! Verification utilities for convolution-wgpu
//!
//! This crate checks the GPU effect chain against a CPU reference
//! implementation of the same convolutions.

pub mod compare;
pub mod gpu_engine;
pub mod reference_engine;
mod wgpu_helpers;

pub use wgpu_helpers::{ReadbackError, read_texture_rgba8};
