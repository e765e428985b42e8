//! Named 3x3 convolution kernels
//!
//! The registry holds every kernel an effect can refer to by name, along with
//! the normalization weight derived from its coefficients.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Name of the identity kernel used by the final blit pass
pub const IDENTITY_KERNEL: &str = "normal";

/// Built-in kernel catalog as (name, row-major coefficients)
///
/// The first row weights the neighbours above the output pixel.
pub const BUILTIN_KERNELS: &[(&str, [f32; 9])] = &[
    (IDENTITY_KERNEL, [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]),
    ("unsharpen", [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0]),
    ("sharpness", [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0]),
    ("edgeDetect", [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0]),
    ("sobelHorizontal", [1.0, 2.0, 1.0, 0.0, 0.0, 0.0, -1.0, -2.0, -1.0]),
    ("previtHorizontal", [1.0, 1.0, 1.0, 0.0, 0.0, 0.0, -1.0, -1.0, -1.0]),
    ("emboss", [-2.0, -1.0, 0.0, -1.0, 1.0, 1.0, 0.0, 1.0, 2.0]),
];

/// An immutable 3x3 kernel with its normalization weight
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    name: String,
    coefficients: [f32; 9],
    weight: f32,
}

impl Kernel {
    /// Creates a kernel, deriving its weight from the coefficients
    pub fn new(name: impl Into<String>, coefficients: [f32; 9]) -> Self {
        let name = name.into();
        let sum = coefficients.iter().sum::<f32>();
        let weight = compute_kernel_weight(&coefficients);
        if weight != sum {
            tracing::debug!("Kernel `{name}` sums to {sum}, clamping its weight to {weight}");
        }

        Self { name, coefficients, weight }
    }

    /// Returns the kernel name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the row-major coefficients
    pub fn coefficients(&self) -> &[f32; 9] {
        &self.coefficients
    }

    /// Returns the normalization weight, always strictly positive
    pub fn weight(&self) -> f32 {
        self.weight
    }
}

/// Computes the normalization weight of a kernel
///
/// The weight is the coefficient sum, or 1 when the sum is zero, negative or NaN.
pub fn compute_kernel_weight(coefficients: &[f32; 9]) -> f32 {
    let sum = coefficients.iter().sum::<f32>();
    if sum > 0.0 { sum } else { 1.0 }
}

/// Registry of named kernels
#[derive(Debug, Clone, Default)]
pub struct KernelRegistry {
    kernels: HashMap<String, Kernel>,
}

impl KernelRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in kernel catalog
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, coefficients) in BUILTIN_KERNELS {
            registry.register(*name, *coefficients);
        }
        registry
    }

    /// Registers a kernel, replacing any kernel already stored under `name`
    pub fn register(&mut self, name: impl Into<String>, coefficients: [f32; 9]) {
        let kernel = Kernel::new(name, coefficients);
        self.kernels.insert(kernel.name.clone(), kernel);
    }

    /// Looks up a kernel by name
    pub fn lookup(&self, name: &str) -> Result<&Kernel> {
        self.kernels.get(name).ok_or_else(|| Error::UnknownKernel(name.to_string()))
    }

    /// Returns the normalization weight of a registered kernel
    pub fn weight_of(&self, name: &str) -> Result<f32> {
        self.lookup(name).map(Kernel::weight)
    }

    /// Returns whether a kernel is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    /// Returns the number of registered kernels
    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    /// Returns whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_matches_positive_sum() {
        let registry = KernelRegistry::with_builtins();

        for (name, coefficients) in BUILTIN_KERNELS {
            let sum = coefficients.iter().sum::<f32>();
            let expected = if sum > 0.0 { sum } else { 1.0 };
            assert_eq!(registry.weight_of(name).unwrap(), expected, "weight of {name}");
        }
    }

    #[test]
    fn test_zero_sum_kernel_weight_is_one() {
        let registry = KernelRegistry::with_builtins();

        // edgeDetect and the gradient kernels sum to zero
        assert_eq!(registry.weight_of("edgeDetect").unwrap(), 1.0);
        assert_eq!(registry.weight_of("sobelHorizontal").unwrap(), 1.0);
        assert_eq!(registry.weight_of("previtHorizontal").unwrap(), 1.0);
    }

    #[test]
    fn test_negative_sum_kernel_weight_is_one() {
        let mut registry = KernelRegistry::new();
        registry.register("darken", [0.0, 0.0, 0.0, 0.0, -3.0, 0.0, 0.0, 0.0, 0.0]);

        assert_eq!(registry.weight_of("darken").unwrap(), 1.0);
    }

    #[test]
    fn test_positive_sum_kernel_weight_is_sum() {
        let mut registry = KernelRegistry::new();
        registry.register("box", [1.0; 9]);

        assert_eq!(registry.weight_of("box").unwrap(), 9.0);
    }

    #[test]
    fn test_nan_sum_kernel_weight_is_one() {
        let mut coefficients = [0.0; 9];
        coefficients[4] = f32::NAN;

        assert_eq!(compute_kernel_weight(&coefficients), 1.0);

        let mut registry = KernelRegistry::new();
        registry.register("broken", coefficients);
        assert_eq!(registry.weight_of("broken").unwrap(), 1.0);
    }

    #[test]
    fn test_fractional_sum_is_kept() {
        let mut registry = KernelRegistry::new();
        registry.register("dim", [0.0, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.0]);

        // Only non-positive sums are clamped
        assert_eq!(registry.weight_of("dim").unwrap(), 0.5);
    }

    #[test]
    fn test_register_overwrites_existing_name() {
        let mut registry = KernelRegistry::with_builtins();
        let count = registry.len();

        registry.register("emboss", [1.0; 9]);

        assert_eq!(registry.len(), count);
        assert_eq!(registry.lookup("emboss").unwrap().coefficients(), &[1.0; 9]);
        assert_eq!(registry.weight_of("emboss").unwrap(), 9.0);
    }

    #[test]
    fn test_lookup_unknown_kernel_fails() {
        let registry = KernelRegistry::with_builtins();

        match registry.lookup("blur") {
            Err(Error::UnknownKernel(name)) => assert_eq!(name, "blur"),
            other => panic!("expected UnknownKernel, got {other:?}"),
        }
        assert!(registry.weight_of("blur").is_err());
    }

    #[test]
    fn test_identity_kernel_is_registered() {
        let registry = KernelRegistry::with_builtins();
        let identity = registry.lookup(IDENTITY_KERNEL).unwrap();

        assert_eq!(identity.coefficients()[4], 1.0);
        assert_eq!(identity.coefficients().iter().filter(|&&c| c != 0.0).count(), 1);
        assert_eq!(identity.weight(), 1.0);
    }
}
