//! Pass planning for one render of the effect chain
//!
//! A plan is resolved entirely on the CPU before any GPU work is recorded, so
//! a selection naming an unregistered kernel fails without touching the pool
//! or the display.

use crate::error::Result;
use crate::kernels::{IDENTITY_KERNEL, KernelRegistry};
use crate::selection::EffectSelection;
use crate::shader_pipeline::ConvolutionUniforms;
use crate::texture_pool::POOL_SIZE;

/// `flip_y` for passes rendering into the image-space pool
pub const OFFSCREEN_FLIP_Y: f32 = 1.0;

/// `flip_y` for the final pass onto the display surface
pub const DISPLAY_FLIP_Y: f32 = -1.0;

/// Texture a pass samples from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassSource {
    /// The texture holding the uploaded source frame
    Original,
    /// A member of the ping-pong pool
    Pool(usize),
}

/// Surface a pass renders into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    /// A member of the ping-pong pool
    Pool(usize),
    /// The visible display surface
    Display,
}

/// One draw of the convolution program
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPass {
    /// Kernel applied by this pass
    pub kernel_name: String,
    /// Texture sampled by this pass
    pub source: PassSource,
    /// Surface written by this pass
    pub target: PassTarget,
    /// Uniform values for this pass
    pub uniforms: ConvolutionUniforms,
}

impl PlannedPass {
    /// Size of the render target in pixels
    pub fn target_size(&self) -> (u32, u32) {
        (self.uniforms.resolution[0] as u32, self.uniforms.resolution[1] as u32)
    }
}

/// Ordered passes for one render: the enabled effects followed by the display pass
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    image_size: (u32, u32),
    display_size: (u32, u32),
    passes: Vec<PlannedPass>,
}

impl RenderPlan {
    /// Size of the source image and of every pool texture
    pub fn image_size(&self) -> (u32, u32) {
        self.image_size
    }

    /// Size of the display surface
    pub fn display_size(&self) -> (u32, u32) {
        self.display_size
    }

    /// All passes in execution order
    pub fn passes(&self) -> &[PlannedPass] {
        &self.passes
    }

    /// Number of offscreen effect passes
    pub fn effect_count(&self) -> usize {
        self.passes.len() - 1
    }

    /// The identity pass onto the display surface
    pub fn display_pass(&self) -> &PlannedPass {
        &self.passes[self.passes.len() - 1]
    }
}

/// Resolves the enabled effects into a sequence of passes
///
/// Effect `i` reads the original frame when `i == 0`, otherwise the pool
/// texture written by effect `i - 1`, and writes pool texture `i % 2`. The
/// final pass reads the last written texture (or the original when no effect
/// is enabled) and draws it onto the display with the identity kernel.
pub fn plan_passes(registry: &KernelRegistry, selection: &EffectSelection, image_size: (u32, u32), display_size: (u32, u32)) -> Result<RenderPlan> {
    let mut passes = Vec::with_capacity(selection.enabled_count() + 1);
    let mut source = PassSource::Original;

    for (index, kernel_name) in selection.enabled().enumerate() {
        let kernel = registry.lookup(kernel_name)?;
        let target = index % POOL_SIZE;

        passes.push(PlannedPass {
            kernel_name: kernel_name.to_string(),
            source,
            target: PassTarget::Pool(target),
            uniforms: ConvolutionUniforms::new(image_size, image_size, kernel.coefficients(), kernel.weight(), OFFSCREEN_FLIP_Y),
        });
        source = PassSource::Pool(target);
    }

    let identity = registry.lookup(IDENTITY_KERNEL)?;
    passes.push(PlannedPass {
        kernel_name: IDENTITY_KERNEL.to_string(),
        source,
        target: PassTarget::Display,
        uniforms: ConvolutionUniforms::new(display_size, image_size, identity.coefficients(), identity.weight(), DISPLAY_FLIP_Y),
    });

    Ok(RenderPlan {
        image_size,
        display_size,
        passes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::selection::EffectToggle;

    #[test]
    fn test_no_effects_draws_original_once() {
        let registry = KernelRegistry::with_builtins();
        let plan = plan_passes(&registry, &EffectSelection::default_menu(), (4, 3), (8, 6)).unwrap();

        assert_eq!(plan.passes().len(), 1);
        assert_eq!(plan.effect_count(), 0);

        let display = plan.display_pass();
        assert_eq!(display.source, PassSource::Original);
        assert_eq!(display.target, PassTarget::Display);
        assert_eq!(display.kernel_name, IDENTITY_KERNEL);
        assert_eq!(display.uniforms.flip_y, DISPLAY_FLIP_Y);
        assert_eq!(display.target_size(), (8, 6));
        assert_eq!(display.uniforms.texture_size, [4.0, 3.0]);
    }

    #[test]
    fn test_passes_alternate_pool_members() {
        let registry = KernelRegistry::with_builtins();
        let selection = EffectSelection::enabled_in_order(["sharpness", "unsharpen", "emboss"]);
        let plan = plan_passes(&registry, &selection, (5, 5), (5, 5)).unwrap();

        // N effects plus the display pass
        assert_eq!(plan.passes().len(), 4);

        let routing = plan.passes().iter().map(|pass| (pass.source, pass.target)).collect::<Vec<_>>();
        assert_eq!(
            routing,
            vec![
                (PassSource::Original, PassTarget::Pool(0)),
                (PassSource::Pool(0), PassTarget::Pool(1)),
                (PassSource::Pool(1), PassTarget::Pool(0)),
                (PassSource::Pool(0), PassTarget::Display),
            ]
        );

        for pass in &plan.passes()[..3] {
            assert_eq!(pass.uniforms.flip_y, OFFSCREEN_FLIP_Y);
            assert_eq!(pass.target_size(), (5, 5));
        }
    }

    #[test]
    fn test_pass_never_reads_its_own_target() {
        let registry = KernelRegistry::with_builtins();
        let selection = EffectSelection::enabled_in_order(["sharpness"; 7]);
        let plan = plan_passes(&registry, &selection, (2, 2), (2, 2)).unwrap();

        for pass in plan.passes() {
            if let (PassSource::Pool(read), PassTarget::Pool(write)) = (pass.source, pass.target) {
                assert_ne!(read, write);
            }
        }
    }

    #[test]
    fn test_effects_follow_list_order() {
        let registry = KernelRegistry::with_builtins();
        let mut selection = EffectSelection::default_menu();
        selection.set_enabled("emboss", true);
        selection.set_enabled("sharpness", true);

        let plan = plan_passes(&registry, &selection, (3, 3), (3, 3)).unwrap();
        let names = plan.passes().iter().map(|pass| pass.kernel_name.as_str()).collect::<Vec<_>>();

        assert_eq!(names, vec!["sharpness", "emboss", IDENTITY_KERNEL]);
    }

    #[test]
    fn test_uniforms_carry_kernel_and_weight() {
        let registry = KernelRegistry::with_builtins();
        let selection = EffectSelection::enabled_in_order(["unsharpen", "edgeDetect"]);
        let plan = plan_passes(&registry, &selection, (3, 3), (3, 3)).unwrap();

        let unsharpen = &plan.passes()[0].uniforms;
        assert_eq!(&unsharpen.coefficients(), registry.lookup("unsharpen").unwrap().coefficients());
        assert_eq!(unsharpen.kernel_weight, 1.0);

        // Zero-sum kernels are never divided by zero
        assert_eq!(plan.passes()[1].uniforms.kernel_weight, 1.0);
    }

    #[test]
    fn test_unknown_kernel_aborts_planning() {
        let registry = KernelRegistry::with_builtins();
        let selection = EffectSelection::new(vec![EffectToggle::new("sharpness", true), EffectToggle::new("blur", true)]);

        match plan_passes(&registry, &selection, (3, 3), (3, 3)) {
            Err(Error::UnknownKernel(name)) => assert_eq!(name, "blur"),
            other => panic!("expected UnknownKernel, got {other:?}"),
        }
    }

    #[test]
    fn test_disabled_unknown_kernel_is_ignored() {
        let registry = KernelRegistry::with_builtins();
        let selection = EffectSelection::new(vec![EffectToggle::new("blur", false)]);

        assert_eq!(plan_passes(&registry, &selection, (3, 3), (3, 3)).unwrap().effect_count(), 0);
    }

    #[test]
    fn test_missing_identity_kernel_is_reported() {
        let mut registry = KernelRegistry::new();
        registry.register("sharpness", [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0]);

        assert!(matches!(
            plan_passes(&registry, &EffectSelection::default_menu(), (3, 3), (3, 3)),
            Err(Error::UnknownKernel(name)) if name == IDENTITY_KERNEL
        ));
    }
}
