//! Headless GPU runner for the effect chain
//!
//! Renders through the same [`RenderLoop`] the applications use, onto an
//! offscreen display, and reads the displayed pixels back.

use crate::wgpu_helpers::read_texture_rgba8;
use convolution_wgpu::{Display, EffectSelection, Frame, GpuContext, ImageSource, RenderConfig, RenderLoop, RenderStats};

/// Renders images headlessly and returns what the display shows
#[derive(Debug)]
pub struct GpuEngine {
    renderer: RenderLoop,
}

impl GpuEngine {
    /// Creates an engine on the default adapter
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let config = RenderConfig::default();
        let context = GpuContext::headless(config.power_preference).await?;
        let display = Display::offscreen(&context.device, 1, 1);
        let renderer = RenderLoop::new(context, display, config).await?;

        Ok(Self { renderer })
    }

    /// The wrapped render loop
    pub fn renderer(&mut self) -> &mut RenderLoop {
        &mut self.renderer
    }

    /// Renders `image` through the selection and returns the stats
    pub fn render(&mut self, image: &image::RgbaImage, selection: &EffectSelection) -> Result<RenderStats, Box<dyn std::error::Error>> {
        let source = ImageSource::new(Frame::from_image(image.clone())?);
        Ok(self.renderer.show_image(&source, selection)?)
    }

    /// Reads back what the display currently shows
    pub fn displayed(&self) -> Result<image::RgbaImage, Box<dyn std::error::Error>> {
        let texture = self.renderer.display().texture().ok_or("display is not offscreen")?;
        let context = self.renderer.context();
        Ok(read_texture_rgba8(&context.device, &context.queue, texture)?)
    }

    /// Renders `image` and reads the result back
    pub fn run(&mut self, image: &image::RgbaImage, selection: &EffectSelection) -> Result<image::RgbaImage, Box<dyn std::error::Error>> {
        self.render(image, selection)?;
        self.displayed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{CompareResult, compare_images};
    use crate::reference_engine::ReferenceEngine;
    use convolution_wgpu::{Error, FillRect, ShaderPipeline, ShaderSources, TickOutcome, VideoSource, selection::DEFAULT_MENU};

    // These tests need a graphics adapter, so they are opt-in:
    // cargo test -p convolution-wgpu-verification -- --ignored
    fn engine() -> GpuEngine {
        pollster::block_on(GpuEngine::new()).unwrap_or_else(|e| panic!("no usable GPU adapter: {e}"))
    }

    fn noise(width: u32, height: u32) -> image::RgbaImage {
        image::RgbaImage::from_fn(width, height, |x, y| {
            let v = (x * 73 + y * 151) ^ (x * y * 29);
            image::Rgba([v as u8, (v >> 2) as u8, (v * 7) as u8, 255])
        })
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_no_effects_shows_source() {
        let mut engine = engine();
        let input = noise(17, 9);

        let output = engine.run(&input, &EffectSelection::default_menu()).unwrap();

        assert_eq!(compare_images(&input, &output, 0), CompareResult::Match);
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_every_kernel_matches_reference() {
        let mut engine = engine();
        let reference = ReferenceEngine::default();
        let input = noise(13, 11);

        for name in DEFAULT_MENU {
            let selection = EffectSelection::enabled_in_order([*name]);
            let expected = reference.run(&input, &selection).unwrap();
            let actual = engine.run(&input, &selection).unwrap();

            let result = compare_images(&expected, &actual, 1);
            assert!(result.is_match(), "{name}: {result:?}");
        }
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_chain_order_is_list_order() {
        let mut engine = engine();
        let reference = ReferenceEngine::default();
        let input = noise(8, 8);

        let forward_selection = EffectSelection::enabled_in_order(["edgeDetect", "emboss"]);
        let backward_selection = EffectSelection::enabled_in_order(["emboss", "edgeDetect"]);

        let forward = engine.run(&input, &forward_selection).unwrap();
        let backward = engine.run(&input, &backward_selection).unwrap();

        assert_ne!(forward, backward);
        assert!(compare_images(&reference.run(&input, &forward_selection).unwrap(), &forward, 1).is_match());
        assert!(compare_images(&reference.run(&input, &backward_selection).unwrap(), &backward, 1).is_match());
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_long_chain_reuses_pool() {
        let mut engine = engine();
        let reference = ReferenceEngine::default();
        let input = noise(10, 10);
        let selection = EffectSelection::enabled_in_order(["sharpness", "unsharpen", "sharpness", "emboss", "sharpness"]);

        let stats = engine.render(&input, &selection).unwrap();
        assert_eq!(stats.effect_passes, 5);
        assert_eq!(engine.renderer().executor().pool().map(|pool| pool.size()), Some((10, 10)));

        // Tolerance grows with chain length as rounding differences propagate
        let result = compare_images(&reference.run(&input, &selection).unwrap(), &engine.displayed().unwrap(), 8);
        assert!(result.is_match(), "{result:?}");
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_unknown_kernel_keeps_previous_frame() {
        let mut engine = engine();
        let input = noise(6, 6);

        let before = engine.run(&input, &EffectSelection::enabled_in_order(["emboss"])).unwrap();
        let error = engine.render(&input, &EffectSelection::enabled_in_order(["sharpness", "blur"])).unwrap_err();

        assert!(matches!(error.downcast_ref::<Error>(), Some(Error::UnknownKernel(name)) if name == "blur"));
        assert_eq!(engine.displayed().unwrap(), before);
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_selection_change_rerenders_still_image() {
        let mut engine = engine();
        let input = noise(7, 5);
        let reference = ReferenceEngine::default();

        engine.render(&input, &EffectSelection::default_menu()).unwrap();

        let mut selection = EffectSelection::default_menu();
        selection.set_enabled("sharpness", true);
        let stats = engine.renderer().on_selection_changed(&selection).unwrap();

        assert_eq!(stats.map(|stats| stats.effect_passes), Some(1));
        assert!(compare_images(&reference.run(&input, &selection).unwrap(), &engine.displayed().unwrap(), 1).is_match());
    }

    /// Video that shows one solid color per frame, advancing on every draw
    struct ColorCycle {
        colors: Vec<[u8; 4]>,
        index: usize,
        frame: image::RgbaImage,
        paused: bool,
        draws: usize,
    }

    impl ColorCycle {
        fn new(colors: Vec<[u8; 4]>) -> Self {
            let frame = image::RgbaImage::from_pixel(4, 4, image::Rgba(colors[0]));
            Self {
                colors,
                index: 0,
                frame,
                paused: false,
                draws: 0,
            }
        }
    }

    impl VideoSource for ColorCycle {
        fn is_paused(&self) -> bool {
            self.paused
        }

        fn is_ended(&self) -> bool {
            self.index >= self.colors.len()
        }

        fn natural_size(&self) -> (u32, u32) {
            self.frame.dimensions()
        }

        fn current_frame(&self) -> Option<&image::RgbaImage> {
            Some(&self.frame)
        }

        fn draw_into(&mut self, canvas: &mut image::RgbaImage, _rect: FillRect) {
            let color = self.colors[self.index];
            for pixel in canvas.pixels_mut() {
                *pixel = image::Rgba(color);
            }
            self.index += 1;
            self.draws += 1;
        }
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_video_ticks_until_paused_or_ended() {
        let mut engine = engine();
        let mut video = ColorCycle::new(vec![[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]]);
        let selection = EffectSelection::default_menu();

        // Nothing is captured before playback starts
        assert_eq!(engine.renderer().tick(&mut video, &selection).unwrap(), TickOutcome::Stopped);
        assert_eq!(video.draws, 0);

        engine.renderer().on_play(3, 2);
        assert_eq!(engine.renderer().tick(&mut video, &selection).unwrap(), TickOutcome::Continue);

        let shown = engine.displayed().unwrap();
        assert_eq!(shown.dimensions(), (3, 2));
        assert!(shown.pixels().all(|pixel| pixel.0 == [255, 0, 0, 255]));

        video.paused = true;
        assert_eq!(engine.renderer().tick(&mut video, &selection).unwrap(), TickOutcome::Stopped);
        assert_eq!(video.draws, 1);

        video.paused = false;
        assert_eq!(engine.renderer().tick(&mut video, &selection).unwrap(), TickOutcome::Continue);
        assert_eq!(engine.renderer().tick(&mut video, &selection).unwrap(), TickOutcome::Continue);
        assert!(engine.displayed().unwrap().pixels().all(|pixel| pixel.0 == [0, 0, 255, 255]));

        // The last frame was drawn, so playback has ended
        assert_eq!(engine.renderer().tick(&mut video, &selection).unwrap(), TickOutcome::Stopped);
        assert_eq!(video.draws, 3);
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_selection_change_redraws_paused_video() {
        let mut engine = engine();
        let mut video = ColorCycle::new(vec![[200, 40, 90, 255], [10, 250, 30, 255]]);

        engine.renderer().on_play(4, 4);
        assert_eq!(engine.renderer().tick(&mut video, &EffectSelection::default_menu()).unwrap(), TickOutcome::Continue);
        let before = engine.displayed().unwrap();
        assert!(before.pixels().all(|pixel| pixel.0 == [200, 40, 90, 255]));

        video.paused = true;
        let selection = EffectSelection::enabled_in_order(["edgeDetect"]);
        let stats = engine.renderer().on_selection_changed(&selection).unwrap();

        // The paused frame is redrawn without capturing a new one
        assert_eq!(stats.map(|stats| stats.effect_passes), Some(1));
        assert_eq!(video.draws, 1);
        let after = engine.displayed().unwrap();
        assert_ne!(after, before);
        assert!(after.pixels().all(|pixel| pixel.0 == [0, 0, 0, 255]));
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_broken_shader_fails_to_compile() {
        let mut engine = engine();
        let device = &engine.renderer().context().device;
        let sources = ShaderSources {
            vertex: "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }",
            fragment: "this is not wgsl",
        };

        let result = pollster::block_on(ShaderPipeline::compile(device, &sources, wgpu::TextureFormat::Rgba8Unorm));

        assert!(matches!(result, Err(Error::ShaderCompileFailure(_))));
    }
}
