//! Browser player: an HTML video element as a frame source for the effect chain
//!
//! Frames are captured by drawing the video onto a hidden 2D canvas and reading
//! its pixels back, then rendered onto the visible canvas through wgpu.

use convolution_wgpu::{Display, EffectSelection, FillRect, Frame, GpuContext, ImageSource, RenderConfig, RenderLoop, TickOutcome, VideoSource, create_instance};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlVideoElement};

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// A `<video>` element sampled through a 2D canvas
pub struct WebVideo {
    element: HtmlVideoElement,
    scratch: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
}

impl WebVideo {
    /// Wraps `element` and creates the hidden capture canvas
    pub fn new(document: &Document, element: HtmlVideoElement) -> Result<Self, JsValue> {
        let scratch = document.create_element("canvas")?.dyn_into::<HtmlCanvasElement>()?;
        let context = scratch
            .get_context("2d")?
            .ok_or("2D canvas context unavailable")?
            .dyn_into::<CanvasRenderingContext2d>()?;

        Ok(Self { element, scratch, context })
    }

    /// The wrapped element
    pub fn element(&self) -> &HtmlVideoElement {
        &self.element
    }

    /// Size latched when playback starts
    ///
    /// This is the element's layout size; the intrinsic size is used when the
    /// element has no `width`/`height` attributes.
    pub fn display_size(&self) -> (u32, u32) {
        match (self.element.width(), self.element.height()) {
            (0, _) | (_, 0) => self.natural_size(),
            size => size,
        }
    }

    fn composite(&self, canvas: &mut image::RgbaImage, rect: FillRect) -> Result<(), JsValue> {
        let (width, height) = canvas.dimensions();

        // Resizing clears the scratch canvas, so only do it when the latched size changed
        if self.scratch.width() != width || self.scratch.height() != height {
            self.scratch.set_width(width);
            self.scratch.set_height(height);
        }

        self.context.draw_image_with_html_video_element_and_dw_and_dh(
            &self.element,
            rect.x as f64,
            rect.y as f64,
            rect.width as f64,
            rect.height as f64,
        )?;

        let pixels = self.context.get_image_data(0.0, 0.0, width as f64, height as f64)?.data();
        if pixels.len() != canvas.len() {
            return Err(format!("expected {} bytes of image data, got {}", canvas.len(), pixels.len()).into());
        }
        canvas.copy_from_slice(&pixels);

        Ok(())
    }
}

impl VideoSource for WebVideo {
    fn is_paused(&self) -> bool {
        self.element.paused()
    }

    fn is_ended(&self) -> bool {
        self.element.ended()
    }

    fn natural_size(&self) -> (u32, u32) {
        (self.element.video_width(), self.element.video_height())
    }

    fn current_frame(&self) -> Option<&image::RgbaImage> {
        // Decoded frames stay inside the browser; see `draw_into`
        None
    }

    fn draw_into(&mut self, canvas: &mut image::RgbaImage, rect: FillRect) {
        if let Err(e) = self.composite(canvas, rect) {
            tracing::warn!("Failed to capture video frame: {e:?}");
        }
    }
}

/// Visible canvas, video and renderer for the page
pub struct WebPlayer {
    canvas: HtmlCanvasElement,
    video: WebVideo,
    renderer: RenderLoop,
    selection: EffectSelection,
    frame_requested: bool,
}

impl WebPlayer {
    /// Creates a surface on `canvas` and prepares the renderer
    pub async fn new(canvas: HtmlCanvasElement, video: WebVideo) -> Result<Self, JsValue> {
        let config = RenderConfig::default();

        let instance = create_instance();
        let surface = instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone())).map_err(to_js)?;
        let context = GpuContext::new(instance, config.power_preference, Some(&surface)).await.map_err(to_js)?;
        let display = Display::from_surface(&context, surface, canvas.width(), canvas.height()).map_err(to_js)?;
        let renderer = RenderLoop::new(context, display, config).await.map_err(to_js)?;

        tracing::info!("Renderer ready on a {}x{} canvas", canvas.width(), canvas.height());

        Ok(Self {
            canvas,
            video,
            renderer,
            selection: EffectSelection::default_menu(),
            frame_requested: false,
        })
    }

    /// Current effect selection
    pub fn selection(&self) -> &EffectSelection {
        &self.selection
    }

    /// Points the video element at `url`; playback starts from its controls
    pub fn load_video(&mut self, url: &str) {
        self.video.element().set_src(url);
        tracing::info!("Loaded video {url}");
    }

    /// Decodes an image file and shows it with the current selection
    pub fn load_image(&mut self, bytes: &[u8]) -> Result<(), JsValue> {
        let image = image::load_from_memory(bytes).map_err(to_js)?.to_rgba8();
        let source = ImageSource::new(Frame::from_image(image).map_err(to_js)?);

        // A still image replaces whatever the video was showing
        self.video.element().pause()?;

        let (width, height) = source.frame().size();
        self.canvas.set_width(width);
        self.canvas.set_height(height);

        let stats = self.renderer.show_image(&source, &self.selection).map_err(to_js)?;
        tracing::info!("Showing {width}x{height} image with {} effect passes", stats.effect_passes);

        Ok(())
    }

    /// Enables or disables an effect and redraws the frame on screen
    pub fn set_effect(&mut self, name: &str, enabled: bool) {
        if !self.selection.set_enabled(name, enabled) {
            tracing::warn!("Effect {name} is not in the menu");
            return;
        }

        if let Err(e) = self.renderer.on_selection_changed(&self.selection) {
            tracing::warn!("Failed to apply effects: {e}");
        }
    }

    /// Latches the capture size when the video starts playing
    pub fn on_play(&mut self) {
        let (width, height) = self.video.display_size();
        self.canvas.set_width(width);
        self.canvas.set_height(height);
        self.renderer.on_play(width, height);

        tracing::info!("Playing at {width}x{height}");
    }

    /// Marks a frame as requested; `false` if one is already pending
    pub fn request_frame(&mut self) -> bool {
        !std::mem::replace(&mut self.frame_requested, true)
    }

    /// Renders the current video frame; returns whether to request another
    pub fn tick(&mut self) -> bool {
        self.frame_requested = false;

        match self.renderer.tick(&mut self.video, &self.selection) {
            Ok(TickOutcome::Continue) => true,
            Ok(TickOutcome::Stopped) => false,
            Err(e) => {
                tracing::warn!("Skipped frame: {e}");
                !self.video.is_paused() && !self.video.is_ended()
            }
        }
    }
}
