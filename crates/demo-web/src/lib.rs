//! Web-based convolution filter player
//!
//! Plays a video (or shows an image) in the browser and runs every frame
//! through the effects ticked in the menu, rendering with WebGPU or WebGL2.

use convolution_wgpu::selection::DEFAULT_MENU;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{Document, Element, HtmlCanvasElement, HtmlElement, HtmlInputElement, HtmlVideoElement};

mod player;
mod utils;

use player::{WebPlayer, WebVideo};
use utils::set_panic_hook;

const INITIAL_WIDTH: u32 = 640;
const INITIAL_HEIGHT: u32 = 360;

/// `requestAnimationFrame` callback shared by every playback session
type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

/// Entry point for the web application
#[wasm_bindgen(start)]
pub fn run() {
    set_panic_hook();
    tracing_wasm::set_as_global_default();

    tracing::info!("Starting convolution-wgpu...");

    spawn_local(async {
        if let Err(e) = run_app().await {
            tracing::error!("App error: {e:?}");
        }
    });
}

/// Main application initialization
async fn run_app() -> Result<(), JsValue> {
    let web_window = web_sys::window().ok_or("No window found")?;
    let document = web_window.document().ok_or("No document found")?;

    let video = document.create_element("video")?.dyn_into::<HtmlVideoElement>()?;
    video.set_width(INITIAL_WIDTH);
    video.set_height(INITIAL_HEIGHT);
    video.set_controls(true);
    video.set_muted(true);
    video.set_cross_origin(Some("anonymous"));

    let canvas = document.create_element("canvas")?.dyn_into::<HtmlCanvasElement>()?;
    canvas.set_width(INITIAL_WIDTH);
    canvas.set_height(INITIAL_HEIGHT);

    let stage = get_or_create_container(&document, "stage")?;
    stage.set_inner_html("");
    stage.append_child(&video)?;
    stage.append_child(&canvas)?;

    let web_video = WebVideo::new(&document, video.clone())?;
    let player = Rc::new(RefCell::new(WebPlayer::new(canvas, web_video).await?));

    setup_file_input(&document, player.clone())?;
    setup_effects_menu(&document, player.clone())?;

    // Ticking starts on every `play` and stops by itself once paused or ended
    let frame_callback = create_render_loop(player.clone());
    let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
        player.borrow_mut().on_play();
        request_frame(&frame_callback, &player);
    }) as Box<dyn FnMut(_)>);
    video.add_event_listener_with_callback("play", closure.as_ref().unchecked_ref())?;
    closure.forget();

    Ok(())
}

/// Sets up the file input accepting videos and still images
fn setup_file_input(document: &Document, player: Rc<RefCell<WebPlayer>>) -> Result<(), JsValue> {
    let input = document.create_element("input")?.dyn_into::<HtmlInputElement>()?;
    input.set_type("file");
    input.set_accept("video/*,image/png,image/jpeg,image/webp");
    input.set_id("file-input");

    let label = document.create_element("label")?;
    label.set_text_content(Some("Choose a video or image: "));
    label.set_attribute("for", "file-input")?;

    let controls = get_or_create_container(document, "controls")?;
    controls.set_inner_html("");
    controls.append_child(&label)?;
    controls.append_child(&input)?;

    let input_clone = input.clone();
    let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
        let Some(file) = input_clone.files().and_then(|files| files.get(0)) else {
            return;
        };

        if file.type_().starts_with("image/") {
            let player = player.clone();
            spawn_local(async move {
                let result = async {
                    let buffer = JsFuture::from(file.array_buffer()).await?;
                    let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
                    player.borrow_mut().load_image(&bytes)
                };
                if let Err(e) = result.await {
                    tracing::error!("Failed to show image: {e:?}");
                }
            });
        } else {
            match web_sys::Url::create_object_url_with_blob(&file) {
                Ok(url) => player.borrow_mut().load_video(&url),
                Err(e) => tracing::error!("Failed to open video: {e:?}"),
            }
        }
    }) as Box<dyn FnMut(_)>);

    input.set_onchange(Some(closure.as_ref().unchecked_ref()));
    closure.forget();

    Ok(())
}

/// Builds one checkbox row per menu effect
fn setup_effects_menu(document: &Document, player: Rc<RefCell<WebPlayer>>) -> Result<(), JsValue> {
    let menu = get_or_create_container(document, "effectsMenu")?;
    menu.set_inner_html("");

    let table = document.create_element("table")?;
    let body = document.create_element("tbody")?;
    table.append_child(&body)?;

    for &name in DEFAULT_MENU {
        let checkbox = document.create_element("input")?.dyn_into::<HtmlInputElement>()?;
        checkbox.set_type("checkbox");
        checkbox.set_id(name);
        checkbox.set_checked(player.borrow().selection().rows().iter().any(|row| row.kernel_name == name && row.enabled));

        let label = document.create_element("label")?;
        label.set_text_content(Some(name));
        label.set_attribute("for", name)?;

        let row = document.create_element("tr")?;
        let checkbox_cell = document.create_element("td")?;
        checkbox_cell.append_child(&checkbox)?;
        let label_cell = document.create_element("td")?;
        label_cell.append_child(&label)?;
        row.append_child(&checkbox_cell)?;
        row.append_child(&label_cell)?;
        body.append_child(&row)?;

        let player_clone = player.clone();
        let checkbox_clone = checkbox.clone();
        let closure = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            player_clone.borrow_mut().set_effect(name, checkbox_clone.checked());
        }) as Box<dyn FnMut(_)>);

        checkbox.set_onchange(Some(closure.as_ref().unchecked_ref()));
        closure.forget();
    }

    menu.append_child(&table)?;

    Ok(())
}

/// Gets or creates a container element with `id`
fn get_or_create_container(document: &Document, id: &str) -> Result<Element, JsValue> {
    if let Some(container) = document.get_element_by_id(id) {
        return Ok(container);
    }

    let container = document.create_element("div")?;
    container.set_id(id);
    container.dyn_ref::<HtmlElement>().ok_or("div is not an HtmlElement")?.style().set_property("margin", "20px")?;
    document.body().ok_or("No body found")?.append_child(&container)?;

    Ok(container)
}

/// Creates the callback that ticks the player once per display refresh
fn create_render_loop(player: Rc<RefCell<WebPlayer>>) -> FrameCallback {
    let callback: FrameCallback = Rc::new(RefCell::new(None));
    let next = callback.clone();

    *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        let keep_going = player.borrow_mut().tick();
        if keep_going {
            request_frame(&next, &player);
        }
    }) as Box<dyn FnMut()>));

    callback
}

/// Requests the next animation frame unless one is already pending
fn request_frame(callback: &FrameCallback, player: &Rc<RefCell<WebPlayer>>) {
    if !player.borrow_mut().request_frame() {
        return;
    }

    let Some(web_window) = web_sys::window() else {
        return;
    };

    if let Some(callback) = callback.borrow().as_ref() {
        if let Err(e) = web_window.request_animation_frame(callback.as_ref().unchecked_ref()) {
            tracing::error!("Failed to request animation frame: {e:?}");
        }
    }
}
