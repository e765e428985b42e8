pub fn set_panic_hook() {
    // Print panics to the browser console instead of an opaque "unreachable"
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}
