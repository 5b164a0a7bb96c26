use leptos::mount::mount_to_body;
use leptos::prelude::*;
use pikchr_fiddle::app::{App, Fiddle};
use pikchr_fiddle::config::FiddleConfig;

fn main() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();

    let config = FiddleConfig::from_window();
    let fiddle = match Fiddle::start(config) {
        Ok(fiddle) => fiddle,
        Err(err) => {
            tracing::error!(error = %err, "pikchr fiddle failed to start");
            return;
        }
    };
    mount_to_body(move || view! { <App fiddle=fiddle /> });
}
