use gloo_net::http::Request;
use js_sys::{Reflect, Uint8Array};
use leptos::prelude::window;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::ReadableStreamDefaultReader;

use crate::models::ChatRequest;

/// Base URL of the backend API server. Empty means same origin.
const API_BASE: &str = match option_env!("CHAT_API_BASE") {
    Some(base) => base,
    None => "",
};

/// Posts `message` to the relay and hands every body chunk to `on_chunk` as it
/// arrives. Resolves once the body has been read to the end.
pub async fn stream_chat(message: &str, mut on_chunk: impl FnMut(&[u8])) -> Result<(), String> {
    let body = ChatRequest { message: message.to_string() };

    let resp = Request::post(&format!("{API_BASE}/api/chat"))
        .json(&body)
        .map_err(|e| format!("Serialize error: {e}"))?
        .send()
        .await
        .map_err(|e| format!("Network error: {e}"))?;

    if !resp.ok() {
        return Err(format!("Server error: {}", resp.status()));
    }

    let Some(stream) = resp.body() else {
        return Ok(());
    };
    let reader: ReadableStreamDefaultReader = stream.get_reader().unchecked_into();

    loop {
        let result = JsFuture::from(reader.read())
            .await
            .map_err(|e| format!("Stream error: {e:?}"))?;

        let done = Reflect::get(&result, &JsValue::from_str("done"))
            .map_err(|e| format!("Stream error: {e:?}"))?
            .as_bool()
            .unwrap_or(true);
        if done {
            return Ok(());
        }

        let value = Reflect::get(&result, &JsValue::from_str("value"))
            .map_err(|e| format!("Stream error: {e:?}"))?;
        on_chunk(&Uint8Array::new(&value).to_vec());
    }
}

/// Writes `text` to the system clipboard.
pub async fn copy_to_clipboard(text: &str) -> Result<(), String> {
    let promise = window().navigator().clipboard().write_text(text);
    JsFuture::from(promise)
        .await
        .map(|_| ())
        .map_err(|e| format!("Clipboard error: {e:?}"))
}
