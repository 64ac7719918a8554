use leptos::ev;
use leptos::html::Div;
use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::api;
use crate::markdown;
use crate::models::{ChatMessage, Role};
use crate::session::Phase;
use crate::state::AppState;

/// Main chat area with message history and input.
#[component]
pub fn ChatArea() -> impl IntoView {
    let state = expect_context::<AppState>();
    let container = NodeRef::<Div>::new();

    // Keep the newest text in view while the reply grows.
    Effect::new(move |_| {
        state.session.track();
        if let Some(el) = container.get() {
            el.set_scroll_top(el.scroll_height());
        }
    });

    view! {
        <main class="chat-area">
            <div class="chat-header">"Chat"</div>

            <div class="messages-container" node_ref=container>
                {move || {
                    state.session.with(|session| {
                        if session.messages().is_empty() {
                            return view! {
                                <div class="empty-state">"How can I help you today?"</div>
                            }
                                .into_any();
                        }
                        let waiting = session.phase() == Phase::AwaitingFirstByte;
                        let idle = session.can_submit();
                        let last = session.messages().len() - 1;
                        session
                            .messages()
                            .iter()
                            .enumerate()
                            .map(|(index, msg)| {
                                let pending = waiting && index == last;
                                let copyable = idle && msg.role == Role::Assistant;
                                view! { <MessageBubble message=msg.clone() pending=pending copyable=copyable /> }
                            })
                            .collect_view()
                            .into_any()
                    })
                }}
            </div>

            <ChatInput />
        </main>
    }
}

/// A single chat message bubble. A pending placeholder shows a typing indicator.
#[component]
fn MessageBubble(message: ChatMessage, pending: bool, copyable: bool) -> impl IntoView {
    let css_class = match message.role {
        Role::User => "message user",
        Role::Assistant => "message assistant",
    };

    view! {
        <div class=css_class>
            <div class="role-label">{message.role.as_str()}</div>
            {if pending {
                view! {
                    <div class="typing-indicator">
                        <span></span>
                        <span></span>
                        <span></span>
                    </div>
                }
                    .into_any()
            } else {
                view! { <div class="message-content" inner_html=markdown::render(&message.content)></div> }
                    .into_any()
            }}
            {copyable.then(|| view! { <CopyButton text=message.content.clone() /> })}
        </div>
    }
}

/// Copies a reply to the clipboard and briefly confirms it.
#[component]
fn CopyButton(text: String) -> impl IntoView {
    let (copied, set_copied) = signal(false);

    let on_click = move |_| {
        let text = text.clone();
        spawn_local(async move {
            match api::copy_to_clipboard(&text).await {
                Ok(()) => {
                    set_copied.set(true);
                    gloo_timers::callback::Timeout::new(2_000, move || set_copied.set(false)).forget();
                }
                Err(e) => log::error!("Failed to copy: {e}"),
            }
        });
    };

    view! {
        <button class="copy-btn" title="Copy response" on:click=on_click>
            {move || if copied.get() { "Copied" } else { "Copy" }}
        </button>
    }
}

/// Chat input form with textarea and send button.
#[component]
fn ChatInput() -> impl IntoView {
    let state = expect_context::<AppState>();
    let (input, set_input) = signal(String::new());

    let is_sending = move || state.session.with(|s| !s.can_submit());

    let send = move || {
        let text = input.get();
        if text.trim().is_empty() || is_sending() {
            return;
        }
        set_input.set(String::new());
        state.send_message(text);
    };

    let on_keydown = move |ev: ev::KeyboardEvent| {
        if ev.key() == "Enter" && !ev.shift_key() {
            ev.prevent_default();
            send();
        }
    };

    let on_submit = move |_| {
        send();
    };

    view! {
        <div class="input-area">
            <div class="input-row">
                <textarea
                    rows="1"
                    placeholder="Type a message… (Enter to send, Shift+Enter for newline)"
                    prop:value=input
                    on:input=move |ev| {
                        set_input.set(event_target_value(&ev));
                    }
                    on:keydown=on_keydown
                    disabled=is_sending
                />
                <button
                    class="send-btn"
                    on:click=on_submit
                    disabled=move || is_sending() || input.get().trim().is_empty()
                >
                    {move || if is_sending() { "Sending…" } else { "Send" }}
                </button>
            </div>
        </div>
    }
}
