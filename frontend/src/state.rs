use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::api;
use crate::session::ChatSession;

/// Shared application state, provided via Leptos context.
#[derive(Clone, Copy)]
pub struct AppState {
    pub session: ReadSignal<ChatSession>,
    pub set_session: WriteSignal<ChatSession>,
}

impl AppState {
    /// Create a new `AppState` and provide it in the current Leptos context.
    pub fn provide() -> Self {
        let (session, set_session) = signal(ChatSession::default());
        let state = Self { session, set_session };
        provide_context(state);
        state
    }

    /// Submit `text` and stream the reply into the session.
    pub fn send_message(&self, text: String) {
        let mut outgoing = None;
        self.set_session.update(|s| outgoing = s.submit(&text));
        let Some(message) = outgoing else {
            return;
        };

        let set_session = self.set_session;
        spawn_local(async move {
            let result = api::stream_chat(&message, |bytes| {
                set_session.update(|s| s.receive(bytes));
            })
            .await;

            match result {
                Ok(()) => set_session.update(ChatSession::finish),
                Err(e) => {
                    log::error!("Error streaming response: {e}");
                    set_session.update(ChatSession::fail);
                }
            }
        });
    }
}
