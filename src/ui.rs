use crate::config::Config;
use crate::events::{self, NotifyLevel, UiEvent};
use crate::settings::{ConfigUpdate, StreamingChoice};
use crate::theme::{Presentation, display_name};
use crate::types::{ChatMessage, Role};
use crate::{ServiceClient, Session};
use dioxus::events::Key;
use dioxus::prelude::*;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const TOAST_HIDE_DELAY: Duration = Duration::from_secs(3);

type ClientSession = Arc<Session<ServiceClient>>;

fn cache_buster() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

#[component]
pub fn App() -> Element {
    let mut messages = use_signal(Vec::<ChatMessage>::new);
    let mut busy = use_signal(|| false);
    let mut presentation = use_signal(|| Presentation::from_config(&Config::default()));
    let mut stylesheet_version = use_signal(cache_buster);
    let mut toast = use_signal(|| Option::<(NotifyLevel, String)>::None);

    let session = use_hook(|| {
        let (tx, mut rx) = events::channel();
        let session: ClientSession = Arc::new(Session::new(Arc::new(ServiceClient::from_env()), tx));

        let conversation = session.conversation.clone();
        spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    UiEvent::Render { busy: is_busy } => {
                        messages.set(conversation.messages());
                        busy.set(is_busy);
                    }
                    UiEvent::MessageUpdated { index, content } => messages.with_mut(|msgs| {
                        if let Some(msg) = msgs.get_mut(index) {
                            msg.content = content;
                        }
                    }),
                    UiEvent::ConfigReloaded { config } => {
                        presentation.set(Presentation::from_config(&config));
                        stylesheet_version.set(cache_buster());
                    }
                    UiEvent::Notify { level, text } => {
                        toast.set(Some((level, text)));
                        spawn(async move {
                            tokio::time::sleep(TOAST_HIDE_DELAY).await;
                            toast.set(None);
                        });
                    }
                }
            }
        });

        let starting = Arc::clone(&session);
        spawn(async move { starting.start().await });
        session
    });

    use_drop({
        let session = Arc::clone(&session);
        move || session.shutdown()
    });

    let look = presentation();
    let href = look.stylesheet_href(stylesheet_version());
    let root_style = look.root_style();
    let background = look
        .background_url
        .as_ref()
        .map(|url| format!("background-image: url('{url}');"))
        .unwrap_or_default();

    rsx! {
        document::Link { rel: "stylesheet", href: "{href}" }
        style { dangerous_inner_html: "{root_style}" }
        div { class: "app", style: "{background}",
            if let Some((level, text)) = toast() {
                Toast { level, text }
            }
            MessageList { messages }
            Composer { session: Arc::clone(&session), busy }
            SettingsPanel { session }
        }
    }
}

#[component]
fn Toast(level: NotifyLevel, text: String) -> Element {
    let class = match level {
        NotifyLevel::Success => "toast success",
        NotifyLevel::Error => "toast error",
    };
    rsx! {
        div { class: class, "{text}" }
    }
}

#[component]
fn MessageList(messages: Signal<Vec<ChatMessage>>) -> Element {
    rsx! {
        div { class: "messages",
            for (index, msg) in messages().into_iter().enumerate() {
                div {
                    key: "{index}",
                    class: match msg.role {
                        Role::User => "message user",
                        Role::Assistant => "message assistant",
                    },
                    "{msg.content}"
                }
            }
        }
    }
}

#[component]
fn Composer(session: ClientSession, busy: Signal<bool>) -> Element {
    let mut input = use_signal(String::new);

    let send = move |_: ()| {
        let text = input();
        if text.trim().is_empty() || busy() {
            return;
        }
        input.set(String::new());
        let session = Arc::clone(&session);
        spawn(async move {
            session.conversation.send(&text).await;
        });
    };

    rsx! {
        div { class: "composer",
            textarea {
                value: "{input}",
                disabled: busy(),
                oninput: move |evt| input.set(evt.value()),
                onkeydown: {
                    let mut send = send.clone();
                    move |evt: KeyboardEvent| {
                        if evt.key() == Key::Enter && !evt.modifiers().shift() {
                            evt.prevent_default();
                            send(());
                        }
                    }
                },
            }
            button {
                disabled: busy(),
                onclick: {
                    let mut send = send.clone();
                    move |_| send(())
                },
                "Send"
            }
        }
    }
}

impl PartialEq for Session<ServiceClient> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

#[component]
fn SettingsPanel(session: ClientSession) -> Element {
    let mut form = use_signal(|| ConfigUpdate::from_config(&Config::default()));
    let mut themes = use_signal(Vec::<String>::new);

    let reload_form = {
        let session = Arc::clone(&session);
        move || {
            form.set(ConfigUpdate::from_config(&session.store().snapshot()));
            themes.set(session.settings.themes());
        }
    };

    let save = {
        let session = Arc::clone(&session);
        move |_| {
            let session = Arc::clone(&session);
            let update = form();
            spawn(async move {
                session.save(&update).await;
            });
        }
    };

    let reset = {
        let session = Arc::clone(&session);
        let reload_form = reload_form.clone();
        move |_| {
            let session = Arc::clone(&session);
            let mut reload_form = reload_form.clone();
            spawn(async move {
                session.settings.reset().await;
                reload_form();
            });
        }
    };

    let current = form();
    rsx! {
        details { class: "settings",
            summary {
                onclick: {
                    let mut reload_form = reload_form.clone();
                    move |_| reload_form()
                },
                "Settings"
            }
            label { "Theme"
                select {
                    value: "{current.theme}",
                    onchange: move |evt| form.with_mut(|f| f.theme = evt.value()),
                    for theme in themes() {
                        option { value: "{theme}", "{display_name(&theme)}" }
                    }
                }
            }
            label { "Font"
                input {
                    value: "{current.font_family}",
                    oninput: move |evt| form.with_mut(|f| f.font_family = evt.value()),
                }
            }
            label { "Font size"
                input {
                    r#type: "number",
                    value: "{current.font_size}",
                    oninput: move |evt| {
                        if let Ok(size) = evt.value().parse() {
                            form.with_mut(|f| f.font_size = size);
                        }
                    },
                }
            }
            label { "Streaming"
                select {
                    onchange: move |evt| form.with_mut(|f| {
                        f.streaming = match evt.value().as_str() {
                            "raw" => StreamingChoice::Raw,
                            "smooth" => StreamingChoice::Smooth,
                            _ => StreamingChoice::Disabled,
                        }
                    }),
                    option { value: "disabled", selected: current.streaming == StreamingChoice::Disabled, "Disabled" }
                    option { value: "raw", selected: current.streaming == StreamingChoice::Raw, "Raw" }
                    option { value: "smooth", selected: current.streaming == StreamingChoice::Smooth, "Smooth" }
                }
            }
            label { "Smooth speed (ms)"
                input {
                    r#type: "number",
                    value: "{current.smooth_speed_ms}",
                    oninput: move |evt| {
                        if let Ok(ms) = evt.value().parse() {
                            form.with_mut(|f| f.smooth_speed_ms = ms);
                        }
                    },
                }
            }
            button { onclick: save, "Save" }
            button { onclick: reset, "Reset" }
        }
    }
}
