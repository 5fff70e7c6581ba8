use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parley=info"));

    // The dioxus launcher may already have installed a subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the defaults point at a local service.
    let _ = dotenvy::dotenv();
    init_logging();
    run()
}

#[cfg(feature = "ui")]
fn run() -> anyhow::Result<()> {
    dioxus::launch(parley::ui::App);
    Ok(())
}

#[cfg(not(feature = "ui"))]
fn run() -> anyhow::Result<()> {
    tokio::runtime::Runtime::new()?.block_on(terminal::run())
}

/// Line-oriented surface: one line in, one reply out.
#[cfg(not(feature = "ui"))]
mod terminal {
    use parley::events::{self, EventReceiver, NotifyLevel, UiEvent};
    use parley::{ChatBackend, Conversation, Role, ServiceClient, Session};
    use std::io::{self, Write};
    use std::sync::Arc;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tracing::info;

    pub async fn run() -> anyhow::Result<()> {
        let client = Arc::new(ServiceClient::from_env());
        info!("chat service at {}", client.base_url());

        let (tx, mut rx) = events::channel();
        let session = Session::new(client, tx);
        let mut printer = Printer::new(io::stdout());
        session.start().await;

        println!("Type a message, /reset to reload settings, /quit to leave.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match line.trim() {
                        "/quit" => break,
                        "/reset" => session.settings.reset().await,
                        _ => send_and_print(&session.conversation, &line, &mut rx, &mut printer).await?,
                    }
                }
                Some(event) = rx.recv() => printer.handle(event, &session.conversation)?,
            }
        }

        session.shutdown();
        Ok(())
    }

    /// Runs one send to completion, printing its events, then drains what it
    /// left queued. The log is read before any later send can append to it.
    pub async fn send_and_print<B: ChatBackend, W: Write>(
        conversation: &Conversation<B>,
        line: &str,
        rx: &mut EventReceiver,
        printer: &mut Printer<W>,
    ) -> io::Result<()> {
        let send = conversation.send(line);
        tokio::pin!(send);
        loop {
            tokio::select! {
                _ = &mut send => break,
                Some(event) = rx.recv() => printer.handle(event, conversation)?,
            }
        }
        while let Ok(event) = rx.try_recv() {
            printer.handle(event, conversation)?;
        }
        Ok(())
    }

    pub struct Printer<W> {
        out: W,
        // index and text already printed for the message being streamed
        streamed: Option<(usize, String)>,
    }

    impl<W: Write> Printer<W> {
        pub fn new(out: W) -> Self {
            Self { out, streamed: None }
        }

        pub fn handle<B: ChatBackend>(
            &mut self,
            event: UiEvent,
            conversation: &Conversation<B>,
        ) -> io::Result<()> {
            match event {
                UiEvent::MessageUpdated { index, content } => {
                    match &self.streamed {
                        Some((current, shown)) if *current == index && content.starts_with(shown.as_str()) => {
                            write!(self.out, "{}", &content[shown.len()..])?
                        }
                        Some(_) => write!(self.out, "\n{content}")?,
                        None => write!(self.out, "{content}")?,
                    }
                    self.streamed = Some((index, content));
                    self.out.flush()?;
                }
                UiEvent::Render { busy: false } => {
                    let messages = conversation.messages();
                    let last = messages.len().checked_sub(1);
                    let already_streamed = self.streamed.as_ref().map(|(index, _)| *index) == last;
                    if let Some(message) = messages.last()
                        && message.role == Role::Assistant
                        && !already_streamed
                    {
                        write!(self.out, "{}", message.content)?;
                    }
                    writeln!(self.out)?;
                    self.streamed = None;
                }
                UiEvent::Render { busy: true } => {}
                UiEvent::ConfigReloaded { config } => {
                    info!(
                        "configuration active: streaming={} mode={:?} theme={}",
                        config.streaming_enabled(),
                        config.streaming_mode(),
                        config.theme_name()
                    );
                }
                UiEvent::Notify { level, text } => match level {
                    NotifyLevel::Success => writeln!(self.out, "[ok] {text}")?,
                    NotifyLevel::Error => writeln!(self.out, "[error] {text}")?,
                },
            }
            Ok(())
        }
    }

}
