//! Application orchestrator: wires the registry, log, hub and HTTP helper
//! together and runs the command loop.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, anyhow};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use remotectl_hub_connection::{ConnectionEvent, ConnectionHub};
use remotectl_hub_http::HttpClient;
use remotectl_hub_log::{LogEntry, LogEvent, LogKind, LogStore};
use remotectl_hub_servers::{Endpoint, EndpointRegistry, ServerStore, default_servers_path};
use remotectl_protocol::{Frame, FrameBuilder, FrameError};

use crate::commands::{self, Command, Entry, HELP, Setting, Targets};
use crate::config::Config;

/// Upper bound on entries printed by `logs`.
const LOGS_SHOWN: usize = 100;

/// Runs the console until `quit`, end of input or Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let servers = Arc::new(open_servers(&config)?);
    let log = Arc::new(LogStore::new(config.log_capacity));
    let hub = Arc::new(ConnectionHub::new(config.hub_config()));
    hub.bind(&servers, &log);

    // -- Live log output --
    let mut entries = log.subscribe();
    tokio::spawn(async move {
        loop {
            match entries.recv().await {
                Ok(entry) => println!("{}", format_entry(&entry)),
                Err(RecvError::Lagged(n)) => tracing::warn!("log printer skipped {n} entries"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // -- Connection state changes --
    if let Some(mut events) = hub.take_events().await {
        tokio::spawn(async move {
            while let Some(ConnectionEvent::StateChanged { endpoint_id, state }) =
                events.recv().await
            {
                tracing::debug!(endpoint = %endpoint_id, ?state, "connection state changed");
            }
        });
    }

    // -- Endpoint registry changes --
    let mut registry = servers.subscribe();
    tokio::spawn(async move {
        while registry.changed().await.is_ok() {
            let count = registry.borrow_and_update().len();
            tracing::debug!(count, "endpoint registry changed");
        }
    });

    let console = Console::new(&config, servers, log, hub);
    console.start();
    console.command_loop().await;
    console.hub.shutdown().await;
    Ok(())
}

fn open_servers(config: &Config) -> anyhow::Result<ServerStore> {
    let path = config.servers_path.clone().or_else(default_servers_path);
    match path {
        Some(path) => ServerStore::open(path.clone())
            .with_context(|| format!("opening endpoint registry {}", path.display())),
        None => {
            tracing::warn!("no config directory; endpoints will not be persisted");
            Ok(ServerStore::in_memory(vec![Endpoint::new(
                "Local",
                "ws://localhost:8000/ws",
                "http://localhost:8000",
            )?]))
        }
    }
}

struct Console {
    servers: Arc<ServerStore>,
    log: Arc<LogStore>,
    hub: Arc<ConnectionHub>,
    http: HttpClient,
    /// Metadata template for composed frames; payload entries are added
    /// per command.
    composer: Mutex<FrameBuilder>,
}

impl Console {
    fn new(
        config: &Config,
        servers: Arc<ServerStore>,
        log: Arc<LogStore>,
        hub: Arc<ConnectionHub>,
    ) -> Self {
        Self {
            servers,
            log,
            hub,
            http: HttpClient::new(),
            composer: Mutex::new(
                FrameBuilder::new()
                    .sender_id(config.sender_id.as_str())
                    .msg_type(config.frame_type.as_str()),
            ),
        }
    }

    /// Connects every enabled endpoint in the background.
    fn start(&self) {
        let hub = self.hub.clone();
        tokio::spawn(async move { hub.connect_all().await });
    }

    /// Handshakes run off the command loop so a stalled endpoint never
    /// blocks input; `disconnect` cancels them.
    fn spawn_connect(&self, endpoint: Endpoint) {
        let hub = self.hub.clone();
        tokio::spawn(async move { hub.connect(endpoint).await });
    }

    async fn apply_enabled(&self, endpoint: Endpoint) {
        if endpoint.enabled {
            self.spawn_connect(endpoint);
        } else {
            self.hub.apply_enabled(&endpoint).await;
        }
    }

    async fn command_loop(&self) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("remotectl console ready; `help` lists commands");

        loop {
            let line = tokio::select! {
                line = lines.next_line() => line,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("SIGINT received, shutting down");
                    break;
                }
            };
            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("stdin read error: {e}");
                    break;
                }
            };

            let command = match commands::parse(&line) {
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    eprintln!("{e}");
                    continue;
                }
            };
            match self.execute(command).await {
                Ok(output) if !output.is_empty() => println!("{output}"),
                Ok(_) => {}
                Err(e) => eprintln!("error: {e:#}"),
            }
        }
    }

    async fn execute(&self, command: Command) -> anyhow::Result<String> {
        match command {
            Command::Help => Ok(HELP.to_string()),
            Command::List => Ok(self.list().await),
            Command::Add {
                name,
                transport,
                request,
            } => {
                let endpoint = Endpoint::new(&name, &transport, &request)?;
                self.servers.add(endpoint.clone())?;
                let name = endpoint.name.clone();
                self.apply_enabled(endpoint).await;
                Ok(format!("added {name}"))
            }
            Command::Edit {
                name,
                transport,
                request,
            } => {
                let current = self.endpoint(&name)?;
                let mut edited = Endpoint::new(&name, &transport, &request)?;
                edited.id = current.id;
                edited.enabled = current.enabled;
                self.servers.update(edited)?;
                let hub = self.hub.clone();
                tokio::spawn(async move { hub.sync_with_registry().await });
                Ok(format!("updated {name}"))
            }
            Command::Remove(name) => {
                let endpoint = self.endpoint(&name)?;
                self.hub.disconnect(endpoint.id).await;
                self.servers.remove(endpoint.id)?;
                Ok(format!("removed {name}"))
            }
            Command::Enable(name) => self.set_enabled(&name, true).await,
            Command::Disable(name) => self.set_enabled(&name, false).await,
            Command::Connect(name) => {
                let endpoint = self.endpoint(&name)?;
                self.spawn_connect(endpoint);
                Ok(String::new())
            }
            Command::Disconnect(name) => {
                let endpoint = self.endpoint(&name)?;
                self.hub.disconnect(endpoint.id).await;
                Ok(String::new())
            }
            Command::Send { targets, entries } => {
                let targets = self.resolve(&targets)?;
                let frame = self.compose(&entries);
                self.hub.send(&frame, &targets).await;
                Ok(format!("sent to {} endpoint(s)", targets.len()))
            }
            Command::Preview(entries) => {
                let rendered = self.compose(&entries).to_pretty_json();
                self.log.push(preview_event(rendered));
                Ok(String::new())
            }
            Command::Set(setting) => {
                let mut composer = self.composer.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(apply_setting(&mut composer, setting))
            }
            Command::Http {
                targets,
                method,
                path,
                body,
            } => {
                let targets = self.resolve(&targets)?;
                self.http
                    .send_all(self.log.as_ref(), &targets, &method, &path, &body)
                    .await;
                Ok(String::new())
            }
            Command::Logs { kind, search } => {
                let entries = self.log.filtered(kind, &search);
                let mut out = String::new();
                for entry in entries.iter().take(LOGS_SHOWN) {
                    let _ = writeln!(out, "{}", format_entry(entry));
                }
                let _ = write!(out, "{} matching entries", entries.len());
                Ok(out)
            }
            Command::Clear => {
                self.log.clear();
                Ok("log cleared".into())
            }
            Command::Quit => Ok(String::new()),
        }
    }

    async fn list(&self) -> String {
        let mut out = String::new();
        for endpoint in self.servers.all() {
            let state = self.hub.state(endpoint.id).await;
            let _ = writeln!(
                out,
                "{:<16} {:<8} {:<13} {}  {}",
                endpoint.name,
                if endpoint.enabled { "enabled" } else { "disabled" },
                format!("{state:?}"),
                endpoint.transport_address,
                endpoint.request_address,
            );
        }
        out.trim_end().to_string()
    }

    async fn set_enabled(&self, name: &str, enabled: bool) -> anyhow::Result<String> {
        let endpoint = self.endpoint(name)?;
        let updated = self
            .servers
            .set_enabled(endpoint.id, enabled)?
            .ok_or_else(|| anyhow!("unknown endpoint {name:?}"))?;
        self.apply_enabled(updated).await;
        Ok(format!(
            "{name} {}",
            if enabled { "enabled" } else { "disabled" }
        ))
    }

    fn endpoint(&self, name: &str) -> anyhow::Result<Endpoint> {
        self.servers
            .find_by_name(name)
            .ok_or_else(|| anyhow!("unknown endpoint {name:?}"))
    }

    fn resolve(&self, targets: &Targets) -> anyhow::Result<Vec<Endpoint>> {
        resolve_targets(self.servers.as_ref(), targets)
    }

    fn compose(&self, entries: &[Entry]) -> Frame {
        let composer = self.composer.lock().unwrap_or_else(PoisonError::into_inner);
        compose_frame(&composer, entries)
    }
}

/// Resolves `*` to the enabled endpoints and names to their endpoints.
/// Unknown names are an error; nothing is sent in that case.
fn resolve_targets(servers: &ServerStore, targets: &Targets) -> anyhow::Result<Vec<Endpoint>> {
    match targets {
        Targets::All => Ok(servers.enabled_endpoints()),
        Targets::Named(names) => {
            let mut found = Vec::with_capacity(names.len());
            let mut unknown = Vec::new();
            for name in names {
                match servers.find_by_name(name) {
                    Some(endpoint) => found.push(endpoint),
                    None => unknown.push(name.as_str()),
                }
            }
            if !unknown.is_empty() {
                return Err(anyhow!("unknown endpoint(s): {}", unknown.join(", ")));
            }
            if found.is_empty() {
                return Err(anyhow!("no targets given"));
            }
            Ok(found)
        }
    }
}

/// Stamps `entries` onto a copy of the metadata template. The message id
/// stays the same across frames until `set id` changes it.
fn compose_frame(template: &FrameBuilder, entries: &[Entry]) -> Frame {
    entries
        .iter()
        .fold(template.clone(), |builder, e| {
            builder.entry(&e.datatype, &e.value, &e.slug)
        })
        .build()
}

fn apply_setting(composer: &mut FrameBuilder, setting: Setting) -> String {
    let template = composer.clone();
    let (updated, summary) = match setting {
        Setting::Sender(v) => {
            let summary = format!("sender set to {v}");
            (template.sender_id(v), summary)
        }
        Setting::Type(v) => {
            let summary = format!("type set to {v}");
            (template.msg_type(v), summary)
        }
        Setting::Receiver(v) => {
            let summary = if v.is_empty() {
                "receiver cleared".to_string()
            } else {
                format!("receiver set to {v}")
            };
            (template.receiver_id(v), summary)
        }
        Setting::Status(v) => {
            let summary = if v.is_empty() {
                "status cleared".to_string()
            } else {
                format!("status set to {v}")
            };
            (template.status(v), summary)
        }
        Setting::MessageId(Some(v)) => {
            let summary = format!("message id set to {v}");
            (template.message_id(v), summary)
        }
        Setting::MessageId(None) => (
            template.regenerate_message_id(),
            "message id regenerated".to_string(),
        ),
    };
    *composer = updated;
    summary
}

fn preview_event(rendered: Result<String, FrameError>) -> LogEvent {
    match rendered {
        Ok(pretty) => LogEvent::new(None, LogKind::Info, "Frame preview", pretty),
        Err(e) => LogEvent::new(None, LogKind::Error, "Frame preview error", e.to_string()),
    }
}

/// One-line rendering of a log entry, followed by its indented body.
fn format_entry(entry: &LogEntry) -> String {
    let event = &entry.event;
    let mut line = format!(
        "{} {:<12} {:<10} {}",
        entry.date.format("%H:%M:%S%.3f"),
        event.kind,
        event.endpoint_name.as_deref().unwrap_or("-"),
        event.title,
    );
    for body_line in event.body.lines() {
        line.push_str("\n    ");
        line.push_str(body_line);
    }
    line
}
