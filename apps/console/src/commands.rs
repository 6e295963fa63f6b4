//! Console command parsing.

use remotectl_hub_log::LogKind;

/// Datatype used when a payload entry does not name one.
pub const DEFAULT_DATATYPE: &str = "string";

/// Endpoints a command applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    /// Every enabled endpoint.
    All,
    Named(Vec<String>),
}

/// One `slug=value[:datatype]` payload entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub slug: String,
    pub value: String,
    pub datatype: String,
}

/// Frame metadata field changed by `set`. Empty receiver and status values
/// clear the field; an empty id asks for a fresh random one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    Sender(String),
    Receiver(String),
    Type(String),
    Status(String),
    MessageId(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    List,
    Add {
        name: String,
        transport: String,
        request: String,
    },
    Edit {
        name: String,
        transport: String,
        request: String,
    },
    Remove(String),
    Enable(String),
    Disable(String),
    Connect(String),
    Disconnect(String),
    Send {
        targets: Targets,
        entries: Vec<Entry>,
    },
    Preview(Vec<Entry>),
    Set(Setting),
    Http {
        targets: Targets,
        method: String,
        path: String,
        body: String,
    },
    Logs {
        kind: Option<LogKind>,
        search: String,
    },
    Clear,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command {0:?}; try `help`")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid entry {0:?}; expected slug=value[:datatype]")]
    Entry(String),
}

pub const HELP: &str = "\
commands:
  list                                   endpoints and connection state
  add <name> <ws-url> <http-url>         register an endpoint
  edit <name> <ws-url> <http-url>        change an endpoint's addresses
  remove <name>                          forget an endpoint
  enable <name> | disable <name>         toggle and (dis)connect
  connect <name> | disconnect <name>     open or close a connection
  send <targets> slug=value[:type]...    broadcast a frame
  preview slug=value[:type]...           show the frame without sending
  set sender|type <value>                frame metadata for later sends
  set receiver|status [value]            empty value clears the field
  set id [value]                         fixed message id, or a fresh one
  http <targets> <METHOD> <path> [body]  one-shot HTTP request
  logs [kind] [search]                   show log entries, newest first
  clear                                  empty the log
  quit
targets: * for every enabled endpoint, or name[,name...]";

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    let Some((verb, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match verb.to_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "list" | "ls" => Command::List,
        "add" => match words(rest).as_slice() {
            [name, transport, request] => Command::Add {
                name: name.to_string(),
                transport: transport.to_string(),
                request: request.to_string(),
            },
            _ => return Err(ParseError::Usage("add <name> <ws-url> <http-url>")),
        },
        "edit" => match words(rest).as_slice() {
            [name, transport, request] => Command::Edit {
                name: name.to_string(),
                transport: transport.to_string(),
                request: request.to_string(),
            },
            _ => return Err(ParseError::Usage("edit <name> <ws-url> <http-url>")),
        },
        "remove" | "rm" => Command::Remove(one_name(rest, "remove <name>")?),
        "enable" => Command::Enable(one_name(rest, "enable <name>")?),
        "disable" => Command::Disable(one_name(rest, "disable <name>")?),
        "connect" => Command::Connect(one_name(rest, "connect <name>")?),
        "disconnect" => Command::Disconnect(one_name(rest, "disconnect <name>")?),
        "send" => {
            const USAGE: &str = "send <targets> slug=value[:datatype]...";
            let Some((targets, rest)) = split_word(rest) else {
                return Err(ParseError::Usage(USAGE));
            };
            let entries = parse_entries(rest)?;
            if entries.is_empty() {
                return Err(ParseError::Usage(USAGE));
            }
            Command::Send {
                targets: parse_targets(targets),
                entries,
            }
        }
        "preview" => Command::Preview(parse_entries(rest)?),
        "set" => Command::Set(parse_setting(rest)?),
        "http" => {
            const USAGE: &str = "http <targets> <METHOD> <path> [body]";
            let (targets, rest) = split_word(rest).ok_or(ParseError::Usage(USAGE))?;
            let (method, rest) = split_word(rest).ok_or(ParseError::Usage(USAGE))?;
            let (path, body) = split_word(rest).ok_or(ParseError::Usage(USAGE))?;
            Command::Http {
                targets: parse_targets(targets),
                method: method.to_uppercase(),
                path: path.to_string(),
                body: body.to_string(),
            }
        }
        "logs" | "log" => {
            let (kind, search) = match split_word(rest) {
                Some((first, tail)) => match LogKind::parse(first) {
                    Some(kind) => (Some(kind), tail),
                    None => (None, rest),
                },
                None => (None, ""),
            };
            Command::Logs {
                kind,
                search: search.to_string(),
            }
        }
        "clear" => Command::Clear,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// Splits off the first whitespace-delimited word; the remainder is trimmed.
fn split_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim())),
        None => Some((s, "")),
    }
}

fn words(s: &str) -> Vec<&str> {
    s.split_whitespace().collect()
}

fn one_name(rest: &str, usage: &'static str) -> Result<String, ParseError> {
    match words(rest).as_slice() {
        [name] => Ok(name.to_string()),
        _ => Err(ParseError::Usage(usage)),
    }
}

fn parse_targets(s: &str) -> Targets {
    if s == "*" {
        return Targets::All;
    }
    Targets::Named(
        s.split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn parse_setting(rest: &str) -> Result<Setting, ParseError> {
    const USAGE: &str = "set sender|receiver|type|status|id [value]";
    let (field, value) = split_word(rest).ok_or(ParseError::Usage(USAGE))?;
    let value = value.to_string();
    let setting = match field.to_lowercase().as_str() {
        "sender" if !value.is_empty() => Setting::Sender(value),
        "type" if !value.is_empty() => Setting::Type(value),
        "receiver" => Setting::Receiver(value),
        "status" => Setting::Status(value),
        "id" => Setting::MessageId(Some(value).filter(|v| !v.is_empty())),
        _ => return Err(ParseError::Usage(USAGE)),
    };
    Ok(setting)
}

fn parse_entries(s: &str) -> Result<Vec<Entry>, ParseError> {
    s.split_whitespace().map(parse_entry).collect()
}

/// `slug=value` or `slug=value:datatype`. The datatype is split at the last
/// colon, so a value containing colons needs an explicit datatype.
fn parse_entry(s: &str) -> Result<Entry, ParseError> {
    let (slug, rest) = s
        .split_once('=')
        .filter(|(slug, _)| !slug.is_empty())
        .ok_or_else(|| ParseError::Entry(s.to_string()))?;
    let (value, datatype) = match rest.rsplit_once(':') {
        Some((value, datatype)) if !datatype.is_empty() => (value, datatype),
        _ => (rest, DEFAULT_DATATYPE),
    };
    Ok(Entry {
        slug: slug.to_string(),
        value: value.to_string(),
        datatype: datatype.to_string(),
    })
}
