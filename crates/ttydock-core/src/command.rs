//! Classification and parsing of inbound lines.
//!
//! The device shares one byte stream for ordinary data and for control
//! commands.  A line that starts with the reserved prefix (default
//! [`DEFAULT_COMMAND_PREFIX`]) is a command for the bridge itself; every
//! other line is passed through to the virtual endpoint untouched.
//!
//! The router returns a tagged [`Action`] rather than raw strings so that
//! callers can never mistake one classification for another.  Parsing is
//! pure — no I/O, no orchestration logic — which isolates the slow,
//! failure-prone work of actually invoking the orchestration tool from the
//! fast framing/parsing path.
//!
//! # Wire syntax
//!
//! ```text
//! CMD:list
//! CMD:start driver
//! CMD:stop driver
//! CMD:stop all
//! ```
//!
//! The prefix match is case-sensitive and exact.  Verb and arguments are
//! whitespace-split.  `CMD:` with nothing after it is invalid: it is
//! dropped (never forwarded), because a command line must never leak into
//! the transparent data path.

/// Prefix that marks a line as a control command.
pub const DEFAULT_COMMAND_PREFIX: &str = "CMD:";

/// Reserved service-name token meaning "every known service".
pub const STOP_ALL_TOKEN: &str = "all";

/// A control directive parsed from one complete line.
///
/// Transient: constructed, dispatched, discarded.  `raw` keeps the original
/// line (prefix included) for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// First whitespace-separated token after the prefix.
    pub verb: String,
    /// Remaining tokens, in order.
    pub args: Vec<String>,
    /// The full original line, for diagnostics and outcome text.
    pub raw: String,
}

/// The verb and arity of a [`Command`], resolved against the known set.
///
/// Resolution is separate from [`CommandRouter::route`] so that an
/// unrecognized verb still produces a `Dispatch` action — the originator may
/// be waiting for a response on the transparent channel, and silence would
/// look like a hang.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind<'a> {
    /// `list` — report every known service and its status.
    List,
    /// `start <name>` — start one service group.
    Start(&'a str),
    /// `stop <name>` — stop one service group.
    Stop(&'a str),
    /// `stop all` — stop every known service group.
    StopAll,
    /// Unrecognized verb or wrong argument count.
    Unknown,
}

impl Command {
    /// Resolves this command's verb and argument count.
    pub fn kind(&self) -> CommandKind<'_> {
        match (self.verb.as_str(), self.args.as_slice()) {
            ("list", []) => CommandKind::List,
            ("start", [name]) => CommandKind::Start(name.as_str()),
            ("stop", [name]) if name == STOP_ALL_TOKEN => CommandKind::StopAll,
            ("stop", [name]) => CommandKind::Stop(name.as_str()),
            _ => CommandKind::Unknown,
        }
    }
}

/// What the bridge should do with one complete inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Ordinary data: write the line verbatim (plus a trailing newline) to
    /// the virtual endpoint.
    Forward(String),
    /// A control command for the orchestration layer.
    Dispatch(Command),
    /// A malformed command line: log it and drop it.
    Ignore,
}

/// Classifies complete lines against a configured command prefix.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    prefix: String,
}

impl CommandRouter {
    /// Creates a router matching lines that start with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The configured command prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Classifies one complete line.
    ///
    /// The line is expected to be already trimmed (the [`crate::LineFramer`]
    /// does this); the prefix comparison is exact and case-sensitive.
    pub fn route(&self, line: &str) -> Action {
        let Some(rest) = line.strip_prefix(self.prefix.as_str()) else {
            return Action::Forward(line.to_string());
        };

        let mut tokens = rest.split_whitespace();
        let Some(verb) = tokens.next() else {
            // Nothing after the prefix. Dropping (rather than forwarding)
            // keeps half-typed commands out of the transparent path.
            return Action::Ignore;
        };

        Action::Dispatch(Command {
            verb: verb.to_string(),
            args: tokens.map(str::to_string).collect(),
            raw: line.to_string(),
        })
    }
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_PREFIX)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
