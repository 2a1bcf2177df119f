//! Resource limits for a simulated session
//!
//! These limits keep a single reply bounded no matter what a canned asset or
//! a simulation backend produces.

use std::time::Duration;

/// Default cap on a single reply, in bytes.
pub const DEFAULT_MAX_OUTPUT: usize = 16_384;

/// Default cap on a single input line, in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4_096;

/// Limits applied by the router and the line server.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum reply size in bytes.
    /// Default: 16,384
    pub max_output: usize,

    /// Maximum input line size in bytes, enforced at the transport.
    /// Default: 4,096
    pub max_line_length: usize,

    /// Per-call deadline for simulation backends. `None` leaves timeouts to
    /// the backend itself.
    /// Default: None
    pub backend_timeout: Option<Duration>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_output: DEFAULT_MAX_OUTPUT,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            backend_timeout: None,
        }
    }
}

impl Limits {
    /// Create new limits with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum reply size
    pub fn max_output(mut self, bytes: usize) -> Self {
        self.max_output = bytes;
        self
    }

    /// Set maximum input line size
    pub fn max_line_length(mut self, bytes: usize) -> Self {
        self.max_line_length = bytes;
        self
    }

    /// Set per-call backend deadline
    pub fn backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = Some(timeout);
        self
    }
}

/// Result of dispatching one line: the text to send back and whether it was
/// clipped to the output limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// Text shown to the remote party.
    pub output: String,
    /// True when the untruncated text exceeded the limit.
    pub truncated: bool,
}

impl Dispatch {
    /// Empty, untruncated reply.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Clip `text` to `max_bytes`.
    ///
    /// `truncated` is computed on the byte length of the full text. The cut
    /// lands on the last UTF-8 char boundary at or below the limit, so for
    /// ASCII output the result is exactly `max_bytes` long.
    pub fn clipped(mut text: String, max_bytes: usize) -> Self {
        if text.len() <= max_bytes {
            return Self {
                output: text,
                truncated: false,
            };
        }
        let mut end = max_bytes;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
        Self {
            output: text,
            truncated: true,
        }
    }

    /// The standard reply for anything the shell pretends not to know.
    pub fn command_not_found(cmd: &str) -> Self {
        Self {
            output: format!("sh: {}: command not found", cmd),
            truncated: false,
        }
    }
}
