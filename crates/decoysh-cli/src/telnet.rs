//! Line decoding for raw telnet-ish TCP input
//!
//! Telnet option negotiation (IAC sequences) is dropped, CR, LF and CRLF
//! all end a line, over-long lines are cut at the byte limit, and invalid
//! UTF-8 is replaced rather than rejected.

use decoysh::Session;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

const IAC: u8 = 255;
const SB: u8 = 250;
const SE: u8 = 240;
const WILL: u8 = 251;
const DONT: u8 = 254;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    /// After IAC.
    Iac,
    /// After IAC WILL/WONT/DO/DONT, expecting the option byte.
    Negotiate,
    /// Inside IAC SB ... IAC SE.
    Sub,
    /// IAC seen inside a subnegotiation.
    SubIac,
}

/// Byte-level decoder state, kept across reads.
#[derive(Debug)]
struct Decoder {
    state: State,
    /// Swallow the LF of a CRLF pair.
    after_cr: bool,
    max_line: usize,
}

impl Decoder {
    fn new(max_line: usize) -> Self {
        Self {
            state: State::Data,
            after_cr: false,
            max_line,
        }
    }

    /// Feed one byte; returns true when it ends a line.
    fn feed(&mut self, b: u8, line: &mut Vec<u8>) -> bool {
        match self.state {
            State::Data => {
                let after_cr = std::mem::take(&mut self.after_cr);
                match b {
                    IAC => self.state = State::Iac,
                    b'\r' => {
                        self.after_cr = true;
                        return true;
                    }
                    b'\n' if after_cr => {}
                    b'\n' => return true,
                    // telnet sends CR NUL for a bare carriage return
                    0 => {}
                    _ => self.push(b, line),
                }
            }
            State::Iac => {
                self.state = match b {
                    IAC => {
                        self.push(IAC, line);
                        State::Data
                    }
                    WILL..=DONT => State::Negotiate,
                    SB => State::Sub,
                    _ => State::Data,
                }
            }
            State::Negotiate => self.state = State::Data,
            State::Sub => {
                if b == IAC {
                    self.state = State::SubIac;
                }
            }
            State::SubIac => {
                self.state = if b == SE { State::Data } else { State::Sub };
            }
        }
        false
    }

    fn push(&self, b: u8, line: &mut Vec<u8>) {
        if line.len() < self.max_line {
            line.push(b);
        }
    }
}

/// Reads decoded lines from a connection.
///
/// `read_line` is cancel-safe: a partial line survives a timeout and is
/// completed by the next call.
pub struct LineReader<R> {
    inner: BufReader<R>,
    decoder: Decoder,
    line: Vec<u8>,
    bytes_read: u64,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R, max_line: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            decoder: Decoder::new(max_line),
            line: Vec::new(),
            bytes_read: 0,
        }
    }

    /// Raw bytes consumed so far, negotiation included.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Next line without its terminator; `None` at EOF.
    ///
    /// Updates `session.bytes_in` with everything consumed.
    pub async fn next_line(&mut self, session: &mut Session) -> std::io::Result<Option<String>> {
        let line = self.read_line().await;
        session.bytes_in = self.bytes_read();
        line
    }

    /// Next line without its terminator; `None` at EOF.
    pub async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let buf = self.inner.fill_buf().await?;
            if buf.is_empty() {
                if self.line.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(decode(std::mem::take(&mut self.line))));
            }

            let mut used = 0;
            let mut complete = false;
            for &b in buf {
                used += 1;
                if self.decoder.feed(b, &mut self.line) {
                    complete = true;
                    break;
                }
            }
            self.inner.consume(used);
            self.bytes_read += used as u64;

            if complete {
                return Ok(Some(decode(std::mem::take(&mut self.line))));
            }
        }
    }
}

/// Write `text` and flush, counting it in `session.bytes_out`.
pub async fn send<W: AsyncWrite + Unpin>(
    writer: &mut W,
    session: &mut Session,
    text: &str,
) -> std::io::Result<()> {
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await?;
    session.bytes_out += text.len() as u64;
    Ok(())
}

fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}
