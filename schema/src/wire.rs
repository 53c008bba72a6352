//! Binary wire protocol between the sitter CLI and daemon
//!
//! Each connection carries exactly one request/response exchange. A
//! request is a single-byte opcode followed by a variant-specific
//! payload; a response is a single result code byte, plus a JSON body
//! for listings. Argument vectors travel as NUL-terminated strings
//! packed back-to-back, program name first.
//!
//! NUL policy: every string, including the last, is followed by exactly
//! one NUL byte. The count of strings equals the count of NUL bytes, so
//! the terminating NUL of the final string never produces a bogus empty
//! trailing argument, while a genuinely empty string (a lone NUL)
//! round-trips exactly.

use crate::ProcessInfo;
use thiserror::Error;

/// Maximum allowed payload size for a single frame (64KB)
/// This prevents unbounded memory growth from malicious or buggy peers
pub const MAX_PAYLOAD: usize = 64 * 1024;

/// Maximum allowed body size for a listing response (16MB)
///
/// Requests are bounded by [`MAX_PAYLOAD`], but a listing aggregates
/// the whole table; it gets its own, larger bound so the reader limit
/// and the writer limit agree.
pub const MAX_LISTING: usize = 16 * 1024 * 1024;

const OP_NEW_PROCESS: u8 = 1;
const OP_SIGNAL_PROCESS: u8 = 2;
const OP_LIST_PROCESS: u8 = 3;
const OP_ENABLE_AUTORESTART: u8 = 4;
const OP_DISABLE_AUTORESTART: u8 = 5;
const OP_SHUTDOWN: u8 = 6;
const OP_SET_STDOUT: u8 = 7;

const CODE_OK: u8 = 0;
const CODE_ERR: u8 = 1;

/// Codec error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WireError {
    #[error("Unknown opcode: {0}")]
    UnknownOpcode(u8),

    #[error("Frame truncated")]
    Truncated,

    #[error("Declared payload of {0} bytes exceeds the {MAX_PAYLOAD} byte limit")]
    Oversized(usize),

    #[error("Argument payload does not end with a NUL terminator")]
    MissingTerminator,

    #[error("Argument is not valid UTF-8")]
    InvalidUtf8,

    #[error("Unexpected trailing bytes after frame")]
    TrailingBytes,

    #[error("Malformed listing body: {0}")]
    BadListing(String),
}

/// A request sent from a client to the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Launch a new managed process; `argv[0]` is the program
    NewProcess { argv: Vec<String> },
    /// Deliver `signal` to the managed process with id `pid`
    SignalProcess { signal: i32, pid: i32 },
    /// Request a snapshot of all managed processes
    ListProcess,
    /// Reset a process's retry budget to the configured value
    EnableAutorestart { pid: i32 },
    /// Zero a process's retry budget
    DisableAutorestart { pid: i32 },
    /// Terminate all managed processes and stop the daemon
    Shutdown,
    /// Change the stdout redirection target for later launches;
    /// `None` disables redirection
    SetStdout { path: Option<String> },
}

impl Command {
    /// Encode the command into a complete wire frame
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::NewProcess { argv } => {
                let payload = pack_argv(argv);
                let mut buf = Vec::with_capacity(5 + payload.len());
                buf.push(OP_NEW_PROCESS);
                buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
                buf.extend_from_slice(&payload);
                buf
            }
            Command::SignalProcess { signal, pid } => {
                let mut buf = Vec::with_capacity(9);
                buf.push(OP_SIGNAL_PROCESS);
                buf.extend_from_slice(&signal.to_le_bytes());
                buf.extend_from_slice(&pid.to_le_bytes());
                buf
            }
            Command::ListProcess => vec![OP_LIST_PROCESS],
            Command::EnableAutorestart { pid } => {
                let mut buf = Vec::with_capacity(5);
                buf.push(OP_ENABLE_AUTORESTART);
                buf.extend_from_slice(&pid.to_le_bytes());
                buf
            }
            Command::DisableAutorestart { pid } => {
                let mut buf = Vec::with_capacity(5);
                buf.push(OP_DISABLE_AUTORESTART);
                buf.extend_from_slice(&pid.to_le_bytes());
                buf
            }
            Command::Shutdown => vec![OP_SHUTDOWN],
            Command::SetStdout { path } => {
                let bytes = path.as_deref().unwrap_or("").as_bytes();
                let mut buf = Vec::with_capacity(5 + bytes.len());
                buf.push(OP_SET_STDOUT);
                buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                buf.extend_from_slice(bytes);
                buf
            }
        }
    }

    /// Decode a complete wire frame
    ///
    /// The buffer must contain exactly one frame; trailing bytes are
    /// rejected rather than silently ignored.
    pub fn decode(buf: &[u8]) -> Result<Command, WireError> {
        let (&opcode, rest) = buf.split_first().ok_or(WireError::Truncated)?;
        match opcode {
            OP_NEW_PROCESS => {
                let len = read_u32(rest)? as usize;
                if len > MAX_PAYLOAD {
                    return Err(WireError::Oversized(len));
                }
                let payload = &rest[4..];
                if payload.len() < len {
                    return Err(WireError::Truncated);
                }
                if payload.len() > len {
                    return Err(WireError::TrailingBytes);
                }
                Ok(Command::NewProcess {
                    argv: unpack_argv(payload)?,
                })
            }
            OP_SIGNAL_PROCESS => {
                let signal = read_i32(rest)?;
                let pid = read_i32(&rest[4..])?;
                expect_empty(&rest[8..])?;
                Ok(Command::SignalProcess { signal, pid })
            }
            OP_LIST_PROCESS => {
                expect_empty(rest)?;
                Ok(Command::ListProcess)
            }
            OP_ENABLE_AUTORESTART => {
                let pid = read_i32(rest)?;
                expect_empty(&rest[4..])?;
                Ok(Command::EnableAutorestart { pid })
            }
            OP_DISABLE_AUTORESTART => {
                let pid = read_i32(rest)?;
                expect_empty(&rest[4..])?;
                Ok(Command::DisableAutorestart { pid })
            }
            OP_SHUTDOWN => {
                expect_empty(rest)?;
                Ok(Command::Shutdown)
            }
            OP_SET_STDOUT => {
                let len = read_u32(rest)? as usize;
                if len > MAX_PAYLOAD {
                    return Err(WireError::Oversized(len));
                }
                let payload = &rest[4..];
                if payload.len() < len {
                    return Err(WireError::Truncated);
                }
                if payload.len() > len {
                    return Err(WireError::TrailingBytes);
                }
                if len == 0 {
                    return Ok(Command::SetStdout { path: None });
                }
                let path = std::str::from_utf8(payload)
                    .map_err(|_| WireError::InvalidUtf8)?
                    .to_string();
                Ok(Command::SetStdout { path: Some(path) })
            }
            other => Err(WireError::UnknownOpcode(other)),
        }
    }
}

/// A reply sent from the daemon back to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Request succeeded
    Ok,
    /// Request failed; the daemon keeps running
    Err,
    /// Successful list request, carrying the table snapshot
    Listing(Vec<ProcessInfo>),
}

impl Response {
    /// Encode the response into a complete wire frame
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Response::Ok => vec![CODE_OK],
            Response::Err => vec![CODE_ERR],
            Response::Listing(processes) => {
                // serializing our own plain structs cannot fail
                let body = serde_json::to_vec(processes).unwrap_or_default();
                let mut buf = Vec::with_capacity(5 + body.len());
                buf.push(CODE_OK);
                buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
                buf.extend_from_slice(&body);
                buf
            }
        }
    }

    /// Decode a complete response frame
    pub fn decode(buf: &[u8]) -> Result<Response, WireError> {
        let (&code, rest) = buf.split_first().ok_or(WireError::Truncated)?;
        match code {
            CODE_OK if rest.is_empty() => Ok(Response::Ok),
            CODE_OK => {
                let len = read_u32(rest)? as usize;
                if len > MAX_LISTING {
                    return Err(WireError::Oversized(len));
                }
                let body = &rest[4..];
                if body.len() != len {
                    return Err(if body.len() < len {
                        WireError::Truncated
                    } else {
                        WireError::TrailingBytes
                    });
                }
                let processes = serde_json::from_slice(body)
                    .map_err(|e| WireError::BadListing(e.to_string()))?;
                Ok(Response::Listing(processes))
            }
            CODE_ERR => {
                expect_empty(rest)?;
                Ok(Response::Err)
            }
            other => Err(WireError::UnknownOpcode(other)),
        }
    }
}

/// Pack an argument vector into NUL-terminated back-to-back strings
pub fn pack_argv(argv: &[String]) -> Vec<u8> {
    let total: usize = argv.iter().map(|a| a.len() + 1).sum();
    let mut buf = Vec::with_capacity(total);
    for arg in argv {
        buf.extend_from_slice(arg.as_bytes());
        buf.push(0);
    }
    buf
}

/// Unpack a NUL-terminated argument payload
///
/// An empty payload decodes to an empty vector. A non-empty payload
/// must end with a NUL byte.
pub fn unpack_argv(payload: &[u8]) -> Result<Vec<String>, WireError> {
    match payload.last() {
        None => return Ok(Vec::new()),
        Some(0) => {}
        Some(_) => return Err(WireError::MissingTerminator),
    }
    let mut argv = Vec::new();
    let mut pieces = payload.split(|b| *b == 0).peekable();
    while let Some(piece) = pieces.next() {
        // the final NUL yields one empty slice past the last string
        if pieces.peek().is_none() {
            break;
        }
        let arg = std::str::from_utf8(piece).map_err(|_| WireError::InvalidUtf8)?;
        argv.push(arg.to_string());
    }
    Ok(argv)
}

fn read_u32(buf: &[u8]) -> Result<u32, WireError> {
    match buf.get(..4) {
        Some([a, b, c, d]) => Ok(u32::from_le_bytes([*a, *b, *c, *d])),
        _ => Err(WireError::Truncated),
    }
}

fn read_i32(buf: &[u8]) -> Result<i32, WireError> {
    read_u32(buf).map(|v| v as i32)
}

fn expect_empty(rest: &[u8]) -> Result<(), WireError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(WireError::TrailingBytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_argv_round_trip_basic() {
        let original = argv(&["/bin/echo", "hello", "world"]);
        let packed = pack_argv(&original);
        assert_eq!(packed, b"/bin/echo\0hello\0world\0");
        assert_eq!(unpack_argv(&packed).unwrap(), original);
    }

    #[test]
    fn test_argv_round_trip_empty_and_spaced_args() {
        let original = argv(&["/bin/prog", "", "two words", "", "  "]);
        let packed = pack_argv(&original);
        assert_eq!(unpack_argv(&packed).unwrap(), original);
    }

    #[test]
    fn test_argv_round_trip_many_args() {
        for n in 0..64 {
            let mut original = vec!["/bin/prog".to_string()];
            original.extend((0..n).map(|i| format!("arg-{i}")));
            let packed = pack_argv(&original);
            assert_eq!(unpack_argv(&packed).unwrap(), original, "n = {n}");
        }
    }

    #[test]
    fn test_trailing_nul_is_terminator_not_argument() {
        // "a\0" is one argument, not ["a", ""]
        assert_eq!(unpack_argv(b"a\0").unwrap(), argv(&["a"]));
        // "a\0\0" is ["a", ""] since the middle NUL terminates an empty string
        assert_eq!(unpack_argv(b"a\0\0").unwrap(), argv(&["a", ""]));
    }

    #[test]
    fn test_unpack_rejects_unterminated_payload() {
        assert_eq!(unpack_argv(b"abc"), Err(WireError::MissingTerminator));
        assert_eq!(unpack_argv(b"a\0b"), Err(WireError::MissingTerminator));
    }

    #[test]
    fn test_unpack_empty_payload() {
        assert_eq!(unpack_argv(b"").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_command_round_trip_all_variants() {
        let commands = vec![
            Command::NewProcess {
                argv: argv(&["/bin/sleep", "30"]),
            },
            Command::SignalProcess {
                signal: 15,
                pid: 4242,
            },
            Command::ListProcess,
            Command::EnableAutorestart { pid: 7 },
            Command::DisableAutorestart { pid: -1 },
            Command::Shutdown,
            Command::SetStdout {
                path: Some("/var/log/sitter.out".to_string()),
            },
            Command::SetStdout { path: None },
        ];
        for cmd in commands {
            let frame = cmd.encode();
            assert_eq!(Command::decode(&frame).unwrap(), cmd, "frame {frame:?}");
        }
    }

    #[test]
    fn test_command_decode_rejects_garbage() {
        assert_eq!(Command::decode(&[]), Err(WireError::Truncated));
        assert_eq!(Command::decode(&[99]), Err(WireError::UnknownOpcode(99)));
        // SignalProcess frame cut short
        assert_eq!(Command::decode(&[2, 1, 0]), Err(WireError::Truncated));
        // ListProcess with trailing junk
        assert_eq!(Command::decode(&[3, 0]), Err(WireError::TrailingBytes));
    }

    #[test]
    fn test_command_decode_rejects_oversized_payload() {
        let mut frame = vec![1];
        frame.extend_from_slice(&(MAX_PAYLOAD as u32 + 1).to_le_bytes());
        assert_eq!(
            Command::decode(&frame),
            Err(WireError::Oversized(MAX_PAYLOAD + 1))
        );
    }

    #[test]
    fn test_command_decode_rejects_short_argv_payload() {
        let mut frame = vec![1];
        frame.extend_from_slice(&8u32.to_le_bytes());
        frame.extend_from_slice(b"ab\0");
        assert_eq!(Command::decode(&frame), Err(WireError::Truncated));
    }

    #[test]
    fn test_response_round_trip() {
        for resp in [Response::Ok, Response::Err] {
            let frame = resp.encode();
            assert_eq!(Response::decode(&frame).unwrap(), resp);
        }

        let listing = Response::Listing(vec![ProcessInfo {
            pid: 10,
            program: "/bin/yes".to_string(),
            args: vec![],
            started_at: 1_700_000_000,
            retries_left: 0,
        }]);
        let frame = listing.encode();
        assert_eq!(Response::decode(&frame).unwrap(), listing);
    }

    #[test]
    fn test_set_stdout_empty_payload_clears_target() {
        let frame = Command::SetStdout { path: None }.encode();
        assert_eq!(frame, vec![7, 0, 0, 0, 0]);
        assert_eq!(
            Command::decode(&frame).unwrap(),
            Command::SetStdout { path: None }
        );
        // a short path payload must still match its declared length
        let mut frame = vec![7];
        frame.extend_from_slice(&8u32.to_le_bytes());
        frame.extend_from_slice(b"/tmp");
        assert_eq!(Command::decode(&frame), Err(WireError::Truncated));
    }

    #[test]
    fn test_response_decode_rejects_oversized_listing() {
        let mut frame = vec![0];
        frame.extend_from_slice(&((MAX_LISTING + 1) as u32).to_le_bytes());
        assert_eq!(
            Response::decode(&frame),
            Err(WireError::Oversized(MAX_LISTING + 1))
        );
    }

    #[test]
    fn test_response_decode_rejects_bad_body() {
        let mut frame = vec![0];
        frame.extend_from_slice(&3u32.to_le_bytes());
        frame.extend_from_slice(b"{{{");
        assert!(matches!(
            Response::decode(&frame),
            Err(WireError::BadListing(_))
        ));
    }
}
