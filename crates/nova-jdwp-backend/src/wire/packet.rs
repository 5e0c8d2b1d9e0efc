//! Packet framing.
//!
//! Every packet starts with an 11 byte header: length (header included), id,
//! flags, then either `command_set`/`command` (commands) or a 2 byte error
//! code (replies, flag `0x80`).

use std::{io, time::Duration};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ServeError;

pub const HEADER_LEN: usize = 11;
pub const FLAG_REPLY: u8 = 0x80;

/// `Event.Composite` is the only command the back-end sends.
pub const EVENT_COMMAND_SET: u8 = 64;
pub const EVENT_COMPOSITE: u8 = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandPacket {
    pub id: u32,
    pub command_set: u8,
    pub command: u8,
    pub payload: Vec<u8>,
}

pub fn encode_command(id: u32, command_set: u8, command: u8, payload: &[u8]) -> Vec<u8> {
    let length = (HEADER_LEN + payload.len()) as u32;
    let mut out = Vec::with_capacity(length as usize);
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(&id.to_be_bytes());
    out.push(0); // flags
    out.push(command_set);
    out.push(command);
    out.extend_from_slice(payload);
    out
}

pub fn encode_reply(id: u32, error_code: u16, payload: &[u8]) -> Vec<u8> {
    let length = (HEADER_LEN + payload.len()) as u32;
    let mut out = Vec::with_capacity(length as usize);
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(&id.to_be_bytes());
    out.push(FLAG_REPLY);
    out.extend_from_slice(&error_code.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(10u64 << attempt.min(6))
}

/// Transient I/O failures are retried up to `retry_limit` times. Progress is
/// kept across retries so a packet is never read twice or half-skipped.
#[derive(Clone, Copy, Debug)]
pub struct IoPolicy {
    pub retry_limit: u32,
    pub max_packet_bytes: usize,
}

/// Fill `buf`. Returns `false` on a clean end of stream before any byte.
async fn fill<R>(reader: &mut R, buf: &mut [u8], policy: IoPolicy) -> Result<bool, ServeError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    let mut attempts = 0u32;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(ServeError::Io {
                    attempts: attempts + 1,
                    source: io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed mid-packet",
                    ),
                })
            }
            Ok(n) => filled += n,
            Err(err) if is_transient(&err) && attempts < policy.retry_limit => {
                attempts += 1;
                tracing::warn!(target: "nova.jdwp", attempt = attempts, error = %err, "retrying JDWP read");
                tokio::time::sleep(backoff(attempts)).await;
            }
            Err(source) => {
                return Err(ServeError::Io {
                    attempts: attempts + 1,
                    source,
                })
            }
        }
    }
    Ok(true)
}

/// Read the next command packet. `Ok(None)` means the debugger hung up
/// between packets.
pub async fn read_packet<R>(reader: &mut R, policy: IoPolicy) -> Result<Option<CommandPacket>, ServeError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    if !fill(reader, &mut header, policy).await? {
        return Ok(None);
    }

    let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    if length < HEADER_LEN {
        return Err(ServeError::Protocol(format!(
            "packet length {length} is shorter than the header"
        )));
    }
    if length > policy.max_packet_bytes {
        return Err(ServeError::Protocol(format!(
            "packet length {length} exceeds limit {}",
            policy.max_packet_bytes
        )));
    }
    let id = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let flags = header[8];
    if flags & FLAG_REPLY != 0 {
        // The back-end never sends commands that expect a reply.
        return Err(ServeError::Protocol(format!(
            "unexpected reply packet {id} from debugger"
        )));
    }

    let mut payload = vec![0u8; length - HEADER_LEN];
    if !payload.is_empty() && !fill(reader, &mut payload, policy).await? {
        return Err(ServeError::Io {
            attempts: 1,
            source: io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed mid-packet"),
        });
    }

    Ok(Some(CommandPacket {
        id,
        command_set: header[9],
        command: header[10],
        payload,
    }))
}

/// Write a whole packet, retrying transient failures.
pub async fn write_packet<W>(writer: &mut W, bytes: &[u8], policy: IoPolicy) -> Result<(), ServeError>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    let mut attempts = 0u32;
    while written < bytes.len() {
        match writer.write(&bytes[written..]).await {
            Ok(0) => {
                return Err(ServeError::Io {
                    attempts: attempts + 1,
                    source: io::Error::new(io::ErrorKind::WriteZero, "connection closed"),
                })
            }
            Ok(n) => written += n,
            Err(err) if is_transient(&err) && attempts < policy.retry_limit => {
                attempts += 1;
                tracing::warn!(target: "nova.jdwp", attempt = attempts, error = %err, "retrying JDWP write");
                tokio::time::sleep(backoff(attempts)).await;
            }
            Err(source) => {
                return Err(ServeError::Io {
                    attempts: attempts + 1,
                    source,
                })
            }
        }
    }
    writer
        .flush()
        .await
        .map_err(|source| ServeError::Io { attempts: 1, source })
}
