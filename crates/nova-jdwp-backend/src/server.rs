//! The command-processing loop.
//!
//! One packet at a time: read, dispatch to completion, write exactly one
//! reply. Event packets queued by the notification path are written between
//! replies, never inside one.

use std::sync::Arc;

use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use crate::{
    backend::Backend,
    commands::VIRTUAL_MACHINE,
    dispatch::Dispatcher,
    error::{InternalError, ServeError},
    wire::packet::{encode_reply, read_packet, write_packet, CommandPacket, IoPolicy},
};

const DISPOSE: u8 = 6;

/// Serve a debugger connection with every built-in command.
///
/// `stream` must already be past the transport handshake. Returns when the
/// debugger disconnects or disposes the session, or when `shutdown` fires.
pub async fn serve<S>(stream: S, backend: Arc<Backend>, shutdown: CancellationToken) -> Result<(), ServeError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    serve_with(stream, backend, Dispatcher::with_default_commands(), shutdown).await
}

pub async fn serve_with<S>(
    stream: S,
    backend: Arc<Backend>,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
) -> Result<(), ServeError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let mut events = backend.take_event_stream().ok_or_else(|| {
        InternalError("another connection is already being served".to_owned())
    })?;
    backend.reset();

    let config = backend.config();
    let policy = IoPolicy {
        retry_limit: config.io_retry_limit,
        max_packet_bytes: config.max_packet_bytes,
    };
    let (mut reader, mut writer) = tokio::io::split(stream);

    // Reads run in their own task so a shutdown never drops a half-read
    // packet on the floor.
    let (packet_tx, mut packets) = mpsc::channel::<Result<Option<CommandPacket>, ServeError>>(1);
    let reader_task = tokio::spawn(async move {
        loop {
            let res = read_packet(&mut reader, policy).await;
            let done = !matches!(res, Ok(Some(_)));
            if packet_tx.send(res).await.is_err() || done {
                break;
            }
        }
    });

    tracing::debug!(target: "nova.jdwp", "debugger connected");
    let result: Result<(), ServeError> = async {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::debug!(target: "nova.jdwp", "shutdown requested");
                    return Ok(());
                }
                Some(event) = events.recv() => {
                    write_packet(&mut writer, &event, policy).await?;
                }
                res = packets.recv() => {
                    let Some(res) = res else {
                        return Ok(());
                    };
                    let Some(packet) = res? else {
                        tracing::debug!(target: "nova.jdwp", "debugger disconnected");
                        return Ok(());
                    };
                    let disposed = packet.command_set == VIRTUAL_MACHINE && packet.command == DISPOSE;
                    let reply = handle(&backend, &dispatcher, &packet)?;
                    write_packet(&mut writer, &reply, policy).await?;
                    if disposed {
                        return Ok(());
                    }
                }
            }
        }
    }
    .await;

    reader_task.abort();
    backend.gate().release_all();
    backend.restore_event_stream(events);
    if let Err(err) = &result {
        tracing::error!(target: "nova.jdwp", error = %err, "command loop terminated");
    }
    result
}

fn handle(backend: &Backend, dispatcher: &Dispatcher, packet: &CommandPacket) -> Result<Vec<u8>, ServeError> {
    tracing::trace!(
        target: "nova.jdwp",
        id = packet.id,
        command_set = packet.command_set,
        command = packet.command,
        len = packet.payload.len(),
        "command"
    );
    let reply = dispatcher.execute(backend, packet.command_set, packet.command, &packet.payload)?;
    Ok(encode_reply(packet.id, reply.error.as_u16(), &reply.payload))
}
