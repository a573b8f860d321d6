// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP print client (JetDirect, port 9100).
//
// Open a socket, write the command stream, wait for the printer to drain, and
// close. Nothing is read back. One connection per call; the socket lives only
// inside `send_to_printer`, so every exit path drops it.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

use escbridge_core::error::{PrintError, Result};
use escbridge_core::types::Destination;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default pause between flush and close.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Chunk size for progress logging.
const CHUNK_SIZE: usize = 8192;

/// Timing knobs for one transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    /// Many printers drop the tail of a job if the peer closes the moment the
    /// last byte leaves; this gives their input buffer time to drain.
    pub settle_delay: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Send `payload` to `host:port` over raw TCP.
///
/// # Errors
///
/// - [`PrintError::ConnectionTimeout`] when no connection is made within
///   `connect_timeout`. The pending connect, and the half-open socket it owns,
///   is dropped.
/// - [`PrintError::Transport`] when the connect fails outright (refused,
///   unreachable, name resolution).
/// - [`PrintError::Write`] when writing or flushing fails after connecting.
///
/// Nothing is retried here.
#[instrument(skip(payload, options), fields(total = payload.len()))]
pub async fn send_to_printer(
    host: &str,
    port: u16,
    payload: &[u8],
    options: TransportOptions,
) -> Result<()> {
    let addr = Destination::new(host, port).to_string();
    send_over(TcpStream::connect((host, port)), &addr, payload, options).await
}

/// Transmit `payload` over whatever stream `connect` yields. The stream is
/// owned by this call and dropped on every exit path.
async fn send_over<C, S>(
    connect: C,
    addr: &str,
    payload: &[u8],
    options: TransportOptions,
) -> Result<()>
where
    C: Future<Output = std::io::Result<S>>,
    S: AsyncWrite + Unpin,
{
    info!(addr = %addr, total = payload.len(), "connecting via raw TCP");
    let mut stream = connect_within(connect, addr, options.connect_timeout).await?;

    let mut sent = 0usize;
    for chunk in payload.chunks(CHUNK_SIZE) {
        stream
            .write_all(chunk)
            .await
            .map_err(|source| PrintError::Write {
                addr: addr.to_string(),
                source,
            })?;
        sent += chunk.len();
        debug!(sent, total = payload.len(), "raw TCP progress");
    }

    stream.flush().await.map_err(|source| PrintError::Write {
        addr: addr.to_string(),
        source,
    })?;

    if !options.settle_delay.is_zero() {
        tokio::time::sleep(options.settle_delay).await;
    }

    // The payload is already with the printer; a failed FIN is not worth
    // failing the job over.
    if let Err(e) = stream.shutdown().await {
        warn!(addr = %addr, error = %e, "raw TCP shutdown failed");
    }

    info!(addr = %addr, total = payload.len(), "raw TCP print job sent");
    Ok(())
}

/// Whether a TCP connection to `host:port` can be opened within `timeout`.
/// The connection is closed straight away without sending anything.
#[instrument]
pub async fn probe(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => {
            debug!("printer reachable");
            true
        }
        Ok(Err(e)) => {
            warn!(error = %e, "printer unreachable");
            false
        }
        Err(_) => {
            warn!("printer probe timed out");
            false
        }
    }
}

/// Await `connect` for at most `timeout`, mapping both failure modes into
/// the transport error taxonomy.
async fn connect_within<F, S>(connect: F, addr: &str, timeout: Duration) -> Result<S>
where
    F: Future<Output = std::io::Result<S>>,
{
    tokio::time::timeout(timeout, connect)
        .await
        .map_err(|_| PrintError::ConnectionTimeout {
            addr: addr.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })?
        .map_err(|source| PrintError::Transport {
            addr: addr.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, DuplexStream};
    use tokio::net::TcpListener;
    use tokio::time::Instant;

    fn quick() -> TransportOptions {
        TransportOptions {
            connect_timeout: Duration::from_millis(2_000),
            settle_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn delivers_every_byte_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let receiver = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        send_to_printer("127.0.0.1", port, &payload, quick())
            .await
            .unwrap();

        assert_eq!(receiver.await.unwrap(), payload);
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        // Bind then drop to find a port nobody is listening on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = send_to_printer("127.0.0.1", port, b"\x1b@", quick())
            .await
            .unwrap_err();
        match err {
            PrintError::Transport { addr, source } => {
                assert_eq!(addr, format!("127.0.0.1:{port}"));
                assert_eq!(source.kind(), std::io::ErrorKind::ConnectionRefused);
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_connect_times_out_and_drops_the_socket() {
        let socket = Arc::new(());
        let held = Arc::clone(&socket);
        let connect = async move {
            let _socket = held;
            std::future::pending::<std::io::Result<DuplexStream>>().await
        };
        let options = TransportOptions {
            connect_timeout: Duration::from_millis(100),
            settle_delay: Duration::ZERO,
        };

        let started = Instant::now();
        let err = send_over(connect, "192.0.2.1:9100", b"\x1b@", options)
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(
            err,
            PrintError::ConnectionTimeout { timeout_ms: 100, .. }
        ));
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(150));
        assert_eq!(Arc::strong_count(&socket), 1, "pending connect must be dropped");
    }

    #[tokio::test(start_paused = true)]
    async fn settles_then_closes_after_writing() {
        let (client, mut printer) = tokio::io::duplex(1024);
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 7) as u8).collect();
        let options = TransportOptions {
            connect_timeout: Duration::from_millis(100),
            settle_delay: Duration::from_millis(500),
        };

        let reader = tokio::spawn(async move {
            let mut received = Vec::new();
            printer.read_to_end(&mut received).await.unwrap();
            received
        });
        let started = Instant::now();
        send_over(async { Ok(client) }, "printer:9100", &payload, options)
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(reader.await.unwrap(), payload);
    }

    #[tokio::test]
    async fn closed_peer_is_write_error() {
        let (client, printer) = tokio::io::duplex(64);
        drop(printer);
        let err = send_over(async { Ok(client) }, "printer:9100", b"data", quick())
            .await
            .unwrap_err();
        assert!(matches!(err, PrintError::Write { ref addr, .. } if addr == "printer:9100"));
    }

    #[tokio::test]
    async fn probe_reports_reachability() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(probe("127.0.0.1", port, Duration::from_millis(500)).await);
        drop(listener);
        assert!(!probe("127.0.0.1", port, Duration::from_millis(500)).await);
    }
}
