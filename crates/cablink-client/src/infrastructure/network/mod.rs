//! TCP transport to the hardware/services manager.
//!
//! Architecture:
//! - [`TcpTransport::connect`] spawns one OS thread, `cablink-transport`,
//!   running a current-thread Tokio runtime.  The caller blocks only until
//!   the TCP connect succeeds or fails.
//! - A reader task accumulates bytes, decodes complete envelopes with
//!   [`decode_envelope`] and hands them to the [`InboundSink`].
//! - A writer task drains an unbounded channel of framed envelopes, so
//!   [`Transport::send`] never awaits and can be called from any host thread.
//! - EOF, an I/O error, or a corrupt frame ends the link and is reported to
//!   the sink as a [`LinkFault`] exactly once.  A local [`Transport::close`]
//!   flushes queued frames and ends the link without a fault.

use std::net::SocketAddr;
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cablink_core::protocol::{decode_envelope, encode_envelope, is_incomplete};
use cablink_core::Envelope;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    runtime,
    sync::{mpsc, oneshot},
    time,
};
use tracing::{debug, error, info, warn};

use crate::fault::{lock, LinkFault};
use crate::transport::{InboundSink, Transport, TransportError};

const READ_CHUNK: usize = 8 * 1024;

/// A framed TCP link to the manager.
pub struct TcpTransport {
    peer: SocketAddr,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl TcpTransport {
    /// Connects to `addr` and starts delivering inbound envelopes to `sink`.
    ///
    /// # Errors
    ///
    /// [`TransportError::Connect`] if the connection is refused, times out,
    /// or the transport thread cannot be started.
    pub fn connect(
        addr: SocketAddr,
        sink: Arc<dyn InboundSink>,
        timeout: Duration,
    ) -> Result<Arc<Self>, TransportError> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = std_mpsc::channel();

        let handle = thread::Builder::new()
            .name("cablink-transport".to_string())
            .spawn(move || {
                let rt = match runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = ready_tx.send(Err(TransportError::Connect(format!(
                            "failed to build runtime: {e}"
                        ))));
                        return;
                    }
                };
                rt.block_on(run_link(addr, timeout, sink, outbound_rx, stop_rx, ready_tx));
            })
            .map_err(|e| TransportError::Connect(format!("failed to spawn transport thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Arc::new(Self {
                peer: addr,
                outbound: outbound_tx,
                stop: Mutex::new(Some(stop_tx)),
                thread: Mutex::new(Some(handle)),
            })),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(TransportError::Connect(
                    "transport thread exited before connecting".to_string(),
                ))
            }
        }
    }
}

impl Transport for TcpTransport {
    fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        let frame = encode_envelope(&envelope).map_err(|e| TransportError::Encode(e.to_string()))?;
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        if let Some(stop) = lock(&self.stop).take() {
            debug!("closing link to {}", self.peer);
            let _ = stop.send(());
        }
        let Some(handle) = lock(&self.thread).take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            // Closed from a sink callback; the thread ends on its own.
            return;
        }
        if handle.join().is_err() {
            error!("transport thread panicked");
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_link(
    addr: SocketAddr,
    timeout: Duration,
    sink: Arc<dyn InboundSink>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    stop: oneshot::Receiver<()>,
    ready: std_mpsc::Sender<Result<(), TransportError>>,
) {
    let stream = match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            warn!("could not connect to manager at {addr}: {e}");
            let _ = ready.send(Err(TransportError::Connect(format!("{addr}: {e}"))));
            return;
        }
        Err(_) => {
            warn!("connect to manager at {addr} timed out after {timeout:?}");
            let _ = ready.send(Err(TransportError::Connect(format!(
                "{addr}: timed out after {timeout:?}"
            ))));
            return;
        }
    };
    if let Err(e) = stream.set_nodelay(true) {
        debug!("set_nodelay failed: {e}");
    }
    info!("connected to manager at {addr}");
    if ready.send(Ok(())).is_err() {
        return;
    }

    let (reader, writer) = stream.into_split();
    tokio::select! {
        fault = read_loop(reader, sink.as_ref()) => sink.fault(fault),
        fault = write_loop(writer, outbound, stop) => {
            if let Some(fault) = fault {
                sink.fault(fault);
            }
        }
    }
    debug!("link to {addr} ended");
}

/// Reads until the stream fails; always returns the fault that ended it.
async fn read_loop(mut reader: OwnedReadHalf, sink: &dyn InboundSink) -> LinkFault {
    let mut pending: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => {
                info!("manager closed the connection");
                return LinkFault::Transport("connection closed by manager".to_string());
            }
            Ok(n) => n,
            Err(e) => {
                error!("read error on manager link: {e}");
                return LinkFault::Transport(format!("read error: {e}"));
            }
        };
        pending.extend_from_slice(&chunk[..n]);

        loop {
            match decode_envelope(&pending) {
                Ok((envelope, consumed)) => {
                    pending.drain(..consumed);
                    sink.deliver(envelope);
                }
                Err(e) if is_incomplete(&e) => break,
                Err(e) => {
                    error!("corrupt frame from manager: {e}");
                    return LinkFault::Transport(format!("corrupt frame: {e}"));
                }
            }
        }
    }
}

/// Writes queued frames until stopped.  Returns a fault only on a write error.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    mut stop: oneshot::Receiver<()>,
) -> Option<LinkFault> {
    loop {
        tokio::select! {
            biased;
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = writer.write_all(&frame).await {
                    error!("write error on manager link: {e}");
                    return Some(LinkFault::Transport(format!("write error: {e}")));
                }
            }
            _ = &mut stop => {
                // Flush what was queued before close(), e.g. a shutdown notice.
                while let Ok(frame) = outbound.try_recv() {
                    if writer.write_all(&frame).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }
    let _ = writer.shutdown().await;
    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use cablink_core::CategoryId;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<Envelope>>,
        faults: Mutex<Vec<LinkFault>>,
    }

    impl InboundSink for RecordingSink {
        fn deliver(&self, envelope: Envelope) {
            lock(&self.delivered).push(envelope);
        }
        fn fault(&self, fault: LinkFault) {
            lock(&self.faults).push(fault);
        }
    }

    async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    async fn connected_pair() -> (Arc<TcpTransport>, Arc<RecordingSink>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let sink = Arc::new(RecordingSink::default());
        let client_sink = Arc::clone(&sink) as Arc<dyn InboundSink>;

        let connecting = tokio::task::spawn_blocking(move || {
            TcpTransport::connect(addr, client_sink, Duration::from_secs(2))
        });
        let (server, _) = listener.accept().await.expect("accept");
        let transport = tokio_test::assert_ok!(connecting.await.expect("join"));
        (transport, sink, server)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_inbound_frames_split_across_reads_are_reassembled() {
        // Arrange
        let (transport, sink, mut server) = connected_pair().await;
        let first = Envelope::event(CategoryId::BUTTON_PANEL, vec![1, 2, 3]);
        let second = Envelope::response(CategoryId::WINDOW_CONTROL, 7, vec![9]);
        let mut bytes = encode_envelope(&first).unwrap();
        bytes.extend(encode_envelope(&second).unwrap());

        // Act – deliver in two uneven pieces
        let (a, b) = bytes.split_at(5);
        server.write_all(a).await.unwrap();
        server.flush().await.unwrap();
        time::sleep(Duration::from_millis(20)).await;
        server.write_all(b).await.unwrap();

        // Assert
        assert!(eventually(|| lock(&sink.delivered).len() == 2).await);
        assert_eq!(*lock(&sink.delivered), vec![first, second]);
        assert!(lock(&sink.faults).is_empty());
        transport.close();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_send_writes_a_decodable_frame() {
        let (transport, _sink, mut server) = connected_pair().await;
        let envelope = Envelope::request(CategoryId::RESOURCE_MANAGEMENT, 3, vec![4, 5]);

        tokio_test::assert_ok!(transport.send(envelope.clone()));
        let mut buf = vec![0u8; encode_envelope(&envelope).unwrap().len()];
        server.read_exact(&mut buf).await.expect("read frame");

        let (decoded, _) = decode_envelope(&buf).expect("decode");
        assert_eq!(decoded, envelope);
        transport.close();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_peer_close_raises_one_fault() {
        let (transport, sink, server) = connected_pair().await;

        drop(server);

        assert!(eventually(|| !lock(&sink.faults).is_empty()).await);
        time::sleep(Duration::from_millis(20)).await;
        assert_eq!(lock(&sink.faults).len(), 1);
        assert!(matches!(lock(&sink.faults)[0], LinkFault::Transport(_)));
        transport.close();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_is_not_a_fault_and_rejects_later_sends() {
        let (transport, sink, _server) = connected_pair().await;

        let closer = Arc::clone(&transport);
        tokio::task::spawn_blocking(move || closer.close())
            .await
            .expect("close");

        assert!(lock(&sink.faults).is_empty());
        assert_eq!(
            transport.send(Envelope::event(CategoryId::CONNECTION, vec![1])),
            Err(TransportError::Closed)
        );
    }

    #[test]
    fn test_connect_refused_is_connect_error() {
        // Bind then drop to get a port nobody listens on.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .expect("probe port");
        let sink: Arc<dyn InboundSink> = Arc::new(RecordingSink::default());

        let result = TcpTransport::connect(addr, sink, Duration::from_secs(1));

        assert!(matches!(result, Err(TransportError::Connect(_))));
    }
}
