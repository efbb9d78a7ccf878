use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use crossbeam_channel::{Receiver, TryRecvError};
use crate::error::{S9Result, S9WebSocketError};
use super::client::Shared;
use super::frame;
use super::handshake;
use super::shared;
use super::transport::Transport;
use super::types::{ConnectionState, ServerAddress};

// ============================================================================
// Watcher - handshake and receive loop for one connection
// ============================================================================

pub(crate) struct WatchContext {
    pub(crate) address: ServerAddress,
    pub(crate) outbound: Receiver<String>,
    pub(crate) stop: Receiver<()>,
    pub(crate) shared: Arc<Shared>,
    pub(crate) handshake_buffer_size: usize,
    pub(crate) max_frame_size: usize,
}

/// Runs on the watcher thread until the connection fails or a close is requested.
///
/// Always ends with the transport shut down, the state set to `Closed` and the close
/// callback invoked once.
pub(crate) fn watch(mut transport: Box<dyn Transport>, ctx: WatchContext) {
    if tracing::enabled!(tracing::Level::DEBUG) {
        tracing::debug!("Starting watcher for {}", ctx.address);
    }

    // A panicking message callback must still end in Closed.
    let result = panic::catch_unwind(AssertUnwindSafe(|| run(transport.as_mut(), &ctx)));

    let reason = match result {
        Ok(Ok(())) | Ok(Err(S9WebSocketError::ConnectionClosed(None))) => {
            ctx.shared.info("connection closed");
            None
        },
        Ok(Err(e)) => {
            ctx.shared.error(&format!("connection lost: {}", e));
            Some(e.to_string())
        },
        Err(payload) => {
            let reason = format!("watcher panicked: {}", panic_message(payload.as_ref()));
            ctx.shared.error(&reason);
            Some(reason)
        }
    };

    if let Err(e) = transport.shutdown() {
        ctx.shared.debug(&format!("unable to shutdown stream: {}", e));
    }

    ctx.shared.set_state(ConnectionState::Closed);
    ctx.shared.notify_closed(reason);
}

fn run(transport: &mut dyn Transport, ctx: &WatchContext) -> S9Result<()> {
    let request = handshake::build_request(&ctx.address, &handshake::generate_nonce());
    ctx.shared.debug("sending handshake request");

    let mut pump = Pump::new(transport, ctx);
    pump.send_all(request.as_bytes()).map_err(|e| {
        ctx.shared.error(&format!("unable to send handshake request: {}", e));
        e
    })?;

    let mut buffer = vec![0u8; ctx.handshake_buffer_size];
    let usable = buffer.len() - 1;
    let mut received = 0;
    let mut head = None;
    while head.is_none() && received < usable {
        let n = pump.receive(&mut buffer[received..usable]).map_err(|e| {
            ctx.shared.error(&format!("unable to receive handshake response: {}", e));
            e
        })?;
        if n == 0 {
            break;
        }
        received += n;
        head = handshake::header_len(&buffer[..received]);
    }
    let response = &buffer[..received];

    if let Err(e) = handshake::validate_response(response) {
        ctx.shared.error("handshake did NOT succeed...");
        return Err(e);
    }
    let head = match head {
        Some(head) => head,
        None => {
            ctx.shared.error("handshake did NOT succeed...");
            return Err(S9WebSocketError::HandshakeRejected(
                format!("response head not terminated within {} bytes", received)
            ));
        }
    };
    shared::trace_on_connected(response);
    pump.carry(&response[head..]);

    ctx.shared.set_state(ConnectionState::Connected);
    ctx.shared.info("handshake complete; watching for messages...");
    pump.start_flushing();

    loop {
        let frame = frame::read_frame(&mut pump, ctx.max_frame_size)?;
        shared::trace_on_frame(&frame);

        let message = frame.into_text();
        shared::trace_on_text_message(&message);
        ctx.shared.deliver(message);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

// ============================================================================
// Pump - Transport adapter that services the outbound queue between reads
// ============================================================================

/// Wraps the connection's transport for the watcher.
///
/// Every read first checks the stop signal and, once flushing started, sends all queued
/// messages in order. Poll timeouts from the socket are swallowed and the read retried,
/// so callers see a plain blocking stream.
struct Pump<'a> {
    transport: &'a mut dyn Transport,
    ctx: &'a WatchContext,
    carry: Vec<u8>,
    carry_pos: usize,
    flushing: bool,
}

impl<'a> Pump<'a> {
    fn new(transport: &'a mut dyn Transport, ctx: &'a WatchContext) -> Self {
        Pump {
            transport,
            ctx,
            carry: Vec::new(),
            carry_pos: 0,
            flushing: false,
        }
    }

    /// Bytes that arrived with the handshake response and must be read before the socket.
    fn carry(&mut self, bytes: &[u8]) {
        self.carry = bytes.to_vec();
        self.carry_pos = 0;
    }

    fn start_flushing(&mut self) {
        self.flushing = true;
    }

    /// Flushes before checking the stop signal, so messages sent ahead of a close go out.
    fn service(&mut self) -> S9Result<()> {
        if self.flushing {
            while let Ok(message) = self.ctx.outbound.try_recv() {
                let frame = frame::encode_text_frame(&message);
                match self.transport.send_all(&frame) {
                    Ok(_) => shared::trace_on_sent(&message),
                    Err(e) => self.ctx.shared.error(&format!("unable to send message frame: {}", e)),
                }
            }
        }

        match self.ctx.stop.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => Err(S9WebSocketError::ConnectionClosed(None)),
            Err(TryRecvError::Empty) => Ok(()),
        }
    }
}

impl Transport for Pump<'_> {
    fn send(&mut self, data: &[u8]) -> S9Result<usize> {
        self.transport.send(data)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> S9Result<usize> {
        if self.carry_pos < self.carry.len() {
            let n = buffer.len().min(self.carry.len() - self.carry_pos);
            buffer[..n].copy_from_slice(&self.carry[self.carry_pos..self.carry_pos + n]);
            self.carry_pos += n;
            return Ok(n);
        }

        loop {
            self.service()?;
            match self.transport.receive(buffer) {
                Err(e) if e.is_poll_timeout() => continue,
                other => return other,
            }
        }
    }

    fn shutdown(&mut self) -> S9Result<()> {
        self.transport.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::{bounded, unbounded};
    use parking_lot::Mutex;
    use super::super::client::Shared;
    use super::super::frame::{encode_frame, read_frame, OPCODE_TEXT};
    use super::super::transport::mock::MockTransport;
    use super::*;

    fn context() -> (WatchContext, crossbeam_channel::Sender<String>, crossbeam_channel::Sender<()>) {
        let (outbound_tx, outbound) = unbounded();
        let (stop_tx, stop) = bounded(1);
        let ctx = WatchContext {
            address: ServerAddress::new("localhost", 80, false),
            outbound,
            stop,
            shared: Arc::new(Shared::new()),
            handshake_buffer_size: 4096,
            max_frame_size: 1 << 20,
        };
        (ctx, outbound_tx, stop_tx)
    }

    #[test]
    fn rejected_handshake_closes_once_without_messages() {
        let (ctx, _outbound_tx, _stop_tx) = context();
        let messages = Arc::new(Mutex::new(Vec::<String>::new()));
        let closes = Arc::new(Mutex::new(Vec::<Option<String>>::new()));
        {
            let messages = messages.clone();
            ctx.shared.set_message_callback(Arc::new(move |m: String| messages.lock().push(m)));
            let closes = closes.clone();
            ctx.shared.set_close_callback(Arc::new(move |r: Option<String>| closes.lock().push(r)));
        }
        let shared = ctx.shared.clone();

        let mock = MockTransport::new(b"HTTP/1.1 404 Not Found\r\n\r\n", 64);
        watch(Box::new(mock), ctx);

        assert!(messages.lock().is_empty());
        let closes = closes.lock();
        assert_eq!(closes.len(), 1);
        assert!(closes[0].as_deref().unwrap_or_default().contains("404"));
        assert_eq!(shared.state(), ConnectionState::Closed);
    }

    #[test]
    fn frames_after_handshake_reach_message_callback() {
        let (ctx, _outbound_tx, _stop_tx) = context();
        let messages = Arc::new(Mutex::new(Vec::<String>::new()));
        {
            let messages = messages.clone();
            ctx.shared.set_message_callback(Arc::new(move |m: String| messages.lock().push(m)));
        }

        let mut wire = b"HTTP/1.1 101 Switching Protocols\r\n\r\n".to_vec();
        wire.extend_from_slice(&[0x81, 0x03, b'o', b'n', b'e']);
        wire.extend_from_slice(&[0x81, 0x03, b't', b'w', b'o']);
        // one chunk, so the frames arrive together with the handshake response
        watch(Box::new(MockTransport::new(&wire, 4096)), ctx);

        assert_eq!(*messages.lock(), vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn queued_messages_flush_in_order_after_handshake() {
        let (ctx, outbound_tx, _stop_tx) = context();
        for text in ["first", "second", "third"] {
            outbound_tx.send(text.to_string()).unwrap();
        }

        let mut mock = MockTransport::new(b"HTTP/1.1 101 Switching Protocols\r\n\r\n", 4096);
        let mut pump = Pump::new(&mut mock, &ctx);
        pump.start_flushing();
        pump.service().unwrap();
        drop(pump);

        let mut peer = MockTransport::new(&mock.sent, 4096);
        for expected in ["first", "second", "third"] {
            let frame = read_frame(&mut peer, 1 << 20).unwrap();
            assert!(frame.masked);
            assert_eq!(frame.into_text(), expected);
        }
        assert!(peer.incoming.is_empty());
    }

    #[test]
    fn queue_is_held_until_flushing_starts() {
        let (ctx, outbound_tx, _stop_tx) = context();
        outbound_tx.send("early".to_string()).unwrap();

        let mut mock = MockTransport::new(&[], 1);
        let mut pump = Pump::new(&mut mock, &ctx);
        pump.service().unwrap();
        drop(pump);

        assert!(mock.sent.is_empty());
        assert_eq!(ctx.outbound.len(), 1);
    }

    #[test]
    fn stop_signal_ends_the_read() {
        let (ctx, _outbound_tx, stop_tx) = context();
        stop_tx.send(()).unwrap();

        let mut mock = MockTransport::new(&encode_frame(OPCODE_TEXT, b"x", [1, 2, 3, 4]), 64);
        let mut pump = Pump::new(&mut mock, &ctx);
        let mut buffer = [0u8; 2];
        // stop is checked before the socket is touched
        assert!(matches!(pump.receive(&mut buffer), Err(S9WebSocketError::ConnectionClosed(None))));
    }

    #[test]
    fn carried_bytes_are_read_first() {
        let (ctx, _outbound_tx, _stop_tx) = context();
        let mut mock = MockTransport::new(b"cd", 64);
        let mut pump = Pump::new(&mut mock, &ctx);
        pump.carry(b"ab");

        let mut buffer = [0u8; 4];
        pump.receive_exact(&mut buffer).unwrap();
        assert_eq!(&buffer, b"abcd");
    }

    fn record_closes(ctx: &WatchContext) -> Arc<Mutex<Vec<Option<String>>>> {
        let closes = Arc::new(Mutex::new(Vec::<Option<String>>::new()));
        let sink = closes.clone();
        ctx.shared.set_close_callback(Arc::new(move |r: Option<String>| sink.lock().push(r)));
        closes
    }

    #[test]
    fn response_head_split_over_reads_is_reassembled() {
        let (ctx, _outbound_tx, _stop_tx) = context();
        let messages = Arc::new(Mutex::new(Vec::<String>::new()));
        {
            let messages = messages.clone();
            ctx.shared.set_message_callback(Arc::new(move |m: String| messages.lock().push(m)));
        }

        let mut wire = b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n".to_vec();
        wire.extend_from_slice(&[0x81, 0x02, b'o', b'k']);
        watch(Box::new(MockTransport::new(&wire, 5)), ctx);

        assert_eq!(*messages.lock(), vec!["ok".to_string()]);
    }

    #[test]
    fn unterminated_response_head_is_rejected() {
        let (ctx, _outbound_tx, _stop_tx) = context();
        let closes = record_closes(&ctx);
        let shared = ctx.shared.clone();

        watch(Box::new(MockTransport::new(b"HTTP/1.1 101 Switching Protocols\r\nUpgr", 8)), ctx);

        let closes = closes.lock();
        assert_eq!(closes.len(), 1);
        assert!(closes[0].as_deref().unwrap_or_default().contains("not terminated"));
        assert_eq!(shared.state(), ConnectionState::Closed);
    }

    #[test]
    fn oversized_frame_closes_the_connection() {
        let (ctx, _outbound_tx, _stop_tx) = context();
        let closes = record_closes(&ctx);
        let shared = ctx.shared.clone();

        let mut wire = b"HTTP/1.1 101 Switching Protocols\r\n\r\n".to_vec();
        wire.extend_from_slice(&[0x81, 0x7F]);
        wire.extend_from_slice(&u64::MAX.to_be_bytes());
        watch(Box::new(MockTransport::new(&wire, 4096)), ctx);

        let closes = closes.lock();
        assert_eq!(closes.len(), 1);
        assert!(closes[0].as_deref().unwrap_or_default().contains("exceeds limit"));
        assert_eq!(shared.state(), ConnectionState::Closed);
    }

    #[test]
    fn panicking_message_callback_still_closes() {
        let (ctx, _outbound_tx, _stop_tx) = context();
        ctx.shared.set_message_callback(Arc::new(|_m: String| panic!("callback exploded")));
        let closes = record_closes(&ctx);
        let shared = ctx.shared.clone();

        let mut wire = b"HTTP/1.1 101 Switching Protocols\r\n\r\n".to_vec();
        wire.extend_from_slice(&[0x81, 0x01, b'x']);
        watch(Box::new(MockTransport::new(&wire, 4096)), ctx);

        let closes = closes.lock();
        assert_eq!(closes.len(), 1);
        assert!(closes[0].as_deref().unwrap_or_default().contains("callback exploded"));
        assert_eq!(shared.state(), ConnectionState::Closed);
    }
}
