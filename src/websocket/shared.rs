use std::net::TcpStream;
use crate::error::S9Result;
use super::frame::Frame;
use super::options::ClientOptions;

// ============================================================================
// Shared Internal Helpers
// ============================================================================

/// Applies socket options after connect.
///
/// The read timeout is the watcher's poll interval: reads wake up periodically so queued
/// messages and close requests are serviced while the peer is silent.
pub(crate) fn configure_stream(stream: &TcpStream, options: &ClientOptions) -> S9Result<()> {
    if let Some(nodelay) = options.nodelay {
        stream.set_nodelay(nodelay)?;
    }
    if let Some(ttl) = options.ttl {
        stream.set_ttl(ttl)?;
    }
    stream.set_read_timeout(Some(options.poll_interval))?;

    Ok(())
}

/// First line of an HTTP response, for log messages.
pub(crate) fn status_line(response: &[u8]) -> String {
    let text = String::from_utf8_lossy(response);
    text.lines().next().unwrap_or_default().trim().to_string()
}

/// Traces connection establishment
pub(crate) fn trace_on_connected(response: &[u8]) {
    if tracing::enabled!(tracing::Level::TRACE) {
        let text = String::from_utf8_lossy(response);
        tracing::trace!("Connected to the server");
        tracing::trace!("Response status: {}", status_line(response));
        tracing::trace!("Response contains the following headers:");
        for header in text.lines().skip(1).take_while(|line| !line.is_empty()) {
            if let Some((name, _value)) = header.split_once(':') {
                tracing::trace!("* {}", name);
            }
        }
    }
}

/// Traces frame receipt
#[inline]
pub(crate) fn trace_on_frame(frame: &Frame) {
    if tracing::enabled!(tracing::Level::TRACE) {
        tracing::trace!(
            "Received frame fin={} opcode={:#x} masked={} len={}",
            frame.fin, frame.opcode, frame.masked, frame.payload.len()
        );
    }
}

/// Traces text message receipt
#[inline]
pub(crate) fn trace_on_text_message(message: &str) {
    if tracing::enabled!(tracing::Level::TRACE) {
        tracing::trace!("Received text message: {}", message);
    }
}

/// Traces text message send
#[inline]
pub(crate) fn trace_on_sent(message: &str) {
    if tracing::enabled!(tracing::Level::TRACE) {
        tracing::trace!("Sent text message: {}", message);
    }
}
