// src/exec/capture.rs

//! Output capture for a single execution.
//!
//! Every byte a stream executor writes lands in a [`CaptureBuffer`], whether
//! or not the caller also attached a live sink. A [`LiveSink`] only ever
//! receives copies.
//!
//! ```text
//!   stream executor ──▶ OutputSink ──┬──▶ CaptureBuffer (always)
//!                                    └──▶ LiveSink (optional, mpsc)
//! ```

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

/// Shared byte buffer that can be read while it is still being written.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, chunk: &[u8]) {
        self.lock().extend_from_slice(chunk);
    }

    /// Everything captured so far, decoded as (lossy) UTF-8.
    pub fn snapshot(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable sending half of a live output stream.
///
/// Non-blocking; if the receiver is gone, chunks are silently discarded.
#[derive(Debug, Clone)]
pub struct LiveSink {
    sender: mpsc::UnboundedSender<Vec<u8>>,
}

/// Receiving half of a live output stream.
#[derive(Debug)]
pub struct LiveReceiver {
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Create a live sink pair.
pub fn live_sink() -> (LiveSink, LiveReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (LiveSink { sender }, LiveReceiver { receiver })
}

impl LiveSink {
    pub fn send(&self, chunk: &[u8]) {
        if !chunk.is_empty() {
            let _ = self.sender.send(chunk.to_vec());
        }
    }
}

impl LiveReceiver {
    /// Next chunk, or `None` once every sender is dropped.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.receiver.recv().await
    }

    /// All pending chunks concatenated. Never waits.
    pub fn drain(&mut self) -> Vec<u8> {
        let mut buf = Vec::new();
        while let Ok(chunk) = self.receiver.try_recv() {
            buf.extend_from_slice(&chunk);
        }
        buf
    }

    pub fn drain_string(&mut self) -> String {
        String::from_utf8_lossy(&self.drain()).into_owned()
    }
}

/// Where a stream executor writes one of the command's output streams.
#[derive(Debug, Clone)]
pub struct OutputSink {
    capture: CaptureBuffer,
    live: Option<LiveSink>,
}

impl OutputSink {
    pub fn new(capture: CaptureBuffer, live: Option<LiveSink>) -> Self {
        Self { capture, live }
    }

    /// A sink with a fresh buffer and no live copy.
    pub fn detached() -> Self {
        Self::new(CaptureBuffer::new(), None)
    }

    pub fn write(&self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.capture.append(chunk);
        if let Some(live) = &self.live {
            live.send(chunk);
        }
    }

    pub fn write_str(&self, s: &str) {
        self.write(s.as_bytes());
    }

    pub fn captured(&self) -> &CaptureBuffer {
        &self.capture
    }
}

impl AsyncWrite for OutputSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.write(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
