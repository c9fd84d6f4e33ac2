//! Dedicated writer task for high-throughput frame sending.
//!
//! Every connection of the frame transport owns one writer task that receives
//! frames via an mpsc channel, so request tasks never contend on the socket
//! and several ready frames go out in a single vectored write.
//!
//! # Architecture
//!
//! ```text
//! Request task 1 ─┐
//! Request task 2 ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Socket
//! Request task N ─┘
//! ```

use std::io::IoSlice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, XrpcError};
use crate::protocol::{Frame, HEADER_SIZE};

/// Default maximum pending frames before backpressure kicks in.
pub const DEFAULT_MAX_PENDING_FRAMES: usize = 1024;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default backpressure timeout.
pub const DEFAULT_BACKPRESSURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written to the socket.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded header (11 bytes).
    pub header: [u8; HEADER_SIZE],
    /// Action name bytes (empty on responses).
    pub action: Bytes,
    /// Payload bytes.
    pub payload: Bytes,
}

impl OutboundFrame {
    /// The three wire parts in order.
    #[inline]
    fn parts(&self) -> [&[u8]; 3] {
        [&self.header, &self.action, &self.payload]
    }

    /// Total size of this frame (header + action + payload).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.action.len() + self.payload.len()
    }
}

impl From<Frame> for OutboundFrame {
    fn from(frame: Frame) -> Self {
        Self {
            header: frame.header.encode(),
            action: frame.action,
            payload: frame.payload,
        }
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Maximum pending frames before backpressure kicks in.
    pub max_pending_frames: usize,
    /// Channel capacity for frame queue.
    pub channel_capacity: usize,
    /// Timeout when waiting for backpressure to clear.
    pub backpressure_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            backpressure_timeout: DEFAULT_BACKPRESSURE_TIMEOUT,
        }
    }
}

/// Handle for sending frames to the writer task.
///
/// Cheaply cloneable; one clone per request task.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
    pending: Arc<AtomicUsize>,
    max_pending: usize,
    timeout: Duration,
}

impl WriterHandle {
    fn new(
        tx: mpsc::Sender<OutboundFrame>,
        pending: Arc<AtomicUsize>,
        max_pending: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            tx,
            pending,
            max_pending,
            timeout,
        }
    }

    /// Send a frame to the writer task.
    ///
    /// Waits while backpressure is active, failing with
    /// [`XrpcError::BackpressureTimeout`] after the configured duration.
    pub async fn send(&self, frame: impl Into<OutboundFrame>) -> Result<()> {
        if self.pending.load(Ordering::Acquire) >= self.max_pending {
            self.wait_for_backpressure().await?;
        }

        // Count before sending so the writer never decrements below zero.
        self.pending.fetch_add(1, Ordering::AcqRel);

        self.tx.send(frame.into()).await.map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            XrpcError::ConnectionClosed
        })
    }

    async fn wait_for_backpressure(&self) -> Result<()> {
        let start = Instant::now();
        let check_interval = Duration::from_micros(100);

        loop {
            if self.pending.load(Ordering::Acquire) < self.max_pending {
                return Ok(());
            }

            if start.elapsed() > self.timeout {
                return Err(XrpcError::BackpressureTimeout);
            }

            tokio::time::sleep(check_interval).await;
        }
    }

    /// Check if backpressure is currently active.
    #[inline]
    pub fn is_backpressure_active(&self) -> bool {
        self.pending.load(Ordering::Acquire) >= self.max_pending
    }

    /// Get current pending frame count.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Whether the writer task has stopped.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Try to send a frame without waiting for backpressure.
    ///
    /// Returns `Err(BackpressureTimeout)` immediately if at capacity.
    pub fn try_send(&self, frame: impl Into<OutboundFrame>) -> Result<()> {
        if self.pending.load(Ordering::Acquire) >= self.max_pending {
            return Err(XrpcError::BackpressureTimeout);
        }

        self.pending.fetch_add(1, Ordering::AcqRel);

        self.tx.try_send(frame.into()).map_err(|e| {
            self.pending.fetch_sub(1, Ordering::Release);
            match e {
                mpsc::error::TrySendError::Full(_) => XrpcError::BackpressureTimeout,
                mpsc::error::TrySendError::Closed(_) => XrpcError::ConnectionClosed,
            }
        })
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task ends with `Ok(())` once every handle is dropped, or with the
/// first write error.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle::new(
        tx,
        pending.clone(),
        config.max_pending_frames,
        config.backpressure_timeout,
    );

    let task = tokio::spawn(writer_loop(rx, writer, pending));

    (handle, task)
}

async fn writer_loop<W>(
    mut rx: mpsc::Receiver<OutboundFrame>,
    mut writer: W,
    pending: Arc<AtomicUsize>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(f) => f,
            None => {
                let _ = writer.shutdown().await;
                return Ok(());
            }
        };

        // Collect additional ready frames (non-blocking)
        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        let batch_size = batch.len();
        write_batch(&mut writer, &batch).await?;

        pending.fetch_sub(batch_size, Ordering::Release);
    }
}

/// Write a batch of frames using scatter/gather I/O (write_vectored).
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let total_size: usize = batch.iter().map(|f| f.size()).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        if slices.is_empty() {
            break;
        }

        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )
            .into());
        }

        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for the data left after `skip_bytes` were written.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 3);
    let mut offset = 0;

    for frame in batch {
        for part in frame.parts() {
            if part.is_empty() {
                continue;
            }

            let end = offset + part.len();
            if skip_bytes < end {
                let start_in_part = skip_bytes.saturating_sub(offset);
                slices.push(IoSlice::new(&part[start_in_part..]));
            }
            offset = end;
        }
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameBuffer;
    use std::io::Cursor;
    use tokio::io::{duplex, AsyncReadExt};

    fn request(id: u32, action: &'static [u8], payload: &'static [u8]) -> OutboundFrame {
        Frame::request(id, Bytes::from_static(action), Bytes::from_static(payload))
            .unwrap()
            .into()
    }

    #[test]
    fn test_outbound_frame_size() {
        let frame = request(42, b"geo", b"hello");
        assert_eq!(frame.size(), HEADER_SIZE + 3 + 5);

        let frame: OutboundFrame = Frame::response(1, Bytes::new(), false).unwrap().into();
        assert_eq!(frame.size(), HEADER_SIZE);
    }

    #[test]
    fn test_writer_config_default() {
        let config = WriterConfig::default();
        assert_eq!(config.max_pending_frames, DEFAULT_MAX_PENDING_FRAMES);
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.backpressure_timeout, DEFAULT_BACKPRESSURE_TIMEOUT);
    }

    #[tokio::test]
    async fn test_writer_handle_send() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, WriterConfig::default());

        handle.send(request(42, b"geo", b"hello")).await.unwrap();
        assert!(!handle.is_backpressure_active());

        let mut buf = vec![0u8; HEADER_SIZE + 8];
        server.read_exact(&mut buf).await.unwrap();

        let frames = FrameBuffer::new().push(&buf).unwrap();
        assert_eq!(frames[0].action(), b"geo");
        assert_eq!(frames[0].payload(), b"hello");
    }

    #[tokio::test]
    async fn test_writer_batching() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, WriterConfig::default());

        for i in 0..10u32 {
            handle.send(request(i, b"a", b"abcd")).await.unwrap();
        }

        let expected_size = 10 * (HEADER_SIZE + 5);
        let mut buf = vec![0u8; expected_size];
        server.read_exact(&mut buf).await.unwrap();

        let frames = FrameBuffer::new().push(&buf).unwrap();
        let ids: Vec<u32> = frames.iter().map(|f| f.request_id()).collect();
        assert_eq!(ids, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_try_send_at_capacity() {
        let (tx, _rx) = mpsc::channel::<OutboundFrame>(10);
        let pending = Arc::new(AtomicUsize::new(100));

        let handle = WriterHandle::new(tx, pending, 100, Duration::from_secs(1));
        assert!(handle.is_backpressure_active());

        let result = handle.try_send(request(42, b"a", b""));
        assert!(matches!(result, Err(XrpcError::BackpressureTimeout)));
        assert_eq!(handle.pending_count(), 100);
    }

    #[tokio::test]
    async fn test_send_backpressure_timeout() {
        let (tx, _rx) = mpsc::channel::<OutboundFrame>(10);
        let pending = Arc::new(AtomicUsize::new(1));

        let handle = WriterHandle::new(tx, pending, 1, Duration::from_millis(10));

        let result = handle.send(request(42, b"a", b"")).await;
        assert!(matches!(result, Err(XrpcError::BackpressureTimeout)));
    }

    #[test]
    fn test_build_remaining_slices_no_skip() {
        let batch = vec![request(42, b"geo", b"hello")];
        let slices = build_remaining_slices(&batch, 0);
        assert_eq!(slices.len(), 3);
    }

    #[test]
    fn test_build_remaining_slices_partial_header() {
        let batch = vec![request(42, b"geo", b"hello")];

        let slices = build_remaining_slices(&batch, 5);
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[0].len(), HEADER_SIZE - 5);
        assert_eq!(slices[1].len(), 3);
    }

    #[test]
    fn test_build_remaining_slices_inside_action() {
        let batch = vec![request(42, b"geo", b"hello"), request(43, b"ip", b"")];

        let slices = build_remaining_slices(&batch, HEADER_SIZE + 1);
        let lens: Vec<usize> = slices.iter().map(|s| s.len()).collect();
        assert_eq!(lens, vec![2, 5, HEADER_SIZE, 2]);
    }

    #[tokio::test]
    async fn test_write_batch_multiple() {
        let mut buf = Cursor::new(Vec::new());

        let batch: Vec<_> = (0..5).map(|i| request(i, b"abc", b"xyz")).collect();
        write_batch(&mut buf, &batch).await.unwrap();

        assert_eq!(buf.into_inner().len(), 5 * (HEADER_SIZE + 6));
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (client, _server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default());

        drop(handle);

        let result = task.await.unwrap();
        assert!(result.is_ok());
    }
}
