//! 🔌 Writers: the devices at the bottom of the funnel.
//!
//! 🚰 Producers pour, the funnel narrows, and exactly one consumer task pours the result
//! into a [`Writer`]. Stdout, a file, a Vec in RAM, a disk that is pretending to be full.
//! The funnel does not care which. It only knows how to call `write` and `close`.
//!
//! 🧠 Knowledge graph:
//! - Pattern: trait → concrete impls (Stdout, File, InMemory, FlakyDevice) → `WriterBackend` enum
//! - Writers are touched by ONE task only (the consumer). Hence `&mut self`, hence no locks.
//! - A writer may block forever or error forever. The funnel survives both. That's the whole point.
//! - A write may be cancelled halfway (write timeout, grace shutdown). Byte-stream writers go
//!   through [`write_line`] so a half-written line never swallows the next one.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};

mod file;
mod flaky;
mod in_mem;
mod stdout;

pub use file::{FileWriter, FileWriterConfig};
pub use flaky::{DeviceHealth, DeviceSwitch, FlakyDevice};
pub use in_mem::InMemoryWriter;
pub use stdout::StdoutWriter;

/// 📝 The write capability: take some bytes, report how it went.
///
/// # Contract
/// - `write` accepts one framed payload (a message plus its trailing newline).
///   It may take forever. It may fail. Neither is the producer's problem.
/// - `close` flushes and finalizes. Called once, by the consumer, after the queue drains
///   (or after a grace shutdown cut the drain short). Defaults to a no-op.
/// - The future returned by `write` may be dropped before it finishes. Whatever part of
///   the payload already went out stays out; see [`write_line`] for cleaning that up.
#[async_trait]
pub trait Writer: Send + std::fmt::Debug {
    /// 📡 Push one payload at the device.
    async fn write(&mut self, payload: &[u8]) -> Result<()>;

    /// 🗑️ Flush, finalize, release.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<W: Writer + ?Sized> Writer for Box<W> {
    async fn write(&mut self, payload: &[u8]) -> Result<()> {
        (**self).write(payload).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

/// ✂️ Write one framed line into a byte stream, keeping track of torn lines.
///
/// `torn` is true while a line is partly written. If the future gets dropped right then
/// (a write timeout, a grace shutdown), it stays true, and the next call first ends the
/// fragment with a newline. The fragment ends up as its own short line instead of being
/// glued to the front of the next one.
pub(crate) async fn write_line<T>(out: &mut T, torn: &mut bool, payload: &[u8]) -> io::Result<()>
where
    T: AsyncWrite + Unpin + Send,
{
    if *torn {
        out.write_all(b"\n").await?;
        *torn = false;
    }
    let mut rest = payload;
    while !rest.is_empty() {
        let written = out.write(rest).await?;
        if written == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        rest = &rest[written..];
        *torn = !rest.is_empty();
    }
    Ok(())
}

/// 🎭 The many faces of a device, picked by config instead of by generics.
///
/// Keeps the demo driver blissfully ignorant of where the bytes land.
#[derive(Debug)]
pub enum WriterBackend {
    Stdout(StdoutWriter),
    File(FileWriter),
    InMemory(InMemoryWriter),
}

#[async_trait]
impl Writer for WriterBackend {
    async fn write(&mut self, payload: &[u8]) -> Result<()> {
        match self {
            WriterBackend::Stdout(writer) => writer.write(payload).await,
            WriterBackend::File(writer) => writer.write(payload).await,
            WriterBackend::InMemory(writer) => writer.write(payload).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            WriterBackend::Stdout(writer) => writer.close().await,
            WriterBackend::File(writer) => writer.close().await,
            WriterBackend::InMemory(writer) => writer.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use super::*;

    /// Takes `budget` bytes, then stops answering. A pipe whose reader wandered off mid-line.
    #[derive(Debug, Default)]
    struct TrickleThenStall {
        out: Vec<u8>,
        budget: usize,
    }

    impl AsyncWrite for TrickleThenStall {
        fn poll_write(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            if self.budget == 0 {
                return Poll::Pending;
            }
            let taken = buf.len().min(self.budget);
            self.budget -= taken;
            self.out.extend_from_slice(&buf[..taken]);
            Poll::Ready(Ok(taken))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn the_one_where_a_cut_off_line_does_not_eat_the_next_one() -> Result<()> {
        let mut pipe = TrickleThenStall {
            budget: 4,
            ..TrickleThenStall::default()
        };
        let mut torn = false;

        let the_cut = tokio::time::timeout(
            Duration::from_millis(20),
            write_line(&mut pipe, &mut torn, b"0: log data\n"),
        )
        .await;
        assert!(the_cut.is_err(), "the write should have been cut off");
        assert!(torn, "half a line went out, that's a torn line");

        pipe.budget = usize::MAX;
        write_line(&mut pipe, &mut torn, b"1: log data\n").await?;

        assert_eq!(pipe.out, b"0: l\n1: log data\n");
        assert!(!torn);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_write_cut_off_before_any_bytes_leaves_no_scar() -> Result<()> {
        let mut pipe = TrickleThenStall::default();
        let mut torn = false;

        let the_cut = tokio::time::timeout(
            Duration::from_millis(20),
            write_line(&mut pipe, &mut torn, b"never sent\n"),
        )
        .await;
        assert!(the_cut.is_err());
        assert!(!torn, "nothing went out, nothing to repair");

        pipe.budget = usize::MAX;
        write_line(&mut pipe, &mut torn, b"clean\n").await?;
        assert_eq!(pipe.out, b"clean\n");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_backend_enum_forwards_like_a_good_receptionist() -> Result<()> {
        let in_mem = InMemoryWriter::new();
        let mut backend = WriterBackend::InMemory(in_mem.clone());

        backend.write(b"hello\n").await?;
        backend.close().await?;

        assert_eq!(in_mem.lines().await, vec!["hello".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_boxed_writer_is_still_a_writer() -> Result<()> {
        let in_mem = InMemoryWriter::new();
        let mut boxed: Box<dyn Writer> = Box::new(in_mem.clone());

        boxed.write(b"boxed\n").await?;

        assert_eq!(in_mem.lines().await, vec!["boxed".to_string()]);
        Ok(())
    }
}
