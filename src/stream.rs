//! Response body streaming for file responses.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::{io, mem};

use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use pin_project::pin_project;
use tokio::io::ReadBuf;

use crate::AsyncSeekStart;

const IO_BUFFER_SIZE: usize = 64 * 1024;

/// Streams a span of a reader as a response body.
///
/// Seeks to the start position, then reads in bounded chunks. With a
/// `limit`, exactly that many bytes are produced; without one, the
/// reader is drained to end of stream. The transport polls the stream
/// chunk by chunk, so a disconnected client simply stops the copy — the
/// partially written response is abandoned, never reported as an error.
#[pin_project]
pub struct FileByteStream<R> {
    state: StreamState,
    remaining: Option<u64>,
    #[pin]
    reader: R,
}

#[derive(Debug)]
enum StreamState {
    Seek { start: u64 },
    Seeking,
    Reading { buffer: BytesMut },
}

impl<R: AsyncSeekStart> FileByteStream<R> {
    /// Stream `limit` bytes starting at `start`, or everything from
    /// `start` to end of stream when `limit` is `None`.
    pub fn new(reader: R, start: u64, limit: Option<u64>) -> Self {
        FileByteStream {
            state: StreamState::Seek { start },
            remaining: limit,
            reader,
        }
    }
}

impl<R: tokio::io::AsyncRead + AsyncSeekStart + Send + 'static> IntoResponse for FileByteStream<R> {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}

impl<R: tokio::io::AsyncRead + AsyncSeekStart> Body for FileByteStream<R> {
    type Data = Bytes;
    type Error = io::Error;

    fn size_hint(&self) -> SizeHint {
        match self.remaining {
            Some(remaining) => SizeHint::with_exact(remaining),
            None => SizeHint::default(),
        }
    }

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<io::Result<Frame<Bytes>>>> {
        self.poll_next(cx)
            .map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<R: tokio::io::AsyncRead + AsyncSeekStart> Stream for FileByteStream<R> {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<io::Result<Bytes>>> {
        let mut this = self.project();

        if let StreamState::Seek { start } = *this.state {
            match this.reader.as_mut().start_seek(start) {
                Err(e) => return Poll::Ready(Some(Err(e))),
                Ok(()) => {
                    *this.state = StreamState::Seeking;
                }
            }
        }

        if let StreamState::Seeking = this.state {
            match this.reader.as_mut().poll_complete(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(Ok(())) => {
                    *this.state = StreamState::Reading { buffer: allocate_buffer() };
                }
            }
        }

        if let StreamState::Reading { buffer } = this.state {
            if *this.remaining == Some(0) {
                return Poll::Ready(None);
            }

            let uninit = buffer.spare_capacity_mut();

            // read no more than the buffer size and the bytes still owed
            let nbytes = std::cmp::min(
                uninit.len(),
                this.remaining.map_or(usize::MAX, |remaining| {
                    usize::try_from(remaining).unwrap_or(usize::MAX)
                }),
            );

            let mut read_buf = ReadBuf::uninit(&mut uninit[0..nbytes]);

            match this.reader.as_mut().poll_read(cx, &mut read_buf) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(Err(e)) => Poll::Ready(Some(Err(e))),
                Poll::Ready(Ok(())) => match read_buf.filled().len() {
                    0 => {
                        if let Some(remaining) = *this.remaining {
                            // The source ended before the promised span was
                            // delivered. Erroring here makes the transport
                            // abort the exchange instead of completing a
                            // truncated response with a success status.
                            return Poll::Ready(Some(Err(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                format!("source ended with {remaining} bytes left to send"),
                            ))));
                        }
                        Poll::Ready(None)
                    }
                    n => {
                        // SAFETY: poll_read filled `n` additional bytes
                        // starting at the buffer's current length.
                        unsafe { buffer.set_len(buffer.len() + n) };

                        let chunk = mem::replace(buffer, allocate_buffer());

                        if let Some(remaining) = this.remaining.as_mut() {
                            // n <= remaining due to the cmp::min above
                            *remaining -= n as u64;
                        }

                        Poll::Ready(Some(Ok(chunk.freeze())))
                    }
                },
            }
        } else {
            unreachable!();
        }
    }
}

fn allocate_buffer() -> BytesMut {
    BytesMut::with_capacity(IO_BUFFER_SIZE)
}

/// Adapts a forward-only reader to [`AsyncSeekStart`].
///
/// Seeking anywhere but the current start is an error, which is exactly
/// the capability an unknown-length stream response needs: such
/// responses never enable range processing, so the only seek ever issued
/// is the no-op to position zero.
#[pin_project]
pub struct NoSeek<R> {
    #[pin]
    reader: R,
}

impl<R> NoSeek<R> {
    pub fn new(reader: R) -> Self {
        NoSeek { reader }
    }
}

impl<R: tokio::io::AsyncRead> tokio::io::AsyncRead for NoSeek<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.project().reader.poll_read(cx, buf)
    }
}

impl<R> AsyncSeekStart for NoSeek<R> {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        if position == 0 {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "this stream does not support seeking",
            ))
        }
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
