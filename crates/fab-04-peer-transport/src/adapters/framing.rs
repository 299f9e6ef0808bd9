//! Length-prefixed frames.
//!
//! A frame is a big-endian `u32` length followed by that many bytes of
//! canonical bincode. The end of a stream at a frame boundary ends the RPC.

use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{decode, encode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::errors::{TransportError, TransportResult};

/// Largest accepted frame body.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Content download chunk size.
pub const CHUNK_SIZE: usize = 1024 * 1024;

pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> TransportResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize + ?Sized,
{
    let body = encode(value)?;
    if body.len() > MAX_FRAME_BYTES {
        return Err(TransportError::FrameTooLarge {
            size: body.len(),
            max: MAX_FRAME_BYTES,
        });
    }
    let len = (body.len() as u32).to_be_bytes();
    writer.write_all(&len).await.map_err(stream_error)?;
    writer.write_all(&body).await.map_err(stream_error)?;
    Ok(())
}

/// Reads the next frame, or `None` when the stream has ended.
pub async fn read_frame<R, T>(reader: &mut R, what: &'static str) -> TransportResult<Option<T>>
where
    R: AsyncRead + Unpin + ?Sized,
    T: DeserializeOwned,
{
    let mut len = [0u8; 4];
    let mut filled = 0;
    while filled < len.len() {
        let read = reader.read(&mut len[filled..]).await.map_err(stream_error)?;
        if read == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(TransportError::Stream(format!(
                "stream ended {filled} bytes into a frame header"
            )));
        }
        filled += read;
    }

    let size = u32::from_be_bytes(len) as usize;
    if size > MAX_FRAME_BYTES {
        return Err(TransportError::FrameTooLarge {
            size,
            max: MAX_FRAME_BYTES,
        });
    }
    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await.map_err(stream_error)?;
    Ok(Some(decode(what, &body)?))
}

fn stream_error(e: std::io::Error) -> TransportError {
    TransportError::Stream(e.to_string())
}
