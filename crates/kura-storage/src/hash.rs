use std::path::Path;

use md5::{Digest, Md5};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Transfers run through buffers of this size so memory use is independent
/// of object size.
pub(crate) const COPY_CHUNK_SIZE: usize = 8 * 1024;

/// Copies `reader` into `writer` while feeding `hasher`, returning the
/// number of bytes moved.
pub(crate) async fn append_hashed<R, W>(
    reader: &mut R,
    writer: &mut W,
    hasher: &mut Md5,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0_u8; COPY_CHUNK_SIZE];
    let mut copied = 0_u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n]).await?;
        copied += n as u64;
    }

    Ok(copied)
}

/// Copies `reader` into `writer`, returning byte count and hex MD5 digest.
pub(crate) async fn copy_hashed<R, W>(reader: &mut R, writer: &mut W) -> std::io::Result<(u64, String)>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin,
{
    let mut hasher = Md5::new();
    let copied = append_hashed(reader, writer, &mut hasher).await?;
    writer.flush().await?;
    Ok((copied, hex::encode(hasher.finalize())))
}

/// Streaming MD5 of a file's current bytes. ETags are derived from this on
/// every request rather than cached.
pub(crate) async fn md5_file(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buf = [0_u8; COPY_CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
