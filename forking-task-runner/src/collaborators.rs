use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

/// Uploads a finished task's combined log to durable storage. Out of scope for this crate: the
/// embedder owns the object-store (or whatever) client.
pub trait TaskLogPusher: Send + Sync {
    fn push_task_log(&self, id: String, file: PathBuf) -> BoxFuture<'static, anyhow::Result<()>>;
}

/// A log pusher that does nothing but note that it was asked to. Useful for embedding
/// applications (or tests) that don't need durable log archival.
pub struct NoopTaskLogPusher;

impl TaskLogPusher for NoopTaskLogPusher {
    fn push_task_log(&self, id: String, file: PathBuf) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(async move {
            tracing::debug!(task_id = %id, file = %file.display(), "no-op log push");
            Ok(())
        })
    }
}

/// Produces a lazy byte stream over a file, used by `streamTaskLog`. A negative `offset` means
/// "the last `-offset` bytes".
pub trait LogUtils: Send + Sync {
    fn stream_file(&self, path: &Path, offset: i64) -> BoxStream<'static, std::io::Result<Bytes>>;
}

/// Reads the requested range (or tail) of a file in one chunk. Good enough for an in-process
/// embedder; a production log viewer would tail-follow instead.
pub struct FileLogUtils;

impl LogUtils for FileLogUtils {
    fn stream_file(&self, path: &Path, offset: i64) -> BoxStream<'static, std::io::Result<Bytes>> {
        let path = path.to_path_buf();
        Box::pin(futures::stream::once(async move {
            read_range(&path, offset).await
        }))
    }
}

async fn read_range(path: &Path, offset: i64) -> std::io::Result<Bytes> {
    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    let mut file = tokio::fs::File::open(path).await?;
    if offset < 0 {
        let len = file.metadata().await?.len();
        let tail = offset.unsigned_abs().min(len);
        file.seek(std::io::SeekFrom::End(-(tail as i64))).await?;
    } else {
        file.seek(std::io::SeekFrom::Start(offset as u64)).await?;
    }
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).await?;
    Ok(Bytes::from(buf))
}
