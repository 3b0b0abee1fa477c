//! Background tasks reading from the server process

use std::sync::Arc;

use futures::StreamExt;
use lean_protocol::ClientCodec;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::codec::FramedRead;

use super::state::Shared;

/// Read server lines until the stream ends or a line fails to decode
///
/// A line that cannot be decoded leaves the stream untrustworthy, so the
/// loop stops and every outstanding request fails with that fault.
pub(crate) async fn receive_loop<R>(mut reader: FramedRead<R, ClientCodec>, shared: Arc<Shared>)
where
    R: AsyncRead + Unpin,
{
    let fault = loop {
        match reader.next().await {
            Some(Ok(response)) => {
                tracing::debug!(
                    response = response.type_name(),
                    seq_num = ?response.seq_num(),
                    "Received from server"
                );
                if let Err(e) = shared.dispatch(response) {
                    tracing::error!(error = %e, "Reply does not match any request");
                }
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Failed to decode server output");
                break Some(e.to_string());
            }
            None => {
                tracing::info!("Lean server closed its output");
                break None;
            }
        }
    };

    shared.close(fault);
}

/// Forward each stderr line of the server to the log
pub(crate) async fn forward_stderr<R>(stderr: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::warn!(target: "lean_server", "{}", line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Stopped reading server stderr");
                break;
            }
        }
    }
}
