//! JSON-lines TCP server
//!
//! Each connection is one session: handles created over a connection are
//! only visible to it and are released when it closes. Requests on one
//! connection are served in order.

use std::future::Future;
use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use veneer_executor::Executor;

use crate::envelope::{decode_request, encode_response, Response};

/// Accept connections until `shutdown` completes.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    executor: Executor,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    info!(addr = %listener.local_addr()?, "Listening");
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let executor = executor.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer, executor).await {
                        warn!(%peer, error = %e, "Connection ended with error");
                    }
                });
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

/// Accept connections forever.
pub async fn serve(listener: TcpListener, executor: Executor) -> std::io::Result<()> {
    serve_with_shutdown(listener, executor, std::future::pending()).await
}

/// Serve one connection as one session.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    executor: Executor,
) -> std::io::Result<()> {
    let session = executor.begin_session();
    debug!(%peer, session = session.id(), "Connection accepted");
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match decode_request(&line) {
            Ok(request) => match executor.execute(&session, request.command).await {
                Ok(output) => Response::success(&request.id, output),
                Err(e) => {
                    error!(%peer, id = %request.id, code = e.code(), error = %e, "Request fault");
                    Response::fault(&request.id, &e)
                }
            },
            Err((id, fault)) => {
                warn!(%peer, id = %id, error = %fault.message, "Malformed request");
                Response::error(&id, fault)
            }
        };
        let mut encoded = encode_response(&response)?;
        encoded.push('\n');
        write.write_all(encoded.as_bytes()).await?;
        write.flush().await?;
    }

    debug!(%peer, session = session.id(), "Connection closed");
    Ok(())
}
