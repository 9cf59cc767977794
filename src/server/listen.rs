use super::{engine::ProtocolEngine, session::SessionManager, shutdown};
use std::sync::Arc;
use tokio::net::TcpListener;

// Accepts control connections and hands each to the engine on its own task, until shutdown is
// signalled. The listening socket is dropped when this returns.
pub(crate) async fn accept_loop(
    listener: TcpListener,
    engine: Arc<dyn ProtocolEngine>,
    sessions: SessionManager,
    mut shutdown: shutdown::Listener,
    logger: slog::Logger,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    let session = sessions.connected(remote);
                    let engine = engine.clone();
                    tokio::spawn(async move {
                        let logger = session.logger().clone();
                        if let Err(err) = engine.serve(stream, session).await {
                            slog::warn!(logger, "Session ended with error: {}", err; "error" => ?err);
                        }
                    });
                }
                Err(err) => slog::error!(logger, "Error accepting incoming control connection: {}", err),
            },
            _ = shutdown.listen() => {
                slog::info!(logger, "Accept loop stopping");
                break;
            }
        }
    }
    drop(listener);
    // The shutdown listener goes last so that linger only returns once the socket is closed.
    drop(shutdown);
}
