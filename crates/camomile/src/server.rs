//! Server façade: binds a listener and drives one [`HttpConnection`] per
//! accepted socket through a [`ProxyHandler`] (`spec.md` §4.7/§9).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use camomile_http::connection::HttpConnection;

use crate::config::Config;
use crate::fetch::Fetcher;
use crate::handler::ProxyHandler;

/// Lifecycle events a caller can subscribe to via [`ServerHandle::subscribe`].
#[derive(Debug, Clone)]
pub enum Lifecycle {
    Listening(SocketAddr),
    Closed,
    Error(String),
}

/// A running server. Dropping this does not stop the server; cancel the
/// `Config`'s `shutdown` token (or send `ctrl_c`) instead.
pub struct ServerHandle {
    local_addr: SocketAddr,
    events: broadcast::Sender<Lifecycle>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Lifecycle> {
        self.events.subscribe()
    }
}

/// Binds `config.bind` and serves the proxy pipeline until `ctrl_c` fires or
/// `config.shutdown` is cancelled. Each accepted connection is handled on its
/// own task, mirroring the teacher's `Server::start` accept loop.
pub async fn serve(config: Config) -> std::io::Result<ServerHandle> {
    let tcp_listener = TcpListener::bind(&config.bind).await?;
    let local_addr = tcp_listener.local_addr()?;

    let (events, _) = broadcast::channel(16);
    let events_for_task = events.clone();
    let shutdown = config.shutdown.clone();

    let fetcher = Fetcher::with_allow_private(config.connect_timeout, config.total_timeout, config.allow_private_targets).map_err(std::io::Error::other)?;
    let handler = Arc::new(ProxyHandler::with_allow_private(
        config.secret.clone(),
        config.max_size,
        config.server_name.clone(),
        fetcher,
        config.allow_private_targets,
    ));

    info!(%local_addr, "listening");
    let _ = events_for_task.send(Lifecycle::Listening(local_addr));

    tokio::spawn(accept_loop(tcp_listener, handler, shutdown, events_for_task));

    Ok(ServerHandle { local_addr, events })
}

async fn accept_loop(
    listener: TcpListener,
    handler: Arc<ProxyHandler>,
    shutdown: CancellationToken,
    events: broadcast::Sender<Lifecycle>,
) {
    loop {
        let (stream, _remote_addr) = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received ctrl-c, shutting down");
                shutdown.cancel();
                break;
            }
            _ = shutdown.cancelled() => {
                info!("shutdown requested, shutting down");
                break;
            }
            result = listener.accept() => {
                match result {
                    Ok(stream_and_addr) => stream_and_addr,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept connection");
                        let _ = events.send(Lifecycle::Error(e.to_string()));
                        continue;
                    }
                }
            }
        };

        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(e) = stream.set_nodelay(true) {
                warn!(cause = %e, "failed to set TCP_NODELAY");
            }
            let (reader, writer) = stream.into_split();
            let connection = HttpConnection::new(reader, writer);
            match connection.process(handler).await {
                Ok(()) => info!("connection closed"),
                Err(e) => error!(cause = %e, "connection error"),
            }
        });
    }

    let _ = events.send(Lifecycle::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serve_binds_an_ephemeral_port_and_reports_it() {
        let config = Config::builder().secret(b"topsecret".to_vec()).bind("127.0.0.1:0").build().unwrap();
        let shutdown = config.shutdown.clone();
        let handle = serve(config).await.unwrap();

        assert_eq!(handle.local_addr().ip().to_string(), "127.0.0.1");
        assert_ne!(handle.local_addr().port(), 0);

        let mut events = handle.subscribe();
        assert!(matches!(events.recv().await.unwrap(), Lifecycle::Listening(_)));

        shutdown.cancel();
    }
}
