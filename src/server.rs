use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::Instrument;

use crate::{config::ServerConfig, dispatcher::Dispatcher, error::Result, router::Router};

pub struct Server {
    config: ServerConfig,
    dispatcher: Dispatcher,
}

impl Server {
    pub fn new(config: ServerConfig, router: Router) -> Self {
        let dispatcher = Dispatcher::new(Arc::new(router), config.frame_limits());
        Server { config, dispatcher }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the configured address and serves until the process exits.
    pub async fn listen(&self) -> Result<()> {
        let address = self.config.address();
        let listener = TcpListener::bind(&address).await?;
        tracing::info!(address = %address, "Looplite server running");
        self.serve(listener).await
    }

    /// Accepts connections from `listener`, one task per connection.
    ///
    /// Each task is bounded by `connection_timeout`; when it expires the
    /// connection is dropped mid-request.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!(error = %e, "Connection failed");
                    continue;
                }
            };

            let dispatcher = self.dispatcher.clone();
            let timeout = self.config.connection_timeout;
            let span = tracing::info_span!("connection", peer = %peer);

            tokio::spawn(
                async move {
                    match tokio::time::timeout(timeout, dispatcher.handle(stream)).await {
                        Ok(Ok(())) => tracing::trace!("Connection closed"),
                        Ok(Err(e)) => tracing::debug!(error = %e, "Connection ended with error"),
                        Err(_) => tracing::warn!(?timeout, "Connection timed out"),
                    }
                }
                .instrument(span),
            );
        }
    }
}
