use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::create_app;
use crate::modules::transcode::progress::ProgressState;
use crate::state::AppState;

pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The status service running in the background for the lifetime of a job.
pub struct StatusServer {
    local_addr: SocketAddr,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl StatusServer {
    /// Binds and starts serving right away, so callers can poll before the
    /// job has fetched anything.
    pub async fn start(addr: SocketAddr, progress: ProgressState) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let app = create_app(AppState::new(progress));

        let token = CancellationToken::new();
        let signal = token.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(signal.cancelled_owned())
                .await
            {
                warn!("Status service stopped with error: {}", e);
            }
        });

        info!("📡 Status service listening on http://{}", local_addr);

        Ok(Self {
            local_addr,
            token,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn shutdown(self) {
        self.shutdown_within(SHUTDOWN_GRACE).await
    }

    /// Stops accepting requests and waits up to `grace` for the serve loop
    /// to wind down, aborting it after that. Never fails.
    pub async fn shutdown_within(self, grace: Duration) {
        self.token.cancel();
        let abort = self.handle.abort_handle();

        match tokio::time::timeout(grace, self.handle).await {
            Ok(Ok(())) => info!("Status service stopped"),
            Ok(Err(e)) => warn!("Status service task ended abnormally: {}", e),
            Err(_) => {
                warn!("Status service did not stop within {:?}, aborting", grace);
                abort.abort();
            }
        }
    }
}
