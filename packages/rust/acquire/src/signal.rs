//! External interrupt listener.
//!
//! Listeners are registered synchronously by [`ShutdownSignal::install`], so a
//! signal delivered before anything awaits them is queued rather than lost.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Ctrl-C and (on unix) SIGTERM listeners.
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: Option<tokio::signal::unix::Signal>,
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
    #[cfg(windows)]
    ctrl_c: Option<tokio::signal::windows::CtrlC>,
}

impl ShutdownSignal {
    /// Register the listeners. Must be called inside a tokio runtime.
    pub fn install() -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            Self {
                interrupt: listen("SIGINT", signal(SignalKind::interrupt())),
                terminate: listen("SIGTERM", signal(SignalKind::terminate())),
            }
        }

        #[cfg(windows)]
        {
            Self {
                ctrl_c: listen("Ctrl-C", tokio::signal::windows::ctrl_c()),
            }
        }
    }

    /// Resolve on the first delivered signal.
    ///
    /// If no listener could be installed this never resolves, so a broken
    /// signal setup cannot masquerade as an interrupt.
    pub async fn recv(mut self) {
        #[cfg(unix)]
        tokio::select! {
            Some(()) = next(&mut self.interrupt) => info!("received interrupt"),
            Some(()) = next(&mut self.terminate) => info!("received SIGTERM"),
            else => std::future::pending::<()>().await,
        }

        #[cfg(windows)]
        match self.ctrl_c.as_mut() {
            Some(stream) if stream.recv().await.is_some() => info!("received interrupt"),
            _ => std::future::pending::<()>().await,
        }
    }

    /// A token cancelled by the first delivered signal.
    pub fn into_token(self) -> CancellationToken {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            self.recv().await;
            trigger.cancel();
        });
        token
    }
}

fn listen<T>(name: &str, installed: std::io::Result<T>) -> Option<T> {
    match installed {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!(signal = name, error = %e, "cannot listen for signal");
            None
        }
    }
}

#[cfg(unix)]
async fn next(stream: &mut Option<tokio::signal::unix::Signal>) -> Option<()> {
    match stream {
        Some(stream) => stream.recv().await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
