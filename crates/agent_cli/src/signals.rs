use std::sync::Arc;

use agent_stream::ChatSession;

/// Stops the active stream on Ctrl-C. With no stream active the process exits.
#[cfg(unix)]
pub struct InterruptGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl InterruptGuard {
    pub fn install(session: Arc<ChatSession>) -> std::io::Result<Self> {
        use signal_hook::consts::SIGINT;
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([SIGINT])?;
        let handle = signals.handle();
        let thread = std::thread::Builder::new()
            .name("agent-stream-sigint".to_string())
            .spawn(move || {
                for _ in signals.forever() {
                    if !session.stop() {
                        std::process::exit(130);
                    }
                    tracing::info!("interrupt received; stream stopped");
                }
            })?;

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(not(unix))]
pub struct InterruptGuard;

#[cfg(not(unix))]
impl InterruptGuard {
    pub fn install(_session: Arc<ChatSession>) -> std::io::Result<Self> {
        Ok(Self)
    }
}
