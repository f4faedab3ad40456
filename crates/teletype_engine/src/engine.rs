use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use teletype_core::NavigationId;
use tokio_util::sync::CancellationToken;

use crate::fetch::ChannelProgressSink;
use crate::navigator::{NavigationOutcome, Navigator};
use crate::EngineEvent;

enum NavigatorCommand {
    Navigate { id: NavigationId, url: String },
    Cancel { id: NavigationId },
    FullLoad { url: String },
    SetSound { enabled: bool },
    UserGesture,
}

/// The one page-owning task. Starting a navigation or a full load cancels
/// whatever held the page before; the old task stops at its next
/// suspension point.
#[derive(Default)]
struct Fence {
    current: Option<(Option<NavigationId>, CancellationToken)>,
}

impl Fence {
    fn replace(&mut self, id: Option<NavigationId>) -> CancellationToken {
        if let Some((_, token)) = self.current.take() {
            token.cancel();
        }
        let token = CancellationToken::new();
        self.current = Some((id, token.clone()));
        token
    }

    /// Cancels navigation `id` if it still owns the page.
    fn cancel(&self, id: NavigationId) {
        if let Some((_, token)) = self.current.as_ref().filter(|(cur, _)| *cur == Some(id)) {
            token.cancel();
        }
    }
}

/// Runs a [`Navigator`] on its own thread and tokio runtime.
///
/// Commands go in through plain method calls; results come back as
/// [`EngineEvent`]s polled with [`NavigatorHandle::try_recv`].
pub struct NavigatorHandle {
    cmd_tx: mpsc::Sender<NavigatorCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl NavigatorHandle {
    pub fn new(navigator: Navigator) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let navigator = Arc::new(navigator);

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            let mut fence = Fence::default();
            while let Ok(command) = cmd_rx.recv() {
                let navigator = navigator.clone();
                let sink = ChannelProgressSink::new(event_tx.clone());
                match command {
                    NavigatorCommand::Navigate { id, url } => {
                        let token = fence.replace(Some(id));
                        runtime.spawn(async move {
                            let outcome = navigator.navigate(id, &url, &sink, &token).await;
                            if let NavigationOutcome::Revealed { notices, .. } = outcome {
                                navigator.dismiss_notices(notices, &token).await;
                            }
                        });
                    }
                    NavigatorCommand::Cancel { id } => fence.cancel(id),
                    NavigatorCommand::FullLoad { url } => {
                        let token = fence.replace(None);
                        runtime.spawn(async move {
                            let notices = navigator.full_load(&url, &sink, &token).await;
                            navigator.dismiss_notices(notices, &token).await;
                        });
                    }
                    NavigatorCommand::SetSound { enabled } => {
                        runtime.spawn(async move {
                            navigator.set_sound(enabled, &sink).await;
                        });
                    }
                    NavigatorCommand::UserGesture => navigator.user_gesture(),
                }
            }
        });

        Self { cmd_tx, event_rx }
    }

    pub fn navigate(&self, id: NavigationId, url: impl Into<String>) {
        let _ = self.cmd_tx.send(NavigatorCommand::Navigate {
            id,
            url: url.into(),
        });
    }

    pub fn cancel(&self, id: NavigationId) {
        let _ = self.cmd_tx.send(NavigatorCommand::Cancel { id });
    }

    pub fn full_load(&self, url: impl Into<String>) {
        let _ = self.cmd_tx.send(NavigatorCommand::FullLoad { url: url.into() });
    }

    pub fn set_sound(&self, enabled: bool) {
        let _ = self.cmd_tx.send(NavigatorCommand::SetSound { enabled });
    }

    pub fn user_gesture(&self) {
        let _ = self.cmd_tx.send(NavigatorCommand::UserGesture);
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}
