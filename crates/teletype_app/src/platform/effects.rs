use std::io::{self, Write};

use teletype_core::{Effect, Msg};
use teletype_engine::{EngineEvent, NavigatorHandle};
use teletype_logging::{reveal_debug, reveal_info};

use super::history::History;
use super::render::Renderer;

/// Carries controller effects out to the background navigator.
pub(crate) struct EffectRunner {
    engine: NavigatorHandle,
    pending_loads: usize,
}

impl EffectRunner {
    pub(crate) fn new(engine: NavigatorHandle) -> Self {
        Self {
            engine,
            pending_loads: 0,
        }
    }

    pub(crate) fn enqueue<W: Write>(
        &mut self,
        effects: Vec<Effect>,
        history: &mut History,
        renderer: &mut Renderer<W>,
    ) -> io::Result<()> {
        for effect in effects {
            match effect {
                Effect::Navigate { id, url } => {
                    reveal_info!("Navigate id={} url={}", id, url);
                    self.engine.navigate(id, url);
                }
                Effect::CancelNavigation { id } => {
                    reveal_debug!("CancelNavigation id={}", id);
                    self.engine.cancel(id);
                }
                Effect::PushHistory { url } => history.push(url),
                Effect::FullNavigation { url } => {
                    self.pending_loads += 1;
                    self.engine.full_load(url);
                }
                Effect::DefaultAction { href, reason } => {
                    renderer.message(&format!("not intercepted ({reason:?}): {href}"))?;
                }
                Effect::SetSound { enabled } => self.engine.set_sound(enabled),
                Effect::ResumeAudio => self.engine.user_gesture(),
            }
        }
        Ok(())
    }

    pub(crate) fn try_recv(&mut self) -> Option<EngineEvent> {
        let event = self.engine.try_recv()?;
        if matches!(
            event,
            EngineEvent::PageLoaded { .. }
                | EngineEvent::LoadFailed { .. }
                | EngineEvent::LoadSuperseded { .. }
        ) {
            self.pending_loads = self.pending_loads.saturating_sub(1);
        }
        Some(event)
    }

    /// Full loads requested but not yet answered.
    pub(crate) fn pending_loads(&self) -> usize {
        self.pending_loads
    }
}

/// The controller message an engine event maps to, if any.
pub(crate) fn event_to_msg(event: &EngineEvent) -> Option<Msg> {
    match event {
        EngineEvent::Progress { id, phase } => Some(Msg::NavigationProgress {
            id: *id,
            phase: *phase,
        }),
        EngineEvent::Revealed { id } => Some(Msg::NavigationRevealed { id: *id }),
        EngineEvent::FellBack { id, reason, .. } => Some(Msg::NavigationFellBack {
            id: *id,
            reason: reason.clone(),
        }),
        EngineEvent::PageLoaded { url, .. } => Some(Msg::PageLoaded { url: url.clone() }),
        EngineEvent::Reveal { .. }
        | EngineEvent::Cancelled { .. }
        | EngineEvent::LoadFailed { .. }
        | EngineEvent::LoadSuperseded { .. }
        | EngineEvent::PageSnapshot(_) => None,
    }
}
