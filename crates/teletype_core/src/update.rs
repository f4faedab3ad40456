use url::Url;

use crate::{
    classify_click, ControllerState, Effect, LinkDecision, Msg, NavigationMode, PassReason, Phase,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: ControllerState, msg: Msg) -> (ControllerState, Vec<Effect>) {
    let effects = match msg {
        Msg::PageLoaded { url } => {
            state.commit_full_load(url);
            if state.in_flight().is_none() {
                state.set_phase(Phase::Idle);
            }
            Vec::new()
        }
        Msg::OpenRequested { url } => start(&mut state, url, NavigationMode::Push),
        Msg::LinkActivated(click) => {
            let decision = match state.navigation().current_url().map(Url::parse) {
                Some(Ok(current)) => classify_click(&click, &current),
                _ => LinkDecision::PassThrough(PassReason::InvalidHref),
            };
            match decision {
                LinkDecision::Intercept(url) => start(&mut state, url.into(), NavigationMode::Push),
                LinkDecision::PassThrough(reason) => vec![Effect::DefaultAction {
                    href: click.href,
                    reason,
                }],
            }
        }
        Msg::HistoryPopped { url } => start(&mut state, url, NavigationMode::Replay),
        Msg::NavigationProgress { id, phase } => {
            // Messages from a fenced navigation are stale and must not move state.
            let Some(flight) = state.current(id).cloned() else {
                return (state, Vec::new());
            };
            state.set_phase(phase);
            if phase == Phase::Revealing {
                state.commit_progressive(flight.url.clone());
                if flight.mode == NavigationMode::Push {
                    return (state, vec![Effect::PushHistory { url: flight.url }]);
                }
            }
            Vec::new()
        }
        Msg::NavigationRevealed { id } => {
            if state.current(id).is_some() {
                state.finish(Phase::Idle);
            }
            Vec::new()
        }
        Msg::NavigationFellBack { id, .. } => {
            if state.current(id).is_none() {
                return (state, Vec::new());
            }
            match state.finish(Phase::Fallback) {
                Some(flight) => vec![Effect::FullNavigation { url: flight.url }],
                None => Vec::new(),
            }
        }
        Msg::SoundPreferenceLoaded(enabled) => {
            state.set_sound_enabled(enabled);
            vec![Effect::SetSound { enabled }]
        }
        Msg::SoundToggled => {
            let enabled = !state.sound_enabled();
            state.set_sound_enabled(enabled);
            vec![Effect::SetSound { enabled }]
        }
        Msg::UserGesture => {
            if state.sound_enabled() {
                vec![Effect::ResumeAudio]
            } else {
                Vec::new()
            }
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn start(state: &mut ControllerState, url: String, mode: NavigationMode) -> Vec<Effect> {
    let (id, previous) = state.begin(url.clone(), mode);
    let mut effects = Vec::with_capacity(2);
    if let Some(previous) = previous {
        effects.push(Effect::CancelNavigation { id: previous.id });
    }
    effects.push(Effect::Navigate { id, url });
    effects
}
