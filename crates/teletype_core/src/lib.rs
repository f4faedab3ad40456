//! Teletype core: pure navigation-controller state machine and view-model helpers.
mod effect;
mod link;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use link::{classify_click, LinkClick, LinkDecision, Modifiers, MouseButton, PassReason};
pub use msg::Msg;
pub use state::{ControllerState, InFlight, NavigationId, NavigationMode, NavigationState, Phase};
pub use update::update;
pub use view_model::{ControllerView, SoundToggleView, SOUND_TOGGLE_ID};
