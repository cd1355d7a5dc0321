use std::sync::mpsc::Receiver;

use tracing::debug;

use super::EventStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    PinCode,
    Home,
    ShowDetails(i64),
    EpisodeDetails(i64),
}

impl Destination {
    pub fn route(&self) -> String {
        match self {
            Self::PinCode => "pin_code".to_string(),
            Self::Home => "home".to_string(),
            Self::ShowDetails(id) => format!("show_details/{id}"),
            Self::EpisodeDetails(id) => format!("episode_details/{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationEvent {
    To(Destination),
    Back,
    Quit,
}

#[derive(Clone, Default)]
pub struct Navigator {
    events: EventStream<NavigationEvent>,
}

impl Navigator {
    pub fn navigate_to(&self, event: NavigationEvent) {
        match event {
            NavigationEvent::To(destination) => debug!(route = %destination.route(), "navigate"),
            other => debug!(?other, "navigate"),
        }
        self.events.emit(event);
    }

    pub fn subscribe(&self) -> Receiver<NavigationEvent> {
        self.events.subscribe()
    }
}
