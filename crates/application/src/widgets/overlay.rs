use super::ViewCell;
use crate::config::OverlayOptions;
use crate::subscriber::{MirrorEnvelope, Subscriber, SubscriberSettings};
use mirrorsense_events::{MirrorEvent, StatusEvent};
use mirrorsense_presence::{Identity, UNKNOWN_PERSON};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayState {
    Waiting,
    Detecting,
    Recognized,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayView {
    pub state: OverlayState,
    pub text: String,
}

/// Live face-recognition status line, driven by raw status changes.
pub struct OverlayWidget {
    id: String,
    settings: SubscriberSettings,
    options: OverlayOptions,
    view: ViewCell<OverlayView>,
}

impl OverlayWidget {
    pub fn new(id: impl Into<String>, settings: SubscriberSettings, options: OverlayOptions) -> Self {
        let view = ViewCell::new(OverlayView {
            state: OverlayState::Waiting,
            text: options.waiting.clone(),
        });
        Self {
            id: id.into(),
            settings,
            options,
            view,
        }
    }

    pub fn watch(&self) -> watch::Receiver<OverlayView> {
        self.view.watch()
    }

    fn render(&self, status: &StatusEvent) -> OverlayView {
        if !status.active {
            return OverlayView {
                state: OverlayState::Waiting,
                text: self.options.waiting.clone(),
            };
        }
        let person = status.person.as_deref();
        if person.is_some_and(|p| p.eq_ignore_ascii_case(UNKNOWN_PERSON)) {
            return OverlayView {
                state: OverlayState::Unknown,
                text: self.options.unknown.clone(),
            };
        }
        match Identity::parse(person) {
            Some(identity) => OverlayView {
                state: OverlayState::Recognized,
                text: self.options.recognized.replace("{name}", identity.name()),
            },
            None => OverlayView {
                state: OverlayState::Detecting,
                text: self.options.detecting.clone(),
            },
        }
    }
}

impl Subscriber for OverlayWidget {
    fn id(&self) -> &str {
        &self.id
    }

    fn settings(&self) -> SubscriberSettings {
        self.settings.clone()
    }

    fn stop(&mut self) {
        self.view.set(
            &self.id,
            OverlayView {
                state: OverlayState::Waiting,
                text: self.options.waiting.clone(),
            },
        );
    }

    fn on_event(&mut self, envelope: &MirrorEnvelope) {
        if let MirrorEvent::Status(status) = &*envelope.payload {
            let view = self.render(status);
            self.view.set(&self.id, view);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::tests_support::{envelope, status};

    #[test]
    fn test_states_follow_status() {
        let mut w = OverlayWidget::new("overlay", SubscriberSettings::default(), OverlayOptions::default());
        let rx = w.watch();
        assert_eq!(rx.borrow().state, OverlayState::Waiting);

        w.on_event(&envelope(status(15.0, None, true)));
        assert_eq!(rx.borrow().state, OverlayState::Detecting);

        w.on_event(&envelope(status(15.0, Some("unknown"), true)));
        assert_eq!(rx.borrow().state, OverlayState::Unknown);

        w.on_event(&envelope(status(15.0, Some("Andii"), true)));
        assert_eq!(
            *rx.borrow(),
            OverlayView {
                state: OverlayState::Recognized,
                text: "Hello Andii".to_string()
            }
        );

        w.on_event(&envelope(status(999.0, None, false)));
        assert_eq!(rx.borrow().text, "Waiting for face recognition...");
    }
}
