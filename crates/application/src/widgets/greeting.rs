use super::{display_name, ViewCell};
use crate::config::GreetingOptions;
use crate::subscriber::{MirrorEnvelope, Subscriber, SubscriberSettings};
use mirrorsense_events::{MirrorEvent, StatusEvent, TransitionNotice};
use mirrorsense_presence::{Identity, TransitionKind, UNKNOWN_PERSON};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GreetingView {
    pub person: Option<String>,
    /// `None` while nothing is shown.
    pub text: Option<String>,
}

/// Greets the recognized person, then clears after the greeting timer.
pub struct GreetingWidget {
    id: String,
    settings: SubscriberSettings,
    options: GreetingOptions,
    view: ViewCell<GreetingView>,
}

impl GreetingWidget {
    pub fn new(id: impl Into<String>, settings: SubscriberSettings, options: GreetingOptions) -> Self {
        Self {
            id: id.into(),
            settings,
            options,
            view: ViewCell::new(GreetingView::default()),
        }
    }

    pub fn watch(&self) -> watch::Receiver<GreetingView> {
        self.view.watch()
    }

    fn template_for(&self, person: Option<&Identity>) -> &str {
        person
            .and_then(|person| {
                self.options
                    .people
                    .iter()
                    .find(|(label, _)| person.matches(label))
                    .map(|(_, template)| template.as_str())
            })
            .unwrap_or(&self.options.default)
    }

    fn on_transition(&self, notice: &TransitionNotice) {
        match notice.event.kind {
            TransitionKind::IdentityChanged => {
                let name = display_name(notice.personalization.as_ref(), notice).unwrap_or_default();
                let text = self
                    .template_for(notice.event.person.as_ref())
                    .replace("{name}", &name);
                self.view.set(
                    &self.id,
                    GreetingView {
                        person: notice.event.person.as_ref().map(|p| p.name().to_string()),
                        text: Some(text),
                    },
                );
            }
            TransitionKind::Departed | TransitionKind::TimeoutExpired => {
                self.view.set(&self.id, GreetingView::default());
            }
            TransitionKind::Arrived => {}
        }
    }

    fn on_status(&self, status: &StatusEvent) {
        let Some(unknown) = &self.options.unknown else {
            return;
        };
        let unknown_face = status.active
            && status
                .person
                .as_deref()
                .is_some_and(|p| p.eq_ignore_ascii_case(UNKNOWN_PERSON));
        self.view.modify(&self.id, |view| {
            if view.person.is_some() {
                return;
            }
            if unknown_face {
                view.text = Some(unknown.clone());
            } else if view.text.as_ref() == Some(unknown) {
                view.text = None;
            }
        });
    }
}

impl Subscriber for GreetingWidget {
    fn id(&self) -> &str {
        &self.id
    }

    fn settings(&self) -> SubscriberSettings {
        self.settings.clone()
    }

    /// Resuming starts from `Idle`, so nobody is in front of the mirror yet.
    fn stop(&mut self) {
        self.view.set(&self.id, GreetingView::default());
    }

    fn on_event(&mut self, envelope: &MirrorEnvelope) {
        match &*envelope.payload {
            MirrorEvent::Transition(notice) => self.on_transition(notice),
            MirrorEvent::Status(status) => self.on_status(status),
            MirrorEvent::GreetingCleared(_) => self.view.modify(&self.id, |view| view.text = None),
            _ => {}
        }
    }
}
