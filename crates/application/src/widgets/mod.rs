//! Built-in widgets.
//!
//! Every widget is a [`Subscriber`] that folds events into a view and
//! publishes it on a `watch` channel. Renderers hold the receiver.

mod calendar;
mod forwarder;
mod greeting;
mod overlay;
mod personal;
mod todo;

pub use calendar::{CalendarView, CalendarWidget};
pub use forwarder::EventForwarder;
pub use greeting::{GreetingView, GreetingWidget};
pub use overlay::{OverlayState, OverlayView, OverlayWidget};
pub use personal::{PersonalView, PersonalWidget};
pub use todo::{TodoView, TodoWidget};

use crate::config::{WidgetConfig, WidgetOptions};
use crate::subscriber::Subscriber;
use mirrorsense_events::{Personalization, TransitionNotice};
use std::fmt::Debug;
use tokio::sync::watch;

/// Build the widget described by `config`, the `index`th in the list.
pub fn build_widget(config: &WidgetConfig, index: usize) -> Box<dyn Subscriber> {
    let id = config.id(index);
    let settings = config.subscriber_settings();
    match &config.options {
        WidgetOptions::Greeting(options) => Box::new(GreetingWidget::new(id, settings, options.clone())),
        WidgetOptions::Overlay(options) => Box::new(OverlayWidget::new(id, settings, options.clone())),
        WidgetOptions::Todo(options) => Box::new(TodoWidget::new(id, settings, options.clone())),
        WidgetOptions::Calendar(options) => Box::new(CalendarWidget::new(id, settings, options.clone())),
        WidgetOptions::PersonalApi(options) => Box::new(PersonalWidget::new(id, settings, options.clone())),
    }
}

/// Latest view of one widget.
pub(crate) struct ViewCell<V> {
    tx: watch::Sender<V>,
}

impl<V: Debug + PartialEq> ViewCell<V> {
    pub fn new(initial: V) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn watch(&self) -> watch::Receiver<V> {
        self.tx.subscribe()
    }

    /// Replace the view, notifying receivers only if it changed.
    pub fn set(&self, widget: &str, view: V) {
        self.tx.send_if_modified(|current| {
            if *current == view {
                return false;
            }
            tracing::debug!(widget, view = ?view, "View updated");
            *current = view;
            true
        });
    }

    /// Edit a copy of the current view and store it.
    pub fn modify(&self, widget: &str, f: impl FnOnce(&mut V))
    where
        V: Clone,
    {
        let mut next = self.tx.borrow().clone();
        f(&mut next);
        self.set(widget, next);
    }
}

/// Name to show for the person in `notice`.
pub(crate) fn display_name(personalization: Option<&Personalization>, notice: &TransitionNotice) -> Option<String> {
    personalization
        .and_then(|p| p.display_name.clone())
        .or_else(|| notice.event.person.as_ref().map(|p| p.name().to_string()))
}

/// Name to show for a resolved personalization.
pub(crate) fn personalization_name(personalization: &Personalization) -> Option<String> {
    personalization
        .display_name
        .clone()
        .or_else(|| personalization.person.as_ref().map(|p| p.name().to_string()))
}

#[cfg(test)]
pub(crate) mod tests_support {
    use crate::subscriber::MirrorEnvelope;
    use chrono::Utc;
    use mirrorsense_bus::Envelope;
    use mirrorsense_events::{MirrorEvent, Personalization, StatusEvent, TransitionNotice};
    use mirrorsense_presence::{Identity, TransitionEvent, TransitionKind};
    use mirrorsense_profiles::{Capability, ProfileSource, ProfileTable};
    use std::sync::Arc;

    pub fn envelope(event: MirrorEvent) -> MirrorEnvelope {
        Envelope {
            seq: 1,
            origin: Some(Arc::from("greeting")),
            ts_ms: 0,
            payload: Arc::new(event),
        }
    }

    pub fn status(distance: f64, person: Option<&str>, active: bool) -> MirrorEvent {
        MirrorEvent::Status(StatusEvent {
            distance,
            person: person.map(str::to_string),
            active,
            timestamp: Utc::now(),
        })
    }

    fn notice(kind: TransitionKind, person: Option<&str>, personalization: Option<Personalization>) -> MirrorEvent {
        MirrorEvent::Transition(TransitionNotice {
            event: TransitionEvent {
                kind,
                person: Identity::parse(person),
                distance: 10.0,
                at: Utc::now(),
            },
            personalization,
        })
    }

    pub fn transition(kind: TransitionKind, person: Option<&str>) -> MirrorEvent {
        notice(kind, person, None)
    }

    pub fn identity_changed(name: &str, display_name: Option<&str>) -> MirrorEvent {
        let personalization = Personalization {
            person: Identity::parse(Some(name)),
            profile: ProfileSource::Empty,
            display_name: display_name.map(str::to_string),
            capabilities: Default::default(),
        };
        notice(TransitionKind::IdentityChanged, Some(name), Some(personalization))
    }

    pub fn personalized(table: &ProfileTable, name: &str, capabilities: &[Capability]) -> MirrorEvent {
        let identity = Identity::parse(Some(name));
        let personalization = Personalization::resolve(table, identity.as_ref(), capabilities);
        notice(TransitionKind::IdentityChanged, Some(name), Some(personalization))
    }
}
