use super::{personalization_name, ViewCell};
use crate::config::TodoOptions;
use crate::subscriber::{MirrorEnvelope, Subscriber, SubscriberSettings};
use mirrorsense_events::{MirrorEvent, Personalization};
use mirrorsense_presence::TransitionKind;
use mirrorsense_profiles::{Capability, CapabilityData, CapabilityLookup};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum TodoView {
    #[default]
    Waiting,
    /// The person's profile turns the list off.
    Disabled { person: String },
    Items { person: String, items: Vec<String> },
}

/// Shows the recognized person's to-do list from their profile.
pub struct TodoWidget {
    id: String,
    settings: SubscriberSettings,
    options: TodoOptions,
    view: ViewCell<TodoView>,
}

impl TodoWidget {
    pub fn new(id: impl Into<String>, settings: SubscriberSettings, options: TodoOptions) -> Self {
        Self {
            id: id.into(),
            settings,
            options,
            view: ViewCell::new(TodoView::Waiting),
        }
    }

    pub fn watch(&self) -> watch::Receiver<TodoView> {
        self.view.watch()
    }

    fn render(&self, personalization: &Personalization) -> TodoView {
        let Some(person) = personalization_name(personalization) else {
            return TodoView::Waiting;
        };
        match personalization.capability(&Capability::Todo) {
            CapabilityLookup::Enabled(CapabilityData::Todo(todo)) => TodoView::Items {
                person,
                items: todo.list.iter().take(self.options.max_items).cloned().collect(),
            },
            _ => TodoView::Disabled { person },
        }
    }
}

impl Subscriber for TodoWidget {
    fn id(&self) -> &str {
        &self.id
    }

    fn settings(&self) -> SubscriberSettings {
        self.settings.clone()
    }

    /// Resuming starts from `Idle`, so nobody is in front of the mirror yet.
    fn stop(&mut self) {
        self.view.set(&self.id, TodoView::Waiting);
    }

    fn on_event(&mut self, envelope: &MirrorEnvelope) {
        let view = match &*envelope.payload {
            MirrorEvent::Transition(notice) => match (notice.event.kind, &notice.personalization) {
                (TransitionKind::IdentityChanged, Some(personalization)) => self.render(personalization),
                (TransitionKind::Departed | TransitionKind::TimeoutExpired, _) => TodoView::Waiting,
                _ => return,
            },
            MirrorEvent::ProfileRefreshed(refreshed) => self.render(&refreshed.personalization),
            _ => return,
        };
        self.view.set(&self.id, view);
    }
}
