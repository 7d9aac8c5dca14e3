use super::ViewCell;
use crate::config::PersonalApiOptions;
use crate::subscriber::{MirrorEnvelope, Subscriber, SubscriberSettings};
use mirrorsense_events::{MirrorEvent, PersonalDataset, PersonalEvent, PersonalList};
use mirrorsense_presence::{Identity, TransitionKind};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalView {
    /// At least one fetch has succeeded.
    pub loaded: bool,
    /// Last fetch error, cleared by the next success.
    pub error: Option<String>,
    pub person: Option<String>,
    pub events: Vec<PersonalEvent>,
    pub lists: Vec<PersonalList>,
}

/// Events and lists from the personal API for whoever is in front of the mirror.
pub struct PersonalWidget {
    id: String,
    settings: SubscriberSettings,
    options: PersonalApiOptions,
    dataset: Option<PersonalDataset>,
    error: Option<String>,
    person: Option<Identity>,
    view: ViewCell<PersonalView>,
}

impl PersonalWidget {
    pub fn new(id: impl Into<String>, settings: SubscriberSettings, options: PersonalApiOptions) -> Self {
        Self {
            id: id.into(),
            settings,
            options,
            dataset: None,
            error: None,
            person: None,
            view: ViewCell::new(PersonalView::default()),
        }
    }

    pub fn watch(&self) -> watch::Receiver<PersonalView> {
        self.view.watch()
    }

    fn render(&self) -> PersonalView {
        let mut view = PersonalView {
            loaded: self.dataset.is_some(),
            error: self.error.clone(),
            person: self.person.as_ref().map(|p| p.name().to_string()),
            ..PersonalView::default()
        };

        let user = match (&self.dataset, &self.person) {
            (Some(dataset), Some(person)) => dataset.user(person),
            _ => None,
        };
        if let Some(user) = user {
            view.events = user.events.iter().take(self.options.max_events).cloned().collect();
            view.lists = user
                .lists
                .iter()
                .take(self.options.max_lists)
                .map(|list| {
                    let mut list = list.clone();
                    if !self.options.show_completed {
                        list.items.retain(|item| !item.completed);
                    }
                    list
                })
                .collect();
        }
        view
    }
}

impl Subscriber for PersonalWidget {
    fn id(&self) -> &str {
        &self.id
    }

    fn settings(&self) -> SubscriberSettings {
        self.settings.clone()
    }

    /// Forget who was here; the fetched dataset stays for the next person.
    fn stop(&mut self) {
        self.person = None;
        self.view.set(&self.id, self.render());
    }

    fn on_event(&mut self, envelope: &MirrorEnvelope) {
        match &*envelope.payload {
            MirrorEvent::PersonalData(dataset) => {
                self.dataset = Some(dataset.clone());
                self.error = None;
            }
            // Keep showing the last good data.
            MirrorEvent::PersonalDataError(e) => self.error = Some(e.error.clone()),
            MirrorEvent::Transition(notice) => match notice.event.kind {
                TransitionKind::IdentityChanged => self.person = notice.event.person.clone(),
                TransitionKind::Departed | TransitionKind::TimeoutExpired => self.person = None,
                TransitionKind::Arrived => return,
            },
            _ => return,
        }
        self.view.set(&self.id, self.render());
    }
}
