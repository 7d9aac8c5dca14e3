use super::{personalization_name, ViewCell};
use crate::config::CalendarOptions;
use crate::subscriber::{MirrorEnvelope, Subscriber, SubscriberSettings};
use mirrorsense_events::{MirrorEvent, Personalization};
use mirrorsense_presence::TransitionKind;
use mirrorsense_profiles::{Capability, CapabilityData, CapabilityLookup};
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum CalendarView {
    #[default]
    Waiting,
    Disabled {
        person: String,
    },
    #[serde(rename_all = "camelCase")]
    Calendar {
        person: String,
        urls: Vec<String>,
        max_entries: usize,
    },
}

/// Points the calendar renderer at the recognized person's feeds.
pub struct CalendarWidget {
    id: String,
    settings: SubscriberSettings,
    options: CalendarOptions,
    view: ViewCell<CalendarView>,
}

impl CalendarWidget {
    pub fn new(id: impl Into<String>, settings: SubscriberSettings, options: CalendarOptions) -> Self {
        Self {
            id: id.into(),
            settings,
            options,
            view: ViewCell::new(CalendarView::Waiting),
        }
    }

    pub fn watch(&self) -> watch::Receiver<CalendarView> {
        self.view.watch()
    }

    fn render(&self, personalization: &Personalization) -> CalendarView {
        let Some(person) = personalization_name(personalization) else {
            return CalendarView::Waiting;
        };
        match personalization.capability(&Capability::Calendar) {
            CapabilityLookup::Enabled(CapabilityData::Calendar(calendar)) if !calendar.urls.is_empty() => {
                // A profile may ask for fewer entries, never more.
                let max_entries = calendar
                    .max_entries
                    .map_or(self.options.maximum_entries, |n| n.min(self.options.maximum_entries));
                CalendarView::Calendar {
                    person,
                    urls: calendar.urls.clone(),
                    max_entries,
                }
            }
            _ => CalendarView::Disabled { person },
        }
    }
}

impl Subscriber for CalendarWidget {
    fn id(&self) -> &str {
        &self.id
    }

    fn settings(&self) -> SubscriberSettings {
        self.settings.clone()
    }

    /// Resuming starts from `Idle`, so nobody is in front of the mirror yet.
    fn stop(&mut self) {
        self.view.set(&self.id, CalendarView::Waiting);
    }

    fn on_event(&mut self, envelope: &MirrorEnvelope) {
        let view = match &*envelope.payload {
            MirrorEvent::Transition(notice) => match (notice.event.kind, &notice.personalization) {
                (TransitionKind::IdentityChanged, Some(personalization)) => self.render(personalization),
                (TransitionKind::Departed | TransitionKind::TimeoutExpired, _) => CalendarView::Waiting,
                _ => return,
            },
            MirrorEvent::ProfileRefreshed(refreshed) => self.render(&refreshed.personalization),
            _ => return,
        };
        self.view.set(&self.id, view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::tests_support::{envelope, personalized};
    use mirrorsense_profiles::ProfileTable;

    fn widget() -> CalendarWidget {
        CalendarWidget::new("calendar", SubscriberSettings::default(), CalendarOptions { maximum_entries: 5 })
    }

    #[test]
    fn test_profile_limit_is_capped_by_widget() {
        let table: ProfileTable = serde_json::from_str(
            r#"{"users": {
                "Andii": {"displayName": "Andii B.", "calendar": {"enabled": true, "urls": ["https://cal/a.ics"], "maxEntries": 12}},
                "Zoe": {"calendar": {"enabled": true, "urls": ["https://cal/z.ics"], "maxEntries": 2}}
            }}"#,
        )
        .unwrap();
        let mut w = widget();
        let rx = w.watch();

        w.on_event(&envelope(personalized(&table, "andii", &[Capability::Calendar])));
        assert_eq!(
            *rx.borrow(),
            CalendarView::Calendar {
                person: "Andii B.".to_string(),
                urls: vec!["https://cal/a.ics".to_string()],
                max_entries: 5
            }
        );

        w.on_event(&envelope(personalized(&table, "Zoe", &[Capability::Calendar])));
        assert!(matches!(&*rx.borrow(), CalendarView::Calendar { max_entries: 2, .. }));
    }

    #[test]
    fn test_no_urls_is_disabled() {
        let table: ProfileTable =
            serde_json::from_str(r#"{"default": {"calendar": {"enabled": true, "urls": []}}}"#).unwrap();
        let mut w = widget();
        let rx = w.watch();
        w.on_event(&envelope(personalized(&table, "Zoe", &[Capability::Calendar])));
        assert!(matches!(&*rx.borrow(), CalendarView::Disabled { .. }));
    }
}
