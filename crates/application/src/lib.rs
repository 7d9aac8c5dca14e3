//! Subscriber orchestration for mirrorsense.
//!
//! Wires the presence, profile and event crates together: every widget gets
//! its own poller and state machine, resolved personalization rides on the
//! identity transition, and everything flows through one fan-out bus.
//!
//! ```text
//!  StatusSource ──► pipeline (per subscriber) ──► FanoutBus ──► listener ──► Subscriber
//!                     poll → tracker → profiles      ▲
//!  personal API  ──► fetcher ────────────────────────┘ (broadcast)
//! ```

mod config;
mod error;
mod hub;
mod personal;
mod pipeline;
mod subscriber;
pub mod widgets;

pub use config::{
    CalendarOptions, GreetingOptions, MirrorConfig, OverlayOptions, PersonalApiConfig,
    PersonalApiOptions, TodoOptions, WidgetConfig, WidgetOptions, SOURCE_MEMO_TTL,
};
pub use error::{ConfigError, HubError, PersonalDataError};
pub use hub::PresenceHub;
pub use personal::{
    refresh_once, spawn_fetcher, HttpPersonalDataSource, PersonalDataSource, SharedPersonalSource,
};
pub use subscriber::{MirrorEnvelope, Subscriber, SubscriberSettings};
pub use widgets::build_widget;
