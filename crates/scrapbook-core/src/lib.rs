//! # Scrapbook Core Library
//!
//! This library provides the core logic for Scrapbook: a question queue kept
//! in a markdown document, a session timer that accrues time on the active
//! question and schedules thinking breaks, and a small control API that an
//! external frontend uses to read and drive that state.
//!
//! ## Architecture
//!
//! - **Codec**: parser and renderer for the `# Questions Queue` document
//! - **Queue**: membership and promotion over the document
//! - **Timer Engine**: a pure state machine fed by a [`timer::Scheduler`]
//! - **Session**: the single logical thread of mutation tying them together
//! - **Gateway**: route table mapping API requests onto session commands
//! - **Service**: tokio actor owning the session in a multi-threaded host
//!
//! ## Key Components
//!
//! - [`Session`]: queue, timers and notifications for one vault
//! - [`QueueStore`]: document-backed queue
//! - [`TimerEngine`]: timer state machine
//! - [`Settings`]: persisted configuration and live counters

pub mod codec;
pub mod duration;
pub mod error;
pub mod events;
pub mod gateway;
pub mod notify;
pub mod question;
pub mod queue;
pub mod service;
pub mod session;
pub mod storage;
pub mod timer;

pub use codec::QueueDocument;
pub use duration::Minutes;
pub use error::{ConfigError, CoreError, Result, ValidationError};
pub use events::Event;
pub use gateway::{dispatch, ApiRequest, ApiResponse, Method};
pub use notify::{LogNotices, NoticeSink, Notifier, NullNotifier, WebhookNotifier};
pub use question::{DocumentationRequest, Importance, NewQuestion, Question};
pub use queue::QueueStore;
pub use service::ServiceHandle;
pub use session::{Collaborators, Session};
pub use storage::{
    AttachmentStore, DocumentStore, FsVault, MemorySettingsStore, MemoryVault, Settings,
    SettingsStore, TomlSettingsStore,
};
pub use timer::{Scheduler, TimerEngine, TimerState, TokioScheduler};
