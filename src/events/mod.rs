//! Server events
//!
//! Every event carries an [`EventContext`] (the client that observed it and a
//! weak handle back to the server) plus a kind-specific payload. Handlers are
//! registered per kind through [`EventRegistry`].

mod registry;

pub use registry::{EventRegistry, HandlerFailure, HandlerId, Subscription};

use crate::config::ServerAuth;
use crate::remote::RemoteMailClient;
use crate::server::ServerHandle;
use mailtm_api::{Account, Domain, Message};
use std::sync::Arc;

/// Closed set of event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    NewMessage,
    MessageDelete,
    DomainChange,
    AccountSwitched,
    NewAccountCreated,
    AccountDeleted,
    ServerStarted,
    ServerCalledOff,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::NewMessage,
        EventKind::MessageDelete,
        EventKind::DomainChange,
        EventKind::AccountSwitched,
        EventKind::NewAccountCreated,
        EventKind::AccountDeleted,
        EventKind::ServerStarted,
        EventKind::ServerCalledOff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewMessage => "new_message",
            EventKind::MessageDelete => "message_delete",
            EventKind::DomainChange => "domain_change",
            EventKind::AccountSwitched => "account_switched",
            EventKind::NewAccountCreated => "new_account_created",
            EventKind::AccountDeleted => "account_deleted",
            EventKind::ServerStarted => "server_started",
            EventKind::ServerCalledOff => "server_called_off",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who produced an event
#[derive(Clone)]
pub struct EventContext {
    pub client: Arc<dyn RemoteMailClient>,
    pub server: ServerHandle,
}

impl std::fmt::Debug for EventContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventContext")
            .field("server_alive", &self.server.is_alive())
            .finish_non_exhaustive()
    }
}

/// A message appeared in the inbox
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub ctx: EventContext,
    pub message: Message,
}

impl NewMessage {
    /// Delete this message through the server's gateway
    pub async fn delete_message(&self) -> crate::Result<()> {
        self.ctx
            .server
            .upgrade()?
            .delete_message(&self.message.id)
            .await
    }

    /// Mark this message as seen through the server's gateway
    pub async fn mark_as_seen(&self) -> crate::Result<()> {
        self.ctx.server.upgrade()?.mark_seen(&self.message.id).await
    }
}

/// A message was deleted, locally or remotely
#[derive(Debug, Clone)]
pub struct MessageDelete {
    pub ctx: EventContext,
    pub message: Message,
}

/// A domain became available
#[derive(Debug, Clone)]
pub struct DomainChange {
    pub ctx: EventContext,
    pub domain: Domain,
}

/// The server now polls a different account
#[derive(Debug, Clone)]
pub struct AccountSwitched {
    pub ctx: EventContext,
    /// Credentials in use before the switch
    pub previous_auth: ServerAuth,
}

#[derive(Debug, Clone)]
pub struct NewAccountCreated {
    pub ctx: EventContext,
    pub auth: ServerAuth,
    pub account: Account,
}

#[derive(Debug, Clone)]
pub struct AccountDeleted {
    pub ctx: EventContext,
    pub account_id: String,
}

#[derive(Debug, Clone)]
pub struct ServerStarted {
    pub ctx: EventContext,
}

#[derive(Debug, Clone)]
pub struct ServerCalledOff {
    pub ctx: EventContext,
}

/// Any event, tagged by kind
#[derive(Debug, Clone)]
pub enum Event {
    NewMessage(NewMessage),
    MessageDelete(MessageDelete),
    DomainChange(DomainChange),
    AccountSwitched(AccountSwitched),
    NewAccountCreated(NewAccountCreated),
    AccountDeleted(AccountDeleted),
    ServerStarted(ServerStarted),
    ServerCalledOff(ServerCalledOff),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::NewMessage(_) => EventKind::NewMessage,
            Event::MessageDelete(_) => EventKind::MessageDelete,
            Event::DomainChange(_) => EventKind::DomainChange,
            Event::AccountSwitched(_) => EventKind::AccountSwitched,
            Event::NewAccountCreated(_) => EventKind::NewAccountCreated,
            Event::AccountDeleted(_) => EventKind::AccountDeleted,
            Event::ServerStarted(_) => EventKind::ServerStarted,
            Event::ServerCalledOff(_) => EventKind::ServerCalledOff,
        }
    }

    pub fn context(&self) -> &EventContext {
        match self {
            Event::NewMessage(e) => &e.ctx,
            Event::MessageDelete(e) => &e.ctx,
            Event::DomainChange(e) => &e.ctx,
            Event::AccountSwitched(e) => &e.ctx,
            Event::NewAccountCreated(e) => &e.ctx,
            Event::AccountDeleted(e) => &e.ctx,
            Event::ServerStarted(e) => &e.ctx,
            Event::ServerCalledOff(e) => &e.ctx,
        }
    }

    /// Id of the entity the event is about, if any
    pub fn subject_id(&self) -> Option<&str> {
        match self {
            Event::NewMessage(e) => Some(&e.message.id),
            Event::MessageDelete(e) => Some(&e.message.id),
            Event::DomainChange(e) => Some(&e.domain.id),
            Event::NewAccountCreated(e) => Some(&e.account.id),
            Event::AccountDeleted(e) => Some(&e.account_id),
            _ => None,
        }
    }
}

/// A concrete event type handlers can subscribe to
pub trait ServerEvent: Sized + Send + 'static {
    const KIND: EventKind;

    /// Unwrap from [`Event`]; `None` for any other kind
    fn from_event(event: Event) -> Option<Self>;

    fn into_event(self) -> Event;
}

macro_rules! server_event {
    ($($ty:ident),* $(,)?) => {
        $(
            impl ServerEvent for $ty {
                const KIND: EventKind = EventKind::$ty;

                fn from_event(event: Event) -> Option<Self> {
                    match event {
                        Event::$ty(e) => Some(e),
                        _ => None,
                    }
                }

                fn into_event(self) -> Event {
                    Event::$ty(self)
                }
            }

            impl From<$ty> for Event {
                fn from(e: $ty) -> Self {
                    Event::$ty(e)
                }
            }
        )*
    };
}

server_event!(
    NewMessage,
    MessageDelete,
    DomainChange,
    AccountSwitched,
    NewAccountCreated,
    AccountDeleted,
    ServerStarted,
    ServerCalledOff,
);
