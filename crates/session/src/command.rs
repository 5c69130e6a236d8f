use feed::{ContentDraft, ContentKind};
use markers::{CategoryFilter, MapEvent};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    RequestLocation,
    /// Refetch one kind, or all of them.
    Refresh(Option<ContentKind>),
    Create(ContentDraft),
    SetFilter(CategoryFilter),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("map session has shut down")]
pub struct SessionClosed;

/// Cloneable sender side of a [`MapSession`](crate::MapSession).
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub(crate) commands: mpsc::UnboundedSender<SessionCommand>,
    pub(crate) events: mpsc::UnboundedSender<MapEvent>,
}

impl SessionHandle {
    pub fn send(&self, command: SessionCommand) -> Result<(), SessionClosed> {
        self.commands.send(command).map_err(|_| SessionClosed)
    }

    pub fn request_location(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::RequestLocation)
    }

    pub fn refresh(&self, kind: Option<ContentKind>) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Refresh(kind))
    }

    pub fn create(&self, draft: ContentDraft) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Create(draft))
    }

    pub fn set_filter(&self, filter: CategoryFilter) -> Result<(), SessionClosed> {
        self.send(SessionCommand::SetFilter(filter))
    }

    pub fn shutdown(&self) -> Result<(), SessionClosed> {
        self.send(SessionCommand::Shutdown)
    }

    /// Forwards a lifecycle notification from the map surface.
    pub fn map_event(&self, event: MapEvent) -> Result<(), SessionClosed> {
        self.events.send(event).map_err(|_| SessionClosed)
    }

    /// Same as [`map_event`](Self::map_event), by the surface's event name.
    pub fn map_event_type(&self, name: &str) -> Result<(), SessionClosed> {
        self.map_event(MapEvent::from_type(name))
    }
}
