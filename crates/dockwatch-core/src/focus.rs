//! Which view has focus, and the one background job that belongs to it.
//!
//! Browsing owns a poll loop; Viewing and Searching own a log stream. Every
//! transition cancels the outgoing job before the incoming one starts.

use crate::state::EngineHandle;
use crate::stream::StreamSession;
use crate::EntityId;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Browsing,
    Viewing(EntityId),
    Searching(EntityId),
}

impl ViewState {
    pub fn entity(&self) -> Option<&EntityId> {
        match self {
            ViewState::Browsing => None,
            ViewState::Viewing(id) | ViewState::Searching(id) => Some(id),
        }
    }
}

#[derive(Default)]
pub struct Focus {
    state: ViewState,
    engine: Option<EngineHandle>,
    session: Option<StreamSession>,
}

impl Focus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn engine(&self) -> Option<&EngineHandle> {
        self.engine.as_ref()
    }

    pub fn session(&self) -> Option<&StreamSession> {
        self.session.as_ref()
    }

    /// Enters (or restarts) Browsing with a new poll loop.
    pub fn browse<T>(&mut self, start: impl FnOnce() -> (EngineHandle, T)) -> T {
        self.stop_all();
        let (engine, extra) = start();
        self.engine = Some(engine);
        self.state = ViewState::Browsing;
        extra
    }

    /// Enters Viewing for the session's entity.
    pub fn view<T>(&mut self, start: impl FnOnce() -> (StreamSession, T)) -> T {
        self.stop_all();
        let (session, extra) = start();
        self.state = ViewState::Viewing(session.entity().clone());
        self.session = Some(session);
        extra
    }

    pub fn begin_search(&mut self) -> bool {
        match std::mem::take(&mut self.state) {
            ViewState::Viewing(id) | ViewState::Searching(id) => {
                self.state = ViewState::Searching(id);
                true
            }
            ViewState::Browsing => false,
        }
    }

    pub fn end_search(&mut self) {
        if let ViewState::Searching(id) = &self.state {
            self.state = ViewState::Viewing(id.clone());
        }
    }

    /// Stops the log stream but keeps the entity in focus.
    pub fn detach_stream(&mut self) -> Option<EntityId> {
        let session = self.session.take()?;
        session.cancel();
        Some(session.entity().clone())
    }

    pub fn stop_all(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel();
        }
        if let Some(engine) = self.engine.take() {
            engine.cancel();
        }
    }
}
