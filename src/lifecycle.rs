//! Page lifecycle coordination.
//!
//! The host forwards raw page signals (visibility changes, unload, page hide, user gestures) to a
//! [`LifecycleCoordinator`], which turns them into [`LifecycleEvent::Pause`] and
//! [`LifecycleEvent::Resume`]. Visibility is edge-triggered: repeating the same visibility state
//! emits nothing. Teardown signals always emit `Pause`, so consumers must treat it as idempotent.
//! User gestures never emit a lifecycle event; they only unlock a suspended audio context.

use crate::channel::{EventChannel, Subscription};
use smallvec::SmallVec;
use tracing::debug;

/// Raw signal from the host page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageSignal {
    VisibilityChanged { hidden: bool },
    BeforeUnload,
    PageHide,
    /// Click or key press
    UserGesture,
}

impl PageSignal {
    pub fn kind(&self) -> PageEventKind {
        match self {
            PageSignal::VisibilityChanged { .. } => PageEventKind::VisibilityChange,
            PageSignal::BeforeUnload => PageEventKind::BeforeUnload,
            PageSignal::PageHide => PageEventKind::PageHide,
            PageSignal::UserGesture => PageEventKind::UserGesture,
        }
    }
}

/// Page event a coordinator listens to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PageEventKind {
    VisibilityChange,
    BeforeUnload,
    PageHide,
    UserGesture,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    Pause,
    Resume,
}

pub struct LifecycleCoordinator {
    visible: bool,
    listeners: SmallVec<[PageEventKind; 4]>,
    events: EventChannel<LifecycleEvent>,
}

impl LifecycleCoordinator {
    /// Coordinator for a visible page, listening to every page event
    pub fn new() -> Self {
        Self {
            visible: true,
            listeners: SmallVec::from_slice(&[
                PageEventKind::VisibilityChange,
                PageEventKind::BeforeUnload,
                PageEventKind::PageHide,
                PageEventKind::UserGesture,
            ]),
            events: EventChannel::new(),
        }
    }

    pub fn subscribe(&mut self) -> Subscription<LifecycleEvent> {
        self.events.subscribe()
    }

    /// Feed one page signal; returns the event emitted, if any
    pub fn handle(&mut self, signal: PageSignal) -> Option<LifecycleEvent> {
        if !self.listeners.contains(&signal.kind()) {
            return None;
        }

        let event = match signal {
            PageSignal::VisibilityChanged { hidden } => {
                if hidden != self.visible {
                    return None;
                }
                self.visible = !hidden;
                if hidden {
                    LifecycleEvent::Pause
                } else {
                    LifecycleEvent::Resume
                }
            }
            PageSignal::BeforeUnload | PageSignal::PageHide => LifecycleEvent::Pause,
            PageSignal::UserGesture => return None,
        };

        debug!(?signal, ?event, "lifecycle");
        self.events.emit(event);
        Some(event)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_listening(&self, kind: PageEventKind) -> bool {
        self.listeners.contains(&kind)
    }

    pub fn listeners(&self) -> &[PageEventKind] {
        &self.listeners
    }

    /// Detach every listener and subscriber; later signals are ignored
    pub fn destroy(&mut self) {
        self.listeners.clear();
        self.events.clear_subscribers();
    }
}

impl Default for LifecycleCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
