//! Hand-off from the measuring thread back to the window-owning UI context.
//!
//! Windows may only be mutated from the thread that created them. That rule is carried by the
//! type system here: every `WindowSystem` mutator takes a [`UiThread`] token, the token is
//! neither `Send` nor `Sync`, and only the UI context (the thread running the message loop) ever
//! constructs one. The measuring thread holds nothing but a read-only `WindowQuery`; it can only
//! produce a [`UiTask`] and hand it to a [`UiDispatcher`], which delivers it to the owning
//! context.

use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::sync::Mutex;

use tracing::debug;

use crate::embed::Session;
use crate::error::{EmbedError, Result};
use crate::geometry::HostMeasurement;
use crate::window::WindowHandle;

/// Proof that the caller runs on the window-owning UI context.
pub struct UiThread {
    _not_send: PhantomData<*const ()>,
}

impl UiThread {
    /// Only the message-loop thread (and tests standing in for it) may call this.
    pub(crate) fn enter() -> Self {
        Self {
            _not_send: PhantomData,
        }
    }
}

/// Work queued for the owning context of `guest`.
#[derive(Debug)]
pub struct UiTask {
    pub guest: WindowHandle,
    pub session: Session,
    pub kind: UiTaskKind,
}

#[derive(Debug)]
pub enum UiTaskKind {
    /// Host measured: read the guest's scale, then move/resize, update layout, reveal.
    Position(HostMeasurement),
    /// Measurement failed: tear the guest down without ever showing it.
    Abort(EmbedError),
}

/// Delivers a [`UiTask`] to the context that owns `task.guest`.
pub trait UiDispatcher: Send + Sync {
    fn post(&self, task: UiTask) -> Result<()>;
}

/// Tasks posted to a guest but not yet picked up by its window procedure.
///
/// The native message only signals that work is waiting; the task itself stays here, so a guest
/// destroyed with messages still queued leaves nothing behind once [`PendingTasks::release`] runs.
#[derive(Default)]
pub struct PendingTasks {
    slots: Mutex<HashMap<WindowHandle, VecDeque<UiTask>>>,
}

impl PendingTasks {
    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<WindowHandle, VecDeque<UiTask>>> {
        self.slots.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn push(&self, task: UiTask) {
        self.slots().entry(task.guest).or_default().push_back(task);
    }

    /// Oldest task waiting for `guest`.
    pub fn pop(&self, guest: WindowHandle) -> Option<UiTask> {
        let mut slots = self.slots();
        let queue = slots.get_mut(&guest)?;
        let task = queue.pop_front();
        if queue.is_empty() {
            slots.remove(&guest);
        }
        task
    }

    /// Take back the newest task for `guest` after its signal could not be delivered.
    pub fn withdraw(&self, guest: WindowHandle) -> Option<UiTask> {
        let mut slots = self.slots();
        let queue = slots.get_mut(&guest)?;
        let task = queue.pop_back();
        if queue.is_empty() {
            slots.remove(&guest);
        }
        task
    }

    /// Drop everything still queued for a destroyed guest and abort the owning sessions.
    pub fn release(&self, guest: WindowHandle) -> usize {
        let Some(orphans) = self.slots().remove(&guest) else {
            return 0;
        };
        let n = orphans.len();
        let err = EmbedError::StaleHandle { handle: guest };
        for task in orphans {
            task.session.abort(&err);
        }
        debug!(%guest, n, "released pending tasks");
        n
    }
}

#[cfg(test)]
pub use channel::{ChannelDispatcher, UiQueue};
