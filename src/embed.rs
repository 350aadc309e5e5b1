//! Embedding orchestrator.
//!
//! Flow per request:
//! 1. Resolving: exact-title lookup of the host (first match wins).
//! 2. Creating: a hidden guest without chrome, not resizable, at zero opacity.
//! 3. Reparenting: mark the guest child-style, then make the host its parent.
//! 4. Measuring: on a separate thread, strictly after step 3 returned, read the host rectangle
//!    and its chrome allowance. That thread only holds a read-only [`WindowQuery`].
//! 5. Positioning: back on the UI context, read the guest's scale and apply one move/resize
//!    call plus the layout update.
//! 6. Visible: restore full opacity, the only user-visible transition.
//!
//! Any failure moves the session to `Aborted`. Steps 1 to 3 fail synchronously; steps 4 to 6
//! report through the UI task and destroy the guest while it is still transparent. Nothing
//! retries.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use crate::dispatch::{UiDispatcher, UiTask, UiTaskKind, UiThread};
use crate::error::{EmbedError, Result};
use crate::geometry::{ChromeInset, GuestGeometry, HostMeasurement, SizeCorrection};
use crate::window::WindowHandle;
use crate::window_system::{
    GuestSpec, PositionFlags, ShowState, StyleKind, WindowQuery, WindowSystem, style,
};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EmbedState {
    Resolving,
    Creating,
    Reparenting,
    Measuring,
    Positioning,
    Visible,
    Aborted,
}

/// Shared, observable state of one embedding request.
#[derive(Clone)]
pub struct Session {
    id: u64,
    state: Arc<Mutex<EmbedState>>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            state: Arc::new(Mutex::new(EmbedState::Resolving)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> EmbedState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set(&self, next: EmbedState) -> EmbedState {
        let mut guard = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let prev = *guard;
        // Aborted is terminal.
        if prev != EmbedState::Aborted {
            *guard = next;
        }
        prev
    }

    fn advance(&self, next: EmbedState) {
        let prev = self.set(next);
        debug!(session = self.id, ?prev, ?next, "embed state");
    }

    pub(crate) fn abort(&self, err: &EmbedError) {
        let prev = self.set(EmbedState::Aborted);
        if err.is_user_error() {
            warn!(
                session = self.id,
                ?prev,
                code = err.error_code(),
                os_code = ?err.os_code(),
                %err,
                "embedding aborted"
            );
        } else {
            error!(
                session = self.id,
                ?prev,
                code = err.error_code(),
                os_code = ?err.os_code(),
                %err,
                "embedding aborted"
            );
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Where the host's chrome allowance comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChromeSource {
    Fixed(ChromeInset),
    /// Outer rectangle minus client rectangle of the host.
    Measured,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbedConfig {
    pub chrome: ChromeSource,
    pub correction: SizeCorrection,
    /// Un-minimize the host before measuring it.
    pub restore_host: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            chrome: ChromeSource::Fixed(ChromeInset::DEFAULT),
            correction: SizeCorrection::DEFAULT,
            restore_host: false,
        }
    }
}

/// Result of a request that got past reparenting.
pub struct Embedding {
    pub host: WindowHandle,
    pub guest: WindowHandle,
    session: Session,
    measure: Option<JoinHandle<()>>,
}

impl Embedding {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> EmbedState {
        self.session.state()
    }

    /// Visible or aborted; nothing further will happen to this embedding.
    pub fn is_settled(&self) -> bool {
        matches!(self.state(), EmbedState::Visible | EmbedState::Aborted)
    }

    /// Block until the measurement has been computed and handed to the UI context.
    pub fn wait_measured(&mut self) {
        if let Some(h) = self.measure.take() {
            if h.join().is_err() {
                error!(session = self.session.id, "measurement thread panicked");
            }
        }
    }
}

pub struct Embedder<S: WindowSystem + 'static> {
    sys: Arc<S>,
    dispatcher: Arc<dyn UiDispatcher>,
    config: EmbedConfig,
}

impl<S: WindowSystem + 'static> Embedder<S> {
    pub fn new(sys: Arc<S>, dispatcher: Arc<dyn UiDispatcher>, config: EmbedConfig) -> Self {
        Self {
            sys,
            dispatcher,
            config,
        }
    }

    /// Run steps 1 to 3 on the calling UI context and schedule step 4.
    pub fn embed(&self, ui: &UiThread, title: &str) -> Result<Embedding> {
        let session = Session::new();
        let sys = &*self.sys;

        let Some(host) = WindowHandle::find_by_title(sys, title) else {
            let err = EmbedError::HostNotFound {
                title: title.to_string(),
            };
            session.abort(&err);
            return Err(err);
        };
        info!(session = session.id, %host, title, "host resolved");

        if self.config.restore_host {
            if let Err(e) = restore_if_minimized(sys, ui, host) {
                session.abort(&e);
                return Err(e);
            }
        }

        session.advance(EmbedState::Creating);
        let guest = match sys.create_window(ui, &GuestSpec::overlay(format!("{title} overlay"))) {
            Ok(g) => g,
            Err(e) => {
                session.abort(&e);
                return Err(e);
            }
        };
        debug!(session = session.id, %guest, "guest created");

        if let Err(e) = self.attach(ui, &session, host, guest) {
            discard(sys, ui, guest);
            session.abort(&e);
            return Err(e);
        }

        session.advance(EmbedState::Measuring);
        let measure = match self.schedule_measure(host, guest, session.clone()) {
            Ok(h) => h,
            Err(e) => {
                discard(sys, ui, guest);
                session.abort(&e);
                return Err(e);
            }
        };
        Ok(Embedding {
            host,
            guest,
            session,
            measure: Some(measure),
        })
    }

    fn attach(
        &self,
        ui: &UiThread,
        session: &Session,
        host: WindowHandle,
        guest: WindowHandle,
    ) -> Result<()> {
        let sys = &*self.sys;
        session.advance(EmbedState::Reparenting);
        // A window cannot be both pop-up and child.
        guest.set_style_bits(sys, ui, StyleKind::Style, style::CHILD, style::POPUP)?;
        sys.set_parent(ui, guest, host).map_err(|e| match e {
            EmbedError::NativeCall { code, .. } => EmbedError::ReparentFailed { code },
            other => other,
        })?;
        // Still at zero opacity, so mapping it shows nothing yet.
        sys.show_window(ui, guest, true)?;
        debug!(session = session.id, %host, %guest, "guest reparented");
        Ok(())
    }

    fn schedule_measure(
        &self,
        host: WindowHandle,
        guest: WindowHandle,
        session: Session,
    ) -> Result<JoinHandle<()>> {
        let sys: Arc<dyn WindowQuery> = self.sys.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        let config = self.config.clone();
        let handle = thread::Builder::new()
            .name(format!("embed-measure-{}", session.id))
            .spawn(move || {
                let kind = match measure(&*sys, host, &config) {
                    Ok(measured) => UiTaskKind::Position(measured),
                    Err(e) => UiTaskKind::Abort(e),
                };
                let task = UiTask {
                    guest,
                    session: session.clone(),
                    kind,
                };
                if let Err(e) = dispatcher.post(task) {
                    // The guest never left zero opacity.
                    session.abort(&e);
                }
            })?;
        Ok(handle)
    }

    /// Steps 5 and 6, invoked by the UI context when a task arrives.
    pub fn handle_ui_task(&self, ui: &UiThread, task: UiTask) {
        run_ui_task(&*self.sys, ui, task);
    }
}

fn restore_if_minimized<S: WindowSystem + ?Sized>(
    sys: &S,
    ui: &UiThread,
    host: WindowHandle,
) -> Result<()> {
    if host.show_state(sys)? == ShowState::Minimized {
        host.set_show_state(sys, ui, ShowState::Normal)?;
        info!(%host, "host restored from minimized");
    }
    Ok(())
}

/// Step 4. Reads only the host; safe off the UI context.
pub fn measure<Q: WindowQuery + ?Sized>(
    sys: &Q,
    host: WindowHandle,
    config: &EmbedConfig,
) -> Result<HostMeasurement> {
    let host_rect = host.rect(sys)?;
    let inset = match config.chrome {
        ChromeSource::Fixed(inset) => inset,
        ChromeSource::Measured => ChromeInset::from_frame(host_rect, host.client_rect(sys)?),
    };
    debug!(
        %host,
        width = host_rect.width(),
        height = host_rect.height(),
        inset_x = inset.horizontal,
        inset_y = inset.vertical,
        "host measured"
    );
    Ok(HostMeasurement {
        host: host_rect,
        inset,
        correction: config.correction,
    })
}

/// Steps 5 and 6 (or teardown) on the guest's owning context.
pub fn run_ui_task<S: WindowSystem + ?Sized>(sys: &S, ui: &UiThread, task: UiTask) {
    let UiTask {
        guest,
        session,
        kind,
    } = task;
    match kind {
        UiTaskKind::Position(measured) => {
            if session.state() == EmbedState::Aborted {
                discard(sys, ui, guest);
                return;
            }
            session.advance(EmbedState::Positioning);
            let placed = guest
                .scale_transform(sys)
                .map(|scale| measured.geometry(scale))
                .and_then(|geometry| position(sys, ui, guest, &geometry).map(|()| geometry));
            match placed {
                Ok(geometry) => {
                    session.advance(EmbedState::Visible);
                    info!(
                        session = session.id,
                        %guest,
                        width = geometry.window_width,
                        height = geometry.window_height,
                        "guest visible"
                    );
                }
                Err(e) => {
                    discard(sys, ui, guest);
                    session.abort(&e);
                }
            }
        }
        UiTaskKind::Abort(e) => {
            discard(sys, ui, guest);
            session.abort(&e);
        }
    }
}

fn position<S: WindowSystem + ?Sized>(
    sys: &S,
    ui: &UiThread,
    guest: WindowHandle,
    geometry: &GuestGeometry,
) -> Result<()> {
    guest.move_resize(
        sys,
        ui,
        0,
        0,
        geometry.window_width,
        geometry.window_height,
        PositionFlags::MOVE_SIZE_ONLY,
    )?;
    guest.set_layout_size(sys, ui, geometry.layout)?;
    guest.set_opacity(sys, ui, 1.0)
}

/// Best-effort teardown of a guest that must never become visible.
fn discard<S: WindowSystem + ?Sized>(sys: &S, ui: &UiThread, guest: WindowHandle) {
    if !sys.is_window(guest) {
        return;
    }
    if let Err(e) = sys.set_opacity(ui, guest, 0.0) {
        warn!(%guest, %e, "failed to make guest transparent");
    }
    if let Err(e) = sys.show_window(ui, guest, false) {
        warn!(%guest, %e, "failed to hide guest");
    }
    if let Err(e) = sys.destroy_window(ui, guest) {
        warn!(%guest, %e, "failed to destroy guest");
    }
}

/// Join and drop every settled embedding, keeping the ones still in flight.
pub fn retain_pending(embeddings: &mut Vec<Embedding>) {
    embeddings.retain_mut(|e| {
        if !e.is_settled() {
            return true;
        }
        e.wait_measured();
        debug!(session = e.session.id, state = ?e.state(), "embedding settled");
        false
    });
}
