//! Window handle abstraction.
//!
//! A [`WindowHandle`] is a lookup key, not an owner: it copies a raw handle value and every
//! property is re-read from the [`WindowQuery`] on each call. Nothing is cached, so a handle
//! whose window has been destroyed simply starts failing; such failures are reported as
//! [`EmbedError::StaleHandle`] rather than as a generic native error.
//!
//! Queries accept any [`WindowQuery`]. Mutations need a full [`WindowSystem`] and the caller's
//! [`UiThread`] token.

use std::fmt;

use crate::dispatch::UiThread;
use crate::error::{EmbedError, Result};
use crate::geometry::{LogicalSize, ScaleTransform};
use crate::window_system::{
    Placement, PositionFlags, Rect, ShowState, StyleKind, WindowQuery, WindowSystem,
};

/// Initial class-name buffer, in UTF-16 units (doubled until the name fits).
const CLASS_NAME_START_LEN: usize = 64;

/// Opaque, process-wide-unique OS window identifier.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowHandle(isize);

impl WindowHandle {
    pub const fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> isize {
        self.0
    }

    /// Resolve a top-level window by exact title. First match wins; ambiguity is not resolved.
    pub fn find_by_title<S: WindowQuery + ?Sized>(sys: &S, title: &str) -> Option<Self> {
        sys.find_window_by_title(title)
    }

    /// Map a native failure to `StaleHandle` when the window itself is gone.
    fn check<T, S: WindowQuery + ?Sized>(self, sys: &S, res: Result<T>) -> Result<T> {
        res.map_err(|e| match e {
            EmbedError::NativeCall { .. } if !sys.is_window(self) => {
                EmbedError::StaleHandle { handle: self }
            }
            other => other,
        })
    }

    pub fn title<S: WindowQuery + ?Sized>(self, sys: &S) -> Result<String> {
        self.check(sys, sys.window_text(self))
    }

    /// Fire-and-forget: the new caption is not read back.
    pub fn set_title<S: WindowSystem + ?Sized>(
        self,
        sys: &S,
        ui: &UiThread,
        text: &str,
    ) -> Result<()> {
        self.check(sys, sys.set_window_text(ui, self, text))
    }

    /// Registered class name of any length.
    ///
    /// The OS truncates silently, so a result that exactly fills the buffer may be cut short;
    /// retry with a doubled buffer until it no longer does.
    pub fn class_name<S: WindowQuery + ?Sized>(self, sys: &S) -> Result<String> {
        let mut cap = CLASS_NAME_START_LEN;
        loop {
            let mut buf = vec![0u16; cap];
            let len = self.check(sys, sys.class_name(self, &mut buf))?;
            if len < cap - 1 {
                return Ok(String::from_utf16_lossy(&buf[..len]));
            }
            cap *= 2;
        }
    }

    /// OS visibility flag; a window covered by others is still visible.
    pub fn is_visible<S: WindowQuery + ?Sized>(self, sys: &S) -> bool {
        sys.is_visible(self)
    }

    pub fn is_active<S: WindowQuery + ?Sized>(self, sys: &S) -> bool {
        sys.foreground_window() == Some(self)
    }

    pub fn raw_placement<S: WindowQuery + ?Sized>(self, sys: &S) -> Result<Placement> {
        self.check(sys, sys.placement(self))
    }

    /// Restored (neither minimized nor maximized) bounding rectangle.
    pub fn placement<S: WindowQuery + ?Sized>(self, sys: &S) -> Result<Rect> {
        Ok(self.raw_placement(sys)?.normal_position)
    }

    /// Replace only the restored rectangle; every other placement field is written back as read.
    #[allow(dead_code)]
    pub fn set_placement<S: WindowSystem + ?Sized>(
        self,
        sys: &S,
        ui: &UiThread,
        rect: Rect,
    ) -> Result<()> {
        let mut wp = self.raw_placement(sys)?;
        wp.normal_position = rect;
        self.check(sys, sys.set_placement(ui, self, &wp))
    }

    pub fn show_state<S: WindowQuery + ?Sized>(self, sys: &S) -> Result<ShowState> {
        Ok(self.raw_placement(sys)?.show_state())
    }

    pub fn set_show_state<S: WindowSystem + ?Sized>(
        self,
        sys: &S,
        ui: &UiThread,
        state: ShowState,
    ) -> Result<()> {
        let mut wp = self.raw_placement(sys)?;
        wp.show_cmd = state.show_cmd();
        self.check(sys, sys.set_placement(ui, self, &wp))
    }

    pub fn owning_process<S: WindowQuery + ?Sized>(self, sys: &S) -> Result<OwningProcess> {
        let (_, pid) = self.check(sys, sys.thread_process_ids(self))?;
        Ok(OwningProcess {
            pid,
            image_name: sys.process_image_name(pid),
        })
    }

    /// The creating thread, confirmed against the owning process's live thread list.
    pub fn owning_thread<S: WindowQuery + ?Sized>(self, sys: &S) -> Result<OwningThread> {
        let (tid, pid) = self.check(sys, sys.thread_process_ids(self))?;
        let threads = sys.process_threads(pid)?;
        if threads.contains(&tid) {
            Ok(OwningThread { tid, pid })
        } else {
            Err(EmbedError::NotFound {
                what: format!("thread {tid} of process {pid}"),
            })
        }
    }

    pub fn rect<S: WindowQuery + ?Sized>(self, sys: &S) -> Result<Rect> {
        self.check(sys, sys.window_rect(self))
    }

    pub fn client_rect<S: WindowQuery + ?Sized>(self, sys: &S) -> Result<Rect> {
        self.check(sys, sys.client_rect(self))
    }

    pub fn style_bits<S: WindowQuery + ?Sized>(self, sys: &S, kind: StyleKind) -> Result<u32> {
        self.check(sys, sys.style(self, kind))
    }

    /// Read-modify-write of a style word. Returns the new value.
    pub fn set_style_bits<S: WindowSystem + ?Sized>(
        self,
        sys: &S,
        ui: &UiThread,
        kind: StyleKind,
        set: u32,
        clear: u32,
    ) -> Result<u32> {
        let bits = (self.style_bits(sys, kind)? & !clear) | set;
        self.check(sys, sys.set_style(ui, self, kind, bits))?;
        Ok(bits)
    }

    pub fn scale_transform<S: WindowQuery + ?Sized>(self, sys: &S) -> Result<ScaleTransform> {
        self.check(sys, sys.scale_transform(self))
    }

    /// Move/resize relative to the parent's client area.
    #[allow(clippy::too_many_arguments)]
    pub fn move_resize<S: WindowSystem + ?Sized>(
        self,
        sys: &S,
        ui: &UiThread,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        flags: PositionFlags,
    ) -> Result<()> {
        self.check(sys, sys.set_window_pos(ui, self, x, y, width, height, flags))
    }

    pub fn set_layout_size<S: WindowSystem + ?Sized>(
        self,
        sys: &S,
        ui: &UiThread,
        size: LogicalSize,
    ) -> Result<()> {
        self.check(sys, sys.set_layout_size(ui, self, size))
    }

    #[allow(dead_code)]
    pub fn opacity<S: WindowQuery + ?Sized>(self, sys: &S) -> Result<f64> {
        self.check(sys, sys.opacity(self))
    }

    pub fn set_opacity<S: WindowSystem + ?Sized>(
        self,
        sys: &S,
        ui: &UiThread,
        opacity: f64,
    ) -> Result<()> {
        self.check(sys, sys.set_opacity(ui, self, opacity))
    }

    /// Collect every derived property in one pass (diagnostics).
    pub fn snapshot<S: WindowQuery + ?Sized>(self, sys: &S) -> Result<WindowSnapshot> {
        let placement = self.raw_placement(sys)?;
        Ok(WindowSnapshot {
            handle: self,
            title: self.title(sys)?,
            class_name: self.class_name(sys)?,
            visible: self.is_visible(sys),
            active: self.is_active(sys),
            placement: placement.normal_position,
            show_state: placement.show_state(),
            process: self.owning_process(sys)?,
            thread: self.owning_thread(sys).ok(),
        })
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

impl fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WindowHandle({self})")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwningProcess {
    pub pid: u32,
    pub image_name: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OwningThread {
    pub tid: u32,
    pub pid: u32,
}

#[derive(Clone, Debug)]
pub struct WindowSnapshot {
    pub handle: WindowHandle,
    pub title: String,
    pub class_name: String,
    pub visible: bool,
    pub active: bool,
    pub placement: Rect,
    pub show_state: ShowState,
    pub process: OwningProcess,
    /// `None` when the creating thread has already exited.
    pub thread: Option<OwningThread>,
}
