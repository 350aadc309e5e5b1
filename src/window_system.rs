//! The native window-system boundary.
//!
//! [`WindowQuery`] and [`WindowSystem`] are the capability interfaces the rest of the crate talks
//! to: the first only reads, the second creates and mutates and demands a [`UiThread`] token on
//! every call. The production binding (`winsys::Win32WindowSystem`) forwards each method to one
//! Win32 call; the test binding (`fake::FakeWindowSystem`) keeps an in-memory registry. Methods
//! are thin on purpose: derived behaviour such as the class-name buffer loop or the placement
//! read-modify-write lives in [`crate::window`], so both bindings share it.
//!
//! Every method that the OS can fail reports [`EmbedError::NativeCall`] with the raw platform
//! code. Implementations never retry.
//!
//! [`EmbedError::NativeCall`]: crate::error::EmbedError::NativeCall

use crate::dispatch::UiThread;
use crate::error::Result;
use crate::geometry::{LogicalSize, ScaleTransform};
use crate::window::WindowHandle;

/// Window style bits shared by both bindings (values match the Win32 `WS_*` constants).
pub mod style {
    pub const CHILD: u32 = 0x4000_0000;
    pub const POPUP: u32 = 0x8000_0000;
    pub const VISIBLE: u32 = 0x1000_0000;
    pub const CAPTION: u32 = 0x00C0_0000;
    pub const THICKFRAME: u32 = 0x0004_0000;
}

/// Which style word a style query or update addresses.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StyleKind {
    Style,
    Extended,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Edge-based rectangle as reported by the OS (right/bottom exclusive).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_size(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self::new(
            left,
            top,
            left.saturating_add(width),
            top.saturating_add(height),
        )
    }

    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Coarse show-state of a window.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShowState {
    Hidden,
    Normal,
    Minimized,
    Maximized,
}

impl ShowState {
    /// Collapse a raw `SW_*` show command into the four states we model.
    pub fn from_show_cmd(cmd: u32) -> Self {
        match cmd {
            0 => ShowState::Hidden,
            2 | 6 | 7 | 11 => ShowState::Minimized,
            3 => ShowState::Maximized,
            _ => ShowState::Normal,
        }
    }

    pub fn show_cmd(self) -> u32 {
        match self {
            ShowState::Hidden => 0,
            ShowState::Normal => 1,
            ShowState::Minimized => 2,
            ShowState::Maximized => 3,
        }
    }
}

/// Mirror of the OS placement structure.
///
/// `flags`, `min_position` and `max_position` are opaque to us but must be written back
/// exactly as read, otherwise the OS rejects the update or corrupts the window's state.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Placement {
    pub flags: u32,
    pub show_cmd: u32,
    pub min_position: Point,
    pub max_position: Point,
    pub normal_position: Rect,
}

impl Placement {
    pub fn show_state(&self) -> ShowState {
        ShowState::from_show_cmd(self.show_cmd)
    }
}

/// Attributes of a freshly created top-level window.
#[derive(Clone, Debug, PartialEq)]
pub struct GuestSpec {
    pub title: String,
    pub resizable: bool,
    pub chrome: bool,
    pub visible: bool,
    /// 0.0 (fully transparent) ..= 1.0 (opaque).
    pub opacity: f64,
}

impl GuestSpec {
    /// Hidden, chromeless, non-resizable and fully transparent: nothing reaches the screen
    /// until the guest has been parented and sized.
    pub fn overlay(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            resizable: false,
            chrome: false,
            visible: false,
            opacity: 0.0,
        }
    }
}

/// Flags for [`WindowSystem::set_window_pos`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionFlags {
    pub no_zorder: bool,
    pub no_activate: bool,
}

impl PositionFlags {
    /// Move/resize only: keep the z-order and do not steal activation.
    pub const MOVE_SIZE_ONLY: PositionFlags = PositionFlags {
        no_zorder: true,
        no_activate: true,
    };
}

/// Read-only window queries. Callable from any thread; nothing here changes a window.
pub trait WindowQuery: Send + Sync {
    /// First top-level window whose title equals `title` exactly.
    fn find_window_by_title(&self, title: &str) -> Option<WindowHandle>;

    /// Whether the handle still names a live window.
    fn is_window(&self, handle: WindowHandle) -> bool;

    fn foreground_window(&self) -> Option<WindowHandle>;

    fn window_text(&self, handle: WindowHandle) -> Result<String>;

    /// Copy the class name into `buf`, truncating like the OS does (at most `buf.len() - 1`
    /// characters plus a terminator). Returns the number of characters copied.
    fn class_name(&self, handle: WindowHandle, buf: &mut [u16]) -> Result<usize>;

    fn is_visible(&self, handle: WindowHandle) -> bool;

    fn placement(&self, handle: WindowHandle) -> Result<Placement>;

    /// `(thread id, process id)` of the window's creator.
    fn thread_process_ids(&self, handle: WindowHandle) -> Result<(u32, u32)>;

    /// Thread ids currently belonging to `pid`.
    fn process_threads(&self, pid: u32) -> Result<Vec<u32>>;

    fn process_image_name(&self, pid: u32) -> Option<String>;

    fn style(&self, handle: WindowHandle, kind: StyleKind) -> Result<u32>;

    /// Screen-space bounding rectangle in device pixels.
    fn window_rect(&self, handle: WindowHandle) -> Result<Rect>;

    /// Client area in device pixels, origin at (0, 0).
    fn client_rect(&self, handle: WindowHandle) -> Result<Rect>;

    /// Device-scale transform of the monitor the window renders on.
    fn scale_transform(&self, handle: WindowHandle) -> Result<ScaleTransform>;

    fn opacity(&self, handle: WindowHandle) -> Result<f64>;
}

/// Window creation and mutation.
///
/// Every method takes a [`UiThread`] token. The token is neither `Send` nor `Sync`, so a
/// mutation can only be issued from the thread that owns the windows. Code that runs elsewhere
/// is handed a `dyn WindowQuery` and has no mutating method to call.
pub trait WindowSystem: WindowQuery {
    fn set_window_text(&self, ui: &UiThread, handle: WindowHandle, text: &str) -> Result<()>;

    fn set_placement(
        &self,
        ui: &UiThread,
        handle: WindowHandle,
        placement: &Placement,
    ) -> Result<()>;

    fn create_window(&self, ui: &UiThread, spec: &GuestSpec) -> Result<WindowHandle>;

    fn show_window(&self, ui: &UiThread, handle: WindowHandle, visible: bool) -> Result<()>;

    fn destroy_window(&self, ui: &UiThread, handle: WindowHandle) -> Result<()>;

    fn set_style(
        &self,
        ui: &UiThread,
        handle: WindowHandle,
        kind: StyleKind,
        bits: u32,
    ) -> Result<()>;

    fn set_parent(&self, ui: &UiThread, child: WindowHandle, parent: WindowHandle) -> Result<()>;

    #[allow(clippy::too_many_arguments)]
    fn set_window_pos(
        &self,
        ui: &UiThread,
        handle: WindowHandle,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        flags: PositionFlags,
    ) -> Result<()>;

    fn set_opacity(&self, ui: &UiThread, handle: WindowHandle, opacity: f64) -> Result<()>;

    /// Update the guest's own layout model (the size its content lays out against).
    fn set_layout_size(
        &self,
        ui: &UiThread,
        handle: WindowHandle,
        size: LogicalSize,
    ) -> Result<()>;
}
