//! In-memory window registry implementing [`WindowQuery`] and [`WindowSystem`] for tests.
//!
//! Windows live in a `BTreeMap` so title lookups are deterministic (lowest handle first).
//! Failure injection covers the paths the embedding flow must survive: a failing reparent,
//! a host that disappears right after being reparented to, failing class-name queries and any
//! single mutation of a given window.
//! Every mutating call records the thread it ran on.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use crate::dispatch::UiThread;
use crate::error::{ERROR_INVALID_WINDOW_HANDLE, EmbedError, Result};
use crate::geometry::{LogicalSize, ScaleTransform};
use crate::window::WindowHandle;
use crate::window_system::{
    GuestSpec, Placement, PositionFlags, Rect, StyleKind, WindowQuery, WindowSystem, style,
};

pub const HOST_PID: u32 = 500;
pub const HOST_TID: u32 = 501;
pub const SELF_PID: u32 = 1;
pub const SELF_TID: u32 = 2;

#[derive(Clone, Debug)]
pub struct FakeWindow {
    pub title: String,
    pub class_name: String,
    pub visible: bool,
    pub placement: Placement,
    pub style: u32,
    pub ex_style: u32,
    pub parent: Option<WindowHandle>,
    pub rect: Rect,
    pub client: Option<Rect>,
    pub scale: ScaleTransform,
    pub opacity: f64,
    pub layout: Option<LogicalSize>,
    pub pid: u32,
    pub tid: u32,
    pub alive: bool,
    pub moves: Vec<(Rect, PositionFlags)>,
}

#[derive(Clone, Debug)]
pub struct Mutation {
    pub handle: WindowHandle,
    pub op: &'static str,
    pub thread: ThreadId,
}

struct Registry {
    next: isize,
    windows: BTreeMap<WindowHandle, FakeWindow>,
    foreground: Option<WindowHandle>,
    processes: HashMap<u32, (String, Vec<u32>)>,
    default_scale: ScaleTransform,
    fail_reparent: Option<u32>,
    vanish_after_reparent: HashSet<WindowHandle>,
    fail_class_name: HashMap<WindowHandle, u32>,
    fail_ops: HashMap<(WindowHandle, &'static str), u32>,
    created: Vec<WindowHandle>,
    mutations: Vec<Mutation>,
}

pub struct FakeWindowSystem {
    inner: Mutex<Registry>,
}

fn dead() -> EmbedError {
    EmbedError::native("fake window call", ERROR_INVALID_WINDOW_HANDLE)
}

impl FakeWindowSystem {
    pub fn new() -> Self {
        let mut processes = HashMap::new();
        processes.insert(HOST_PID, ("host.exe".to_string(), vec![HOST_TID]));
        processes.insert(SELF_PID, ("winembed.exe".to_string(), vec![SELF_TID]));
        Self {
            inner: Mutex::new(Registry {
                next: 0x1000,
                windows: BTreeMap::new(),
                foreground: None,
                processes,
                default_scale: ScaleTransform::IDENTITY,
                fail_reparent: None,
                vanish_after_reparent: HashSet::new(),
                fail_class_name: HashMap::new(),
                fail_ops: HashMap::new(),
                created: Vec::new(),
                mutations: Vec::new(),
            }),
        }
    }

    fn insert(reg: &mut Registry, window: FakeWindow) -> WindowHandle {
        let h = WindowHandle::from_raw(reg.next);
        reg.next += 0x10;
        reg.windows.insert(h, window);
        h
    }

    /// Add a visible, normally-placed top-level window owned by an external process.
    pub fn add_window(&self, title: &str, rect: Rect) -> WindowHandle {
        let mut reg = self.inner.lock().unwrap();
        let window = FakeWindow {
            title: title.to_string(),
            class_name: "FakeHostWindow".to_string(),
            visible: true,
            placement: Placement {
                show_cmd: 1,
                normal_position: rect,
                ..Default::default()
            },
            style: style::CAPTION | style::THICKFRAME | style::VISIBLE,
            ex_style: 0,
            parent: None,
            rect,
            client: None,
            scale: reg.default_scale,
            opacity: 1.0,
            layout: None,
            pid: HOST_PID,
            tid: HOST_TID,
            alive: true,
            moves: Vec::new(),
        };
        Self::insert(&mut reg, window)
    }

    pub fn update<F: FnOnce(&mut FakeWindow)>(&self, h: WindowHandle, f: F) {
        let mut reg = self.inner.lock().unwrap();
        if let Some(w) = reg.windows.get_mut(&h) {
            f(w);
        }
    }

    pub fn window(&self, h: WindowHandle) -> FakeWindow {
        self.inner.lock().unwrap().windows[&h].clone()
    }

    /// Destroy a window behind the caller's back.
    pub fn vanish(&self, h: WindowHandle) {
        self.update(h, |w| w.alive = false);
    }

    pub fn set_foreground(&self, h: Option<WindowHandle>) {
        self.inner.lock().unwrap().foreground = h;
    }

    pub fn set_process(&self, pid: u32, image: &str, threads: &[u32]) {
        self.inner
            .lock()
            .unwrap()
            .processes
            .insert(pid, (image.to_string(), threads.to_vec()));
    }

    /// Scale given to windows created from now on.
    pub fn set_default_scale(&self, scale: ScaleTransform) {
        self.inner.lock().unwrap().default_scale = scale;
    }

    pub fn fail_reparent(&self, code: u32) {
        self.inner.lock().unwrap().fail_reparent = Some(code);
    }

    pub fn vanish_after_reparent(&self, host: WindowHandle) {
        self.inner.lock().unwrap().vanish_after_reparent.insert(host);
    }

    pub fn fail_class_name(&self, h: WindowHandle, code: u32) {
        self.inner.lock().unwrap().fail_class_name.insert(h, code);
    }

    /// Make every later `op` mutation of `h` fail with `code`.
    pub fn fail_op(&self, h: WindowHandle, op: &'static str, code: u32) {
        self.inner.lock().unwrap().fail_ops.insert((h, op), code);
    }

    pub fn created(&self) -> Vec<WindowHandle> {
        self.inner.lock().unwrap().created.clone()
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.inner.lock().unwrap().mutations.clone()
    }

    fn read<T>(&self, h: WindowHandle, f: impl FnOnce(&FakeWindow) -> T) -> Result<T> {
        let reg = self.inner.lock().unwrap();
        match reg.windows.get(&h) {
            Some(w) if w.alive => Ok(f(w)),
            _ => Err(dead()),
        }
    }

    fn mutate<T>(
        &self,
        h: WindowHandle,
        op: &'static str,
        f: impl FnOnce(&mut FakeWindow) -> T,
    ) -> Result<T> {
        let mut reg = self.inner.lock().unwrap();
        reg.mutations.push(Mutation {
            handle: h,
            op,
            thread: thread::current().id(),
        });
        if let Some(&code) = reg.fail_ops.get(&(h, op)) {
            return Err(EmbedError::native(op, code));
        }
        match reg.windows.get_mut(&h) {
            Some(w) if w.alive => Ok(f(w)),
            _ => Err(dead()),
        }
    }
}

impl WindowQuery for FakeWindowSystem {
    fn find_window_by_title(&self, title: &str) -> Option<WindowHandle> {
        let reg = self.inner.lock().unwrap();
        reg.windows
            .iter()
            .find(|(_, w)| w.alive && w.parent.is_none() && w.title == title)
            .map(|(h, _)| *h)
    }

    fn is_window(&self, handle: WindowHandle) -> bool {
        self.read(handle, |_| ()).is_ok()
    }

    fn foreground_window(&self) -> Option<WindowHandle> {
        self.inner.lock().unwrap().foreground
    }

    fn window_text(&self, handle: WindowHandle) -> Result<String> {
        self.read(handle, |w| w.title.clone())
    }

    fn class_name(&self, handle: WindowHandle, buf: &mut [u16]) -> Result<usize> {
        if let Some(code) = self.inner.lock().unwrap().fail_class_name.get(&handle) {
            return Err(EmbedError::native("GetClassNameW", *code));
        }
        let name: Vec<u16> = self.read(handle, |w| w.class_name.encode_utf16().collect())?;
        if buf.is_empty() {
            return Ok(0);
        }
        let n = name.len().min(buf.len() - 1);
        buf[..n].copy_from_slice(&name[..n]);
        buf[n] = 0;
        Ok(n)
    }

    fn is_visible(&self, handle: WindowHandle) -> bool {
        self.read(handle, |w| w.visible).unwrap_or(false)
    }

    fn placement(&self, handle: WindowHandle) -> Result<Placement> {
        self.read(handle, |w| w.placement)
    }

    fn thread_process_ids(&self, handle: WindowHandle) -> Result<(u32, u32)> {
        self.read(handle, |w| (w.tid, w.pid))
    }

    fn process_threads(&self, pid: u32) -> Result<Vec<u32>> {
        let reg = self.inner.lock().unwrap();
        Ok(reg
            .processes
            .get(&pid)
            .map(|(_, t)| t.clone())
            .unwrap_or_default())
    }

    fn process_image_name(&self, pid: u32) -> Option<String> {
        let reg = self.inner.lock().unwrap();
        reg.processes.get(&pid).map(|(name, _)| name.clone())
    }

    fn style(&self, handle: WindowHandle, kind: StyleKind) -> Result<u32> {
        self.read(handle, |w| match kind {
            StyleKind::Style => w.style,
            StyleKind::Extended => w.ex_style,
        })
    }

    fn window_rect(&self, handle: WindowHandle) -> Result<Rect> {
        self.read(handle, |w| w.rect)
    }

    fn client_rect(&self, handle: WindowHandle) -> Result<Rect> {
        self.read(handle, |w| {
            w.client
                .unwrap_or_else(|| Rect::from_size(0, 0, w.rect.width(), w.rect.height()))
        })
    }

    fn scale_transform(&self, handle: WindowHandle) -> Result<ScaleTransform> {
        self.read(handle, |w| w.scale)
    }

    fn opacity(&self, handle: WindowHandle) -> Result<f64> {
        self.read(handle, |w| w.opacity)
    }
}

impl WindowSystem for FakeWindowSystem {
    fn set_window_text(&self, _ui: &UiThread, handle: WindowHandle, text: &str) -> Result<()> {
        self.mutate(handle, "set_window_text", |w| w.title = text.to_string())
    }

    fn set_placement(
        &self,
        _ui: &UiThread,
        handle: WindowHandle,
        placement: &Placement,
    ) -> Result<()> {
        self.mutate(handle, "set_placement", |w| w.placement = *placement)
    }

    fn create_window(&self, _ui: &UiThread, spec: &GuestSpec) -> Result<WindowHandle> {
        let mut reg = self.inner.lock().unwrap();
        let mut bits = style::POPUP;
        if spec.chrome {
            bits |= style::CAPTION;
        }
        if spec.resizable {
            bits |= style::THICKFRAME;
        }
        if spec.visible {
            bits |= style::VISIBLE;
        }
        let window = FakeWindow {
            title: spec.title.clone(),
            class_name: "WinEmbedGuest".to_string(),
            visible: spec.visible,
            placement: Placement {
                show_cmd: if spec.visible { 1 } else { 0 },
                ..Default::default()
            },
            style: bits,
            ex_style: 0,
            parent: None,
            rect: Rect::default(),
            client: None,
            scale: reg.default_scale,
            opacity: spec.opacity,
            layout: None,
            pid: SELF_PID,
            tid: SELF_TID,
            alive: true,
            moves: Vec::new(),
        };
        let h = Self::insert(&mut reg, window);
        reg.created.push(h);
        Ok(h)
    }

    fn show_window(&self, _ui: &UiThread, handle: WindowHandle, visible: bool) -> Result<()> {
        self.mutate(handle, "show_window", |w| {
            w.visible = visible;
            if visible {
                w.style |= style::VISIBLE;
            } else {
                w.style &= !style::VISIBLE;
            }
        })
    }

    fn destroy_window(&self, _ui: &UiThread, handle: WindowHandle) -> Result<()> {
        self.mutate(handle, "destroy_window", |w| {
            w.alive = false;
            w.visible = false;
        })
    }

    fn set_style(
        &self,
        _ui: &UiThread,
        handle: WindowHandle,
        kind: StyleKind,
        bits: u32,
    ) -> Result<()> {
        self.mutate(handle, "set_style", |w| match kind {
            StyleKind::Style => w.style = bits,
            StyleKind::Extended => w.ex_style = bits,
        })
    }

    fn set_parent(&self, _ui: &UiThread, child: WindowHandle, parent: WindowHandle) -> Result<()> {
        let mut reg = self.inner.lock().unwrap();
        reg.mutations.push(Mutation {
            handle: child,
            op: "set_parent",
            thread: thread::current().id(),
        });
        if let Some(code) = reg.fail_reparent.take() {
            return Err(EmbedError::native("SetParent", code));
        }
        let parent_alive = reg.windows.get(&parent).is_some_and(|w| w.alive);
        match reg.windows.get_mut(&child) {
            Some(w) if w.alive && parent_alive => w.parent = Some(parent),
            _ => return Err(EmbedError::native("SetParent", ERROR_INVALID_WINDOW_HANDLE)),
        }
        if reg.vanish_after_reparent.contains(&parent) {
            if let Some(p) = reg.windows.get_mut(&parent) {
                p.alive = false;
            }
        }
        Ok(())
    }

    fn set_window_pos(
        &self,
        _ui: &UiThread,
        handle: WindowHandle,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        flags: PositionFlags,
    ) -> Result<()> {
        self.mutate(handle, "set_window_pos", |w| {
            w.rect = Rect::from_size(x, y, width, height);
            w.moves.push((w.rect, flags));
        })
    }

    fn set_opacity(&self, _ui: &UiThread, handle: WindowHandle, opacity: f64) -> Result<()> {
        self.mutate(handle, "set_opacity", |w| w.opacity = opacity)
    }

    fn set_layout_size(
        &self,
        _ui: &UiThread,
        handle: WindowHandle,
        size: LogicalSize,
    ) -> Result<()> {
        self.mutate(handle, "set_layout_size", |w| w.layout = Some(size))
    }
}
