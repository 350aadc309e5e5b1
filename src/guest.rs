//! The guest window class and the message-queue dispatcher that drives it.
//!
//! Guests are plain windows of a private class. Their window procedure paints the current layout
//! size and executes [`UiTask`]s posted by measuring threads, so every mutation of a guest runs on
//! the thread that created it. Tasks wait in a [`PendingTasks`] queue; the posted message carries
//! no payload, and whatever is still queued when the guest is destroyed gets released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use tracing::{trace, warn};
use widestring::U16CString;
use windows::Win32::Foundation::{GetLastError, HWND, LPARAM, LRESULT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, COLOR_WINDOW, DT_CENTER, DT_SINGLELINE, DT_VCENTER, DrawTextW, EndPaint, FillRect,
    GetSysColorBrush, InvalidateRect, PAINTSTRUCT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CS_HREDRAW, CS_VREDRAW, DefWindowProcW, GetClientRect, PostMessageW, RegisterClassW,
    WM_APP, WM_DESTROY, WM_NCDESTROY, WM_PAINT, WNDCLASSW,
};
use windows::core::PCWSTR;

use crate::dispatch::{PendingTasks, UiDispatcher, UiTask, UiThread};
use crate::error::{EmbedError, Result};
use crate::geometry::LogicalSize;
use crate::window::WindowHandle;
use crate::winsys::{handle, hwnd};

/// Signals that a task for this guest is waiting in [`pending`].
pub const WM_APP_EMBED_TASK: u32 = WM_APP + 0x20;

static GUEST_CLASS: OnceCell<U16CString> = OnceCell::new();
static TASK_HANDLER: OnceCell<Arc<dyn Fn(&UiThread, UiTask) + Send + Sync>> = OnceCell::new();
static LAYOUTS: OnceCell<Mutex<HashMap<isize, LogicalSize>>> = OnceCell::new();
static PENDING: OnceCell<PendingTasks> = OnceCell::new();

fn pending() -> &'static PendingTasks {
    PENDING.get_or_init(PendingTasks::default)
}

fn layouts() -> &'static Mutex<HashMap<isize, LogicalSize>> {
    LAYOUTS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Register the callback that executes tasks arriving on a guest's queue. Ignored if already set.
pub fn set_task_handler(handler: Arc<dyn Fn(&UiThread, UiTask) + Send + Sync>) {
    let _ = TASK_HANDLER.set(handler);
}

/// Record the logical layout size of a guest and schedule a repaint.
pub fn store_layout(guest: WindowHandle, size: LogicalSize) {
    if let Ok(mut map) = layouts().lock() {
        map.insert(guest.raw(), size);
    }
    unsafe {
        let _ = InvalidateRect(Some(hwnd(guest)), None, true);
    }
}

fn layout_of(guest: HWND) -> Option<LogicalSize> {
    layouts().lock().ok()?.get(&(guest.0 as isize)).copied()
}

pub fn register_guest_class() -> Result<&'static U16CString> {
    GUEST_CLASS.get_or_try_init(|| {
        let name = U16CString::from_str_truncate("WinEmbedGuest");
        unsafe {
            let wc = WNDCLASSW {
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some(guest_wnd_proc),
                hbrBackground: GetSysColorBrush(COLOR_WINDOW),
                lpszClassName: PCWSTR(name.as_ptr()),
                ..Default::default()
            };
            if RegisterClassW(&wc) == 0 {
                let code = GetLastError().0;
                return Err(EmbedError::native("RegisterClassW", code));
            }
        }
        Ok(name)
    })
}

unsafe extern "system" fn guest_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_APP_EMBED_TASK => {
            let guest = handle(hwnd);
            if let Some(task) = pending().pop(guest) {
                let ui = UiThread::enter();
                match TASK_HANDLER.get() {
                    Some(run) => run(&ui, task),
                    None => warn!(%guest, "task arrived before a handler was set"),
                }
            }
            LRESULT(0)
        }
        WM_PAINT => unsafe {
            let mut ps = PAINTSTRUCT::default();
            let hdc = BeginPaint(hwnd, &mut ps);
            FillRect(hdc, &ps.rcPaint, GetSysColorBrush(COLOR_WINDOW));
            if let Some(size) = layout_of(hwnd) {
                let mut text: Vec<u16> = format!("{:.0} x {:.0}", size.width, size.height)
                    .encode_utf16()
                    .collect();
                let mut rc = RECT::default();
                if GetClientRect(hwnd, &mut rc).is_ok() {
                    let _ = DrawTextW(
                        hdc,
                        &mut text,
                        &mut rc,
                        DT_CENTER | DT_VCENTER | DT_SINGLELINE,
                    );
                }
            }
            let _ = EndPaint(hwnd, &ps);
            LRESULT(0)
        },
        WM_DESTROY => {
            if let Ok(mut map) = layouts().lock() {
                map.remove(&(hwnd.0 as isize));
            }
            trace!(guest = %handle(hwnd), "guest destroyed");
            LRESULT(0)
        }
        WM_NCDESTROY => {
            // Last message this window receives; queued signals are discarded with it.
            pending().release(handle(hwnd));
            unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

/// Posts tasks to the guest's own message queue; the guest's creating thread runs them.
#[derive(Copy, Clone, Debug, Default)]
pub struct GuestDispatcher;

impl UiDispatcher for GuestDispatcher {
    fn post(&self, task: UiTask) -> Result<()> {
        let guest = task.guest;
        pending().push(task);
        let posted =
            unsafe { PostMessageW(Some(hwnd(guest)), WM_APP_EMBED_TASK, WPARAM(0), LPARAM(0)) };
        if let Err(e) = posted {
            pending().withdraw(guest);
            return Err(EmbedError::UiContextGone {
                reason: format!("PostMessageW failed: {e}"),
            });
        }
        Ok(())
    }
}
