//! Win32 binding of [`WindowQuery`] and [`WindowSystem`].
//!
//! Each method is one (occasionally two) Win32 calls. Failures are captured at the call site as
//! `EmbedError::NativeCall` with the Win32 error code; calls whose return value cannot signal an
//! error on its own (`GetWindowLongPtrW`, `GetWindowTextW`) clear the thread's last-error first
//! so a legitimate zero is not mistaken for a failure.

use std::ffi::c_void;

use widestring::U16CString;
use windows::Win32::Foundation::{
    CloseHandle, COLORREF, GetLastError, HWND, RECT, SetLastError, WIN32_ERROR,
};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, PROCESSENTRY32W, Process32FirstW, Process32NextW, TH32CS_SNAPPROCESS,
    TH32CS_SNAPTHREAD, THREADENTRY32, Thread32First, Thread32Next,
};
use windows::Win32::UI::HiDpi::GetDpiForWindow;
use windows::Win32::UI::WindowsAndMessaging::{
    CW_USEDEFAULT, CreateWindowExW, DestroyWindow, FindWindowW, GWL_EXSTYLE, GWL_STYLE,
    GetClassNameW, GetClientRect, GetForegroundWindow, GetLayeredWindowAttributes,
    GetWindowLongPtrW, GetWindowPlacement, GetWindowRect, GetWindowTextLengthW, GetWindowTextW,
    GetWindowThreadProcessId, IsWindow, IsWindowVisible, LAYERED_WINDOW_ATTRIBUTES_FLAGS,
    LWA_ALPHA, SET_WINDOW_POS_FLAGS, SW_HIDE, SW_SHOWNOACTIVATE, SWP_NOACTIVATE, SWP_NOZORDER,
    SetLayeredWindowAttributes, SetParent, SetWindowLongPtrW, SetWindowPlacement, SetWindowPos,
    SetWindowTextW, ShowWindow, WINDOW_EX_STYLE, WINDOW_LONG_PTR_INDEX, WINDOW_STYLE,
    WINDOWPLACEMENT, WINDOWPLACEMENT_FLAGS, WS_EX_LAYERED, WS_EX_TOOLWINDOW,
};
use windows::core::PCWSTR;

use crate::dispatch::UiThread;
use crate::error::{EmbedError, Result};
use crate::geometry::{LogicalSize, ScaleTransform};
use crate::guest;
use crate::window::WindowHandle;
use crate::window_system::{
    GuestSpec, Placement, Point, PositionFlags, Rect, StyleKind, WindowQuery, WindowSystem, style,
};

/// Win32 `ERROR_INVALID_HANDLE`, reported when a call fails without setting last-error.
const ERROR_INVALID_HANDLE: u32 = 6;

pub fn hwnd(h: WindowHandle) -> HWND {
    HWND(h.raw() as *mut c_void)
}

pub fn handle(hwnd: HWND) -> WindowHandle {
    WindowHandle::from_raw(hwnd.0 as isize)
}

fn last_error(op: &'static str) -> EmbedError {
    let code = unsafe { GetLastError() }.0;
    EmbedError::native(op, if code == 0 { ERROR_INVALID_HANDLE } else { code })
}

/// Recover the Win32 code from an HRESULT produced by `HRESULT_FROM_WIN32`.
fn from_win(op: &'static str, e: windows::core::Error) -> EmbedError {
    let hr = e.code().0 as u32;
    let code = if hr & 0xFFFF_0000 == 0x8007_0000 {
        hr & 0xFFFF
    } else {
        hr
    };
    EmbedError::native(op, code)
}

fn clear_last_error() {
    unsafe { SetLastError(WIN32_ERROR(0)) };
}

fn to_rect(r: RECT) -> Rect {
    Rect::new(r.left, r.top, r.right, r.bottom)
}

fn from_rect(r: Rect) -> RECT {
    RECT {
        left: r.left,
        top: r.top,
        right: r.right,
        bottom: r.bottom,
    }
}

fn style_index(kind: StyleKind) -> WINDOW_LONG_PTR_INDEX {
    match kind {
        StyleKind::Style => GWL_STYLE,
        StyleKind::Extended => GWL_EXSTYLE,
    }
}

/// Utility: decode a NUL-terminated (or fully used) UTF-16 buffer.
fn utf16_until_nul(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

#[derive(Copy, Clone, Debug, Default)]
pub struct Win32WindowSystem;

impl WindowQuery for Win32WindowSystem {
    fn find_window_by_title(&self, title: &str) -> Option<WindowHandle> {
        let title_u16 = U16CString::from_str_truncate(title);
        let found = unsafe { FindWindowW(PCWSTR::null(), PCWSTR(title_u16.as_ptr())) }.ok()?;
        (!found.is_invalid()).then(|| handle(found))
    }

    fn is_window(&self, h: WindowHandle) -> bool {
        unsafe { IsWindow(Some(hwnd(h))) }.as_bool()
    }

    fn foreground_window(&self) -> Option<WindowHandle> {
        let fg = unsafe { GetForegroundWindow() };
        (!fg.is_invalid()).then(|| handle(fg))
    }

    fn window_text(&self, h: WindowHandle) -> Result<String> {
        clear_last_error();
        let len = unsafe { GetWindowTextLengthW(hwnd(h)) };
        let mut buf = vec![0u16; len.max(0) as usize + 1];
        let n = unsafe { GetWindowTextW(hwnd(h), &mut buf) };
        if n == 0 && unsafe { GetLastError() }.0 != 0 {
            return Err(last_error("GetWindowTextW"));
        }
        Ok(String::from_utf16_lossy(&buf[..n.max(0) as usize]))
    }

    fn class_name(&self, h: WindowHandle, buf: &mut [u16]) -> Result<usize> {
        let n = unsafe { GetClassNameW(hwnd(h), buf) };
        if n == 0 {
            return Err(last_error("GetClassNameW"));
        }
        Ok(n as usize)
    }

    fn is_visible(&self, h: WindowHandle) -> bool {
        unsafe { IsWindowVisible(hwnd(h)) }.as_bool()
    }

    fn placement(&self, h: WindowHandle) -> Result<Placement> {
        let mut wp = WINDOWPLACEMENT {
            length: std::mem::size_of::<WINDOWPLACEMENT>() as u32,
            ..Default::default()
        };
        unsafe { GetWindowPlacement(hwnd(h), &mut wp) }
            .map_err(|e| from_win("GetWindowPlacement", e))?;
        Ok(Placement {
            flags: wp.flags.0,
            show_cmd: wp.showCmd,
            min_position: Point {
                x: wp.ptMinPosition.x,
                y: wp.ptMinPosition.y,
            },
            max_position: Point {
                x: wp.ptMaxPosition.x,
                y: wp.ptMaxPosition.y,
            },
            normal_position: to_rect(wp.rcNormalPosition),
        })
    }

    fn thread_process_ids(&self, h: WindowHandle) -> Result<(u32, u32)> {
        let mut pid: u32 = 0;
        let tid = unsafe { GetWindowThreadProcessId(hwnd(h), Some(&mut pid as *mut u32)) };
        if tid == 0 {
            return Err(last_error("GetWindowThreadProcessId"));
        }
        Ok((tid, pid))
    }

    fn process_threads(&self, pid: u32) -> Result<Vec<u32>> {
        let snap = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0) }
            .map_err(|e| from_win("CreateToolhelp32Snapshot", e))?;
        let mut threads = Vec::new();
        unsafe {
            let mut entry = THREADENTRY32 {
                dwSize: std::mem::size_of::<THREADENTRY32>() as u32,
                ..std::mem::zeroed()
            };
            if Thread32First(snap, &mut entry).is_ok() {
                loop {
                    if entry.th32OwnerProcessID == pid {
                        threads.push(entry.th32ThreadID);
                    }
                    if Thread32Next(snap, &mut entry).is_err() {
                        break;
                    }
                }
            }
            let _ = CloseHandle(snap);
        }
        Ok(threads)
    }

    /// Resolve the executable name for a PID using ToolHelp snapshot enumeration.
    fn process_image_name(&self, pid: u32) -> Option<String> {
        unsafe {
            let snap = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0).ok()?;
            let mut entry = PROCESSENTRY32W {
                dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                ..std::mem::zeroed()
            };
            let mut found = None;
            if Process32FirstW(snap, &mut entry).is_ok() {
                loop {
                    if entry.th32ProcessID == pid {
                        found = Some(utf16_until_nul(&entry.szExeFile));
                        break;
                    }
                    if Process32NextW(snap, &mut entry).is_err() {
                        break;
                    }
                }
            }
            let _ = CloseHandle(snap);
            found
        }
    }

    fn style(&self, h: WindowHandle, kind: StyleKind) -> Result<u32> {
        clear_last_error();
        let v = unsafe { GetWindowLongPtrW(hwnd(h), style_index(kind)) };
        if v == 0 && unsafe { GetLastError() }.0 != 0 {
            return Err(last_error("GetWindowLongPtrW"));
        }
        Ok(v as u32)
    }

    fn window_rect(&self, h: WindowHandle) -> Result<Rect> {
        let mut rect = RECT::default();
        unsafe { GetWindowRect(hwnd(h), &mut rect) }.map_err(|e| from_win("GetWindowRect", e))?;
        Ok(to_rect(rect))
    }

    fn client_rect(&self, h: WindowHandle) -> Result<Rect> {
        let mut rect = RECT::default();
        unsafe { GetClientRect(hwnd(h), &mut rect) }.map_err(|e| from_win("GetClientRect", e))?;
        Ok(to_rect(rect))
    }

    fn scale_transform(&self, h: WindowHandle) -> Result<ScaleTransform> {
        let dpi = unsafe { GetDpiForWindow(hwnd(h)) };
        if dpi == 0 {
            return Err(last_error("GetDpiForWindow"));
        }
        Ok(ScaleTransform::from_dpi(dpi))
    }

    fn opacity(&self, h: WindowHandle) -> Result<f64> {
        let mut alpha: u8 = 0;
        let mut flags = LAYERED_WINDOW_ATTRIBUTES_FLAGS(0);
        let read = unsafe {
            GetLayeredWindowAttributes(
                hwnd(h),
                None,
                Some(&mut alpha as *mut u8),
                Some(&mut flags as *mut LAYERED_WINDOW_ATTRIBUTES_FLAGS),
            )
        };
        read.map_err(|e| from_win("GetLayeredWindowAttributes", e))?;
        if flags.0 & LWA_ALPHA.0 == 0 {
            return Ok(1.0);
        }
        Ok(alpha as f64 / 255.0)
    }
}

impl WindowSystem for Win32WindowSystem {
    fn set_window_text(&self, _ui: &UiThread, h: WindowHandle, text: &str) -> Result<()> {
        let text_u16 = U16CString::from_str_truncate(text);
        unsafe { SetWindowTextW(hwnd(h), PCWSTR(text_u16.as_ptr())) }
            .map_err(|e| from_win("SetWindowTextW", e))
    }

    fn set_placement(&self, _ui: &UiThread, h: WindowHandle, p: &Placement) -> Result<()> {
        let mut wp = WINDOWPLACEMENT {
            length: std::mem::size_of::<WINDOWPLACEMENT>() as u32,
            flags: WINDOWPLACEMENT_FLAGS(p.flags),
            showCmd: p.show_cmd,
            ..Default::default()
        };
        wp.ptMinPosition.x = p.min_position.x;
        wp.ptMinPosition.y = p.min_position.y;
        wp.ptMaxPosition.x = p.max_position.x;
        wp.ptMaxPosition.y = p.max_position.y;
        wp.rcNormalPosition = from_rect(p.normal_position);
        unsafe { SetWindowPlacement(hwnd(h), &wp) }.map_err(|e| from_win("SetWindowPlacement", e))
    }

    fn create_window(&self, ui: &UiThread, spec: &GuestSpec) -> Result<WindowHandle> {
        let class = guest::register_guest_class()?;
        let title_u16 = U16CString::from_str_truncate(&spec.title);
        let mut bits = style::POPUP;
        if spec.chrome {
            bits |= style::CAPTION;
        }
        if spec.resizable {
            bits |= style::THICKFRAME;
        }
        let created = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE(WS_EX_LAYERED.0 | WS_EX_TOOLWINDOW.0),
                PCWSTR(class.as_ptr()),
                PCWSTR(title_u16.as_ptr()),
                WINDOW_STYLE(bits),
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                None,
                None,
                None,
                None,
            )
        }
        .map_err(|e| from_win("CreateWindowExW", e))?;
        let h = handle(created);
        // Layered windows stay invisible until their attributes are set; set opacity first.
        if let Err(e) = self.set_opacity(ui, h, spec.opacity) {
            let _ = self.destroy_window(ui, h);
            return Err(e);
        }
        if spec.visible {
            self.show_window(ui, h, true)?;
        }
        Ok(h)
    }

    fn show_window(&self, _ui: &UiThread, h: WindowHandle, visible: bool) -> Result<()> {
        let cmd = if visible { SW_SHOWNOACTIVATE } else { SW_HIDE };
        // The return value is the previous visibility, not a status.
        let _ = unsafe { ShowWindow(hwnd(h), cmd) };
        Ok(())
    }

    fn destroy_window(&self, _ui: &UiThread, h: WindowHandle) -> Result<()> {
        unsafe { DestroyWindow(hwnd(h)) }.map_err(|e| from_win("DestroyWindow", e))
    }

    fn set_style(&self, _ui: &UiThread, h: WindowHandle, kind: StyleKind, bits: u32) -> Result<()> {
        clear_last_error();
        let prev = unsafe { SetWindowLongPtrW(hwnd(h), style_index(kind), bits as isize) };
        if prev == 0 && unsafe { GetLastError() }.0 != 0 {
            return Err(last_error("SetWindowLongPtrW"));
        }
        Ok(())
    }

    fn set_parent(&self, _ui: &UiThread, child: WindowHandle, parent: WindowHandle) -> Result<()> {
        unsafe { SetParent(hwnd(child), Some(hwnd(parent))) }
            .map(|_| ())
            .map_err(|e| from_win("SetParent", e))
    }

    fn set_window_pos(
        &self,
        _ui: &UiThread,
        h: WindowHandle,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        flags: PositionFlags,
    ) -> Result<()> {
        let mut swp = SET_WINDOW_POS_FLAGS(0);
        if flags.no_zorder {
            swp |= SWP_NOZORDER;
        }
        if flags.no_activate {
            swp |= SWP_NOACTIVATE;
        }
        unsafe { SetWindowPos(hwnd(h), None, x, y, width, height, swp) }
            .map_err(|e| from_win("SetWindowPos", e))
    }

    fn set_opacity(&self, _ui: &UiThread, h: WindowHandle, opacity: f64) -> Result<()> {
        let alpha = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        unsafe { SetLayeredWindowAttributes(hwnd(h), COLORREF(0), alpha, LWA_ALPHA) }
            .map_err(|e| from_win("SetLayeredWindowAttributes", e))
    }

    fn set_layout_size(&self, _ui: &UiThread, h: WindowHandle, size: LogicalSize) -> Result<()> {
        guest::store_layout(h, size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::UI::WindowsAndMessaging::{
        WS_CAPTION, WS_CHILD, WS_POPUP, WS_THICKFRAME, WS_VISIBLE,
    };

    #[test]
    fn shared_style_bits_match_win32() {
        assert_eq!(style::CHILD, WS_CHILD.0);
        assert_eq!(style::POPUP, WS_POPUP.0);
        assert_eq!(style::VISIBLE, WS_VISIBLE.0);
        assert_eq!(style::CAPTION, WS_CAPTION.0);
        assert_eq!(style::THICKFRAME, WS_THICKFRAME.0);
    }

    #[test]
    fn hresult_unwraps_to_win32_code() {
        let e = windows::core::Error::from_hresult(windows::core::HRESULT(0x8007_0578u32 as i32));
        assert_eq!(from_win("x", e).os_code(), Some(1400));
    }

    #[test]
    fn handle_conversion_round_trips() {
        let h = WindowHandle::from_raw(0x10_0A2C);
        assert_eq!(handle(hwnd(h)), h);
    }
}
