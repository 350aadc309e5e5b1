//! Control window shown when no host title was given on the command line.
//!
//! A title textbox, an "Embed" button and a one-line status label. Pressing the button hands
//! the textbox contents to the registered embed callback on the UI thread.

use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicIsize, Ordering};
use widestring::U16CString;
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, EndPaint, FillRect, GetStockObject, HBRUSH, PAINTSTRUCT, WHITE_BRUSH,
};
use windows::Win32::UI::WindowsAndMessaging::{
    BS_DEFPUSHBUTTON, CS_HREDRAW, CS_VREDRAW, CW_USEDEFAULT, CreateWindowExW, DefWindowProcW,
    DestroyWindow, ES_AUTOHSCROLL, GetClientRect, GetWindowTextW, HMENU, MoveWindow,
    PostQuitMessage, RegisterClassW, SW_SHOW, SetWindowTextW, ShowWindow, WINDOW_EX_STYLE,
    WINDOW_STYLE, WM_CLOSE, WM_COMMAND, WM_DESTROY, WM_PAINT, WM_SIZE, WNDCLASSW, WS_CHILD,
    WS_EX_CLIENTEDGE, WS_OVERLAPPEDWINDOW, WS_TABSTOP, WS_VISIBLE,
};
use windows::core::PCWSTR;

use crate::dispatch::UiThread;

static MAIN_CLASS: OnceCell<U16CString> = OnceCell::new();
static TITLE_EDIT: AtomicIsize = AtomicIsize::new(0);
static EMBED_BUTTON: AtomicIsize = AtomicIsize::new(0);
static STATUS_LABEL: AtomicIsize = AtomicIsize::new(0);
// Invoked with the textbox contents whenever the user presses "Embed".
static EMBED_CB: OnceCell<Arc<dyn Fn(&UiThread, &str) + Send + Sync>> = OnceCell::new();
const ID_EMBED: usize = 2001;

const MARGIN: i32 = 12;
const EDIT_TOP: i32 = 32;
const EDIT_HEIGHT: i32 = 24;
const BUTTON_TOP: i32 = 68;
const BUTTON_HEIGHT: i32 = 26;
const STATUS_TOP: i32 = 106;
const STATUS_HEIGHT: i32 = 18;

fn stored_hwnd(cell: &AtomicIsize) -> Option<HWND> {
    let h = cell.load(Ordering::Relaxed);
    (h != 0).then(|| HWND(h as *mut core::ffi::c_void))
}

fn perform_embed() {
    let Some(title) = get_title_text() else {
        return;
    };
    let title = title.trim();
    if title.is_empty() {
        set_status("Enter the exact title of a window.");
        return;
    }
    if let Some(cb) = EMBED_CB.get() {
        let ui = UiThread::enter();
        cb(&ui, title);
    }
}

unsafe extern "system" fn main_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_PAINT => unsafe {
            let mut ps: PAINTSTRUCT = std::mem::zeroed();
            let hdc = BeginPaint(hwnd, &mut ps);
            let brush = HBRUSH(GetStockObject(WHITE_BRUSH).0);
            FillRect(
                hdc,
                &RECT {
                    left: 0,
                    top: 0,
                    right: ps.rcPaint.right,
                    bottom: ps.rcPaint.bottom,
                },
                brush,
            );
            let _ = EndPaint(hwnd, &ps);
            LRESULT(0)
        },
        WM_SIZE => unsafe {
            let mut rc = RECT::default();
            if GetClientRect(hwnd, &mut rc).is_ok() {
                let new_width = (rc.right - rc.left) - MARGIN * 2;
                if new_width > 60 {
                    for (cell, top, height) in [
                        (&TITLE_EDIT, EDIT_TOP, EDIT_HEIGHT),
                        (&EMBED_BUTTON, BUTTON_TOP, BUTTON_HEIGHT),
                        (&STATUS_LABEL, STATUS_TOP, STATUS_HEIGHT),
                    ] {
                        if let Some(child) = stored_hwnd(cell) {
                            let _ = MoveWindow(child, MARGIN, top, new_width, height, true);
                        }
                    }
                }
            }
            LRESULT(0)
        },
        WM_COMMAND => match wparam.0 & 0xFFFF {
            ID_EMBED => {
                perform_embed();
                LRESULT(0)
            }
            _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
        },
        WM_CLOSE => unsafe {
            let _ = DestroyWindow(hwnd);
            LRESULT(0)
        },
        WM_DESTROY => unsafe {
            PostQuitMessage(0);
            LRESULT(0)
        },
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

fn register_main_class() -> Result<&'static U16CString> {
    MAIN_CLASS.get_or_try_init(|| {
        let name = U16CString::from_str("WinEmbedControl")?;
        unsafe {
            let wc = WNDCLASSW {
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some(main_wnd_proc),
                lpszClassName: PCWSTR(name.as_ptr()),
                ..Default::default()
            };
            if RegisterClassW(&wc) == 0 {
                return Err(anyhow!("RegisterClassW failed"));
            }
        }
        Ok(name)
    })
}

/// Create a visible overlapped window (no controls yet). Closing it posts WM_QUIT.
fn create_raw_main_window(title: &str) -> Result<HWND> {
    let class = register_main_class()?;
    let title_u16 = U16CString::from_str(title)?;
    unsafe {
        let hwnd = CreateWindowExW(
            WINDOW_EX_STYLE(0),
            PCWSTR(class.as_ptr()),
            PCWSTR(title_u16.as_ptr()),
            WINDOW_STYLE(WS_OVERLAPPEDWINDOW.0 | WS_VISIBLE.0),
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            480,
            180,
            None,
            None,
            None,
            None,
        )?;
        let _ = ShowWindow(hwnd, SW_SHOW);
        Ok(hwnd)
    }
}

#[allow(clippy::too_many_arguments)]
fn create_child(
    parent: HWND,
    class: &str,
    text: &str,
    ex_style: u32,
    style: u32,
    top: i32,
    height: i32,
    id: Option<usize>,
) -> Result<HWND> {
    let class_u16 = U16CString::from_str(class)?;
    let text_u16 = U16CString::from_str_truncate(text);
    let hwnd = unsafe {
        CreateWindowExW(
            WINDOW_EX_STYLE(ex_style),
            PCWSTR(class_u16.as_ptr()),
            PCWSTR(text_u16.as_ptr()),
            WINDOW_STYLE(WS_CHILD.0 | WS_VISIBLE.0 | style),
            MARGIN,
            top,
            440,
            height,
            Some(parent),
            id.map(|v| HMENU(v as *mut _)),
            None,
            None,
        )?
    };
    Ok(hwnd)
}

/// Create the control window with its title textbox, Embed button and status label.
pub fn create_main_window(title: &str, initial_title: &str) -> Result<HWND> {
    let hwnd = create_raw_main_window(title)?;
    create_child(
        hwnd,
        "STATIC",
        "Host window title",
        0,
        0,
        MARGIN,
        STATUS_HEIGHT,
        None,
    )?;
    let edit = create_child(
        hwnd,
        "EDIT",
        initial_title,
        WS_EX_CLIENTEDGE.0,
        WS_TABSTOP.0 | ES_AUTOHSCROLL as u32,
        EDIT_TOP,
        EDIT_HEIGHT,
        None,
    )?;
    TITLE_EDIT.store(edit.0 as isize, Ordering::Relaxed);
    let button = create_child(
        hwnd,
        "BUTTON",
        "Embed",
        0,
        WS_TABSTOP.0 | BS_DEFPUSHBUTTON as u32,
        BUTTON_TOP,
        BUTTON_HEIGHT,
        Some(ID_EMBED),
    )?;
    EMBED_BUTTON.store(button.0 as isize, Ordering::Relaxed);
    let status = create_child(hwnd, "STATIC", "", 0, 0, STATUS_TOP, STATUS_HEIGHT, None)?;
    STATUS_LABEL.store(status.0 as isize, Ordering::Relaxed);
    Ok(hwnd)
}

/// Register the callback invoked when "Embed" is pressed. Ignored if already set.
pub fn set_embed_callback(cb: Arc<dyn Fn(&UiThread, &str) + Send + Sync>) {
    let _ = EMBED_CB.set(cb);
}

/// Replace the status line text (no-op before the window exists).
pub fn set_status(text: &str) {
    if let Some(label) = stored_hwnd(&STATUS_LABEL) {
        let text_u16 = U16CString::from_str_truncate(text);
        unsafe {
            let _ = SetWindowTextW(label, PCWSTR(text_u16.as_ptr()));
        }
    }
}

/// Retrieve current title textbox contents as UTF-8 (None if control missing).
pub fn get_title_text() -> Option<String> {
    let hwnd = stored_hwnd(&TITLE_EDIT)?;
    let mut buf: Vec<u16> = vec![0u16; 512];
    unsafe {
        let len = GetWindowTextW(hwnd, &mut buf) as usize;
        Some(String::from_utf16_lossy(&buf[..len.min(buf.len())]))
    }
}
