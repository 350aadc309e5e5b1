//! Message loop and shutdown plumbing for the UI thread.
//!
//! The pump runs until WM_QUIT arrives, either from the control window closing or from the
//! Ctrl+C handler posting it to the thread that called [`install_ctrlc_quit`].

use anyhow::{Context, Result, anyhow};
use windows::Win32::Foundation::{LPARAM, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, GetMessageW, MSG, PostThreadMessageW, TranslateMessage, WM_QUIT,
};

/// Make Ctrl+C end the message loop of the calling thread.
///
/// PostQuitMessage on the handler thread would be ineffective, so WM_QUIT is posted to the
/// original thread instead.
pub fn install_ctrlc_quit() -> Result<()> {
    let ui_tid = unsafe { GetCurrentThreadId() };
    ctrlc::set_handler(move || {
        tracing::info!("Ctrl+C received, shutting down");
        unsafe {
            let _ = PostThreadMessageW(ui_tid, WM_QUIT, WPARAM(0), LPARAM(0));
        }
    })
    .context("installing Ctrl+C handler")
}

/// Standard GetMessage/Dispatch loop terminated by WM_QUIT.
pub fn run_message_loop() -> Result<()> {
    unsafe {
        let mut msg = MSG::default();
        loop {
            let r = GetMessageW(&mut msg, None, 0, 0);
            if r.0 == -1 {
                return Err(anyhow!("GetMessageW failed"));
            }
            if r.0 == 0 {
                return Ok(());
            }
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}
