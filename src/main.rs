//! Overlay a borderless child window on top of another application's window.
//!
//! High-level flow:
//! 1. Parse CLI and initialize tracing.
//! 2. Resolve the host window by exact title (from `--title` or the control window).
//! 3. Create a transparent guest, turn it into a child of the host and reparent it.
//! 4. Measure the host on a background thread and derive the guest size from the host's
//!    extent, its chrome and the guest's scale.
//! 5. Post the result back to the guest's own message queue, where the guest is moved,
//!    resized and finally made opaque.
//! 6. Run the Win32 message loop until the control window closes or Ctrl+C posts WM_QUIT.
//!
//! The orchestration core is platform-neutral and talks to the OS only through
//! [`window_system::WindowQuery`] and [`window_system::WindowSystem`]; the Win32 binding lives in
//! `winsys`.

#![cfg_attr(not(windows), allow(dead_code))]

mod cli;
mod dispatch;
mod embed;
mod error;
#[cfg(test)]
mod fake;
mod geometry;
#[cfg(windows)]
mod guest;
#[cfg(windows)]
mod gui;
mod logging;
mod window;
mod window_system;
#[cfg(windows)]
mod winhost;
#[cfg(windows)]
mod winsys;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::Cli;
use logging::configure_logging;

/// Program entry point.
///
/// Errors surfaced before the message loop starts result in a non-zero exit code via anyhow.
fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_logging(cli.log_level());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        ?cli,
        "starting winembed"
    );

    run(cli)
}

#[cfg(not(windows))]
fn run(_cli: Cli) -> Result<()> {
    anyhow::bail!("winembed drives Win32 windows and only runs on Windows")
}

#[cfg(windows)]
fn run(cli: Cli) -> Result<()> {
    use std::sync::{Arc, Mutex};

    use anyhow::Context;
    use tracing::{error, warn};

    use dispatch::{UiTask, UiThread};
    use embed::{Embedder, Embedding, retain_pending};
    use guest::GuestDispatcher;
    use window::WindowHandle;
    use winsys::Win32WindowSystem;

    let sys = Arc::new(Win32WindowSystem);
    let embedder = Arc::new(Embedder::new(
        Arc::clone(&sys),
        Arc::new(GuestDispatcher),
        cli.embed_config(),
    ));
    {
        let embedder = Arc::clone(&embedder);
        guest::set_task_handler(Arc::new(move |ui: &UiThread, task: UiTask| {
            embedder.handle_ui_task(ui, task)
        }));
    }
    winhost::install_ctrlc_quit()?;

    // Sessions still in flight, with their measuring threads. Settled ones are joined and dropped.
    let embeddings: Arc<Mutex<Vec<Embedding>>> = Arc::new(Mutex::new(Vec::new()));
    let ui = UiThread::enter();

    let embed_title = {
        let sys = Arc::clone(&sys);
        let embedder = Arc::clone(&embedder);
        let embeddings = Arc::clone(&embeddings);
        let inspect = cli.inspect;
        move |ui: &UiThread, title: &str| -> error::Result<WindowHandle> {
            if inspect {
                match WindowHandle::find_by_title(&*sys, title).map(|h| h.snapshot(&*sys)) {
                    Some(Ok(snapshot)) => info!(?snapshot, "host window"),
                    Some(Err(e)) => warn!(%e, "host snapshot failed"),
                    None => {}
                }
            }
            let embedding = embedder.embed(ui, title)?;
            let guest = embedding.guest;
            info!(
                session = embedding.session().id(),
                host = %embedding.host,
                %guest,
                "embedding scheduled"
            );
            if let Ok(mut list) = embeddings.lock() {
                retain_pending(&mut list);
                list.push(embedding);
            }
            Ok(guest)
        }
    };

    match cli.title.as_deref() {
        Some(title) => {
            embed_title(&ui, title).with_context(|| format!("embedding into {title:?}"))?;
        }
        None => {
            let window_title = format!("WinEmbed v{}", env!("CARGO_PKG_VERSION"));
            gui::create_main_window(&window_title, "")?;
            gui::set_embed_callback(Arc::new(move |ui: &UiThread, title: &str| {
                match embed_title(ui, title) {
                    Ok(guest) => gui::set_status(&format!("Guest {guest} attached to {title:?}")),
                    Err(e) => {
                        if e.is_user_error() {
                            warn!(%e, code = e.error_code(), "embed failed");
                        } else {
                            error!(%e, code = e.error_code(), "embed failed");
                        }
                        gui::set_status(&e.to_string());
                    }
                }
            }));
        }
    }

    let res = winhost::run_message_loop();
    if let Ok(list) = embeddings.lock() {
        for embedding in list.iter() {
            info!(
                session = embedding.session().id(),
                state = ?embedding.state(),
                "session at shutdown"
            );
        }
    }
    res
}
