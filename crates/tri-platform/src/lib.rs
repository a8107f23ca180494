// SPDX-License-Identifier: CEPL-1.0
//! Window + surface handles for the renderer.
//!
//! The render core never sees a windowing library; it only asks a
//! [`SurfaceProvider`] for raw display/window handles.

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tri_core::events::EventBus;

#[cfg(any(
    windows,
    target_os = "macos",
    target_os = "android",
    target_os = "linux",
    target_os = "dragonfly",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
))]
mod winit_provider;
#[cfg(any(
    windows,
    target_os = "macos",
    target_os = "android",
    target_os = "linux",
    target_os = "dragonfly",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
))]
pub use winit_provider::WinitSurfaceProvider;

pub use winit;

#[derive(thiserror::Error, Debug)]
pub enum PlatformError {
    #[error("event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("window creation: {0}")]
    Os(#[from] winit::error::OsError),
    #[error("a window is already open")]
    WindowExists,
    #[error("event loop never resumed; no window was created")]
    NotResumed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowDesc {
    pub title: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowDesc {
    fn default() -> Self {
        Self {
            title: "Triangle".to_owned(),
            x: 200,
            y: 200,
            width: 1280,
            height: 720,
        }
    }
}

/// Borrowed native handles of the current window.
#[derive(Clone, Copy)]
pub struct SurfaceTarget<'a> {
    pub window: &'a dyn HasWindowHandle,
    pub display: &'a dyn HasDisplayHandle,
}

/// One OS window and its message pump.
pub trait SurfaceProvider {
    fn create_window(&mut self, desc: &WindowDesc) -> Result<(), PlatformError>;
    /// Closes the window. No-op when none is open.
    fn destroy_window(&mut self);
    fn show_window(&mut self) -> bool;
    fn hide_window(&mut self) -> bool;
    /// Drains pending OS messages without blocking, firing
    /// [`EventCode::APPLICATION_QUIT`](tri_core::events::EventCode::APPLICATION_QUIT)
    /// and [`EventCode::RESIZED`](tri_core::events::EventCode::RESIZED) on `events`.
    /// Returns false once the platform has shut its event loop.
    fn pump_messages(&mut self, events: &mut EventBus) -> bool;
    fn surface(&self) -> Option<SurfaceTarget<'_>>;
    /// Current drawable size in pixels, `(0, 0)` without a window.
    fn framebuffer_size(&self) -> (u32, u32);
}
