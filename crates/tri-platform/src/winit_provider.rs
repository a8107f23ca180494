// SPDX-License-Identifier: CEPL-1.0
use std::time::Duration;

use tracing::{debug, info};
use tri_core::events::{EventBus, EventCode, EventContext};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{PlatformError, SurfaceProvider, SurfaceTarget, WindowDesc};

const SENDER: &str = "winit";
// Upper bound on pumps while waiting for `resumed` to hand out the window.
const CREATE_PUMPS: usize = 64;

pub struct WinitSurfaceProvider {
    event_loop: EventLoop<()>,
    shell: Shell,
}

#[derive(Default)]
struct Shell {
    pending: Option<WindowAttributes>,
    window: Option<Window>,
    size: (u32, u32),
    create_error: Option<winit::error::OsError>,
    exited: bool,
}

/// Handler handed to one `pump_app_events` call. Owns nothing; events go
/// straight to the bus when there is one.
struct Pump<'a> {
    shell: &'a mut Shell,
    events: Option<&'a mut EventBus>,
}

impl Pump<'_> {
    fn fire(&mut self, code: EventCode, ctx: EventContext) {
        if let Some(bus) = self.events.as_deref_mut() {
            bus.fire(code, SENDER, ctx);
        }
    }
}

impl ApplicationHandler for Pump<'_> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attrs) = self.shell.pending.take() else {
            return;
        };
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let size = window.inner_size();
                self.shell.size = (size.width, size.height);
                self.shell.window = Some(window);
            }
            Err(e) => self.shell.create_error = Some(e),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        match &self.shell.window {
            Some(w) if w.id() == id => {}
            _ => return,
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("close requested");
                self.fire(EventCode::APPLICATION_QUIT, EventContext::default());
            }
            WindowEvent::Resized(new_size) => {
                if let Some(ctx) = resize_event(self.shell.size, new_size) {
                    self.shell.size = (new_size.width, new_size.height);
                    debug!("resized → {}x{}", new_size.width, new_size.height);
                    self.fire(EventCode::RESIZED, ctx);
                }
            }
            _ => {}
        }
    }
}

/// A resize is only worth announcing when it is non-zero and actually new.
fn resize_event(current: (u32, u32), new_size: PhysicalSize<u32>) -> Option<EventContext> {
    if new_size.width == 0 || new_size.height == 0 {
        return None;
    }
    if (new_size.width, new_size.height) == current {
        return None;
    }
    let clamp = |v: u32| u16::try_from(v).unwrap_or(u16::MAX);
    Some(EventContext::size(clamp(new_size.width), clamp(new_size.height)))
}

impl WinitSurfaceProvider {
    pub fn new() -> Result<Self, PlatformError> {
        Ok(Self {
            event_loop: EventLoop::new()?,
            shell: Shell::default(),
        })
    }

    fn pump(&mut self, timeout: Option<Duration>, events: Option<&mut EventBus>) -> PumpStatus {
        let mut handler = Pump {
            shell: &mut self.shell,
            events,
        };
        self.event_loop.pump_app_events(timeout, &mut handler)
    }
}

impl SurfaceProvider for WinitSurfaceProvider {
    fn create_window(&mut self, desc: &WindowDesc) -> Result<(), PlatformError> {
        if self.shell.window.is_some() {
            return Err(PlatformError::WindowExists);
        }
        self.shell.pending = Some(
            Window::default_attributes()
                .with_title(desc.title.clone())
                .with_position(PhysicalPosition::new(desc.x, desc.y))
                .with_inner_size(PhysicalSize::new(desc.width, desc.height))
                .with_visible(false),
        );

        for _ in 0..CREATE_PUMPS {
            if let PumpStatus::Exit(code) = self.pump(Some(Duration::from_millis(1)), None) {
                debug!("event loop exited with {code} during window creation");
                self.shell.exited = true;
                break;
            }
            if let Some(e) = self.shell.create_error.take() {
                self.shell.pending = None;
                return Err(e.into());
            }
            if self.shell.window.is_some() {
                info!("window `{}` created", desc.title);
                return Ok(());
            }
        }
        self.shell.pending = None;
        Err(PlatformError::NotResumed)
    }

    fn destroy_window(&mut self) {
        if self.shell.window.take().is_some() {
            self.shell.size = (0, 0);
            debug!("window destroyed");
        }
    }

    fn show_window(&mut self) -> bool {
        match &self.shell.window {
            Some(w) => {
                w.set_visible(true);
                true
            }
            None => false,
        }
    }

    fn hide_window(&mut self) -> bool {
        match &self.shell.window {
            Some(w) => {
                w.set_visible(false);
                true
            }
            None => false,
        }
    }

    fn pump_messages(&mut self, events: &mut EventBus) -> bool {
        if self.shell.exited {
            return false;
        }
        if let PumpStatus::Exit(code) = self.pump(Some(Duration::ZERO), Some(&mut *events)) {
            info!("event loop exited with {code}");
            self.shell.exited = true;
            events.fire(EventCode::APPLICATION_QUIT, SENDER, EventContext::default());
            return false;
        }
        true
    }

    fn surface(&self) -> Option<SurfaceTarget<'_>> {
        self.shell.window.as_ref().map(|w| SurfaceTarget {
            window: w,
            display: w,
        })
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.shell.size
    }
}
