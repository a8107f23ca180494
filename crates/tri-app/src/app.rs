// SPDX-License-Identifier: CEPL-1.0
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{error, info};
use tri_core::events::{EventBus, EventCode};
use tri_platform::SurfaceProvider;
use tri_render::Renderer;

/// Registers the listener that ends the main loop. The returned flag starts
/// out `true` and drops to `false` on the first quit event.
pub fn quit_flag(events: &mut EventBus) -> Rc<Cell<bool>> {
    let running = Rc::new(Cell::new(true));
    let flag = Rc::clone(&running);
    events.register(EventCode::APPLICATION_QUIT, move |_, sender, _| {
        info!("quit requested by {sender}");
        flag.set(false);
        true
    });
    running
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub skipped: u64,
}

/// Logs frames per second roughly once a second.
struct FpsCounter {
    frames: u32,
    since: Instant,
}

impl FpsCounter {
    fn new(now: Instant) -> Self {
        Self { frames: 0, since: now }
    }

    /// Returns the count for the window that just closed, if one did.
    fn frame(&mut self, now: Instant) -> Option<u32> {
        self.frames = self.frames.saturating_add(1);
        if now.duration_since(self.since) < Duration::from_secs(1) {
            return None;
        }
        let fps = self.frames;
        self.frames = 0;
        self.since = now;
        Some(fps)
    }
}

/// Pump, render, repeat until `running` drops. A failed frame is logged and
/// the loop carries on with the next one.
pub fn run_loop<P, R>(
    platform: &mut P,
    renderer: &mut R,
    events: &mut EventBus,
    running: &Cell<bool>,
) -> LoopStats
where
    P: SurfaceProvider + ?Sized,
    R: Renderer + ?Sized,
{
    let mut stats = LoopStats::default();
    let mut fps = FpsCounter::new(Instant::now());

    while running.get() {
        if !platform.pump_messages(events) || !running.get() {
            break;
        }
        match renderer.render() {
            Ok(()) => {
                stats.frames += 1;
                if let Some(n) = fps.frame(Instant::now()) {
                    info!("fps ~ {n}");
                }
            }
            Err(e) => {
                stats.skipped += 1;
                error!("render error: {e:#}");
            }
        }
    }
    info!(
        "main loop done: {} frame(s), {} skipped",
        stats.frames, stats.skipped
    );
    stats
}
