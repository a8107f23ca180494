// SPDX-License-Identifier: CEPL-1.0
//! Publish/subscribe by integer code.
//!
//! Listeners run synchronously inside [`EventBus::fire`], in registration
//! order. A listener returning `true` consumes the event and later listeners
//! for that code are not called.

use std::collections::HashMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventCode(pub u16);

impl EventCode {
    /// The user or the OS asked the application to close.
    pub const APPLICATION_QUIT: EventCode = EventCode(0x01);
    /// The window's drawable size changed. Payload: `u16[0]` width, `u16[1]` height.
    pub const RESIZED: EventCode = EventCode(0x02);
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EventCode::APPLICATION_QUIT => f.write_str("APPLICATION_QUIT"),
            EventCode::RESIZED => f.write_str("RESIZED"),
            EventCode(raw) => write!(f, "0x{raw:04x}"),
        }
    }
}

/// 16 bytes of payload, readable as whichever width the event code implies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventContext {
    pub u16: [u16; 8],
}

impl EventContext {
    pub fn size(width: u16, height: u16) -> Self {
        let mut ctx = Self::default();
        ctx.u16[0] = width;
        ctx.u16[1] = height;
        ctx
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(EventCode, &str, &EventContext) -> bool>;

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: HashMap<EventCode, Vec<(ListenerId, Listener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, code: EventCode, listener: F) -> ListenerId
    where
        F: FnMut(EventCode, &str, &EventContext) -> bool + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(code)
            .or_default()
            .push((id, Box::new(listener)));
        tracing::trace!("registered listener {:?} for {}", id, code);
        id
    }

    /// Returns false if `id` was not registered for `code`.
    pub fn unregister(&mut self, code: EventCode, id: ListenerId) -> bool {
        let Some(list) = self.listeners.get_mut(&code) else {
            return false;
        };
        let before = list.len();
        list.retain(|(lid, _)| *lid != id);
        before != list.len()
    }

    /// Returns true if some listener consumed the event.
    pub fn fire(&mut self, code: EventCode, sender: &str, ctx: EventContext) -> bool {
        let Some(list) = self.listeners.get_mut(&code) else {
            tracing::trace!("{} from {} has no listeners", code, sender);
            return false;
        };
        for (_, listener) in list.iter_mut() {
            if listener(code, sender, &ctx) {
                return true;
            }
        }
        false
    }

    pub fn listener_count(&self, code: EventCode) -> usize {
        self.listeners.get(&code).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn quit_listener_clears_running_flag() {
        let running = Rc::new(Cell::new(true));
        let mut bus = EventBus::new();
        let flag = running.clone();
        bus.register(EventCode::APPLICATION_QUIT, move |_, _, _| {
            flag.set(false);
            false
        });

        assert!(!bus.fire(EventCode::APPLICATION_QUIT, "test", EventContext::default()));
        assert!(!running.get());
    }

    #[test]
    fn unhandled_code_returns_false() {
        let mut bus = EventBus::new();
        assert!(!bus.fire(EventCode::RESIZED, "test", EventContext::size(800, 600)));
        assert_eq!(bus.listener_count(EventCode::RESIZED), 0);
    }

    #[test]
    fn consuming_listener_stops_propagation() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();
        for (name, consume) in [("a", false), ("b", true), ("c", false)] {
            let calls = calls.clone();
            bus.register(EventCode::RESIZED, move |_, _, _| {
                calls.borrow_mut().push(name);
                consume
            });
        }

        assert!(bus.fire(EventCode::RESIZED, "test", EventContext::default()));
        assert_eq!(*calls.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn payload_and_sender_reach_listener() {
        let seen = Rc::new(Cell::new((0u16, 0u16)));
        let mut bus = EventBus::new();
        let s = seen.clone();
        bus.register(EventCode::RESIZED, move |code, sender, ctx| {
            assert_eq!(code, EventCode::RESIZED);
            assert_eq!(sender, "window");
            s.set((ctx.u16[0], ctx.u16[1]));
            true
        });

        bus.fire(EventCode::RESIZED, "window", EventContext::size(1280, 720));
        assert_eq!(seen.get(), (1280, 720));
    }

    #[test]
    fn unregister_removes_only_that_listener() {
        let hits = Rc::new(Cell::new(0));
        let mut bus = EventBus::new();
        let h1 = hits.clone();
        let first = bus.register(EventCode::APPLICATION_QUIT, move |_, _, _| {
            h1.set(h1.get() + 1);
            false
        });
        let h2 = hits.clone();
        bus.register(EventCode::APPLICATION_QUIT, move |_, _, _| {
            h2.set(h2.get() + 10);
            false
        });

        assert!(bus.unregister(EventCode::APPLICATION_QUIT, first));
        assert!(!bus.unregister(EventCode::APPLICATION_QUIT, first));
        assert!(!bus.unregister(EventCode::RESIZED, first));

        bus.fire(EventCode::APPLICATION_QUIT, "test", EventContext::default());
        assert_eq!(hits.get(), 10);
    }

    #[test]
    fn display_names_known_codes() {
        assert_eq!(EventCode::APPLICATION_QUIT.to_string(), "APPLICATION_QUIT");
        assert_eq!(EventCode(0x42).to_string(), "0x0042");
    }
}
