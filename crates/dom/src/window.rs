//! The global scope: a document plus the event loop around it.
//!
//! Time is virtual. The host drives the loop explicitly with
//! [`Window::run_animation_frame`], [`Window::advance_time`] and
//! [`Window::perform_microtask_checkpoint`], which makes scheduling
//! deterministic in tests.

use crate::event::{Event, ListenerId};
use crate::Document;
use crate::mutation::{MutationObserver, ObserverInner};
use anyhow::{Context as _, Result};
use core::cell::{Cell, RefCell};
use core::fmt::{self, Debug, Formatter};
use core::mem::take;
use core::time::Duration;
use log::trace;
use std::rc::{Rc, Weak};
use url::Url;

/// Nominal length of one animation frame.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Handle returned by [`Window::request_animation_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Handle returned by [`Window::set_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u64);

type FrameCallback = Box<dyn FnOnce(Duration)>;
type TimerCallback = Box<dyn FnOnce()>;
type Listener = Rc<dyn Fn(&Event)>;

struct Timer {
    handle: TimerHandle,
    due: Duration,
    callback: TimerCallback,
}

struct WindowInner {
    document: Document,
    next_id: Cell<u64>,
    now: Cell<Duration>,
    frames: RefCell<Vec<(FrameHandle, FrameCallback)>>,
    timers: RefCell<Vec<Timer>>,
    listeners: RefCell<Vec<(ListenerId, String, Listener)>>,
    observers: RefCell<Vec<Weak<ObserverInner>>>,
}

/// A shared handle to the global scope. Clones refer to the same window.
#[derive(Clone)]
pub struct Window {
    inner: Rc<WindowInner>,
}

thread_local! {
    static CURRENT: RefCell<Option<Window>> = const { RefCell::new(None) };
}

/// The window installed on this thread, like `globalThis.window` in a browser.
pub fn window() -> Option<Window> {
    CURRENT.with(|current| current.borrow().clone())
}

impl Window {
    /// A window over a fresh document at `url`.
    pub fn new(url: Url) -> Self {
        Self {
            inner: Rc::new(WindowInner {
                document: Document::new(url),
                next_id: Cell::new(1),
                now: Cell::new(Duration::ZERO),
                frames: RefCell::new(Vec::new()),
                timers: RefCell::new(Vec::new()),
                listeners: RefCell::new(Vec::new()),
                observers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// # Errors
    /// When `url` does not parse.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).with_context(|| format!("invalid document url {url:?}"))?;
        Ok(Self::new(parsed))
    }

    /// Make this the current window of the thread.
    pub fn install(&self) {
        CURRENT.with(|current| *current.borrow_mut() = Some(self.clone()));
    }

    /// Clear the current window of the thread.
    pub fn uninstall() {
        CURRENT.with(|current| current.borrow_mut().take());
    }

    pub fn document(&self) -> Document {
        self.inner.document.clone()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.inner.now.get()
    }

    pub(crate) fn next_id(&self) -> u64 {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id.saturating_add(1));
        id
    }

    pub(crate) fn register_observer(&self, observer: Weak<ObserverInner>) {
        let mut observers = self.inner.observers.borrow_mut();
        observers.retain(|existing| existing.strong_count() > 0);
        observers.push(observer);
    }

    // --- Microtasks ---------------------------------------------------------

    /// Deliver queued mutation records to their observers until none are left.
    /// Returns the number of callback invocations.
    pub fn perform_microtask_checkpoint(&self) -> usize {
        let mut delivered = 0_usize;
        loop {
            let live: Vec<MutationObserver> = self
                .inner
                .observers
                .borrow()
                .iter()
                .filter_map(Weak::upgrade)
                .map(MutationObserver::from_inner)
                .collect();
            let round = live.iter().filter(|observer| observer.deliver()).count();
            if round == 0 {
                return delivered;
            }
            delivered = delivered.saturating_add(round);
        }
    }

    // --- Animation frames ---------------------------------------------------

    pub fn request_animation_frame(&self, callback: impl FnOnce(Duration) + 'static) -> FrameHandle {
        let handle = FrameHandle(self.next_id());
        self.inner
            .frames
            .borrow_mut()
            .push((handle, Box::new(callback)));
        handle
    }

    pub fn cancel_animation_frame(&self, handle: FrameHandle) {
        self.inner
            .frames
            .borrow_mut()
            .retain(|(queued, _)| *queued != handle);
    }

    pub fn has_pending_animation_frames(&self) -> bool {
        !self.inner.frames.borrow().is_empty()
    }

    /// Run one frame: flush microtasks, run the callbacks queued before this
    /// frame started (callbacks they queue wait for the next frame), then
    /// flush microtasks again. Returns the number of frame callbacks run.
    pub fn run_animation_frame(&self) -> usize {
        self.perform_microtask_checkpoint();
        self.inner.now.set(self.now().saturating_add(FRAME_INTERVAL));
        let timestamp = self.now();
        let callbacks = take(&mut *self.inner.frames.borrow_mut());
        let count = callbacks.len();
        for (handle, callback) in callbacks {
            trace!("animation frame callback {}", handle.0);
            callback(timestamp);
            self.perform_microtask_checkpoint();
        }
        count
    }

    // --- Timers -------------------------------------------------------------

    pub fn set_timeout(&self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerHandle {
        let handle = TimerHandle(self.next_id());
        let due = self.now().saturating_add(delay);
        self.inner.timers.borrow_mut().push(Timer {
            handle,
            due,
            callback: Box::new(callback),
        });
        handle
    }

    pub fn clear_timeout(&self, handle: TimerHandle) {
        self.inner
            .timers
            .borrow_mut()
            .retain(|timer| timer.handle != handle);
    }

    /// Move the clock forward, firing due timers in order of due time.
    /// Returns the number of timers fired.
    pub fn advance_time(&self, duration: Duration) -> usize {
        self.perform_microtask_checkpoint();
        let target = self.now().saturating_add(duration);
        let mut fired = 0_usize;
        while let Some(timer) = self.pop_due_timer(target) {
            self.inner.now.set(timer.due.max(self.now()));
            (timer.callback)();
            self.perform_microtask_checkpoint();
            fired = fired.saturating_add(1);
        }
        self.inner.now.set(target);
        fired
    }

    fn pop_due_timer(&self, deadline: Duration) -> Option<Timer> {
        let mut timers = self.inner.timers.borrow_mut();
        let position = timers
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.due <= deadline)
            .min_by_key(|(index, timer)| (timer.due, *index))
            .map(|(index, _)| index)?;
        Some(timers.remove(position))
    }

    // --- Events -------------------------------------------------------------

    pub fn add_event_listener(
        &self,
        event_type: &str,
        listener: impl Fn(&Event) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id());
        self.inner
            .listeners
            .borrow_mut()
            .push((id, event_type.to_owned(), Rc::new(listener)));
        id
    }

    pub fn remove_event_listener(&self, id: ListenerId) {
        self.inner
            .listeners
            .borrow_mut()
            .retain(|(registered, _, _)| *registered != id);
    }

    /// Synchronously call every listener registered for the event's type.
    /// Returns the number of listeners called.
    pub fn dispatch_event(&self, event: &Event) -> usize {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|(_, event_type, _)| *event_type == event.event_type)
            .map(|(_, _, listener)| Rc::clone(listener))
            .collect();
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }
}

impl Debug for Window {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("document", &self.inner.document)
            .field("now", &self.now())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_window() -> Window {
        Window::from_url("https://app.example/").unwrap()
    }

    #[test]
    fn frames_queued_during_a_frame_wait_for_the_next() {
        let window = test_window();
        let hits = Rc::new(Cell::new(0));
        let inner_window = window.clone();
        let counter = Rc::clone(&hits);
        window.request_animation_frame(move |_| {
            counter.set(counter.get() + 1);
            let again = Rc::clone(&counter);
            inner_window.request_animation_frame(move |_| again.set(again.get() + 10));
        });
        assert_eq!(window.run_animation_frame(), 1);
        assert_eq!(hits.get(), 1);
        assert_eq!(window.run_animation_frame(), 1);
        assert_eq!(hits.get(), 11);
    }

    #[test]
    fn cancelled_frames_and_timers_never_run() {
        let window = test_window();
        let ran = Rc::new(Cell::new(false));
        let (frame_flag, timer_flag) = (Rc::clone(&ran), Rc::clone(&ran));
        let frame = window.request_animation_frame(move |_| frame_flag.set(true));
        window.cancel_animation_frame(frame);
        let timer = window.set_timeout(Duration::from_millis(5), move || timer_flag.set(true));
        window.clear_timeout(timer);
        assert_eq!(window.run_animation_frame(), 0);
        assert_eq!(window.advance_time(Duration::from_secs(1)), 0);
        assert!(!ran.get());
    }

    #[test]
    fn timers_fire_in_due_order() {
        let window = test_window();
        let order = Rc::new(RefCell::new(Vec::new()));
        for (delay, label) in [(30, "b"), (10, "a"), (50, "c")] {
            let log = Rc::clone(&order);
            window.set_timeout(Duration::from_millis(delay), move || log.borrow_mut().push(label));
        }
        assert_eq!(window.advance_time(Duration::from_millis(40)), 2);
        assert_eq!(*order.borrow(), vec!["a", "b"]);
        assert_eq!(window.now(), Duration::from_millis(40));
    }

    #[test]
    fn listeners_receive_matching_events() {
        let window = test_window();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let id = window.add_event_listener("stylesUpdated", move |event| {
            log.borrow_mut().push(event.detail.clone());
        });
        window.dispatch_event(&Event::new("other", json!(null)));
        window.dispatch_event(&Event::new("stylesUpdated", json!({"--a": "1"})));
        window.remove_event_listener(id);
        assert_eq!(window.dispatch_event(&Event::new("stylesUpdated", json!({}))), 0);
        assert_eq!(*seen.borrow(), vec![json!({"--a": "1"})]);
    }

    #[test]
    fn install_sets_the_thread_global() {
        let window = test_window();
        window.install();
        assert!(super::window().is_some());
        Window::uninstall();
        assert!(super::window().is_none());
    }
}
