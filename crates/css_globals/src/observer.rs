//! Turns stylesheet-relevant DOM mutations into coalesced refreshes.

use crate::config::Scheduling;
use crate::tag_filter::batch_touches_styles;
use core::cell::Cell;
use dom::{FrameHandle, MutationObserver, MutationObserverInit, NodeKey, TimerHandle, Window};
use log::trace;
use std::rc::Rc;
use tracing::info_span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheduled {
    Frame(FrameHandle),
    Timer(TimerHandle),
}

type UpdateFn = Rc<dyn Fn()>;

/// Watches a subtree and runs `on_update` once per burst of `<style>`/`<link>`
/// insertions and removals.
pub struct ChangeObserver {
    window: Window,
    observer: MutationObserver,
    pending: Rc<Cell<Option<Scheduled>>>,
}

impl ChangeObserver {
    pub fn attach(
        window: &Window,
        target: NodeKey,
        init: MutationObserverInit,
        scheduling: Scheduling,
        on_update: impl Fn() + 'static,
    ) -> Self {
        let pending: Rc<Cell<Option<Scheduled>>> = Rc::new(Cell::new(None));
        let on_update: UpdateFn = Rc::new(on_update);
        let observer = {
            let scope = window.clone();
            let pending = Rc::clone(&pending);
            MutationObserver::new(window, move |records, _| {
                let _span =
                    info_span!("css_globals.observer_batch", records = records.len()).entered();
                if batch_touches_styles(&records) {
                    schedule(&scope, scheduling, &pending, &on_update);
                }
            })
        };
        observer.observe(target, init);
        Self {
            window: window.clone(),
            observer,
            pending,
        }
    }

    pub fn has_pending_update(&self) -> bool {
        self.pending.get().is_some()
    }

    /// Stop observing and cancel an update that has not run yet.
    pub fn disconnect(&self) {
        self.observer.disconnect();
        match self.pending.take() {
            Some(Scheduled::Frame(handle)) => self.window.cancel_animation_frame(handle),
            Some(Scheduled::Timer(handle)) => self.window.clear_timeout(handle),
            None => {}
        }
    }
}

impl Drop for ChangeObserver {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn schedule(
    window: &Window,
    scheduling: Scheduling,
    pending: &Rc<Cell<Option<Scheduled>>>,
    on_update: &UpdateFn,
) {
    let run = {
        let pending = Rc::clone(pending);
        let on_update = Rc::clone(on_update);
        move || {
            pending.set(None);
            on_update();
        }
    };
    match scheduling {
        Scheduling::AnimationFrame => {
            if pending.get().is_some() {
                trace!("style change coalesced into the pending frame");
                return;
            }
            let handle = window.request_animation_frame(move |_| run());
            pending.set(Some(Scheduled::Frame(handle)));
        }
        Scheduling::Debounce(delay) => {
            match pending.take() {
                Some(Scheduled::Timer(handle)) => window.clear_timeout(handle),
                Some(Scheduled::Frame(handle)) => window.cancel_animation_frame(handle),
                None => {}
            }
            let handle = window.set_timeout(delay, run);
            pending.set(Some(Scheduled::Timer(handle)));
        }
    }
}
