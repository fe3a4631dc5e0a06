//! Popup visibility with a delayed, cancellable hide.
//!
//! There is no background timer: the host passes its clock in and calls
//! [`Popup::poll`] from its frame or tick loop.

use std::time::{Duration, Instant};

use imgnote_core::AnnotationId;

#[derive(Debug, Clone)]
pub struct Popup {
    delay: Duration,
    shown: Option<AnnotationId>,
    hide_at: Option<Instant>,
}

impl Popup {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            shown: None,
            hide_at: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// The annotation whose popup is open.
    pub fn shown(&self) -> Option<&AnnotationId> {
        self.shown.as_ref()
    }

    pub fn is_hide_pending(&self) -> bool {
        self.hide_at.is_some()
    }

    /// Open for `id`. A pending hide is dropped.
    pub fn show(&mut self, id: AnnotationId) {
        self.hide_at = None;
        self.shown = Some(id);
    }

    /// (Re)arm the hide timer. Does nothing while no popup is open.
    pub fn start_hide_timer(&mut self, now: Instant) {
        if self.shown.is_some() {
            self.hide_at = Some(now + self.delay);
        }
    }

    pub fn cancel_hide(&mut self) {
        self.hide_at = None;
    }

    /// Follow a re-keyed annotation.
    pub fn rename(&mut self, from: &AnnotationId, to: AnnotationId) {
        if self.shown.as_ref() == Some(from) {
            self.shown = Some(to);
        }
    }

    /// Close at once, without waiting for the timer.
    pub fn hide(&mut self) -> Option<AnnotationId> {
        self.hide_at = None;
        self.shown.take()
    }

    /// Close the popup if its hide deadline has passed, returning the
    /// annotation it belonged to.
    pub fn poll(&mut self, now: Instant) -> Option<AnnotationId> {
        match self.hide_at {
            Some(deadline) if now >= deadline => self.hide(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> AnnotationId {
        AnnotationId::permanent(s)
    }

    #[test]
    fn test_hides_after_delay() {
        let start = Instant::now();
        let mut popup = Popup::new(Duration::from_millis(300));
        popup.show(id("a"));
        popup.start_hide_timer(start);

        assert_eq!(popup.poll(start + Duration::from_millis(299)), None);
        assert_eq!(popup.poll(start + Duration::from_millis(300)), Some(id("a")));
        assert!(popup.shown().is_none());
        assert_eq!(popup.poll(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn test_show_cancels_pending_hide() {
        let start = Instant::now();
        let mut popup = Popup::new(Duration::from_millis(100));
        popup.show(id("a"));
        popup.start_hide_timer(start);
        popup.show(id("b"));
        assert!(!popup.is_hide_pending());
        assert_eq!(popup.poll(start + Duration::from_secs(1)), None);
        assert_eq!(popup.shown(), Some(&id("b")));
    }

    #[test]
    fn test_restart_pushes_deadline() {
        let start = Instant::now();
        let mut popup = Popup::new(Duration::from_millis(100));
        popup.show(id("a"));
        popup.start_hide_timer(start);
        popup.start_hide_timer(start + Duration::from_millis(80));
        assert_eq!(popup.poll(start + Duration::from_millis(150)), None);
        assert_eq!(popup.poll(start + Duration::from_millis(180)), Some(id("a")));
    }

    #[test]
    fn test_timer_needs_open_popup() {
        let mut popup = Popup::new(Duration::from_millis(10));
        popup.start_hide_timer(Instant::now());
        assert!(!popup.is_hide_pending());
    }

    #[test]
    fn test_rename_follows_commit() {
        let mut popup = Popup::new(Duration::from_millis(10));
        popup.show(id("old"));
        popup.rename(&id("old"), id("new"));
        assert_eq!(popup.shown(), Some(&id("new")));
    }
}
