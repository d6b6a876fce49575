//! Alert sink and the one-shot termination sequence

use std::sync::atomic::{AtomicBool, Ordering};

/// Receiver of operator alerts (signal loss, signal restored, termination)
pub trait Alerter {
    fn alert(&mut self, message: &str);
}

/// Alerter that writes every alert to the log at error level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlerter;

impl Alerter for LogAlerter {
    fn alert(&mut self, message: &str) {
        log::error!("alert: {}", message);
    }
}

impl<A: Alerter + ?Sized> Alerter for Box<A> {
    fn alert(&mut self, message: &str) {
        (**self).alert(message)
    }
}

/// Guard for the single fatal-exit path
///
/// The first request raises a `terminating` alert; later requests find the
/// flag already set and return without alerting again.
#[derive(Debug, Default)]
pub struct Termination {
    triggered: AtomicBool,
}

impl Termination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if this call performed the termination alert
    pub fn terminate(&self, alerter: &mut dyn Alerter, reason: &str) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        alerter.alert(&format!("terminating: {}", reason));
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

/// In-memory alerter whose clones share one message list
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub(crate) struct AlertLog {
    messages: std::rc::Rc<std::cell::RefCell<Vec<String>>>,
}

#[cfg(test)]
impl AlertLog {
    pub(crate) fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }
}

#[cfg(test)]
impl Alerter for AlertLog {
    fn alert(&mut self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminate_alerts_once() {
        let termination = Termination::new();
        let mut alerts = AlertLog::default();

        assert!(!termination.is_triggered());
        assert!(termination.terminate(&mut alerts, "cannot open [x.dat]"));
        assert!(!termination.terminate(&mut alerts, "second failure during unwind"));

        assert!(termination.is_triggered());
        assert_eq!(alerts.messages(), ["terminating: cannot open [x.dat]"]);
    }
}
