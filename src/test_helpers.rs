//! Shared fakes for unit tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::transport::{Transport, TransportError};
use crate::view::View;

/// View that records every update.
#[derive(Debug, Default)]
pub struct RecordingView {
    pub pager: RefCell<Vec<String>>,
    pub status: RefCell<Vec<String>>,
}

impl RecordingView {
    pub fn last_pager(&self) -> Option<String> {
        self.pager.borrow().last().cloned()
    }

    pub fn last_status(&self) -> Option<String> {
        self.status.borrow().last().cloned()
    }
}

impl View for RecordingView {
    fn set_pager_text(&self, text: &str) {
        self.pager.borrow_mut().push(text.to_owned());
    }

    fn set_connection_status(&self, text: &str) {
        self.status.borrow_mut().push(text.to_owned());
    }
}

/// Transport that keeps written frames in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingTransport {
    pub sent: Rc<RefCell<Vec<String>>>,
    pub close_requested: Rc<Cell<bool>>,
    pub broken: Rc<Cell<bool>>,
}

impl Transport for RecordingTransport {
    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.broken.get() {
            return Err(TransportError::Closed);
        }
        self.sent.borrow_mut().push(text);
        Ok(())
    }

    fn close(&mut self) {
        self.close_requested.set(true);
    }
}
