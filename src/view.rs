//! Presentation sink.
//!
//! The router and pager never print directly; they push text into a [`View`]
//! so the core can run without a terminal.

/// Display collaborator for pager text and connection status.
pub trait View {
    fn set_pager_text(&self, text: &str);
    fn set_connection_status(&self, text: &str);
}

/// Writes pager text to stdout and status changes to stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalView;

impl View for TerminalView {
    fn set_pager_text(&self, text: &str) {
        println!("{text}");
    }

    fn set_connection_status(&self, text: &str) {
        eprintln!("[{text}]");
    }
}
