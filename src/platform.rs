//! Platform seams used by the launcher core.
//!
//! Window chrome and the system clipboard belong to the native frontend. The
//! core talks to them through these traits; the headless implementations back
//! the CLI and the tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::commands::WindowSize;

/// Visibility and size changes requested by the navigation stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    Show(WindowSize),
    Resize(WindowSize),
    Hide,
}

/// The launcher's host window.
pub trait HostWindow {
    /// Make the window visible at `size`.
    fn show(&mut self, size: WindowSize);
    /// Resize an already visible window.
    fn resize(&mut self, size: WindowSize);
    fn hide(&mut self);
    fn is_visible(&self) -> bool;
}

/// Window stand-in that records every event.
///
/// Clones share the same event log, so a test can keep one handle while the
/// navigator owns another.
#[derive(Debug, Clone, Default)]
pub struct HeadlessWindow {
    state: Rc<RefCell<HeadlessState>>,
}

#[derive(Debug, Default)]
struct HeadlessState {
    visible: bool,
    size: Option<WindowSize>,
    events: Vec<WindowEvent>,
}

impl HeadlessWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WindowEvent> {
        self.state.borrow().events.clone()
    }

    pub fn last_event(&self) -> Option<WindowEvent> {
        self.state.borrow().events.last().copied()
    }

    pub fn size(&self) -> Option<WindowSize> {
        self.state.borrow().size
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }
}

impl HostWindow for HeadlessWindow {
    fn show(&mut self, size: WindowSize) {
        let mut state = self.state.borrow_mut();
        state.visible = true;
        state.size = Some(size);
        state.events.push(WindowEvent::Show(size));
    }

    fn resize(&mut self, size: WindowSize) {
        let mut state = self.state.borrow_mut();
        state.size = Some(size);
        state.events.push(WindowEvent::Resize(size));
    }

    fn hide(&mut self) {
        let mut state = self.state.borrow_mut();
        state.visible = false;
        state.events.push(WindowEvent::Hide);
    }

    fn is_visible(&self) -> bool {
        self.state.borrow().visible
    }
}

/// Read/write system clipboard
pub trait ClipboardAccess {
    fn get_text(&self) -> Option<String>;
    fn set_text(&self, content: &str);
}

/// Process-local clipboard.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    content: Rc<RefCell<Option<String>>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClipboardAccess for MemoryClipboard {
    fn get_text(&self) -> Option<String> {
        self.content.borrow().clone()
    }

    fn set_text(&self, content: &str) {
        *self.content.borrow_mut() = Some(content.to_string());
    }
}
