//! Page stack navigation.
//!
//! The stack is the single source of navigation truth: the top frame is what
//! the host window shows, and an empty stack means the window is hidden.

use std::rc::Rc;

use crate::commands::{
    CommandId, CommandRegistry, EscapeHandler, RenderResult, ResolvedCommand, WindowSize,
};
use crate::extensions::{ExtensionInfo, ExtensionResult};
use crate::platform::HostWindow;

/// One pushed frame.
#[derive(Clone)]
pub struct PageFrame {
    serial: u64,
    command: CommandId,
    title: String,
    owner: Rc<ExtensionInfo>,
    result: RenderResult,
    size: WindowSize,
    on_escape: Option<EscapeHandler>,
}

impl PageFrame {
    pub fn command(&self) -> &CommandId {
        &self.command
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Owning extension, for resolving extension-relative assets.
    pub fn owner(&self) -> &Rc<ExtensionInfo> {
        &self.owner
    }

    pub fn result(&self) -> &RenderResult {
        &self.result
    }

    pub fn size(&self) -> WindowSize {
        self.size
    }

    pub fn has_escape_handler(&self) -> bool {
        self.on_escape.is_some()
    }
}

impl std::fmt::Debug for PageFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFrame")
            .field("serial", &self.serial)
            .field("command", &self.command)
            .field("size", &self.size)
            .field("on_escape", &self.on_escape.is_some())
            .finish()
    }
}

/// Result of a push attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// A view frame was pushed.
    Pushed,
    /// An action ran; the stack is unchanged unless the home frame collapsed.
    ActionFired,
    /// A view handler produced nothing.
    NothingToShow,
    NotFound,
    Disabled,
    /// The stack changed while the handler ran; the result was discarded.
    Stale,
    Failed(String),
}

/// A push whose handler has not produced its result yet.
///
/// Created by [`Navigator::begin_push`]; the result is applied with
/// [`Navigator::complete_push`], which discards it if the top frame changed.
#[derive(Debug)]
pub struct PendingPush {
    command: CommandId,
    title: String,
    owner: Rc<ExtensionInfo>,
    size: WindowSize,
    is_view: bool,
    top_serial: Option<u64>,
}

impl PendingPush {
    pub fn command(&self) -> &CommandId {
        &self.command
    }
}

pub struct Navigator {
    stack: Vec<PageFrame>,
    window: Box<dyn HostWindow>,
    home: Option<CommandId>,
    next_serial: u64,
}

impl Navigator {
    pub fn new(window: Box<dyn HostWindow>) -> Self {
        Self {
            stack: Vec::new(),
            window,
            home: None,
            next_serial: 0,
        }
    }

    /// Designate the launcher's home command.
    pub fn set_home(&mut self, id: Option<CommandId>) {
        self.home = id;
    }

    pub fn home(&self) -> Option<&CommandId> {
        self.home.as_ref()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn top(&self) -> Option<&PageFrame> {
        self.stack.last()
    }

    pub fn stack(&self) -> &[PageFrame] {
        &self.stack
    }

    pub fn is_visible(&self) -> bool {
        self.window.is_visible()
    }

    /// Look up, invoke and apply a command in one step.
    pub fn push(&mut self, registry: &CommandRegistry, id: &str) -> PushOutcome {
        let pending = match self.begin_push(registry, id) {
            Ok(pending) => pending,
            Err(outcome) => return outcome,
        };
        let result = match registry.get(id) {
            Some(command) => command.invoke(),
            None => return PushOutcome::NotFound,
        };
        self.complete_push(pending, result)
    }

    /// Resolve `id` and capture the stack state the result will apply to.
    pub fn begin_push(
        &self,
        registry: &CommandRegistry,
        id: &str,
    ) -> Result<PendingPush, PushOutcome> {
        let command = match registry.get(id) {
            Some(command) => command,
            None => {
                tracing::warn!(command = id, "push of unknown command ignored");
                return Err(PushOutcome::NotFound);
            }
        };
        if command.disabled() {
            tracing::debug!(command = id, "push of disabled command ignored");
            return Err(PushOutcome::Disabled);
        }

        Ok(self.pending_for(command))
    }

    fn pending_for(&self, command: ResolvedCommand<'_>) -> PendingPush {
        PendingPush {
            command: command.id.clone(),
            title: command.title.clone(),
            owner: command.owner.clone(),
            size: command.resolved_window_size(),
            is_view: command.kind.is_view(),
            top_serial: self.top_serial(),
        }
    }

    /// Apply a handler result produced for `pending`.
    pub fn complete_push(
        &mut self,
        pending: PendingPush,
        result: ExtensionResult<Option<RenderResult>>,
    ) -> PushOutcome {
        if self.top_serial() != pending.top_serial {
            tracing::debug!(command = %pending.command, "discarding result for a stale frame");
            return PushOutcome::Stale;
        }

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(command = %pending.command, error = %e, "command handler failed");
                return PushOutcome::Failed(e.to_string());
            }
        };

        if !pending.is_view {
            if self.is_lone_home_frame() {
                self.clear();
            }
            return PushOutcome::ActionFired;
        }

        match result {
            Some(result) => {
                self.push_frame(pending, result);
                PushOutcome::Pushed
            }
            None => PushOutcome::NothingToShow,
        }
    }

    fn push_frame(&mut self, pending: PendingPush, result: RenderResult) {
        let size = pending.size;
        let on_escape = result.escape_handler().cloned();
        self.next_serial += 1;
        self.stack.push(PageFrame {
            serial: self.next_serial,
            command: pending.command,
            title: pending.title,
            owner: pending.owner,
            result,
            size,
            on_escape,
        });

        if self.window.is_visible() {
            self.window.resize(size);
        } else {
            self.window.show(size);
        }
    }

    fn is_lone_home_frame(&self) -> bool {
        match (&self.home, self.stack.as_slice()) {
            (Some(home), [frame]) => &frame.command == home,
            _ => false,
        }
    }

    fn top_serial(&self) -> Option<u64> {
        self.stack.last().map(|frame| frame.serial)
    }

    /// Remove the top frame. Returns `false` on an empty stack.
    pub fn pop(&mut self) -> bool {
        if self.stack.pop().is_none() {
            return false;
        }

        match self.stack.last() {
            Some(top) => self.window.resize(top.size),
            None => self.window.hide(),
        }
        true
    }

    /// Swap the top frame for `id` without hiding the window in between.
    ///
    /// Actions produce no frame, so they run against the current stack and
    /// leave the top in place.
    pub fn replace(&mut self, registry: &CommandRegistry, id: &str) -> PushOutcome {
        let pending = match self.begin_push(registry, id) {
            Ok(pending) => pending,
            Err(outcome) => return outcome,
        };
        if !pending.is_view {
            return self.push(registry, id);
        }

        let previous = self.stack.pop();
        let outcome = self.push(registry, id);
        if outcome != PushOutcome::Pushed {
            // Nothing replaced it; keep the old frame
            if let Some(frame) = previous {
                self.stack.push(frame);
            }
        }
        outcome
    }

    /// Empty the stack, hiding the window if anything was shown.
    pub fn clear(&mut self) {
        if self.stack.is_empty() {
            return;
        }
        self.stack.clear();
        self.window.hide();
    }

    /// Replace the top frame's escape handler. Ignored on an empty stack.
    pub fn set_escape_handler(&mut self, handler: EscapeHandler) {
        if let Some(top) = self.stack.last_mut() {
            top.on_escape = Some(handler);
        }
    }

    pub fn clear_escape_handler(&mut self) {
        if let Some(top) = self.stack.last_mut() {
            top.on_escape = None;
        }
    }

    /// Handle the escape key. Returns `true` if a frame was popped.
    pub fn escape(&mut self) -> bool {
        let allowed = match self.stack.last() {
            None => return false,
            Some(top) => top.on_escape.as_ref().map_or(true, |handler| handler()),
        };

        if allowed {
            self.pop()
        } else {
            tracing::debug!("escape absorbed by frame handler");
            false
        }
    }

    /// Resize the visible top frame, e.g. on an extension's request.
    pub fn resize_top(&mut self, size: WindowSize) {
        if let Some(top) = self.stack.last_mut() {
            top.size = size;
            self.window.resize(size);
        }
    }

    /// Show the window for the current top frame if it is hidden.
    pub fn ensure_visible(&mut self) {
        if self.window.is_visible() {
            return;
        }
        if let Some(top) = self.stack.last() {
            self.window.show(top.size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::commands::{Command, SizePreset, WindowSizeHint};
    use crate::extensions::ExtensionError;
    use crate::platform::{HeadlessWindow, WindowEvent};

    fn setup() -> (Navigator, HeadlessWindow, CommandRegistry) {
        let window = HeadlessWindow::new();
        let navigator = Navigator::new(Box::new(window.clone()));
        let owner = Rc::new(ExtensionInfo::builtin("test", "Test"));
        let mut registry = CommandRegistry::new();

        registry
            .register(
                Command::view(owner.clone(), "home", "Home")
                    .with_handler(Rc::new(|| Ok(Some(RenderResult::text("home"))))),
            )
            .unwrap();
        registry
            .register(
                Command::view(owner.clone(), "big", "Big")
                    .with_window_size(WindowSizeHint::Preset(SizePreset::Large))
                    .with_handler(Rc::new(|| Ok(Some(RenderResult::text("big"))))),
            )
            .unwrap();
        registry
            .register(
                Command::view(owner.clone(), "empty", "Empty")
                    .with_handler(Rc::new(|| Ok(None))),
            )
            .unwrap();
        registry
            .register(Command::view(owner.clone(), "broken", "Broken").with_handler(Rc::new(
                || Err(ExtensionError::CommandNotFound("inner".to_string())),
            )))
            .unwrap();
        registry
            .register(
                Command::view(owner.clone(), "guarded", "Guarded").with_handler(Rc::new(|| {
                    Ok(Some(
                        RenderResult::text("guarded").with_escape_handler(Rc::new(|| false)),
                    ))
                })),
            )
            .unwrap();
        registry
            .register(
                Command::action(owner, "ping", "Ping")
                    .with_handler(Rc::new(|| Ok(None))),
            )
            .unwrap();

        (navigator, window, registry)
    }

    #[test]
    fn test_view_push_sizes_window() {
        let (mut nav, window, registry) = setup();

        assert_eq!(nav.push(&registry, "test#home"), PushOutcome::Pushed);
        assert_eq!(nav.len(), 1);
        assert_eq!(window.last_event(), Some(WindowEvent::Show(WindowSize::DEFAULT)));

        assert_eq!(nav.push(&registry, "test#big"), PushOutcome::Pushed);
        assert_eq!(nav.len(), 2);
        assert_eq!(window.size(), Some(WindowSize::LARGE));
        assert_eq!(nav.top().unwrap().result().text_content(), Some("big"));
    }

    #[test]
    fn test_action_push_keeps_stack() {
        let (mut nav, _window, registry) = setup();
        nav.push(&registry, "test#big");

        assert_eq!(nav.push(&registry, "test#ping"), PushOutcome::ActionFired);
        assert_eq!(nav.len(), 1);
    }

    #[test]
    fn test_action_on_lone_home_frame_hides() {
        let (mut nav, window, registry) = setup();
        nav.set_home(Some(CommandId::new("test", "home")));
        nav.push(&registry, "test#home");

        assert_eq!(nav.push(&registry, "test#ping"), PushOutcome::ActionFired);
        assert!(nav.is_empty());
        assert_eq!(window.last_event(), Some(WindowEvent::Hide));
    }

    #[test]
    fn test_action_on_other_lone_frame_does_not_hide() {
        let (mut nav, window, registry) = setup();
        nav.set_home(Some(CommandId::new("test", "home")));
        nav.push(&registry, "test#big");

        nav.push(&registry, "test#ping");
        assert_eq!(nav.len(), 1);
        assert!(window.is_visible());
    }

    #[test]
    fn test_push_edge_cases_change_nothing() {
        let (mut nav, window, mut registry) = setup();

        assert_eq!(nav.push(&registry, "test#missing"), PushOutcome::NotFound);
        assert_eq!(nav.push(&registry, "test#empty"), PushOutcome::NothingToShow);
        assert!(matches!(
            nav.push(&registry, "test#broken"),
            PushOutcome::Failed(reason) if reason.contains("inner")
        ));

        registry.set_disabled(&CommandId::new("test", "home"), true);
        assert_eq!(nav.push(&registry, "test#home"), PushOutcome::Disabled);

        assert!(nav.is_empty());
        assert!(window.events().is_empty());
    }

    #[test]
    fn test_pop_transitions() {
        let (mut nav, window, registry) = setup();

        assert!(!nav.pop());
        assert!(window.events().is_empty());

        nav.push(&registry, "test#home");
        nav.push(&registry, "test#big");
        assert!(nav.pop());
        assert_eq!(window.last_event(), Some(WindowEvent::Resize(WindowSize::DEFAULT)));

        assert!(nav.pop());
        assert!(nav.is_empty());
        assert_eq!(window.last_event(), Some(WindowEvent::Hide));
    }

    #[test]
    fn test_escape_respects_handler() {
        let (mut nav, _window, registry) = setup();
        nav.push(&registry, "test#home");
        nav.push(&registry, "test#guarded");

        assert!(!nav.escape());
        assert_eq!(nav.len(), 2);

        nav.clear_escape_handler();
        assert!(nav.escape());
        assert_eq!(nav.len(), 1);

        // Default allow
        assert!(nav.escape());
        assert!(nav.is_empty());
        assert!(!nav.escape());
    }

    #[test]
    fn test_escape_handler_is_frame_scoped() {
        let (mut nav, _window, registry) = setup();
        nav.set_escape_handler(Rc::new(|| false));
        nav.push(&registry, "test#home");
        assert!(!nav.top().unwrap().has_escape_handler());

        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        nav.set_escape_handler(Rc::new(move || {
            counter.set(counter.get() + 1);
            false
        }));
        nav.push(&registry, "test#big");
        assert!(nav.escape());
        assert_eq!(calls.get(), 0);

        assert!(!nav.escape());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_replace_swaps_top() {
        let (mut nav, window, registry) = setup();
        nav.push(&registry, "test#home");
        nav.push(&registry, "test#guarded");
        window.clear_events();

        assert_eq!(nav.replace(&registry, "test#big"), PushOutcome::Pushed);
        assert_eq!(nav.len(), 2);
        assert_eq!(nav.top().unwrap().command().as_str(), "test#big");
        assert!(!nav.top().unwrap().has_escape_handler());
        assert!(!window.events().contains(&WindowEvent::Hide));

        assert_eq!(nav.replace(&registry, "test#empty"), PushOutcome::NothingToShow);
        assert_eq!(nav.top().unwrap().command().as_str(), "test#big");
    }

    #[test]
    fn test_replace_with_action_keeps_top_visible() {
        let (mut nav, window, registry) = setup();
        nav.set_home(Some(CommandId::new("test", "home")));
        nav.push(&registry, "test#home");
        nav.push(&registry, "test#guarded");
        window.clear_events();

        assert_eq!(nav.replace(&registry, "test#ping"), PushOutcome::ActionFired);
        assert_eq!(nav.len(), 2);
        assert_eq!(nav.top().unwrap().command().as_str(), "test#guarded");
        assert!(window.is_visible());
        assert!(window.events().is_empty());

        assert_eq!(nav.replace(&registry, "test#missing"), PushOutcome::NotFound);
        assert_eq!(nav.len(), 2);
    }

    #[test]
    fn test_stale_async_result_is_discarded() {
        let (mut nav, _window, registry) = setup();
        nav.push(&registry, "test#home");
        nav.push(&registry, "test#guarded");

        let pending = nav.begin_push(&registry, "test#big").unwrap();
        nav.clear_escape_handler();
        nav.escape();

        let outcome = nav.complete_push(pending, Ok(Some(RenderResult::text("late"))));
        assert_eq!(outcome, PushOutcome::Stale);
        assert_eq!(nav.len(), 1);

        let pending = nav.begin_push(&registry, "test#big").unwrap();
        let outcome = nav.complete_push(pending, Ok(Some(RenderResult::text("fresh"))));
        assert_eq!(outcome, PushOutcome::Pushed);
        assert_eq!(nav.len(), 2);
    }

    #[test]
    fn test_clear_and_ensure_visible() {
        let (mut nav, window, registry) = setup();
        nav.clear();
        assert!(window.events().is_empty());

        nav.push(&registry, "test#big");
        let mut frontend = window.clone();
        frontend.hide();
        nav.ensure_visible();
        assert_eq!(window.last_event(), Some(WindowEvent::Show(WindowSize::LARGE)));

        nav.resize_top(WindowSize::SMALL);
        assert_eq!(nav.top().unwrap().size(), WindowSize::SMALL);

        nav.clear();
        assert!(nav.is_empty());
        assert!(!window.is_visible());
    }
}
