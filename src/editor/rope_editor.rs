use std::cell::RefCell;
use std::fmt;

use ropey::Rope;
use smol_str::format_smolstr;

use super::{
    Cursor, DirtySet, Editor, EditorBuffer, EditorError, EditorState, ListenerRegistration,
    ListenerSet, Motion, NodeKey, TextChange, UpdateEvent, UpdateListener,
};

/// Key of the document root element.
pub const ROOT_KEY: &str = "root";

/// Immutable state of a [`RopeEditor`] at one version.
#[derive(Clone, PartialEq, Eq)]
pub struct DocState {
    rope: Rope,
    cursor: Cursor,
    version: u64,
}

impl DocState {
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    pub const fn rope(&self) -> &Rope {
        &self.rope
    }

    pub const fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Incremented once per raised update.
    pub const fn version(&self) -> u64 {
        self.version
    }

    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }
}

impl EditorState for DocState {
    fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }
}

impl fmt::Debug for DocState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocState")
            .field("version", &self.version)
            .field("chars", &self.rope.len_chars())
            .field("cursor", &self.cursor.position())
            .finish()
    }
}

/// Rope-backed plain-text editor that raises an [`UpdateEvent`] per change.
///
/// Each line is an element keyed `line:N` holding one text leaf keyed
/// `text:N`. Text edits mark the touched leaves and their lines dirty; edits
/// that split or join lines also mark [`ROOT_KEY`]. Cursor-only changes raise
/// an update with both dirty sets empty, and no-op edits raise nothing.
pub struct RopeEditor {
    buffer: RefCell<EditorBuffer>,
    state: RefCell<DocState>,
    listeners: ListenerSet<DocState>,
}

impl RopeEditor {
    /// An editor with no content.
    pub fn new() -> Self {
        Self::with_text("")
    }

    /// An editor that starts with `text`, without raising an update.
    pub fn with_text(text: &str) -> Self {
        let buffer = EditorBuffer::from_text(text);
        let state = DocState {
            rope: buffer.rope().clone(),
            cursor: buffer.cursor(),
            version: 0,
        };
        Self {
            buffer: RefCell::new(buffer),
            state: RefCell::new(state),
            listeners: ListenerSet::new(),
        }
    }

    /// Replace the whole document. Returns `true` if an update was raised.
    pub fn load(&self, text: &str) -> bool {
        let change = self.buffer.borrow_mut().replace_all(text);
        self.commit(&change)
    }

    /// Insert `text` at the cursor.
    pub fn insert(&self, text: &str) -> bool {
        let change = self.buffer.borrow_mut().insert(text);
        self.commit(&change)
    }

    pub fn newline(&self) -> bool {
        let change = self.buffer.borrow_mut().split_line();
        self.commit(&change)
    }

    pub fn backspace(&self) -> bool {
        let change = self.buffer.borrow_mut().delete_back();
        self.commit(&change)
    }

    pub fn delete(&self) -> bool {
        let change = self.buffer.borrow_mut().delete_forward();
        self.commit(&change)
    }

    pub fn move_cursor(&self, motion: Motion) -> bool {
        self.buffer.borrow_mut().move_cursor(motion);
        self.commit(&TextChange::default())
    }

    pub fn move_to(&self, line: usize, col: usize) -> bool {
        self.buffer.borrow_mut().move_to(line, col);
        self.commit(&TextChange::default())
    }

    /// Drop every listener and refuse new registrations.
    pub fn dispose(&self) {
        tracing::debug!(listeners = self.listeners.len(), "disposing editor");
        self.listeners.close();
    }

    pub fn is_disposed(&self) -> bool {
        self.listeners.is_closed()
    }

    /// Number of listeners currently registered.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn commit(&self, change: &TextChange) -> bool {
        let next = {
            let buffer = self.buffer.borrow();
            let current = self.state.borrow();
            if change.is_empty() && buffer.cursor().position() == current.cursor.position() {
                return false;
            }
            DocState {
                rope: buffer.rope().clone(),
                cursor: buffer.cursor(),
                version: current.version + 1,
            }
        };
        let prev = self.state.replace(next.clone());
        let (dirty_elements, dirty_leaves) = dirty_sets(change);

        tracing::trace!(
            version = next.version,
            elements = dirty_elements.len(),
            leaves = dirty_leaves.len(),
            "raising editor update"
        );
        self.listeners.emit(&UpdateEvent {
            editor_state: next,
            prev_editor_state: prev,
            dirty_elements,
            dirty_leaves,
        });
        true
    }
}

fn dirty_sets(change: &TextChange) -> (DirtySet, DirtySet) {
    let mut elements: DirtySet = change
        .touched_lines
        .iter()
        .map(|line| format_smolstr!("line:{line}"))
        .collect();
    if change.structural {
        elements.insert(NodeKey::new_static(ROOT_KEY));
    }
    let leaves = change
        .touched_lines
        .iter()
        .map(|line| format_smolstr!("text:{line}"))
        .collect();
    (elements, leaves)
}

impl Default for RopeEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl Editor for RopeEditor {
    type State = DocState;

    fn editor_state(&self) -> DocState {
        self.state.borrow().clone()
    }

    fn register_update_listener(
        &self,
        listener: UpdateListener<DocState>,
    ) -> Result<ListenerRegistration, EditorError> {
        self.listeners.register(listener)
    }
}

impl fmt::Debug for RopeEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RopeEditor")
            .field("state", &*self.state.borrow())
            .field("listeners", &self.listeners)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn record(editor: &RopeEditor) -> (Rc<RefCell<Vec<UpdateEvent<DocState>>>>, ListenerRegistration) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let registration = editor
            .register_update_listener(Rc::new(move |event: &UpdateEvent<DocState>| {
                sink.borrow_mut().push(event.clone());
            }))
            .unwrap();
        (events, registration)
    }

    fn keys(set: &DirtySet) -> Vec<&str> {
        set.iter().map(NodeKey::as_str).collect()
    }

    #[test]
    fn test_new_editor_state_is_empty() {
        let editor = RopeEditor::new();
        let state = editor.editor_state();
        assert!(state.is_empty());
        assert_eq!(state.version(), 0);
    }

    #[test]
    fn test_with_text_raises_nothing() {
        let editor = RopeEditor::with_text("hello");
        let (events, _registration) = record(&editor);
        assert!(!editor.editor_state().is_empty());
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_first_load_reports_empty_previous_state() {
        let editor = RopeEditor::new();
        let (events, _registration) = record(&editor);
        assert!(editor.load("hello"));

        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert!(events[0].prev_editor_state.is_empty());
        assert_eq!(events[0].editor_state.text(), "hello");
        assert_eq!(keys(&events[0].dirty_leaves), vec!["text:0"]);
    }

    #[test]
    fn test_text_edit_marks_leaf_and_parent_line() {
        let editor = RopeEditor::with_text("one\ntwo");
        let (events, _registration) = record(&editor);
        editor.move_to(1, 3);
        editor.insert("!");

        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert!(events[0].is_selection_only());
        assert_eq!(keys(&events[1].dirty_elements), vec!["line:1"]);
        assert_eq!(keys(&events[1].dirty_leaves), vec!["text:1"]);
        assert_eq!(events[1].prev_editor_state.version() + 1, events[1].editor_state.version());
    }

    #[test]
    fn test_line_split_marks_root() {
        let editor = RopeEditor::with_text("hello");
        let (events, _registration) = record(&editor);
        editor.move_to(0, 2);
        editor.newline();

        let events = events.borrow();
        let split = events.last().unwrap();
        assert_eq!(keys(&split.dirty_elements), vec!["line:0", "line:1", "root"]);
    }

    #[test]
    fn test_carriage_return_insert_marks_root() {
        let editor = RopeEditor::with_text("a");
        let (events, _registration) = record(&editor);
        editor.move_cursor(Motion::End);
        editor.insert("\r");

        let events = events.borrow();
        let split = events.last().unwrap();
        assert_eq!(keys(&split.dirty_elements), vec!["line:0", "line:1", "root"]);
        assert_eq!(keys(&split.dirty_leaves), vec!["text:0", "text:1"]);
        assert_eq!(split.editor_state.line_count(), 2);
        assert_eq!(split.editor_state.cursor().position(), (1, 0));
    }

    #[test]
    fn test_backspace_after_line_separator_insert() {
        let editor = RopeEditor::new();
        let (events, _registration) = record(&editor);
        editor.insert("a\u{2028}b");
        assert!(editor.backspace());
        assert!(editor.backspace());

        let events = events.borrow();
        assert_eq!(events.len(), 3);
        assert_eq!(keys(&events[2].dirty_elements), vec!["line:0", "root"]);
        assert_eq!(events[2].editor_state.text(), "a");
        assert_eq!(events[2].editor_state.cursor().position(), (0, 1));
    }

    #[test]
    fn test_noop_edit_raises_nothing() {
        let editor = RopeEditor::with_text("hello");
        let (events, _registration) = record(&editor);
        assert!(!editor.backspace());
        assert!(!editor.move_cursor(Motion::Left));
        assert!(events.borrow().is_empty());
        assert_eq!(editor.editor_state().version(), 0);
    }

    #[test]
    fn test_previous_state_is_unchanged_by_later_edits() {
        let editor = RopeEditor::new();
        editor.load("abc");
        let before = editor.editor_state();
        editor.move_cursor(Motion::End);
        editor.insert("d");
        assert_eq!(before.text(), "abc");
        assert_eq!(editor.editor_state().text(), "abcd");
    }

    #[test]
    fn test_dispose_refuses_listeners() {
        let editor = RopeEditor::new();
        let (_events, _registration) = record(&editor);
        editor.dispose();
        assert!(editor.is_disposed());
        assert_eq!(editor.listener_count(), 0);
        let err = editor
            .register_update_listener(Rc::new(|_: &UpdateEvent<DocState>| {}))
            .unwrap_err();
        assert_eq!(err, EditorError::Disposed);
    }

    #[test]
    fn test_listener_may_read_editor_state_during_update() {
        let editor = Rc::new(RopeEditor::new());
        let seen = Rc::new(RefCell::new(String::new()));
        let handle = Rc::downgrade(&editor);
        let sink = Rc::clone(&seen);
        let _registration = editor
            .register_update_listener(Rc::new(move |_: &UpdateEvent<DocState>| {
                if let Some(editor) = handle.upgrade() {
                    *sink.borrow_mut() = editor.editor_state().text();
                }
            }))
            .unwrap();
        editor.load("live");
        assert_eq!(*seen.borrow(), "live");
    }
}
