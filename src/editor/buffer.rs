use std::collections::BTreeSet;

use ropey::Rope;

/// Cursor position in the editor buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Zero-based line index.
    pub line: usize,
    /// Zero-based column (byte offset within the line).
    pub col: usize,
    /// Remembered column for vertical movement.
    col_memory: usize,
}

impl Cursor {
    pub const fn new() -> Self {
        Self::at(0, 0)
    }

    pub const fn at(line: usize, col: usize) -> Self {
        Self {
            line,
            col,
            col_memory: col,
        }
    }

    const fn set_col(&mut self, col: usize) {
        self.col = col;
        self.col_memory = col;
    }

    /// Position as `(line, col)`, ignoring the remembered column.
    pub const fn position(self) -> (usize, usize) {
        (self.line, self.col)
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor motions understood by [`EditorBuffer::move_cursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    WordLeft,
    WordRight,
    /// Start of the buffer.
    Start,
    /// End of the buffer.
    Finish,
}

/// Lines affected by one text edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextChange {
    /// Indices, after the edit, of lines whose text changed.
    pub touched_lines: BTreeSet<usize>,
    /// The edit split or joined lines.
    pub structural: bool,
}

impl TextChange {
    fn lines(range: impl IntoIterator<Item = usize>, structural: bool) -> Self {
        Self {
            touched_lines: range.into_iter().collect(),
            structural,
        }
    }

    /// True when the edit changed nothing.
    pub fn is_empty(&self) -> bool {
        self.touched_lines.is_empty() && !self.structural
    }
}

/// A text buffer backed by a rope, with one cursor.
///
/// Every mutating operation reports the lines it touched so callers can
/// derive dirty sets without diffing.
#[derive(Clone)]
pub struct EditorBuffer {
    rope: Rope,
    cursor: Cursor,
}

impl EditorBuffer {
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            cursor: Cursor::new(),
        }
    }

    pub fn empty() -> Self {
        Self::from_text("")
    }

    pub const fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// The underlying rope. Cloning it is cheap.
    pub const fn rope(&self) -> &Rope {
        &self.rope
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Content of a line without its trailing newline.
    pub fn line_at(&self, line_idx: usize) -> Option<String> {
        if line_idx >= self.rope.len_lines() {
            return None;
        }
        let line = self.rope.line(line_idx).to_string();
        Some(trim_line_break(&line).to_string())
    }

    /// Length of a line in bytes, without its trailing newline.
    pub fn line_len(&self, line_idx: usize) -> usize {
        self.line_at(line_idx).map_or(0, |s| s.len())
    }

    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Replace the whole content and put the cursor at the start.
    pub fn replace_all(&mut self, text: &str) -> TextChange {
        if self.rope == text {
            return TextChange::default();
        }
        let old_lines = self.line_count();
        self.rope = Rope::from_str(text);
        self.cursor = Cursor::new();
        let new_lines = self.line_count();
        TextChange::lines(0..new_lines, new_lines != old_lines || old_lines > 1)
    }

    /// Insert `s` at the cursor and move the cursor past it.
    pub fn insert(&mut self, s: &str) -> TextChange {
        if s.is_empty() {
            return TextChange::default();
        }
        let first_line = self.cursor.line;
        let lines_before = self.line_count();
        let char_idx = self.cursor_char_idx();
        self.rope.insert(char_idx, s);
        self.finish_edit(first_line, lines_before, char_idx + s.chars().count())
    }

    /// Split the current line at the cursor.
    pub fn split_line(&mut self) -> TextChange {
        self.insert("\n")
    }

    /// Delete the character before the cursor.
    pub fn delete_back(&mut self) -> TextChange {
        let line = self.cursor.line;
        let col = self.clamp_to_boundary(line, self.cursor.col);
        if line == 0 && col == 0 {
            return TextChange::default();
        }

        let lines_before = self.line_count();
        let char_idx = self.cursor_char_idx();
        // At column zero the whole break of the previous line goes, so `\r\n` joins too.
        let start = if col == 0 {
            self.content_end(line - 1)
        } else {
            char_idx - 1
        };
        self.rope.remove(start..char_idx);
        self.finish_edit(line, lines_before, start)
    }

    /// Delete the character at the cursor.
    pub fn delete_forward(&mut self) -> TextChange {
        let Cursor { line, col, .. } = self.cursor;
        let at_line_end = col >= self.line_len(line);
        if at_line_end && line + 1 >= self.line_count() {
            return TextChange::default();
        }

        let lines_before = self.line_count();
        let char_idx = self.cursor_char_idx();
        let end = if at_line_end {
            self.rope.line_to_char(line + 1)
        } else {
            char_idx + 1
        };
        self.rope.remove(char_idx..end);
        self.finish_edit(line, lines_before, char_idx)
    }

    /// Move the cursor. Returns `true` if it moved.
    pub fn move_cursor(&mut self, motion: Motion) -> bool {
        let before = self.cursor.position();
        match motion {
            Motion::Left => self.move_left(),
            Motion::Right => self.move_right(),
            Motion::Up => self.move_vertical(-1),
            Motion::Down => self.move_vertical(1),
            Motion::Home => self.cursor.set_col(0),
            Motion::End => self.cursor.set_col(self.line_len(self.cursor.line)),
            Motion::WordLeft => self.move_word_left(),
            Motion::WordRight => self.move_word_right(),
            Motion::Start => self.cursor = Cursor::new(),
            Motion::Finish => {
                let last = self.line_count().saturating_sub(1);
                self.cursor = Cursor::at(last, self.line_len(last));
            }
        }
        self.cursor.position() != before
    }

    /// Move the cursor to `(line, col)`, clamped to the buffer.
    /// Returns `true` if it moved.
    pub fn move_to(&mut self, line: usize, col: usize) -> bool {
        let before = self.cursor.position();
        let line = line.min(self.line_count().saturating_sub(1));
        let col = self.clamp_to_boundary(line, col.min(self.line_len(line)));
        self.cursor = Cursor::at(line, col);
        self.cursor.position() != before
    }

    /// Put the cursor at `char_idx` and report the lines from `first_line` to
    /// the cursor line. The edit is structural when the line count changed.
    fn finish_edit(
        &mut self,
        first_line: usize,
        lines_before: usize,
        char_idx: usize,
    ) -> TextChange {
        let line = self.rope.char_to_line(char_idx);
        let col = self.rope.char_to_byte(char_idx) - self.rope.line_to_byte(line);
        self.cursor = Cursor::at(line, self.clamp_to_boundary(line, col));

        let low = first_line.min(line);
        TextChange::lines(low..=line.max(low), self.line_count() != lines_before)
    }

    /// Char index where `line`'s content ends and its line break starts.
    fn content_end(&self, line: usize) -> usize {
        let content = self.line_at(line).unwrap_or_default();
        self.rope.line_to_char(line) + content.chars().count()
    }

    fn cursor_char_idx(&self) -> usize {
        let line_start = self.rope.line_to_char(self.cursor.line);
        let col = self.cursor.col.min(self.line_len(self.cursor.line));
        line_start + self.rope.line(self.cursor.line).byte_to_char(col)
    }

    fn clamp_to_boundary(&self, line: usize, col: usize) -> usize {
        floor_boundary(&self.line_at(line).unwrap_or_default(), col)
    }

    fn move_left(&mut self) {
        if self.cursor.col > 0 {
            let line = self.line_at(self.cursor.line).unwrap_or_default();
            let col = floor_boundary(&line, self.cursor.col);
            let prev = line[..col].chars().next_back().map_or(0, char::len_utf8);
            self.cursor.set_col(col - prev);
        } else if self.cursor.line > 0 {
            self.cursor.line -= 1;
            self.cursor.set_col(self.line_len(self.cursor.line));
        }
    }

    fn move_right(&mut self) {
        let line = self.line_at(self.cursor.line).unwrap_or_default();
        if self.cursor.col < line.len() {
            let col = floor_boundary(&line, self.cursor.col);
            let next = line[col..].chars().next().map_or(0, char::len_utf8);
            self.cursor.set_col(col + next);
        } else if self.cursor.line + 1 < self.line_count() {
            self.cursor.line += 1;
            self.cursor.set_col(0);
        }
    }

    fn move_vertical(&mut self, delta: isize) {
        let Some(target) = self.cursor.line.checked_add_signed(delta) else {
            return;
        };
        if target >= self.line_count() {
            return;
        }
        self.cursor.line = target;
        let col = self.cursor.col_memory.min(self.line_len(target));
        self.cursor.col = self.clamp_to_boundary(target, col);
    }

    fn move_word_left(&mut self) {
        if self.cursor.col == 0 {
            if self.cursor.line > 0 {
                self.cursor.line -= 1;
                self.cursor.set_col(self.line_len(self.cursor.line));
            }
            return;
        }
        let line = self.line_at(self.cursor.line).unwrap_or_default();
        let trimmed = line[..floor_boundary(&line, self.cursor.col)].trim_end();
        let start = trimmed
            .rfind(|c: char| !is_word_char(c))
            .map_or(0, |i| i + trimmed[i..].chars().next().map_or(1, char::len_utf8));
        self.cursor.set_col(start);
    }

    fn move_word_right(&mut self) {
        let line = self.line_at(self.cursor.line).unwrap_or_default();
        if self.cursor.col >= line.len() {
            if self.cursor.line + 1 < self.line_count() {
                self.cursor.line += 1;
                self.cursor.set_col(0);
            }
            return;
        }
        let col = floor_boundary(&line, self.cursor.col);
        let after = &line[col..];
        let word_end = after.find(|c: char| !is_word_char(c)).unwrap_or(after.len());
        let rest = &after[word_end..];
        let gap = rest.find(is_word_char).unwrap_or(rest.len());
        self.cursor.set_col(col + word_end + gap);
    }
}

/// Line breaks ropey splits lines on.
const fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\u{0B}' | '\u{0C}' | '\r' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// `line` without its trailing line break, treating `\r\n` as one break.
fn trim_line_break(line: &str) -> &str {
    if let Some(content) = line.strip_suffix("\r\n") {
        return content;
    }
    line.strip_suffix(is_line_break).unwrap_or(line)
}

/// Largest char boundary of `text` at or before `col`.
fn floor_boundary(text: &str, col: usize) -> usize {
    let col = col.min(text.len());
    (0..=col).rev().find(|&c| text.is_char_boundary(c)).unwrap_or(0)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl std::fmt::Debug for EditorBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorBuffer")
            .field("rope", &format_args!("Rope({} lines)", self.rope.len_lines()))
            .field("cursor", &self.cursor)
            .finish()
    }
}
