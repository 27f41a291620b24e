//! Window and buffer bookkeeping
//!
//! Tab pages hold windows, windows show buffers. Only identity, names and
//! counters live here; the text belongs to the host.

use std::collections::TryReserveError;
use std::path::{Path, PathBuf};

/// Buffer identifier, unique for the life of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Window identifier, unique for the life of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u32);

/// Cursor position. Lines are 1-based; line 0 only appears transiently
/// while startup commands run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// A document record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    pub id: BufferId,
    pub name: Option<PathBuf>,
    /// Contents were read (or created) by the host
    pub loaded: bool,
    /// Bumped by the host on every change
    pub changedtick: u64,
    /// `changedtick` at the last write
    pub saved_tick: u64,
    pub line_count: usize,
    pub readonly: bool,
    pub modifiable: bool,
    /// BufWinLeave already fired during shutdown
    pub(crate) leave_fired: bool,
}

impl Buffer {
    fn new(id: BufferId, name: Option<PathBuf>) -> Self {
        Self {
            id,
            name,
            loaded: false,
            changedtick: 0,
            saved_tick: 0,
            line_count: 1,
            readonly: false,
            modifiable: true,
            leave_fired: false,
        }
    }

    pub fn is_modified(&self) -> bool {
        self.changedtick != self.saved_tick
    }

    /// Record a change
    pub fn touch(&mut self) {
        self.changedtick += 1;
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.display().to_string(),
            None => "[No Name]".to_string(),
        }
    }
}

/// A viewport onto one buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub id: WindowId,
    pub buffer: BufferId,
    pub cursor: Position,
    /// Index into the argument list, if this window edits an argument
    pub arg_idx: Option<usize>,
    /// The window is closed once startup has finished filling windows
    pub close_pending: bool,
    pub diff: bool,
    pub preview: bool,
    /// Height or width in cells, depending on the tab's split direction
    pub size: u16,
}

/// One tab page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabPage {
    pub windows: Vec<Window>,
    pub current: usize,
    /// Windows are side by side
    pub vertical: bool,
}

/// All tab pages, windows and buffers of a session
#[derive(Debug, Clone)]
pub struct Layout {
    tabs: Vec<TabPage>,
    current_tab: usize,
    buffers: Vec<Buffer>,
    next_buffer: u32,
    next_window: u32,
}

impl Layout {
    /// One tab, one window, one unnamed buffer
    pub fn new() -> Self {
        let buffer = Buffer::new(BufferId(1), None);
        let window = Self::make_window(WindowId(1), buffer.id);
        Self {
            tabs: vec![TabPage {
                windows: vec![window],
                current: 0,
                vertical: false,
            }],
            current_tab: 0,
            buffers: vec![buffer],
            next_buffer: 2,
            next_window: 2,
        }
    }

    /// Like [`Layout::new`], reporting allocation failure instead of aborting
    pub fn try_new() -> Result<Self, TryReserveError> {
        let mut tabs = Vec::new();
        tabs.try_reserve(1)?;
        let mut windows = Vec::new();
        windows.try_reserve(1)?;
        let mut buffers = Vec::new();
        buffers.try_reserve(1)?;

        let buffer = Buffer::new(BufferId(1), None);
        windows.push(Self::make_window(WindowId(1), buffer.id));
        buffers.push(buffer);
        tabs.push(TabPage {
            windows,
            current: 0,
            vertical: false,
        });
        Ok(Self {
            tabs,
            current_tab: 0,
            buffers,
            next_buffer: 2,
            next_window: 2,
        })
    }

    fn make_window(id: WindowId, buffer: BufferId) -> Window {
        Window {
            id,
            buffer,
            cursor: Position::new(1, 0),
            arg_idx: None,
            close_pending: false,
            diff: false,
            preview: false,
            size: 0,
        }
    }

    fn alloc_window(&mut self, buffer: BufferId) -> Window {
        let id = WindowId(self.next_window);
        self.next_window += 1;
        Self::make_window(id, buffer)
    }

    // Buffers

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    pub fn buffer(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.iter().find(|b| b.id == id)
    }

    pub fn buffer_mut(&mut self, id: BufferId) -> Option<&mut Buffer> {
        self.buffers.iter_mut().find(|b| b.id == id)
    }

    pub fn find_buffer(&self, name: &Path) -> Option<BufferId> {
        self.buffers
            .iter()
            .find(|b| b.name.as_deref() == Some(name))
            .map(|b| b.id)
    }

    /// Add a buffer, reusing an existing one with the same name
    pub fn add_buffer(&mut self, name: Option<PathBuf>) -> BufferId {
        if let Some(existing) = name.as_deref().and_then(|n| self.find_buffer(n)) {
            return existing;
        }
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.push(Buffer::new(id, name));
        id
    }

    /// Delete a buffer. Windows showing it switch to an unnamed buffer.
    pub fn remove_buffer(&mut self, id: BufferId) -> bool {
        let Some(pos) = self.buffers.iter().position(|b| b.id == id) else {
            return false;
        };
        self.buffers.remove(pos);
        let shown = self
            .tabs
            .iter()
            .flat_map(|t| t.windows.iter())
            .any(|w| w.buffer == id);
        if shown {
            let replacement = self.add_buffer(None);
            for window in self.tabs.iter_mut().flat_map(|t| t.windows.iter_mut()) {
                if window.buffer == id {
                    window.buffer = replacement;
                }
            }
        }
        true
    }

    pub fn current_buffer(&self) -> Option<&Buffer> {
        self.buffer(self.current_window().buffer)
    }

    pub fn current_buffer_mut(&mut self) -> Option<&mut Buffer> {
        let id = self.current_window().buffer;
        self.buffer_mut(id)
    }

    // Windows and tabs

    pub fn tabs(&self) -> &[TabPage] {
        &self.tabs
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub fn current_tab_index(&self) -> usize {
        self.current_tab
    }

    pub fn current_tab(&self) -> &TabPage {
        &self.tabs[self.current_tab]
    }

    fn current_tab_mut(&mut self) -> &mut TabPage {
        &mut self.tabs[self.current_tab]
    }

    /// Windows in the current tab
    pub fn window_count(&self) -> usize {
        self.current_tab().windows.len()
    }

    pub fn current_window(&self) -> &Window {
        let tab = self.current_tab();
        &tab.windows[tab.current]
    }

    pub fn current_window_mut(&mut self) -> &mut Window {
        let tab = self.current_tab_mut();
        let current = tab.current;
        &mut tab.windows[current]
    }

    pub fn current_window_index(&self) -> usize {
        self.current_tab().current
    }

    /// Every window of every tab, in order
    pub fn windows(&self) -> impl Iterator<Item = &Window> {
        self.tabs.iter().flat_map(|t| t.windows.iter())
    }

    pub fn windows_mut(&mut self) -> impl Iterator<Item = &mut Window> {
        self.tabs.iter_mut().flat_map(|t| t.windows.iter_mut())
    }

    pub fn only_one_window(&self) -> bool {
        self.tabs.len() == 1 && self.tabs[0].windows.len() == 1
    }

    /// Split the current window until the tab has `count` windows.
    /// Returns how many windows the tab ends up with.
    pub fn split(&mut self, count: usize, vertical: bool, space: u16) -> usize {
        // Each window needs a line of text and a status line
        let max = usize::from(space / 2).max(1);
        let target = count.min(max);
        let buffer = self.current_window().buffer;
        while self.window_count() < target {
            let window = self.alloc_window(buffer);
            self.current_tab_mut().windows.push(window);
        }
        let tab = self.current_tab_mut();
        tab.vertical = vertical;
        let n = tab.windows.len() as u16;
        for window in &mut tab.windows {
            window.size = space / n.max(1);
        }
        tab.windows.len()
    }

    /// Open tab pages until there are `count`, at most `max`.
    /// Returns the number of tab pages.
    pub fn make_tabs(&mut self, count: usize, max: usize) -> usize {
        let target = count.min(max.max(1));
        let buffer = self.current_window().buffer;
        while self.tabs.len() < target {
            let window = self.alloc_window(buffer);
            self.tabs.push(TabPage {
                windows: vec![window],
                current: 0,
                vertical: false,
            });
        }
        self.tabs.len()
    }

    pub fn goto_first_tab(&mut self) {
        self.current_tab = 0;
    }

    pub fn goto_first_window(&mut self) {
        self.current_tab_mut().current = 0;
    }

    /// Move to the next tab page. `false` when already on the last one.
    pub fn next_tab(&mut self) -> bool {
        if self.current_tab + 1 < self.tabs.len() {
            self.current_tab += 1;
            true
        } else {
            false
        }
    }

    /// Move to the next window in the current tab. `false` at the end.
    pub fn next_window(&mut self) -> bool {
        let tab = self.current_tab_mut();
        if tab.current + 1 < tab.windows.len() {
            tab.current += 1;
            true
        } else {
            false
        }
    }

    pub fn set_current(&mut self, tab: usize, window: usize) {
        if tab < self.tabs.len() && window < self.tabs[tab].windows.len() {
            self.current_tab = tab;
            self.tabs[tab].current = window;
        }
    }

    /// Close the current window. The window after it becomes current, or
    /// the one before when it was the last. Closing the only window of a
    /// tab closes the tab. Returns `false` for the very last window.
    pub fn close_current_window(&mut self) -> bool {
        if self.only_one_window() {
            return false;
        }
        let tab = self.current_tab_mut();
        if tab.windows.len() > 1 {
            tab.windows.remove(tab.current);
            if tab.current >= tab.windows.len() {
                tab.current = tab.windows.len() - 1;
            }
        } else {
            self.tabs.remove(self.current_tab);
            if self.current_tab >= self.tabs.len() {
                self.current_tab = self.tabs.len() - 1;
            }
        }
        true
    }

    /// Point the current window at `buffer`
    pub fn show_buffer(&mut self, buffer: BufferId) {
        let window = self.current_window_mut();
        window.buffer = buffer;
        window.cursor = Position::new(1, 0);
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}
