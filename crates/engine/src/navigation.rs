//! The navigation stack: one frame per visible page, bottom is the root.

use std::path::PathBuf;

use lumen_types::{CommandSpec, FetchAction, Page, Payload};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, RuntimeError};

/// Identifies one revision of a frame. A frame gets a new id whenever an
/// update of its page starts, so late results from older requests can be
/// recognized and dropped.
pub type FrameId = u64;

/// Whatever produced a frame's page; reloading repeats it.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameSource {
    /// The extension's root list, built from its manifest.
    Root { extension: String },
    Command {
        extension: String,
        command: CommandSpec,
        payload: Payload,
    },
    Shell {
        extension: Option<String>,
        command_line: String,
        cwd: PathBuf,
    },
    Fetch {
        extension: Option<String>,
        request: FetchAction,
    },
}

impl FrameSource {
    /// Extension that `run` actions without an explicit extension target.
    pub fn extension(&self) -> Option<&str> {
        match self {
            Self::Root { extension } | Self::Command { extension, .. } => Some(extension),
            Self::Shell { extension, .. } | Self::Fetch { extension, .. } => extension.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NavigationFrame {
    pub id: FrameId,
    pub source: FrameSource,
    pub page: Page,
    /// Cancelled when the frame leaves the stack.
    pub cancel: CancellationToken,
}

#[derive(Debug)]
pub struct NavigationStack {
    frames: Vec<NavigationFrame>,
    next_id: FrameId,
    ended: bool,
    session_cancel: CancellationToken,
}

impl Default for NavigationStack {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationStack {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            next_id: 1,
            ended: false,
            session_cancel: CancellationToken::new(),
        }
    }

    fn allocate_id(&mut self) -> FrameId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn push(&mut self, source: FrameSource, page: Page) -> Result<FrameId> {
        if self.ended {
            return Err(RuntimeError::SessionEnded);
        }
        let id = self.allocate_id();
        self.frames.push(NavigationFrame {
            id,
            source,
            page,
            cancel: self.session_cancel.child_token(),
        });
        Ok(id)
    }

    /// Token for work that belongs to no frame yet; cancelled on exit.
    pub fn session_token(&self) -> CancellationToken {
        self.session_cancel.child_token()
    }

    /// Removes the top frame unless it is the last one.
    pub fn pop(&mut self) -> Option<NavigationFrame> {
        if self.frames.len() <= 1 {
            return None;
        }
        let frame = self.frames.pop()?;
        frame.cancel.cancel();
        Some(frame)
    }

    /// Starts an update of the top frame and returns the id its result must carry.
    pub fn begin_update(&mut self) -> Result<FrameId> {
        if self.ended {
            return Err(RuntimeError::SessionEnded);
        }
        let id = self.allocate_id();
        let frame = self.frames.last_mut().ok_or(RuntimeError::SessionEnded)?;
        frame.id = id;
        Ok(id)
    }

    /// Replaces the top page if the top frame is still at revision `expected`.
    /// Returns `false` for stale results, which are discarded.
    pub fn replace_top(&mut self, expected: FrameId, page: Page, source: Option<FrameSource>) -> bool {
        match self.frames.last_mut() {
            Some(frame) if frame.id == expected && !self.ended => {
                frame.page = page;
                if let Some(source) = source {
                    frame.source = source;
                }
                true
            }
            _ => false,
        }
    }

    /// Clears every frame and ends the session. Later pushes are rejected.
    pub fn exit(&mut self) {
        self.ended = true;
        self.session_cancel.cancel();
        self.frames.clear();
    }

    pub fn top(&self) -> Option<&NavigationFrame> {
        self.frames.last()
    }

    pub fn top_id(&self) -> Option<FrameId> {
        self.top().map(|frame| frame.id)
    }

    pub fn frames(&self) -> &[NavigationFrame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_types::{DetailPage, ListPage};

    fn detail(text: &str) -> Page {
        Page::Detail(DetailPage {
            text: Some(text.into()),
            ..Default::default()
        })
    }

    fn root() -> FrameSource {
        FrameSource::Root {
            extension: "files".into(),
        }
    }

    #[test]
    fn push_and_pop_follow_depth_invariant() {
        let mut stack = NavigationStack::new();
        assert!(stack.is_empty());
        stack.push(root(), Page::List(ListPage::default())).unwrap();
        for expected in 2..=4 {
            stack.push(root(), detail("x")).unwrap();
            assert_eq!(stack.depth(), expected);
        }
        for expected in (1..=3).rev() {
            assert!(stack.pop().is_some());
            assert_eq!(stack.depth(), expected);
        }
        assert!(stack.pop().is_none(), "pop at depth 1 is a no-op");
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn popping_cancels_the_removed_frame_only() {
        let mut stack = NavigationStack::new();
        stack.push(root(), detail("root")).unwrap();
        stack.push(root(), detail("child")).unwrap();
        let root_token = stack.frames()[0].cancel.clone();
        let popped = stack.pop().expect("child frame");
        assert!(popped.cancel.is_cancelled());
        assert!(!root_token.is_cancelled());
    }

    #[test]
    fn stale_replacements_are_discarded() {
        let mut stack = NavigationStack::new();
        stack.push(root(), detail("v1")).unwrap();
        let first = stack.begin_update().unwrap();
        let second = stack.begin_update().unwrap();
        assert!(!stack.replace_top(first, detail("old"), None));
        assert!(stack.replace_top(second, detail("new"), None));
        assert_eq!(stack.top().map(|frame| frame.page.clone()), Some(detail("new")));
    }

    #[test]
    fn exit_is_terminal() {
        let mut stack = NavigationStack::new();
        stack.push(root(), detail("root")).unwrap();
        let token = stack.frames()[0].cancel.clone();
        stack.exit();
        assert!(stack.is_empty());
        assert!(stack.has_ended());
        assert!(token.is_cancelled());
        assert!(matches!(stack.push(root(), detail("again")), Err(RuntimeError::SessionEnded)));
    }
}
