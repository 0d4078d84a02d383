//! Arena-indexed move tree: a doubly-linked main-line-plus-variations list
//! is awkward to model safely in Rust, since nodes would need to reference
//! both their successor and their branches. Instead, every [`MoveNode`] is
//! addressed by its [`MoveId`] index into a single [`MoveArena`] per game;
//! `next`/`variations` become plain indices, and truncation is index
//! surgery rather than pointer surgery.

use crate::chess::core::{MoveClass, PieceKind};

/// Index of a [`MoveNode`] within its owning [`MoveArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MoveId(u32);

/// A free-form comment or a structured clock/eval annotation extracted from
/// a `{...}` comment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Comment {
    /// Ordinary prose comment text.
    Text(String),
    /// `{[%clk 0:05:23]}`-style annotation; value is the raw clock string.
    Clock(String),
    /// `{[%eval 0.35]}`-style annotation; value is the raw eval string.
    Eval(String),
}

/// One move (ply) in the tree: an arc from the position before it to the
/// position after it.
#[derive(Clone, Debug)]
pub struct MoveNode {
    /// SAN text as parsed, retained verbatim.
    pub text: String,
    pub from: Option<crate::chess::core::Square>,
    pub to: Option<crate::chess::core::Square>,
    pub piece_moved: Option<PieceKind>,
    pub captured: Option<PieceKind>,
    pub promoted_piece: Option<PieceKind>,
    pub class: MoveClass,
    pub check: bool,
    pub mate: bool,
    /// Next move in the same line, if any.
    pub next: Option<MoveId>,
    /// Alternative lines branching from the position *before* this move.
    pub variations: Vec<MoveId>,
    pub comments: Vec<Comment>,
    pub nags: Vec<u16>,
}

impl MoveNode {
    fn new(text: String) -> Self {
        Self {
            text,
            from: None,
            to: None,
            piece_moved: None,
            captured: None,
            promoted_piece: None,
            class: MoveClass::Normal,
            check: false,
            mate: false,
            next: None,
            variations: Vec::new(),
            comments: Vec::new(),
            nags: Vec::new(),
        }
    }
}

/// Owns every [`MoveNode`] belonging to one [`crate::pgn::Game`].
#[derive(Clone, Debug, Default)]
pub struct MoveArena {
    nodes: Vec<MoveNode>,
}

impl MoveArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, text: String) -> MoveId {
        self.nodes.push(MoveNode::new(text));
        MoveId(
            u32::try_from(self.nodes.len() - 1)
                .expect("more than u32::MAX moves in a single game"),
        )
    }

    #[must_use]
    pub fn get(&self, id: MoveId) -> &MoveNode {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: MoveId) -> &mut MoveNode {
        &mut self.nodes[id.0 as usize]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Walks the main line starting at `root`, in order.
    pub fn main_line(&self, root: Option<MoveId>) -> MainLineIter<'_> {
        MainLineIter {
            arena: self,
            current: root,
        }
    }

    /// Counts plies on the main line starting at `root`.
    #[must_use]
    pub fn ply_count(&self, root: Option<MoveId>) -> usize {
        self.main_line(root).count()
    }

    /// Truncates the main line so that `keep_id` becomes the last move kept
    /// (used by `dropPly`/`plyLimit`): severs `next` from `keep_id`.
    /// Variations hanging off any kept move are left untouched.
    pub fn truncate_after(&mut self, keep_id: MoveId) {
        self.get_mut(keep_id).next = None;
    }
}

/// Iterator over the main line of a [`MoveArena`], from a given root.
pub struct MainLineIter<'a> {
    arena: &'a MoveArena,
    current: Option<MoveId>,
}

impl<'a> Iterator for MainLineIter<'a> {
    type Item = MoveId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        self.current = self.arena.get(id).next;
        Some(id)
    }
}
