//! Bordered ("hedged") mailbox board representation, FEN codec, and the
//! move-legal chess state machine.
//!
//! The board is backed by a 12x12 array so that neighbour/slider probes can
//! walk off the playable 8x8 region into a ring of [`Piece::OffBoard`]
//! sentinels without ever needing a bounds check: arithmetic on the index
//! always stays in `0..144`, and the sentinel terminates sliding scans the
//! same way an enemy piece would.

use std::fmt;

use anyhow::{bail, Context};

use crate::chess::core::{CastlingRights, File, MoveClass, Piece, PieceKind, Player, Rank, Square};
use crate::error::PipelineError;

/// Width (and height) of the hedged board.
const DIM: i32 = 12;
/// Squares of padding on each side of the playable 8x8 region.
const HEDGE: i32 = 2;
/// Total number of cells in the hedged board.
const NUM_CELLS: usize = (DIM * DIM) as usize;

#[inline]
fn hedged_index(square: Square) -> usize {
    let file = i32::from(square.file() as u8) + HEDGE;
    let rank = i32::from(square.rank() as u8) + HEDGE;
    (rank * DIM + file) as usize
}

#[inline]
fn index_to_square(index: usize) -> Option<Square> {
    let index = index as i32;
    let file = index % DIM - HEDGE;
    let rank = index / DIM - HEDGE;
    if !(0..8).contains(&file) || !(0..8).contains(&rank) {
        return None;
    }
    Some(Square::new(
        File::try_from(file as u8).ok()?,
        Rank::try_from(rank as u8).ok()?,
    ))
}

/// Offset (in hedged-index space) of a single step in each sliding direction.
mod offsets {
    use super::DIM;

    pub const UP: i32 = DIM;
    pub const DOWN: i32 = -DIM;
    pub const LEFT: i32 = -1;
    pub const RIGHT: i32 = 1;
    pub const UP_LEFT: i32 = DIM - 1;
    pub const UP_RIGHT: i32 = DIM + 1;
    pub const DOWN_LEFT: i32 = -DIM - 1;
    pub const DOWN_RIGHT: i32 = -DIM + 1;

    pub const ROOK_DIRS: [i32; 4] = [UP, DOWN, LEFT, RIGHT];
    pub const BISHOP_DIRS: [i32; 4] = [UP_LEFT, UP_RIGHT, DOWN_LEFT, DOWN_RIGHT];
    pub const KING_DIRS: [i32; 8] = [
        UP, DOWN, LEFT, RIGHT, UP_LEFT, UP_RIGHT, DOWN_LEFT, DOWN_RIGHT,
    ];
    pub const KNIGHT_DELTAS: [i32; 8] = [
        2 * DIM + 1,
        DIM + 2,
        -DIM + 2,
        -2 * DIM + 1,
        -2 * DIM - 1,
        -DIM - 2,
        DIM - 2,
        2 * DIM - 1,
    ];
}

/// A fully-resolved, applied move: what square it left, where it landed, what
/// was captured (if anything), and how it should be classified for the
/// purposes of clocks, rights and annotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LegalMove {
    pub from: Square,
    pub to: Square,
    pub piece: PieceKind,
    pub captured: Option<PieceKind>,
    pub promotion: Option<PieceKind>,
    pub class: MoveClass,
}

/// Authoritative chess position: piece placement plus the rest of the FEN
/// state (side to move, castling rights, en-passant target, clocks).
#[derive(Clone)]
pub struct Board {
    squares: [Piece; NUM_CELLS],
    to_move: Player,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
}

impl Board {
    /// An otherwise-empty hedged board: every playable square is
    /// [`Piece::Empty`], the hedge is [`Piece::OffBoard`].
    fn blank() -> Self {
        let mut squares = [Piece::OffBoard; NUM_CELLS];
        for index in 0..NUM_CELLS {
            if index_to_square(index).is_some() {
                squares[index] = Piece::Empty;
            }
        }
        Self {
            squares,
            to_move: Player::White,
            castling: CastlingRights::empty(),
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// The standard starting position.
    #[must_use]
    pub fn starting() -> Self {
        Self::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1")
            .expect("starting FEN is well-formed")
    }

    /// Parses a board from [Forsyth-Edwards Notation], accepting either a
    /// full six-field FEN or a trimmed four-field EPD-style position (clock
    /// and move number default to `0` and `1`).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FenSyntax`] naming the offending field.
    ///
    /// [Forsyth-Edwards Notation]: https://www.chessprogramming.org/Forsyth-Edwards_Notation
    pub fn from_fen(fen: &str) -> anyhow::Result<Self> {
        let fen = fen.trim();
        let mut fields = fen.split_ascii_whitespace();

        let placement = fields.next().ok_or_else(|| PipelineError::FenSyntax {
            field: "piece placement",
            reason: "missing".into(),
        })?;
        let mut board = Self::blank();
        board.set_placement(placement)?;

        board.to_move = match fields.next() {
            Some(side) => Player::try_from(side).map_err(|err| PipelineError::FenSyntax {
                field: "side to move",
                reason: err.to_string(),
            })?,
            None => Player::White,
        };

        board.castling = match fields.next() {
            Some(rights) => {
                CastlingRights::parse_fen(rights).map_err(|err| PipelineError::FenSyntax {
                    field: "castling availability",
                    reason: err.to_string(),
                })?
            }
            None => CastlingRights::empty(),
        };

        board.en_passant = match fields.next() {
            Some("-") | None => None,
            Some(square) => Some(Square::try_from(square).map_err(|err| {
                PipelineError::FenSyntax {
                    field: "en passant target",
                    reason: err.to_string(),
                }
            })?),
        };

        board.halfmove_clock = match fields.next() {
            Some(clock) => clock.parse().map_err(|_| PipelineError::FenSyntax {
                field: "halfmove clock",
                reason: format!("not a number: {clock}"),
            })?,
            None => 0,
        };

        board.fullmove_number = match fields.next() {
            Some(number) => number.parse().map_err(|_| PipelineError::FenSyntax {
                field: "fullmove number",
                reason: format!("not a number: {number}"),
            })?,
            None => 1,
        };

        Ok(board)
    }

    fn set_placement(&mut self, placement: &str) -> anyhow::Result<()> {
        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            bail!(PipelineError::FenSyntax {
                field: "piece placement",
                reason: format!("expected 8 ranks, got {}", ranks.len()),
            });
        }
        // FEN lists ranks from 8 down to 1.
        for (rank_from_top, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - rank_from_top as u8;
            let mut file = 0u8;
            for ch in rank_str.chars() {
                if let Some(skip) = ch.to_digit(10) {
                    file += skip as u8;
                    continue;
                }
                if file >= 8 {
                    bail!(PipelineError::FenSyntax {
                        field: "piece placement",
                        reason: format!("rank {} overflows 8 files", rank + 1),
                    });
                }
                let piece = Piece::try_from(ch).map_err(|err| PipelineError::FenSyntax {
                    field: "piece placement",
                    reason: err.to_string(),
                })?;
                let square = Square::new(
                    File::try_from(file).context("file overflow")?,
                    Rank::try_from(rank).context("rank overflow")?,
                );
                self.set(square, piece);
                file += 1;
            }
        }
        Ok(())
    }

    /// Serializes the board back to FEN. Round-trips any FEN accepted by
    /// [`Self::from_fen`] except for normalization of `-` placeholders.
    #[must_use]
    pub fn to_fen(&self) -> String {
        use std::fmt::Write;

        let mut placement = String::new();
        for rank_from_top in 0..8u8 {
            let rank = 7 - rank_from_top;
            let mut empty_run = 0u8;
            for file in 0..8u8 {
                let square = Square::new(File::try_from(file).unwrap(), Rank::try_from(rank).unwrap());
                match self.at(square).algebraic_symbol() {
                    Some(symbol) => {
                        if empty_run > 0 {
                            write!(placement, "{empty_run}").unwrap();
                            empty_run = 0;
                        }
                        placement.push(symbol);
                    }
                    None => empty_run += 1,
                }
            }
            if empty_run > 0 {
                write!(placement, "{empty_run}").unwrap();
            }
            if rank_from_top != 7 {
                placement.push('/');
            }
        }

        format!(
            "{} {} {} {} {} {}",
            placement,
            self.to_move,
            self.castling.fen(),
            self.en_passant.map_or_else(|| "-".to_string(), |sq| sq.to_string()),
            self.halfmove_clock,
            self.fullmove_number,
        )
    }

    #[must_use]
    pub fn at(&self, square: Square) -> Piece {
        self.squares[hedged_index(square)]
    }

    fn set(&mut self, square: Square, piece: Piece) {
        self.squares[hedged_index(square)] = piece;
    }

    #[must_use]
    pub fn to_move(&self) -> Player {
        self.to_move
    }

    #[must_use]
    pub fn castling_rights(&self) -> CastlingRights {
        self.castling
    }

    #[must_use]
    pub fn en_passant_square(&self) -> Option<Square> {
        self.en_passant
    }

    #[must_use]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[must_use]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// Iterates over every on-board square together with its piece.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Player, PieceKind)> + '_ {
        (0..NUM_CELLS).filter_map(move |index| {
            let square = index_to_square(index)?;
            match self.squares[index] {
                Piece::Occupied(owner, kind) => Some((square, owner, kind)),
                Piece::Empty | Piece::OffBoard => None,
            }
        })
    }

    #[must_use]
    pub fn find_king(&self, player: Player) -> Option<Square> {
        self.pieces()
            .find(|&(_, owner, kind)| owner == player && kind == PieceKind::King)
            .map(|(square, ..)| square)
    }

    /// True iff `square` is attacked by any piece belonging to `by`. Sliding
    /// attacks stop at the first occupied cell (including the hedge, which
    /// always stops them since [`Piece::OffBoard`] never matches an
    /// attacker).
    #[must_use]
    pub fn is_attacked(&self, square: Square, by: Player) -> bool {
        let index = hedged_index(square) as i32;

        for &delta in &offsets::KNIGHT_DELTAS {
            if self.squares[(index + delta) as usize] == Piece::Occupied(by, PieceKind::Knight) {
                return true;
            }
        }
        for &dir in &offsets::KING_DIRS {
            if self.squares[(index + dir) as usize] == Piece::Occupied(by, PieceKind::King) {
                return true;
            }
        }
        for &dir in &offsets::ROOK_DIRS {
            if self.slides_to_attacker(index, dir, by, &[PieceKind::Rook, PieceKind::Queen]) {
                return true;
            }
        }
        for &dir in &offsets::BISHOP_DIRS {
            if self.slides_to_attacker(index, dir, by, &[PieceKind::Bishop, PieceKind::Queen]) {
                return true;
            }
        }
        // Pawn attacks come from "behind" the target square, from the
        // attacker's perspective: a white pawn on s attacks s+UP_LEFT/UP_RIGHT.
        let pawn_dirs = match by {
            Player::White => [offsets::DOWN_LEFT, offsets::DOWN_RIGHT],
            Player::Black => [offsets::UP_LEFT, offsets::UP_RIGHT],
        };
        for dir in pawn_dirs {
            if self.squares[(index + dir) as usize] == Piece::Occupied(by, PieceKind::Pawn) {
                return true;
            }
        }
        false
    }

    fn slides_to_attacker(&self, from: i32, dir: i32, by: Player, kinds: &[PieceKind]) -> bool {
        let mut cursor = from + dir;
        loop {
            match self.squares[cursor as usize] {
                Piece::Empty => cursor += dir,
                Piece::OffBoard => return false,
                Piece::Occupied(owner, kind) => {
                    return owner == by && kinds.contains(&kind);
                }
            }
        }
    }

    #[must_use]
    pub fn in_check(&self, player: Player) -> bool {
        match self.find_king(player) {
            Some(king) => self.is_attacked(king, player.opponent()),
            None => false,
        }
    }

    /// Every pseudo-legal move, filtered to those that do not leave the
    /// mover's own king in check.
    #[must_use]
    pub fn legal_moves(&self) -> Vec<LegalMove> {
        self.pseudo_legal_moves()
            .into_iter()
            .filter(|candidate| {
                let mut after = self.clone();
                after.apply_unchecked(*candidate);
                !after.in_check(self.to_move)
            })
            .collect()
    }

    #[must_use]
    pub fn is_checkmate(&self) -> bool {
        self.in_check(self.to_move) && self.legal_moves().is_empty()
    }

    #[must_use]
    pub fn is_stalemate(&self) -> bool {
        !self.in_check(self.to_move) && self.legal_moves().is_empty()
    }

    fn pseudo_legal_moves(&self) -> Vec<LegalMove> {
        let mover = self.to_move;
        let mut moves = Vec::new();
        for (square, owner, kind) in self.pieces().collect::<Vec<_>>() {
            if owner != mover {
                continue;
            }
            match kind {
                PieceKind::Pawn => self.pawn_moves(square, mover, &mut moves),
                PieceKind::Knight => self.jump_moves(square, mover, kind, &offsets::KNIGHT_DELTAS, &mut moves),
                PieceKind::Bishop => self.slide_moves(square, mover, kind, &offsets::BISHOP_DIRS, &mut moves),
                PieceKind::Rook => self.slide_moves(square, mover, kind, &offsets::ROOK_DIRS, &mut moves),
                PieceKind::Queen => {
                    self.slide_moves(square, mover, kind, &offsets::BISHOP_DIRS, &mut moves);
                    self.slide_moves(square, mover, kind, &offsets::ROOK_DIRS, &mut moves);
                }
                PieceKind::King => {
                    self.jump_moves(square, mover, kind, &offsets::KING_DIRS, &mut moves);
                    self.castling_moves(mover, &mut moves);
                }
            }
        }
        moves
    }

    fn jump_moves(
        &self,
        from: Square,
        mover: Player,
        kind: PieceKind,
        deltas: &[i32],
        out: &mut Vec<LegalMove>,
    ) {
        let origin = hedged_index(from) as i32;
        for &delta in deltas {
            let target = origin + delta;
            let Some(to) = index_to_square(target as usize) else {
                continue;
            };
            match self.squares[target as usize] {
                Piece::OffBoard => continue,
                Piece::Empty => out.push(LegalMove {
                    from,
                    to,
                    piece: kind,
                    captured: None,
                    promotion: None,
                    class: MoveClass::Normal,
                }),
                Piece::Occupied(owner, captured) => {
                    if owner != mover {
                        out.push(LegalMove {
                            from,
                            to,
                            piece: kind,
                            captured: Some(captured),
                            promotion: None,
                            class: MoveClass::Normal,
                        });
                    }
                }
            }
        }
    }

    fn slide_moves(&self, from: Square, mover: Player, kind: PieceKind, dirs: &[i32], out: &mut Vec<LegalMove>) {
        let origin = hedged_index(from) as i32;
        for &dir in dirs {
            let mut target = origin + dir;
            loop {
                match self.squares[target as usize] {
                    Piece::OffBoard => break,
                    Piece::Empty => {
                        out.push(LegalMove {
                            from,
                            to: index_to_square(target as usize).unwrap(),
                            piece: kind,
                            captured: None,
                            promotion: None,
                            class: MoveClass::Normal,
                        });
                        target += dir;
                    }
                    Piece::Occupied(owner, captured) => {
                        if owner != mover {
                            out.push(LegalMove {
                                from,
                                to: index_to_square(target as usize).unwrap(),
                                piece: kind,
                                captured: Some(captured),
                                promotion: None,
                                class: MoveClass::Normal,
                            });
                        }
                        break;
                    }
                }
            }
        }
    }

    fn pawn_moves(&self, from: Square, mover: Player, out: &mut Vec<LegalMove>) {
        let origin = hedged_index(from) as i32;
        let (push, start_rank, promotion_rank, capture_dirs) = match mover {
            Player::White => (offsets::UP, Rank::Two, Rank::Eight, [offsets::UP_LEFT, offsets::UP_RIGHT]),
            Player::Black => (offsets::DOWN, Rank::Seven, Rank::One, [offsets::DOWN_LEFT, offsets::DOWN_RIGHT]),
        };

        let one_step = origin + push;
        if self.squares[one_step as usize] == Piece::Empty {
            self.push_pawn_move(from, index_to_square(one_step as usize).unwrap(), promotion_rank, None, MoveClass::Normal, out);
            if from.rank() == start_rank {
                let two_step = origin + 2 * push;
                if self.squares[two_step as usize] == Piece::Empty {
                    out.push(LegalMove {
                        from,
                        to: index_to_square(two_step as usize).unwrap(),
                        piece: PieceKind::Pawn,
                        captured: None,
                        promotion: None,
                        class: MoveClass::DoublePush,
                    });
                }
            }
        }

        for dir in capture_dirs {
            let target = origin + dir;
            let Some(to) = index_to_square(target as usize) else {
                continue;
            };
            match self.squares[target as usize] {
                Piece::Occupied(owner, captured) if owner != mover => {
                    self.push_pawn_move(from, to, promotion_rank, Some(captured), MoveClass::Normal, out);
                }
                Piece::Empty if self.en_passant == Some(to) => {
                    out.push(LegalMove {
                        from,
                        to,
                        piece: PieceKind::Pawn,
                        captured: Some(PieceKind::Pawn),
                        promotion: None,
                        class: MoveClass::EnPassant,
                    });
                }
                _ => {}
            }
        }
    }

    fn push_pawn_move(
        &self,
        from: Square,
        to: Square,
        promotion_rank: Rank,
        captured: Option<PieceKind>,
        class: MoveClass,
        out: &mut Vec<LegalMove>,
    ) {
        if to.rank() == promotion_rank {
            for promotion in [PieceKind::Queen, PieceKind::Rook, PieceKind::Bishop, PieceKind::Knight] {
                out.push(LegalMove {
                    from,
                    to,
                    piece: PieceKind::Pawn,
                    captured,
                    promotion: Some(promotion),
                    class: MoveClass::Promotion,
                });
            }
        } else {
            out.push(LegalMove {
                from,
                to,
                piece: PieceKind::Pawn,
                captured,
                promotion: None,
                class,
            });
        }
    }

    fn castling_moves(&self, mover: Player, out: &mut Vec<LegalMove>) {
        let (rank, kingside, queenside, king_start) = match mover {
            Player::White => (
                Rank::One,
                CastlingRights::WHITE_KINGSIDE,
                CastlingRights::WHITE_QUEENSIDE,
                Square::E1,
            ),
            Player::Black => (
                Rank::Eight,
                CastlingRights::BLACK_KINGSIDE,
                CastlingRights::BLACK_QUEENSIDE,
                Square::E8,
            ),
        };
        if self.at(king_start) != Piece::Occupied(mover, PieceKind::King) {
            return;
        }
        let opponent = mover.opponent();
        let empty_and_safe = |files: &[File]| {
            files.iter().all(|&file| {
                let square = Square::new(file, rank);
                self.at(square).is_empty()
            })
        };
        let path_safe = |files: &[File]| {
            files
                .iter()
                .all(|&file| !self.is_attacked(Square::new(file, rank), opponent))
        };

        if self.castling.contains(kingside)
            && self.at(Square::new(File::H, rank)) == Piece::Occupied(mover, PieceKind::Rook)
            && empty_and_safe(&[File::F, File::G])
            && path_safe(&[File::E, File::F, File::G])
        {
            out.push(LegalMove {
                from: king_start,
                to: Square::new(File::G, rank),
                piece: PieceKind::King,
                captured: None,
                promotion: None,
                class: MoveClass::CastleShort,
            });
        }
        if self.castling.contains(queenside)
            && self.at(Square::new(File::A, rank)) == Piece::Occupied(mover, PieceKind::Rook)
            && empty_and_safe(&[File::B, File::C, File::D])
            && path_safe(&[File::E, File::D, File::C])
        {
            out.push(LegalMove {
                from: king_start,
                to: Square::new(File::C, rank),
                piece: PieceKind::King,
                captured: None,
                promotion: None,
                class: MoveClass::CastleLong,
            });
        }
    }

    /// Applies an already-legal move without re-checking legality, updating
    /// castling rights, en-passant square, and both clocks.
    fn apply_unchecked(&mut self, mv: LegalMove) {
        let mover = self.to_move;
        let moved_piece = Piece::Occupied(mover, mv.promotion.unwrap_or(mv.piece));

        self.set(mv.from, Piece::Empty);
        self.set(mv.to, moved_piece);

        match mv.class {
            MoveClass::EnPassant => {
                let captured_square = Square::new(
                    mv.to.file(),
                    mv.from.rank(),
                );
                self.set(captured_square, Piece::Empty);
            }
            MoveClass::CastleShort | MoveClass::CastleLong => {
                let rank = mv.from.rank();
                let (rook_from, rook_to) = match mv.class {
                    MoveClass::CastleShort => (Square::new(File::H, rank), Square::new(File::F, rank)),
                    MoveClass::CastleLong => (Square::new(File::A, rank), Square::new(File::D, rank)),
                    _ => unreachable!(),
                };
                self.set(rook_from, Piece::Empty);
                self.set(rook_to, Piece::Occupied(mover, PieceKind::Rook));
            }
            MoveClass::Normal | MoveClass::Promotion | MoveClass::DoublePush => {}
        }

        // Castling rights: cleared on king move, or rook move/capture from home square.
        if mv.piece == PieceKind::King {
            self.castling.clear_player(mover);
        }
        for (square, right) in [
            (Square::A1, CastlingRights::WHITE_QUEENSIDE),
            (Square::H1, CastlingRights::WHITE_KINGSIDE),
            (Square::A8, CastlingRights::BLACK_QUEENSIDE),
            (Square::H8, CastlingRights::BLACK_KINGSIDE),
        ] {
            if mv.from == square || mv.to == square {
                self.castling.remove(right);
            }
        }

        self.en_passant = if mv.class == MoveClass::DoublePush {
            let dir = match mover {
                Player::White => -1i8,
                Player::Black => 1i8,
            };
            Some(Square::new(
                mv.to.file(),
                Rank::try_from((mv.to.rank() as i8 + dir) as u8).unwrap(),
            ))
        } else {
            None
        };

        self.halfmove_clock = if mv.piece == PieceKind::Pawn || mv.captured.is_some() {
            0
        } else {
            self.halfmove_clock + 1
        };
        if mover == Player::Black {
            self.fullmove_number += 1;
        }
        self.to_move = mover.opponent();
    }

    /// Finds the unique legal move matching `(from_square, to_square)` with
    /// the given promotion (or, if `from` is `None`, the unique legal move
    /// to `to` for `piece` — used to resolve SAN disambiguation) and applies
    /// it, returning the resolved move.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IllegalMove`] (wrapped by the caller with a
    /// ply number) if no legal move, or more than one, matches.
    pub fn apply_candidate(
        &mut self,
        piece: PieceKind,
        from_file: Option<File>,
        from_rank: Option<Rank>,
        to: Square,
        promotion: Option<PieceKind>,
        castle: Option<MoveClass>,
    ) -> anyhow::Result<LegalMove> {
        let legal = self.legal_moves();
        let matches: Vec<LegalMove> = legal
            .into_iter()
            .filter(|m| {
                if let Some(class) = castle {
                    return m.class == class;
                }
                m.piece == piece
                    && m.to == to
                    && m.promotion == promotion
                    && from_file.map_or(true, |f| m.from.file() == f)
                    && from_rank.map_or(true, |r| m.from.rank() == r)
            })
            .collect();
        match matches.as_slice() {
            [single] => {
                let resolved = *single;
                self.apply_unchecked(resolved);
                Ok(resolved)
            }
            [] => bail!("no legal move matches the given criteria"),
            _ => bail!("ambiguous move: {} candidates matched", matches.len()),
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_fen())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn starting_position_fen_roundtrip() {
        let board = Board::starting();
        assert_eq!(
            board.to_fen(),
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
        );
    }

    #[test]
    fn fen_roundtrip_arbitrary() {
        let fens = [
            "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3",
            "8/8/8/4k3/8/8/4K3/8 w - - 0 50",
            "rnbq1rk1/ppp1bppp/4pn2/3p4/2PP4/2N1PN2/PP3PPP/R1BQKB1R w KQ - 0 7",
        ];
        for fen in fens {
            assert_eq!(Board::from_fen(fen).unwrap().to_fen(), fen);
        }
    }

    #[test]
    fn trimmed_epd_defaults_clocks() {
        let board = Board::from_fen("8/8/8/4k3/8/8/4K3/8 w - -").unwrap();
        assert_eq!(board.halfmove_clock(), 0);
        assert_eq!(board.fullmove_number(), 1);
    }

    #[test]
    fn bad_fen_is_rejected() {
        assert!(Board::from_fen("not a fen").is_err());
        assert!(Board::from_fen("8/8/8/8/8/8/8 w - - 0 1").is_err());
    }

    #[test]
    fn starting_position_legal_move_count() {
        // 16 pawn moves + 4 knight moves = 20.
        assert_eq!(Board::starting().legal_moves().len(), 20);
    }

    #[test]
    fn fools_mate_is_checkmate() {
        let mut board = Board::starting();
        for (piece, to, promo) in [
            (PieceKind::Pawn, Square::F3, None),
            (PieceKind::Pawn, Square::E5, None),
            (PieceKind::Pawn, Square::G4, None),
        ] {
            board
                .apply_candidate(piece, None, None, to, promo, None)
                .unwrap();
        }
        // 4. ... Qh4#: queen from d8 to h4.
        board
            .apply_candidate(PieceKind::Queen, None, None, Square::H4, None, None)
            .unwrap();
        assert!(board.is_checkmate());
        assert!(board.in_check(Player::White));
        assert!(board.legal_moves().is_empty());
    }

    #[test]
    fn castling_short_moves_both_pieces() {
        let mut board = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        board
            .apply_candidate(PieceKind::King, None, None, Square::G1, None, Some(MoveClass::CastleShort))
            .unwrap();
        assert_eq!(board.at(Square::G1), Piece::white(PieceKind::King));
        assert_eq!(board.at(Square::F1), Piece::white(PieceKind::Rook));
        assert_eq!(board.at(Square::E1), Piece::Empty);
        assert_eq!(board.at(Square::H1), Piece::Empty);
    }

    #[test]
    fn en_passant_capture_removes_pawn() {
        let mut board = Board::from_fen("rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 3").unwrap();
        board
            .apply_candidate(PieceKind::Pawn, Some(File::E), None, Square::D6, None, None)
            .unwrap();
        assert_eq!(board.at(Square::D5), Piece::Empty);
        assert_eq!(board.at(Square::D6), Piece::white(PieceKind::Pawn));
    }

    #[test]
    fn halfmove_clock_resets_on_capture_and_pawn_move() {
        let mut board = Board::starting();
        board
            .apply_candidate(PieceKind::Pawn, None, None, Square::E4, None, None)
            .unwrap();
        assert_eq!(board.halfmove_clock(), 0);
        board
            .apply_candidate(PieceKind::Knight, None, None, Square::C6, None, None)
            .unwrap();
        assert_eq!(board.halfmove_clock(), 1);
    }

    #[test]
    fn stalemate_detection() {
        // Classic stalemate: black king a8, white king c7, white queen... use
        // a minimal stalemate: black to move, no legal moves, not in check.
        let board = Board::from_fen("k7/2K5/1Q6/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(board.is_stalemate());
        assert!(!board.in_check(Player::Black));
    }
}
