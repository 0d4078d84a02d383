//! Board primitives commonly used within [`crate::chess`].

use std::{fmt, mem};

use anyhow::bail;

#[allow(missing_docs)]
pub const BOARD_WIDTH: u8 = 8;
#[allow(missing_docs)]
pub const BOARD_SIZE: u8 = BOARD_WIDTH * BOARD_WIDTH;

/// Represents a column (vertical row) of the chessboard. In chess notation, it
/// is normally represented with a lowercase letter.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum::EnumIter)]
#[allow(missing_docs)]
pub enum File {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", (b'a' + *self as u8) as char)
    }
}

impl TryFrom<char> for File {
    type Error = anyhow::Error;

    fn try_from(file: char) -> anyhow::Result<Self> {
        match file {
            'a'..='h' => Ok(unsafe { mem::transmute::<u8, Self>(file as u8 - b'a') }),
            _ => bail!("unknown file: expected within 'a'..='h', got '{file}'"),
        }
    }
}

impl TryFrom<u8> for File {
    type Error = anyhow::Error;

    fn try_from(column: u8) -> anyhow::Result<Self> {
        match column {
            0..=7 => Ok(unsafe { mem::transmute::<u8, Self>(column) }),
            _ => bail!("unknown file: expected within 0..BOARD_WIDTH, got {column}"),
        }
    }
}

/// Represents a horizontal row of the chessboard. Zero-based (rank 1 is 0).
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum::EnumIter)]
#[allow(missing_docs)]
pub enum Rank {
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
}

impl TryFrom<char> for Rank {
    type Error = anyhow::Error;

    fn try_from(rank: char) -> anyhow::Result<Self> {
        match rank {
            '1'..='8' => Ok(unsafe { mem::transmute::<u8, Self>(rank as u8 - b'1') }),
            _ => bail!("unknown rank: expected within '1'..='8', got '{rank}'"),
        }
    }
}

impl TryFrom<u8> for Rank {
    type Error = anyhow::Error;

    fn try_from(row: u8) -> anyhow::Result<Self> {
        match row {
            0..=7 => Ok(unsafe { mem::transmute::<u8, Self>(row) }),
            _ => bail!("unknown rank: expected within 0..BOARD_WIDTH, got {row}"),
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", *self as u8 + 1)
    }
}

/// Playable board squares, `a1`..`h8`. Coordinates into the hedged board use
/// [`crate::chess::board::Board::hedged_index`] instead, since the board
/// itself is 12x12.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, strum::EnumIter)]
#[rustfmt::skip]
#[allow(missing_docs)]
pub enum Square {
    A1, B1, C1, D1, E1, F1, G1, H1,
    A2, B2, C2, D2, E2, F2, G2, H2,
    A3, B3, C3, D3, E3, F3, G3, H3,
    A4, B4, C4, D4, E4, F4, G4, H4,
    A5, B5, C5, D5, E5, F5, G5, H5,
    A6, B6, C6, D6, E6, F6, G6, H6,
    A7, B7, C7, D7, E7, F7, G7, H7,
    A8, B8, C8, D8, E8, F8, G8, H8,
}

impl Square {
    /// Connects file (column) and rank (row) to form a full square.
    #[must_use]
    pub fn new(file: File, rank: Rank) -> Self {
        unsafe { mem::transmute::<u8, Self>(file as u8 + (rank as u8) * BOARD_WIDTH) }
    }

    /// Returns file (column) on which the square is located.
    #[must_use]
    pub fn file(self) -> File {
        unsafe { mem::transmute::<u8, File>(self as u8 % BOARD_WIDTH) }
    }

    /// Returns rank (row) on which the square is located.
    #[must_use]
    pub fn rank(self) -> Rank {
        unsafe { mem::transmute::<u8, Rank>(self as u8 / BOARD_WIDTH) }
    }
}

impl TryFrom<u8> for Square {
    type Error = anyhow::Error;

    /// Creates a square given its position on the board.
    ///
    /// # Errors
    ///
    /// If given square index is outside 0..[`BOARD_SIZE`] range.
    fn try_from(square_index: u8) -> anyhow::Result<Self> {
        const MAX_INDEX: u8 = BOARD_SIZE - 1;
        match square_index {
            0..=MAX_INDEX => Ok(unsafe { mem::transmute::<u8, Self>(square_index) }),
            _ => bail!("unknown square index: needs to be in 0..BOARD_SIZE, got {square_index}"),
        }
    }
}

impl TryFrom<&str> for Square {
    type Error = anyhow::Error;

    fn try_from(square: &str) -> anyhow::Result<Self> {
        let bytes = square.as_bytes();
        if bytes.len() != 2 {
            bail!(
                "unknown square: should be two-char, got {square} with {} chars",
                bytes.len()
            );
        }
        let (file, rank) = (bytes[0] as char, bytes[1] as char);
        Ok(Self::new(file.try_into()?, rank.try_into()?))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.file(), self.rank())
    }
}

/// A standard game of chess is played between two players: White (having the
/// advantage of the first turn) and Black.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Player {
    White,
    Black,
}

impl Player {
    /// The other player.
    #[must_use]
    pub fn opponent(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

impl TryFrom<&str> for Player {
    type Error = anyhow::Error;

    fn try_from(player: &str) -> anyhow::Result<Self> {
        match player {
            "w" => Ok(Self::White),
            "b" => Ok(Self::Black),
            _ => bail!("unknown player: expected 'w' or 'b', got '{player}'"),
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::White => 'w',
                Self::Black => 'b',
            }
        )
    }
}

/// Standard [chess pieces](https://en.wikipedia.org/wiki/Chess_piece).
/// `King` sorts first to match the "most valuable target" ordering used by
/// `attack`/`pin` evaluation in [`crate::cql`].
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PieceKind {
    King,
    Queen,
    Rook,
    Bishop,
    Knight,
    Pawn,
}

impl PieceKind {
    /// Standard material point value (pawn = 1).
    #[must_use]
    pub fn value(self) -> u32 {
        match self {
            Self::King => 0,
            Self::Queen => 9,
            Self::Rook => 5,
            Self::Bishop | Self::Knight => 3,
            Self::Pawn => 1,
        }
    }
}

/// A piece owned by a player, or the absence of one. `Piece::Empty` fills
/// every non-hedge square that has no piece on it; `OffBoard` fills the
/// hedge itself, see [`crate::chess::board::Board`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Piece {
    /// No piece on a playable square.
    Empty,
    /// A piece owned by a player.
    Occupied(Player, PieceKind),
    /// Sentinel filling the hedge around the playable board.
    OffBoard,
}

impl Piece {
    /// Constructs a white piece of `kind`.
    #[must_use]
    pub fn white(kind: PieceKind) -> Self {
        Self::Occupied(Player::White, kind)
    }

    /// Constructs a black piece of `kind`.
    #[must_use]
    pub fn black(kind: PieceKind) -> Self {
        Self::Occupied(Player::Black, kind)
    }

    /// Returns `Some(kind)` if this is an on-board piece, regardless of owner.
    #[must_use]
    pub fn kind(self) -> Option<PieceKind> {
        match self {
            Self::Occupied(_, kind) => Some(kind),
            Self::Empty | Self::OffBoard => None,
        }
    }

    /// Returns `Some(owner)` if this is an on-board piece.
    #[must_use]
    pub fn owner(self) -> Option<Player> {
        match self {
            Self::Occupied(owner, _) => Some(owner),
            Self::Empty | Self::OffBoard => None,
        }
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }

    #[must_use]
    pub fn is_off_board(self) -> bool {
        matches!(self, Self::OffBoard)
    }

    /// Algebraic notation symbol used in FEN. Uppercase for white, lowercase
    /// for black.
    #[must_use]
    pub fn algebraic_symbol(self) -> Option<char> {
        let (owner, kind) = match self {
            Self::Occupied(owner, kind) => (owner, kind),
            Self::Empty | Self::OffBoard => return None,
        };
        let letter = match kind {
            PieceKind::King => 'k',
            PieceKind::Queen => 'q',
            PieceKind::Rook => 'r',
            PieceKind::Bishop => 'b',
            PieceKind::Knight => 'n',
            PieceKind::Pawn => 'p',
        };
        Some(match owner {
            Player::White => letter.to_ascii_uppercase(),
            Player::Black => letter,
        })
    }
}

impl TryFrom<char> for Piece {
    type Error = anyhow::Error;

    fn try_from(symbol: char) -> anyhow::Result<Self> {
        let owner = if symbol.is_ascii_uppercase() {
            Player::White
        } else {
            Player::Black
        };
        let kind = match symbol.to_ascii_lowercase() {
            'k' => PieceKind::King,
            'q' => PieceKind::Queen,
            'r' => PieceKind::Rook,
            'b' => PieceKind::Bishop,
            'n' => PieceKind::Knight,
            'p' => PieceKind::Pawn,
            _ => bail!("unknown piece symbol: expected within \"KQRBNPkqrbnp\", got '{symbol}'"),
        };
        Ok(Self::Occupied(owner, kind))
    }
}

bitflags::bitflags! {
    /// Tracks the ability to [castle](https://www.chessprogramming.org/Castling)
    /// each side, for both players, packed into one byte.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CastlingRights: u8 {
        /// White king-side.
        const WHITE_KINGSIDE = 0b0001;
        /// White queen-side.
        const WHITE_QUEENSIDE = 0b0010;
        /// Black king-side.
        const BLACK_KINGSIDE = 0b0100;
        /// Black queen-side.
        const BLACK_QUEENSIDE = 0b1000;
    }
}

impl CastlingRights {
    /// Parses castling rights from the FEN chunk, e.g. `"KQkq"` or `"-"`.
    ///
    /// # Errors
    ///
    /// Returns an error if an unexpected character is present.
    pub fn parse_fen(fen: &str) -> anyhow::Result<Self> {
        if fen == "-" {
            return Ok(Self::empty());
        }
        let mut result = Self::empty();
        for ch in fen.chars() {
            result |= match ch {
                'K' => Self::WHITE_KINGSIDE,
                'Q' => Self::WHITE_QUEENSIDE,
                'k' => Self::BLACK_KINGSIDE,
                'q' => Self::BLACK_QUEENSIDE,
                _ => bail!("unknown castling rights symbol: '{ch}' in \"{fen}\""),
            };
        }
        Ok(result)
    }

    /// Renders castling rights in FEN order `KQkq`.
    #[must_use]
    pub fn fen(self) -> String {
        if self.is_empty() {
            return "-".into();
        }
        let mut result = String::with_capacity(4);
        if self.contains(Self::WHITE_KINGSIDE) {
            result.push('K');
        }
        if self.contains(Self::WHITE_QUEENSIDE) {
            result.push('Q');
        }
        if self.contains(Self::BLACK_KINGSIDE) {
            result.push('k');
        }
        if self.contains(Self::BLACK_QUEENSIDE) {
            result.push('q');
        }
        result
    }

    /// Clears both rights for `player`, e.g. after their king has moved.
    pub fn clear_player(&mut self, player: Player) {
        match player {
            Player::White => self.remove(Self::WHITE_KINGSIDE | Self::WHITE_QUEENSIDE),
            Player::Black => self.remove(Self::BLACK_KINGSIDE | Self::BLACK_QUEENSIDE),
        }
    }
}

/// Classification of a made move, as tracked on
/// [`crate::pgn::arena::MoveNode`] and used by replay/annotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveClass {
    Normal,
    CastleShort,
    CastleLong,
    EnPassant,
    Promotion,
    DoublePush,
}
