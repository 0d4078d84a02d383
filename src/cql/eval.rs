//! CQL evaluator: walks an [`Ast`] against a [`Board`] (and optional
//! game-level context) to a Boolean verdict.

use strum::IntoEnumIterator;

use crate::chess::board::Board;
use crate::chess::core::{File, Piece, PieceKind, Player, Rank, Square};
use crate::cql::ast::{Ast, CompareOp, LogicalOp};
use crate::cql::transform::{self, Transform};

/// Everything a CQL query may reach for beyond the board itself: tag-level
/// game context (`result`/`player`/`year`/`elo`).
#[derive(Clone, Copy, Debug, Default)]
pub struct GameContext<'a> {
    pub result: Option<&'a str>,
    pub white_player: Option<&'a str>,
    pub black_player: Option<&'a str>,
    pub year: Option<i64>,
    pub white_elo: Option<i64>,
    pub black_elo: Option<i64>,
}

/// Bundles a board with its optional game context for one evaluation.
/// `SetBoard` from the spec's API is modelled by constructing a new
/// `EvalContext` per position rather than mutating one in place, since
/// `Board` is cheap to reference here.
#[derive(Clone, Copy, Debug)]
pub struct EvalContext<'a> {
    pub board: &'a Board,
    pub game: GameContext<'a>,
}

impl<'a> EvalContext<'a> {
    #[must_use]
    pub fn new(board: &'a Board) -> Self {
        Self {
            board,
            game: GameContext::default(),
        }
    }

    #[must_use]
    pub fn with_game(board: &'a Board, game: GameContext<'a>) -> Self {
        Self { board, game }
    }
}

#[derive(Clone, Copy, Debug)]
enum Value {
    Bool(bool),
    Number(i64),
}

/// Evaluates `ast` against `ctx`, coercing a non-Boolean result (a bare
/// `count`/`material`/`year` value with nothing to compare against) to
/// "truthy if nonzero".
#[must_use]
pub fn eval_bool(ast: &Ast, ctx: &EvalContext<'_>) -> bool {
    match eval(ast, ctx) {
        Value::Bool(b) => b,
        Value::Number(n) => n != 0,
    }
}

fn eval_number(ast: &Ast, ctx: &EvalContext<'_>) -> i64 {
    match eval(ast, ctx) {
        Value::Number(n) => n,
        Value::Bool(b) => i64::from(b),
    }
}

fn eval(ast: &Ast, ctx: &EvalContext<'_>) -> Value {
    match ast {
        Ast::Number(n) => Value::Number(*n),
        Ast::String(_) | Ast::Direction(_) | Ast::Piece(_) | Ast::Square(_) => Value::Bool(false),
        Ast::Logical(LogicalOp::And, children) => {
            Value::Bool(children.iter().all(|child| eval_bool(child, ctx)))
        }
        Ast::Logical(LogicalOp::Or, children) => {
            Value::Bool(children.iter().any(|child| eval_bool(child, ctx)))
        }
        Ast::Logical(LogicalOp::Not, children) => Value::Bool(!eval_bool(&children[0], ctx)),
        Ast::Comparison(op, left, right) => {
            let (l, r) = (eval_number(left, ctx), eval_number(right, ctx));
            Value::Bool(match op {
                CompareOp::Lt => l < r,
                CompareOp::Gt => l > r,
                CompareOp::Le => l <= r,
                CompareOp::Ge => l >= r,
                CompareOp::Eq => l == r,
            })
        }
        Ast::Filter(name, args) => eval_filter(name, args, ctx),
    }
}

fn eval_filter(name: &str, args: &[Ast], ctx: &EvalContext<'_>) -> Value {
    match name {
        "mate" => Value::Bool(ctx.board.is_checkmate()),
        "stalemate" => Value::Bool(ctx.board.is_stalemate()),
        "check" => Value::Bool(ctx.board.in_check(ctx.board.to_move())),
        "wtm" => Value::Bool(ctx.board.to_move() == Player::White),
        "btm" => Value::Bool(ctx.board.to_move() == Player::Black),
        "piece" => eval_piece(args, ctx),
        "count" => eval_count(args, ctx),
        "material" => eval_material(args, ctx),
        "result" => Value::Bool(matches!(&args[0], Ast::String(s) if ctx.game.result == Some(s.as_str()))),
        "player" => Value::Bool(matches!(&args[0], Ast::String(s) if ctx.game.white_player == Some(s.as_str()) || ctx.game.black_player == Some(s.as_str()))),
        "year" => Value::Bool(matches!(&args[0], Ast::Number(y) if ctx.game.year == Some(*y))),
        "elo" => eval_elo(args, ctx),
        "attack" => eval_attack(args, ctx),
        "between" => eval_between(args),
        "pin" => eval_pin(args, ctx),
        "ray" => eval_ray(args),
        "flip" => eval_transform_once(&args[0], Transform::FlipHorizontal, ctx),
        "flipvertical" => eval_transform_once(&args[0], Transform::FlipVertical, ctx),
        "flipcolor" => eval_transform_once(&args[0], Transform::FlipColor, ctx),
        "shift" => eval_transform_many(&args[0], transform::shift_deltas(), ctx),
        "shifthorizontal" => eval_transform_many(&args[0], transform::shift_horizontal_deltas(), ctx),
        "shiftvertical" => eval_transform_many(&args[0], transform::shift_vertical_deltas(), ctx),
        _ => Value::Bool(false),
    }
}

fn eval_piece(args: &[Ast], ctx: &EvalContext<'_>) -> Value {
    let (Ast::Piece(set), Ast::Square(squares)) = (&args[0], &args[1]) else {
        return Value::Bool(false);
    };
    Value::Bool(
        squares
            .iter()
            .any(|&square| set.iter().any(|designator| designator.matches(ctx.board.at(square)))),
    )
}

fn eval_count(args: &[Ast], ctx: &EvalContext<'_>) -> Value {
    let Ast::Piece(set) = &args[0] else {
        return Value::Number(0);
    };
    let count = Square::iter()
        .filter(|&square| set.iter().any(|designator| designator.matches(ctx.board.at(square))))
        .count();
    Value::Number(i64::try_from(count).unwrap_or(i64::MAX))
}

fn eval_material(args: &[Ast], ctx: &EvalContext<'_>) -> Value {
    let Ast::String(colour) = &args[0] else {
        return Value::Number(0);
    };
    let player = if colour == "white" { Player::White } else { Player::Black };
    let total: u32 = ctx
        .board
        .pieces()
        .filter(|&(_, owner, _)| owner == player)
        .map(|(_, _, kind)| kind.value())
        .sum();
    Value::Number(i64::from(total))
}

fn eval_elo(args: &[Ast], ctx: &EvalContext<'_>) -> Value {
    let Ast::String(colour) = &args[0] else {
        return Value::Number(0);
    };
    let elo = if colour == "white" { ctx.game.white_elo } else { ctx.game.black_elo };
    Value::Number(elo.unwrap_or(0))
}

fn step(square: Square, delta_file: i32, delta_rank: i32) -> Option<Square> {
    let file = square.file() as i32 + delta_file;
    let rank = square.rank() as i32 + delta_rank;
    if !(0..8).contains(&file) || !(0..8).contains(&rank) {
        return None;
    }
    Some(Square::new(
        File::try_from(file as u8).ok()?,
        Rank::try_from(rank as u8).ok()?,
    ))
}

const ROOK_DIRS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_DIRS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const KING_DIRS: [(i32, i32); 8] = [
    (1, 0), (-1, 0), (0, 1), (0, -1), (1, 1), (1, -1), (-1, 1), (-1, -1),
];
const KNIGHT_DELTAS: [(i32, i32); 8] = [
    (1, 2), (2, 1), (2, -1), (1, -2), (-1, -2), (-2, -1), (-2, 1), (-1, 2),
];

/// Every square attacked by a piece of `kind`/`colour` standing on `from`,
/// honouring blocking for sliding pieces. Pure attack geometry, independent
/// of whose turn it is or whether the attacker is pinned.
fn squares_attacked_by(board: &Board, from: Square, kind: PieceKind, colour: Player) -> Vec<Square> {
    match kind {
        PieceKind::Knight => KNIGHT_DELTAS.iter().filter_map(|&(df, dr)| step(from, df, dr)).collect(),
        PieceKind::King => KING_DIRS.iter().filter_map(|&(df, dr)| step(from, df, dr)).collect(),
        PieceKind::Pawn => {
            let forward = if colour == Player::White { 1 } else { -1 };
            [(-1, forward), (1, forward)]
                .into_iter()
                .filter_map(|(df, dr)| step(from, df, dr))
                .collect()
        }
        PieceKind::Rook => slide(board, from, &ROOK_DIRS),
        PieceKind::Bishop => slide(board, from, &BISHOP_DIRS),
        PieceKind::Queen => {
            let mut squares = slide(board, from, &ROOK_DIRS);
            squares.extend(slide(board, from, &BISHOP_DIRS));
            squares
        }
    }
}

fn slide(board: &Board, from: Square, dirs: &[(i32, i32)]) -> Vec<Square> {
    let mut squares = Vec::new();
    for &(df, dr) in dirs {
        let mut current = from;
        while let Some(next) = step(current, df, dr) {
            squares.push(next);
            if !board.at(next).is_empty() {
                break;
            }
            current = next;
        }
    }
    squares
}

fn eval_attack(args: &[Ast], ctx: &EvalContext<'_>) -> Value {
    let Ast::Piece(attackers) = &args[0] else {
        return Value::Bool(false);
    };
    for (square, owner, kind) in ctx.board.pieces() {
        if !attackers.iter().any(|d| d.matches(Piece::Occupied(owner, kind))) {
            continue;
        }
        let reach = squares_attacked_by(ctx.board, square, kind, owner);
        let hit = match &args[1] {
            Ast::Piece(targets) => reach
                .iter()
                .any(|&sq| targets.iter().any(|d| d.matches(ctx.board.at(sq)))),
            Ast::Square(targets) => reach.iter().any(|sq| targets.contains(sq)),
            _ => false,
        };
        if hit {
            return Value::Bool(true);
        }
    }
    Value::Bool(false)
}

fn colinear(a: Square, b: Square) -> Option<(i32, i32)> {
    if a == b {
        return None;
    }
    let df = b.file() as i32 - a.file() as i32;
    let dr = b.rank() as i32 - a.rank() as i32;
    if df == 0 || dr == 0 || df.abs() == dr.abs() {
        Some((df.signum(), dr.signum()))
    } else {
        None
    }
}

fn between_squares(a: Square, b: Square) -> Vec<Square> {
    let Some((sf, sr)) = colinear(a, b) else {
        return Vec::new();
    };
    let mut squares = Vec::new();
    let mut current = a;
    while let Some(next) = step(current, sf, sr) {
        if next == b {
            break;
        }
        squares.push(next);
        current = next;
    }
    squares
}

fn eval_between(args: &[Ast]) -> Value {
    let (Ast::Square(from), Ast::Square(to)) = (&args[0], &args[1]) else {
        return Value::Bool(false);
    };
    Value::Bool(
        from.iter()
            .any(|&a| to.iter().any(|&b| !between_squares(a, b).is_empty())),
    )
}

fn slides_in_direction(kind: PieceKind, delta_file: i32, delta_rank: i32) -> bool {
    match kind {
        PieceKind::Queen => true,
        PieceKind::Rook => delta_file == 0 || delta_rank == 0,
        PieceKind::Bishop => delta_file != 0 && delta_rank != 0,
        _ => false,
    }
}

fn first_piece_in_direction(
    board: &Board,
    from: Square,
    delta_file: i32,
    delta_rank: i32,
) -> Option<(Square, Player, PieceKind)> {
    let mut current = from;
    while let Some(next) = step(current, delta_file, delta_rank) {
        let piece = board.at(next);
        if let (Some(owner), Some(kind)) = (piece.owner(), piece.kind()) {
            return Some((next, owner, kind));
        }
        current = next;
    }
    None
}

fn eval_pin(args: &[Ast], ctx: &EvalContext<'_>) -> Value {
    let (Ast::Piece(pinners), Ast::Piece(pinned), Ast::Piece(targets)) = (&args[0], &args[1], &args[2]) else {
        return Value::Bool(false);
    };
    for (square, owner, kind) in ctx.board.pieces() {
        if !pinned.iter().any(|d| d.matches(Piece::Occupied(owner, kind))) {
            continue;
        }
        for &(df, dr) in &KING_DIRS {
            let near = first_piece_in_direction(ctx.board, square, df, dr);
            let far = first_piece_in_direction(ctx.board, square, -df, -dr);
            let (Some((_, near_owner, near_kind)), Some((_, far_owner, far_kind))) = (near, far) else {
                continue;
            };
            if pinners.iter().any(|d| d.matches(Piece::Occupied(near_owner, near_kind)))
                && targets.iter().any(|d| d.matches(Piece::Occupied(far_owner, far_kind)))
                && slides_in_direction(near_kind, df, dr)
            {
                return Value::Bool(true);
            }
        }
    }
    Value::Bool(false)
}

fn direction_matches(a: Square, b: Square, direction: &str) -> bool {
    let Some((df, dr)) = colinear(a, b) else {
        return false;
    };
    match direction {
        "horizontal" => dr == 0 && df != 0,
        "vertical" => df == 0 && dr != 0,
        "diagonal" => df != 0 && dr != 0,
        "orthogonal" => df == 0 || dr == 0,
        _ => false,
    }
}

fn eval_ray(args: &[Ast]) -> Value {
    let (Ast::Direction(direction), Ast::Square(from), Ast::Square(to)) = (&args[0], &args[1], &args[2]) else {
        return Value::Bool(false);
    };
    Value::Bool(
        from.iter()
            .any(|&a| to.iter().any(|&b| direction_matches(a, b, direction))),
    )
}

fn eval_transform_once(child: &Ast, transform: Transform, ctx: &EvalContext<'_>) -> Value {
    if eval_bool(child, ctx) {
        return Value::Bool(true);
    }
    match transform::apply(child, transform) {
        Some(rewritten) => Value::Bool(eval_bool(&rewritten, ctx)),
        None => Value::Bool(false),
    }
}

fn eval_transform_many(child: &Ast, deltas: Vec<(i8, i8)>, ctx: &EvalContext<'_>) -> Value {
    if eval_bool(child, ctx) {
        return Value::Bool(true);
    }
    for (df, dr) in deltas {
        if let Some(rewritten) = transform::apply(child, Transform::Shift(df, dr)) {
            if eval_bool(&rewritten, ctx) {
                return Value::Bool(true);
            }
        }
    }
    Value::Bool(false)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::cql::parser::parse;

    #[test]
    fn fools_mate_satisfies_mate_query() {
        let mut board = Board::starting();
        board.apply_candidate(PieceKind::Pawn, Some(File::F), None, Square::F3, None, None).unwrap();
        board.apply_candidate(PieceKind::Pawn, Some(File::E), None, Square::E5, None, None).unwrap();
        board.apply_candidate(PieceKind::Pawn, Some(File::G), None, Square::G4, None, None).unwrap();
        board.apply_candidate(PieceKind::Queen, None, None, Square::H4, None, None).unwrap();

        let ast = parse("mate").unwrap();
        assert!(eval_bool(&ast, &EvalContext::new(&board)));
    }

    #[test]
    fn scholars_mate_is_matched_by_cql() {
        let mut board = Board::starting();
        board.apply_candidate(PieceKind::Pawn, Some(File::E), None, Square::E4, None, None).unwrap();
        board.apply_candidate(PieceKind::Pawn, Some(File::E), None, Square::E5, None, None).unwrap();
        board.apply_candidate(PieceKind::Bishop, None, None, Square::C4, None, None).unwrap();
        board.apply_candidate(PieceKind::Knight, Some(File::B), None, Square::C6, None, None).unwrap();
        board.apply_candidate(PieceKind::Queen, None, None, Square::H5, None, None).unwrap();
        board.apply_candidate(PieceKind::Knight, Some(File::G), None, Square::F6, None, None).unwrap();
        board.apply_candidate(PieceKind::Queen, None, Some(Rank::Five), Square::F7, None, None).unwrap();

        let ctx = EvalContext::new(&board);
        assert!(eval_bool(&parse("(and mate (piece Q f7))").unwrap(), &ctx));
        assert!(!eval_bool(&parse("(and mate (piece q h4))").unwrap(), &ctx));
    }

    #[test]
    fn count_and_material_on_starting_position() {
        let board = Board::starting();
        let ctx = EvalContext::new(&board);
        assert_eq!(eval_number(&parse("(count P)").unwrap(), &ctx), 8);
        assert_eq!(eval_number(&parse("(material \"white\")").unwrap(), &ctx), 39);
    }

    #[test]
    fn flip_transform_symmetry() {
        // eval(flip(E), b) == eval(E, flipFilesOf(b)) || eval(E, b).
        let board = Board::from_fen("4k3/8/8/8/8/8/8/R3K3 w Q - 0 1").unwrap();
        let flipped = Board::from_fen("4k3/8/8/8/8/8/8/3KR3 w - - 0 1").unwrap();
        let ast = parse("(piece R a1)").unwrap();
        let flip_ast = parse("(flip (piece R a1))").unwrap();

        assert!(!eval_bool(&ast, &EvalContext::new(&board)));
        assert!(eval_bool(&ast, &EvalContext::new(&flipped)));
        assert!(eval_bool(&flip_ast, &EvalContext::new(&board)));
    }

    #[test]
    fn attack_detects_rook_on_open_file() {
        let board = Board::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
        let ctx = EvalContext::new(&board);
        assert!(eval_bool(&parse("(attack [R] e1)").unwrap(), &ctx));
    }

    #[test]
    fn between_requires_a_clear_colinear_gap() {
        let board = Board::starting();
        let ctx = EvalContext::new(&board);
        assert!(eval_bool(&parse("(between a1 a8)").unwrap(), &ctx));
        assert!(!eval_bool(&parse("(between a1 b2)").unwrap(), &ctx));
    }
}
