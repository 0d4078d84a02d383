//! Board-symmetry/shift AST rewriting: rather than transforming the board,
//! the literal square and piece-colour leaves of an [`Ast`] are rewritten in
//! place, since the result of evaluating the rewritten query against the
//! original board is equivalent.

use crate::chess::core::{File, Rank, Square};
use crate::cql::ast::Ast;

/// A single board symmetry or shift to rewrite an [`Ast`] under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transform {
    FlipHorizontal,
    FlipVertical,
    FlipColor,
    Shift(i8, i8),
}

fn transform_square(square: Square, transform: Transform) -> Option<Square> {
    let file = square.file() as i8;
    let rank = square.rank() as i8;
    let (new_file, new_rank) = match transform {
        Transform::FlipHorizontal => (7 - file, rank),
        Transform::FlipVertical => (file, 7 - rank),
        Transform::FlipColor => (file, rank),
        Transform::Shift(df, dr) => (file + df, rank + dr),
    };
    if !(0..8).contains(&new_file) || !(0..8).contains(&new_rank) {
        return None;
    }
    Some(Square::new(
        File::try_from(new_file as u8).ok()?,
        Rank::try_from(new_rank as u8).ok()?,
    ))
}

/// Rewrites every square/piece-colour leaf of `ast` under `transform`.
/// Returns `None` if a `Shift` takes any literal square off the board.
#[must_use]
pub fn apply(ast: &Ast, transform: Transform) -> Option<Ast> {
    match ast {
        Ast::Filter(name, args) => Some(Ast::Filter(
            name.clone(),
            args.iter()
                .map(|arg| apply(arg, transform))
                .collect::<Option<Vec<_>>>()?,
        )),
        Ast::Logical(op, children) => Some(Ast::Logical(
            *op,
            children
                .iter()
                .map(|child| apply(child, transform))
                .collect::<Option<Vec<_>>>()?,
        )),
        Ast::Comparison(op, left, right) => Some(Ast::Comparison(
            *op,
            Box::new(apply(left, transform)?),
            Box::new(apply(right, transform)?),
        )),
        Ast::Piece(set) => Some(Ast::Piece(if transform == Transform::FlipColor {
            set.iter().map(|d| d.flip_colour()).collect()
        } else {
            set.clone()
        })),
        Ast::Square(set) => Some(Ast::Square(
            set.iter()
                .map(|&square| transform_square(square, transform))
                .collect::<Option<Vec<_>>>()?,
        )),
        Ast::Number(_) | Ast::String(_) | Ast::Direction(_) => Some(ast.clone()),
    }
}

/// All 225 `(Δfile, Δrank)` pairs in `[-7, 7]²`, used by `shift`.
#[must_use]
pub fn shift_deltas() -> Vec<(i8, i8)> {
    (-7i8..=7).flat_map(|df| (-7i8..=7).map(move |dr| (df, dr))).collect()
}

/// The 15 file-only shifts, used by `shifthorizontal`.
#[must_use]
pub fn shift_horizontal_deltas() -> Vec<(i8, i8)> {
    (-7i8..=7).map(|df| (df, 0)).collect()
}

/// The 15 rank-only shifts, used by `shiftvertical`.
#[must_use]
pub fn shift_vertical_deltas() -> Vec<(i8, i8)> {
    (-7i8..=7).map(|dr| (0, dr)).collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::cql::ast::PieceDesignator;
    use crate::chess::core::{PieceKind, Player};

    #[test]
    fn flip_horizontal_mirrors_files() {
        let ast = Ast::Square(vec![Square::A1]);
        let Some(Ast::Square(squares)) = apply(&ast, Transform::FlipHorizontal) else {
            panic!("expected a square")
        };
        assert_eq!(squares, vec![Square::H1]);
    }

    #[test]
    fn flip_vertical_mirrors_ranks() {
        let ast = Ast::Square(vec![Square::A1]);
        let Some(Ast::Square(squares)) = apply(&ast, Transform::FlipVertical) else {
            panic!("expected a square")
        };
        assert_eq!(squares, vec![Square::A8]);
    }

    #[test]
    fn flip_color_swaps_piece_designators() {
        let ast = Ast::Piece(vec![PieceDesignator::Exact(Player::White, PieceKind::King)]);
        let Some(Ast::Piece(set)) = apply(&ast, Transform::FlipColor) else {
            panic!("expected a piece set")
        };
        assert_eq!(set, vec![PieceDesignator::Exact(Player::Black, PieceKind::King)]);
    }

    #[test]
    fn shift_out_of_bounds_is_none() {
        let ast = Ast::Square(vec![Square::A1]);
        assert!(apply(&ast, Transform::Shift(-1, 0)).is_none());
    }

    #[test]
    fn shift_deltas_has_225_entries() {
        assert_eq!(shift_deltas().len(), 225);
    }
}
