//! Generates the Zobrist key tables used by [`pgnsift::chess::zobrist`] at
//! build time, from a fixed seed so that keys (and therefore hashes) are
//! stable across rebuilds of the same source. Keys live in `OUT_DIR` and are
//! pulled in with `include!`, the same pattern the teacher crate this was
//! adapted from uses for its own Zobrist tables.

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

/// Arbitrary fixed seed. Changing this changes every Zobrist hash the crate
/// will ever produce; it is not meant to be tuned, only to be *fixed*.
const ZOBRIST_SEED: u64 = 0x5A6F_6272_6973_7421;

fn generate_file(filename: &str, contents: &str) {
    let out_dir = std::env::var_os("OUT_DIR").unwrap();
    let dest_path = std::path::Path::new(&out_dir).join(filename);
    std::fs::write(dest_path, contents).unwrap();
}

fn generate_zobrist_keys() {
    let mut rng = StdRng::seed_from_u64(ZOBRIST_SEED);

    // 64 squares x 12 (piece kind, colour) combinations.
    for piece in [
        "white_king",
        "white_queen",
        "white_rook",
        "white_bishop",
        "white_knight",
        "white_pawn",
        "black_king",
        "black_queen",
        "black_rook",
        "black_bishop",
        "black_knight",
        "black_pawn",
    ] {
        let piece_keys: [u64; 64] = std::array::from_fn(|_| rng.gen());
        generate_file(&format!("{piece}_zobrist_keys"), &format!("{piece_keys:?}"));
    }

    // One key per of the 16 possible castling-rights bitmasks.
    let castling_keys: [u64; 16] = std::array::from_fn(|_| rng.gen());
    generate_file("castling_zobrist_keys", &format!("{castling_keys:?}"));

    // One key per file, used when an en-passant target square is set.
    let en_passant_keys: [u64; 8] = std::array::from_fn(|_| rng.gen());
    generate_file("en_passant_zobrist_keys", &format!("{en_passant_keys:?}"));

    let side_to_move_key: u64 = rng.gen();
    generate_file("side_to_move_zobrist_key", &side_to_move_key.to_string());
}

fn main() {
    generate_zobrist_keys();
    println!("cargo:rerun-if-changed=build.rs");
}
