use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

const BINARY_NAME: &str = "pgnsift";

const TWO_GAMES: &str = r#"[Event "Test"]
[Site "?"]
[Date "2024.01.01"]
[Round "1"]
[White "A"]
[Black "B"]
[Result "1-0"]

1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 1-0

[Event "Test"]
[Site "?"]
[Date "2024.01.02"]
[Round "2"]
[White "C"]
[Black "D"]
[Result "0-1"]

1. d4 d5 2. c4 e6 0-1
"#;

#[test]
fn passes_through_games_unfiltered() {
    let mut cmd = Command::cargo_bin(BINARY_NAME).expect("binary should be built");
    cmd.write_stdin(TWO_GAMES)
        .assert()
        .success()
        .stdout(contains("1. e4 e5").and(contains("1. d4 d5")));
}

#[test]
fn cql_query_selects_matching_games_only() {
    let mut cmd = Command::cargo_bin(BINARY_NAME).expect("binary should be built");
    cmd.arg("--cql")
        .arg("piece Q on e4")
        .write_stdin(TWO_GAMES)
        .assert()
        .success()
        .stdout(contains("1. e4 e5").not().and(contains("1. d4 d5").not()));
}

#[test]
fn stop_after_limits_matched_games() {
    let mut cmd = Command::cargo_bin(BINARY_NAME).expect("binary should be built");
    cmd.arg("--stopafter")
        .arg("1")
        .write_stdin(TWO_GAMES)
        .assert()
        .success()
        .stdout(contains("1. e4 e5").and(contains("1. d4 d5").not()));
}

#[test]
fn suppress_duplicates_drops_repeated_game() {
    let mut cmd = Command::cargo_bin(BINARY_NAME).expect("binary should be built");
    let repeated = format!("{TWO_GAMES}{TWO_GAMES}");
    cmd.arg("--suppress-duplicates")
        .write_stdin(repeated)
        .assert()
        .success();
}

#[test]
fn quiet_suppresses_summary_line() {
    let mut cmd = Command::cargo_bin(BINARY_NAME).expect("binary should be built");
    cmd.arg("-s")
        .write_stdin(TWO_GAMES)
        .assert()
        .success()
        .stdout(contains("matched").not());
}

#[test]
fn strict_rejects_games_missing_mandatory_tags() {
    let mut cmd = Command::cargo_bin(BINARY_NAME).expect("binary should be built");
    let minimal = "[Event \"Test\"]\n\n1. e4 *\n";
    cmd.arg("--strict").write_stdin(minimal).assert().success();
}
