//! The launcher: mode dispatch for the gene pool, the PGN validator, the
//! test and perft suites, and single games.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use galapagos_core::board::{Board, Color};
use galapagos_core::clock::Clock;
use galapagos_core::game_result::GameResult;
use galapagos_core::perft::{perft, perft_divide};
use galapagos_core::pgn::confirm_game_record;
use galapagos_engine::game::play_game;
use galapagos_engine::genome::Genome;
use galapagos_engine::player::GeneticPlayer;
use galapagos_pool::genome_file;
use galapagos_pool::pool::GenePool;

const USAGE: &str = "\
usage: galapagos <mode> | <white> <black> [options]

modes (mutually exclusive first argument):
  -gene-pool <config>   run the breeding loop described by the config file
  -confirm <pgn>        validate every game in a PGN file by replaying it
  -test                 run the built-in scenario suite
  -perft                run the perft correctness suite
  -speed                measure search and move-generation speed
  -list <depth> [<fen>] print per-move node counts for a position
  -help                 print this message

anything else starts a single game between two players, each specified as
a genome file with an optional id (genomes.txt or genomes.txt/42):
  galapagos <white spec> <black spec> [-time <seconds>] [-pgn <file>]
";

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => {}
        Err(error) => {
            eprintln!("{error:#}");
            std::process::exit(1);
        }
    }
}

fn run(args: &[String]) -> Result<()> {
    let Some(first) = args.first() else {
        print!("{USAGE}");
        return Ok(());
    };

    match first.as_str() {
        "-help" => {
            print!("{USAGE}");
            Ok(())
        }
        "-gene-pool" => {
            let config = args.get(1).ok_or_else(|| anyhow!("-gene-pool needs a config file"))?;
            let mut pool = GenePool::from_config_file(Path::new(config))
                .with_context(|| format!("starting gene pool from {config}"))?;
            pool.run()?;
            Ok(())
        }
        "-confirm" => {
            let pgn = args.get(1).ok_or_else(|| anyhow!("-confirm needs a PGN file"))?;
            confirm_game_record(Path::new(pgn))?;
            println!("{pgn}: all games check out");
            Ok(())
        }
        "-test" => run_test_suite(),
        "-perft" => run_perft_suite(),
        "-speed" => run_speed_test(),
        "-list" => {
            let depth: u32 = args
                .get(1)
                .ok_or_else(|| anyhow!("-list needs a depth"))?
                .parse()
                .context("parsing the depth")?;
            let mut board = match args.get(2) {
                Some(fen) => Board::from_fen(fen)?,
                None => Board::starting_position(),
            };
            for (label, nodes) in perft_divide(&mut board, depth) {
                println!("{label}: {nodes}");
            }
            Ok(())
        }
        _ => run_single_game(args),
    }
}

/// Load a player from `file` or `file/id`.
fn load_player(spec: &str) -> Result<GeneticPlayer> {
    let (file, id) = match spec.rsplit_once('/') {
        Some((file, id)) if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) => {
            (file, Some(id.parse::<u64>()?))
        }
        _ => (spec, None),
    };

    let specimen = genome_file::load_genome(Path::new(file), id)
        .with_context(|| format!("loading a genome from {spec}"))?;
    Ok(GeneticPlayer::new(specimen.genome, specimen.id))
}

fn run_single_game(args: &[String]) -> Result<()> {
    let mut specs = Vec::new();
    let mut seconds = 300.0;
    let mut pgn: Option<PathBuf> = None;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "-time" => {
                seconds = args
                    .get(index + 1)
                    .ok_or_else(|| anyhow!("-time needs a value in seconds"))?
                    .parse()
                    .context("parsing -time")?;
                index += 2;
            }
            "-pgn" => {
                pgn = Some(PathBuf::from(
                    args.get(index + 1).ok_or_else(|| anyhow!("-pgn needs a file"))?,
                ));
                index += 2;
            }
            other if other.starts_with('-') => bail!("unknown option {other}; try -help"),
            spec => {
                specs.push(spec.to_owned());
                index += 1;
            }
        }
    }

    let [white_spec, black_spec] = specs.as_slice() else {
        bail!("a game needs exactly two player specifications; try -help");
    };

    let mut white = load_player(white_spec)?;
    let mut black = load_player(black_spec)?;

    let result = play_game(
        Board::starting_position(),
        Clock::with_time(seconds),
        &mut white,
        &mut black,
        "Single game",
        "Local computer",
        pgn.as_deref(),
    );
    println!("{} {}", result.annotation(), result.ending_reason());
    Ok(())
}

/// The end-to-end scenarios: known games, draw rules, and the genome
/// file round trip. Exit status reports pass/fail.
fn run_test_suite() -> Result<()> {
    let mut failures = 0;
    let mut check = |name: &str, passed: bool| {
        println!("{}: {name}", if passed { "pass" } else { "FAIL" });
        if !passed {
            failures += 1;
        }
    };

    // Fool's mate.
    {
        let mut board = Board::starting_position();
        let mut result = GameResult::Ongoing;
        for coordinates in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            let m = board.parse_coordinate_move(coordinates)?;
            result = board.play_move(m);
        }
        check("fool's mate", result == GameResult::Checkmate(Color::Black));
    }

    // Scholar's mate, with the SAN of the mating move.
    {
        let mut board = Board::starting_position();
        let mut result = GameResult::Ongoing;
        let mut last_san = String::new();
        for coordinates in ["e2e4", "e7e5", "f1c4", "b8c6", "d1h5", "g8f6", "h5f7"] {
            let m = board.parse_coordinate_move(coordinates)?;
            last_san = board.san(m);
            result = board.play_move(m);
        }
        check(
            "scholar's mate",
            result == GameResult::Checkmate(Color::White) && last_san == "Qxf7#",
        );
    }

    // En-passant target visibility.
    {
        let mut board = Board::starting_position();
        for coordinates in ["e2e4", "a7a6", "e4e5", "d7d5"] {
            let m = board.parse_coordinate_move(coordinates)?;
            board.play_move(m);
        }
        check("en passant offered", board.fen().contains(" d6 "));

        let mut board = Board::starting_position();
        for coordinates in ["e2e4", "a7a6", "e4e5", "b7b5"] {
            let m = board.parse_coordinate_move(coordinates)?;
            board.play_move(m);
        }
        check("phantom target suppressed", board.fen().contains(" - "));
    }

    // Threefold by king shuffle.
    {
        let mut board = Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1")?;
        let mut result = GameResult::Ongoing;
        for coordinates in ["e1d1", "e8d8", "d1e1", "d8e8", "e1d1", "e8d8", "d1e1", "d8e8"] {
            let m = board.parse_coordinate_move(coordinates)?;
            result = board.play_move(m);
        }
        check("threefold repetition", result == GameResult::Threefold);
    }

    // Castling revocation.
    {
        let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
        let mut board = Board::from_fen(fen)?;
        let m = board.parse_coordinate_move("a1a2")?;
        board.play_move(m);
        let rook_case = board.castling().as_fen_str() == "Kkq";

        let mut board = Board::from_fen(fen)?;
        let m = board.parse_coordinate_move("e1e2")?;
        board.play_move(m);
        check(
            "castling revocation",
            rook_case && board.castling().as_fen_str() == "kq",
        );
    }

    // Genome write/read/write byte identity.
    {
        let genome = Genome::new();
        let written = genome.write_block();
        let identical = Genome::parse(&written)
            .map(|reread| reread.write_block() == written)
            .unwrap_or(false);
        check("genome round trip", identical);
    }

    if failures > 0 {
        bail!("{failures} scenario(s) failed");
    }
    println!("all scenarios passed");
    Ok(())
}

fn run_perft_suite() -> Result<()> {
    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    const CPW_POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";

    let suite: [(&str, &str, &[u64]); 3] = [
        (
            "starting position",
            galapagos_core::board::STARTING_POSITION_FEN,
            &[20, 400, 8_902, 197_281, 4_865_609],
        ),
        ("kiwipete", KIWIPETE, &[48, 2_039, 97_862, 4_085_603]),
        (
            "position 3",
            CPW_POSITION_3,
            &[14, 191, 2_812, 43_238, 674_624],
        ),
    ];

    let mut failures = 0;
    for (name, fen, expected) in suite {
        let mut board = Board::from_fen(fen)?;
        for (depth_index, &want) in expected.iter().enumerate() {
            let depth = depth_index as u32 + 1;
            let start = Instant::now();
            let got = perft(&mut board, depth);
            let status = if got == want { "pass" } else { "FAIL" };
            println!(
                "{status}: {name} depth {depth}: {got} nodes ({want} expected, {:?})",
                start.elapsed()
            );
            if got != want {
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} perft count(s) wrong");
    }
    Ok(())
}

fn run_speed_test() -> Result<()> {
    // Raw move generation speed via perft.
    let mut board = Board::starting_position();
    let start = Instant::now();
    let nodes = perft(&mut board, 5);
    let elapsed = start.elapsed().as_secs_f64();
    println!(
        "perft: {nodes} nodes in {elapsed:.2}s ({:.0} nodes/s)",
        nodes as f64 / elapsed
    );

    // Search speed with a default genome (includes its calibration).
    let player = GeneticPlayer::new(Genome::new(), 0);
    println!(
        "search: {:.2e} s/node (calibrated), centipawn unit {:.3e}",
        player.calibration().node_seconds,
        player.calibration().centipawn_value
    );
    Ok(())
}
