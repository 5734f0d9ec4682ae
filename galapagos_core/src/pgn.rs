//! PGN game records: writing finished games and validating existing files
//! by replaying every move against the board.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;
use std::sync::Mutex;

use thiserror::Error;

use crate::board::{Board, Color, FenError, SanError};
use crate::game_result::GameResult;

/// One played move as it appears in a record: its SAN text plus optional
/// commentary emitted after it in braces.
#[derive(Debug, Clone)]
pub struct AnnotatedMove {
    pub san: String,
    pub comment: Option<String>,
}

/// Everything needed to write one game's PGN record.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub event: String,
    pub site: String,
    /// `YYYY.MM.DD`, or `????.??.??` when unknown.
    pub date: String,
    pub round: String,
    pub white: String,
    pub black: String,
    pub result: GameResult,
    pub time_control: Option<String>,
    pub time_left_white: Option<f64>,
    pub time_left_black: Option<f64>,
    /// The originating FEN when the game did not start from the standard
    /// position; emits the `SetUp`/`FEN` tag pair.
    pub starting_fen: Option<String>,
    pub moves: Vec<AnnotatedMove>,
    /// Move number and side of the first recorded move.
    pub first_move_number: u32,
    pub first_to_move: Color,
}

impl GameRecord {
    /// Render the record: tag section, blank line, wrapped movetext ending
    /// with the result token.
    pub fn render(&self) -> String {
        let mut out = String::new();

        let mut tag = |name: &str, value: &str| {
            writeln!(out, "[{name} \"{value}\"]").unwrap();
        };

        tag("Event", some_or_unknown(&self.event));
        tag("Site", some_or_unknown(&self.site));
        tag("Date", some_or_unknown(&self.date));
        tag("Round", some_or_unknown(&self.round));
        tag("White", some_or_unknown(&self.white));
        tag("Black", some_or_unknown(&self.black));
        tag("Result", self.result.annotation());
        if self.result.game_has_ended() {
            tag("Termination", &self.result.ending_reason());
            tag("GameEnding", &self.result.ending_reason());
        }
        if let Some(time_control) = &self.time_control {
            tag("TimeControl", time_control);
        }
        if let Some(seconds) = self.time_left_white {
            tag("TimeLeftWhite", &format!("{seconds:.2}"));
        }
        if let Some(seconds) = self.time_left_black {
            tag("TimeLeftBlack", &format!("{seconds:.2}"));
        }
        if let Some(fen) = &self.starting_fen {
            tag("SetUp", "1");
            tag("FEN", fen);
        }
        out.push('\n');

        let mut line = String::new();
        let mut tokens: Vec<String> = Vec::new();
        let mut move_number = self.first_move_number;
        let mut to_move = self.first_to_move;

        for (index, played) in self.moves.iter().enumerate() {
            match to_move {
                Color::White => tokens.push(format!("{move_number}. {}", played.san)),
                Color::Black => {
                    if index == 0 {
                        tokens.push(format!("{move_number}... {}", played.san));
                    } else {
                        tokens.push(played.san.clone());
                    }
                    move_number += 1;
                }
            }
            if let Some(comment) = &played.comment {
                tokens.push(format!("{{ {comment} }}"));
            }
            to_move = to_move.opposite();
        }
        tokens.push(self.result.annotation().to_owned());

        for token in tokens {
            if line.is_empty() {
                line = token;
            } else if line.len() + 1 + token.len() <= 80 {
                line.push(' ');
                line.push_str(&token);
            } else {
                out.push_str(&line);
                out.push('\n');
                line = token;
            }
        }
        out.push_str(&line);
        out.push_str("\n\n");

        out
    }

    /// Append this record to a shared file. A process-wide mutex keeps
    /// whole records contiguous when concurrent games finish together.
    pub fn append_to_file(&self, path: &Path) -> std::io::Result<()> {
        static WRITE_LOCK: Mutex<()> = Mutex::new(());
        let _guard = WRITE_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(self.render().as_bytes())
    }
}

fn some_or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "?"
    } else {
        value
    }
}

/// Why a PGN file failed validation. Every variant carries the file and
/// line it was detected on.
#[derive(Error, Debug)]
#[error("{file}:{line}: {kind}")]
pub struct PgnError {
    pub file: String,
    pub line: usize,
    pub kind: PgnErrorKind,
}

#[derive(Error, Debug)]
pub enum PgnErrorKind {
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed tag line")]
    BadTag,
    #[error("unbalanced {0:?}")]
    Unbalanced(char),
    #[error("{0}")]
    Move(#[from] SanError),
    #[error("bad FEN tag: {0}")]
    BadFen(#[from] FenError),
    #[error("{san:?}: capture marker disagrees with the move")]
    CaptureMarker { san: String },
    #[error("{san:?}: check marker disagrees with the position")]
    CheckMarker { san: String },
    #[error("{san:?}: checkmate marker disagrees with the position")]
    MateMarker { san: String },
    #[error("game ended {actual:?} but the Result tag says {tag:?}")]
    ResultMismatch { tag: String, actual: String },
    #[error("game ended {actual:?} but the Termination tag says {tag:?}")]
    TerminationMismatch { tag: String, actual: String },
    #[error("movetext continues after the game ended")]
    MoveAfterGameEnd,
    #[error("file ends in the middle of a game")]
    UnexpectedEndOfFile,
}

/// Validate every game in a PGN file by replaying it.
///
/// Checks per move: legality, the `x`/`+`/`#`/`=P`/castle annotations.
/// Checks per game: the `Result` tag against the board's own result and
/// the `Termination` tag (when present) against the rule that fired.
/// Comments are skipped after balance checking; variations are replayed
/// from the position before the preceding move and checked for legality.
pub fn confirm_game_record(path: &Path) -> Result<(), PgnError> {
    let file_name = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|e| PgnError {
        file: file_name.clone(),
        line: 0,
        kind: e.into(),
    })?;

    Validator {
        file: file_name,
        chars: text.chars().collect(),
        pos: 0,
        line: 1,
    }
    .run()
}

struct Validator {
    file: String,
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

#[derive(Debug)]
enum Token {
    TagLine(String, String),
    VariationOpen,
    VariationClose,
    GameResult(String),
    San(String),
}

impl Validator {
    fn run(mut self) -> Result<(), PgnError> {
        loop {
            self.skip_filler()?;
            if self.peek().is_none() {
                return Ok(());
            }
            self.validate_one_game()?;
        }
    }

    fn error(&self, kind: PgnErrorKind) -> PgnError {
        PgnError {
            file: self.file.clone(),
            line: self.line,
            kind,
        }
    }

    fn validate_one_game(&mut self) -> Result<(), PgnError> {
        let mut result_tag = None;
        let mut termination_tag = None;
        let mut fen_tag = None;

        // Tag section.
        loop {
            self.skip_filler()?;
            match self.peek() {
                Some('[') => {
                    let Some(Token::TagLine(name, value)) = self.next_token()? else {
                        return Err(self.error(PgnErrorKind::BadTag));
                    };
                    match name.as_str() {
                        "Result" => result_tag = Some(value),
                        "Termination" => termination_tag = Some(value),
                        "FEN" => fen_tag = Some(value),
                        _ => {}
                    }
                }
                Some(_) => break,
                None => return Err(self.error(PgnErrorKind::UnexpectedEndOfFile)),
            }
        }

        let mut board = match &fen_tag {
            Some(fen) => Board::from_fen(fen).map_err(|e| self.error(e.into()))?,
            None => Board::starting_position(),
        };
        let mut game_result = GameResult::Ongoing;

        // Movetext.
        loop {
            let token = self
                .next_token()?
                .ok_or_else(|| self.error(PgnErrorKind::UnexpectedEndOfFile))?;
            match token {
                Token::TagLine(..) => return Err(self.error(PgnErrorKind::BadTag)),
                Token::VariationOpen => self.validate_variation(&board)?,
                Token::VariationClose => {
                    return Err(self.error(PgnErrorKind::Unbalanced(')')))
                }
                Token::San(san) => {
                    if game_result.game_has_ended() {
                        return Err(self.error(PgnErrorKind::MoveAfterGameEnd));
                    }
                    game_result = self.validate_move(&mut board, &san)?;
                }
                Token::GameResult(token) => {
                    self.check_game_end(&board, &game_result, result_tag, termination_tag, &token)?;
                    return Ok(());
                }
            }
        }
    }

    fn validate_move(&mut self, board: &mut Board, san: &str) -> Result<GameResult, PgnError> {
        let parts = crate::board::SanParts::parse(san).map_err(|e| self.error(e.into()))?;
        let m = board
            .match_san_parts(&parts, san)
            .map_err(|e| self.error(e.into()))?;

        let is_capture = board.piece_on(m.to_square()).is_some() || m.is_en_passant();
        if parts.capture != is_capture {
            return Err(self.error(PgnErrorKind::CaptureMarker { san: san.to_owned() }));
        }

        let result = board.play_move(m);
        let is_mate = result.winner().is_some();
        let gives_check = board.in_check(board.to_move());

        if parts.checkmate != is_mate {
            return Err(self.error(PgnErrorKind::MateMarker { san: san.to_owned() }));
        }
        if parts.check != (gives_check && !is_mate) {
            return Err(self.error(PgnErrorKind::CheckMarker { san: san.to_owned() }));
        }

        Ok(result)
    }

    /// Replay a recursive annotation variation. It branches from the
    /// position *before* the move preceding the `(`, and every move in it
    /// must be legal.
    fn validate_variation(&mut self, board: &Board) -> Result<(), PgnError> {
        let mut branch = board.clone();
        branch.pop_move();

        loop {
            let token = self
                .next_token()?
                .ok_or_else(|| self.error(PgnErrorKind::Unbalanced('(')))?;
            match token {
                Token::TagLine(..) => return Err(self.error(PgnErrorKind::BadTag)),
                Token::VariationOpen => self.validate_variation(&branch)?,
                Token::VariationClose => return Ok(()),
                Token::GameResult(_) => {}
                Token::San(san) => {
                    let m = branch.parse_san(&san).map_err(|e| self.error(e.into()))?;
                    branch.play_move(m);
                }
            }
        }
    }

    fn check_game_end(
        &self,
        board: &Board,
        game_result: &GameResult,
        result_tag: Option<String>,
        termination_tag: Option<String>,
        result_token: &str,
    ) -> Result<(), PgnError> {
        // Recompute from the final position so truncated games (that end
        // mid-battle with a time forfeit or `*`) stay distinguishable.
        let actual = if game_result.game_has_ended() {
            game_result.clone()
        } else {
            board.game_state()
        };

        let tag = result_tag.unwrap_or_else(|| result_token.to_owned());
        if tag != result_token {
            return Err(self.error(PgnErrorKind::ResultMismatch {
                tag,
                actual: result_token.to_owned(),
            }));
        }

        if actual.game_has_ended() {
            if tag != actual.annotation() {
                return Err(self.error(PgnErrorKind::ResultMismatch {
                    tag,
                    actual: actual.ending_reason(),
                }));
            }
            if let Some(termination) = termination_tag {
                if !termination.eq_ignore_ascii_case(&actual.ending_reason()) {
                    return Err(self.error(PgnErrorKind::TerminationMismatch {
                        tag: termination,
                        actual: actual.ending_reason(),
                    }));
                }
            }
        } else {
            // The moves alone do not end the game; a decisive result is
            // only believable with a termination explaining it (e.g. a
            // time forfeit).
            if tag != "*" && termination_tag.is_none() {
                return Err(self.error(PgnErrorKind::ResultMismatch {
                    tag,
                    actual: "game still in progress".to_owned(),
                }));
            }
        }

        Ok(())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    /// Skip whitespace, `{ }` comments, `;` comments, move numbers, and
    /// NAGs. Brace comments are balance-checked here.
    fn skip_filler(&mut self) -> Result<(), PgnError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('{') => {
                    let open_line = self.line;
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('}') => break,
                            Some('{') => {
                                return Err(PgnError {
                                    file: self.file.clone(),
                                    line: self.line,
                                    kind: PgnErrorKind::Unbalanced('{'),
                                })
                            }
                            Some(_) => {}
                            None => {
                                return Err(PgnError {
                                    file: self.file.clone(),
                                    line: open_line,
                                    kind: PgnErrorKind::Unbalanced('{'),
                                })
                            }
                        }
                    }
                }
                Some('}') => return Err(self.error(PgnErrorKind::Unbalanced('}'))),
                Some(';') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('$') => {
                    self.bump();
                    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.bump();
                    }
                }
                Some(c) if c.is_ascii_digit() => {
                    // A move number ("12." / "12...") or a result token;
                    // only consume numbers followed by dots.
                    let start = self.pos;
                    let start_line = self.line;
                    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.bump();
                    }
                    if self.peek() == Some('.') {
                        while self.peek() == Some('.') {
                            self.bump();
                        }
                    } else {
                        self.pos = start;
                        self.line = start_line;
                        return Ok(());
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, PgnError> {
        self.skip_filler()?;

        let Some(c) = self.peek() else {
            return Ok(None);
        };

        match c {
            '[' => self.tag_line().map(Some),
            '(' => {
                self.bump();
                Ok(Some(Token::VariationOpen))
            }
            ')' => {
                self.bump();
                Ok(Some(Token::VariationClose))
            }
            _ => {
                let mut word = String::new();
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '{' | '}' | ';' | '[') {
                        break;
                    }
                    word.push(c);
                    self.bump();
                }
                if word.is_empty() {
                    return Err(self.error(PgnErrorKind::BadTag));
                }
                if matches!(word.as_str(), "1-0" | "0-1" | "1/2-1/2" | "*") {
                    Ok(Some(Token::GameResult(word)))
                } else {
                    Ok(Some(Token::San(word)))
                }
            }
        }
    }

    fn tag_line(&mut self) -> Result<Token, PgnError> {
        self.bump(); // '['

        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                break;
            }
            name.push(c);
            self.bump();
        }

        while self.peek().is_some_and(|c| c.is_whitespace() && c != '\n') {
            self.bump();
        }

        if self.peek() != Some('"') {
            return Err(self.error(PgnErrorKind::BadTag));
        }
        self.bump();

        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => {
                    if let Some(escaped) = self.bump() {
                        value.push(escaped);
                    }
                }
                Some(c) => value.push(c),
                None => return Err(self.error(PgnErrorKind::BadTag)),
            }
        }

        if self.peek() != Some(']') {
            return Err(self.error(PgnErrorKind::BadTag));
        }
        self.bump();

        Ok(Token::TagLine(name, value))
    }
}
