//! The board representation: position state, incremental attack maps, legal
//! move generation, move application, and draw tracking.

mod attacks;
mod castling;
mod direction;
mod fen;
mod move_gen;
mod move_repr;
mod piece;
mod san;
mod square;
mod zobrist;

pub use castling::Castling;
pub use direction::{Direction, DirectionSet};
pub use fen::FenError;
pub use move_repr::{rays_from, CastleSide, Move, MoveKind, MoveRef, MoveVec, Ray};
pub use piece::{Color, Piece, PieceType};
pub use san::{SanError, SanParts};
pub use square::{ParseSquareError, Square};
pub use zobrist::ZobristHash;

use arrayvec::ArrayVec;

use crate::game_result::GameResult;
use attacks::AttackMaps;

pub const STARTING_POSITION_FEN: &str =
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// The repetition buffer holds the hash at the last irreversible move plus
/// one entry per reversible ply since, so 100 reversible plies (the
/// fifty-move limit) fill it to 101 entries.
const REPETITION_CAPACITY: usize = 101;

/// Everything needed to reverse one [`Board::push_move`].
#[derive(Debug, Clone, PartialEq)]
struct UnmakeData {
    the_move: MoveRef,
    captured: Option<(Piece, Square)>,
    castling: Castling,
    castled_on_ply: [Option<(u32, CastleSide)>; 2],
    en_passant: Option<Square>,
    en_passant_usable: bool,
    hash: ZobristHash,
    halfmove_offset: u32,
    cleared_repetition: Option<Vec<ZobristHash>>,
    dropped_front: Option<ZobristHash>,
    last_move: Option<MoveRef>,
    last_move_was_capture: bool,
}

/// The full mutable state of a game in progress.
///
/// [`Board::play_move`] is the only way the position changes (searching uses
/// the [`Board::push_move`]/[`Board::pop_move`] pair, which is the same
/// mutation plus its exact inverse). Between moves the attack maps, the
/// denormalized king squares, the Zobrist hash, and the repetition buffer
/// are always consistent with the piece placement.
#[derive(Clone, PartialEq)]
pub struct Board {
    squares: [Option<Piece>; 64],
    to_move: Color,
    castling: Castling,
    /// The ply index (counted from this board's construction) on which
    /// each color castled, and toward which side, if it has.
    castled_on_ply: [Option<(u32, CastleSide)>; 2],
    /// The raw en-passant target square behind the last double pawn push.
    en_passant: Option<Square>,
    /// True while at least one pseudo-legal en-passant capture of the
    /// target exists; only then does the target enter the hash, FEN, and
    /// repetition keys.
    en_passant_usable: bool,
    king_squares: [Square; 2],
    attacks: AttackMaps,
    /// Position hashes since the last pawn move or capture, oldest first.
    /// The final entry is always the current hash.
    repetition: Vec<ZobristHash>,
    /// Halfmove clock carried in from the originating FEN; zeroed whenever
    /// the repetition buffer is cleared.
    halfmove_offset: u32,
    fullmove_origin: u32,
    starting_fen: String,
    hash: ZobristHash,
    ply: u32,
    last_move: Option<MoveRef>,
    last_move_was_capture: bool,
    history: Vec<UnmakeData>,
}

impl Board {
    /// Build a board from a piece placement and the FEN-style state fields.
    ///
    /// Rejects positions without exactly one king per color, and positions
    /// where the player who just moved is still in check.
    pub fn new(
        pieces: &[Option<Piece>; 64],
        to_move: Color,
        castling: Castling,
        en_passant: Option<Square>,
        halfmove_clock: u32,
        fullmoves: u32,
    ) -> Result<Self, FenError> {
        let mut king_squares = [None; 2];
        for square in Square::all() {
            if let Some(piece) = pieces[square.index()] {
                if piece.is_king() {
                    let slot = &mut king_squares[piece.color().index()];
                    if slot.is_some() {
                        return Err(FenError::WrongKingCount(piece.color()));
                    }
                    *slot = Some(square);
                }
            }
        }
        let king_squares = [
            king_squares[0].ok_or(FenError::WrongKingCount(Color::White))?,
            king_squares[1].ok_or(FenError::WrongKingCount(Color::Black))?,
        ];

        let mut attacks = AttackMaps::new();
        attacks.rebuild(pieces);

        let opponent = to_move.opposite();
        if attacks.is_attacked(king_squares[opponent.index()], to_move) {
            return Err(FenError::OpponentInCheck);
        }

        let mut board = Self {
            squares: *pieces,
            to_move,
            castling,
            castled_on_ply: [None; 2],
            en_passant,
            en_passant_usable: false,
            king_squares,
            attacks,
            repetition: Vec::with_capacity(REPETITION_CAPACITY),
            halfmove_offset: halfmove_clock,
            fullmove_origin: fullmoves,
            starting_fen: String::new(),
            hash: ZobristHash::default(),
            ply: 0,
            last_move: None,
            last_move_was_capture: false,
            history: Vec::new(),
        };

        board.en_passant_usable = board.en_passant_capture_exists();

        let mut hash = ZobristHash::default();
        for square in Square::all() {
            if let Some(piece) = board.squares[square.index()] {
                hash.toggle_piece(piece, square);
            }
        }
        hash ^= ZobristHash::side_to_move(board.to_move);
        hash ^= ZobristHash::castling(board.castling);
        if board.en_passant_usable {
            hash ^= ZobristHash::en_passant_file(board.en_passant);
        }
        board.hash = hash;
        board.repetition.push(hash);

        board.starting_fen = fen::board_to_fen(&board);

        Ok(board)
    }

    /// The standard starting position.
    pub fn starting_position() -> Self {
        Self::from_fen(STARTING_POSITION_FEN).expect("the starting position FEN is valid")
    }

    /// Parse a six-field FEN record.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        fen::parse_fen(fen)
    }

    /// The current position as a FEN record.
    pub fn fen(&self) -> String {
        fen::board_to_fen(self)
    }

    /// The FEN this board was constructed from.
    pub fn starting_fen(&self) -> &str {
        &self.starting_fen
    }

    pub fn started_from_standard_position(&self) -> bool {
        self.starting_fen == STARTING_POSITION_FEN
    }

    pub fn to_move(&self) -> Color {
        self.to_move
    }

    pub fn piece_on(&self, square: Square) -> Option<Piece> {
        self.squares[square.index()]
    }

    pub fn king_square(&self, color: Color) -> Square {
        self.king_squares[color.index()]
    }

    pub fn castling(&self) -> Castling {
        self.castling
    }

    /// The ply index on which `color` castled, if it has since this board
    /// was constructed.
    pub fn castled_on_ply(&self, color: Color) -> Option<(u32, CastleSide)> {
        self.castled_on_ply[color.index()]
    }

    /// The en-passant target square, if one exists *and* is capturable.
    pub fn en_passant_target(&self) -> Option<Square> {
        if self.en_passant_usable {
            self.en_passant
        } else {
            None
        }
    }

    pub(crate) fn raw_en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    pub fn hash(&self) -> ZobristHash {
        self.hash
    }

    /// Plies played since this board was constructed.
    pub fn ply_count(&self) -> u32 {
        self.ply
    }

    /// The current full-move number (as it would appear in a FEN record).
    pub fn fullmove_number(&self) -> u32 {
        let plies = match self.to_move {
            // An odd total ply count means white's move completed the pair.
            Color::White => self.ply + 1,
            Color::Black => self.ply,
        };
        self.fullmove_origin + plies / 2
    }

    /// Plies since the last pawn move or capture.
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_offset + self.repetition.len().saturating_sub(1) as u32
    }

    pub fn last_move(&self) -> Option<MoveRef> {
        self.last_move
    }

    pub fn last_move_was_capture(&self) -> bool {
        self.last_move_was_capture
    }

    /// Whether any legal move of the side to move is a capture.
    pub fn capture_possible(&self) -> bool {
        self.legal_moves()
            .iter()
            .any(|m| self.piece_on(m.to_square()).is_some() || m.is_en_passant())
    }

    /// The directions along which `color` attacks `square`.
    pub fn attacks_on(&self, color: Color, square: Square) -> DirectionSet {
        self.attacks.attacks_on(color, square)
    }

    pub fn is_attacked(&self, square: Square, by: Color) -> bool {
        self.attacks.is_attacked(square, by)
    }

    /// True when no piece of `color`'s opponent attacks `square`.
    pub fn safe_for_king(&self, square: Square, color: Color) -> bool {
        !self.is_attacked(square, color.opposite())
    }

    pub fn in_check(&self, color: Color) -> bool {
        self.is_attacked(self.king_square(color), color.opposite())
    }

    /// All legal moves for the side to move.
    pub fn legal_moves(&self) -> MoveVec {
        move_gen::legal_moves(self)
    }

    /// Find the legal move matching a coordinate triple, if any.
    pub fn find_move(
        &self,
        from: Square,
        to: Square,
        promotion: Option<PieceType>,
    ) -> Option<MoveRef> {
        self.legal_moves()
            .into_iter()
            .find(|m| m.from_square() == from && m.to_square() == to && m.promotion() == promotion)
    }

    /// Interpret coordinate notation (`e2e4`, `e7e8q`) against the current
    /// legal moves.
    pub fn parse_coordinate_move(&self, text: &str) -> Result<MoveRef, SanError> {
        let text = text.trim();
        if !text.is_ascii() || text.len() < 4 || text.len() > 5 {
            return Err(SanError::Unparseable(text.to_owned()));
        }
        let from: Square = text[0..2]
            .parse()
            .map_err(|_| SanError::Unparseable(text.to_owned()))?;
        let to: Square = text[2..4]
            .parse()
            .map_err(|_| SanError::Unparseable(text.to_owned()))?;
        let promotion = match text[4..].chars().next() {
            None => None,
            Some(c) => Some(
                PieceType::from_uppercase_char(c.to_ascii_uppercase())
                    .ok_or_else(|| SanError::Unparseable(text.to_owned()))?,
            ),
        };
        self.find_move(from, to, promotion)
            .ok_or_else(|| SanError::IllegalMove(text.to_owned()))
    }

    /// Play a move and report the state of the game afterwards.
    ///
    /// The move must come from this board's legal move list.
    pub fn play_move(&mut self, m: MoveRef) -> GameResult {
        self.push_move(m);
        let legal = self.legal_moves();
        self.result_given_moves(&legal)
    }

    /// Play a move without determining the game result. Used by the search,
    /// which generates the next ply's legal moves itself.
    pub fn push_move(&mut self, m: MoveRef) {
        let unmake = self.make_move(m);
        self.history.push(unmake);
    }

    /// Undo the most recent [`Board::push_move`]/[`Board::play_move`].
    pub fn pop_move(&mut self) -> Option<MoveRef> {
        let unmake = self.history.pop()?;
        self.unmake_move(&unmake);
        Some(unmake.the_move)
    }

    /// The state of the game given the side to move's legal moves (already
    /// generated by the caller).
    pub fn result_given_moves(&self, legal: &MoveVec) -> GameResult {
        if legal.is_empty() {
            if self.in_check(self.to_move) {
                GameResult::Checkmate(self.to_move.opposite())
            } else {
                GameResult::Stalemate
            }
        } else if self.repetition_count() >= 3 {
            GameResult::Threefold
        } else if self.halfmove_clock() >= 100 {
            GameResult::FiftyMove
        } else if self.insufficient_material() {
            GameResult::InsufficientMaterial
        } else {
            GameResult::Ongoing
        }
    }

    /// The state of the game, generating legal moves to decide it.
    pub fn game_state(&self) -> GameResult {
        self.result_given_moves(&self.legal_moves())
    }

    /// How many times the current position has occurred since the last
    /// irreversible move (including the current occurrence).
    pub fn repetition_count(&self) -> usize {
        self.repetition.iter().filter(|&&h| h == self.hash).count()
    }

    /// A marker for [`Board::repetition_count_since`]: the current length
    /// of the repetition buffer.
    pub fn repetition_marker(&self) -> usize {
        self.repetition.len()
    }

    /// How many times the current position has occurred from a marked point
    /// on (the search uses the marker of its root position, so repeats that
    /// predate the root do not count).
    pub fn repetition_count_since(&self, marker: usize) -> usize {
        let start = marker.saturating_sub(1).min(self.repetition.len());
        self.repetition[start..]
            .iter()
            .filter(|&&h| h == self.hash)
            .count()
    }

    /// Insufficient mating material for *both* sides: K vs K, a lone minor
    /// piece, or only same-colored bishops.
    pub fn insufficient_material(&self) -> bool {
        let mut knights = 0u32;
        let mut light_bishops = 0u32;
        let mut dark_bishops = 0u32;

        for square in Square::all() {
            let Some(piece) = self.squares[square.index()] else {
                continue;
            };
            match piece.piece_type() {
                PieceType::Pawn | PieceType::Rook | PieceType::Queen => return false,
                PieceType::Knight => knights += 1,
                PieceType::Bishop => {
                    if (square.rank() + square.file()) % 2 == 0 {
                        dark_bishops += 1;
                    } else {
                        light_bishops += 1;
                    }
                }
                PieceType::King => {}
            }
        }

        let minors = knights + light_bishops + dark_bishops;
        minors <= 1 || (knights == 0 && (light_bishops == 0 || dark_bishops == 0))
    }

    /// Whether `color` retains any material combination that could deliver
    /// checkmate (with cooperation): pawn, rook, or queen; knight plus
    /// bishop; two knights; or bishops on both square colors.
    pub fn enough_material_to_checkmate(&self, color: Color) -> bool {
        let mut knights = 0u32;
        let mut light_bishops = 0u32;
        let mut dark_bishops = 0u32;

        for square in Square::all() {
            let Some(piece) = self.squares[square.index()] else {
                continue;
            };
            if piece.color() != color {
                continue;
            }
            match piece.piece_type() {
                PieceType::Pawn | PieceType::Rook | PieceType::Queen => return true,
                PieceType::Knight => knights += 1,
                PieceType::Bishop => {
                    if (square.rank() + square.file()) % 2 == 0 {
                        dark_bishops += 1;
                    } else {
                        light_bishops += 1;
                    }
                }
                PieceType::King => {}
            }
        }

        (knights >= 1 && light_bishops + dark_bishops >= 1)
            || knights >= 2
            || (light_bishops >= 1 && dark_bishops >= 1)
    }

    /// How far the game has progressed, as the fraction of non-king
    /// material that has left the board: 0 at the standard starting
    /// position, approaching 1 as the boards empty.
    pub fn game_progress(&self) -> f64 {
        // Standard weights; one side starts with 8P + 2N + 2B + 2R + Q = 39.
        const FULL_MATERIAL: f64 = 78.0;

        let mut remaining = 0.0;
        for square in Square::all() {
            if let Some(piece) = self.squares[square.index()] {
                remaining += match piece.piece_type() {
                    PieceType::Pawn => 1.0,
                    PieceType::Knight | PieceType::Bishop => 3.0,
                    PieceType::Rook => 5.0,
                    PieceType::Queen => 9.0,
                    PieceType::King => 0.0,
                };
            }
        }

        (1.0 - remaining / FULL_MATERIAL).clamp(0.0, 1.0)
    }

    /// Squares (and the directions from the king toward them) of every
    /// enemy piece currently checking `color`'s king.
    pub(crate) fn checkers(&self, color: Color) -> ArrayVec<(Square, Direction), 16> {
        let king = self.king_square(color);
        let them = color.opposite();
        let mut out = ArrayVec::new();

        for arrival in self.attacks.attacks_on(them, king).directions() {
            let toward = arrival.opposite();
            let mut square = king;
            loop {
                let Some(next) = square.offset_by(toward.file_delta(), toward.rank_delta()) else {
                    break;
                };
                if let Some(piece) = self.squares[next.index()] {
                    debug_assert_eq!(piece.color(), them);
                    out.push((next, toward));
                    break;
                }
                if toward.is_knight() {
                    break;
                }
                square = next;
            }
        }

        out
    }

    fn en_passant_capture_exists(&self) -> bool {
        let Some(target) = self.en_passant else {
            return false;
        };
        // The capturing pawn stands beside the double-pushed pawn, one rank
        // beyond the target from the capturer's point of view.
        let capturer = Piece::pawn(self.to_move);
        [-1, 1].into_iter().any(|file_delta| {
            target
                .offset_by(file_delta, -self.to_move.pawn_direction())
                .and_then(|sq| self.piece_on(sq))
                == Some(capturer)
        })
    }

    /// Remove the piece on `square`, updating attack maps and hash.
    fn lift_piece(&mut self, square: Square) -> Piece {
        let piece = self.squares[square.index()]
            .take()
            .expect("lift_piece from an empty square");
        self.attacks.remove_outgoing(&self.squares, piece, square);
        self.attacks.extend_rays_through(&self.squares, square);
        self.hash.toggle_piece(piece, square);
        piece
    }

    /// Place a piece on an empty `square`, updating attack maps and hash.
    fn put_piece(&mut self, piece: Piece, square: Square) {
        debug_assert!(self.squares[square.index()].is_none());
        self.attacks.cut_rays_through(&self.squares, square);
        self.squares[square.index()] = Some(piece);
        self.attacks.add_outgoing(&self.squares, piece, square);
        self.hash.toggle_piece(piece, square);
        if piece.is_king() {
            self.king_squares[piece.color().index()] = square;
        }
    }

    fn make_move(&mut self, m: MoveRef) -> UnmakeData {
        let mover = m.piece();
        let us = mover.color();
        debug_assert_eq!(us, self.to_move);

        let mut unmake = UnmakeData {
            the_move: m,
            captured: None,
            castling: self.castling,
            castled_on_ply: self.castled_on_ply,
            en_passant: self.en_passant,
            en_passant_usable: self.en_passant_usable,
            hash: self.hash,
            halfmove_offset: self.halfmove_offset,
            cleared_repetition: None,
            dropped_front: None,
            last_move: self.last_move,
            last_move_was_capture: self.last_move_was_capture,
        };

        let destination_occupied = self.piece_on(m.to_square()).is_some();
        let is_capture = destination_occupied || m.is_en_passant();

        // The old en-passant target leaves the hash before anything else
        // changes; a new one may be committed below.
        if self.en_passant_usable {
            self.hash ^= ZobristHash::en_passant_file(self.en_passant);
        }

        self.last_move = Some(m);
        self.last_move_was_capture = is_capture;

        // Irreversible moves wipe the repetition buffer.
        if destination_occupied || m.is_pawn_move() {
            unmake.cleared_repetition = Some(std::mem::take(&mut self.repetition));
            self.halfmove_offset = 0;
        }

        // Relocate the pieces.
        if destination_occupied {
            let victim = self.lift_piece(m.to_square());
            unmake.captured = Some((victim, m.to_square()));
        }
        let lifted = self.lift_piece(m.from_square());
        debug_assert_eq!(lifted, mover);
        self.put_piece(mover, m.to_square());

        // Tag-specific side effects.
        self.en_passant = None;
        match m.kind() {
            MoveKind::PawnDoublePush => {
                self.en_passant = m.to_square().offset_by(0, -us.pawn_direction());
            }
            MoveKind::EnPassant => {
                let victim_square = m
                    .en_passant_victim_square()
                    .expect("en passant has a victim square");
                let victim = self.lift_piece(victim_square);
                unmake.captured = Some((victim, victim_square));
            }
            MoveKind::Promotion(target) | MoveKind::PromotionCapture(target) => {
                self.lift_piece(m.to_square());
                self.put_piece(Piece::new(us, target), m.to_square());
            }
            MoveKind::Castle(side) => {
                let rook = self.lift_piece(side.rook_from(us));
                debug_assert_eq!(rook, Piece::rook(us));
                self.put_piece(rook, side.rook_to(us));
                self.castled_on_ply[us.index()] = Some((self.ply, side));
            }
            _ => {}
        }

        // Castling revocation: a king move clears both of its flags; any
        // move touching a rook home square clears that corner's flag.
        let mut castling = self.castling;
        if mover.is_king() {
            castling -= Castling::for_color(us);
        }
        for (corner, flag) in [
            (Square::A1, Castling::WHITE_QUEENSIDE),
            (Square::H1, Castling::WHITE_KINGSIDE),
            (Square::A8, Castling::BLACK_QUEENSIDE),
            (Square::H8, Castling::BLACK_KINGSIDE),
        ] {
            if m.from_square() == corner || m.to_square() == corner {
                castling -= flag;
            }
        }
        if castling != self.castling {
            self.hash ^= ZobristHash::castling(self.castling);
            self.hash ^= ZobristHash::castling(castling);
            self.castling = castling;
        }

        // Flip the turn, commit the en-passant target if capturable, and
        // record the new position hash.
        self.to_move = us.opposite();
        self.hash ^= ZobristHash::side_to_move(Color::Black);
        self.ply += 1;

        self.en_passant_usable = self.en_passant_capture_exists();
        if self.en_passant_usable {
            self.hash ^= ZobristHash::en_passant_file(self.en_passant);
        }

        if self.repetition.len() == REPETITION_CAPACITY {
            unmake.dropped_front = Some(self.repetition.remove(0));
        }
        self.repetition.push(self.hash);

        unmake
    }

    fn unmake_move(&mut self, unmake: &UnmakeData) {
        let m = unmake.the_move;
        let mover = m.piece();
        let us = mover.color();

        // Undo the piece relocation (promotion put a different piece on the
        // destination; put the pawn back).
        self.lift_piece(m.to_square());
        self.put_piece(mover, m.from_square());

        if let MoveKind::Castle(side) = m.kind() {
            let rook = self.lift_piece(side.rook_to(us));
            self.put_piece(rook, side.rook_from(us));
        }

        if let Some((victim, square)) = unmake.captured {
            self.put_piece(victim, square);
        }

        self.to_move = us;
        self.castling = unmake.castling;
        self.castled_on_ply = unmake.castled_on_ply;
        self.en_passant = unmake.en_passant;
        self.en_passant_usable = unmake.en_passant_usable;
        self.halfmove_offset = unmake.halfmove_offset;
        self.last_move = unmake.last_move;
        self.last_move_was_capture = unmake.last_move_was_capture;
        self.ply -= 1;

        if let Some(old) = &unmake.cleared_repetition {
            self.repetition = old.clone();
        } else {
            self.repetition.pop();
            if let Some(front) = unmake.dropped_front {
                self.repetition.insert(0, front);
            }
        }

        // The piece toggles above already adjusted the hash; restoring the
        // recorded value folds back the castling/en-passant/turn terms too.
        self.hash = unmake.hash;

        debug_assert_eq!(self.repetition.last(), Some(&self.hash));
    }

    /// A fast, conservative guess at whether a move gives check: does the
    /// moved piece attack the enemy king from its destination? Discovered
    /// checks are not detected; this feeds move ordering, which is
    /// advisory.
    pub fn move_gives_check_hint(&self, m: MoveRef) -> bool {
        let us = m.piece().color();
        let them = us.opposite();
        let enemy_king = self.king_square(them);
        let to = m.to_square();
        let piece_after = m
            .promotion()
            .map(|t| Piece::new(us, t))
            .unwrap_or_else(|| m.piece());

        match piece_after.piece_type() {
            PieceType::Knight => Direction::knight().any(|d| {
                to.offset_by(d.file_delta(), d.rank_delta()) == Some(enemy_king)
            }),
            PieceType::Pawn => attacks::pawn_attack_directions(us)
                .into_iter()
                .any(|d| to.offset_by(d.file_delta(), d.rank_delta()) == Some(enemy_king)),
            PieceType::King => false,
            slider => {
                let Some(direction) = Direction::between(to, enemy_king) else {
                    return false;
                };
                let reaches = match slider {
                    PieceType::Queen => true,
                    PieceType::Rook => direction.is_orthogonal(),
                    PieceType::Bishop => direction.is_diagonal(),
                    _ => false,
                };
                if !reaches {
                    return false;
                }

                // The ray must be clear, treating the origin as vacated.
                let mut square = to;
                loop {
                    let Some(next) =
                        square.offset_by(direction.file_delta(), direction.rank_delta())
                    else {
                        return false;
                    };
                    if next == enemy_king {
                        return true;
                    }
                    if next != m.from_square() && self.piece_on(next).is_some() {
                        return false;
                    }
                    square = next;
                }
            }
        }
    }

    /// Recompute the hash from nothing, for consistency checks.
    pub fn recomputed_hash(&self) -> ZobristHash {
        let mut hash = ZobristHash::default();
        for square in Square::all() {
            if let Some(piece) = self.squares[square.index()] {
                hash.toggle_piece(piece, square);
            }
        }
        hash ^= ZobristHash::side_to_move(self.to_move);
        hash ^= ZobristHash::castling(self.castling);
        if self.en_passant_usable {
            hash ^= ZobristHash::en_passant_file(self.en_passant);
        }
        hash
    }

    /// Recompute the attack maps from nothing and compare with the
    /// incrementally maintained ones, for consistency checks.
    pub fn attack_maps_are_consistent(&self) -> bool {
        let mut fresh = AttackMaps::new();
        fresh.rebuild(&self.squares);
        fresh == self.attacks
    }
}

impl std::fmt::Display for Board {
    /// An ASCII diagram, white at the bottom.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for rank in (0..8).rev() {
            write!(f, "{} |", rank + 1)?;
            for file in 0..8 {
                let square = Square::new_unchecked(rank, file);
                match self.piece_on(square) {
                    Some(piece) => write!(f, " {}", piece.as_fen_char())?,
                    None => write!(f, " .")?,
                }
            }
            writeln!(f)?;
        }
        writeln!(f, "   ----------------")?;
        writeln!(f, "    a b c d e f g h")?;
        write!(f, "{} to move", self.to_move)
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Board({})", self.fen())
    }
}
