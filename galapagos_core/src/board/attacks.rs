use super::{Color, Direction, DirectionSet, Piece, PieceType, Square};

/// Per-color attack maps over the 64 squares.
///
/// `attacks_on(color, square)` is the set of directions along which a piece
/// of `color` attacks `square`, where a sliding attack stops at (and
/// includes) the first occupied square on its ray. Along any one direction
/// at most one piece of a given color can attack a given square -- the
/// nearest piece on the line blocks everything behind it -- which is why a
/// direction bit needs no attacker count.
///
/// The maps are maintained incrementally: every piece placement or removal
/// updates the moved piece's outgoing attacks and re-cuts or re-extends the
/// sliding rays that pass through the affected square. Removal is the exact
/// inverse of placement, so unmaking a move restores the maps by running
/// the same primitives backwards.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct AttackMaps {
    maps: [[DirectionSet; 64]; 2],
}

impl AttackMaps {
    pub fn new() -> Self {
        Self {
            maps: [[DirectionSet::EMPTY; 64]; 2],
        }
    }

    /// Derive the maps from scratch. Used at board construction; the
    /// incremental updates keep them exact from then on.
    pub fn rebuild(&mut self, squares: &[Option<Piece>; 64]) {
        self.maps = [[DirectionSet::EMPTY; 64]; 2];
        for square in Square::all() {
            if let Some(piece) = squares[square.index()] {
                self.add_outgoing(squares, piece, square);
            }
        }
    }

    /// The directions along which `color` attacks `square`.
    pub fn attacks_on(&self, color: Color, square: Square) -> DirectionSet {
        self.maps[color.index()][square.index()]
    }

    pub fn is_attacked(&self, square: Square, by: Color) -> bool {
        !self.attacks_on(by, square).is_empty()
    }

    /// Record the attacks radiating from a piece just placed on `from`.
    /// `squares` must already contain the piece.
    pub fn add_outgoing(&mut self, squares: &[Option<Piece>; 64], piece: Piece, from: Square) {
        self.update_outgoing(squares, piece, from, true);
    }

    /// Erase the attacks radiating from a piece just removed from `from`.
    /// `squares` must no longer contain the piece.
    pub fn remove_outgoing(&mut self, squares: &[Option<Piece>; 64], piece: Piece, from: Square) {
        self.update_outgoing(squares, piece, from, false);
    }

    /// A piece has been placed on `square`: sliding rays that used to pass
    /// through it now stop there, so their downstream bits are cleared.
    pub fn cut_rays_through(&mut self, squares: &[Option<Piece>; 64], square: Square) {
        for color in Color::ALL {
            let arriving = self.attacks_on(color, square).sliding_only();
            for direction in arriving.directions() {
                self.walk_downstream(squares, color, square, direction, |set| {
                    set.remove(direction)
                });
            }
        }
    }

    /// A piece has been removed from `square`: sliding rays that used to
    /// stop there now pass through, so their downstream bits are set.
    pub fn extend_rays_through(&mut self, squares: &[Option<Piece>; 64], square: Square) {
        for color in Color::ALL {
            let arriving = self.attacks_on(color, square).sliding_only();
            for direction in arriving.directions() {
                // Only sliders keep going; a king or pawn attack on this
                // square ends here regardless of occupancy.
                if self.slider_attacks_along(squares, color, square, direction) {
                    self.walk_downstream(squares, color, square, direction, |set| {
                        set.insert(direction)
                    });
                }
            }
        }
    }

    fn update_outgoing(
        &mut self,
        squares: &[Option<Piece>; 64],
        piece: Piece,
        from: Square,
        add: bool,
    ) {
        let color = piece.color();
        match piece.piece_type() {
            PieceType::Pawn => {
                for direction in pawn_attack_directions(color) {
                    self.mark_step(color, from, direction, add);
                }
            }
            PieceType::King => {
                for direction in Direction::sliding() {
                    self.mark_step(color, from, direction, add);
                }
            }
            PieceType::Knight => {
                for direction in Direction::knight() {
                    self.mark_step(color, from, direction, add);
                }
            }
            PieceType::Bishop => self.mark_slides(squares, color, from, Direction::diagonal(), add),
            PieceType::Rook => self.mark_slides(squares, color, from, Direction::orthogonal(), add),
            PieceType::Queen => self.mark_slides(squares, color, from, Direction::sliding(), add),
        }
    }

    fn mark_step(&mut self, color: Color, from: Square, direction: Direction, add: bool) {
        if let Some(to) = from.offset_by(direction.file_delta(), direction.rank_delta()) {
            let set = &mut self.maps[color.index()][to.index()];
            if add {
                set.insert(direction);
            } else {
                set.remove(direction);
            }
        }
    }

    fn mark_slides(
        &mut self,
        squares: &[Option<Piece>; 64],
        color: Color,
        from: Square,
        directions: impl Iterator<Item = Direction>,
        add: bool,
    ) {
        for direction in directions {
            self.walk_downstream(squares, color, from, direction, |set| {
                if add {
                    set.insert(direction);
                } else {
                    set.remove(direction);
                }
            });
        }
    }

    /// Apply `f` to every square strictly beyond `from` along `direction`,
    /// stopping at (and including) the first occupied square.
    fn walk_downstream(
        &mut self,
        squares: &[Option<Piece>; 64],
        color: Color,
        from: Square,
        direction: Direction,
        mut f: impl FnMut(&mut DirectionSet),
    ) {
        let mut square = from;
        while let Some(next) = square.offset_by(direction.file_delta(), direction.rank_delta()) {
            f(&mut self.maps[color.index()][next.index()]);
            if squares[next.index()].is_some() {
                break;
            }
            square = next;
        }
    }

    /// Whether the piece attacking `square` along `direction` is a slider
    /// (so its ray continues when `square` empties). The attacker sits
    /// upstream: the first piece found walking against the direction.
    fn slider_attacks_along(
        &self,
        squares: &[Option<Piece>; 64],
        color: Color,
        square: Square,
        direction: Direction,
    ) -> bool {
        let back = direction.opposite();
        let mut current = square;
        while let Some(previous) = current.offset_by(back.file_delta(), back.rank_delta()) {
            if let Some(piece) = squares[previous.index()] {
                return piece.color() == color
                    && piece.is_slider()
                    && match direction.is_diagonal() {
                        true => matches!(
                            piece.piece_type(),
                            PieceType::Bishop | PieceType::Queen
                        ),
                        false => matches!(piece.piece_type(), PieceType::Rook | PieceType::Queen),
                    };
            }
            current = previous;
        }
        false
    }
}

pub(crate) fn pawn_attack_directions(color: Color) -> [Direction; 2] {
    match color {
        Color::White => [Direction::NORTHEAST, Direction::NORTHWEST],
        Color::Black => [Direction::SOUTHEAST, Direction::SOUTHWEST],
    }
}
