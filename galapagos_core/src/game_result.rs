use std::fmt::Display;

use crate::board::Color;

/// How (or whether) a game has ended.
///
/// Every way a game can end is an ordinary value returned from
/// [`Board::play_move`](crate::board::Board::play_move) or
/// [`Clock::punch`](crate::clock::Clock::punch); nothing here is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameResult {
    /// The game continues.
    Ongoing,
    /// The given player delivered checkmate.
    Checkmate(Color),
    Stalemate,
    /// One hundred plies without a pawn move or capture.
    FiftyMove,
    /// The same position occurred three times.
    Threefold,
    InsufficientMaterial,
    /// A player ran out of time; the given player wins.
    TimeForfeit(Color),
    /// A player ran out of time, but the opponent cannot mate: a draw.
    TimeExpiredInsufficientMaterial,
    /// An ending imposed from outside the rules (resignation, protocol
    /// shutdown, ...), described by the text.
    Other(String),
}

impl GameResult {
    pub fn game_has_ended(&self) -> bool {
        !matches!(self, GameResult::Ongoing)
    }

    /// The winning player, if there is one.
    pub fn winner(&self) -> Option<Color> {
        match self {
            GameResult::Checkmate(winner) | GameResult::TimeForfeit(winner) => Some(*winner),
            _ => None,
        }
    }

    /// Whether the ending came from the rules of chess (as opposed to
    /// [`GameResult::Other`] or an unfinished game).
    pub fn ended_by_rule(&self) -> bool {
        self.game_has_ended() && !matches!(self, GameResult::Other(_))
    }

    /// The PGN result token: `1-0`, `0-1`, `1/2-1/2`, or `*`.
    pub fn annotation(&self) -> &'static str {
        match self.winner() {
            Some(Color::White) => "1-0",
            Some(Color::Black) => "0-1",
            None if self.ended_by_rule() => "1/2-1/2",
            None => "*",
        }
    }

    /// A short human-readable reason, also used for the PGN `GameEnding`
    /// tag.
    pub fn ending_reason(&self) -> String {
        match self {
            GameResult::Ongoing => String::new(),
            GameResult::Checkmate(winner) => format!("{winner} mates"),
            GameResult::Stalemate => "Stalemate".to_owned(),
            GameResult::FiftyMove => "50-move limit".to_owned(),
            GameResult::Threefold => "Threefold repetition".to_owned(),
            GameResult::InsufficientMaterial => "Insufficient material".to_owned(),
            GameResult::TimeForfeit(_) => "Time forfeiture".to_owned(),
            GameResult::TimeExpiredInsufficientMaterial => {
                "Time expired with insufficient material".to_owned()
            }
            GameResult::Other(reason) => reason.clone(),
        }
    }

    /// The PGN `Termination` tag value, present only for non-standard
    /// endings.
    pub fn termination(&self) -> Option<String> {
        match self {
            GameResult::TimeForfeit(_) => Some("time forfeit".to_owned()),
            GameResult::TimeExpiredInsufficientMaterial => {
                Some("time forfeit with insufficient material".to_owned())
            }
            GameResult::Other(reason) => Some(reason.clone()),
            _ => None,
        }
    }
}

impl Display for GameResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.ending_reason())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn annotations() {
        assert_eq!(GameResult::Checkmate(Color::White).annotation(), "1-0");
        assert_eq!(GameResult::TimeForfeit(Color::Black).annotation(), "0-1");
        assert_eq!(GameResult::Stalemate.annotation(), "1/2-1/2");
        assert_eq!(GameResult::Threefold.annotation(), "1/2-1/2");
        assert_eq!(GameResult::TimeExpiredInsufficientMaterial.annotation(), "1/2-1/2");
        assert_eq!(GameResult::Ongoing.annotation(), "*");
        assert_eq!(GameResult::Other("adjourned".into()).annotation(), "*");
    }

    #[test]
    fn winners() {
        assert_eq!(GameResult::Checkmate(Color::Black).winner(), Some(Color::Black));
        assert_eq!(GameResult::FiftyMove.winner(), None);
        assert_eq!(GameResult::Ongoing.winner(), None);
    }

    #[test]
    fn ended_by_rule() {
        assert!(GameResult::Stalemate.ended_by_rule());
        assert!(GameResult::TimeForfeit(Color::White).ended_by_rule());
        assert!(!GameResult::Ongoing.ended_by_rule());
        assert!(!GameResult::Other("crash".into()).ended_by_rule());
    }
}
