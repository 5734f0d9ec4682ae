//! The dual game clock used in tournament play.

use std::time::{Instant, SystemTime};

use crate::board::{Board, Color};
use crate::game_result::GameResult;

/// What happens to a player's timer when they complete the configured
/// number of moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeResetMethod {
    /// The initial time is added to whatever remains.
    #[default]
    Addition,
    /// The timer is set back to the initial time.
    SetToOriginal,
}

/// A two-sided chess clock.
///
/// Time is tracked in fractional seconds and may go negative at the moment
/// a flag falls; running out of time is a [`GameResult`], not an error.
#[derive(Debug, Clone)]
pub struct Clock {
    timers: [f64; 2],
    increments: [f64; 2],
    moves_until_reset: [u32; 2],
    initial_time: f64,
    moves_per_period: u32,
    reset_method: TimeResetMethod,
    running_for: Color,
    running: bool,
    last_punch: Option<Instant>,
    paused_at: Option<Instant>,
    game_start: Option<SystemTime>,
}

impl Clock {
    /// A clock giving each player `initial_seconds`, adding
    /// `increment_seconds` per move, and resetting (per `reset_method`)
    /// every `moves_per_period` moves. A `moves_per_period` of zero means
    /// no reset ever happens.
    pub fn new(
        initial_seconds: f64,
        moves_per_period: u32,
        increment_seconds: f64,
        reset_method: TimeResetMethod,
    ) -> Self {
        Self {
            timers: [initial_seconds; 2],
            increments: [increment_seconds; 2],
            moves_until_reset: [moves_per_period; 2],
            initial_time: initial_seconds,
            moves_per_period,
            reset_method,
            running_for: Color::White,
            running: false,
            last_punch: None,
            paused_at: None,
            game_start: None,
        }
    }

    /// A simple sudden-death clock.
    pub fn with_time(initial_seconds: f64) -> Self {
        Self::new(initial_seconds, 0, 0.0, TimeResetMethod::Addition)
    }

    /// Start timing, with `to_move` on the move. Records the wall-clock
    /// start of the game for the PGN header.
    pub fn start(&mut self, to_move: Color) {
        self.running_for = to_move;
        self.running = true;
        self.last_punch = Some(Instant::now());
        self.paused_at = None;
        if self.game_start.is_none() {
            self.game_start = Some(SystemTime::now());
        }
    }

    /// Stop the player's timer after their move and start the opponent's.
    ///
    /// Returns [`GameResult::TimeForfeit`] when the mover's flag fell --
    /// downgraded to [`GameResult::TimeExpiredInsufficientMaterial`] when
    /// the opponent has no mating material -- and
    /// [`GameResult::Ongoing`] otherwise.
    pub fn punch(&mut self, board: &Board) -> GameResult {
        if !self.running {
            return GameResult::Ongoing;
        }

        let now = Instant::now();
        let mover = self.running_for;
        let elapsed = self
            .last_punch
            .map(|last| now.duration_since(last).as_secs_f64())
            .unwrap_or(0.0);
        self.timers[mover.index()] -= elapsed;
        self.last_punch = Some(now);

        if self.timers[mover.index()] < 0.0 {
            self.running = false;
            let opponent = mover.opposite();
            return if board.enough_material_to_checkmate(opponent) {
                GameResult::TimeForfeit(opponent)
            } else {
                GameResult::TimeExpiredInsufficientMaterial
            };
        }

        let next = mover.opposite();
        self.running_for = next;
        self.timers[next.index()] += self.increments[next.index()];

        if self.moves_per_period > 0 {
            let counter = &mut self.moves_until_reset[next.index()];
            *counter -= 1;
            if *counter == 0 {
                *counter = self.moves_per_period;
                match self.reset_method {
                    TimeResetMethod::Addition => {
                        self.timers[next.index()] += self.initial_time;
                    }
                    TimeResetMethod::SetToOriginal => {
                        self.timers[next.index()] = self.initial_time;
                    }
                }
            }
        }

        GameResult::Ongoing
    }

    /// Stop both timers. Time up to the pause is charged to the running
    /// player; the paused interval is not.
    pub fn pause(&mut self) {
        if !self.running || self.paused_at.is_some() {
            return;
        }
        self.paused_at = Some(Instant::now());
    }

    pub fn resume(&mut self) {
        if let (Some(paused_at), Some(last_punch)) = (self.paused_at.take(), self.last_punch) {
            // Shift the punch reference forward by the paused interval.
            self.last_punch = Some(last_punch + paused_at.elapsed());
        }
    }

    /// Seconds left for a player. While that player's clock runs, the time
    /// since the last punch counts against them.
    pub fn time_left(&self, color: Color) -> f64 {
        let recorded = self.timers[color.index()];
        if !self.running || self.running_for != color {
            return recorded;
        }
        let reference = match (self.paused_at, self.last_punch) {
            (Some(paused_at), Some(last_punch)) => paused_at.duration_since(last_punch),
            (None, Some(last_punch)) => last_punch.elapsed(),
            _ => return recorded,
        };
        recorded - reference.as_secs_f64()
    }

    /// Moves the player can make before their timer resets; `u32::MAX`
    /// when no reset is configured.
    pub fn moves_until_reset(&self, color: Color) -> u32 {
        if self.moves_per_period > 0 {
            self.moves_until_reset[color.index()]
        } else {
            u32::MAX
        }
    }

    pub fn running_for(&self) -> Color {
        self.running_for
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn initial_seconds(&self) -> f64 {
        self.initial_time
    }

    pub fn increment(&self, color: Color) -> f64 {
        self.increments[color.index()]
    }

    pub fn reset_method(&self) -> TimeResetMethod {
        self.reset_method
    }

    /// When [`Clock::start`] was first called.
    pub fn game_start_time(&self) -> Option<SystemTime> {
        self.game_start
    }

    /// Adjust a player's remaining time (external protocol updates).
    pub fn set_time(&mut self, color: Color, seconds: f64) {
        self.timers[color.index()] = seconds;
    }

    /// Adjust a player's increment (external protocol updates).
    pub fn set_increment(&mut self, color: Color, seconds: f64) {
        self.increments[color.index()] = seconds;
    }

    /// The PGN `TimeControl` tag value: `moves/seconds`, `seconds`, with
    /// `+increment` when one applies.
    pub fn time_control_string(&self) -> String {
        let mut out = String::new();
        if self.moves_per_period > 0 {
            out.push_str(&format!("{}/", self.moves_per_period));
        }
        out.push_str(&trim_seconds(self.initial_time));
        if self.increments[0] > 0.0 {
            out.push('+');
            out.push_str(&trim_seconds(self.increments[0]));
        }
        out
    }
}

/// Seconds formatted without a trailing `.0` for whole values.
fn trim_seconds(seconds: f64) -> String {
    if seconds == seconds.trunc() {
        format!("{}", seconds as u64)
    } else {
        format!("{seconds}")
    }
}
