//! Rules-correct chess for the galapagos engine: board representation with
//! incremental attack maps, legal move generation, Zobrist hashing, draw
//! tracking, FEN/SAN/PGN, the game clock, and perft.

pub mod board;
pub mod clock;
pub mod game_result;
pub mod perft;
pub mod pgn;
