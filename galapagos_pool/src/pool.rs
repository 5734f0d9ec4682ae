//! The tournament breeding loop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use galapagos_core::board::Board;
use galapagos_core::clock::Clock;
use galapagos_core::game_result::GameResult;
use galapagos_engine::calibration::Calibration;
use galapagos_engine::game::play_game;
use galapagos_engine::genome::Genome;
use galapagos_engine::player::GeneticPlayer;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{ConfigError, Configuration};
use crate::genome_file::{self, PoolFileError, Specimen};

/// Per-round decay of the win count a genome must beat to be recorded as
/// the best seen so far.
pub const BEST_DECAY: f64 = 0.99;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    File(#[from] PoolFileError),
    #[error("could not build the game thread pool: {0}")]
    Threads(#[from] rayon::ThreadPoolBuildError),
    #[error("{0}")]
    Invalid(String),
}

/// Everything a gene-pool run is configured by; see the configuration
/// file keys of the same names.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_simultaneous_games: usize,
    pub population: usize,
    pub pool_count: usize,
    pub swap_interval: usize,
    /// true: offspring cross both parents; false: clone the winner.
    pub mating: bool,
    pub genome_file: PathBuf,
    pub initial_mutations: usize,
    pub min_game_seconds: f64,
    pub max_game_seconds: f64,
    pub game_time_increment: f64,
    pub oscillating_time: bool,
    /// Seed genome: a file and optionally an id within it.
    pub seed: Option<(PathBuf, Option<u64>)>,
}

impl PoolSettings {
    pub fn from_configuration(config: &Configuration) -> Result<Self, PoolError> {
        let settings = Self {
            max_simultaneous_games: config.positive_integer("maximum simultaneous games")?,
            population: config.positive_integer("gene pool population")?,
            pool_count: config.positive_integer("gene pool count")?,
            swap_interval: config.positive_integer("pool swap interval")?,
            mating: config.choice("reproduction type", "mating", "cloning")?,
            genome_file: PathBuf::from(config.text("gene pool file")?),
            initial_mutations: config.positive_integer("initial mutations")?,
            min_game_seconds: config.positive_number("minimum game time")?,
            max_game_seconds: config.positive_number("maximum game time")?,
            game_time_increment: config.number("game time increment")?,
            oscillating_time: config.choice("oscillating time", "yes", "no")?,
            seed: if config.has("seed") {
                let spec = config.text("seed")?;
                Some(match spec.rsplit_once('/') {
                    Some((file, id)) if id.chars().all(|c| c.is_ascii_digit()) && !id.is_empty() => {
                        (PathBuf::from(file), Some(id.parse().expect("digits parse")))
                    }
                    _ => (PathBuf::from(spec), None),
                })
            } else {
                None
            },
        };

        let unused = config.unused_keys();
        if !unused.is_empty() {
            warn!("unused configuration parameters: {}", unused.join(", "));
        }

        if settings.population % 2 != 0 {
            return Err(PoolError::Invalid(format!(
                "gene pool population must be even (value = {})",
                settings.population
            )));
        }
        if settings.max_game_seconds < settings.min_game_seconds {
            return Err(PoolError::Invalid(
                "maximum game time must be at least the minimum game time".to_owned(),
            ));
        }

        Ok(settings)
    }
}

/// The breeding loop state: N pools of P genomes, win statistics, and the
/// persistent genome file.
pub struct GenePool {
    settings: PoolSettings,
    pools: Vec<Vec<Specimen>>,
    next_id: u64,
    rng: StdRng,
    threads: rayon::ThreadPool,
    calibration: Calibration,

    wins: HashMap<u64, u32>,
    draws: HashMap<u64, u32>,
    color_wins: [u32; 2],
    draw_count: u32,
    wins_to_beat: f64,
    best_id: Option<u64>,

    game_seconds: f64,
    time_rising: bool,
    rounds_since_swap: usize,

    quit: Arc<AtomicBool>,
}

impl GenePool {
    pub fn from_config_file(path: &Path) -> Result<Self, PoolError> {
        let config = Configuration::read(path)?;
        let settings = PoolSettings::from_configuration(&config)?;
        Self::new(settings)
    }

    pub fn new(settings: PoolSettings) -> Result<Self, PoolError> {
        let mut rng = StdRng::from_entropy();
        let calibration = Calibration::measure(&Genome::new(), &mut rng);
        Self::with_calibration(settings, calibration)
    }

    /// Construction with a known calibration (tests, or repeated runs on
    /// the same machine).
    pub fn with_calibration(
        settings: PoolSettings,
        calibration: Calibration,
    ) -> Result<Self, PoolError> {
        let mut rng = StdRng::from_entropy();
        let threads = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.max_simultaneous_games)
            .build()?;

        let mut next_id = genome_file::find_last_id(&settings.genome_file)?
            .map(|id| id + 1)
            .unwrap_or(1);
        let mut pools = genome_file::load_pools(&settings.genome_file)?;

        let mut spawn = |rng: &mut StdRng, base: &Genome| {
            let mut genome = base.clone();
            genome.mutate_n(rng, settings.initial_mutations);
            let specimen = Specimen {
                id: next_id,
                genome,
            };
            next_id += 1;
            specimen
        };

        if pools.is_empty() {
            let base = match &settings.seed {
                Some((file, id)) => {
                    let seed = genome_file::load_genome(file, *id)?;
                    info!("seeding pools from {} (id {})", file.display(), seed.id);
                    seed.genome
                }
                None => Genome::new(),
            };
            pools = (0..settings.pool_count)
                .map(|_| {
                    (0..settings.population)
                        .map(|_| spawn(&mut rng, &base))
                        .collect()
                })
                .collect();
        } else {
            // The file may predate a configuration change; cut or grow to
            // the configured shape.
            pools.truncate(settings.pool_count);
            while pools.len() < settings.pool_count {
                pools.push(Vec::new());
            }
            let base = Genome::new();
            for pool in &mut pools {
                pool.truncate(settings.population);
                while pool.len() < settings.population {
                    pool.push(spawn(&mut rng, &base));
                }
            }
        }

        // Persist every member the file does not know yet, and the
        // starting membership.
        let known = genome_file::known_ids(&settings.genome_file)?;
        for (pool_index, pool) in pools.iter().enumerate() {
            for specimen in pool {
                if !known.contains(&specimen.id) {
                    genome_file::append_genome(&settings.genome_file, specimen)?;
                }
            }
            let ids: Vec<u64> = pool.iter().map(|s| s.id).collect();
            genome_file::append_still_alive(&settings.genome_file, pool_index, &ids)?;
        }

        let game_seconds = settings.min_game_seconds;
        Ok(Self {
            settings,
            pools,
            next_id,
            rng,
            threads,
            calibration,
            wins: HashMap::new(),
            draws: HashMap::new(),
            color_wins: [0; 2],
            draw_count: 0,
            wins_to_beat: 0.0,
            best_id: None,
            game_seconds,
            time_rising: true,
            rounds_since_swap: 0,
            quit: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The handle a signal handler flips to stop the loop at the next
    /// round boundary (in-flight games always finish and record first).
    pub fn quit_latch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }

    /// Run until the quit latch is set. Installs a Ctrl-C handler tied to
    /// the latch.
    pub fn run(&mut self) -> Result<(), PoolError> {
        let quit = self.quit_latch();
        if let Err(error) = ctrlc::set_handler(move || quit.store(true, AtomicOrdering::SeqCst)) {
            warn!("no Ctrl-C handler; stop the pool by other means ({error})");
        }

        info!(
            "gene pool started: {} pools of {}, file {}",
            self.settings.pool_count,
            self.settings.population,
            self.settings.genome_file.display()
        );

        loop {
            if self.run_sweep()? {
                info!("gene pool stopped");
                return Ok(());
            }
        }
    }

    /// Run a fixed number of complete sweeps over all pools.
    pub fn run_sweeps(&mut self, sweeps: usize) -> Result<(), PoolError> {
        for _ in 0..sweeps {
            if self.run_sweep()? {
                return Ok(());
            }
        }
        Ok(())
    }

    pub fn pools(&self) -> &[Vec<Specimen>] {
        &self.pools
    }

    /// One round for every pool. Returns true if the quit latch stopped
    /// the sweep.
    fn run_sweep(&mut self) -> Result<bool, PoolError> {
        for pool_index in 0..self.pools.len() {
            if self.quit.load(AtomicOrdering::SeqCst) {
                return Ok(true);
            }
            self.play_round(pool_index)?;
        }

        self.rounds_since_swap += 1;
        if self.rounds_since_swap >= self.settings.swap_interval {
            self.swap_pools()?;
            self.rounds_since_swap = 0;
        }

        Ok(false)
    }

    fn play_round(&mut self, pool_index: usize) -> Result<(), PoolError> {
        self.pools[pool_index].shuffle(&mut self.rng);

        info!(
            "pool {pool_index}: round at {:.1}s per game; totals {} white wins, {} black wins, {} draws",
            self.game_seconds, self.color_wins[0], self.color_wins[1], self.draw_count
        );

        let pgn_path = self.game_record_path();
        let game_seconds = self.game_seconds;
        let calibration = self.calibration.clone();
        let pairs: Vec<(Specimen, Specimen)> = self.pools[pool_index]
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();

        let results: Vec<GameResult> = self.threads.install(|| {
            pairs
                .par_iter()
                .map(|(white, black)| {
                    let mut white_player = GeneticPlayer::with_calibration(
                        white.genome.clone(),
                        white.id,
                        calibration.clone(),
                    );
                    let mut black_player = GeneticPlayer::with_calibration(
                        black.genome.clone(),
                        black.id,
                        calibration.clone(),
                    );
                    play_game(
                        Board::starting_position(),
                        Clock::with_time(game_seconds),
                        &mut white_player,
                        &mut black_player,
                        "Gene pool",
                        "Local computer",
                        Some(&pgn_path),
                    )
                })
                .collect()
        });

        for (pair_index, result) in results.iter().enumerate() {
            let white_slot = 2 * pair_index;
            let black_slot = white_slot + 1;
            let white_id = self.pools[pool_index][white_slot].id;
            let black_id = self.pools[pool_index][black_slot].id;

            info!(
                "pool {pool_index}: {white_id} vs {black_id}: {}",
                result.ending_reason()
            );

            match result.winner() {
                None => {
                    // Draws leave both players alive.
                    *self.draws.entry(white_id).or_insert(0) += 1;
                    *self.draws.entry(black_id).or_insert(0) += 1;
                    self.draw_count += 1;
                }
                Some(winner_color) => {
                    let (winner_slot, loser_slot) = if winner_color.is_white() {
                        (white_slot, black_slot)
                    } else {
                        (black_slot, white_slot)
                    };

                    self.color_wins[winner_color.index()] += 1;
                    let winner_id = self.pools[pool_index][winner_slot].id;
                    *self.wins.entry(winner_id).or_insert(0) += 1;

                    let mut offspring_genome = if self.settings.mating {
                        Genome::cross(
                            &self.pools[pool_index][white_slot].genome,
                            &self.pools[pool_index][black_slot].genome,
                            &mut self.rng,
                        )
                    } else {
                        self.pools[pool_index][winner_slot].genome.clone()
                    };
                    offspring_genome.mutate(&mut self.rng);

                    let offspring = Specimen {
                        id: self.next_id,
                        genome: offspring_genome,
                    };
                    self.next_id += 1;

                    genome_file::append_genome(&self.settings.genome_file, &offspring)?;
                    self.pools[pool_index][loser_slot] = offspring;
                }
            }
        }

        self.pools[pool_index].sort_by_key(|specimen| specimen.id);
        let ids: Vec<u64> = self.pools[pool_index].iter().map(|s| s.id).collect();
        genome_file::append_still_alive(&self.settings.genome_file, pool_index, &ids)?;

        self.purge_dead_statistics();
        self.record_best()?;
        self.advance_game_time();

        Ok(())
    }

    /// Forget statistics for genomes no pool contains anymore.
    fn purge_dead_statistics(&mut self) {
        let alive: std::collections::HashSet<u64> = self
            .pools
            .iter()
            .flatten()
            .map(|specimen| specimen.id)
            .collect();
        self.wins.retain(|id, _| alive.contains(id));
        self.draws.retain(|id, _| alive.contains(id));
    }

    /// Track the best genome by decayed win count and write it out
    /// atomically whenever a new one takes the lead.
    fn record_best(&mut self) -> Result<(), PoolError> {
        self.wins_to_beat *= BEST_DECAY;

        let mut new_best = None;
        for (&id, &wins) in &self.wins {
            if f64::from(wins) > self.wins_to_beat {
                self.wins_to_beat = f64::from(wins);
                new_best = Some(id);
            }
        }

        if let Some(id) = new_best {
            if let Some(specimen) = self
                .pools
                .iter()
                .flatten()
                .find(|specimen| specimen.id == id)
            {
                self.best_id = Some(id);
                genome_file::write_best_genome(&self.best_genome_path(), specimen)?;
                info!("new best genome: {id} ({} wins to beat)", self.wins_to_beat);
            }
        }

        Ok(())
    }

    /// Sweep the per-game clock between the configured bounds, bouncing
    /// at the ends when oscillation is on and saturating otherwise.
    fn advance_game_time(&mut self) {
        let increment = if self.time_rising {
            self.settings.game_time_increment
        } else {
            -self.settings.game_time_increment
        };
        self.game_seconds = (self.game_seconds + increment)
            .clamp(self.settings.min_game_seconds, self.settings.max_game_seconds);

        if self.settings.oscillating_time
            && (self.game_seconds >= self.settings.max_game_seconds
                || self.game_seconds <= self.settings.min_game_seconds)
        {
            self.time_rising = !self.time_rising;
        }
    }

    /// Every swap interval, merge all pools, shuffle globally, deal back
    /// into N pools of P, and rewrite the file from scratch.
    fn swap_pools(&mut self) -> Result<(), PoolError> {
        let mut everyone: Vec<Specimen> = self.pools.drain(..).flatten().collect();
        everyone.shuffle(&mut self.rng);

        self.pools = everyone
            .chunks(self.settings.population)
            .map(|chunk| {
                let mut pool = chunk.to_vec();
                pool.sort_by_key(|specimen| specimen.id);
                pool
            })
            .collect();

        genome_file::rewrite_pools(&self.settings.genome_file, &self.pools)?;
        info!("pools reshuffled across {} pools", self.pools.len());
        Ok(())
    }

    fn game_record_path(&self) -> PathBuf {
        let mut name = self.settings.genome_file.as_os_str().to_owned();
        name.push("_games.pgn");
        PathBuf::from(name)
    }

    fn best_genome_path(&self) -> PathBuf {
        let mut name = self.settings.genome_file.as_os_str().to_owned();
        name.push("_best_genome.txt");
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings(dir: &Path) -> PoolSettings {
        PoolSettings {
            max_simultaneous_games: 2,
            population: 4,
            pool_count: 2,
            swap_interval: 1,
            mating: true,
            genome_file: dir.join("pool.txt"),
            initial_mutations: 5,
            min_game_seconds: 0.2,
            max_game_seconds: 0.4,
            game_time_increment: 0.1,
            oscillating_time: true,
            seed: None,
        }
    }

    #[test]
    fn settings_parse_from_configuration() {
        let config = Configuration::parse(
            "\
maximum simultaneous games = 3
gene pool population = 6
gene pool count = 2
pool swap interval = 10
reproduction type = cloning
gene pool file = /tmp/genomes.txt
initial mutations = 20
minimum game time = 10
maximum game time = 60
game time increment = 5
oscillating time = yes
seed = seeds.txt/17
",
        );
        let settings = PoolSettings::from_configuration(&config).unwrap();
        assert_eq!(settings.population, 6);
        assert!(!settings.mating);
        assert!(settings.oscillating_time);
        assert_eq!(
            settings.seed,
            Some((PathBuf::from("seeds.txt"), Some(17)))
        );
    }

    #[test]
    fn odd_populations_are_rejected() {
        let config = Configuration::parse(
            "\
maximum simultaneous games = 1
gene pool population = 5
gene pool count = 1
pool swap interval = 1
reproduction type = mating
gene pool file = x.txt
initial mutations = 1
minimum game time = 1
maximum game time = 2
game time increment = 0
oscillating time = no
",
        );
        assert!(matches!(
            PoolSettings::from_configuration(&config),
            Err(PoolError::Invalid(_))
        ));
    }

    #[test]
    fn fresh_pools_are_created_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let pool = GenePool::with_calibration(settings.clone(), Calibration::default()).unwrap();

        assert_eq!(pool.pools().len(), 2);
        assert!(pool.pools().iter().all(|p| p.len() == 4));

        // The file already knows every member.
        let reloaded = genome_file::load_pools(&settings.genome_file).unwrap();
        assert_eq!(reloaded.len(), 2);
        let ids = |pools: &[Vec<Specimen>]| -> Vec<Vec<u64>> {
            pools
                .iter()
                .map(|p| p.iter().map(|s| s.id).collect())
                .collect()
        };
        assert_eq!(ids(&reloaded), ids(pool.pools()));
    }

    #[test]
    fn reloading_reuses_the_persisted_population() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());

        let first = GenePool::with_calibration(settings.clone(), Calibration::default()).unwrap();
        let first_ids: Vec<Vec<u64>> = first
            .pools()
            .iter()
            .map(|p| p.iter().map(|s| s.id).collect())
            .collect();
        drop(first);

        let second = GenePool::with_calibration(settings, Calibration::default()).unwrap();
        let second_ids: Vec<Vec<u64>> = second
            .pools()
            .iter()
            .map(|p| p.iter().map(|s| s.id).collect())
            .collect();
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    #[ignore = "plays real games; run with cargo test -- --ignored"]
    fn a_sweep_breeds_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        let mut pool =
            GenePool::with_calibration(settings.clone(), Calibration::default()).unwrap();

        pool.run_sweeps(1).unwrap();

        // Membership still loads and has the right shape.
        let reloaded = genome_file::load_pools(&settings.genome_file).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.iter().all(|p| p.len() == 4));

        // The games were recorded as valid PGN.
        let pgn = PathBuf::from(format!("{}_games.pgn", settings.genome_file.display()));
        galapagos_core::pgn::confirm_game_record(&pgn).unwrap();
    }
}
