//! The append-only genome file.
//!
//! Genome blocks (`ID: <n>` followed by gene blocks, ending `END`) are
//! only ever appended; `Still Alive: <pool> : <id> ...` lines record each
//! pool's membership after every round. Reading takes the last Still-Alive
//! line per pool and resolves each id against its most recent block, so
//! the file is a complete history of the run and its tail is the current
//! population.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use galapagos_engine::genes::GenomeError;
use galapagos_engine::genome::Genome;
use thiserror::Error;

/// One pool member: a genome and its identity.
#[derive(Debug, Clone)]
pub struct Specimen {
    pub id: u64,
    pub genome: Genome,
}

#[derive(Error, Debug)]
pub enum PoolFileError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{path}:{line}: {source}")]
    Genome {
        path: String,
        line: usize,
        source: GenomeError,
    },
    #[error("{path}:{line}: bad line {text:?}")]
    BadLine {
        path: String,
        line: usize,
        text: String,
    },
    #[error("{path}:{line}: bad Still Alive line {text:?}")]
    BadStillAlive {
        path: String,
        line: usize,
        text: String,
    },
    #[error("{path}:{line}: Still Alive line references unknown genome {id}")]
    MissingId {
        path: String,
        line: usize,
        id: u64,
    },
    #[error("{path}: no genome with id {id:?} found")]
    NoSuchGenome { path: String, id: Option<u64> },
}

/// Raw scan results: the latest block per id, the latest Still-Alive line
/// per pool, and bookkeeping for id assignment.
struct FileScan {
    /// id -> (line number of its latest block, block text without the ID
    /// line).
    blocks: HashMap<u64, (usize, String)>,
    /// pool index -> (line number, member ids) from that pool's last
    /// Still-Alive line.
    still_alive: Vec<Option<(usize, Vec<u64>)>>,
    last_block_id: Option<u64>,
    max_id: u64,
}

fn io_error(path: &Path, source: std::io::Error) -> PoolFileError {
    PoolFileError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn scan(path: &Path) -> Result<FileScan, PoolFileError> {
    let mut result = FileScan {
        blocks: HashMap::new(),
        still_alive: Vec::new(),
        last_block_id: None,
        max_id: 0,
    };

    if !path.exists() {
        return Ok(result);
    }
    let text = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;

    let mut lines = text.lines().enumerate();
    while let Some((index, raw)) = lines.next() {
        let line_number = index + 1;
        let line = raw.trim();

        if let Some(id_text) = line.strip_prefix("ID:") {
            let id: u64 = id_text.trim().parse().map_err(|_| PoolFileError::BadLine {
                path: path.display().to_string(),
                line: line_number,
                text: raw.to_owned(),
            })?;

            let mut block = String::new();
            let mut terminated = false;
            for (_, block_line) in lines.by_ref() {
                block.push_str(block_line);
                block.push('\n');
                if block_line.trim() == "END" {
                    terminated = true;
                    break;
                }
            }
            if !terminated {
                return Err(PoolFileError::Genome {
                    path: path.display().to_string(),
                    line: line_number,
                    source: GenomeError::MissingEnd,
                });
            }

            result.blocks.insert(id, (line_number, block));
            result.last_block_id = Some(id);
            result.max_id = result.max_id.max(id);
        } else if line.starts_with("Still Alive") {
            let mut parts = line.splitn(3, ':');
            let bad = || PoolFileError::BadStillAlive {
                path: path.display().to_string(),
                line: line_number,
                text: raw.to_owned(),
            };

            parts.next();
            let pool_index: usize = parts
                .next()
                .and_then(|text| text.trim().parse().ok())
                .ok_or_else(bad)?;
            let ids = parts
                .next()
                .ok_or_else(bad)?
                .split_whitespace()
                .map(|id| id.parse::<u64>())
                .collect::<Result<Vec<u64>, _>>()
                .map_err(|_| bad())?;

            if result.still_alive.len() <= pool_index {
                result.still_alive.resize(pool_index + 1, None);
            }
            result.still_alive[pool_index] = Some((line_number, ids));
        }
    }

    Ok(result)
}

fn parse_block(path: &Path, line: usize, text: &str) -> Result<Genome, PoolFileError> {
    Genome::parse(text).map_err(|source| PoolFileError::Genome {
        path: path.display().to_string(),
        line,
        source,
    })
}

/// Reassemble the pools recorded in a genome file. An empty or missing
/// file yields no pools.
pub fn load_pools(path: &Path) -> Result<Vec<Vec<Specimen>>, PoolFileError> {
    let scan = scan(path)?;

    let mut pools = Vec::with_capacity(scan.still_alive.len());
    for entry in &scan.still_alive {
        let mut pool = Vec::new();
        if let Some((line_number, ids)) = entry {
            for &id in ids {
                let (block_line, text) =
                    scan.blocks.get(&id).ok_or_else(|| PoolFileError::MissingId {
                        path: path.display().to_string(),
                        line: *line_number,
                        id,
                    })?;
                pool.push(Specimen {
                    id,
                    genome: parse_block(path, *block_line, text)?,
                });
            }
        }
        pools.push(pool);
    }

    Ok(pools)
}

/// The highest genome id recorded in the file, if any.
pub fn find_last_id(path: &Path) -> Result<Option<u64>, PoolFileError> {
    Ok(scan(path)?.blocks.keys().max().copied())
}

/// Every genome id with a block in the file.
pub fn known_ids(path: &Path) -> Result<std::collections::HashSet<u64>, PoolFileError> {
    Ok(scan(path)?.blocks.keys().copied().collect())
}

/// Load one genome by id, or the file's most recently written genome when
/// `id` is [`None`]. Used for seeds and best-genome files.
pub fn load_genome(path: &Path, id: Option<u64>) -> Result<Specimen, PoolFileError> {
    let scan = scan(path)?;
    let id = id.or(scan.last_block_id).ok_or_else(|| PoolFileError::NoSuchGenome {
        path: path.display().to_string(),
        id,
    })?;
    let (line, text) = scan.blocks.get(&id).ok_or_else(|| PoolFileError::NoSuchGenome {
        path: path.display().to_string(),
        id: Some(id),
    })?;
    Ok(Specimen {
        id,
        genome: parse_block(path, *line, text)?,
    })
}

fn render_genome(specimen: &Specimen) -> String {
    format!("ID: {}\n{}\n", specimen.id, specimen.genome.write_block())
}

fn render_still_alive(pool_index: usize, ids: &[u64]) -> String {
    let ids = ids
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    format!("Still Alive: {pool_index} : {ids}\n\n")
}

/// Append a genome block.
pub fn append_genome(path: &Path, specimen: &Specimen) -> Result<(), PoolFileError> {
    append(path, &render_genome(specimen))
}

/// Append a pool's membership line.
pub fn append_still_alive(path: &Path, pool_index: usize, ids: &[u64]) -> Result<(), PoolFileError> {
    append(path, &render_still_alive(pool_index, ids))
}

fn append(path: &Path, text: &str) -> Result<(), PoolFileError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_error(path, e))?;
    file.write_all(text.as_bytes()).map_err(|e| io_error(path, e))
}

/// Rewrite the whole file from the given pools (used after a global
/// reshuffle): every member's genome once, then a Still-Alive line per
/// pool.
pub fn rewrite_pools(path: &Path, pools: &[Vec<Specimen>]) -> Result<(), PoolFileError> {
    let mut text = String::new();
    for pool in pools {
        for specimen in pool {
            text.push_str(&render_genome(specimen));
        }
    }
    for (pool_index, pool) in pools.iter().enumerate() {
        let ids: Vec<u64> = pool.iter().map(|s| s.id).collect();
        text.push_str(&render_still_alive(pool_index, &ids));
    }

    std::fs::write(path, text).map_err(|e| io_error(path, e))
}

/// Write the best genome so far, atomically for outside readers: the text
/// lands in a `.tmp` sibling that is renamed over the target.
pub fn write_best_genome(path: &Path, specimen: &Specimen) -> Result<(), PoolFileError> {
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = std::path::PathBuf::from(temp);

    std::fs::write(&temp, render_genome(specimen)).map_err(|e| io_error(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| io_error(path, e))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_file(name: &str) -> std::path::PathBuf {
        tempfile::tempdir()
            .unwrap()
            .into_path()
            .join(format!("{name}.txt"))
    }

    fn specimen(id: u64) -> Specimen {
        Specimen {
            id,
            genome: Genome::new(),
        }
    }

    #[test]
    fn membership_round_trips() {
        let path = temp_file("round_trip");

        for id in 1..=4 {
            append_genome(&path, &specimen(id)).unwrap();
        }
        append_still_alive(&path, 0, &[1, 2]).unwrap();
        append_still_alive(&path, 1, &[3, 4]).unwrap();
        // A later round supersedes pool 0's membership.
        append_still_alive(&path, 0, &[1, 4]).unwrap();

        let pools = load_pools(&path).unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!(
            pools[0].iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![1, 4]
        );
        assert_eq!(
            pools[1].iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![3, 4]
        );
    }

    #[test]
    fn writing_loaded_pools_back_preserves_membership() {
        let path = temp_file("reload");
        for id in 1..=4 {
            append_genome(&path, &specimen(id)).unwrap();
        }
        append_still_alive(&path, 0, &[1, 2]).unwrap();
        append_still_alive(&path, 1, &[3, 4]).unwrap();

        let pools = load_pools(&path).unwrap();
        let rewritten = temp_file("reload_out");
        rewrite_pools(&rewritten, &pools).unwrap();

        let reloaded = load_pools(&rewritten).unwrap();
        let membership = |pools: &[Vec<Specimen>]| {
            pools
                .iter()
                .map(|pool| pool.iter().map(|s| s.id).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        };
        assert_eq!(membership(&reloaded), membership(&pools));
    }

    #[test]
    fn latest_block_wins_for_an_id() {
        let path = temp_file("latest");
        let mut first = specimen(7);
        append_genome(&path, &first).unwrap();

        let mut rng = rand::rngs::mock::StepRng::new(12345, 67890);
        first.genome.mutate_n(&mut rng, 50);
        append_genome(&path, &first).unwrap();
        append_still_alive(&path, 0, &[7]).unwrap();

        let pools = load_pools(&path).unwrap();
        assert_eq!(
            pools[0][0].genome.write_block(),
            first.genome.write_block()
        );
    }

    #[test]
    fn missing_ids_are_fatal_with_position() {
        let path = temp_file("missing");
        append_genome(&path, &specimen(1)).unwrap();
        append_still_alive(&path, 0, &[1, 99]).unwrap();

        match load_pools(&path).unwrap_err() {
            PoolFileError::MissingId { id, line, .. } => {
                assert_eq!(id, 99);
                assert!(line > 0);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn absent_files_are_empty() {
        let path = temp_file("absent");
        assert!(load_pools(&path).unwrap().is_empty());
        assert_eq!(find_last_id(&path).unwrap(), None);
    }

    #[test]
    fn load_genome_by_id_and_latest() {
        let path = temp_file("by_id");
        append_genome(&path, &specimen(3)).unwrap();
        append_genome(&path, &specimen(8)).unwrap();

        assert_eq!(load_genome(&path, Some(3)).unwrap().id, 3);
        assert_eq!(load_genome(&path, None).unwrap().id, 8);
        assert!(matches!(
            load_genome(&path, Some(4)),
            Err(PoolFileError::NoSuchGenome { .. })
        ));
    }

    #[test]
    fn best_genome_write_is_renamed_into_place() {
        let path = temp_file("best");
        write_best_genome(&path, &specimen(5)).unwrap();

        let loaded = load_genome(&path, None).unwrap();
        assert_eq!(loaded.id, 5);

        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");
        assert!(!std::path::PathBuf::from(temp).exists());
    }
}
