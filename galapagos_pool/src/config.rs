//! `key = value` configuration files.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("missing configuration parameter {0:?}")]
    Missing(String),
    #[error("parameter {key:?} has non-numeric value {value:?}")]
    BadNumber { key: String, value: String },
    #[error("parameter {key:?} must be greater than zero (value = {value})")]
    NotPositive { key: String, value: f64 },
    #[error("parameter {key:?} must be {yes:?} or {no:?}, found {value:?}")]
    BadChoice {
        key: String,
        value: String,
        yes: String,
        no: String,
    },
}

/// A parsed configuration file: `parameter = value` lines, `#` comments,
/// case-insensitive parameter names. Queried parameters are tracked so
/// leftovers can be reported (unknown keys are not fatal).
#[derive(Debug)]
pub struct Configuration {
    values: BTreeMap<String, String>,
    used: RefCell<BTreeSet<String>>,
}

impl Configuration {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut values = BTreeMap::new();
        for raw in text.lines() {
            let line = match raw.split_once('#') {
                Some((before, _)) => before,
                None => raw,
            };
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            values.insert(
                key.trim().to_lowercase(),
                value.trim().to_owned(),
            );
        }
        Self {
            values,
            used: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(&key.to_lowercase())
    }

    pub fn text(&self, key: &str) -> Result<String, ConfigError> {
        let normalized = key.to_lowercase();
        self.used.borrow_mut().insert(normalized.clone());
        self.values
            .get(&normalized)
            .cloned()
            .ok_or_else(|| ConfigError::Missing(key.to_owned()))
    }

    pub fn number(&self, key: &str) -> Result<f64, ConfigError> {
        let value = self.text(key)?;
        value.parse().map_err(|_| ConfigError::BadNumber {
            key: key.to_owned(),
            value,
        })
    }

    pub fn positive_number(&self, key: &str) -> Result<f64, ConfigError> {
        let value = self.number(key)?;
        if value > 0.0 {
            Ok(value)
        } else {
            Err(ConfigError::NotPositive {
                key: key.to_owned(),
                value,
            })
        }
    }

    pub fn positive_integer(&self, key: &str) -> Result<usize, ConfigError> {
        Ok(self.positive_number(key)? as usize)
    }

    /// A two-valued parameter (`mating`/`cloning`, `yes`/`no`), compared
    /// case-insensitively.
    pub fn choice(&self, key: &str, yes: &str, no: &str) -> Result<bool, ConfigError> {
        let value = self.text(key)?;
        if value.eq_ignore_ascii_case(yes) {
            Ok(true)
        } else if value.eq_ignore_ascii_case(no) {
            Ok(false)
        } else {
            Err(ConfigError::BadChoice {
                key: key.to_owned(),
                value,
                yes: yes.to_owned(),
                no: no.to_owned(),
            })
        }
    }

    /// Parameters present in the file that nothing asked for.
    pub fn unused_keys(&self) -> Vec<String> {
        let used = self.used.borrow();
        self.values
            .keys()
            .filter(|key| !used.contains(*key))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "\
# gene pool setup
maximum simultaneous games = 4
gene pool population = 8   # per pool
gene pool count = 2
reproduction type = mating
oscillating time = no
gene pool file = pool.txt
minimum game time = 30
";

    #[test]
    fn parses_values_and_comments() {
        let config = Configuration::parse(SAMPLE);
        assert_eq!(config.text("gene pool file").unwrap(), "pool.txt");
        assert_eq!(config.positive_integer("gene pool population").unwrap(), 8);
        assert_eq!(config.positive_number("minimum game time").unwrap(), 30.0);
    }

    #[test]
    fn keys_are_case_insensitive() {
        let config = Configuration::parse(SAMPLE);
        assert_eq!(config.positive_integer("Gene Pool Count").unwrap(), 2);
        assert!(config.has("MAXIMUM SIMULTANEOUS GAMES"));
    }

    #[test]
    fn choices() {
        let config = Configuration::parse(SAMPLE);
        assert!(config.choice("reproduction type", "mating", "cloning").unwrap());
        assert!(!config.choice("oscillating time", "yes", "no").unwrap());
        assert!(matches!(
            config.choice("gene pool file", "yes", "no"),
            Err(ConfigError::BadChoice { .. })
        ));
    }

    #[test]
    fn errors_name_the_parameter() {
        let config = Configuration::parse(SAMPLE);
        assert!(matches!(
            config.text("no such key"),
            Err(ConfigError::Missing(key)) if key == "no such key"
        ));
        assert!(matches!(
            config.number("gene pool file"),
            Err(ConfigError::BadNumber { .. })
        ));

        let zero = Configuration::parse("count = 0");
        assert!(matches!(
            zero.positive_integer("count"),
            Err(ConfigError::NotPositive { .. })
        ));
    }

    #[test]
    fn unused_keys_are_reported() {
        let config = Configuration::parse(SAMPLE);
        let _ = config.text("gene pool file");
        let unused = config.unused_keys();
        assert!(unused.contains(&"gene pool count".to_owned()));
        assert!(!unused.contains(&"gene pool file".to_owned()));
    }
}
