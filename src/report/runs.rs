//! Run selection: inclusive ranges and run numbers embedded in file names

use regex::Regex;
use std::collections::HashSet;
use std::ops::RangeInclusive;

use crate::error::UsageError;

/// Ordered, duplicate-free list of run numbers.
///
/// The inclusive range is kept as bounds and walked lazily; only runs added
/// individually are stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSet {
    range: Option<RangeInclusive<u32>>,
    extra: Vec<u32>,
    seen: HashSet<u32>,
}

impl RunSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every run in `[min, max]`, ascending
    pub fn from_range(min: u32, max: u32) -> Result<Self, UsageError> {
        if min == 0 {
            return Err(UsageError::InvalidRunNumber(min.to_string()));
        }
        if min > max {
            return Err(UsageError::EmptyRange { min, max });
        }
        Ok(Self {
            range: Some(min..=max),
            ..Self::default()
        })
    }

    /// Runs extracted from file names, in input order
    pub fn from_files<S: AsRef<str>>(files: &[S], pattern: &str) -> Result<Self, UsageError> {
        let mut set = Self::new();
        set.extend_files(files, pattern)?;
        Ok(set)
    }

    /// Append runs taken from file names after the ones already held
    pub fn extend_files<S: AsRef<str>>(
        &mut self,
        files: &[S],
        pattern: &str,
    ) -> Result<(), UsageError> {
        let extractor = RunPattern::new(pattern)?;
        for file in files {
            let run = extractor.extract(file.as_ref())?;
            self.push(run);
        }
        Ok(())
    }

    fn push(&mut self, run: u32) {
        if self.range.as_ref().is_some_and(|r| r.contains(&run)) {
            return;
        }
        if self.seen.insert(run) {
            self.extra.push(run);
        }
    }

    pub fn len(&self) -> usize {
        let ranged = self
            .range
            .as_ref()
            .map_or(0, |r| (*r.end() - *r.start()) as usize + 1);
        ranged + self.extra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.range
            .clone()
            .into_iter()
            .flatten()
            .chain(self.extra.iter().copied())
    }
}

impl FromIterator<u32> for RunSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = Self::new();
        for run in iter {
            set.push(run);
        }
        set
    }
}

/// Compiled file-name pattern. Capture group 1 holds the run number.
pub struct RunPattern {
    regex: Regex,
}

impl RunPattern {
    pub fn new(pattern: &str) -> Result<Self, UsageError> {
        let regex = Regex::new(pattern).map_err(|e| UsageError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        if regex.captures_len() < 2 {
            return Err(UsageError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern needs a capture group for the run number".to_string(),
            });
        }
        Ok(Self { regex })
    }

    /// Pull the run number out of a file name (or path)
    pub fn extract(&self, file: &str) -> Result<u32, UsageError> {
        let digits = self
            .regex
            .captures(file)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| UsageError::NoRunInFileName {
                file: file.to_string(),
                pattern: self.regex.as_str().to_string(),
            })?
            .as_str();
        parse_run_number(digits)
    }
}

/// Parse a positive run number
pub fn parse_run_number(s: &str) -> Result<u32, UsageError> {
    match s.trim().parse::<u32>() {
        Ok(run) if run > 0 => Ok(run),
        _ => Err(UsageError::InvalidRunNumber(s.to_string())),
    }
}
