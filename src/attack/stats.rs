use crate::error::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Appends one trial result to `path`: the number of faulty signatures the
/// trial needed, or `-1` if it gave up.
pub fn append_count(path: &Path, count: Option<usize>) -> Result<()> {
    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    match count {
        Some(count) => writeln!(file, "{count}")?,
        None => writeln!(file, "-1")?,
    }
    Ok(())
}

/// Reads back a file written by [`append_count`].
pub fn read_counts(path: &Path) -> Result<Vec<Option<usize>>> {
    fs::read_to_string(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| match line.trim() {
            "-1" => Ok(None),
            value => value
                .parse::<usize>()
                .map(Some)
                .map_err(|e| Error::Io(format!("bad count '{value}': {e}"))),
        })
        .collect()
}

/// Mean over the successful trials.
pub fn mean_of_successes(counts: &[Option<usize>]) -> Option<f64> {
    let successes: Vec<usize> = counts.iter().flatten().copied().collect();
    if successes.is_empty() {
        return None;
    }
    Some(successes.iter().sum::<usize>() as f64 / successes.len() as f64)
}
