//! Parsing `git stash list` output into [`Stash`] records.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::Stash;

fn stash_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // stash@{N}: [WIP on <branch>: | On <branch>: ]<description>
        Regex::new(r"^stash@\{(\d+)\}: (?:.*?: )?(.*)$").expect("stash line regex is valid")
    })
}

/// Parse the stdout of `git stash list`.
///
/// Blank lines and lines that do not look like a stash entry are skipped.
#[must_use]
pub fn parse_stash_list(stdout: &str) -> Vec<Stash> {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let caps = stash_line().captures(line)?;
            Some(Stash {
                id: caps[1].to_string(),
                description: caps[2].to_string(),
            })
        })
        .collect()
}
