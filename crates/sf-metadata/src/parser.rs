//! Season and episode numbers from TV episode file names.

use std::sync::LazyLock;

use regex::Regex;

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\[(]?((?:19[0-9]|20[01])[0-9])[\])]?)").expect("valid regex"));
static SEASON_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)[Ss](\d{1,2})[Ee](\d{1,2})").expect("valid regex"));
static SEASON_X_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)(\d{1,2})x(\d{1,2})").expect("valid regex"));
static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[._\s]+").expect("valid regex"));

/// What could be read from an episode file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSeriesInfo {
    pub title: String,
    pub year: Option<u32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl ParsedSeriesInfo {
    /// Season and episode, when both were found and are non-zero.
    pub fn numbers(&self) -> Option<(u32, u32)> {
        match (self.season, self.episode) {
            (Some(s), Some(e)) if s > 0 && e > 0 => Some((s, e)),
            _ => None,
        }
    }
}

/// Parse a file name without extension, e.g. `Show.Name.(2019).S01E02.720p`.
///
/// Supports `SxxEyy` and, failing that, `NxMM`. A release year in the range
/// 1900..=2019, optionally bracketed, is extracted and removed from the
/// title first.
pub fn parse_series_name(name: &str) -> ParsedSeriesInfo {
    let mut info = ParsedSeriesInfo::default();
    let mut rest = name.to_string();

    if let Some(caps) = YEAR.captures(name) {
        info.year = caps[2].parse().ok();
        rest = rest.replace(&caps[1], "");
    }

    let caps = SEASON_EPISODE
        .captures(&rest)
        .or_else(|| SEASON_X_EPISODE.captures(&rest));
    match caps {
        Some(caps) => {
            info.season = caps[2].parse().ok();
            info.episode = caps[3].parse().ok();
            info.title = sanitize(&caps[1]);
        }
        None => info.title = sanitize(&rest),
    }

    tracing::debug!(
        name,
        title = %info.title,
        year = ?info.year,
        season = ?info.season,
        episode = ?info.episode,
        "Parsed episode file name"
    );
    info
}

/// Turn a release-style title into a search query.
pub fn sanitize(title: &str) -> String {
    SEPARATORS
        .replace_all(title, " ")
        .trim_matches(|c: char| c.is_whitespace() || c == '-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_season_episode() {
        let info = parse_series_name("Show.Name.S01E02.720p.WEB-DL");
        assert_eq!(info.title, "Show Name");
        assert_eq!(info.numbers(), Some((1, 2)));
        assert_eq!(info.year, None);
    }

    #[test]
    fn lowercase_markers() {
        let info = parse_series_name("the_expanse_s03e10");
        assert_eq!(info.title, "the expanse");
        assert_eq!(info.numbers(), Some((3, 10)));
    }

    #[test]
    fn season_x_episode_fallback() {
        let info = parse_series_name("Show Name 1x02");
        assert_eq!(info.title, "Show Name");
        assert_eq!(info.numbers(), Some((1, 2)));
    }

    #[test]
    fn year_is_extracted_and_removed() {
        let info = parse_series_name("Doctor Who (2005) - S02E03");
        assert_eq!(info.year, Some(2005));
        assert_eq!(info.title, "Doctor Who");
        assert_eq!(info.numbers(), Some((2, 3)));

        let info = parse_series_name("Dark.2019.S01E01");
        assert_eq!(info.year, Some(2019));
        assert_eq!(info.title, "Dark");
    }

    #[test]
    fn no_numbers() {
        let info = parse_series_name("Some.Documentary");
        assert_eq!(info.title, "Some Documentary");
        assert_eq!(info.numbers(), None);
    }

    #[test]
    fn zero_numbers_are_unusable() {
        let info = parse_series_name("Show.S00E01");
        assert_eq!(info.season, Some(0));
        assert_eq!(info.numbers(), None);
    }
}
