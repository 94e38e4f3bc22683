//! Range expansion
//!
//! Turns a semantic range (two month/year pairs, or a youngest/oldest age
//! pair) into the ordered option codes it covers, drawn from the codes the
//! dimension actually has. Both ends are inclusive.

use filter_types::DimensionOption;

use crate::codec::{self, MonthYear};
use crate::error::RangeError;

/// Form value meaning "no boundary chosen, use the earliest/latest known value"
pub const SELECT_SENTINEL: &str = "select";

/// Trailing marker on open-ended age codes (`90+`)
pub const OPEN_ENDED_MARKER: char = '+';

/// A submitted range, before expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSelection {
    Time(TimeRange),
    Age(AgeRange),
}

impl RangeSelection {
    /// Expand against the dimension's known options
    pub fn expand(&self, options: &[DimensionOption]) -> Result<Vec<String>, RangeError> {
        let codes = options.iter().map(|o| o.code.as_str());
        match self {
            RangeSelection::Time(range) => expand_time(codes, range),
            RangeSelection::Age(range) => expand_age(codes, range),
        }
    }
}

// ============================================================================
// TIME
// ============================================================================

/// `None` on either side means the sentinel was submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<MonthYear>,
    pub end: Option<MonthYear>,
}

impl TimeRange {
    pub fn new(start: Option<MonthYear>, end: Option<MonthYear>) -> Self {
        Self { start, end }
    }

    /// Build from the four form fields. Either field of a pair set to
    /// [`SELECT_SENTINEL`] (or left empty) leaves that boundary open.
    pub fn from_fields(
        start_month: &str,
        start_year: &str,
        end_month: &str,
        end_year: &str,
    ) -> Result<Self, RangeError> {
        let range = Self {
            start: boundary(start_month, start_year)?,
            end: boundary(end_month, end_year)?,
        };
        if let (Some(start), Some(end)) = (range.start, range.end) {
            if end < start {
                return Err(RangeError::Inverted {
                    start: codec::encode(start),
                    end: codec::encode(end),
                });
            }
        }
        Ok(range)
    }
}

fn boundary(month: &str, year: &str) -> Result<Option<MonthYear>, RangeError> {
    let is_open = |v: &str| v.trim().is_empty() || v.trim().eq_ignore_ascii_case(SELECT_SENTINEL);
    if is_open(month) || is_open(year) {
        return Ok(None);
    }
    MonthYear::from_parts(month, year).map(Some)
}

/// Select every known code whose month lies in `[start, end]`, ascending.
///
/// Open boundaries resolve to the earliest/latest known month, so a
/// catalog with no month-year codes is [`RangeError::EmptyCatalog`].
pub fn expand_time<'a, I>(codes: I, range: &TimeRange) -> Result<Vec<String>, RangeError>
where
    I: IntoIterator<Item = &'a str>,
{
    let sorted = codec::sort_codes(codes);
    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return Err(RangeError::EmptyCatalog);
    };

    let start = range.start.unwrap_or(first.0);
    let end = range.end.unwrap_or(last.0);
    if end < start {
        return Err(RangeError::Inverted {
            start: codec::encode(start),
            end: codec::encode(end),
        });
    }

    Ok(sorted
        .into_iter()
        .filter(|(value, _)| *value >= start && *value <= end)
        .map(|(_, code)| code)
        .collect())
}

// ============================================================================
// AGE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub youngest: u32,
    pub oldest: u32,
    /// `oldest` was submitted as `N+`. Inclusion still stops at `N`; the
    /// catalog's own `N+` code carries the marker.
    pub oldest_open_ended: bool,
}

impl AgeRange {
    pub fn parse(youngest: &str, oldest: &str) -> Result<Self, RangeError> {
        let (young, _) = parse_age(youngest).ok_or_else(|| RangeError::Unparsable {
            field: "youngest",
            value: youngest.to_string(),
        })?;
        let (old, open) = parse_age(oldest).ok_or_else(|| RangeError::Unparsable {
            field: "oldest",
            value: oldest.to_string(),
        })?;

        if old < young {
            return Err(RangeError::Inverted {
                start: youngest.to_string(),
                end: oldest.to_string(),
            });
        }

        Ok(Self {
            youngest: young,
            oldest: old,
            oldest_open_ended: open,
        })
    }

    fn contains(&self, age: u32) -> bool {
        age >= self.youngest && age <= self.oldest
    }
}

/// `"42"` → (42, false), `"90+"` → (90, true)
fn parse_age(value: &str) -> Option<(u32, bool)> {
    let value = value.trim();
    match value.strip_suffix(OPEN_ENDED_MARKER) {
        Some(prefix) => prefix.parse().ok().map(|n| (n, true)),
        None => value.parse().ok().map(|n| (n, false)),
    }
}

/// Select every known age code within the range, ascending.
///
/// Open-ended codes compare as their numeric prefix and are emitted exactly
/// as the catalog spells them, so every emitted code is a known code.
/// Codes that are not ages are skipped with a warning.
pub fn expand_age<'a, I>(codes: I, range: &AgeRange) -> Result<Vec<String>, RangeError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut ages: Vec<(u32, bool, &str)> = codes
        .into_iter()
        .filter_map(|code| match parse_age(code) {
            Some((age, open)) => Some((age, open, code)),
            None => {
                tracing::warn!(code, "skipping age option that is not numeric");
                None
            }
        })
        .filter(|(age, _, _)| range.contains(*age))
        .collect();
    ages.sort_unstable();
    ages.dedup_by(|a, b| a.2 == b.2);

    let last = ages.len().saturating_sub(1);
    Ok(ages
        .into_iter()
        .enumerate()
        .map(|(i, (age, open, code))| {
            if open && i != last {
                tracing::warn!(age, code, "open-ended age is not the oldest in range");
            }
            code.to_string()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(codes: &[&str]) -> Vec<DimensionOption> {
        codes.iter().map(|c| DimensionOption::code_only(*c)).collect()
    }

    fn month(code: &str) -> Option<MonthYear> {
        Some(codec::decode(code).unwrap())
    }

    #[test]
    fn test_time_range_inclusive_both_ends() {
        let selection = RangeSelection::Time(TimeRange::new(month("Jan-00"), month("Feb-00")));
        let codes = selection
            .expand(&options(&["Jan-00", "Feb-00", "Mar-00"]))
            .unwrap();
        assert_eq!(codes, vec!["Jan-00", "Feb-00"]);
    }

    #[test]
    fn test_time_single_point_yields_one_code() {
        let range = TimeRange::new(month("Feb-00"), month("Feb-00"));
        let codes = expand_time(["Mar-00", "Feb-00", "Jan-00"], &range).unwrap();
        assert_eq!(codes, vec!["Feb-00"]);
    }

    #[test]
    fn test_time_unordered_catalog_is_sorted() {
        let range = TimeRange::new(None, None);
        let codes = expand_time(["Mar-00", "Dec-99", "Jan-00"], &range).unwrap();
        assert_eq!(codes, vec!["Dec-99", "Jan-00", "Mar-00"]);
    }

    #[test]
    fn test_time_sentinels_use_known_extremes() {
        let range = TimeRange::from_fields("select", "select", "February", "2000").unwrap();
        let codes = expand_time(["Jan-00", "Feb-00", "Mar-00"], &range).unwrap();
        assert_eq!(codes, vec!["Jan-00", "Feb-00"]);

        let range = TimeRange::from_fields("February", "2000", "select", "2000").unwrap();
        let codes = expand_time(["Jan-00", "Feb-00", "Mar-00"], &range).unwrap();
        assert_eq!(codes, vec!["Feb-00", "Mar-00"]);
    }

    #[test]
    fn test_time_inverted_range_rejected() {
        let err = TimeRange::from_fields("March", "2000", "January", "2000").unwrap_err();
        assert_eq!(
            err,
            RangeError::Inverted {
                start: "Mar-00".into(),
                end: "Jan-00".into()
            }
        );

        let range = TimeRange::new(month("Mar-00"), month("Jan-00"));
        assert!(matches!(
            expand_time(["Jan-00", "Mar-00"], &range),
            Err(RangeError::Inverted { .. })
        ));
    }

    #[test]
    fn test_time_start_after_catalog_is_inverted_after_resolution() {
        let range = TimeRange::new(month("Jan-30"), None);
        assert!(expand_time(["Jan-00", "Feb-00"], &range).is_err());
    }

    #[test]
    fn test_time_unparsable_boundary() {
        let err = TimeRange::from_fields("Smarch", "2000", "May", "2000").unwrap_err();
        assert!(matches!(err, RangeError::Unparsable { field: "month", .. }));
    }

    #[test]
    fn test_time_empty_catalog_cannot_resolve_boundaries() {
        let range = TimeRange::new(None, None);
        assert_eq!(
            expand_time(std::iter::empty(), &range),
            Err(RangeError::EmptyCatalog)
        );

        let range = TimeRange::new(month("Jan-15"), month("Dec-16"));
        assert_eq!(
            expand_time(["2015", "2016", "2017"], &range),
            Err(RangeError::EmptyCatalog)
        );
    }

    #[test]
    fn test_age_range_keeps_open_ended_oldest() {
        let range = AgeRange::parse("18", "90+").unwrap();
        let codes = expand_age(["18", "19", "20", "90+"], &range).unwrap();
        assert_eq!(codes, vec!["18", "19", "20", "90+"]);
    }

    #[test]
    fn test_age_open_ended_compares_as_prefix() {
        let range = AgeRange::parse("19", "90").unwrap();
        let codes = expand_age(["18", "19", "20", "90+"], &range).unwrap();
        assert_eq!(codes, vec!["19", "20", "90+"]);

        let range = AgeRange::parse("18", "20").unwrap();
        let codes = expand_age(["18", "19", "20", "90+"], &range).unwrap();
        assert_eq!(codes, vec!["18", "19", "20"]);
    }

    #[test]
    fn test_age_single_point() {
        let range = AgeRange::parse("19", "19").unwrap();
        assert_eq!(expand_age(["18", "19", "20"], &range).unwrap(), vec!["19"]);
    }

    #[test]
    fn test_age_skips_non_numeric_codes() {
        let range = AgeRange::parse("0", "100").unwrap();
        let codes = expand_age(["total", "5", "10"], &range).unwrap();
        assert_eq!(codes, vec!["5", "10"]);
    }

    #[test]
    fn test_age_open_ended_code_kept_verbatim_when_not_last() {
        let range = AgeRange::parse("80", "95").unwrap();
        let codes = expand_age(["80", "85+", "95"], &range).unwrap();
        assert_eq!(codes, vec!["80", "85+", "95"]);
    }

    #[test]
    fn test_age_open_ended_oldest_still_bounds_the_range() {
        let range = AgeRange::parse("18", "20+").unwrap();
        let codes = expand_age(["18", "19", "20+", "21", "22"], &range).unwrap();
        assert_eq!(codes, vec!["18", "19", "20+"]);
    }

    #[test]
    fn test_age_parse_errors() {
        assert!(matches!(
            AgeRange::parse("old", "20"),
            Err(RangeError::Unparsable { field: "youngest", .. })
        ));
        assert!(matches!(
            AgeRange::parse("30", "20"),
            Err(RangeError::Inverted { .. })
        ));
        assert!(AgeRange::parse("18", "90+").unwrap().oldest_open_ended);
    }
}
