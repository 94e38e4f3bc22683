//! Month-year option codes
//!
//! Time dimensions code their options as a three-letter month and a
//! two-digit year (`Jan-00`). Codes decode to a [`MonthYear`] whose
//! ordering is calendar order, and encode back to the identical code.
//! Two-digit years pivot at 70: `00` to `69` are 2000 to 2069, `70` to
//! `99` are 1970 to 1999.

use chrono::{Datelike, Month, NaiveDate};
use std::fmt;
use std::str::FromStr;

use crate::error::RangeError;

const CODE_FORMAT: &str = "%b-%y";
const LABEL_FORMAT: &str = "%B %Y";
const CENTURY_PIVOT: i32 = 70;

/// A calendar month. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthYear(NaiveDate);

impl MonthYear {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Build from form fields, e.g. `("January", "2000")` or `("jan", "2000")`.
    /// A numeric month (`"1"`..`"12"`) is accepted too.
    pub fn from_parts(month: &str, year: &str) -> Result<Self, RangeError> {
        let month = month.trim();
        let year_value: i32 = year.trim().parse().map_err(|_| RangeError::Unparsable {
            field: "year",
            value: year.to_string(),
        })?;

        let number = match month.parse::<u32>() {
            Ok(number) => Some(number),
            Err(_) => Month::from_str(month).ok().map(|m| m.number_from_month()),
        };

        number
            .and_then(|n| Self::new(year_value, n))
            .ok_or_else(|| RangeError::Unparsable {
                field: "month",
                value: month.to_string(),
            })
    }
}

impl fmt::Display for MonthYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&label(*self))
    }
}

/// `Jan-00` → January 2000. Rejects anything that would not re-encode to
/// the same code (`jan-00`, `January-00`).
pub fn decode(code: &str) -> Result<MonthYear, RangeError> {
    let unparsable = || RangeError::Unparsable {
        field: "code",
        value: code.to_string(),
    };

    let (month, year) = code.split_once('-').ok_or_else(unparsable)?;
    if year.len() != 2 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return Err(unparsable());
    }
    let short_year: i32 = year.parse().map_err(|_| unparsable())?;
    let full_year = if short_year < CENTURY_PIVOT {
        2000 + short_year
    } else {
        1900 + short_year
    };

    let month = Month::from_str(month).map_err(|_| unparsable())?;
    let value = MonthYear::new(full_year, month.number_from_month()).ok_or_else(unparsable)?;

    if encode(value) != code {
        return Err(unparsable());
    }
    Ok(value)
}

pub fn encode(value: MonthYear) -> String {
    value.0.format(CODE_FORMAT).to_string()
}

/// `January 2000`
pub fn label(value: MonthYear) -> String {
    value.0.format(LABEL_FORMAT).to_string()
}

/// Sort in place, ascending by calendar time
pub fn sort(values: &mut [MonthYear]) {
    values.sort_unstable();
}

/// Decode every code and return them in calendar order.
/// Codes that are not month-year codes are dropped with a warning.
pub fn sort_codes<'a, I>(codes: I) -> Vec<(MonthYear, String)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut decoded: Vec<(MonthYear, String)> = codes
        .into_iter()
        .filter_map(|code| match decode(code) {
            Ok(value) => Some((value, code.to_string())),
            Err(e) => {
                tracing::warn!(code, error = %e, "skipping time option that is not a month-year code");
                None
            }
        })
        .collect();
    decoded.sort_by(|a, b| a.0.cmp(&b.0));
    decoded.dedup_by(|a, b| a.0 == b.0);
    decoded
}

/// Chronologically newest code
pub fn latest<'a, I>(codes: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    sort_codes(codes).pop().map(|(_, code)| code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_and_label() {
        let value = decode("Jan-00").unwrap();
        assert_eq!(value.year(), 2000);
        assert_eq!(value.month(), 1);
        assert_eq!(label(value), "January 2000");
    }

    #[test]
    fn test_two_digit_year_pivot() {
        assert_eq!(decode("Dec-69").unwrap().year(), 2069);
        assert_eq!(decode("Jan-70").unwrap().year(), 1970);
        assert_eq!(decode("Mar-96").unwrap().year(), 1996);
    }

    #[test]
    fn test_decode_rejects_non_canonical_codes() {
        assert!(decode("jan-00").is_err());
        assert!(decode("January-00").is_err());
        assert!(decode("Jan-2000").is_err());
        assert!(decode("Foo-00").is_err());
        assert!(decode("").is_err());
    }

    #[test]
    fn test_from_parts() {
        let expected = MonthYear::new(2018, 3).unwrap();
        assert_eq!(MonthYear::from_parts("March", "2018").unwrap(), expected);
        assert_eq!(MonthYear::from_parts("mar", "2018").unwrap(), expected);
        assert_eq!(MonthYear::from_parts("3", "2018").unwrap(), expected);
        assert!(MonthYear::from_parts("13", "2018").is_err());
        assert!(MonthYear::from_parts("March", "twenty").is_err());
    }

    #[test]
    fn test_sort_codes_is_chronological() {
        let sorted: Vec<String> = sort_codes(["Mar-00", "Jan-99", "Feb-00", "bogus", "Jan-00"])
            .into_iter()
            .map(|(_, c)| c)
            .collect();
        assert_eq!(sorted, vec!["Jan-99", "Jan-00", "Feb-00", "Mar-00"]);
    }

    #[test]
    fn test_latest() {
        assert_eq!(latest(["Jan-00", "Dec-99", "Feb-00"]), Some("Feb-00".into()));
        assert_eq!(latest(std::iter::empty()), None);
    }

    fn month_year() -> impl Strategy<Value = MonthYear> {
        (1970i32..=2069, 1u32..=12).prop_map(|(y, m)| MonthYear::new(y, m).unwrap())
    }

    proptest! {
        #[test]
        fn prop_decode_encode_round_trip(value in month_year()) {
            prop_assert_eq!(decode(&encode(value)).unwrap(), value);
        }

        #[test]
        fn prop_encode_decode_round_trip(value in month_year()) {
            let code = encode(value);
            prop_assert_eq!(encode(decode(&code).unwrap()), code);
        }

        #[test]
        fn prop_sort_is_chronological_and_stable(mut values in proptest::collection::vec(month_year(), 0..40)) {
            sort(&mut values);
            for pair in values.windows(2) {
                prop_assert!((pair[0].year(), pair[0].month()) <= (pair[1].year(), pair[1].month()));
            }
            let once = values.clone();
            sort(&mut values);
            prop_assert_eq!(once, values);
        }
    }
}
