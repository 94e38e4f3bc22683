//! Typed form submissions
//!
//! A dimension page posts a flat bag of form fields. Most keys are option
//! codes (checkbox names); a handful are reserved and carry the directive,
//! the range boundaries, or navigation hints. Parsing separates the two so
//! reserved keys can never leak into the option set.

use std::str::FromStr;

use filter_types::OptionSet;

use crate::error::{FilterError, RangeError, Result};
use crate::range::{AgeRange, RangeSelection, TimeRange};
use crate::reconcile::BulkAction;

pub const SELECTION_KEY: &str = "selection";
pub const ADD_ALL_KEY: &str = "add-all";
pub const REMOVE_ALL_KEY: &str = "remove-all";
pub const SAVE_AND_RETURN_KEY: &str = "save-and-return";
pub const QUERY_KEY: &str = "q";
pub const REDIRECT_PREFIX: &str = "redirect:";

/// Dimensions whose range fields are calendar months / ages
pub const TIME_DIMENSION: &str = "time";
pub const AGE_DIMENSION: &str = "age";

/// Coarse intent chosen on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Every option the catalog knows
    All,
    /// Everything between two boundaries
    Range,
    /// A single month (`month` / `year` fields)
    Single,
    /// Exactly the ticked checkboxes
    List,
    /// Only the newest time period
    Latest,
}

impl FromStr for Directive {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "range" => Ok(Self::Range),
            "single" => Ok(Self::Single),
            "list" => Ok(Self::List),
            "latest" => Ok(Self::Latest),
            other => Err(FilterError::InvalidSubmission(format!(
                "unknown selection '{other}'"
            ))),
        }
    }
}

/// Raw boundary fields; validated only when a range is requested
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeFields {
    pub youngest: Option<String>,
    pub oldest: Option<String>,
    pub start_month: Option<String>,
    pub start_year: Option<String>,
    pub end_month: Option<String>,
    pub end_year: Option<String>,
    pub month: Option<String>,
    pub year: Option<String>,
}

impl RangeFields {
    /// Store `value` if `key` names a boundary field of `dimension`.
    /// Dimensions without a range keep these keys as option codes.
    fn accept(&mut self, dimension: &str, key: &str, value: &str) -> bool {
        let slot = match (dimension, key) {
            (AGE_DIMENSION, "youngest") => &mut self.youngest,
            (AGE_DIMENSION, "oldest") => &mut self.oldest,
            (TIME_DIMENSION, "start-month") => &mut self.start_month,
            (TIME_DIMENSION, "start-year") => &mut self.start_year,
            (TIME_DIMENSION, "end-month") => &mut self.end_month,
            (TIME_DIMENSION, "end-year") => &mut self.end_year,
            (TIME_DIMENSION, "month") => &mut self.month,
            (TIME_DIMENSION, "year") => &mut self.year,
            _ => return false,
        };
        *slot = Some(value.to_string());
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub directive: Option<Directive>,
    pub bulk: BulkAction,
    pub range: RangeFields,
    pub save_and_return: bool,
    /// Target carried in a `redirect:<target>` key
    pub redirect: Option<String>,
    pub query: Option<String>,
    /// Every key that is not reserved
    pub options: OptionSet,
}

impl Submission {
    /// Parse the posted fields for `dimension`.
    ///
    /// The directive is read from `{dimension}-selection`, falling back to
    /// `selection`. Keys are matched exactly; everything left over is an
    /// option code. Empty keys are ignored.
    pub fn from_pairs<I, K, V>(dimension: &str, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let scoped_selection_key = format!("{dimension}-{SELECTION_KEY}");
        let mut submission = Submission::default();
        let mut scoped_directive = None;
        let mut plain_directive = None;

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            if key.is_empty() {
                continue;
            }

            if key == scoped_selection_key {
                scoped_directive = Some(value.parse::<Directive>()?);
            } else if key == SELECTION_KEY {
                plain_directive = Some(value.parse::<Directive>()?);
            } else if key == ADD_ALL_KEY {
                submission.bulk = BulkAction::AddAll;
            } else if key == REMOVE_ALL_KEY {
                submission.bulk = BulkAction::RemoveAll;
            } else if key == SAVE_AND_RETURN_KEY {
                submission.save_and_return = true;
            } else if key == QUERY_KEY {
                let query = value.trim();
                submission.query = (!query.is_empty()).then(|| query.to_string());
            } else if let Some(target) = key.strip_prefix(REDIRECT_PREFIX) {
                if !target.is_empty() {
                    submission.redirect = Some(target.to_string());
                }
            } else if !submission.range.accept(dimension, key, value) {
                submission.options.insert(key);
            }
        }

        submission.directive = scoped_directive.or(plain_directive);
        Ok(submission)
    }

    /// Build the range the boundary fields describe.
    ///
    /// Time and age dimensions have their own boundary fields; any other
    /// dimension cannot take a range.
    pub fn range_selection(&self, dimension: &str) -> Result<RangeSelection> {
        let field = |v: &Option<String>| v.clone().unwrap_or_default();
        let r = &self.range;

        match (dimension, self.directive) {
            (TIME_DIMENSION, Some(Directive::Single)) => {
                let range = TimeRange::from_fields(
                    &field(&r.month),
                    &field(&r.year),
                    &field(&r.month),
                    &field(&r.year),
                )?;
                if range.start.is_none() {
                    return Err(RangeError::Unparsable {
                        field: "month",
                        value: format!("{} {}", field(&r.month), field(&r.year)),
                    }
                    .into());
                }
                Ok(RangeSelection::Time(range))
            }
            (TIME_DIMENSION, _) => Ok(RangeSelection::Time(TimeRange::from_fields(
                &field(&r.start_month),
                &field(&r.start_year),
                &field(&r.end_month),
                &field(&r.end_year),
            )?)),
            (AGE_DIMENSION, _) => Ok(RangeSelection::Age(AgeRange::parse(
                &field(&r.youngest),
                &field(&r.oldest),
            )?)),
            (other, _) => Err(FilterError::InvalidSubmission(format!(
                "dimension '{other}' does not accept a range"
            ))),
        }
    }
}
