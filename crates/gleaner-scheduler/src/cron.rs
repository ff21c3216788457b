//! Five-field cron expressions: `minute hour day-of-month month weekday`.
//!
//! Each field is one of `*`, `*/N`, a comma list, an inclusive range `a-b`
//! or a bare integer. Weekday counts from Monday = 0 to Sunday = 6.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Timelike};
use gleaner_core::{error::CronFieldError, ValidationError};

/// One parsed cron field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CronField {
    Any,
    /// `*/N`: values divisible by N.
    Step(u32),
    List(Vec<u32>),
    /// Inclusive on both ends.
    Range(u32, u32),
    Exact(u32),
}

impl CronField {
    pub fn matches(&self, value: u32) -> bool {
        match self {
            CronField::Any => true,
            CronField::Step(n) => value % n == 0,
            CronField::List(values) => values.contains(&value),
            CronField::Range(lo, hi) => (*lo..=*hi).contains(&value),
            CronField::Exact(v) => *v == value,
        }
    }
}

struct FieldSpec {
    label: &'static str,
    min: u32,
    max: u32,
}

const FIELDS: [FieldSpec; 5] = [
    FieldSpec { label: "minute (0-59)", min: 0, max: 59 },
    FieldSpec { label: "hour (0-23)", min: 0, max: 23 },
    FieldSpec { label: "day of month (1-31)", min: 1, max: 31 },
    FieldSpec { label: "month (1-12)", min: 1, max: 12 },
    FieldSpec { label: "weekday (0-6, 0=Monday)", min: 0, max: 6 },
];

/// A validated cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    minute: CronField,
    hour: CronField,
    day: CronField,
    month: CronField,
    weekday: CronField,
    source: String,
}

impl CronExpr {
    /// Parse and validate `expr`, reporting every bad field at once.
    pub fn parse(expr: &str) -> Result<Self, ValidationError> {
        let raw: Vec<&str> = expr.split_whitespace().collect();
        if raw.len() != FIELDS.len() {
            return Err(ValidationError::CronFieldCount { found: raw.len() });
        }

        let mut fields = Vec::with_capacity(FIELDS.len());
        let mut errors = Vec::new();
        for (text, spec) in raw.iter().zip(FIELDS.iter()) {
            match parse_field(text, spec) {
                Ok(field) => fields.push(field),
                Err(reason) => errors.push(CronFieldError {
                    field: spec.label,
                    value: text.to_string(),
                    reason,
                }),
            }
        }
        if !errors.is_empty() {
            return Err(ValidationError::CronFields(errors));
        }

        let mut fields = fields.into_iter();
        let mut next = || fields.next().unwrap_or(CronField::Any);
        Ok(Self {
            minute: next(),
            hour: next(),
            day: next(),
            month: next(),
            weekday: next(),
            source: raw.join(" "),
        })
    }

    /// Whether every field matches `at` (already in the schedule's zone).
    pub fn matches<T: Datelike + Timelike>(&self, at: &T) -> bool {
        self.minute.matches(at.minute())
            && self.hour.matches(at.hour())
            && self.day.matches(at.day())
            && self.month.matches(at.month())
            && self.weekday.matches(at.weekday().num_days_from_monday())
    }

    /// The expression with whitespace normalised to single spaces.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for CronExpr {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Creation-time validator. Same rules as [`CronExpr::parse`].
pub fn validate_cron(expr: &str) -> Result<CronExpr, ValidationError> {
    CronExpr::parse(expr)
}

fn parse_field(text: &str, spec: &FieldSpec) -> Result<CronField, String> {
    if text == "*" {
        return Ok(CronField::Any);
    }
    if let Some(step) = text.strip_prefix("*/") {
        let n = parse_number(step)?;
        if n == 0 {
            return Err("step must be at least 1".into());
        }
        return Ok(CronField::Step(n));
    }
    if text.contains(',') {
        let values = text
            .split(',')
            .map(|part| parse_bounded(part, spec))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(CronField::List(values));
    }
    if let Some((lo, hi)) = text.split_once('-') {
        let lo = parse_bounded(lo, spec)?;
        let hi = parse_bounded(hi, spec)?;
        if lo > hi {
            return Err("range start is after range end".into());
        }
        return Ok(CronField::Range(lo, hi));
    }
    parse_bounded(text, spec).map(CronField::Exact)
}

fn parse_number(text: &str) -> Result<u32, String> {
    text.parse::<u32>()
        .map_err(|_| "expected *, */N, a list, a range or a number".to_string())
}

fn parse_bounded(text: &str, spec: &FieldSpec) -> Result<u32, String> {
    let n = parse_number(text)?;
    if n < spec.min || n > spec.max {
        return Err(format!("value {n} out of range"));
    }
    Ok(n)
}

/// A ready-made expression shown to users picking a schedule.
#[derive(Debug, Clone, Copy)]
pub struct CronExample {
    pub label: &'static str,
    pub expr: &'static str,
}

pub const CRON_EXAMPLES: &[CronExample] = &[
    CronExample { label: "Daily at 07:00", expr: "0 7 * * *" },
    CronExample { label: "Daily at 19:00", expr: "0 19 * * *" },
    CronExample { label: "Mon, Wed and Fri at 08:00", expr: "0 8 * * 0,2,4" },
    CronExample { label: "Every 2 hours", expr: "0 */2 * * *" },
    CronExample { label: "Every 30 minutes", expr: "*/30 * * * *" },
    CronExample { label: "Saturdays at 10:00", expr: "0 10 * * 5" },
    CronExample { label: "Mondays in the first week at 09:00", expr: "0 9 1-7 * 0" },
];
