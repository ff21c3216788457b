use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use gleaner_core::{Schedule, ValidationError};
use tracing::warn;

use crate::cron::CronExpr;

/// Resolve an IANA zone name such as `America/Sao_Paulo`.
pub fn parse_timezone(name: &str) -> Result<Tz, ValidationError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ValidationError::UnknownTimezone(name.to_string()))
}

/// Whether `schedule` should fire at `now`, given the job's last attempt.
///
/// A schedule that no longer validates (unknown zone, bad cron) is never due.
pub fn is_due(schedule: &Schedule, last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    let tz = match parse_timezone(schedule.timezone()) {
        Ok(tz) => tz,
        Err(e) => {
            warn!(error = %e, "schedule not evaluable");
            return false;
        }
    };

    match schedule {
        Schedule::Once { run_at, .. } => last_run.is_none() && now >= *run_at,
        Schedule::Recurring { cron, .. } => {
            let expr = match CronExpr::parse(cron) {
                Ok(expr) => expr,
                Err(e) => {
                    warn!(%cron, error = %e, "cron expression not evaluable");
                    return false;
                }
            };
            let local_now = now.with_timezone(&tz);
            if !expr.matches(&local_now) {
                return false;
            }
            match last_run {
                Some(last) => !same_minute(&last.with_timezone(&tz), &local_now),
                None => true,
            }
        }
    }
}

fn same_minute(a: &DateTime<Tz>, b: &DateTime<Tz>) -> bool {
    a.date_naive() == b.date_naive() && a.hour() == b.hour() && a.minute() == b.minute()
}

/// Check a schedule before it is persisted and return its canonical form.
pub fn validate_schedule(schedule: &Schedule) -> Result<Schedule, ValidationError> {
    let tz = parse_timezone(schedule.timezone())?;
    match schedule {
        Schedule::Once { run_at, .. } => Ok(Schedule::Once {
            run_at: *run_at,
            timezone: tz.name().to_string(),
        }),
        Schedule::Recurring { cron, .. } => {
            if cron.trim().is_empty() {
                return Err(ValidationError::MissingField("cron"));
            }
            let expr = CronExpr::parse(cron)?;
            Ok(Schedule::Recurring {
                cron: expr.to_string(),
                timezone: tz.name().to_string(),
            })
        }
    }
}

/// A one-shot schedule for a wall-clock time in `timezone`.
///
/// An ambiguous local time (clocks going back) resolves to the earlier
/// instant; a skipped one (clocks going forward) is rejected.
pub fn once_local(local: NaiveDateTime, timezone: &str) -> Result<Schedule, ValidationError> {
    let tz = parse_timezone(timezone)?;
    let run_at = match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            return Err(ValidationError::NonexistentLocalTime {
                time: local.to_string(),
                timezone: tz.name().to_string(),
            })
        }
    };
    Ok(Schedule::Once {
        run_at,
        timezone: tz.name().to_string(),
    })
}

/// A validated recurring schedule.
pub fn recurring(cron: &str, timezone: &str) -> Result<Schedule, ValidationError> {
    validate_schedule(&Schedule::Recurring {
        cron: cron.to_string(),
        timezone: timezone.to_string(),
    })
}
