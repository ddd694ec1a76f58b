use chrono::{
  DateTime,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;

pub const TIMEZONE_ENV_VAR: &str =
  "LIFELINE_TIMEZONE";

/// Picks the zone used for calendar
/// arithmetic: env var, then the
/// configured value, then the system
/// zone, then UTC.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "rc:timezone")
  {
    return tz;
  }

  match iana_time_zone::get_timezone() {
    | Ok(name) => {
      if let Some(tz) =
        parse_timezone(&name, "system")
      {
        return tz;
      }
    }
    | Err(err) => {
      tracing::warn!(
        error = %err,
        "failed to detect system \
         timezone"
      );
    }
  }

  tracing::warn!(
    "no usable timezone configured; \
     using UTC"
  );
  chrono_tz::UTC
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "resolved timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[must_use]
pub fn local_date(
  dt: DateTime<Utc>,
  tz: &Tz
) -> NaiveDate {
  dt.with_timezone(tz).date_naive()
}

#[must_use]
pub fn format_local(
  dt: DateTime<Utc>,
  tz: &Tz,
  fmt: &str
) -> String {
  dt.with_timezone(tz)
    .format(fmt)
    .to_string()
}

/// First instant of `date` in `tz`.
///
/// Ambiguous midnights take the
/// earlier instant. Midnights that fall
/// in a DST gap move forward to the
/// first local time that exists.
#[must_use]
pub fn local_midnight(
  date: NaiveDate,
  tz: &Tz
) -> DateTime<Utc> {
  let midnight = date
    .and_hms_opt(0, 0, 0)
    .unwrap_or(NaiveDateTime::MIN);

  for step in 0..=4 {
    let candidate = midnight
      + Duration::minutes(30 * step);
    match tz
      .from_local_datetime(&candidate)
    {
      | LocalResult::Single(local) => {
        return local
          .with_timezone(&Utc);
      }
      | LocalResult::Ambiguous(
        first,
        second
      ) => {
        let chosen = if first <= second
        {
          first
        } else {
          second
        };
        return chosen
          .with_timezone(&Utc);
      }
      | LocalResult::None => {
        tracing::trace!(
          date = %date,
          step,
          "local midnight skipped by \
           DST; advancing"
        );
      }
    }
  }

  tracing::warn!(
    date = %date,
    timezone = %tz,
    "no local instant found near \
     midnight; treating as UTC"
  );
  midnight.and_utc()
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    format_local,
    local_midnight
  };

  #[test]
  fn midnight_in_utc_is_identity() {
    let date =
      NaiveDate::from_ymd_opt(
        2024, 1, 2
      )
      .expect("valid date");
    assert_eq!(
      local_midnight(
        date,
        &chrono_tz::UTC
      ),
      Utc
        .with_ymd_and_hms(
          2024, 1, 2, 0, 0, 0
        )
        .single()
        .expect("valid instant")
    );
  }

  #[test]
  fn midnight_respects_offset() {
    let date =
      NaiveDate::from_ymd_opt(
        2024, 7, 1
      )
      .expect("valid date");
    let tz = chrono_tz::Europe::Berlin;
    let start =
      local_midnight(date, &tz);
    assert_eq!(
      start,
      Utc
        .with_ymd_and_hms(
          2024, 6, 30, 22, 0, 0
        )
        .single()
        .expect("valid instant")
    );
    assert_eq!(
      format_local(
        start, &tz, "%Y-%m-%d %H:%M"
      ),
      "2024-07-01 00:00"
    );
  }

  #[test]
  fn midnight_in_dst_gap_moves_forward()
   {
    // Santiago springs forward at
    // local midnight.
    let date =
      NaiveDate::from_ymd_opt(
        2023, 9, 3
      )
      .expect("valid date");
    let tz =
      chrono_tz::America::Santiago;
    let start =
      local_midnight(date, &tz);
    assert_eq!(
      format_local(
        start, &tz, "%Y-%m-%d %H:%M"
      ),
      "2023-09-03 01:00"
    );
  }

  #[test]
  fn ambiguous_midnight_takes_earlier_instant()
   {
    // Havana falls back from 01:00
    // CDT to 00:00 CST, so midnight
    // happens twice.
    let date =
      NaiveDate::from_ymd_opt(
        2023, 11, 5
      )
      .expect("valid date");
    let tz = chrono_tz::America::Havana;
    assert_eq!(
      local_midnight(date, &tz),
      Utc
        .with_ymd_and_hms(
          2023, 11, 5, 4, 0, 0
        )
        .single()
        .expect("valid instant")
    );
  }
}
