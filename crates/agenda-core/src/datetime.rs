use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  NaiveDate,
  NaiveTime,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

use crate::calendar::{
  checked_add_days,
  checked_shift_months,
  first_day_of_month,
  shift_months
};

const TIMEZONE_CONFIG_FILE: &str =
  "agenda-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "AGENDA_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "AGENDA_TIME_CONFIG";
const DEFAULT_PROJECT_TIMEZONE: &str =
  "Europe/Madrid";

/// Column headers of the month grid,
/// Monday first.
pub const WEEKDAY_LABELS: [&str; 7] = [
  "Lunes",
  "Martes",
  "Miércoles",
  "Jueves",
  "Viernes",
  "Sábado",
  "Domingo"
];

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Timezone used to turn the wall
/// clock into the agenda's calendar
/// dates.
pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(
    resolve_project_timezone
  )
}

#[must_use]
pub fn today() -> NaiveDate {
  to_project_date(Utc::now())
}

#[must_use]
pub fn now_time() -> NaiveTime {
  Utc::now()
    .with_timezone(project_timezone())
    .time()
}

#[must_use]
pub fn to_project_date(
  dt: DateTime<Utc>
) -> NaiveDate {
  dt.with_timezone(project_timezone())
    .date_naive()
}

fn resolve_project_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_PROJECT_TIMEZONE,
    "DEFAULT_PROJECT_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir()
    .ok()
    .map(|dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    })
}

fn load_timezone_from_file(
  path: &Path
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let parsed = fs::read_to_string(path)
    .map_err(|err| err.to_string())
    .and_then(|raw| {
      toml::from_str::<TimezoneConfig>(
        &raw
      )
      .map_err(|err| err.to_string())
    });

  let parsed = match parsed {
    | Ok(parsed) => parsed,
    | Err(error) => {
      tracing::error!(
        file = %path.display(),
        %error,
        "failed loading timezone config file"
      );
      return None;
    }
  };

  let Some(timezone) =
    parsed.timezone.or_else(|| {
      parsed
        .time
        .and_then(|section| section.timezone)
    })
  else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    &timezone,
    &format!("file:{}", path.display())
  )
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
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured project timezone"
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

/// Parses a calendar date relative to
/// `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower = token.to_lowercase();

  match lower.as_str() {
    | "hoy" | "today" => {
      return Ok(today);
    }
    | "mañana" | "manana"
    | "tomorrow" => {
      return next_day(today, 1, input);
    }
    | "ayer" | "yesterday" => {
      return next_day(today, -1, input);
    }
    | _ => {}
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    return next_day(
      today,
      days_until_weekday(today, target),
      input
    );
  }

  let rel_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwm])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let num: i64 = caps["num"]
      .parse()
      .context(
        "invalid relative number"
      )?;
    let num = if &caps["sign"] == "-" {
      -num
    } else {
      num
    };

    let shifted = match &caps["unit"] {
      | "d" => checked_add_days(today, num),
      | "w" => num
        .checked_mul(7)
        .and_then(|days| {
          checked_add_days(today, days)
        }),
      | "m" => {
        checked_shift_months(today, num)
      }
      | unit => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ));
      }
    };

    return shifted.ok_or_else(|| {
      anyhow!(
        "relative date out of range: \
         {input}"
      )
    });
  }

  for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
    if let Ok(date) =
      NaiveDate::parse_from_str(
        token, fmt
      )
    {
      return Ok(date);
    }
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(to_project_date(
      dt.with_timezone(&Utc)
    ));
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     hoy/mañana/ayer \
     (today/tomorrow/yesterday), \
     weekday names (e.g. lunes, \
     friday), +Nd/-Nd/+Nw/+Nm, \
     YYYY-MM-DD, DD/MM/YYYY, RFC3339"
  })
}

/// Resolves the month to display. The
/// result is always the 1st of that
/// month.
#[tracing::instrument(skip(displayed, today), fields(input = input))]
pub fn parse_month_expr(
  input: &str,
  displayed: NaiveDate,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let lower = input.trim().to_lowercase();

  let target = match lower.as_str() {
    | "hoy" | "today" | "actual" => {
      today
    }
    | "siguiente" | "next" | "+" => {
      shift_months(displayed, 1)
    }
    | "anterior" | "prev"
    | "previous" | "-" => {
      shift_months(displayed, -1)
    }
    | other => {
      if let Some(month) =
        parse_month_name(other)
      {
        first_day_of_month(
          displayed.year(),
          month
        )
      } else {
        parse_year_month(other)
          .or_else(|_| {
            parse_date_expr(other, today)
          })
          .with_context(|| {
            format!(
              "unrecognized month \
               expression: {input}"
            )
          })?
      }
    }
  };

  Ok(first_day_of_month(
    target.year(),
    target.month()
  ))
}

fn parse_year_month(
  token: &str
) -> anyhow::Result<NaiveDate> {
  let re = Regex::new(
    r"^(?P<year>\d{4})-(?P<month>\d{1,2})$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;
  let caps =
    re.captures(token).ok_or_else(|| {
      anyhow!("expected YYYY-MM")
    })?;
  let year: i32 = caps["year"]
    .parse()
    .context("invalid year")?;
  let month: u32 = caps["month"]
    .parse()
    .context("invalid month")?;

  NaiveDate::from_ymd_opt(year, month, 1)
    .ok_or_else(|| {
      anyhow!(
        "invalid month value: \
         {year}-{month:02}"
      )
    })
}

/// Parses a time of day such as
/// `08:00`, `7:30` or `6:15pm`.
pub fn parse_clock_time(
  token: &str
) -> anyhow::Result<NaiveTime> {
  let clock_re = Regex::new(
    r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<ampm>[ap]m)?$",
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;
  let caps = clock_re
    .captures(token.trim())
    .ok_or_else(|| {
      anyhow!(
        "expected HH:MM time, got: \
         {token}"
      )
    })?;

  let raw_hour: u32 = caps["hour"]
    .parse()
    .context("invalid hour")?;
  let minute: u32 = caps["minute"]
    .parse()
    .context("invalid minute")?;

  let hour = match caps
    .name("ampm")
    .map(|m| m.as_str().to_ascii_lowercase())
  {
    | Some(ampm) => {
      if raw_hour == 0 || raw_hour > 12 {
        return Err(anyhow!(
          "invalid 12-hour clock \
           value: {token}"
        ));
      }
      match (ampm.as_str(), raw_hour) {
        | ("am", 12) => 0,
        | ("pm", 12) => 12,
        | ("pm", h) => h + 12,
        | (_, h) => h
      }
    }
    | None => raw_hour
  };

  NaiveTime::from_hms_opt(
    hour, minute, 0
  )
  .ok_or_else(|| {
    anyhow!("invalid time: {token}")
  })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "lunes" | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "martes" | "tuesday" | "tue" => {
      Some(Weekday::Tue)
    }
    | "miércoles" | "miercoles"
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "jueves" | "thursday" | "thu" => {
      Some(Weekday::Thu)
    }
    | "viernes" | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "sábado" | "sabado"
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "domingo" | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "enero" | "ene" | "january"
    | "jan" => Some(1),
    | "febrero" | "feb"
    | "february" => Some(2),
    | "marzo" | "mar" | "march" => {
      Some(3)
    }
    | "abril" | "abr" | "april"
    | "apr" => Some(4),
    | "mayo" | "may" => Some(5),
    | "junio" | "jun" | "june" => {
      Some(6)
    }
    | "julio" | "jul" | "july" => {
      Some(7)
    }
    | "agosto" | "ago" | "august"
    | "aug" => Some(8),
    | "septiembre" | "sep"
    | "september" => Some(9),
    | "octubre" | "oct" | "october" => {
      Some(10)
    }
    | "noviembre" | "nov"
    | "november" => Some(11),
    | "diciembre" | "dic"
    | "december" | "dec" => Some(12),
    | _ => None
  }
}

fn days_until_weekday(
  from: NaiveDate,
  target: Weekday
) -> i64 {
  let from_idx = i64::from(
    from.weekday().num_days_from_monday()
  );
  let target_idx = i64::from(
    target.num_days_from_monday()
  );
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  delta
}

fn next_day(
  today: NaiveDate,
  days: i64,
  input: &str
) -> anyhow::Result<NaiveDate> {
  checked_add_days(today, days)
    .ok_or_else(|| {
      anyhow!(
        "date out of range: {input}"
      )
    })
}

#[must_use]
pub fn month_name(
  month: u32
) -> &'static str {
  match month {
    | 1 => "enero",
    | 2 => "febrero",
    | 3 => "marzo",
    | 4 => "abril",
    | 5 => "mayo",
    | 6 => "junio",
    | 7 => "julio",
    | 8 => "agosto",
    | 9 => "septiembre",
    | 10 => "octubre",
    | 11 => "noviembre",
    | 12 => "diciembre",
    | _ => "mes inválido"
  }
}

#[must_use]
pub fn weekday_name(
  weekday: Weekday
) -> &'static str {
  match weekday {
    | Weekday::Mon => "lunes",
    | Weekday::Tue => "martes",
    | Weekday::Wed => "miércoles",
    | Weekday::Thu => "jueves",
    | Weekday::Fri => "viernes",
    | Weekday::Sat => "sábado",
    | Weekday::Sun => "domingo"
  }
}

/// `sábado, 10 de febrero de 2024`
#[must_use]
pub fn format_long_date(
  date: NaiveDate
) -> String {
  format!(
    "{}, {} de {} de {}",
    weekday_name(date.weekday()),
    date.day(),
    month_name(date.month()),
    date.year()
  )
}

/// `febrero de 2024`
#[must_use]
pub fn format_month_title(
  date: NaiveDate
) -> String {
  format!(
    "{} de {}",
    month_name(date.month()),
    date.year()
  )
}

/// Distance label used by the home
/// summary for upcoming events.
#[must_use]
pub fn relative_day_label(
  date: NaiveDate,
  today: NaiveDate
) -> String {
  match (date - today).num_days() {
    | 0 => "Hoy".to_string(),
    | 1 => "Mañana".to_string(),
    | days => format!("en {days} días")
  }
}

#[must_use]
pub fn greeting(
  time: NaiveTime
) -> &'static str {
  use chrono::Timelike;

  match time.hour() {
    | h if h < 12 => "Buenos días",
    | h if h < 18 => "Buenas tardes",
    | _ => "Buenas noches"
  }
}


/// Stores calendar dates as
/// `YYYY-MM-DD`. RFC 3339 instants are
/// read back as the project-timezone
/// calendar date.
pub mod calendar_date_serde {
  use chrono::{
    DateTime,
    NaiveDate,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  const DATE_FORMAT: &str = "%Y-%m-%d";

  pub fn serialize<S>(
    date: &NaiveDate,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &date.format(DATE_FORMAT).to_string()
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<NaiveDate, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw =
      String::deserialize(deserializer)?;
    let raw = raw.trim();

    if let Ok(date) =
      NaiveDate::parse_from_str(
        raw,
        DATE_FORMAT
      )
    {
      return Ok(date);
    }

    DateTime::parse_from_rfc3339(raw)
      .map(|dt| {
        super::to_project_date(
          dt.with_timezone(&Utc)
        )
      })
      .map_err(serde::de::Error::custom)
  }
}

/// Stores times of day as `HH:MM`.
pub mod clock_time_serde {
  use chrono::NaiveTime;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    time: &NaiveTime,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &time.format("%H:%M").to_string()
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<NaiveTime, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw =
      String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(
      raw.trim(),
      "%H:%M"
    )
    .map_err(serde::de::Error::custom)
  }
}
