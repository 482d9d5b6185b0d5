use anyhow::anyhow;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::datetime::calendar_date_serde;

/// A dated, completable calendar entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub id: u64,

    pub title: String,

    #[serde(with = "calendar_date_serde")]
    pub date: NaiveDate,

    #[serde(default)]
    pub checked: bool,
}

impl Event {
    pub fn new(id: u64, title: &str, date: NaiveDate) -> anyhow::Result<Self> {
        Ok(Self {
            id,
            title: normalize_title(title)?,
            date,
            checked: false,
        })
    }

    /// Calendar-date equality; year, month and day must all agree.
    pub fn falls_on(&self, date: NaiveDate) -> bool {
        self.date.year() == date.year()
            && self.date.month() == date.month()
            && self.date.day() == date.day()
    }
}

pub(crate) fn normalize_title(raw: &str) -> anyhow::Result<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(anyhow!("title cannot be empty"));
    }
    Ok(title.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_trims_title_and_starts_unchecked() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 10).expect("valid date");
        let event = Event::new(1, "  Clase de Yoga ", date).expect("event");
        assert_eq!(event.title, "Clase de Yoga");
        assert!(!event.checked);
        assert!(event.falls_on(date));
    }

    #[test]
    fn blank_title_is_rejected() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 10).expect("valid date");
        assert!(Event::new(1, "   ", date).is_err());
    }

    #[test]
    fn deserializes_instant_as_calendar_date() {
        let raw = r#"{"id":7,"title":"Carrera","date":"2024-02-10T12:00:00Z","checked":true}"#;
        let event: Event = serde_json::from_str(raw).expect("parse event");
        assert_eq!(
            event.date,
            NaiveDate::from_ymd_opt(2024, 2, 10).expect("valid date")
        );
        assert!(event.checked);

        let serialized = serde_json::to_string(&event).expect("serialize");
        assert!(serialized.contains(r#""date":"2024-02-10""#));
    }
}
