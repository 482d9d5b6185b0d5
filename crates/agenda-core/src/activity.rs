use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::datetime::clock_time_serde;
use crate::event::normalize_title;

/// One item of the day's routine ("Hoy").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Activity {
    pub id: u64,

    #[serde(with = "clock_time_serde")]
    pub time: NaiveTime,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub checked: bool,
}

impl Activity {
    pub fn new(id: u64, time: NaiveTime, title: &str, description: &str) -> anyhow::Result<Self> {
        Ok(Self {
            id,
            time,
            title: normalize_title(title)?,
            description: description.trim().to_string(),
            checked: false,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suggestion {
    pub time: NaiveTime,
    pub title: &'static str,
    pub description: &'static str,
}

const SUGGESTIONS: [(u32, &str, &str); 5] = [
    (9, "Paseo matutino", "30 minutos de caminata ligera."),
    (12, "Estiramientos", "15 minutos de estiramientos de cuerpo completo."),
    (14, "Comida saludable", "Preparar una ensalada nutritiva."),
    (18, "Sesión de yoga", "Clase de Vinyasa online."),
    (21, "Meditación", "10 minutos de meditación guiada."),
];

/// Built-in suggestions still ahead of `now`, earliest first.
pub fn suggested_activities(now: NaiveTime) -> Vec<Suggestion> {
    SUGGESTIONS
        .iter()
        .filter_map(|&(hour, title, description)| {
            NaiveTime::from_hms_opt(hour, 0, 0).map(|time| Suggestion {
                time,
                title,
                description,
            })
        })
        .filter(|suggestion| suggestion.time > now)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn of(activities: &[Activity]) -> Self {
        Self {
            completed: activities.iter().filter(|a| a.checked).count(),
            total: activities.len(),
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }
}
