use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate, NaiveTime};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::activity::{Activity, Progress, Suggestion};
use crate::calendar::{CellMonth, DayCell, MonthGrid};
use crate::config::Config;
use crate::datetime::{
    WEEKDAY_LABELS, format_long_date, format_month_title, greeting, relative_day_label,
};
use crate::event::Event;
use crate::overflow::DayOverflow;

const CELL_WIDTH: usize = 14;
const PROGRESS_BAR_WIDTH: usize = 20;

const NO_EVENTS_TODAY: &str = "Sin eventos para este día.";

const MOTIVATIONAL_QUOTES: [&str; 5] = [
    "La única mala sesión de entrenamiento es la que no se hizo.",
    "Cree en ti mismo y todo lo que eres. Reconoce que hay algo dentro de ti que es más \
     grande que cualquier obstáculo.",
    "El dolor que sientes hoy será la fuerza que sentirás mañana.",
    "Tu cuerpo puede soportar casi cualquier cosa. Es tu mente la que tienes que convencer.",
    "No se trata de ser el mejor. Se trata de ser mejor de lo que eras ayer.",
];

/// The quote shown on the home screen, stable for a whole day.
#[must_use]
pub fn quote_of_the_day(date: NaiveDate) -> &'static str {
    MOTIVATIONAL_QUOTES[date.ordinal0() as usize % MOTIVATIONAL_QUOTES.len()]
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    /// Month grid, Monday first. Every cell shows at most the visible events
    /// and a `+N más` line when the day holds more.
    #[tracing::instrument(skip(self, out, grid), fields(year = grid.year(), month = grid.month()))]
    pub fn write_month<W: Write>(&self, out: &mut W, grid: &MonthGrid) -> anyhow::Result<()> {
        let title = capitalize(&format_month_title(grid.first_day()));
        let total_width = (CELL_WIDTH + 1) * WEEKDAY_LABELS.len() + 1;
        let pad = total_width.saturating_sub(UnicodeWidthStr::width(title.as_str())) / 2;
        writeln!(out, "{}{}", " ".repeat(pad), self.paint(&title, "1"))?;

        let rule = format!("+{}", format!("{}+", "-".repeat(CELL_WIDTH)).repeat(7));
        writeln!(out, "{rule}")?;
        let headers: Vec<String> = WEEKDAY_LABELS
            .iter()
            .map(|label| self.paint(&fit(label, CELL_WIDTH), "1"))
            .collect();
        writeln!(out, "|{}|", headers.join("|"))?;
        writeln!(out, "{rule}")?;

        for week in grid.weeks() {
            let event_lines = week
                .iter()
                .map(|cell| cell.visible().len())
                .max()
                .unwrap_or(0);
            let has_overflow = week.iter().any(|cell| cell.overflow_count() > 0);
            let line_count = 1 + event_lines + usize::from(has_overflow);

            for line in 0..line_count {
                let cells: Vec<String> = week
                    .iter()
                    .map(|cell| self.cell_line(cell, line, event_lines))
                    .collect();
                writeln!(out, "|{}|", cells.join("|"))?;
            }
            writeln!(out, "{rule}")?;
        }

        Ok(())
    }

    fn cell_line(&self, cell: &DayCell, line: usize, event_lines: usize) -> String {
        if line == 0 {
            let label = if cell.is_today {
                format!("{:>2} hoy", cell.day)
            } else {
                format!("{:>2}", cell.day)
            };
            let label = fit(&label, CELL_WIDTH);
            return match cell.month {
                CellMonth::Previous | CellMonth::Next => self.paint(&label, "2"),
                CellMonth::Current if cell.is_today => self.paint(&label, "1;36"),
                CellMonth::Current => label,
            };
        }

        if let Some(event) = cell.visible().get(line - 1) {
            return self.event_cell(event);
        }

        if line == event_lines + 1 && cell.overflow_count() > 0 {
            let more = fit(&format!("+{} más", cell.overflow_count()), CELL_WIDTH);
            return self.paint(&more, "36");
        }

        " ".repeat(CELL_WIDTH)
    }

    fn event_cell(&self, event: &Event) -> String {
        let text = fit(&format!("{} {}", check_mark(event.checked), event.title), CELL_WIDTH);
        if event.checked {
            self.paint(&text, "2;9")
        } else {
            text
        }
    }

    /// Every event of the open day, in store order.
    #[tracing::instrument(skip(self, out, overflow))]
    pub fn write_day<W: Write>(&self, out: &mut W, overflow: &DayOverflow) -> anyhow::Result<()> {
        let Some(title) = overflow.title() else {
            return Ok(());
        };
        writeln!(out, "{}", self.paint(&capitalize(&title), "1"))?;

        if overflow.events().is_empty() {
            writeln!(out, "{NO_EVENTS_TODAY}")?;
            return Ok(());
        }

        for event in overflow.events() {
            let line = format!("{} {:>3}  {}", check_mark(event.checked), event.id, event.title);
            if event.checked {
                writeln!(out, "{}", self.paint(&line, "2;9"))?;
            } else {
                writeln!(out, "{line}")?;
            }
        }

        Ok(())
    }

    /// A day with nothing scheduled.
    pub fn write_empty_day<W: Write>(&self, out: &mut W, date: NaiveDate) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&capitalize(&format_long_date(date)), "1"))?;
        writeln!(out, "{NO_EVENTS_TODAY}")?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, events))]
    pub fn write_event_table<W: Write>(&self, out: &mut W, events: &[Event]) -> anyhow::Result<()> {
        if events.is_empty() {
            writeln!(out, "No hay eventos.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Fecha".to_string(),
            "Estado".to_string(),
            "Título".to_string(),
        ];

        let rows = events
            .iter()
            .map(|event| {
                vec![
                    self.paint(&event.id.to_string(), "33"),
                    event.date.format("%Y-%m-%d").to_string(),
                    status_label(event.checked).to_string(),
                    event.title.clone(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    /// The day's routine in time order, or the remaining suggestions when
    /// nothing is planned.
    #[tracing::instrument(skip(self, out, activities, suggestions))]
    pub fn write_activities<W: Write>(
        &self,
        out: &mut W,
        activities: &[Activity],
        suggestions: &[Suggestion],
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint("Hoy", "1"))?;

        if activities.is_empty() {
            if suggestions.is_empty() {
                writeln!(out, "¡Día completado!")?;
                writeln!(out, "No hay más actividades sugeridas para hoy.")?;
                return Ok(());
            }

            writeln!(out, "Aquí tienes algunas sugerencias para hoy:")?;
            for (idx, suggestion) in suggestions.iter().enumerate() {
                writeln!(
                    out,
                    "  {}. {}  {}: {}",
                    idx + 1,
                    format_clock(suggestion.time),
                    suggestion.title,
                    suggestion.description
                )?;
            }
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Hora".to_string(),
            "Estado".to_string(),
            "Actividad".to_string(),
            "Descripción".to_string(),
        ];
        let rows = activities
            .iter()
            .map(|activity| {
                let title = if activity.checked {
                    self.paint(&activity.title, "2;9")
                } else {
                    activity.title.clone()
                };
                vec![
                    self.paint(&activity.id.to_string(), "33"),
                    format_clock(activity.time),
                    status_label(activity.checked).to_string(),
                    title,
                    activity.description.clone(),
                ]
            })
            .collect();
        write_table(&mut *out, headers, rows)?;

        writeln!(out)?;
        self.write_progress(out, Progress::of(activities))
    }

    #[tracing::instrument(skip(self, out, progress, upcoming))]
    pub fn write_home<W: Write>(
        &self,
        out: &mut W,
        today: NaiveDate,
        now: NaiveTime,
        progress: Progress,
        upcoming: &[Event],
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&format!("¡{}!", greeting(now)), "1"))?;
        writeln!(out, "{}", format_long_date(today))?;
        writeln!(out)?;

        writeln!(out, "{}", self.paint("Progreso del día", "1"))?;
        writeln!(
            out,
            "Planificadas: {}  Completadas: {}",
            progress.total, progress.completed
        )?;
        self.write_progress(&mut *out, progress)?;
        writeln!(out, "\"{}\"", self.paint(quote_of_the_day(today), "3"))?;
        writeln!(out)?;

        writeln!(out, "{}", self.paint("Próximos eventos", "1"))?;
        if upcoming.is_empty() {
            writeln!(out, "No tienes eventos próximos en tu calendario.")?;
            return Ok(());
        }

        let width = upcoming
            .iter()
            .map(|event| UnicodeWidthStr::width(event.title.as_str()))
            .max()
            .unwrap_or(0);
        for event in upcoming {
            let padding = width.saturating_sub(UnicodeWidthStr::width(event.title.as_str()));
            writeln!(
                out,
                "  {}{}  {}",
                event.title,
                " ".repeat(padding),
                self.paint(&relative_day_label(event.date, today), "36")
            )?;
        }

        Ok(())
    }

    fn write_progress<W: Write>(&self, out: &mut W, progress: Progress) -> anyhow::Result<()> {
        let percent = progress.percent();
        let filled = if progress.total == 0 {
            0
        } else {
            progress.completed * PROGRESS_BAR_WIDTH / progress.total
        };
        writeln!(
            out,
            "[{}{}] {:.0}%",
            self.paint(&"#".repeat(filled), "36"),
            ".".repeat(PROGRESS_BAR_WIDTH - filled),
            percent
        )?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || text.is_empty() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn check_mark(checked: bool) -> &'static str {
    if checked { "[x]" } else { "[ ]" }
}

fn status_label(checked: bool) -> &'static str {
    if checked { "hecho" } else { "pendiente" }
}

fn format_clock(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Pads or cuts `text` to exactly `width` terminal columns.
fn fit(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        let padding = width - UnicodeWidthStr::width(text);
        return format!("{text}{}", " ".repeat(padding));
    }

    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + ch_width + 1 > width {
            break;
        }
        out.push(ch);
        used += ch_width;
    }
    out.push('…');
    used += 1;
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        let padding = width.saturating_sub(UnicodeWidthStr::width(header.as_str()));
        write!(writer, "{header}{} ", " ".repeat(padding))?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
    }

    fn plain() -> Renderer {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "off".to_string())]);
        Renderer::new(&cfg).expect("renderer")
    }

    fn render<F>(write: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> anyhow::Result<()>,
    {
        let mut buf = Vec::new();
        write(&mut buf).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn rejects_unknown_color_setting() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "sometimes".to_string())]);
        assert!(Renderer::new(&cfg).is_err());
    }

    #[test]
    fn month_shows_visible_events_and_overflow_link() {
        let events: Vec<Event> = ["Carrera", "Yoga", "Fuerza"]
            .iter()
            .enumerate()
            .map(|(idx, title)| Event::new(idx as u64 + 1, title, date(2024, 2, 10)).expect("event"))
            .collect();
        let grid = MonthGrid::build(date(2024, 2, 1), date(2024, 2, 12), &events, 2);

        let text = render(|out| plain().write_month(out, &grid));
        assert!(text.contains("Febrero de 2024"));
        assert!(text.contains("Lunes"));
        assert!(text.contains("[ ] Carrera"));
        assert!(text.contains("[ ] Yoga"));
        assert!(!text.contains("Fuerza"));
        assert!(text.contains("+1 más"));
        assert!(text.contains("12 hoy"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn day_view_lists_every_event() {
        let mut overflow = DayOverflow::default();
        let mut done = Event::new(2, "Yoga", date(2024, 2, 10)).expect("event");
        done.checked = true;
        overflow.open(
            date(2024, 2, 10),
            vec![Event::new(1, "Carrera", date(2024, 2, 10)).expect("event"), done],
        );

        let text = render(|out| plain().write_day(out, &overflow));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Sábado, 10 de febrero de 2024");
        assert!(lines[1].starts_with("[ ]") && lines[1].ends_with("Carrera"));
        assert!(lines[2].starts_with("[x]") && lines[2].ends_with("Yoga"));

        let closed = render(|out| plain().write_day(out, &DayOverflow::Closed));
        assert!(closed.is_empty());
    }

    #[test]
    fn empty_day_prints_title_and_placeholder() {
        let text = render(|out| plain().write_empty_day(out, date(2024, 3, 5)));
        assert_eq!(text, "Martes, 5 de marzo de 2024\nSin eventos para este día.\n");
    }

    #[test]
    fn activities_fall_back_to_suggestions_then_completion() {
        let suggestions = crate::activity::suggested_activities(at(13, 0));
        let text = render(|out| plain().write_activities(out, &[], &suggestions));
        assert!(text.contains("sugerencias"));
        assert!(text.contains("1. 14:00  Comida saludable"));

        let text = render(|out| plain().write_activities(out, &[], &[]));
        assert!(text.contains("¡Día completado!"));
    }

    #[test]
    fn home_summarizes_progress_and_upcoming_events() {
        let today = date(2024, 2, 10);
        let upcoming = vec![
            Event::new(1, "Carrera", today).expect("event"),
            Event::new(2, "Natación", date(2024, 2, 13)).expect("event"),
        ];
        let progress = Progress {
            completed: 1,
            total: 4,
        };

        let text = render(|out| plain().write_home(out, today, at(9, 30), progress, &upcoming));
        assert!(text.starts_with("¡Buenos días!"));
        assert!(text.contains("Planificadas: 4  Completadas: 1"));
        assert!(text.contains("25%"));
        assert!(text.contains("Hoy"));
        assert!(text.contains("en 3 días"));
        assert!(text.contains("\"La única mala sesión de entrenamiento es la que no se hizo.\""));
    }

    #[test]
    fn quote_changes_with_the_day() {
        let first = quote_of_the_day(date(2024, 2, 10));
        assert_eq!(first, quote_of_the_day(date(2024, 2, 10)));
        assert_ne!(first, quote_of_the_day(date(2024, 2, 11)));
        assert!(MOTIVATIONAL_QUOTES.contains(&quote_of_the_day(date(2024, 12, 31))));
    }

    #[test]
    fn fit_truncates_by_display_width() {
        assert_eq!(fit("Yoga", 6), "Yoga  ");
        assert_eq!(fit("Estiramientos", 6), "Estir…");
        assert_eq!(UnicodeWidthStr::width(fit("Meditación guiada", 10).as_str()), 10);
    }

    #[test]
    fn table_alignment_ignores_ansi_sequences() {
        let text = render(|out| {
            write_table(
                out,
                vec!["ID".to_string(), "Título".to_string()],
                vec![vec!["\x1b[33m7\x1b[0m".to_string(), "Yoga".to_string()]],
            )
        });
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ID Título ");
        assert_eq!(strip_ansi(lines[2]), "7  Yoga   ");
    }
}
