use chrono::NaiveDate;
use tracing::debug;

use crate::aggregate::events_on;
use crate::calendar::DayCell;
use crate::datetime::format_long_date;
use crate::event::Event;

/// The "all events of this day" view opened from a cell's "+N más" link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DayOverflow {
    #[default]
    Closed,
    Open {
        date: NaiveDate,
        events: Vec<Event>,
    },
}

impl DayOverflow {
    pub fn open(&mut self, date: NaiveDate, events: Vec<Event>) {
        debug!(%date, count = events.len(), "opening day overflow");
        *self = Self::Open { date, events };
    }

    /// Opens with the cell's full event list. Cells without overflow have no
    /// link to activate, so nothing happens and `false` is returned.
    pub fn open_from_cell(&mut self, cell: &DayCell) -> bool {
        if cell.overflow_count() == 0 {
            return false;
        }
        self.open(cell.date, cell.events.events().to_vec());
        true
    }

    pub fn close(&mut self) {
        if self.is_open() {
            debug!("closing day overflow");
        }
        *self = Self::Closed;
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Open { date, .. } => Some(*date),
            Self::Closed => None,
        }
    }

    pub fn events(&self) -> &[Event] {
        match self {
            Self::Open { events, .. } => events.as_slice(),
            Self::Closed => &[],
        }
    }

    pub fn title(&self) -> Option<String> {
        self.date().map(format_long_date)
    }

    /// Re-reads the open day from the store after a toggle or edit.
    pub fn refresh(&mut self, store: &[Event]) {
        if let Self::Open { date, events } = self {
            *events = events_on(store, *date);
        }
    }
}
