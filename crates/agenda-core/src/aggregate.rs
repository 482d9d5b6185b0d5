//! Per-day event aggregation for the month grid.

use chrono::NaiveDate;

use crate::event::Event;

/// Events shown inline in a day cell before the "+N más" link appears.
pub const DEFAULT_VISIBLE_LIMIT: usize = 2;

/// The events that fall on one calendar day, in store order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAggregate {
    pub date: NaiveDate,
    events: Vec<Event>,
    visible_limit: usize,
}

impl DayAggregate {
    pub fn empty(date: NaiveDate, visible_limit: usize) -> Self {
        Self {
            date,
            events: Vec::new(),
            visible_limit,
        }
    }

    /// Every matched event. This is the list handed to the day overflow view.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn visible(&self) -> &[Event] {
        let end = self.events.len().min(self.visible_limit);
        &self.events[..end]
    }

    pub fn matched_count(&self) -> usize {
        self.events.len()
    }

    pub fn overflow_count(&self) -> usize {
        self.events.len().saturating_sub(self.visible_limit)
    }

    pub fn has_overflow(&self) -> bool {
        self.overflow_count() > 0
    }

    pub fn visible_limit(&self) -> usize {
        self.visible_limit
    }
}

/// Filters `events` down to those dated `date`, keeping their relative order.
pub fn aggregate(events: &[Event], date: NaiveDate, visible_limit: usize) -> DayAggregate {
    DayAggregate {
        date,
        events: events_on(events, date),
        visible_limit,
    }
}

pub fn events_on(events: &[Event], date: NaiveDate) -> Vec<Event> {
    events
        .iter()
        .filter(|event| event.falls_on(date))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: u64, y: i32, m: u32, d: u32) -> Event {
        let date = NaiveDate::from_ymd_opt(y, m, d).expect("valid date");
        Event::new(id, &format!("evento {id}"), date).expect("event")
    }

    fn ids(events: &[Event]) -> Vec<u64> {
        events.iter().map(|e| e.id).collect()
    }

    #[test]
    fn three_events_with_limit_two_overflow_by_one() {
        let events = vec![
            event(1, 2024, 2, 10),
            event(2, 2024, 2, 10),
            event(3, 2024, 2, 10),
        ];
        let day = NaiveDate::from_ymd_opt(2024, 2, 10).expect("valid date");

        let agg = aggregate(&events, day, DEFAULT_VISIBLE_LIMIT);
        assert_eq!(ids(agg.visible()), vec![1, 2]);
        assert_eq!(agg.overflow_count(), 1);
        assert_eq!(ids(agg.events()), vec![1, 2, 3]);
    }

    #[test]
    fn preserves_store_order_and_ignores_other_days() {
        let events = vec![
            event(9, 2024, 2, 10),
            event(4, 2024, 3, 10),
            event(2, 2024, 2, 11),
            event(5, 2024, 2, 10),
            event(1, 2023, 2, 10),
        ];
        let day = NaiveDate::from_ymd_opt(2024, 2, 10).expect("valid date");

        let agg = aggregate(&events, day, 5);
        assert_eq!(ids(agg.events()), vec![9, 5]);
        assert_eq!(agg.overflow_count(), 0);
        assert!(!agg.has_overflow());
    }

    #[test]
    fn visible_never_exceeds_limit() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date");
        let events: Vec<Event> = (1..=40).map(|id| event(id, 2024, 6, 1)).collect();

        for limit in [0, 1, 2, 7, 40, 100] {
            let agg = aggregate(&events, day, limit);
            assert!(agg.visible().len() <= limit);
            assert_eq!(agg.overflow_count(), 40usize.saturating_sub(limit));
        }
    }

    #[test]
    fn empty_input_yields_no_overflow() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date");
        let agg = aggregate(&[], day, DEFAULT_VISIBLE_LIMIT);
        assert!(agg.visible().is_empty());
        assert_eq!(agg.overflow_count(), 0);
    }
}
