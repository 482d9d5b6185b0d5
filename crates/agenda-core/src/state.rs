//! Top-level application state: the event store, the day's activities and
//! the interaction state around the calendar.
//!
//! Every mutation replaces the stored collection as a whole; the calendar
//! only ever reads a snapshot of it.

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate, NaiveTime};
use tracing::{debug, info, instrument};

use crate::activity::{Activity, Progress, Suggestion};
use crate::calendar::{MonthGrid, first_day_of_month, shift_months};
use crate::event::{Event, normalize_title};
use crate::overflow::DayOverflow;

/// Callbacks a rendered month grid invokes. The grid itself never mutates
/// events.
pub trait CalendarActions {
    /// Flips the completion flag and returns the new value.
    fn toggle_event(&mut self, id: u64) -> anyhow::Result<bool>;

    fn edit_event_requested(&mut self, event: &Event);

    fn add_event_requested(&mut self);

    fn open_day_overflow(&mut self, events: Vec<Event>, date: NaiveDate);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteRequest {
    Deleted(Event),
    NeedsConfirmation(u64),
}

#[derive(Debug, Clone)]
pub struct AgendaState {
    events: Vec<Event>,
    activities: Vec<Activity>,
    displayed_month: NaiveDate,
    pending_delete: Option<u64>,
    /// Highest ids ever issued, so deleted ids are not handed out again.
    last_event_id: u64,
    last_activity_id: u64,

    /// Skip the delete confirmation.
    pub dont_ask_again: bool,
    pub day_overflow: DayOverflow,
    pub editing: Option<Event>,
    pub add_form_open: bool,
}

impl AgendaState {
    pub fn new(
        events: Vec<Event>,
        activities: Vec<Activity>,
        dont_ask_again: bool,
        today: NaiveDate,
    ) -> Self {
        Self {
            events,
            activities,
            displayed_month: first_day_of_month(today.year(), today.month()),
            pending_delete: None,
            last_event_id: 0,
            last_activity_id: 0,
            dont_ask_again,
            day_overflow: DayOverflow::Closed,
            editing: None,
            add_form_open: false,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn event(&self, id: u64) -> Option<&Event> {
        self.events.iter().find(|event| event.id == id)
    }

    pub fn activity(&self, id: u64) -> Option<&Activity> {
        self.activities.iter().find(|activity| activity.id == id)
    }

    pub fn pending_delete(&self) -> Option<u64> {
        self.pending_delete
    }

    /// Restores the id high-water marks saved with the preferences.
    #[must_use]
    pub fn with_last_ids(mut self, event: u64, activity: u64) -> Self {
        self.last_event_id = event;
        self.last_activity_id = activity;
        self
    }

    pub fn last_event_id(&self) -> u64 {
        self.events
            .iter()
            .map(|e| e.id)
            .max()
            .unwrap_or(0)
            .max(self.last_event_id)
    }

    pub fn last_activity_id(&self) -> u64 {
        self.activities
            .iter()
            .map(|a| a.id)
            .max()
            .unwrap_or(0)
            .max(self.last_activity_id)
    }

    pub fn next_event_id(&self) -> anyhow::Result<u64> {
        self.last_event_id()
            .checked_add(1)
            .ok_or_else(|| anyhow!("event ids exhausted"))
    }

    pub fn next_activity_id(&self) -> anyhow::Result<u64> {
        self.last_activity_id()
            .checked_add(1)
            .ok_or_else(|| anyhow!("activity ids exhausted"))
    }

    #[instrument(skip(self))]
    pub fn add_event(&mut self, title: &str, date: NaiveDate) -> anyhow::Result<Event> {
        let event = Event::new(self.next_event_id()?, title, date)?;
        self.last_event_id = event.id;
        let mut events = std::mem::take(&mut self.events);
        events.push(event.clone());
        self.events = events;
        self.add_form_open = false;
        self.day_overflow.refresh(&self.events);
        info!(id = event.id, %date, "added event");
        Ok(event)
    }

    #[instrument(skip(self, updated), fields(id = updated.id))]
    pub fn update_event(&mut self, mut updated: Event) -> anyhow::Result<()> {
        if self.event(updated.id).is_none() {
            return Err(anyhow!("event not found: {}", updated.id));
        }
        updated.title = normalize_title(&updated.title)?;

        self.events = std::mem::take(&mut self.events)
            .into_iter()
            .map(|event| {
                if event.id == updated.id {
                    updated.clone()
                } else {
                    event
                }
            })
            .collect();
        self.editing = None;
        self.day_overflow.refresh(&self.events);
        debug!("updated event");
        Ok(())
    }

    /// Deletes right away when the confirmation is disabled, otherwise parks
    /// the id until `confirm_delete` or `cancel_delete`.
    #[instrument(skip(self))]
    pub fn request_delete(&mut self, id: u64) -> anyhow::Result<DeleteRequest> {
        if self.event(id).is_none() {
            return Err(anyhow!("event not found: {id}"));
        }
        self.editing = None;

        if self.dont_ask_again {
            let removed = self.remove_event(id)?;
            return Ok(DeleteRequest::Deleted(removed));
        }

        self.pending_delete = Some(id);
        debug!("delete awaiting confirmation");
        Ok(DeleteRequest::NeedsConfirmation(id))
    }

    #[instrument(skip(self))]
    pub fn confirm_delete(&mut self) -> anyhow::Result<Option<Event>> {
        let Some(id) = self.pending_delete.take() else {
            return Ok(None);
        };
        self.remove_event(id).map(Some)
    }

    pub fn cancel_delete(&mut self) {
        if let Some(id) = self.pending_delete.take() {
            debug!(id, "delete cancelled");
        }
    }

    fn remove_event(&mut self, id: u64) -> anyhow::Result<Event> {
        let (removed, kept): (Vec<Event>, Vec<Event>) = std::mem::take(&mut self.events)
            .into_iter()
            .partition(|event| event.id == id);
        self.events = kept;

        let removed = removed
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("event not found: {id}"))?;
        if self.editing.as_ref().is_some_and(|e| e.id == id) {
            self.editing = None;
        }
        self.day_overflow.refresh(&self.events);
        info!(id, "deleted event");
        Ok(removed)
    }

    pub fn displayed_month(&self) -> NaiveDate {
        self.displayed_month
    }

    pub fn show_month(&mut self, date: NaiveDate) {
        self.displayed_month = first_day_of_month(date.year(), date.month());
        self.day_overflow.close();
    }

    pub fn show_previous_month(&mut self) {
        self.show_month(shift_months(self.displayed_month, -1));
    }

    pub fn show_next_month(&mut self) {
        self.show_month(shift_months(self.displayed_month, 1));
    }

    pub fn show_today(&mut self, today: NaiveDate) {
        self.show_month(today);
    }

    pub fn month_grid(&self, today: NaiveDate, visible_limit: usize) -> MonthGrid {
        MonthGrid::build(self.displayed_month, today, &self.events, visible_limit)
    }

    /// Events from `today` on, soonest first. Same-day events keep store order.
    pub fn upcoming_events(&self, today: NaiveDate, limit: usize) -> Vec<Event> {
        let mut upcoming: Vec<Event> = self
            .events
            .iter()
            .filter(|event| event.date >= today)
            .cloned()
            .collect();
        upcoming.sort_by_key(|event| event.date);
        upcoming.truncate(limit);
        upcoming
    }

    #[instrument(skip(self))]
    pub fn add_activity(
        &mut self,
        time: NaiveTime,
        title: &str,
        description: &str,
    ) -> anyhow::Result<Activity> {
        let activity = Activity::new(self.next_activity_id()?, time, title, description)?;
        self.last_activity_id = activity.id;
        let mut activities = std::mem::take(&mut self.activities);
        activities.push(activity.clone());
        self.activities = activities;
        info!(id = activity.id, "added activity");
        Ok(activity)
    }

    pub fn adopt_suggestion(&mut self, suggestion: &Suggestion) -> anyhow::Result<Activity> {
        self.add_activity(suggestion.time, suggestion.title, suggestion.description)
    }

    #[instrument(skip(self, updated), fields(id = updated.id))]
    pub fn update_activity(&mut self, mut updated: Activity) -> anyhow::Result<()> {
        if self.activity(updated.id).is_none() {
            return Err(anyhow!("activity not found: {}", updated.id));
        }
        updated.title = normalize_title(&updated.title)?;
        updated.description = updated.description.trim().to_string();

        self.activities = std::mem::take(&mut self.activities)
            .into_iter()
            .map(|activity| {
                if activity.id == updated.id {
                    updated.clone()
                } else {
                    activity
                }
            })
            .collect();
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn toggle_activity(&mut self, id: u64) -> anyhow::Result<bool> {
        let mut checked = None;
        self.activities = std::mem::take(&mut self.activities)
            .into_iter()
            .map(|mut activity| {
                if activity.id == id {
                    activity.checked = !activity.checked;
                    checked = Some(activity.checked);
                }
                activity
            })
            .collect();
        checked.ok_or_else(|| anyhow!("activity not found: {id}"))
    }

    #[instrument(skip(self))]
    pub fn delete_activity(&mut self, id: u64) -> anyhow::Result<Activity> {
        let (removed, kept): (Vec<Activity>, Vec<Activity>) =
            std::mem::take(&mut self.activities)
                .into_iter()
                .partition(|activity| activity.id == id);
        self.activities = kept;
        removed
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("activity not found: {id}"))
    }

    /// The routine in time order; equal times keep insertion order.
    pub fn activities_by_time(&self) -> Vec<Activity> {
        let mut sorted = self.activities.clone();
        sorted.sort_by_key(|activity| activity.time);
        sorted
    }

    pub fn activity_progress(&self) -> Progress {
        Progress::of(&self.activities)
    }
}

impl CalendarActions for AgendaState {
    #[instrument(skip(self))]
    fn toggle_event(&mut self, id: u64) -> anyhow::Result<bool> {
        let mut checked = None;
        self.events = std::mem::take(&mut self.events)
            .into_iter()
            .map(|mut event| {
                if event.id == id {
                    event.checked = !event.checked;
                    checked = Some(event.checked);
                }
                event
            })
            .collect();
        let checked = checked.ok_or_else(|| anyhow!("event not found: {id}"))?;
        self.day_overflow.refresh(&self.events);
        debug!(checked, "toggled event");
        Ok(checked)
    }

    fn edit_event_requested(&mut self, event: &Event) {
        self.editing = Some(event.clone());
    }

    fn add_event_requested(&mut self) {
        self.add_form_open = true;
    }

    fn open_day_overflow(&mut self, events: Vec<Event>, date: NaiveDate) {
        self.day_overflow.open(date, events);
    }
}
