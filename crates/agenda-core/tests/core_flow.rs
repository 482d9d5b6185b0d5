use std::io::{BufRead, Cursor};

use agenda_core::calendar::MonthGrid;
use agenda_core::cli::Invocation;
use agenda_core::commands::{CommandContext, execute};
use agenda_core::config::Config;
use agenda_core::datastore::DataStore;
use agenda_core::render::Renderer;
use agenda_core::state::{AgendaState, CalendarActions, DeleteRequest};
use chrono::{NaiveDate, NaiveTime};
use tempfile::tempdir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn plain_config() -> Config {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![("color".to_string(), "off".to_string())]);
    cfg
}

fn invocation(command: &str, args: &[&str]) -> Invocation {
    Invocation {
        command: command.to_string(),
        command_args: args.iter().map(ToString::to_string).collect(),
    }
}

fn run_command(
    store: &DataStore,
    cfg: &Config,
    prompt: Option<&mut dyn BufRead>,
    command: &str,
    args: &[&str],
) -> anyhow::Result<String> {
    let renderer = Renderer::new(cfg)?;
    let mut ctx = CommandContext {
        store,
        cfg,
        renderer: &renderer,
        today: date(2024, 2, 10),
        now: NaiveTime::from_hms_opt(13, 0, 0).expect("valid time"),
        prompt,
    };
    let mut out = Vec::new();
    execute(&mut ctx, &mut out, &invocation(command, args))?;
    Ok(String::from_utf8(out)?)
}

#[test]
fn state_roundtrips_through_the_datastore() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");

    let mut state = store.load_state(date(2024, 2, 10)).expect("load state");
    for title in ["Carrera", "Yoga", "Fuerza"] {
        state.add_event(title, date(2024, 2, 10)).expect("add event");
    }
    state.toggle_event(2).expect("toggle");
    state.dont_ask_again = true;
    store.save_state(&state).expect("save state");

    let reloaded = store.load_state(date(2024, 2, 10)).expect("reload");
    assert_eq!(reloaded.events(), state.events());
    assert!(reloaded.dont_ask_again);
    assert!(reloaded.event(2).expect("event").checked);
}

#[test]
fn legacy_instants_load_as_calendar_dates() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    std::fs::write(
        &store.events_path,
        "{\"id\":1,\"title\":\"Yoga\",\"date\":\"2024-02-10T12:00:00Z\",\"checked\":false}\n",
    )
    .expect("write events");

    let events = store.load_events().expect("load events");
    assert_eq!(events[0].date, date(2024, 2, 10));

    std::fs::write(
        &store.events_path,
        "{\"id\":1,\"title\":\"Yoga\",\"date\":\"20240210T120000Z\",\"checked\":false}\n",
    )
    .expect("write events");
    assert!(store.load_events().is_err());
}

#[test]
fn grid_overflow_and_modal_follow_the_store() {
    let mut state = AgendaState::new(vec![], vec![], false, date(2024, 2, 1));
    for title in ["Carrera", "Yoga", "Fuerza"] {
        state.add_event(title, date(2024, 2, 10)).expect("add event");
    }

    let grid = MonthGrid::build(date(2024, 2, 1), date(2024, 2, 10), state.events(), 2);
    assert_eq!(grid.cells().len(), 35);
    let cell = grid.cell_for(date(2024, 2, 10)).expect("cell");
    let visible: Vec<u64> = cell.visible().iter().map(|e| e.id).collect();
    assert_eq!(visible, vec![1, 2]);
    assert_eq!(cell.overflow_count(), 1);
    assert!(cell.is_today);

    assert!(state.day_overflow.open_from_cell(cell));
    let all: Vec<u64> = state.day_overflow.events().iter().map(|e| e.id).collect();
    assert_eq!(all, vec![1, 2, 3]);

    match state.request_delete(3).expect("request delete") {
        DeleteRequest::NeedsConfirmation(id) => assert_eq!(id, 3),
        other => panic!("unexpected {other:?}"),
    }
    state.confirm_delete().expect("confirm");
    let remaining: Vec<u64> = state.day_overflow.events().iter().map(|e| e.id).collect();
    assert_eq!(remaining, vec![1, 2]);
}

#[test]
fn commands_add_list_and_render_the_month() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = plain_config();

    for title in ["Carrera", "Yoga", "Fuerza"] {
        let out = run_command(&store, &cfg, None, "add", &[title, "fecha:2024-02-10"])
            .expect("add");
        assert!(out.starts_with("Evento "));
    }
    run_command(&store, &cfg, None, "add", &["Natación", "date:mañana"]).expect("add");

    let calendar = run_command(&store, &cfg, None, "calendar", &[]).expect("calendar");
    assert!(calendar.contains("Febrero de 2024"));
    assert!(calendar.contains("+1 más"));
    assert!(calendar.contains("Natación"));

    let march = run_command(&store, &cfg, None, "calendar", &["siguiente"]).expect("march");
    assert!(march.contains("Marzo de 2024"));
    assert!(!march.contains("Carrera"));

    let day = run_command(&store, &cfg, None, "day", &["2024-02-10"]).expect("day");
    assert!(day.contains("Fuerza"));

    run_command(&store, &cfg, None, "done", &["2"]).expect("done");
    run_command(&store, &cfg, None, "edit", &["1", "Carrera", "larga"]).expect("edit");
    let list = run_command(&store, &cfg, None, "list", &[]).expect("list");
    assert!(list.contains("Carrera larga"));
    assert!(list.contains("hecho"));

    let events = store.load_events().expect("events");
    assert_eq!(events.len(), 4);
    assert_eq!(events[3].date, date(2024, 2, 11));
}

#[test]
fn delete_confirmation_flow() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = plain_config();
    for title in ["Carrera", "Yoga", "Fuerza"] {
        run_command(&store, &cfg, None, "add", &[title]).expect("add");
    }

    let err = run_command(&store, &cfg, None, "delete", &["1"]).expect_err("needs confirmation");
    assert!(format!("{err:#}").contains("--yes"));
    assert_eq!(store.load_events().expect("events").len(), 3);

    let mut answer = Cursor::new("n\n");
    let prompt: &mut dyn BufRead = &mut answer;
    let out = run_command(&store, &cfg, Some(prompt), "delete", &["1"]).expect("cancel");
    assert!(out.contains("Eliminación cancelada."));
    assert_eq!(store.load_events().expect("events").len(), 3);

    let mut answer = Cursor::new("siempre\n");
    let prompt: &mut dyn BufRead = &mut answer;
    run_command(&store, &cfg, Some(prompt), "delete", &["1"]).expect("delete");
    assert!(store.load_preferences().expect("prefs").dont_ask_again);

    let out = run_command(&store, &cfg, None, "delete", &["2"]).expect("no prompt needed");
    assert!(out.contains("Yoga"));

    run_command(&store, &cfg, None, "settings", &["confirm", "on"]).expect("settings");
    run_command(&store, &cfg, None, "delete", &["3", "--yes"]).expect("delete with --yes");
    assert!(store.load_events().expect("events").is_empty());
}

#[test]
fn deleted_ids_are_not_reissued() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = plain_config();
    for title in ["Carrera", "Yoga", "Fuerza"] {
        run_command(&store, &cfg, None, "add", &[title]).expect("add");
    }

    run_command(&store, &cfg, None, "delete", &["3", "--yes"]).expect("delete newest");
    run_command(&store, &cfg, None, "add", &["Pilates"]).expect("add after delete");

    let ids: Vec<u64> = store.load_events().expect("events").iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2, 4]);
    assert_eq!(store.load_preferences().expect("prefs").last_event_id, 4);
}

#[test]
fn day_without_events_prints_the_empty_view() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = plain_config();
    run_command(&store, &cfg, None, "add", &["Carrera", "fecha:2024-02-10"]).expect("add");

    let out = run_command(&store, &cfg, None, "day", &["2024-03-05"]).expect("day");
    assert_eq!(out, "Martes, 5 de marzo de 2024\nSin eventos para este día.\n");
}

#[test]
fn relative_dates_beyond_the_calendar_are_rejected() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = plain_config();

    for expr in ["date:+999999999999999d", "date:+2000000000000000000w"] {
        assert!(run_command(&store, &cfg, None, "add", &["Carrera", expr]).is_err());
    }
    assert!(run_command(&store, &cfg, None, "day", &["+999999999999999d"]).is_err());
    assert!(store.load_events().expect("events").is_empty());
}

#[test]
fn activities_suggestions_and_progress() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = plain_config();

    let out = run_command(&store, &cfg, None, "activities", &[]).expect("activities");
    assert!(out.contains("Comida saludable"));
    assert!(!out.contains("Paseo matutino"));

    run_command(&store, &cfg, None, "activity", &["suggest", "1"]).expect("suggest");
    run_command(
        &store,
        &cfg,
        None,
        "activity",
        &["add", "08:00", "Desayuno", "desc:Leche", "con", "cereales"],
    )
    .expect("activity add");
    run_command(&store, &cfg, None, "activity", &["done", "2"]).expect("activity done");

    let activities = store.load_activities().expect("activities");
    assert_eq!(activities.len(), 2);
    assert_eq!(activities[1].description, "Leche con cereales");

    let out = run_command(&store, &cfg, None, "activities", &[]).expect("activities");
    let desayuno = out.find("Desayuno").expect("desayuno listed");
    let comida = out.find("Comida saludable").expect("comida listed");
    assert!(desayuno < comida);
    assert!(out.contains("50%"));

    let home = run_command(&store, &cfg, None, "home", &[]).expect("home");
    assert!(home.starts_with("¡Buenas tardes!"));
    assert!(home.contains("Planificadas: 2  Completadas: 1"));
}

#[test]
fn unknown_commands_and_ids_fail() {
    let temp = tempdir().expect("tempdir");
    let store = DataStore::open(temp.path()).expect("open datastore");
    let cfg = plain_config();

    assert!(run_command(&store, &cfg, None, "bogus", &[]).is_err());
    assert!(run_command(&store, &cfg, None, "done", &["9"]).is_err());
    assert!(run_command(&store, &cfg, None, "add", &[]).is_err());
}
