use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, anyhow};
use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, instrument};

use crate::activity::suggested_activities;
use crate::aggregate::events_on;
use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::{self, format_long_date, parse_clock_time, parse_date_expr, parse_month_expr};
use crate::render::Renderer;
use crate::state::{AgendaState, CalendarActions, DeleteRequest};

const UPCOMING_EVENTS: usize = 3;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "calendar",
        "day",
        "add",
        "edit",
        "done",
        "delete",
        "list",
        "home",
        "activities",
        "activity",
        "settings",
        "_commands",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Everything a command needs besides its arguments. `prompt` is the
/// answer source for delete confirmations; `None` means nobody can answer.
pub struct CommandContext<'a, 'p> {
    pub store: &'a DataStore,
    pub cfg: &'a Config,
    pub renderer: &'a Renderer,
    pub today: NaiveDate,
    pub now: NaiveTime,
    pub prompt: Option<&'p mut dyn BufRead>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteAnswer {
    Yes,
    No,
    Always,
}

impl DeleteAnswer {
    /// Anything unrecognised counts as "no".
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "s" | "si" | "sí" | "y" | "yes" => Self::Yes,
            "siempre" | "always" => Self::Always,
            _ => Self::No,
        }
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &DataStore,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let interactive = io::stdin().is_terminal();

    let mut ctx = CommandContext {
        store,
        cfg,
        renderer,
        today: datetime::today(),
        now: datetime::now_time(),
        prompt: if interactive {
            Some(&mut input as &mut dyn BufRead)
        } else {
            None
        },
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&mut ctx, &mut out, &inv)
}

#[instrument(skip(ctx, out, inv), fields(command = %inv.command))]
pub fn execute<W: Write>(
    ctx: &mut CommandContext<'_, '_>,
    out: &mut W,
    inv: &Invocation,
) -> anyhow::Result<()> {
    let args = inv.command_args.as_slice();
    debug!(args = ?args, today = %ctx.today, "dispatching command");

    match inv.command.as_str() {
        "calendar" => cmd_calendar(ctx, out, args),
        "day" => cmd_day(ctx, out, args),
        "add" => cmd_add(ctx, out, args),
        "edit" => cmd_edit(ctx, out, args),
        "done" => cmd_done(ctx, out, args),
        "delete" => cmd_delete(ctx, out, args),
        "list" => cmd_list(ctx, out),
        "home" => cmd_home(ctx, out),
        "activities" => cmd_activities(ctx, out),
        "activity" => cmd_activity(ctx, out, args),
        "settings" => cmd_settings(ctx, out, args),
        "_commands" => cmd_commands(out),
        "_show" => cmd_show(ctx.cfg, out),
        "help" => cmd_help(out),
        "version" => {
            writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn load(ctx: &CommandContext<'_, '_>) -> anyhow::Result<AgendaState> {
    ctx.store.load_state(ctx.today)
}

#[instrument(skip(ctx, out, args))]
fn cmd_calendar<W: Write>(
    ctx: &mut CommandContext<'_, '_>,
    out: &mut W,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command calendar");

    let mut state = load(ctx)?;
    if !args.is_empty() {
        let month = parse_month_expr(&args.join(" "), state.displayed_month(), ctx.today)?;
        state.show_month(month);
    }

    let grid = state.month_grid(ctx.today, ctx.cfg.visible_limit()?);
    debug!(
        cells = grid.cells().len(),
        weeks = grid.week_count(),
        "built month grid"
    );
    ctx.renderer.write_month(out, &grid)
}

#[instrument(skip(ctx, out, args))]
fn cmd_day<W: Write>(
    ctx: &mut CommandContext<'_, '_>,
    out: &mut W,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command day");

    let date = if args.is_empty() {
        ctx.today
    } else {
        parse_date_expr(&args.join(" "), ctx.today)?
    };

    let mut state = load(ctx)?;
    let events = events_on(state.events(), date);
    if events.is_empty() {
        debug!(%date, "no events on day");
        return ctx.renderer.write_empty_day(out, date);
    }
    state.open_day_overflow(events, date);
    ctx.renderer.write_day(out, &state.day_overflow)
}

#[instrument(skip(ctx, out, args))]
fn cmd_add<W: Write>(
    ctx: &mut CommandContext<'_, '_>,
    out: &mut W,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command add");

    let parsed = parse_event_args(args, ctx.today)?;
    if parsed.title.is_empty() {
        return Err(anyhow!("add: title is required"));
    }
    let date = parsed.date.unwrap_or(ctx.today);

    let mut state = load(ctx)?;
    state.add_event_requested();
    let event = state.add_event(&parsed.title, date)?;
    ctx.store.save_state(&state)?;

    writeln!(
        out,
        "Evento {} creado para el {}.",
        event.id,
        format_long_date(event.date)
    )?;
    Ok(())
}

#[instrument(skip(ctx, out, args))]
fn cmd_edit<W: Write>(
    ctx: &mut CommandContext<'_, '_>,
    out: &mut W,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command edit");

    let (id, rest) = split_id(args, "edit")?;
    let parsed = parse_event_args(rest, ctx.today)?;
    if parsed.title.is_empty() && parsed.date.is_none() {
        return Err(anyhow!("edit: nothing to change for event {id}"));
    }

    let mut state = load(ctx)?;
    let mut event = state
        .event(id)
        .cloned()
        .ok_or_else(|| anyhow!("event not found: {id}"))?;
    state.edit_event_requested(&event);

    if !parsed.title.is_empty() {
        event.title = parsed.title;
    }
    if let Some(date) = parsed.date {
        event.date = date;
    }
    state.update_event(event)?;
    ctx.store.save_state(&state)?;

    writeln!(out, "Evento {id} actualizado.")?;
    Ok(())
}

#[instrument(skip(ctx, out, args))]
fn cmd_done<W: Write>(
    ctx: &mut CommandContext<'_, '_>,
    out: &mut W,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command done");

    let (id, _) = split_id(args, "done")?;
    let mut state = load(ctx)?;
    let checked = state.toggle_event(id)?;
    ctx.store.save_state(&state)?;

    if checked {
        writeln!(out, "Evento {id} completado.")?;
    } else {
        writeln!(out, "Evento {id} marcado como pendiente.")?;
    }
    Ok(())
}

#[instrument(skip(ctx, out, args))]
fn cmd_delete<W: Write>(
    ctx: &mut CommandContext<'_, '_>,
    out: &mut W,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command delete");

    let assume_yes = args.iter().any(|arg| arg == "--yes" || arg == "-y");
    let positional: Vec<String> = args
        .iter()
        .filter(|arg| *arg != "--yes" && *arg != "-y")
        .cloned()
        .collect();
    let (id, _) = split_id(&positional, "delete")?;

    let mut state = load(ctx)?;
    let removed = match state.request_delete(id)? {
        DeleteRequest::Deleted(event) => Some(event),
        DeleteRequest::NeedsConfirmation(_) if assume_yes => state.confirm_delete()?,
        DeleteRequest::NeedsConfirmation(_) => {
            let title = state
                .event(id)
                .map(|event| event.title.clone())
                .unwrap_or_default();
            let Some(input) = ctx.prompt.as_deref_mut() else {
                state.cancel_delete();
                return Err(anyhow!(
                    "delete {id}: confirmation required, rerun with --yes"
                ));
            };

            write!(
                out,
                "¿Eliminar el evento \"{title}\"? Esta acción no se puede deshacer. [s/N/siempre] "
            )?;
            out.flush()?;
            let mut line = String::new();
            input
                .read_line(&mut line)
                .context("failed to read confirmation")?;

            match DeleteAnswer::parse(&line) {
                DeleteAnswer::Yes => state.confirm_delete()?,
                DeleteAnswer::Always => {
                    info!("delete confirmation disabled");
                    state.dont_ask_again = true;
                    state.confirm_delete()?
                }
                DeleteAnswer::No => {
                    state.cancel_delete();
                    None
                }
            }
        }
    };

    match removed {
        Some(event) => {
            ctx.store.save_state(&state)?;
            writeln!(out, "Evento {} eliminado: {}.", event.id, event.title)?;
        }
        None => {
            writeln!(out, "Eliminación cancelada.")?;
        }
    }
    Ok(())
}

#[instrument(skip(ctx, out))]
fn cmd_list<W: Write>(ctx: &mut CommandContext<'_, '_>, out: &mut W) -> anyhow::Result<()> {
    info!("command list");

    let state = load(ctx)?;
    ctx.renderer.write_event_table(out, state.events())
}

#[instrument(skip(ctx, out))]
fn cmd_home<W: Write>(ctx: &mut CommandContext<'_, '_>, out: &mut W) -> anyhow::Result<()> {
    info!("command home");

    let state = load(ctx)?;
    let upcoming = state.upcoming_events(ctx.today, UPCOMING_EVENTS);
    ctx.renderer.write_home(
        out,
        ctx.today,
        ctx.now,
        state.activity_progress(),
        &upcoming,
    )
}

#[instrument(skip(ctx, out))]
fn cmd_activities<W: Write>(ctx: &mut CommandContext<'_, '_>, out: &mut W) -> anyhow::Result<()> {
    info!("command activities");

    let state = load(ctx)?;
    let activities = state.activities_by_time();
    let suggestions = if activities.is_empty() {
        suggested_activities(ctx.now)
    } else {
        vec![]
    };
    ctx.renderer
        .write_activities(out, &activities, &suggestions)
}

#[instrument(skip(ctx, out, args))]
fn cmd_activity<W: Write>(
    ctx: &mut CommandContext<'_, '_>,
    out: &mut W,
    args: &[String],
) -> anyhow::Result<()> {
    let Some((sub, rest)) = args.split_first() else {
        return Err(anyhow!(
            "activity: expected one of add, done, delete, edit, suggest"
        ));
    };
    info!(subcommand = %sub, "command activity");

    let mut state = load(ctx)?;
    match sub.as_str() {
        "add" => {
            let (time_token, rest) = rest
                .split_first()
                .ok_or_else(|| anyhow!("activity add: expected HH:MM TITLE"))?;
            let time = parse_clock_time(time_token)?;
            let (title, description) = split_description(rest);
            if title.is_empty() {
                return Err(anyhow!("activity add: title is required"));
            }
            let activity = state.add_activity(time, &title, &description)?;
            ctx.store.save_state(&state)?;
            writeln!(
                out,
                "Actividad {} añadida a las {}.",
                activity.id,
                activity.time.format("%H:%M")
            )?;
        }
        "done" => {
            let (id, _) = split_id(rest, "activity done")?;
            let checked = state.toggle_activity(id)?;
            ctx.store.save_state(&state)?;
            if checked {
                writeln!(out, "Actividad {id} completada.")?;
            } else {
                writeln!(out, "Actividad {id} marcada como pendiente.")?;
            }
        }
        "delete" => {
            let (id, _) = split_id(rest, "activity delete")?;
            let removed = state.delete_activity(id)?;
            ctx.store.save_state(&state)?;
            writeln!(out, "Actividad {} eliminada: {}.", removed.id, removed.title)?;
        }
        "edit" => {
            let (id, rest) = split_id(rest, "activity edit")?;
            let mut activity = state
                .activity(id)
                .cloned()
                .ok_or_else(|| anyhow!("activity not found: {id}"))?;

            let rest = match rest.first().map(|token| parse_clock_time(token)) {
                Some(Ok(time)) => {
                    activity.time = time;
                    &rest[1..]
                }
                _ => rest,
            };
            let (title, description) = split_description(rest);
            if !title.is_empty() {
                activity.title = title;
            }
            if rest.iter().any(|token| description_value(token).is_some()) {
                activity.description = description;
            }

            state.update_activity(activity)?;
            ctx.store.save_state(&state)?;
            writeln!(out, "Actividad {id} actualizada.")?;
        }
        "suggest" => {
            let suggestions = suggested_activities(ctx.now);
            let index: usize = rest
                .first()
                .ok_or_else(|| anyhow!("activity suggest: expected suggestion number"))?
                .parse()
                .context("activity suggest: invalid suggestion number")?;
            let suggestion = index
                .checked_sub(1)
                .and_then(|idx| suggestions.get(idx))
                .ok_or_else(|| anyhow!("no suggestion number {index} for now"))?;

            let activity = state.adopt_suggestion(suggestion)?;
            ctx.store.save_state(&state)?;
            writeln!(
                out,
                "Actividad {} añadida: {}.",
                activity.id, activity.title
            )?;
        }
        other => return Err(anyhow!("unknown activity subcommand: {other}")),
    }

    Ok(())
}

#[instrument(skip(ctx, out, args))]
fn cmd_settings<W: Write>(
    ctx: &mut CommandContext<'_, '_>,
    out: &mut W,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command settings");

    let mut state = load(ctx)?;
    match args {
        [] => {}
        [key, value] if key == "confirm" => {
            state.dont_ask_again = match value.to_ascii_lowercase().as_str() {
                "on" | "si" | "sí" | "yes" | "true" => false,
                "off" | "no" | "false" => true,
                other => return Err(anyhow!("settings confirm: expected on|off, got {other}")),
            };
            ctx.store.save_state(&state)?;
        }
        _ => return Err(anyhow!("settings: expected `confirm on|off`")),
    }

    let confirm = if state.dont_ask_again { "off" } else { "on" };
    writeln!(out, "confirm={confirm}")?;
    Ok(())
}

fn cmd_commands<W: Write>(out: &mut W) -> anyhow::Result<()> {
    for command in known_command_names() {
        writeln!(out, "{command}")?;
    }
    Ok(())
}

fn cmd_show<W: Write>(cfg: &Config, out: &mut W) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        writeln!(out, "{k}={v}")?;
    }
    Ok(())
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(
        out,
        "Comandos: calendar [MES], day FECHA, add TÍTULO [fecha:FECHA], \
         edit ID [TÍTULO] [fecha:FECHA], done ID, delete ID [--yes], list, home, \
         activities, activity add|done|delete|edit|suggest, settings [confirm on|off]"
    )?;
    Ok(())
}

#[derive(Debug, Default)]
struct EventArgs {
    title: String,
    date: Option<NaiveDate>,
}

/// Splits `date:`/`fecha:` modifiers from the title words. Words after `--`
/// are always title.
fn parse_event_args(args: &[String], today: NaiveDate) -> anyhow::Result<EventArgs> {
    let mut parsed = EventArgs::default();
    let mut words = Vec::new();
    let mut literal = false;

    for arg in args {
        if arg == "--" && !literal {
            literal = true;
            continue;
        }

        if !literal
            && let Some((key, value)) = arg.split_once(':')
            && matches!(key.to_lowercase().as_str(), "date" | "fecha")
        {
            parsed.date = Some(parse_date_expr(value, today)?);
            continue;
        }

        words.push(arg.as_str());
    }

    parsed.title = words.join(" ").trim().to_string();
    Ok(parsed)
}

fn description_value(token: &str) -> Option<&str> {
    token
        .strip_prefix("desc:")
        .or_else(|| token.strip_prefix("descripcion:"))
        .or_else(|| token.strip_prefix("descripción:"))
}

/// Title words up to the first `desc:` token; that token and everything
/// after it form the description.
fn split_description(args: &[String]) -> (String, String) {
    let split = args
        .iter()
        .position(|token| description_value(token).is_some())
        .unwrap_or(args.len());

    let title = args[..split].join(" ");
    let description = match args.get(split) {
        Some(first) => {
            let mut parts = vec![description_value(first).unwrap_or_default()];
            parts.extend(args[split + 1..].iter().map(String::as_str));
            parts.join(" ")
        }
        None => String::new(),
    };

    (title.trim().to_string(), description.trim().to_string())
}

fn split_id<'a>(args: &'a [String], command: &str) -> anyhow::Result<(u64, &'a [String])> {
    let (first, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("{command}: expected an id"))?;
    let id = first
        .parse::<u64>()
        .with_context(|| format!("{command}: invalid id: {first}"))?;
    Ok((id, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(ToString::to_string).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("cal", &known), Some("calendar"));
        assert_eq!(expand_command_abbrev("del", &known), Some("delete"));
        assert_eq!(expand_command_abbrev("activity", &known), Some("activity"));
        assert_eq!(expand_command_abbrev("d", &known), None);
        assert_eq!(expand_command_abbrev("act", &known), None);
        assert_eq!(expand_command_abbrev("zzz", &known), None);
    }

    #[test]
    fn delete_answers() {
        assert_eq!(DeleteAnswer::parse("s\n"), DeleteAnswer::Yes);
        assert_eq!(DeleteAnswer::parse(" Sí "), DeleteAnswer::Yes);
        assert_eq!(DeleteAnswer::parse("siempre"), DeleteAnswer::Always);
        assert_eq!(DeleteAnswer::parse(""), DeleteAnswer::No);
        assert_eq!(DeleteAnswer::parse("quizás"), DeleteAnswer::No);
    }

    #[test]
    fn event_args_split_date_from_title() {
        let today = date(2024, 2, 10);
        let parsed =
            parse_event_args(&args(&["Carrera", "fecha:2024-02-12", "por", "el", "parque"]), today)
                .expect("parse");
        assert_eq!(parsed.title, "Carrera por el parque");
        assert_eq!(parsed.date, Some(date(2024, 2, 12)));

        let parsed =
            parse_event_args(&args(&["--", "date:literal"]), today).expect("parse literal");
        assert_eq!(parsed.title, "date:literal");
        assert_eq!(parsed.date, None);

        assert!(parse_event_args(&args(&["Yoga", "date:someday"]), today).is_err());
    }

    #[test]
    fn description_takes_the_tail() {
        let (title, description) =
            split_description(&args(&["Correr", "5km", "desc:Ritmo", "suave"]));
        assert_eq!(title, "Correr 5km");
        assert_eq!(description, "Ritmo suave");

        let (title, description) = split_description(&args(&["Desayuno"]));
        assert_eq!(title, "Desayuno");
        assert!(description.is_empty());
    }

    #[test]
    fn ids_must_be_numeric() {
        let argv = args(&["7", "Yoga"]);
        let (id, rest) = split_id(&argv, "edit").expect("id");
        assert_eq!(id, 7);
        assert_eq!(rest, args(&["Yoga"]).as_slice());

        assert!(split_id(&args(&[]), "done").is_err());
        assert!(split_id(&args(&["siete"]), "done").is_err());
    }
}
