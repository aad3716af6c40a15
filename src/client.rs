use crate::{
    api::{
        HttpApi,
        LeaderboardApi,
    },
    avatar::AVATAR_PALETTE,
    config::AppConfig,
    model::User,
    store::{
        Notice,
        Store,
        SyncEvents,
    },
    ui,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use std::path::Path;
use tracing::{
    info,
    warn,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

const LOG_FILE_NAME: &str = "claimboard.log";

/// Routes `tracing` output to a daily rolling file under `log_dir`. The
/// terminal belongs to the UI, so nothing is written to stdout. Keep the
/// returned guard alive until exit or buffered lines are lost.
pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("creating log directory {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Ok(guard)
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let api = HttpApi::new(&config.api_url)?;
    info!(api = %api, policy = ?config.stale_policy, "starting claimboard");
    let (mut store, mut sync_events) = Store::new(api, config.stale_policy);
    store.load();

    let mut ui_state = ui::UiState::new(config.api_url.clone());
    let mut input_events = ui::input_event_stream();

    ui::terminal_enter(&mut ui_state)?;
    info!("UI ready");
    let res = run_loop(&mut store, &mut sync_events, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

async fn run_loop<A: LeaderboardApi>(
    store: &mut Store<A>,
    sync_events: &mut SyncEvents,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    redraw(store, ui_state).wrap_err("initial draw failed")?;

    loop {
        tokio::select! {
            maybe_event = sync_events.recv() => {
                let Some(event) = maybe_event else {
                    warn!("sync event channel closed");
                    break;
                };
                if let Some(notice) = store.apply(event) {
                    show_notice(ui_state, notice);
                }
                redraw(store, ui_state).wrap_err("draw after sync event failed")?;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, store.state(), event) else {
                    continue;
                };
                if handle_user_event(store, ui_state, ev) == Flow::Quit {
                    break;
                }
                redraw(store, ui_state).wrap_err("draw after input failed")?;
            }
        }
    }
    info!(in_flight = store.in_flight(), "shutting down");
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn handle_user_event<A: LeaderboardApi>(
    store: &mut Store<A>,
    ui_state: &mut ui::UiState,
    ev: ui::UserEvent,
) -> Flow {
    match ev {
        ui::UserEvent::Quit => return Flow::Quit,
        ui::UserEvent::Redraw | ui::UserEvent::OpenAddUser => {}
        ui::UserEvent::SelectNext => {
            let next = step_selection(store.state().users(), store.state().selected_user_id(), true);
            store.select_user(next);
        }
        ui::UserEvent::SelectPrev => {
            let prev =
                step_selection(store.state().users(), store.state().selected_user_id(), false);
            store.select_user(prev);
        }
        ui::UserEvent::Claim => {
            if let Err(reason) = store.claim() {
                show_notice(ui_state, Notice::Rejected(reason));
            }
        }
        ui::UserEvent::EditName(name) => store.set_new_user_name(name),
        ui::UserEvent::ChooseAvatar(index) => {
            let avatar = AVATAR_PALETTE.get(index).map(|url| url.to_string());
            store.choose_avatar(avatar);
        }
        ui::UserEvent::SubmitNewUser => {
            if !store.create_user() {
                info!("ignoring add-user submit with blank name");
            }
        }
    }
    Flow::Continue
}

fn show_notice(ui_state: &mut ui::UiState, notice: Notice) {
    info!(%notice, "notice");
    ui_state.show_notice(notice.to_string());
}

fn redraw<A: LeaderboardApi>(store: &Store<A>, ui_state: &mut ui::UiState) -> Result<()> {
    ui_state.set_pending(store.in_flight());
    ui::draw(ui_state, store.state())
}

/// Moves the selection one row through `users`, where the row above the
/// first user is the empty "-- Select --" choice. An id no longer present
/// in the list counts as nothing selected.
fn step_selection(users: &[User], current: Option<&str>, forward: bool) -> Option<String> {
    let position = current.and_then(|id| users.iter().position(|user| user.id == id));
    let next = match (position, forward) {
        (None, true) => users.first(),
        (None, false) => None,
        (Some(idx), true) => users.get(idx + 1).or_else(|| users.get(idx)),
        (Some(0), false) => None,
        (Some(idx), false) => users.get(idx - 1),
    };
    next.map(|user| user.id.clone())
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Vec<User> {
        ["a", "b", "c"]
            .iter()
            .map(|id| User {
                id: id.to_string(),
                name: id.to_uppercase(),
                avatar: AVATAR_PALETTE[0].to_string(),
                total_points: 0,
            })
            .collect()
    }

    #[test]
    fn step_selection__forward_from_nothing_picks_first_user() {
        assert_eq!(step_selection(&users(), None, true), Some("a".to_string()));
    }

    #[test]
    fn step_selection__stops_at_last_user() {
        assert_eq!(step_selection(&users(), Some("c"), true), Some("c".to_string()));
    }

    #[test]
    fn step_selection__back_from_first_user_clears_selection() {
        assert_eq!(step_selection(&users(), Some("a"), false), None);
        assert_eq!(step_selection(&users(), Some("c"), false), Some("b".to_string()));
    }

    #[test]
    fn step_selection__unknown_id_behaves_like_no_selection() {
        // given
        let users = users();

        // when
        let next = step_selection(&users, Some("gone"), true);

        // then
        assert_eq!(next, Some("a".to_string()));
    }

    #[test]
    fn step_selection__empty_list_selects_nothing() {
        assert_eq!(step_selection(&[], None, true), None);
    }
}
