#![allow(non_snake_case)]

use actix_web::{
    App,
    HttpResponse,
    HttpServer,
    dev::ServerHandle,
    web,
};
use chrono::{
    TimeZone,
    Utc,
};
use claimboard::{
    HttpApi,
    Notice,
    StalePolicy,
    Store,
    ValidationError,
    api::{
        ClaimRequestDto,
        ClaimResponseDto,
        HistoryEntryDto,
        NewUserDto,
        PartialUserDto,
        UserDto,
    },
    avatar::{
        AVATAR_PALETTE,
        placeholder_avatar,
    },
};
use std::{
    cmp::Reverse,
    net::TcpListener,
    sync::Mutex,
    thread::JoinHandle,
};

const CLAIM_POINTS: u32 = 7;

#[derive(Default)]
struct Backend {
    users: Vec<UserDto>,
    history: Vec<HistoryEntryDto>,
    fail_leaderboard: bool,
    claims: usize,
}

/// In-process stand-in for the points API, served by actix on an ephemeral
/// port.
struct FakePointsServer {
    base_url: String,
    backend: web::Data<Mutex<Backend>>,
    server_handle: ServerHandle,
    server_thread: Option<JoinHandle<()>>,
}

impl FakePointsServer {
    fn start(users: Vec<UserDto>) -> Self {
        let backend = web::Data::new(Mutex::new(Backend {
            users,
            ..Backend::default()
        }));
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let server_backend = backend.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(server_backend.clone())
                .route("/api/users", web::get().to(handle_users))
                .route("/api/users/add", web::post().to(handle_add_user))
                .route("/api/claim/leaderboard", web::get().to(handle_leaderboard))
                .route("/api/claim/history", web::get().to(handle_history))
                .route("/api/claim/claim", web::post().to(handle_claim))
        })
        .workers(1)
        .listen(listener)
        .unwrap()
        .run();

        let server_handle = server.handle();
        let server_thread = std::thread::spawn(move || {
            let sys = actix_web::rt::System::new();
            let _ = sys.block_on(server);
        });

        Self {
            base_url,
            backend,
            server_handle,
            server_thread: Some(server_thread),
        }
    }

    fn api(&self) -> HttpApi {
        HttpApi::new(&self.base_url).unwrap()
    }

    fn fail_leaderboard(&self) {
        self.backend.lock().unwrap().fail_leaderboard = true;
    }

    fn claims(&self) -> usize {
        self.backend.lock().unwrap().claims
    }

    fn user(&self, id: &str) -> UserDto {
        let backend = self.backend.lock().unwrap();
        backend.users.iter().find(|u| u.id == id).cloned().unwrap()
    }
}

impl Drop for FakePointsServer {
    fn drop(&mut self) {
        let _ = self.server_handle.stop(true);
        if let Some(thread) = self.server_thread.take() {
            let _ = thread.join();
        }
    }
}

async fn handle_users(backend: web::Data<Mutex<Backend>>) -> HttpResponse {
    let backend = backend.lock().unwrap();
    HttpResponse::Ok().json(&backend.users)
}

async fn handle_leaderboard(backend: web::Data<Mutex<Backend>>) -> HttpResponse {
    let backend = backend.lock().unwrap();
    if backend.fail_leaderboard {
        return HttpResponse::InternalServerError().body("leaderboard unavailable");
    }
    let mut ranked = backend.users.clone();
    ranked.sort_by_key(|user| Reverse(user.total_points));
    HttpResponse::Ok().json(ranked)
}

async fn handle_history(backend: web::Data<Mutex<Backend>>) -> HttpResponse {
    let backend = backend.lock().unwrap();
    HttpResponse::Ok().json(&backend.history)
}

async fn handle_claim(
    backend: web::Data<Mutex<Backend>>,
    body: web::Json<ClaimRequestDto>,
) -> HttpResponse {
    let mut backend = backend.lock().unwrap();
    backend.claims += 1;
    let Some(user) = backend.users.iter_mut().find(|u| u.id == body.user_id) else {
        return HttpResponse::NotFound().body("user not found");
    };
    user.total_points += u64::from(CLAIM_POINTS);
    let user = user.clone();
    let claimed_at = Some(
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
            + chrono::Duration::minutes(backend.history.len() as i64),
    );
    backend.history.insert(
        0,
        HistoryEntryDto {
            user: Some(PartialUserDto {
                id: Some(user.id.clone()),
                name: Some(user.name.clone()),
                avatar: user.avatar.clone(),
            }),
            points_claimed: CLAIM_POINTS,
            claimed_at,
        },
    );
    HttpResponse::Ok().json(ClaimResponseDto {
        user,
        points: CLAIM_POINTS,
    })
}

async fn handle_add_user(
    backend: web::Data<Mutex<Backend>>,
    body: web::Json<NewUserDto>,
) -> HttpResponse {
    let mut backend = backend.lock().unwrap();
    let NewUserDto { name, avatar } = body.into_inner();
    let user = UserDto {
        id: format!("u{}", backend.users.len()),
        name,
        avatar: Some(avatar),
        total_points: 0,
    };
    backend.users.push(user.clone());
    HttpResponse::Ok().json(user)
}

fn seed_users() -> Vec<UserDto> {
    vec![
        UserDto {
            id: "a".to_string(),
            name: "Ann".to_string(),
            avatar: None,
            total_points: 50,
        },
        UserDto {
            id: "b".to_string(),
            name: "Bo".to_string(),
            avatar: Some("x.png".to_string()),
            total_points: 30,
        },
    ]
}

#[tokio::test]
async fn load__populates_every_field_with_fallback_avatars() {
    // given
    let server = FakePointsServer::start(seed_users());
    let (mut store, mut events) = Store::new(server.api(), StalePolicy::LastWriteWins);

    // when
    store.load();
    let notices = store.settle(&mut events).await;

    // then
    assert!(notices.is_empty());
    let state = store.state();
    assert_eq!(state.users().len(), 2);
    assert_eq!(state.users()[0].avatar, AVATAR_PALETTE[0]);
    assert_eq!(state.users()[1].avatar, "x.png");
    let ranked: Vec<_> = state.leaderboard().iter().map(|u| u.name.as_str()).collect();
    assert_eq!(ranked, vec!["Ann", "Bo"]);
    assert!(state.history().is_empty());
}

#[tokio::test]
async fn claim__refreshes_leaderboard_and_history_but_not_users() {
    // given
    let server = FakePointsServer::start(seed_users());
    let (mut store, mut events) = Store::new(server.api(), StalePolicy::LastWriteWins);
    store.load();
    store.settle(&mut events).await;
    store.select_user(Some("b".to_string()));

    // when
    store.claim().unwrap();
    store.settle(&mut events).await;

    // then
    let state = store.state();
    let result = state.claim_result().unwrap();
    assert_eq!(result.user.name, "Bo");
    assert_eq!(result.points, CLAIM_POINTS);
    assert_eq!(result.headline(), "Bo just earned +7 Points!");
    assert_eq!(state.leaderboard()[1].total_points, 37);
    assert_eq!(state.history().len(), 1);
    assert_eq!(state.history()[0].user.display_name(), "Bo");
    assert_eq!(state.history()[0].points_claimed, CLAIM_POINTS);
    assert_eq!(state.users()[1].total_points, 30);
}

#[tokio::test]
async fn claim__without_selection_never_reaches_the_server() {
    // given
    let server = FakePointsServer::start(seed_users());
    let (mut store, mut events) = Store::new(server.api(), StalePolicy::LastWriteWins);
    store.load();
    store.settle(&mut events).await;

    // when
    let outcome = store.claim();

    // then
    assert_eq!(outcome, Err(ValidationError::NoUserSelected));
    assert_eq!(store.in_flight(), 0);
    assert_eq!(server.claims(), 0);
}

#[tokio::test]
async fn create_user__sends_placeholder_avatar_and_reloads_users() {
    // given
    let server = FakePointsServer::start(seed_users());
    let (mut store, mut events) = Store::new(server.api(), StalePolicy::LastWriteWins);
    store.load();
    store.settle(&mut events).await;
    store.set_new_user_name("Cy");

    // when
    assert!(store.create_user());
    let notices = store.settle(&mut events).await;

    // then
    assert_eq!(
        notices,
        vec![Notice::UserAdded {
            name: "Cy".to_string()
        }]
    );
    assert_eq!(server.user("u2").avatar, Some(placeholder_avatar("Cy")));
    let state = store.state();
    assert_eq!(state.users().len(), 3);
    assert_eq!(state.users()[2].name, "Cy");
    assert_eq!(state.new_user_name(), "");
}

#[tokio::test]
async fn claim__failed_leaderboard_reload_keeps_previous_rankings() {
    // given
    let server = FakePointsServer::start(seed_users());
    let (mut store, mut events) = Store::new(server.api(), StalePolicy::LastWriteWins);
    store.load();
    store.settle(&mut events).await;
    server.fail_leaderboard();
    store.select_user(Some("a".to_string()));

    // when
    store.claim().unwrap();
    store.settle(&mut events).await;

    // then
    let state = store.state();
    assert_eq!(state.leaderboard()[0].total_points, 50);
    assert_eq!(state.history().len(), 1);
    assert_eq!(state.claim_result().unwrap().user.total_points, 57);
}
