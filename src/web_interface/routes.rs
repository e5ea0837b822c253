use std::convert::Infallible;
use std::sync::Arc;

use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::sse::Event;
use warp::{Filter, Rejection, Reply};

use super::types::*;
use crate::error_handling::types::SessionError;
use crate::session_management::facilitator::{Authenticator, Facilitator};
use crate::session_management::session::Session;
use crate::session_management::session_manager::SessionManager;

/// Header facilitator requests carry their credential in.
pub const TOKEN_HEADER: &str = "x-facilitator-token";

const BODY_LIMIT: u64 = 16 * 1024;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct ApiContext {
    pub manager: Arc<SessionManager>,
    pub auth: Arc<Authenticator>,
}

pub type Route = BoxedFilter<(Response,)>;

type SessionOp = fn(&SessionManager, &Facilitator, &str) -> Result<Session, SessionError>;

fn json_response<T: Serialize>(value: &T, status: StatusCode) -> Response {
    reply::with_status(reply::json(value), status).into_response()
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    json_response(
        &ApiError {
            message: message.into(),
        },
        status,
    )
}

fn respond<T: Serialize>(result: Result<T, SessionError>, ok: StatusCode) -> Response {
    match result {
        Ok(value) => json_response(&value, ok),
        Err(e) => error_response(status_for(&e), e.to_string()),
    }
}

fn facilitator<T: Serialize>(
    ctx: &ApiContext,
    token: Option<&str>,
    op: impl FnOnce(&SessionManager, &Facilitator) -> Result<T, SessionError>,
) -> Response {
    respond(
        ctx.auth.verify(token).and_then(|auth| op(&ctx.manager, &auth)),
        StatusCode::OK,
    )
}

/// Storage backends may block, so handlers run on the blocking pool.
async fn blocking<F>(handler: F) -> Result<Response, Rejection>
where
    F: FnOnce() -> Response + Send + 'static,
{
    match tokio::task::spawn_blocking(handler).await {
        Ok(res) => Ok(res),
        Err(e) => {
            error!("Request handler failed: {}", e);
            Ok(error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))
        }
    }
}

fn with_ctx(ctx: &ApiContext) -> impl Filter<Extract = (ApiContext,), Error = Infallible> + Clone {
    let ctx = ctx.clone();
    warp::any().map(move || ctx.clone())
}

fn token() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>(TOKEN_HEADER)
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(BODY_LIMIT).and(warp::body::json())
}

// ---- handlers ----

/// Facilitators (token present) see every session; everyone else sees open ones.
pub(crate) fn handle_list(ctx: &ApiContext, token: Option<&str>, query: ListQuery) -> Response {
    if token.is_none() {
        return respond(ctx.manager.list_open_sessions(), StatusCode::OK);
    }
    let filter = query.filter();
    facilitator(ctx, token, |m, auth| m.list_sessions(auth, Some(filter)))
}

pub(crate) fn handle_create(
    ctx: &ApiContext,
    token: Option<&str>,
    req: CreateSessionRequest,
) -> Response {
    let result = ctx
        .auth
        .verify(token)
        .and_then(|auth| ctx.manager.create_session(&auth, &req.group_name, req.team_count));
    respond(result, StatusCode::CREATED)
}

pub(crate) fn handle_get(ctx: &ApiContext, code: &str) -> Response {
    respond(ctx.manager.session_view(code), StatusCode::OK)
}

pub(crate) fn handle_delete(ctx: &ApiContext, token: Option<&str>, code: &str) -> Response {
    facilitator(ctx, token, |m, auth| {
        m.delete_session(auth, code).map(|_| DeletedResponse {
            deleted: code.to_string(),
        })
    })
}

pub(crate) fn handle_start_mission(
    ctx: &ApiContext,
    token: Option<&str>,
    code: &str,
    req: StartMissionRequest,
) -> Response {
    facilitator(ctx, token, |m, auth| {
        let config = if req.is_empty() {
            None
        } else {
            Some(req.over(m.get_session(code)?.mission_config()))
        };
        m.start_mission(auth, code, config)
    })
}

pub(crate) fn handle_register(ctx: &ApiContext, code: &str, req: RegisterRequest) -> Response {
    let result = ctx
        .manager
        .register_participant(code, &req.name, req.team_number)
        .map(|participant_id| RegisterResponse { participant_id });
    respond(result, StatusCode::CREATED)
}

pub(crate) fn handle_submit(
    ctx: &ApiContext,
    code: &str,
    team: u32,
    req: SubmitRequest,
) -> Response {
    respond(
        ctx.manager
            .submit_final_answer(code, team, &req.user_name, &req.answer),
        StatusCode::OK,
    )
}

/// Streams the session document: a `session` event after every write, then
/// one `deleted` event if the session is removed.
pub(crate) async fn handle_events(ctx: ApiContext, code: String) -> Response {
    let manager = ctx.manager.clone();
    let wanted = code.clone();
    let rx = match tokio::task::spawn_blocking(move || manager.subscribe(&wanted)).await {
        Ok(Ok(rx)) => rx,
        Ok(Err(e)) => return error_response(status_for(&e), e.to_string()),
        Err(e) => {
            error!("Subscription task failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
        }
    };
    let missing = rx.borrow().is_none();
    if missing {
        let e = SessionError::NotFound(code);
        return error_response(status_for(&e), e.to_string());
    }

    debug!("Event stream opened for session {}", code);
    let events =
        WatchStream::new(rx).map(move |doc| Ok::<_, Infallible>(session_event(&code, doc)));
    warp::sse::reply(warp::sse::keep_alive().stream(events)).into_response()
}

fn session_event(code: &str, doc: Option<Session>) -> Event {
    match doc {
        Some(session) => Event::default()
            .event("session")
            .json_data(&session)
            .unwrap_or_else(|e| {
                error!("Failed to encode session {} for streaming: {}", code, e);
                Event::default().event("error").data("encoding failed")
            }),
        None => Event::default().event("deleted").data(code),
    }
}

// ---- routes ----

/// POST /sessions/:code/<action> for transitions that take no body.
fn session_op_route<P>(ctx: &ApiContext, path: P, op: SessionOp) -> Route
where
    P: Filter<Extract = (String,), Error = Rejection> + Clone + Send + Sync + 'static,
{
    path.and(warp::post())
        .and(token())
        .and(with_ctx(ctx))
        .and_then(move |code: String, token: Option<String>, ctx: ApiContext| {
            blocking(move || facilitator(&ctx, token.as_deref(), |m, auth| op(m, auth, &code)))
        })
        .boxed()
}

/// GET /sessions
pub fn list_sessions_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions")
        .and(warp::get())
        .and(token())
        .and(warp::query::<ListQuery>())
        .and(with_ctx(ctx))
        .and_then(|token: Option<String>, query: ListQuery, ctx: ApiContext| {
            blocking(move || handle_list(&ctx, token.as_deref(), query))
        })
        .boxed()
}

/// POST /sessions
pub fn create_session_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions")
        .and(warp::post())
        .and(token())
        .and(json_body::<CreateSessionRequest>())
        .and(with_ctx(ctx))
        .and_then(|token: Option<String>, req: CreateSessionRequest, ctx: ApiContext| {
            blocking(move || handle_create(&ctx, token.as_deref(), req))
        })
        .boxed()
}

/// GET /sessions/:code
pub fn get_session_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions" / String)
        .and(warp::get())
        .and(with_ctx(ctx))
        .and_then(|code: String, ctx: ApiContext| blocking(move || handle_get(&ctx, &code)))
        .boxed()
}

/// DELETE /sessions/:code
pub fn delete_session_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions" / String)
        .and(warp::delete())
        .and(token())
        .and(with_ctx(ctx))
        .and_then(|code: String, token: Option<String>, ctx: ApiContext| {
            blocking(move || handle_delete(&ctx, token.as_deref(), &code))
        })
        .boxed()
}

/// POST /sessions/:code/mission
pub fn start_mission_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions" / String / "mission")
        .and(warp::post())
        .and(token())
        .and(json_body::<StartMissionRequest>())
        .and(with_ctx(ctx))
        .and_then(
            |code: String, token: Option<String>, req: StartMissionRequest, ctx: ApiContext| {
                blocking(move || handle_start_mission(&ctx, token.as_deref(), &code, req))
            },
        )
        .boxed()
}

/// POST /sessions/:code/phases/:index
pub fn start_phase_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions" / String / "phases" / i32)
        .and(warp::post())
        .and(token())
        .and(with_ctx(ctx))
        .and_then(|code: String, index: i32, token: Option<String>, ctx: ApiContext| {
            blocking(move || {
                facilitator(&ctx, token.as_deref(), |m, auth| m.start_phase(auth, &code, index))
            })
        })
        .boxed()
}

/// GET /sessions/:code/leaderboard
pub fn leaderboard_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions" / String / "leaderboard")
        .and(warp::get())
        .and(token())
        .and(with_ctx(ctx))
        .and_then(|code: String, token: Option<String>, ctx: ApiContext| {
            blocking(move || {
                facilitator(&ctx, token.as_deref(), |m, auth| m.leaderboard(auth, &code))
            })
        })
        .boxed()
}

/// GET /sessions/:code/roster
pub fn roster_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions" / String / "roster")
        .and(warp::get())
        .and(token())
        .and(with_ctx(ctx))
        .and_then(|code: String, token: Option<String>, ctx: ApiContext| {
            blocking(move || {
                facilitator(&ctx, token.as_deref(), |m, auth| m.team_roster(auth, &code))
            })
        })
        .boxed()
}

/// POST /sessions/:code/participants
pub fn register_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions" / String / "participants")
        .and(warp::post())
        .and(json_body::<RegisterRequest>())
        .and(with_ctx(ctx))
        .and_then(|code: String, req: RegisterRequest, ctx: ApiContext| {
            blocking(move || handle_register(&ctx, &code, req))
        })
        .boxed()
}

/// PUT /sessions/:code/chat/:participant_id
pub fn chat_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions" / String / "chat" / String)
        .and(warp::put())
        .and(json_body::<TextRequest>())
        .and(with_ctx(ctx))
        .and_then(|code: String, pid: String, req: TextRequest, ctx: ApiContext| {
            blocking(move || {
                respond(ctx.manager.post_chat(&code, &pid, &req.text), StatusCode::OK)
            })
        })
        .boxed()
}

/// PUT /sessions/:code/notes/:participant_id
pub fn personal_note_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions" / String / "notes" / String)
        .and(warp::put())
        .and(json_body::<TextRequest>())
        .and(with_ctx(ctx))
        .and_then(|code: String, pid: String, req: TextRequest, ctx: ApiContext| {
            blocking(move || {
                respond(ctx.manager.post_personal_note(&code, &pid, &req.text), StatusCode::OK)
            })
        })
        .boxed()
}

/// PUT /sessions/:code/memos/:team
pub fn team_memo_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions" / String / "memos" / u32)
        .and(warp::put())
        .and(json_body::<TextRequest>())
        .and(with_ctx(ctx))
        .and_then(|code: String, team: u32, req: TextRequest, ctx: ApiContext| {
            blocking(move || {
                respond(ctx.manager.post_team_memo(&code, team, &req.text), StatusCode::OK)
            })
        })
        .boxed()
}

/// POST /sessions/:code/submissions/:team
pub fn submit_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions" / String / "submissions" / u32)
        .and(warp::post())
        .and(json_body::<SubmitRequest>())
        .and(with_ctx(ctx))
        .and_then(|code: String, team: u32, req: SubmitRequest, ctx: ApiContext| {
            blocking(move || handle_submit(&ctx, &code, team, req))
        })
        .boxed()
}

/// GET /sessions/:code/teams/:team/clues[?all=true]
pub fn team_clues_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions" / String / "teams" / u32 / "clues")
        .and(warp::get())
        .and(warp::query::<CluesQuery>())
        .and(with_ctx(ctx))
        .and_then(|code: String, team: u32, query: CluesQuery, ctx: ApiContext| {
            blocking(move || {
                respond(ctx.manager.clues_for_team(&code, team, query.all), StatusCode::OK)
            })
        })
        .boxed()
}

/// GET /sessions/:code/teams/:team/notes
pub fn team_notes_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions" / String / "teams" / u32 / "notes")
        .and(warp::get())
        .and(with_ctx(ctx))
        .and_then(|code: String, team: u32, ctx: ApiContext| {
            blocking(move || respond(ctx.manager.team_memo_board(&code, team), StatusCode::OK))
        })
        .boxed()
}

/// GET /sessions/:code/teams/:team/result
pub fn team_result_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions" / String / "teams" / u32 / "result")
        .and(warp::get())
        .and(with_ctx(ctx))
        .and_then(|code: String, team: u32, ctx: ApiContext| {
            blocking(move || respond(ctx.manager.team_result(&code, team), StatusCode::OK))
        })
        .boxed()
}

/// GET /sessions/:code/events
pub fn session_events_route(ctx: &ApiContext) -> Route {
    warp::path!("sessions" / String / "events")
        .and(warp::get())
        .and(with_ctx(ctx))
        .then(|code: String, ctx: ApiContext| handle_events(ctx, code))
        .boxed()
}

/// Every API route, facilitator and participant.
pub fn api_routes(ctx: &ApiContext) -> Route {
    let facilitator_ops = session_op_route(
        ctx,
        warp::path!("sessions" / String / "open"),
        SessionManager::toggle_open,
    )
    .or(session_op_route(
        ctx,
        warp::path!("sessions" / String / "advance"),
        SessionManager::advance_phase,
    ))
    .unify()
    .or(session_op_route(
        ctx,
        warp::path!("sessions" / String / "pause"),
        SessionManager::pause_phase,
    ))
    .unify()
    .or(session_op_route(
        ctx,
        warp::path!("sessions" / String / "resume"),
        SessionManager::resume_phase,
    ))
    .unify()
    .or(session_op_route(
        ctx,
        warp::path!("sessions" / String / "mission" / "pause"),
        SessionManager::pause_mission,
    ))
    .unify()
    .or(session_op_route(
        ctx,
        warp::path!("sessions" / String / "mission" / "resume"),
        SessionManager::resume_mission,
    ))
    .unify()
    .or(session_op_route(
        ctx,
        warp::path!("sessions" / String / "submit-gate"),
        SessionManager::toggle_submit_enabled,
    ))
    .unify()
    .or(session_op_route(
        ctx,
        warp::path!("sessions" / String / "reveal" / "answers"),
        SessionManager::reveal_answers,
    ))
    .unify()
    .or(session_op_route(
        ctx,
        warp::path!("sessions" / String / "reveal" / "success"),
        SessionManager::reveal_success,
    ))
    .unify()
    .or(session_op_route(
        ctx,
        warp::path!("sessions" / String / "release"),
        SessionManager::release_results,
    ))
    .unify()
    .or(session_op_route(
        ctx,
        warp::path!("sessions" / String / "reset"),
        SessionManager::reset_session,
    ))
    .unify();

    list_sessions_route(ctx)
        .or(create_session_route(ctx))
        .unify()
        .or(get_session_route(ctx))
        .unify()
        .or(delete_session_route(ctx))
        .unify()
        .or(start_mission_route(ctx))
        .unify()
        .or(start_phase_route(ctx))
        .unify()
        .or(facilitator_ops)
        .unify()
        .or(leaderboard_route(ctx))
        .unify()
        .or(roster_route(ctx))
        .unify()
        .or(register_route(ctx))
        .unify()
        .or(chat_route(ctx))
        .unify()
        .or(personal_note_route(ctx))
        .unify()
        .or(team_memo_route(ctx))
        .unify()
        .or(submit_route(ctx))
        .unify()
        .or(team_clues_route(ctx))
        .unify()
        .or(team_notes_route(ctx))
        .unify()
        .or(team_result_route(ctx))
        .unify()
        .or(session_events_route(ctx))
        .unify()
        .boxed()
}
