// traffic-monitor/tests/support/mod.rs
// Local stand-in for the firewall backend: the traffic-log endpoint and the push channel.
#![allow(dead_code)]

use actix::{Actor, ActorContext, Addr, AsyncContext, Handler, Message, StreamHandler};
use actix_web::{dev::ServerHandle, web, App, Error, HttpRequest, HttpResponse, HttpServer};
use actix_web_actors::ws;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

pub const REJECTED_TOKEN: &str = "rejected-token";

#[derive(Default)]
pub struct BackendState {
    /// Text frames received from clients, in order
    pub received: Mutex<Vec<String>>,
    pub sessions: Mutex<Vec<Addr<PushSession>>>,
}

impl BackendState {
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Send a frame to every subscribed client
    pub fn push(&self, frame: Value) {
        for session in self.sessions.lock().unwrap().iter() {
            session.do_send(Push(frame.to_string()));
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

pub fn log_json(ip: &str, url: &str, status: u16, ts: &str) -> Value {
    json!({ "ip": ip, "url": url, "method": "GET", "statusCode": status, "timestamp": ts })
}

#[derive(Deserialize)]
struct PageQuery {
    page: u32,
    limit: u32,
}

async fn traffic_log(req: HttpRequest, query: web::Query<PageQuery>) -> HttpResponse {
    let auth = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !auth.starts_with("Bearer ") || auth == format!("Bearer {}", REJECTED_TOKEN) {
        return HttpResponse::Unauthorized().finish();
    }

    if req.headers().get("x-dashboard-request").and_then(|v| v.to_str().ok()) != Some("true") {
        return HttpResponse::BadRequest().finish();
    }

    match query.page {
        1 => HttpResponse::Ok().json(json!({
            "logs": [
                log_json("10.0.0.1", "/index", 200, "2024-05-01T10:00:02.000Z"),
                log_json("10.0.0.2", "/login", 401, "2024-05-01T10:00:01.000Z"),
            ],
            "totalPages": 2,
            "limit": query.limit
        })),
        2 => HttpResponse::Ok().json(json!({
            "logs": [log_json("10.0.0.1", "/index", 500, "2024-05-01T09:00:00.000Z")],
            "totalPages": 2
        })),
        _ => HttpResponse::InternalServerError().finish(),
    }
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Push(String);

pub struct PushSession {
    app_id: String,
    state: web::Data<BackendState>,
}

impl Actor for PushSession {
    type Context = ws::WebsocketContext<Self>;
}

impl Handler<Push> for PushSession {
    type Result = ();

    fn handle(&mut self, msg: Push, ctx: &mut Self::Context) -> Self::Result {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for PushSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.state.received.lock().unwrap().push(text.to_string());

                let value: Value = serde_json::from_str(&text).unwrap_or_default();
                if value["event"] == "subscribe" && value["data"]["appId"] == self.app_id.as_str() {
                    self.state.sessions.lock().unwrap().push(ctx.address());
                }
            },
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            },
            _ => {}
        }
    }
}

#[derive(Deserialize)]
struct ChannelQuery {
    #[serde(rename = "appId")]
    app_id: String,
}

async fn traffic_channel(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<ChannelQuery>,
    state: web::Data<BackendState>,
) -> Result<HttpResponse, Error> {
    let session = PushSession {
        app_id: query.into_inner().app_id,
        state,
    };
    ws::start(session, &req, stream)
}

/// Start the backend on an ephemeral port; returns its `host:port`
pub fn start_backend(state: web::Data<BackendState>) -> (String, ServerHandle) {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/api/apps/{app_id}/traffic-log", web::get().to(traffic_log))
            .route("/traffic", web::get().to(traffic_channel))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("bind test backend");

    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    (format!("127.0.0.1:{}", addr.port()), handle)
}

/// Poll `check` until it holds or a few seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
