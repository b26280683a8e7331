// traffic-monitor/src/actors/session_actor.rs
use actix::{Actor, ActorContext, AsyncContext, Context, Handler, Message, SpawnHandle};
use chrono::{DateTime, Utc};
use common::token_expiry;
use std::time::Duration;

use crate::error::AuthError;

/// Actor message: Store a bearer token issued by the auth service
#[derive(Message)]
#[rtype(result = "Result<DateTime<Utc>, AuthError>")]
pub struct Login {
    pub token: String,
}

/// Actor message: Drop the current token
#[derive(Message)]
#[rtype(result = "()")]
pub struct Logout {
    pub reason: String,
}

/// Actor message: Current bearer token, if logged in
#[derive(Message)]
#[rtype(result = "Option<String>")]
pub struct GetToken;

/// Actor message: Whether a token is held
#[derive(Message)]
#[rtype(result = "bool")]
pub struct IsLoggedIn;

/// Actor message: Stop the session actor
#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;

/// Holds the dashboard's credential and logs out when it expires
pub struct SessionActor {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    check_interval: Duration,
    expiry_timer: Option<SpawnHandle>,
}

impl SessionActor {
    pub fn new(check_interval: Duration) -> Self {
        Self {
            token: None,
            expires_at: None,
            check_interval,
            expiry_timer: None,
        }
    }

    fn clear(&mut self, ctx: &mut Context<Self>, reason: &str) {
        if let Some(handle) = self.expiry_timer.take() {
            ctx.cancel_future(handle);
        }
        if self.token.take().is_some() {
            tracing::info!("Logged out: {}", reason);
        }
        self.expires_at = None;
    }

    /// Log out if the held token has expired
    fn check_expiry(&mut self, ctx: &mut Context<Self>) {
        if let Some(expires_at) = self.expires_at {
            if Utc::now() >= expires_at {
                self.clear(ctx, "token expired");
            }
        }
    }
}

impl Actor for SessionActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("SessionActor started, checking expiry every {:?}", self.check_interval);

        ctx.run_interval(self.check_interval, |act, ctx| {
            act.check_expiry(ctx);
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("SessionActor stopped");
    }
}

impl Handler<Login> for SessionActor {
    type Result = Result<DateTime<Utc>, AuthError>;

    fn handle(&mut self, msg: Login, ctx: &mut Self::Context) -> Self::Result {
        let expires_at = match token_expiry(&msg.token) {
            Ok(expires_at) => expires_at,
            Err(e) => {
                tracing::error!("Error checking token: {}", e);
                self.clear(ctx, "invalid token");
                return Err(AuthError::InvalidToken(e));
            }
        };

        let remaining = expires_at.signed_duration_since(Utc::now());
        let remaining = match remaining.to_std() {
            Ok(remaining) if !remaining.is_zero() => remaining,
            _ => {
                self.clear(ctx, "token expired");
                return Err(AuthError::Expired);
            }
        };

        self.clear(ctx, "replaced by new login");
        self.token = Some(msg.token);
        self.expires_at = Some(expires_at);

        // Logout exactly at expiry; the interval check covers clock drift
        self.expiry_timer = Some(ctx.run_later(remaining, |act, ctx| {
            act.expiry_timer = None;
            act.clear(ctx, "token expired");
        }));

        tracing::info!("Logged in, token expires at {}", expires_at);
        Ok(expires_at)
    }
}

impl Handler<Logout> for SessionActor {
    type Result = ();

    fn handle(&mut self, msg: Logout, ctx: &mut Self::Context) -> Self::Result {
        self.clear(ctx, &msg.reason);
    }
}

impl Handler<GetToken> for SessionActor {
    type Result = Option<String>;

    fn handle(&mut self, _msg: GetToken, ctx: &mut Self::Context) -> Self::Result {
        self.check_expiry(ctx);
        self.token.clone()
    }
}

impl Handler<IsLoggedIn> for SessionActor {
    type Result = bool;

    fn handle(&mut self, _msg: IsLoggedIn, ctx: &mut Self::Context) -> Self::Result {
        self.check_expiry(ctx);
        self.token.is_some()
    }
}

impl Handler<Shutdown> for SessionActor {
    type Result = ();

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        self.clear(ctx, "shutdown");
        ctx.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::TokenClaims;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_expiring_in(secs: i64) -> String {
        let claims = TokenClaims { exp: Utc::now().timestamp() + secs };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret")).unwrap()
    }

    #[actix::test]
    async fn test_login_and_logout() {
        let session = SessionActor::new(Duration::from_secs(60)).start();

        assert!(!session.send(IsLoggedIn).await.unwrap());
        let token = token_expiring_in(3600);
        session.send(Login { token: token.clone() }).await.unwrap().unwrap();

        assert_eq!(session.send(GetToken).await.unwrap(), Some(token));

        session.send(Logout { reason: "user request".into() }).await.unwrap();
        assert!(session.send(GetToken).await.unwrap().is_none());
    }

    #[actix::test]
    async fn test_expired_token_is_refused() {
        let session = SessionActor::new(Duration::from_secs(60)).start();

        let result = session.send(Login { token: token_expiring_in(-10) }).await.unwrap();
        assert!(matches!(result, Err(AuthError::Expired)));
        assert!(!session.send(IsLoggedIn).await.unwrap());
    }

    #[actix::test]
    async fn test_invalid_token_is_refused() {
        let session = SessionActor::new(Duration::from_secs(60)).start();

        let result = session.send(Login { token: "garbage".into() }).await.unwrap();
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[actix::test]
    async fn test_auto_logout_at_expiry() {
        let session = SessionActor::new(Duration::from_secs(60)).start();

        session.send(Login { token: token_expiring_in(2) }).await.unwrap().unwrap();
        assert!(session.send(IsLoggedIn).await.unwrap());

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert!(!session.send(IsLoggedIn).await.unwrap());
    }
}
