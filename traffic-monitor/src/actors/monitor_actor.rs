// traffic-monitor/src/actors/monitor_actor.rs
use actix::prelude::*;
use common::LogEntry;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::session_actor::{GetToken, Logout, SessionActor};
use crate::aggregator::IpAggregate;
use crate::error::MonitorError;
use crate::fetcher::PageFetcher;
use crate::state::{DisplayMode, FetchOutcome, MonitorState, MonitorStatus, TrafficView};
use crate::subscriber::{FeedEvent, FeedSubscriber, Subscription};
use crate::transport::ConnectionStatus;

/// Result of a page load: number of new entries merged
pub type LoadResult = Result<usize, MonitorError>;

/// Actor message: Monitor another application (or none); loads page 1
#[derive(Message)]
#[rtype(result = "LoadResult")]
pub struct SwitchApp {
    pub app_id: Option<String>,
}

/// Actor message: Load one page of history
#[derive(Message)]
#[rtype(result = "LoadResult")]
pub struct FetchPage {
    pub page: u32,
}

/// Actor message: Reload page 1, replacing the log set
#[derive(Message)]
#[rtype(result = "LoadResult")]
pub struct Refresh;

#[derive(Message)]
#[rtype(result = "()")]
pub struct SetDisplayMode(pub DisplayMode);

/// Actor message: Toggle the IP shown in the grouped drill-down
#[derive(Message)]
#[rtype(result = "()")]
pub struct SelectIp(pub Option<String>);

#[derive(Message)]
#[rtype(result = "Vec<LogEntry>")]
pub struct GetEntries;

#[derive(Message)]
#[rtype(result = "BTreeMap<String, IpAggregate>")]
pub struct GetAggregates;

#[derive(Message)]
#[rtype(result = "TrafficView")]
pub struct GetView;

#[derive(Message)]
#[rtype(result = "MonitorStatus")]
pub struct GetStatus;

/// Actor message: Stop monitoring and release the push channel
#[derive(Message)]
#[rtype(result = "()")]
pub struct Close;

/// Push channel event tagged with the epoch its subscription was opened in
#[derive(Message)]
#[rtype(result = "()")]
struct Feed {
    epoch: u64,
    event: FeedEvent,
}

/// View model over one application's traffic.
///
/// Pushed events, fetch completions and UI requests are all messages to this
/// actor, so the log set is only ever touched from its context.
pub struct TrafficMonitor {
    state: MonitorState,
    subscriber: FeedSubscriber,
    fetcher: Arc<dyn PageFetcher>,
    session: Addr<SessionActor>,
    page_size: u32,
    subscription: Option<Subscription>,
}

impl TrafficMonitor {
    pub fn new(
        subscriber: FeedSubscriber,
        fetcher: Arc<dyn PageFetcher>,
        session: Addr<SessionActor>,
        page_size: u32,
    ) -> Self {
        Self {
            state: MonitorState::new(),
            subscriber,
            fetcher,
            session,
            page_size: page_size.max(1),
            subscription: None,
        }
    }

    fn release_channel(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            tracing::info!("Disconnecting push channel for {}", subscription.app_id());
            subscription.close();
        }
    }

    /// Issue a page request and apply its completion on this actor
    fn load_page(&mut self, page: u32) -> ResponseActFuture<Self, LoadResult> {
        let ticket = match self.state.begin_fetch(page) {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::warn!("Page {} not requested: {}", page, e);
                return Box::pin(fut::ready(Err(MonitorError::from(e))));
            }
        };

        let fetcher = self.fetcher.clone();
        let session = self.session.clone();
        let page_size = self.page_size;
        let app_id = ticket.app_id.clone();

        let request = async move {
            let token = session.send(GetToken).await.ok().flatten();
            fetcher.fetch_page(&app_id, page, page_size, token.as_deref()).await
        };

        Box::pin(request.into_actor(self).map(move |result, act, _ctx| {
            match act.state.complete_fetch(&ticket, result) {
                FetchOutcome::Applied(added) => {
                    tracing::info!(
                        "Loaded page {} for {} ({} new entries)",
                        ticket.page,
                        ticket.app_id,
                        added
                    );
                    Ok(added)
                },
                FetchOutcome::Stale => Ok(0),
                FetchOutcome::Failed(err) => {
                    tracing::error!("Error fetching logs for {}: {}", ticket.app_id, err);
                    if let MonitorError::Auth(_) = err {
                        act.session.do_send(Logout { reason: err.to_string() });
                    }
                    Err(err)
                }
            }
        }))
    }
}

impl Actor for TrafficMonitor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("TrafficMonitor started");
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.release_channel();
        tracing::info!("TrafficMonitor stopped");
    }
}

impl Handler<SwitchApp> for TrafficMonitor {
    type Result = ResponseActFuture<Self, LoadResult>;

    fn handle(&mut self, msg: SwitchApp, ctx: &mut Self::Context) -> Self::Result {
        if msg.app_id.is_some() && self.state.app_id() == msg.app_id.as_deref() {
            tracing::debug!("Already monitoring {:?}", msg.app_id);
            return Box::pin(fut::ready(Ok(0)));
        }

        self.release_channel();
        let epoch = self.state.switch_app(msg.app_id.clone());

        let app_id = match msg.app_id {
            Some(app_id) => app_id,
            None => return Box::pin(fut::ready(Ok(0))),
        };

        tracing::info!("Initializing traffic monitoring for app: {}", app_id);
        // The transport task must not keep this actor alive
        let addr = ctx.address().downgrade();
        self.subscription = self.subscriber.subscribe(&app_id, move |event| {
            if let Some(addr) = addr.upgrade() {
                addr.do_send(Feed { epoch, event });
            }
        });

        if self.subscription.is_none() {
            tracing::warn!("Push channel for {} unavailable; history only", app_id);
            self.state.on_connection_status(epoch, ConnectionStatus::Closed);
        }

        self.load_page(1)
    }
}

impl Handler<FetchPage> for TrafficMonitor {
    type Result = ResponseActFuture<Self, LoadResult>;

    fn handle(&mut self, msg: FetchPage, _ctx: &mut Self::Context) -> Self::Result {
        self.load_page(msg.page)
    }
}

impl Handler<Refresh> for TrafficMonitor {
    type Result = ResponseActFuture<Self, LoadResult>;

    fn handle(&mut self, _msg: Refresh, _ctx: &mut Self::Context) -> Self::Result {
        self.load_page(1)
    }
}

impl Handler<Feed> for TrafficMonitor {
    type Result = ();

    fn handle(&mut self, msg: Feed, _ctx: &mut Self::Context) -> Self::Result {
        match msg.event {
            FeedEvent::Traffic(raw) => {
                if self.state.on_push(msg.epoch, raw) {
                    tracing::debug!("Added pushed entry (epoch {})", msg.epoch);
                }
            },
            FeedEvent::Status(status) => {
                if status == ConnectionStatus::Live {
                    tracing::info!("Live monitoring for {:?}", self.state.app_id());
                }
                self.state.on_connection_status(msg.epoch, status);
            }
        }
    }
}

impl Handler<SetDisplayMode> for TrafficMonitor {
    type Result = ();

    fn handle(&mut self, msg: SetDisplayMode, _ctx: &mut Self::Context) -> Self::Result {
        self.state.set_display_mode(msg.0);
    }
}

impl Handler<SelectIp> for TrafficMonitor {
    type Result = ();

    fn handle(&mut self, msg: SelectIp, _ctx: &mut Self::Context) -> Self::Result {
        self.state.select_ip(msg.0);
    }
}

impl Handler<GetEntries> for TrafficMonitor {
    type Result = MessageResult<GetEntries>;

    fn handle(&mut self, _msg: GetEntries, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.state.entries())
    }
}

impl Handler<GetAggregates> for TrafficMonitor {
    type Result = MessageResult<GetAggregates>;

    fn handle(&mut self, _msg: GetAggregates, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.state.aggregates())
    }
}

impl Handler<GetView> for TrafficMonitor {
    type Result = MessageResult<GetView>;

    fn handle(&mut self, _msg: GetView, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.state.view())
    }
}

impl Handler<GetStatus> for TrafficMonitor {
    type Result = MessageResult<GetStatus>;

    fn handle(&mut self, _msg: GetStatus, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.state.status())
    }
}

impl Handler<Close> for TrafficMonitor {
    type Result = ();

    fn handle(&mut self, _msg: Close, _ctx: &mut Self::Context) -> Self::Result {
        self.release_channel();
        self.state.switch_app(None);
    }
}
