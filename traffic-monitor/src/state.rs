// traffic-monitor/src/state.rs
use common::{LogEntry, RawLogEntry};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::aggregator::{aggregate_by_ip, IpAggregate};
use crate::error::{FetchError, MonitorError};
use crate::fetcher::Page;
use crate::pagination::Pagination;
use crate::reconciler::LogSet;
use crate::transport::ConnectionStatus;

pub const NO_LOGS_MESSAGE: &str = "No logs found.";

/// Which projection of the log set is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DisplayMode {
    #[default]
    Grouped,
    All,
}

/// Identifies one issued page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub epoch: u64,
    pub seq: u64,
    pub app_id: String,
    pub page: u32,
}

impl FetchTicket {
    pub fn is_first_page(&self) -> bool {
        self.page == 1
    }
}

/// Result of applying a fetch completion
#[derive(Debug)]
pub enum FetchOutcome {
    /// Page merged; carries the number of new entries
    Applied(usize),
    /// Completion belonged to a superseded request or an old epoch
    Stale,
    Failed(MonitorError),
}

/// Snapshot of the monitor's status flags
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorStatus {
    pub app_id: Option<String>,
    pub epoch: u64,
    pub connection: ConnectionStatus,
    pub pagination: Pagination,
    pub loading: bool,
    pub error: Option<String>,
    pub display_mode: DisplayMode,
    pub entry_count: usize,
}

/// What the presentation layer renders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TrafficView {
    Grouped {
        aggregates: BTreeMap<String, IpAggregate>,
        selected_ip: Option<String>,
        selected_entries: Vec<LogEntry>,
    },
    All(Vec<LogEntry>),
}

/// Reconciliation state for the monitored application.
///
/// Every asynchronous input carries the epoch it was issued under; inputs
/// from an older epoch are dropped. At most one page request is current:
/// page 1 supersedes whatever is in flight, any other page waits its turn.
#[derive(Debug)]
pub struct MonitorState {
    app_id: Option<String>,
    epoch: u64,
    next_seq: u64,
    in_flight: Option<u64>,
    logs: LogSet,
    pagination: Pagination,
    display_mode: DisplayMode,
    selected_ip: Option<String>,
    connection: ConnectionStatus,
    error: Option<String>,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorState {
    pub fn new() -> Self {
        Self {
            app_id: None,
            epoch: 0,
            next_seq: 0,
            in_flight: None,
            logs: LogSet::new(),
            pagination: Pagination::default(),
            display_mode: DisplayMode::default(),
            selected_ip: None,
            connection: ConnectionStatus::Closed,
            error: None,
        }
    }

    pub fn app_id(&self) -> Option<&str> {
        self.app_id.as_deref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Bind to a new application (or none), discarding everything held.
    /// Returns the new epoch.
    pub fn switch_app(&mut self, app_id: Option<String>) -> u64 {
        self.epoch += 1;
        self.logs.clear();
        self.pagination = Pagination::default();
        self.in_flight = None;
        self.selected_ip = None;
        self.error = None;
        self.connection = if app_id.is_some() {
            ConnectionStatus::Connecting
        } else {
            ConnectionStatus::Closed
        };

        tracing::info!("Monitoring {:?} (epoch {})", app_id, self.epoch);
        self.app_id = app_id;
        self.epoch
    }

    /// Issue a ticket for fetching `page`
    pub fn begin_fetch(&mut self, page: u32) -> Result<FetchTicket, FetchError> {
        let app_id = self.app_id.clone().ok_or(FetchError::NoApplication)?;

        if page != 1 && !self.pagination.contains(page) {
            return Err(FetchError::OutOfRange { page, total_pages: self.pagination.total });
        }

        if self.in_flight.is_some() {
            if page != 1 {
                return Err(FetchError::Busy);
            }
            tracing::debug!("Page 1 request supersedes in-flight fetch for {}", app_id);
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight = Some(seq);
        self.error = None;

        Ok(FetchTicket { epoch: self.epoch, seq, app_id, page })
    }

    /// Apply the completion of a previously issued ticket
    pub fn complete_fetch(&mut self, ticket: &FetchTicket, result: Result<Page, FetchError>) -> FetchOutcome {
        if ticket.epoch != self.epoch || self.in_flight != Some(ticket.seq) {
            tracing::debug!(
                "Discarding stale page {} for {} (epoch {}, seq {})",
                ticket.page,
                ticket.app_id,
                ticket.epoch,
                ticket.seq
            );
            return FetchOutcome::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(page) if page.entries.is_empty() => {
                if ticket.is_first_page() {
                    self.logs.clear();
                    self.pagination = Pagination::default();
                    self.error = Some(NO_LOGS_MESSAGE.to_string());
                }
                FetchOutcome::Applied(0)
            },
            Ok(page) => {
                let added = self.logs.ingest_page(page.entries, ticket.is_first_page());
                self.pagination = Pagination {
                    current: ticket.page,
                    total: page.total_pages.max(ticket.page),
                };
                FetchOutcome::Applied(added)
            },
            Err(e) => {
                let err = MonitorError::from(e);
                self.error = Some(err.user_message().to_string());
                FetchOutcome::Failed(err)
            }
        }
    }

    /// Apply one pushed record issued under `epoch`. Returns whether it was stored.
    pub fn on_push(&mut self, epoch: u64, raw: RawLogEntry) -> bool {
        if epoch != self.epoch {
            tracing::debug!("Dropping push from epoch {} (current {})", epoch, self.epoch);
            return false;
        }
        self.logs.ingest_pushed(raw)
    }

    pub fn on_connection_status(&mut self, epoch: u64, status: ConnectionStatus) {
        if epoch == self.epoch {
            self.connection = status;
        }
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.display_mode = mode;
    }

    /// Select an IP for drill-down; selecting the current one clears it
    pub fn select_ip(&mut self, ip: Option<String>) {
        self.selected_ip = match ip {
            Some(ip) if self.selected_ip.as_deref() == Some(ip.as_str()) => None,
            other => other,
        };
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.logs.to_vec()
    }

    pub fn aggregates(&self) -> BTreeMap<String, IpAggregate> {
        aggregate_by_ip(self.logs.iter())
    }

    pub fn view(&self) -> TrafficView {
        match self.display_mode {
            DisplayMode::Grouped => {
                let selected_entries = match self.selected_ip.as_deref() {
                    Some(ip) => self.logs.entries_for_ip(ip).cloned().collect(),
                    None => Vec::new(),
                };
                TrafficView::Grouped {
                    aggregates: self.aggregates(),
                    selected_ip: self.selected_ip.clone(),
                    selected_entries,
                }
            },
            DisplayMode::All => TrafficView::All(self.entries()),
        }
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            app_id: self.app_id.clone(),
            epoch: self.epoch,
            connection: self.connection,
            pagination: self.pagination,
            loading: self.in_flight.is_some(),
            error: self.error.clone(),
            display_mode: self.display_mode,
            entry_count: self.logs.len(),
        }
    }
}
