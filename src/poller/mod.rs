//! The scrape loop.
//!
//! [`Poller`] performs what [`state::transition`] decides: logging in,
//! fetching both pages, checking they are not the login form, projecting
//! them, and sleeping. Only a credential rejection ends the loop.

pub mod state;

use crate::config::ExporterConfig;
use crate::error::{FailureKind, ModemError, Result};
use crate::metrics::projector;
use crate::metrics::registry::MetricRegistry;
use crate::modem::html;
use crate::modem::{Client, ScrapeTarget, SessionManager};
use scraper::Html;
use state::{transition, PollEvent, PollState, PollTiming};
use std::sync::Arc;

impl From<&ExporterConfig> for PollTiming {
    fn from(config: &ExporterConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            relogin_interval: config.relogin_interval(),
        }
    }
}

/// Bodies of one cycle's pages. Parsed only inside synchronous code, as
/// `Html` must not live across an await.
#[derive(Debug)]
struct Pages {
    connection: String,
    product: String,
}

pub struct Poller {
    client: Client,
    session: SessionManager,
    registry: Arc<dyn MetricRegistry>,
    timing: PollTiming,
    state: PollState,
    pages: Option<Pages>,
    fatal: Option<ModemError>,
}

impl Poller {
    pub fn new(client: Client, registry: Arc<dyn MetricRegistry>, timing: PollTiming) -> Self {
        Self {
            client,
            session: SessionManager::new(),
            registry,
            timing,
            state: PollState::NeedLogin,
            pages: None,
            fatal: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &PollState {
        &self.state
    }

    #[cfg(test)]
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Runs until the modem rejects the credentials.
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!(
            poll_interval = ?self.timing.poll_interval,
            "Starting poll loop"
        );
        while self.step().await != &PollState::Stopped {}

        match self.fatal.take() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Performs the current state's effect and moves to the next state.
    pub async fn step(&mut self) -> &PollState {
        let event = match self.state.clone() {
            PollState::Stopped => return &self.state,
            PollState::NeedLogin => self.login().await,
            PollState::AuthenticatedIdle { .. } => PollEvent::Begin {
                session_valid: self.session.has_session(),
            },
            PollState::Scraping { .. } => self.scrape().await,
            PollState::ValidatingResponse { fresh } => self.validate(fresh),
            PollState::Updating => self.update(),
            PollState::Sleeping { duration, then } => {
                tracing::debug!(?duration, ?then, "Sleeping before next poll");
                tokio::time::sleep(duration).await;
                PollEvent::Woke {
                    session_valid: self.session.has_session(),
                }
            }
        };

        let next = transition(&self.state, &event, &self.timing);
        tracing::trace!(from = ?self.state, ?event, to = ?next, "Poll transition");
        self.state = next;
        &self.state
    }

    async fn login(&mut self) -> PollEvent {
        // whatever is held has already been judged stale
        self.session.invalidate();
        match self.session.ensure_session(&self.client).await {
            Ok(_) => PollEvent::LoggedIn,
            Err(e) => self.failed(e),
        }
    }

    async fn scrape(&mut self) -> PollEvent {
        let ticket = match self.session.ensure_session(&self.client).await {
            Ok(ticket) => ticket,
            Err(e) => return self.failed(e),
        };

        let mut bodies = Vec::with_capacity(2);
        for target in [ScrapeTarget::ConnectionData, ScrapeTarget::ProductInfo] {
            match self
                .client
                .fetch(target, &ticket.token, &ticket.cookie_header)
                .await
            {
                Ok(body) => bodies.push(body),
                Err(e) => return self.failed(e),
            }
        }

        let product = bodies.pop().unwrap_or_default();
        let connection = bodies.pop().unwrap_or_default();
        self.pages = Some(Pages {
            connection,
            product,
        });
        PollEvent::Fetched
    }

    fn validate(&mut self, fresh: bool) -> PollEvent {
        let Some(pages) = &self.pages else {
            tracing::warn!("No pages to validate");
            return PollEvent::Failed(FailureKind::Unclassified);
        };

        let expired = [
            (ScrapeTarget::ConnectionData, &pages.connection),
            (ScrapeTarget::ProductInfo, &pages.product),
        ]
        .into_iter()
        .find(|(_, body)| html::is_login_page(&Html::parse_document(body)))
        .map(|(target, _)| target);

        match expired {
            Some(target) => {
                let err = ModemError::SessionExpired {
                    target: target.label(),
                };
                if fresh {
                    tracing::warn!(error = %err, "Login page served right after logging in");
                } else {
                    tracing::info!(error = %err, "Session expired, logging in again");
                }
                self.pages = None;
                self.session.invalidate();
                PollEvent::LoginPageDetected
            }
            None => PollEvent::PagesValid,
        }
    }

    fn update(&mut self) -> PollEvent {
        let Some(pages) = self.pages.take() else {
            tracing::warn!("No pages to project");
            return PollEvent::Failed(FailureKind::Unclassified);
        };

        let registry = self.registry.as_ref();
        projector::project_connection_page(&Html::parse_document(&pages.connection), registry);
        projector::project_product_page(&Html::parse_document(&pages.product), registry);

        tracing::info!(
            next_poll = ?self.timing.poll_interval,
            "Updated modem metrics"
        );
        PollEvent::Updated
    }

    fn failed(&mut self, err: ModemError) -> PollEvent {
        let kind = err.kind();
        match kind {
            FailureKind::Authentication => {
                tracing::error!(error = %err, "Modem rejected login; polling stops");
                self.fatal = Some(err);
            }
            FailureKind::DeviceUnavailable => {
                tracing::warn!(error = %err, "Modem unavailable; retrying next poll")
            }
            FailureKind::SessionExpired | FailureKind::Unclassified => {
                tracing::error!(error = %err, ?kind, "Poll cycle failed")
            }
        }
        PollEvent::Failed(kind)
    }
}
