//! Login and session bookkeeping.
//!
//! The modem hands out a token in the body of the login response and expects
//! it back as `?ct_<token>` on every page, together with the cookies set at
//! login. Neither carries an expiry; a session is good until a page comes
//! back as the login form.

use crate::error::ModemError;
use crate::modem::client::Client;
use chrono::{DateTime, Utc};
use cookie::Cookie;
use reqwest::StatusCode;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    cookies: BTreeMap<String, String>,
}

impl Session {
    fn new(token: String) -> Self {
        Self {
            token,
            cookies: BTreeMap::new(),
        }
    }

    /// Merges raw `Set-Cookie` values, keeping name and value only.
    fn merge_cookies(&mut self, set_cookies: &[String]) {
        for raw in set_cookies {
            match Cookie::parse(raw.as_str()) {
                Ok(cookie) => {
                    self.cookies
                        .insert(cookie.name().to_string(), cookie.value().to_string());
                }
                Err(e) => tracing::debug!(error = %e, set_cookie = %raw, "Ignoring cookie"),
            }
        }
    }

    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    LoggingIn,
    Authenticated(Session),
}

/// What a poll cycle needs to fetch pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    pub token: String,
    pub cookie_header: String,
    /// Whether this ticket came from a login made just now
    pub fresh: bool,
}

#[derive(Debug)]
pub struct SessionManager {
    state: SessionState,
    login_attempts: u64,
    login_successes: u64,
    last_login_at: Option<DateTime<Utc>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            state: SessionState::Unauthenticated,
            login_attempts: 0,
            login_successes: 0,
            last_login_at: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn has_session(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    #[cfg(test)]
    pub fn login_attempts(&self) -> u64 {
        self.login_attempts
    }

    #[cfg(test)]
    pub fn login_successes(&self) -> u64 {
        self.login_successes
    }

    #[cfg(test)]
    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }

    /// Returns the held session, logging in first if there is none.
    pub async fn ensure_session(&mut self, client: &Client) -> Result<SessionTicket, ModemError> {
        if let SessionState::Authenticated(session) = &self.state {
            return Ok(SessionTicket {
                token: session.token.clone(),
                cookie_header: session.cookie_header(),
                fresh: false,
            });
        }

        self.state = SessionState::LoggingIn;
        self.login_attempts += 1;
        tracing::debug!(attempt = self.login_attempts, "Logging in to modem");

        let session = match Self::login(client).await {
            Ok(session) => session,
            Err(e) => {
                self.state = SessionState::Unauthenticated;
                return Err(e);
            }
        };

        self.login_successes += 1;
        self.last_login_at = Some(Utc::now());
        tracing::info!(
            logins = self.login_successes,
            cookies = session.cookies.len(),
            "Logged in to modem"
        );

        let ticket = SessionTicket {
            token: session.token.clone(),
            cookie_header: session.cookie_header(),
            fresh: true,
        };
        self.state = SessionState::Authenticated(session);
        Ok(ticket)
    }

    async fn login(client: &Client) -> Result<Session, ModemError> {
        let response = client.login().await?;
        if response.status != StatusCode::OK {
            return Err(ModemError::login_status(response.status));
        }

        let token = response.body.trim();
        if token.is_empty() {
            return Err(ModemError::EmptyToken);
        }

        let mut session = Session::new(token.to_string());
        session.merge_cookies(&response.set_cookies);
        Ok(session)
    }

    /// Drops the held session. Login counters are kept.
    pub fn invalidate(&mut self) {
        if self.has_session() {
            tracing::debug!(
                login_attempts = self.login_attempts,
                logins = self.login_successes,
                session_age = ?self.last_login_at.map(|at| Utc::now() - at),
                "Invalidating modem session"
            );
        }
        self.state = SessionState::Unauthenticated;
    }
}
