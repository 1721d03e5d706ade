//! Payment handshake with the hosted payment page.
//!
//! A session starts `Pending`. The gateway's redirect back to the session's
//! return URL carries `status` and `tx_ref`; a matching successful redirect
//! moves the session to `ProcessingRedirect` while the order is written and
//! then to `Completed`. Inactivity longer than the TTL expires the session.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    Pending,
    ProcessingRedirect,
    Completed,
    Expired,
    Aborted,
    Failed,
}

impl HandshakeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeState::Pending => "pending",
            HandshakeState::ProcessingRedirect => "processing_redirect",
            HandshakeState::Completed => "completed",
            HandshakeState::Expired => "expired",
            HandshakeState::Aborted => "aborted",
            HandshakeState::Failed => "failed",
        }
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandshakeState {
    type Err = HandshakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(HandshakeState::Pending),
            "processing_redirect" => Ok(HandshakeState::ProcessingRedirect),
            "completed" => Ok(HandshakeState::Completed),
            "expired" => Ok(HandshakeState::Expired),
            "aborted" => Ok(HandshakeState::Aborted),
            "failed" => Ok(HandshakeState::Failed),
            other => Err(HandshakeError::UnknownState(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("payment session expired, return to checkout")]
    Expired,
    #[error("transaction reference mismatch: expected {expected}, received {received}")]
    ReferenceMismatch { expected: String, received: String },
    #[error("redirect is missing the {0} parameter")]
    MalformedRedirect(&'static str),
    #[error("payment session is already {0}")]
    NotPending(HandshakeState),
    #[error("unknown handshake state '{0}'")]
    UnknownState(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
pub struct RedirectParams {
    pub status: Option<String>,
    pub tx_ref: Option<String>,
}

impl RedirectParams {
    pub fn from_url(location: &Url) -> Self {
        let mut params = RedirectParams {
            status: None,
            tx_ref: None,
        };
        for (key, value) in location.query_pairs() {
            match key.as_ref() {
                "status" => params.status = Some(value.into_owned()),
                "tx_ref" => params.tx_ref = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// Gateway reported success for our reference; the order may be written.
    Paid { transaction_ref: String },
    /// Gateway reported anything other than success.
    Declined { status: String },
}

#[derive(Debug, Clone)]
pub struct PaymentHandshake {
    transaction_ref: String,
    return_url: String,
    return_location: Option<Url>,
    state: HandshakeState,
    last_activity_at: DateTime<Utc>,
    ttl: Duration,
}

impl PaymentHandshake {
    pub fn start(
        transaction_ref: impl Into<String>,
        return_url: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self::restore(
            transaction_ref,
            return_url,
            HandshakeState::Pending,
            now,
            ttl,
        )
    }

    pub fn restore(
        transaction_ref: impl Into<String>,
        return_url: impl Into<String>,
        state: HandshakeState,
        last_activity_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let return_url = return_url.into();
        Self {
            transaction_ref: transaction_ref.into(),
            return_location: Url::parse(&return_url).ok(),
            return_url,
            state,
            last_activity_at,
            ttl,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn transaction_ref(&self) -> &str {
        &self.transaction_ref
    }

    pub fn return_url(&self) -> &str {
        &self.return_url
    }

    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.last_activity_at + self.ttl
    }

    /// Expires a pending session whose inactivity window has elapsed.
    pub fn check_expiry(&mut self, now: DateTime<Utc>) -> Result<(), HandshakeError> {
        if self.state == HandshakeState::Expired {
            return Err(HandshakeError::Expired);
        }
        if self.state == HandshakeState::Pending && now >= self.expires_at() {
            self.state = HandshakeState::Expired;
            return Err(HandshakeError::Expired);
        }
        Ok(())
    }

    /// A page finished loading in the web view; restarts the inactivity timer.
    pub fn record_page_load(&mut self, now: DateTime<Utc>) -> Result<(), HandshakeError> {
        self.check_expiry(now)?;
        self.ensure_pending()?;
        self.last_activity_at = now;
        Ok(())
    }

    /// Same scheme, host, effective port and path as the return URL. Query
    /// and fragment are ignored; a trailing slash is tolerated.
    pub fn is_return_location(&self, location: &Url) -> bool {
        let Some(expected) = &self.return_location else {
            return false;
        };
        location.scheme() == expected.scheme()
            && location.host() == expected.host()
            && location.port_or_known_default() == expected.port_or_known_default()
            && location.path().trim_end_matches('/') == expected.path().trim_end_matches('/')
    }

    /// Observes a web-view navigation. Locations other than the return URL are
    /// ignored and yield `Ok(None)`.
    pub fn on_navigation(
        &mut self,
        location: &Url,
        now: DateTime<Utc>,
    ) -> Result<Option<RedirectOutcome>, HandshakeError> {
        if !self.is_return_location(location) {
            return Ok(None);
        }

        self.on_redirect(&RedirectParams::from_url(location), now)
            .map(Some)
    }

    pub fn on_redirect(
        &mut self,
        params: &RedirectParams,
        now: DateTime<Utc>,
    ) -> Result<RedirectOutcome, HandshakeError> {
        self.check_expiry(now)?;
        self.ensure_pending()?;

        let status = params
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(HandshakeError::MalformedRedirect("status"))?;
        let received = params
            .tx_ref
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(HandshakeError::MalformedRedirect("tx_ref"))?;

        if received != self.transaction_ref {
            self.state = HandshakeState::Aborted;
            return Err(HandshakeError::ReferenceMismatch {
                expected: self.transaction_ref.clone(),
                received: received.to_string(),
            });
        }

        if !status.eq_ignore_ascii_case("success") {
            self.state = HandshakeState::Failed;
            return Ok(RedirectOutcome::Declined {
                status: status.to_string(),
            });
        }

        self.state = HandshakeState::ProcessingRedirect;
        Ok(RedirectOutcome::Paid {
            transaction_ref: self.transaction_ref.clone(),
        })
    }

    pub fn complete(&mut self) -> Result<(), HandshakeError> {
        if self.state != HandshakeState::ProcessingRedirect {
            return Err(HandshakeError::NotPending(self.state));
        }
        self.state = HandshakeState::Completed;
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), HandshakeError> {
        if self.state != HandshakeState::Pending {
            return Err(HandshakeError::NotPending(self.state));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RETURN_URL: &str = "https://shop.example.com/api/payments/abc/return";

    fn handshake(now: DateTime<Utc>) -> PaymentHandshake {
        PaymentHandshake::start("ABC123", RETURN_URL, now, Duration::minutes(15))
    }

    fn redirect(status: &str, tx_ref: &str) -> RedirectParams {
        RedirectParams {
            status: Some(status.into()),
            tx_ref: Some(tx_ref.into()),
        }
    }

    #[test]
    fn matching_success_redirect_proceeds_to_order_writer() {
        let now = Utc::now();
        let mut hs = handshake(now);
        let outcome = hs.on_redirect(&redirect("success", "ABC123"), now).unwrap();
        assert_eq!(
            outcome,
            RedirectOutcome::Paid {
                transaction_ref: "ABC123".into()
            }
        );
        assert_eq!(hs.state(), HandshakeState::ProcessingRedirect);
        hs.complete().unwrap();
        assert_eq!(hs.state(), HandshakeState::Completed);
    }

    #[test]
    fn mismatched_reference_aborts() {
        let now = Utc::now();
        let mut hs = handshake(now);
        let err = hs
            .on_redirect(&redirect("success", "XYZ999"), now)
            .unwrap_err();
        assert_eq!(
            err,
            HandshakeError::ReferenceMismatch {
                expected: "ABC123".into(),
                received: "XYZ999".into()
            }
        );
        assert_eq!(hs.state(), HandshakeState::Aborted);
        // Nothing further is accepted once aborted.
        assert!(hs.on_redirect(&redirect("success", "ABC123"), now).is_err());
    }

    #[test]
    fn declined_status_fails_without_order() {
        let now = Utc::now();
        let mut hs = handshake(now);
        let outcome = hs.on_redirect(&redirect("failed", "ABC123"), now).unwrap();
        assert_eq!(
            outcome,
            RedirectOutcome::Declined {
                status: "failed".into()
            }
        );
        assert_eq!(hs.state(), HandshakeState::Failed);
        assert!(hs.complete().is_err());
    }

    #[test]
    fn inactivity_expires_the_session() {
        let start = Utc::now();
        let mut hs = handshake(start);
        let late = start + Duration::minutes(15);
        assert_eq!(
            hs.on_redirect(&redirect("success", "ABC123"), late),
            Err(HandshakeError::Expired)
        );
        assert_eq!(hs.state(), HandshakeState::Expired);
    }

    #[test]
    fn page_load_resets_the_timer() {
        let start = Utc::now();
        let mut hs = handshake(start);
        let reload = start + Duration::minutes(10);
        hs.record_page_load(reload).unwrap();
        assert_eq!(hs.expires_at(), reload + Duration::minutes(15));

        let redirect_at = start + Duration::minutes(20);
        assert!(hs.on_redirect(&redirect("success", "ABC123"), redirect_at).is_ok());
    }

    #[test]
    fn navigation_outside_return_url_is_ignored() {
        let now = Utc::now();
        let mut hs = handshake(now);
        let elsewhere = Url::parse("https://pay.example.com/hosted/step2?tx_ref=ABC123").unwrap();
        assert_eq!(hs.on_navigation(&elsewhere, now), Ok(None));
        assert_eq!(hs.state(), HandshakeState::Pending);
    }

    #[test]
    fn navigation_to_return_url_parses_query() {
        let now = Utc::now();
        let mut hs = handshake(now);
        let location = Url::parse(&format!("{RETURN_URL}?status=success&tx_ref=ABC123")).unwrap();
        assert_eq!(
            hs.on_navigation(&location, now),
            Ok(Some(RedirectOutcome::Paid {
                transaction_ref: "ABC123".into()
            }))
        );
    }

    #[test]
    fn return_url_is_compared_by_components() {
        let now = Utc::now();
        let mut hs = PaymentHandshake::start(
            "ABC123",
            "https://Shop.Example.com:443/api/payments/abc/return",
            now,
            Duration::minutes(15),
        );
        let location = Url::parse(
            "https://shop.example.com/api/payments/abc/return?status=success&tx_ref=ABC123",
        )
        .unwrap();
        assert!(hs.is_return_location(&location));
        assert_eq!(
            hs.on_navigation(&location, now),
            Ok(Some(RedirectOutcome::Paid {
                transaction_ref: "ABC123".into()
            }))
        );
    }

    #[test]
    fn lookalike_paths_and_ports_are_not_the_return_url() {
        let now = Utc::now();
        let mut hs = handshake(now);
        for other in [
            "https://shop.example.com/api/payments/abc/returnX?status=success&tx_ref=ABC123",
            "https://shop.example.com:8443/api/payments/abc/return?status=success&tx_ref=ABC123",
            "http://shop.example.com/api/payments/abc/return?status=success&tx_ref=ABC123",
        ] {
            let location = Url::parse(other).unwrap();
            assert_eq!(hs.on_navigation(&location, now), Ok(None), "{other}");
        }
        assert_eq!(hs.state(), HandshakeState::Pending);
    }

    #[test]
    fn only_success_counts_as_paid() {
        let now = Utc::now();
        let mut hs = handshake(now);
        assert!(matches!(
            hs.on_redirect(&redirect("SUCCESS", "ABC123"), now),
            Ok(RedirectOutcome::Paid { .. })
        ));

        let mut hs = handshake(now);
        assert_eq!(
            hs.on_redirect(&redirect("successful", "ABC123"), now),
            Ok(RedirectOutcome::Declined {
                status: "successful".into()
            })
        );
    }

    #[test]
    fn redirect_without_reference_is_malformed() {
        let now = Utc::now();
        let mut hs = handshake(now);
        let location = Url::parse(&format!("{RETURN_URL}?status=success")).unwrap();
        assert_eq!(
            hs.on_navigation(&location, now),
            Err(HandshakeError::MalformedRedirect("tx_ref"))
        );
        assert_eq!(hs.state(), HandshakeState::Pending);
    }

    #[test]
    fn state_names_round_trip() {
        for state in [
            HandshakeState::Pending,
            HandshakeState::ProcessingRedirect,
            HandshakeState::Completed,
            HandshakeState::Expired,
            HandshakeState::Aborted,
            HandshakeState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<HandshakeState>(), Ok(state));
        }
    }
}
