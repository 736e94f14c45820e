//! Posts scanned codes to the fare server and turns the outcome into exactly
//! one banner.
use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::{
    notify::{NotificationKind, Notifier},
    page::BannerId,
    request::ScanRequest,
    response::ScanResponse,
};

pub const FARE_ENDPOINT: &str = "/scan-qr";

pub const FARE_ACCEPTED: &str = "Fare deducted successfully!";
pub const FARE_FAILED: &str = "Error processing QR code";

/// Why a submission produced no usable answer. Users see the same banner for
/// every variant.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("request to the fare endpoint failed")]
    Transport(#[source] reqwest::Error),
    #[error("fare endpoint returned a malformed response")]
    Malformed(#[source] reqwest::Error),
}

/// Sends decoded codes to `POST /scan-qr`.
#[derive(Debug, Clone)]
pub struct FareSubmitter {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl FareSubmitter {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: None,
        }
    }

    /// Sends `token` as a bearer credential with every submission.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Posts one code. No retries.
    #[instrument(skip(self))]
    pub async fn submit(&self, code: &str) -> Result<ScanResponse, SubmitError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), FARE_ENDPOINT);
        let mut req = self.client.post(url).json(&ScanRequest {
            bus_number: code.to_owned(),
        });

        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let res = req.send().await.map_err(SubmitError::Transport)?;

        debug!("fare endpoint answered with {}", res.status());

        res.json::<ScanResponse>()
            .await
            .map_err(SubmitError::Malformed)
    }
}

/// The banner text and kind for a submission outcome.
pub fn outcome_notice(outcome: &Result<ScanResponse, SubmitError>) -> (&str, NotificationKind) {
    match outcome {
        Ok(ScanResponse { success: true, .. }) => (FARE_ACCEPTED, NotificationKind::Success),
        Ok(ScanResponse { message, .. }) => (
            message.as_deref().unwrap_or(FARE_FAILED),
            NotificationKind::Error,
        ),
        Err(_) => (FARE_FAILED, NotificationKind::Error),
    }
}

/// Owns the submit → notify step of the pipeline.
#[derive(Clone)]
pub struct FareDesk {
    submitter: FareSubmitter,
    notifier: Notifier,
}

impl FareDesk {
    pub fn new(submitter: FareSubmitter, notifier: Notifier) -> Self {
        Self {
            submitter,
            notifier,
        }
    }

    /// Submits `code` and shows the result. Every path shows one banner.
    pub async fn handle_code(&self, code: String) -> BannerId {
        let outcome = self.submitter.submit(&code).await;

        if let Err(err) = &outcome {
            warn!("submitting {code:?} failed: {err:?}");
        }

        let (message, kind) = outcome_notice(&outcome);

        self.notifier.notify(message, kind)
    }

    /// Submits every code from `codes` as its own task, without waiting for
    /// earlier submissions. Returns once the stream ends and all submissions
    /// have shown their banner.
    pub async fn run<S>(&self, mut codes: S) -> usize
    where
        S: Stream<Item = String> + Unpin,
    {
        let mut in_flight = JoinSet::new();
        let mut handled = 0;

        while let Some(code) = codes.next().await {
            debug!("scanned {code:?}");

            let desk = self.clone();
            in_flight.spawn(async move { desk.handle_code(code).await });
            handled += 1;
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(err) = joined {
                warn!("fare submission task failed: {err}");
            }
        }

        handled
    }
}
