use async_trait::async_trait;
use chrono::NaiveDate;
use farescope_core::{CabinClass, FlightProvider, NormalisedRequest, Offer, ProviderError, ProviderErrorKind, TripType};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// What an upstream provider is told about a search. Session and user
/// ids never leave the process.
#[derive(Debug, Serialize)]
struct ProviderQuery<'a> {
    origin: &'a str,
    destination: &'a str,
    departure_date: NaiveDate,
    return_date: Option<NaiveDate>,
    trip_type: TripType,
    passengers: u8,
    cabin: CabinClass,
    currency: &'a str,
}

impl<'a> From<&'a NormalisedRequest> for ProviderQuery<'a> {
    fn from(req: &'a NormalisedRequest) -> Self {
        Self {
            origin: req.origin.as_str(),
            destination: req.destination.as_str(),
            departure_date: req.departure_date,
            return_date: req.return_date,
            trip_type: req.trip_type,
            passengers: req.passengers,
            cabin: req.cabin,
            currency: &req.currency,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderReply {
    #[serde(default)]
    offers: Vec<Offer>,
}

/// Adapter for a provider speaking JSON over HTTP.
///
/// `POST {endpoint}` with the search, expects `{"offers": [...]}` back.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    name: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpProvider {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self::with_client(name, endpoint, reqwest::Client::new())
    }

    pub fn with_client(name: impl Into<String>, endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            client,
        }
    }
}

fn classify_status(status: StatusCode) -> ProviderErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderErrorKind::Auth,
        StatusCode::TOO_MANY_REQUESTS => ProviderErrorKind::RateLimit,
        s if s.is_server_error() => ProviderErrorKind::Upstream5xx,
        _ => ProviderErrorKind::Other,
    }
}

fn classify_transport(err: &reqwest::Error) -> ProviderErrorKind {
    if err.is_timeout() {
        ProviderErrorKind::Timeout
    } else if err.is_decode() {
        ProviderErrorKind::Parse
    } else if err.is_connect() || err.is_request() {
        ProviderErrorKind::Network
    } else {
        ProviderErrorKind::Other
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::new(classify_transport(&err), err.to_string())
}

#[async_trait]
impl FlightProvider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, request: &NormalisedRequest, deadline: Instant) -> Result<Vec<Offer>, ProviderError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining == Duration::ZERO {
            return Err(ProviderError::new(ProviderErrorKind::Timeout, "deadline passed before the call"));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(remaining)
            .json(&ProviderQuery::from(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::new(
                classify_status(status),
                format!("{} answered {}", self.endpoint, status),
            ));
        }

        let reply: ProviderReply = response.json().await.map_err(transport_error)?;
        debug!(provider = %self.name, offers = reply.offers.len(), "Provider replied");
        Ok(reply.offers)
    }
}
