use farescope_core::{FlightProvider, NormalisedRequest, ProviderErrorKind, ProviderOutcome};
use futures_util::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Per-provider outcomes of one fan-out, in registry order.
#[derive(Debug, Clone)]
pub struct FanOut {
    pub outcomes: Vec<(String, ProviderOutcome)>,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl FanOut {
    pub fn any_success(&self) -> bool {
        self.outcomes.iter().any(|(_, outcome)| outcome.is_success())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Completed,
    DeadlineElapsed,
    Cancelled,
}

/// Calls every provider concurrently under a global deadline.
///
/// Stateless apart from its timeouts, so one executor serves every request.
#[derive(Debug, Clone)]
pub struct FanOutExecutor {
    global_deadline: Duration,
    provider_timeout: Duration,
    overrides: HashMap<String, Duration>,
}

impl FanOutExecutor {
    pub fn new(global_deadline: Duration, provider_timeout: Duration) -> Self {
        Self {
            global_deadline,
            provider_timeout,
            overrides: HashMap::new(),
        }
    }

    pub fn with_provider_timeout(mut self, provider: impl Into<String>, timeout: Duration) -> Self {
        self.overrides.insert(provider.into(), timeout);
        self
    }

    fn timeout_for(&self, provider: &str) -> Duration {
        self.overrides
            .get(provider)
            .copied()
            .unwrap_or(self.provider_timeout)
    }

    pub async fn execute(&self, request: &NormalisedRequest, providers: &[Arc<dyn FlightProvider>]) -> FanOut {
        self.execute_until(request, providers, std::future::pending()).await
    }

    /// Like [`execute`](Self::execute), but stops early once `cancel`
    /// resolves. Providers still running at that point are aborted and
    /// reported as `Cancelled`.
    ///
    /// Returns only after every spawned task has finished or been aborted.
    pub async fn execute_until<C>(
        &self,
        request: &NormalisedRequest,
        providers: &[Arc<dyn FlightProvider>],
        cancel: C,
    ) -> FanOut
    where
        C: Future<Output = ()>,
    {
        let started = Instant::now();
        let global = started + self.global_deadline;
        let request = Arc::new(request.clone());

        let mut tasks = JoinSet::new();
        for (slot, provider) in providers.iter().enumerate() {
            let provider = Arc::clone(provider);
            let request = Arc::clone(&request);
            let deadline = global.min(Instant::now() + self.timeout_for(provider.name()));
            tasks.spawn(async move { (slot, call_provider(provider, request, deadline).await) });
        }

        let mut slots: Vec<Option<ProviderOutcome>> = vec![None; providers.len()];
        tokio::pin!(cancel);
        let exit = loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok((slot, outcome))) => slots[slot] = Some(outcome),
                    Some(Err(err)) => warn!(error = %err, "Provider task failed to join"),
                    None => break Exit::Completed,
                },
                _ = tokio::time::sleep_until(global) => break Exit::DeadlineElapsed,
                _ = &mut cancel => break Exit::Cancelled,
            }
        };

        if exit != Exit::Completed {
            tasks.abort_all();
            while let Some(joined) = tasks.join_next().await {
                if let Ok((slot, outcome)) = joined {
                    slots[slot] = Some(outcome);
                }
            }
        }

        let elapsed = started.elapsed();
        let outcomes = providers
            .iter()
            .zip(slots)
            .map(|(provider, slot)| {
                let outcome = slot.unwrap_or_else(|| match exit {
                    Exit::DeadlineElapsed => ProviderOutcome::Timeout { latency: elapsed },
                    Exit::Cancelled => ProviderOutcome::Cancelled,
                    Exit::Completed => ProviderOutcome::Error {
                        kind: ProviderErrorKind::Other,
                        message: "provider task aborted".to_string(),
                        latency: elapsed,
                    },
                });
                (provider.name().to_string(), outcome)
            })
            .collect();

        debug!(
            providers = providers.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            exit = ?exit,
            "Fan-out finished"
        );

        FanOut {
            outcomes,
            elapsed,
            cancelled: exit == Exit::Cancelled,
        }
    }
}

async fn call_provider(
    provider: Arc<dyn FlightProvider>,
    request: Arc<NormalisedRequest>,
    deadline: Instant,
) -> ProviderOutcome {
    let started = Instant::now();
    let call = AssertUnwindSafe(provider.search(&request, deadline.into_std())).catch_unwind();
    let outcome = match tokio::time::timeout_at(deadline, call).await {
        Ok(Ok(Ok(offers))) => ProviderOutcome::Success {
            offers,
            latency: started.elapsed(),
        },
        Ok(Ok(Err(err))) => ProviderOutcome::Error {
            kind: err.kind,
            message: err.message,
            latency: started.elapsed(),
        },
        Ok(Err(panic)) => {
            let message = panic_message(panic.as_ref());
            warn!(provider = provider.name(), %message, "Provider panicked");
            ProviderOutcome::Error {
                kind: ProviderErrorKind::Other,
                message,
                latency: started.elapsed(),
            }
        }
        Err(_) => ProviderOutcome::Timeout {
            latency: started.elapsed(),
        },
    };
    debug!(
        provider = provider.name(),
        latency_ms = outcome.latency().as_millis() as u64,
        kind = ?outcome.error_kind(),
        "Provider call finished"
    );
    outcome
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("provider panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("provider panicked: {}", msg)
    } else {
        "provider panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use farescope_core::{Offer, ProviderError, SearchLimits, SearchRequest};

    enum Behaviour {
        Offers(usize),
        Fail(ProviderErrorKind),
        Panic,
    }

    struct Stub {
        name: &'static str,
        delay: Duration,
        behaviour: Behaviour,
    }

    #[async_trait]
    impl FlightProvider for Stub {
        fn name(&self) -> &str {
            self.name
        }

        async fn search(&self, _: &NormalisedRequest, _: std::time::Instant) -> Result<Vec<Offer>, ProviderError> {
            tokio::time::sleep(self.delay).await;
            match self.behaviour {
                Behaviour::Offers(n) => Ok(Vec::with_capacity(n)),
                Behaviour::Fail(kind) => Err(ProviderError::new(kind, "stubbed failure")),
                Behaviour::Panic => panic!("stub blew up"),
            }
        }
    }

    fn stub(name: &'static str, delay_ms: u64, behaviour: Behaviour) -> Arc<dyn FlightProvider> {
        Arc::new(Stub {
            name,
            delay: Duration::from_millis(delay_ms),
            behaviour,
        })
    }

    fn request() -> NormalisedRequest {
        SearchRequest {
            origin: "LHR".to_string(),
            destination: "BCN".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2025, 6, 1),
            ..Default::default()
        }
        .normalise(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(), &SearchLimits::default())
        .unwrap()
    }

    fn kinds(fan_out: &FanOut) -> Vec<(&str, Option<ProviderErrorKind>)> {
        fan_out
            .outcomes
            .iter()
            .map(|(name, outcome)| (name.as_str(), outcome.error_kind()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcomes_follow_registry_order() {
        let executor = FanOutExecutor::new(Duration::from_secs(30), Duration::from_secs(20));
        let providers = vec![
            stub("slow", 300, Behaviour::Offers(0)),
            stub("broken", 10, Behaviour::Fail(ProviderErrorKind::RateLimit)),
            stub("fast", 5, Behaviour::Offers(0)),
        ];
        let fan_out = executor.execute(&request(), &providers).await;

        assert_eq!(
            kinds(&fan_out),
            vec![
                ("slow", None),
                ("broken", Some(ProviderErrorKind::RateLimit)),
                ("fast", None),
            ]
        );
        assert!(fan_out.any_success());
        assert!(!fan_out.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_deadline_keeps_finished_outcomes() {
        let executor = FanOutExecutor::new(Duration::from_secs(2), Duration::from_secs(20));
        let providers = vec![
            stub("amadeus", 500, Behaviour::Offers(3)),
            stub("index", 10_000, Behaviour::Offers(2)),
        ];
        let fan_out = executor.execute(&request(), &providers).await;

        assert!(fan_out.outcomes[0].1.is_success());
        match &fan_out.outcomes[1].1 {
            ProviderOutcome::Timeout { latency } => assert!(*latency >= Duration::from_secs(2)),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(fan_out.elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_provider_timeout_override() {
        let executor = FanOutExecutor::new(Duration::from_secs(30), Duration::from_secs(20))
            .with_provider_timeout("index", Duration::from_millis(100));
        let providers = vec![stub("index", 1_000, Behaviour::Offers(1))];
        let fan_out = executor.execute(&request(), &providers).await;

        assert_eq!(kinds(&fan_out), vec![("index", Some(ProviderErrorKind::Timeout))]);
        assert!(fan_out.elapsed < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_panic_is_recorded_as_other() {
        let executor = FanOutExecutor::new(Duration::from_secs(5), Duration::from_secs(5));
        let providers = vec![
            stub("explodes", 0, Behaviour::Panic),
            stub("index", 0, Behaviour::Offers(1)),
        ];
        let fan_out = executor.execute(&request(), &providers).await;
        assert_eq!(
            kinds(&fan_out),
            vec![("explodes", Some(ProviderErrorKind::Other)), ("index", None)]
        );
        match &fan_out.outcomes[0].1 {
            ProviderOutcome::Error { message, .. } => assert!(message.contains("stub blew up")),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_marks_outstanding_providers() {
        let executor = FanOutExecutor::new(Duration::from_secs(30), Duration::from_secs(20));
        let providers = vec![
            stub("fast", 10, Behaviour::Offers(1)),
            stub("slow", 5_000, Behaviour::Offers(1)),
        ];
        let cancel = tokio::time::sleep(Duration::from_millis(100));
        let fan_out = executor.execute_until(&request(), &providers, cancel).await;

        assert!(fan_out.cancelled);
        assert!(fan_out.outcomes[0].1.is_success());
        assert_eq!(fan_out.outcomes[1].1, ProviderOutcome::Cancelled);
        assert!(fan_out.elapsed < Duration::from_secs(1));
    }
}
