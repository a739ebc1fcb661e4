use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Days, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::Term;
use crate::services::dispatch_service::{deliver_to, notify_failure, Dispatcher};
use crate::services::fetch_service::PayloadSource;

/// Earliest occurrence of any fire time at or after `now`, in `now`'s timezone.
///
/// A fire time equal to `now` counts as due. Local times skipped by a DST
/// transition are ignored; repeated local times use their first instant.
pub fn next_fire(now: DateTime<Tz>, fire_times: &[NaiveTime]) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive();

    (0..=2u64)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .flat_map(|day| fire_times.iter().map(move |t| day.and_time(*t)))
        .filter_map(|local| tz.from_local_datetime(&local).earliest())
        .filter(|candidate| *candidate >= now)
        .min()
}

/// Next fire instant and how long to sleep for it.
/// Never returns an instant at or before `last_fired`, so a cycle that ends
/// within the same second it started does not run twice.
pub fn next_wait(
    now: DateTime<Tz>,
    last_fired: Option<DateTime<Tz>>,
    fire_times: &[NaiveTime],
) -> Option<(DateTime<Tz>, StdDuration)> {
    let from = match last_fired {
        Some(last) if last >= now => last + Duration::seconds(1),
        _ => now,
    };
    let next = next_fire(from, fire_times)?;
    let wait = (next - now).to_std().unwrap_or(StdDuration::ZERO);
    Some((next, wait))
}

/// Outcome of one pass over every tracked term
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleReport {
    pub delivered: Vec<Term>,
    pub skipped: Vec<Term>,
    pub failed: Vec<(Term, String)>,
}

/// Build and deliver a digest for each term in turn.
///
/// Each term's destination is resolved once, before fetching, and that same
/// destination receives the digest or the failure notice. Unmapped terms are
/// skipped without fetching. A failure in one term never stops the others.
pub async fn run_cycle(source: &dyn PayloadSource, dispatcher: &Dispatcher, terms: &[Term]) -> CycleReport {
    let mut report = CycleReport::default();

    for &term in terms {
        let Ok(destination) = dispatcher.destination_for(term) else {
            debug!("{} has no destination, skipping", term);
            report.skipped.push(term);
            continue;
        };

        match source.build(term).await {
            Ok(payload) => match deliver_to(destination.as_ref(), &payload).await {
                Ok(()) => report.delivered.push(term),
                Err(e) => report.failed.push((term, e.to_string())),
            },
            Err(e) => {
                warn!("Building {} digest failed: {}", term, e);
                notify_failure(destination.as_ref(), term, &e).await;
                report.failed.push((term, e.to_string()));
            }
        }
    }

    report
}

/// Fires a digest cycle at fixed local times until shut down
pub struct Scheduler {
    fire_times: Vec<NaiveTime>,
    timezone: Tz,
    terms: Vec<Term>,
    source: Arc<dyn PayloadSource>,
    dispatcher: Dispatcher,
}

impl Scheduler {
    pub fn new(
        fire_times: Vec<NaiveTime>,
        timezone: Tz,
        terms: Vec<Term>,
        source: Arc<dyn PayloadSource>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            fire_times,
            timezone,
            terms,
            source,
            dispatcher,
        }
    }

    /// Sleep until each fire time, run a cycle, repeat.
    /// "Now" is re-read after every wake-up so late wake-ups don't accumulate.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "⏰ Scheduler started: {} fire time(s) in {}, {} term(s)",
            self.fire_times.len(),
            self.timezone,
            self.terms.len()
        );

        let mut last_fired: Option<DateTime<Tz>> = None;

        loop {
            let now = Utc::now().with_timezone(&self.timezone);
            let Some((next, wait)) = next_wait(now, last_fired, &self.fire_times) else {
                warn!("No fire times configured, scheduler exiting");
                return;
            };

            info!("Next digest cycle at {} (in {}s)", next.format("%Y-%m-%d %H:%M %Z"), wait.as_secs());

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Scheduler shutting down");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            last_fired = Some(next);
            let started = Utc::now();

            let report = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Scheduler shutting down mid-cycle");
                    return;
                }
                report = run_cycle(self.source.as_ref(), &self.dispatcher, &self.terms) => report,
            };

            info!(
                "Cycle done in {}ms: {} delivered, {} skipped, {} failed",
                (Utc::now() - started).num_milliseconds(),
                report.delivered.len(),
                report.skipped.len(),
                report.failed.len()
            );
            for (term, reason) in &report.failed {
                warn!("  {} failed: {}", term, reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeliveryPayload;
    use crate::services::dispatch_service::DestinationRegistry;
    use crate::test_support::{sample_payload, RecordingDestination};
    use crate::utils::FetchError;
    use chrono::Timelike;
    use chrono_tz::America::New_York;
    use chrono_tz::UTC;
    use serenity::async_trait;
    use std::sync::Mutex;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn ny(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Tz> {
        New_York.with_ymd_and_hms(y, mo, d, h, mi, s).single().unwrap()
    }

    #[test]
    fn test_next_fire_picks_earliest_today() {
        let now = ny(2024, 6, 3, 8, 0, 0);
        let next = next_fire(now, &[hm(16, 30), hm(9, 30)]).unwrap();
        assert_eq!(next, ny(2024, 6, 3, 9, 30, 0));
    }

    #[test]
    fn test_next_fire_rolls_to_tomorrow() {
        let now = ny(2024, 6, 3, 17, 0, 0);
        let next = next_fire(now, &[hm(9, 30), hm(16, 30)]).unwrap();
        assert_eq!(next, ny(2024, 6, 4, 9, 30, 0));
    }

    #[test]
    fn test_next_fire_exact_match_is_due() {
        let now = ny(2024, 6, 3, 16, 30, 0);
        assert_eq!(next_fire(now, &[hm(9, 30), hm(16, 30)]), Some(now));
    }

    #[test]
    fn test_next_fire_without_fire_times() {
        assert_eq!(next_fire(ny(2024, 6, 3, 8, 0, 0), &[]), None);
    }

    #[test]
    fn test_next_fire_skips_dst_gap() {
        // 02:30 does not exist in New York on 2024-03-10
        let now = ny(2024, 3, 10, 1, 0, 0);
        let next = next_fire(now, &[hm(2, 30)]).unwrap();
        assert_eq!(next, ny(2024, 3, 11, 2, 30, 0));
    }

    #[test]
    fn test_next_fire_is_minimal_and_within_a_day() {
        let fire_times = [hm(0, 0), hm(9, 30), hm(12, 15), hm(16, 30), hm(23, 59)];
        let start = UTC.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        for step in 0..(2 * 24 * 60 / 7) {
            let now = start + Duration::minutes(step * 7) + Duration::seconds(step % 60);
            let next = next_fire(now, &fire_times).unwrap();

            assert!(next >= now);
            assert!(next - now < Duration::hours(24));

            // No fire time lies strictly between now and next
            for t in fire_times {
                for day in [now.date_naive(), now.date_naive() + Days::new(1)] {
                    let occ = UTC.from_utc_datetime(&day.and_time(t));
                    assert!(!(occ >= now && occ < next), "missed {} before {}", occ, next);
                }
            }
        }
    }

    #[test]
    fn test_next_wait_does_not_refire_same_instant() {
        let fire_times = [hm(9, 30), hm(16, 30)];
        let fired = ny(2024, 6, 3, 9, 30, 0);

        let (next, wait) = next_wait(fired, Some(fired), &fire_times).unwrap();
        assert_eq!(next, ny(2024, 6, 3, 16, 30, 0));
        assert_eq!(wait, StdDuration::from_secs(7 * 3600));

        // Late wake-up: the wait is measured from the real "now"
        let late = ny(2024, 6, 3, 9, 45, 10);
        let (next, wait) = next_wait(late, Some(fired), &fire_times).unwrap();
        assert_eq!(next.hour(), 16);
        assert_eq!(wait, StdDuration::from_secs(6 * 3600 + 44 * 60 + 50));
    }

    /// Payload source that fails for chosen terms and records every request
    struct FakeSource {
        failing: Vec<Term>,
        requested: Mutex<Vec<Term>>,
    }

    #[async_trait]
    impl PayloadSource for FakeSource {
        async fn build(&self, term: Term) -> Result<DeliveryPayload, FetchError> {
            self.requested.lock().unwrap().push(term);
            if self.failing.contains(&term) {
                return Err(FetchError::QuoteUnavailable(term, "503".to_string()));
            }
            Ok(sample_payload(term))
        }
    }

    fn fake_source(failing: Vec<Term>) -> FakeSource {
        FakeSource { failing, requested: Mutex::new(Vec::new()) }
    }

    #[tokio::test]
    async fn test_cycle_isolates_delivery_failure() {
        let registry = Arc::new(DestinationRegistry::new());
        let five = Arc::new(RecordingDestination::default());
        let seven = RecordingDestination::failing();
        let ten = Arc::new(RecordingDestination::default());
        registry.set(Term::FiveYear, five.clone());
        registry.set(Term::SevenYear, seven.clone());
        registry.set(Term::TenYear, ten.clone());
        let dispatcher = Dispatcher::new(registry);
        let source = fake_source(vec![]);

        let report = run_cycle(&source, &dispatcher, &Term::ALL).await;

        assert_eq!(report.delivered, vec![Term::FiveYear, Term::TenYear]);
        assert_eq!(report.skipped, vec![Term::TwentyYear, Term::ThirtyYear]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, Term::SevenYear);
        assert_eq!(five.delivered(), vec![Term::FiveYear]);
        assert_eq!(ten.delivered(), vec![Term::TenYear]);
        assert_eq!(seven.notices().len(), 1);
        // Unmapped terms are never fetched
        assert_eq!(
            *source.requested.lock().unwrap(),
            vec![Term::FiveYear, Term::SevenYear, Term::TenYear]
        );
    }

    #[tokio::test]
    async fn test_cycle_isolates_fetch_failure() {
        let registry = Arc::new(DestinationRegistry::new());
        let seven = Arc::new(RecordingDestination::default());
        let ten = Arc::new(RecordingDestination::default());
        registry.set(Term::SevenYear, seven.clone());
        registry.set(Term::TenYear, ten.clone());
        let dispatcher = Dispatcher::new(registry);

        let report = run_cycle(&fake_source(vec![Term::SevenYear]), &dispatcher, &Term::ALL).await;

        assert_eq!(report.delivered, vec![Term::TenYear]);
        assert!(seven.delivered().is_empty());
        assert_eq!(seven.notices(), vec!["⚠️ Live quote for 7-Year is unavailable right now.".to_string()]);
        assert_eq!(ten.delivered(), vec![Term::TenYear]);
    }

    /// Payload source that unmaps its term from the registry while building
    struct UnmappingSource {
        registry: Arc<DestinationRegistry>,
        fail: bool,
    }

    #[async_trait]
    impl PayloadSource for UnmappingSource {
        async fn build(&self, term: Term) -> Result<DeliveryPayload, FetchError> {
            self.registry.remove(term);
            if self.fail {
                return Err(FetchError::Timeout(term));
            }
            Ok(sample_payload(term))
        }
    }

    #[tokio::test]
    async fn test_cycle_keeps_destination_resolved_before_fetch() {
        let registry = Arc::new(DestinationRegistry::new());
        let ten = Arc::new(RecordingDestination::default());
        registry.set(Term::TenYear, ten.clone());
        let dispatcher = Dispatcher::new(registry.clone());
        let source = UnmappingSource { registry: registry.clone(), fail: false };

        let report = run_cycle(&source, &dispatcher, &[Term::TenYear]).await;

        assert!(registry.get(Term::TenYear).is_none());
        assert_eq!(report.delivered, vec![Term::TenYear]);
        assert_eq!(ten.delivered(), vec![Term::TenYear]);

        // A fetch failure is still reported where the cycle meant to deliver
        let seven = Arc::new(RecordingDestination::default());
        registry.set(Term::SevenYear, seven.clone());
        let source = UnmappingSource { registry: registry.clone(), fail: true };

        let report = run_cycle(&source, &dispatcher, &[Term::SevenYear]).await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(seven.notices(), vec!["⚠️ Data source for 7-Year timed out.".to_string()]);
    }

    #[tokio::test]
    async fn test_run_exits_promptly_on_shutdown() {
        let scheduler = Scheduler::new(
            vec![hm(3, 0)],
            New_York,
            Term::ALL.to_vec(),
            Arc::new(fake_source(vec![])),
            Dispatcher::new(Arc::new(DestinationRegistry::new())),
        );
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(shutdown.clone()));

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        shutdown.cancel();

        let finished = tokio::time::timeout(StdDuration::from_secs(2), handle).await;
        assert!(finished.is_ok());
    }

    #[tokio::test]
    async fn test_run_without_fire_times_returns() {
        let scheduler = Scheduler::new(
            vec![],
            UTC,
            Term::ALL.to_vec(),
            Arc::new(fake_source(vec![])),
            Dispatcher::new(Arc::new(DestinationRegistry::new())),
        );
        let finished = tokio::time::timeout(StdDuration::from_secs(2), scheduler.run(CancellationToken::new())).await;
        assert!(finished.is_ok());
    }
}
