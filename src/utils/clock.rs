use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use tokio::time::Instant;

/// Represents an entity responsible for providing the local wall-clock time across the
/// application. Schedules are expressed in local time-of-day, so the clock hands out naive local
/// date-times instead of UTC instants. Tests swap it for a controllable clock.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> NaiveDateTime;

    fn instant(&self) -> Instant;

    async fn sleep_until(&self, instant: tokio::time::Instant);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: tokio::time::Instant) {
        tokio::time::sleep_until(instant).await;
    }
}
