use std::sync::Arc;

use alarmclock::{AlarmClock, appsettings::AppSettings};
use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::Notify;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = AppSettings::new().context("Could not load appsettings")?;
    let timezone = match settings.timezone.as_deref() {
        Some(name) => name
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone {name}: {e}"))?,
        None => Tz::UTC,
    };
    let minutes = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<i64>()
            .with_context(|| format!("Expected a number of minutes, got {arg:?}"))?,
        None => settings.minutes,
    };

    let finished = Arc::new(Notify::new());
    let mut alarm = AlarmClock::new(
        Arc::new(|half_minutes| log::info!("{half_minutes} half minutes left")),
        Arc::new(|seconds| log::info!("{seconds} seconds left")),
        {
            let finished = Arc::clone(&finished);
            Arc::new(move || {
                log::info!("Time is up!");
                finished.notify_one();
            })
        },
    );
    alarm.apply_settings(&settings.alarm);

    alarm.add(minutes);
    alarm.start();
    log::info!("Alarm set for {}", local(alarm.end_date(), &timezone));

    tokio::select! {
        _ = finished.notified() => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted with {} seconds left", alarm.left_seconds());
            alarm.reset();
        }
    }

    Ok(())
}

fn local(instant: DateTime<Utc>, timezone: &Tz) -> String {
    instant
        .with_timezone(timezone)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string()
}
