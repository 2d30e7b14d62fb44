//! Wall-clock timing of repeated calls.

use std::time::{Duration, Instant};

/// Runs `f` once and returns its result with the elapsed time.
pub fn time_once<R>(f: impl FnOnce() -> R) -> (R, Duration) {
    let start = Instant::now();
    let result = f();
    (result, start.elapsed())
}

/// Mean duration of `runs` calls to `f`. Zero runs yields `Duration::ZERO`.
pub fn mean_execution_time(runs: usize, mut f: impl FnMut()) -> Duration {
    let outcome: Result<Duration, std::convert::Infallible> = try_mean_execution_time(runs, || {
        f();
        Ok(())
    });
    match outcome {
        Ok(mean) => mean,
        Err(never) => match never {},
    }
}

/// Like [`mean_execution_time`], stopping at the first error.
pub fn try_mean_execution_time<E>(
    runs: usize,
    mut f: impl FnMut() -> Result<(), E>,
) -> Result<Duration, E> {
    if runs == 0 {
        return Ok(Duration::ZERO);
    }
    let mut total = Duration::ZERO;
    for _ in 0..runs {
        let (result, elapsed) = time_once(&mut f);
        result?;
        total += elapsed;
    }
    Ok(total.div_f64(runs as f64))
}
