use crate::rpc::RpcError;
use anyhow::{Error, Result};
use std::io::{self, ErrorKind};
use std::thread;
use std::time::Duration;
use tracing::warn;

const MAX_FLOOD_WAIT_SECS: u64 = 60;

pub fn retry<T, F>(operation: &str, max_attempts: usize, mut func: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let attempts = max_attempts.max(1);
    for attempt in 1..=attempts {
        match func() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt == attempts || !is_retryable_error(&err) {
                    return Err(err);
                }
                let delay = flood_wait(&err).unwrap_or_else(|| retry_delay(attempt));
                warn!(
                    "{} failed (attempt {}/{}): {:#}. Retrying in {}s...",
                    operation,
                    attempt,
                    attempts,
                    err,
                    delay.as_secs()
                );
                thread::sleep(delay);
            }
        }
    }

    unreachable!("retry loop must return success or error")
}

pub fn total_retry_sleep_seconds(max_attempts: usize) -> u64 {
    (1..max_attempts.max(1))
        .map(|attempt| retry_delay(attempt).as_secs())
        .sum()
}

fn retry_delay(attempt: usize) -> Duration {
    let capped = attempt.saturating_sub(1).min(3) as u32;
    Duration::from_secs(1 << capped)
}

fn flood_wait(err: &Error) -> Option<Duration> {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<RpcError>())
        .find_map(RpcError::flood_wait_seconds)
        .map(|secs| Duration::from_secs(secs.min(MAX_FLOOD_WAIT_SECS)))
}

fn is_retryable_error(err: &Error) -> bool {
    use ErrorKind::*;

    for cause in err.chain() {
        if let Some(rpc_err) = cause.downcast_ref::<RpcError>() {
            return rpc_err.is_retryable();
        }
        if let Some(req_err) = cause.downcast_ref::<reqwest::Error>() {
            return req_err.is_timeout() || req_err.is_connect() || req_err.is_body();
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                TimedOut | ConnectionReset | ConnectionAborted | BrokenPipe | UnexpectedEof
                | WouldBlock | Interrupted => {
                    return true;
                }
                _ => {}
            }
        }
    }

    false
}
