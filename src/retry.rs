// Copyright 2025 RustFS Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bounded exponential backoff for eventually consistent cloud state.
//!
//! The backoff parameters are fixed. A single wait blocks its reconcile for
//! at most [`MAX_ELAPSED`]; anything that takes longer is expected to return
//! a "not ready" outcome and requeue instead.

use std::future::Future;
use std::time::Duration;

use snafu::Snafu;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cloud::{self, ErrorCode};

pub const INITIAL_INTERVAL: Duration = Duration::from_secs(1);
pub const MULTIPLIER: f64 = 1.5;
pub const MAX_INTERVAL: Duration = Duration::from_secs(20);
pub const MAX_ELAPSED: Duration = Duration::from_secs(60);

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("condition not met after {elapsed:?}"))]
    Timeout { elapsed: Duration },

    #[snafu(display("wait cancelled"))]
    Cancelled,

    #[snafu(transparent)]
    Cloud { source: cloud::Error },
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Cloud { source } => source.is_cancelled(),
            Error::Timeout { .. } => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

/// Polls `op` until it reports done. Any error ends the wait, except
/// throttling, which is always retried.
pub async fn wait_for<F, Fut>(cancel: &CancellationToken, op: F) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = cloud::Result<bool>>,
{
    wait_for_with_retryable(cancel, op, &[]).await
}

/// Polls `op` until it reports done, retrying errors whose code is listed
/// in `retryable`.
///
/// When the budget runs out the last retryable error is returned, or
/// [`Error::Timeout`] if the operation never failed.
pub async fn wait_for_with_retryable<F, Fut>(
    cancel: &CancellationToken,
    mut op: F,
    retryable: &[ErrorCode],
) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = cloud::Result<bool>>,
{
    let start = Instant::now();
    let mut interval = INITIAL_INTERVAL;
    let mut last_error: Option<cloud::Error> = None;

    loop {
        if cancel.is_cancelled() {
            return CancelledSnafu.fail();
        }

        match op().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) if e.is_cancelled() => return CancelledSnafu.fail(),
            Err(e) if is_retryable(&e, retryable) => {
                debug!(error = %e, "retryable error while waiting");
                last_error = Some(e);
            }
            Err(e) => return Err(e.into()),
        }

        let elapsed = start.elapsed();
        if elapsed + interval > MAX_ELAPSED {
            return match last_error {
                Some(source) => Err(Error::Cloud { source }),
                None => TimeoutSnafu { elapsed }.fail(),
            };
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return CancelledSnafu.fail(),
            _ = tokio::time::sleep(interval) => {}
        }

        interval = interval.mul_f64(MULTIPLIER).min(MAX_INTERVAL);
    }
}

fn is_retryable(err: &cloud::Error, retryable: &[ErrorCode]) -> bool {
    err.code()
        .is_some_and(|code| code.is_throttling() || retryable.contains(code))
}
