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

//! The contract the controllers expect from the AWS API bindings.
//!
//! Every call returns either a provider-native record or an [`Error`]
//! carrying the AWS error code. Bindings are handed in through
//! [`CloudProvider`], one set of [`Clients`] per region.

use std::future::Future;
use std::sync::Arc;

use snafu::Snafu;
use strum::{AsRefStr, Display, EnumString};
use tokio_util::sync::CancellationToken;

#[cfg(test)]
use mockall::automock;

pub mod autoscaling;
pub mod ec2;
pub mod eks;
pub mod iam;

pub use autoscaling::AutoScalingApi;
pub use ec2::Ec2Api;
pub use eks::EksApi;
pub use iam::IamApi;

/// AWS error codes the controllers branch on. Anything else is kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum ErrorCode {
    #[strum(serialize = "ResourceNotFoundException")]
    ResourceNotFound,

    #[strum(serialize = "InvalidLaunchTemplateName.NotFoundException")]
    LaunchTemplateNameNotFound,

    #[strum(serialize = "InvalidLaunchTemplateId.NotFound")]
    LaunchTemplateIdNotFound,

    #[strum(serialize = "InvalidGroup.NotFound")]
    SecurityGroupNotFound,

    #[strum(serialize = "NoSuchEntity")]
    NoSuchEntity,

    #[strum(serialize = "Throttling")]
    Throttling,

    #[strum(serialize = "RequestLimitExceeded")]
    RequestLimitExceeded,

    #[strum(serialize = "ResourceInUseException")]
    ResourceInUse,

    #[strum(serialize = "InvalidParameterException")]
    InvalidParameter,

    #[strum(serialize = "ScalingActivityInProgress")]
    ScalingActivityInProgress,

    #[strum(serialize = "ResourceContention")]
    ResourceContention,

    #[strum(default, transparent)]
    Other(String),
}

impl ErrorCode {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ErrorCode::ResourceNotFound
                | ErrorCode::LaunchTemplateNameNotFound
                | ErrorCode::LaunchTemplateIdNotFound
                | ErrorCode::SecurityGroupNotFound
                | ErrorCode::NoSuchEntity
        )
    }

    pub fn is_throttling(&self) -> bool {
        matches!(
            self,
            ErrorCode::Throttling | ErrorCode::RequestLimitExceeded
        )
    }
}

#[derive(Snafu, Debug, Clone)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("{code}: {message}"))]
    Api { code: ErrorCode, message: String },

    #[snafu(display("cloud call cancelled"))]
    Cancelled,
}

impl Error {
    pub fn api(code: impl AsRef<str>, message: impl Into<String>) -> Self {
        Error::Api {
            code: ErrorCode::from(code.as_ref()),
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            Error::Api { code, .. } => Some(code),
            Error::Cancelled => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code().is_some_and(ErrorCode::is_not_found)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Runs a cloud call, abandoning it as soon as `token` is cancelled.
pub async fn with_cancel<T, F>(token: &CancellationToken, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => CancelledSnafu.fail(),
        res = call => res,
    }
}

/// Per-region handles to the AWS APIs.
#[derive(Clone)]
pub struct Clients {
    pub ec2: Arc<dyn Ec2Api>,
    pub autoscaling: Arc<dyn AutoScalingApi>,
    pub eks: Arc<dyn EksApi>,
    pub iam: Arc<dyn IamApi>,
}

/// Supplies AWS API bindings, typically backed by one SDK config per region.
#[cfg_attr(test, automock)]
pub trait CloudProvider: Send + Sync {
    fn clients(&self, region: &str) -> Clients;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_code_parsing() {
        assert_eq!(
            ErrorCode::from("ResourceNotFoundException"),
            ErrorCode::ResourceNotFound
        );
        assert_eq!(
            ErrorCode::from("InvalidLaunchTemplateName.NotFoundException"),
            ErrorCode::LaunchTemplateNameNotFound
        );
        assert_eq!(
            ErrorCode::from("SomethingNew"),
            ErrorCode::Other("SomethingNew".to_string())
        );
        assert_eq!(ErrorCode::from("SomethingNew").to_string(), "SomethingNew");
        assert_eq!(ErrorCode::SecurityGroupNotFound.as_ref(), "InvalidGroup.NotFound");
        assert_eq!(
            "NoSuchEntity".parse::<ErrorCode>(),
            Ok(ErrorCode::NoSuchEntity)
        );
    }

    #[test]
    fn test_not_found_classification() {
        assert!(Error::api("ResourceNotFoundException", "gone").is_not_found());
        assert!(Error::api("NoSuchEntity", "gone").is_not_found());
        assert!(!Error::api("AccessDenied", "nope").is_not_found());
        assert!(!Error::Cancelled.is_not_found());
        assert!(ErrorCode::from("Throttling").is_throttling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_cancel_aborts_pending_call() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            child.cancel();
        });

        let res: Result<()> = with_cancel(&token, async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        })
        .await;
        assert!(res.expect_err("call should be cancelled").is_cancelled());
    }
}
