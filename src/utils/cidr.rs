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

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use snafu::{OptionExt, ResultExt, Snafu};

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("{cidr:?} is not in address/prefix form"))]
    MissingPrefix { cidr: String },

    #[snafu(display("{cidr:?} has an invalid address: {source}"))]
    Address {
        cidr: String,
        source: std::net::AddrParseError,
    },

    #[snafu(display("{cidr:?} has an invalid prefix length"))]
    Prefix { cidr: String },
}

/// Parses a CIDR block and returns it in canonical network form, with host
/// bits cleared: `10.1.2.3/8` becomes `10.0.0.0/8`.
pub fn normalize(cidr: &str) -> Result<String, Error> {
    let (addr, prefix) = cidr.split_once('/').context(MissingPrefixSnafu { cidr })?;
    let addr: IpAddr = addr.parse().context(AddressSnafu { cidr })?;
    let prefix: u8 = prefix.parse().ok().context(PrefixSnafu { cidr })?;

    let network = match addr {
        IpAddr::V4(v4) => {
            if prefix > 32 {
                return PrefixSnafu { cidr }.fail();
            }
            let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
            IpAddr::V4(Ipv4Addr::from(u32::from(v4) & mask))
        }
        IpAddr::V6(v6) => {
            if prefix > 128 {
                return PrefixSnafu { cidr }.fail();
            }
            let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
            IpAddr::V6(Ipv6Addr::from(u128::from(v6) & mask))
        }
    };

    Ok(format!("{network}/{prefix}"))
}
