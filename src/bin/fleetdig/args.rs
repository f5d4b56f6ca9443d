// Copyright 2024 the fleetdns authors.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implements command-line argument parsing.

use std::net::IpAddr;

use clap::Parser;

use fleetdns::Type;

/// Parses the command line arguments.
pub fn parse() -> Args {
    Args::parse()
}

/// A dig-style lookup tool built on fleetdns
#[derive(Debug, Parser)]
#[command(author, version)]
pub struct Args {
    /// Domain name to look up
    pub domain: String,

    /// Query type (A, AAAA, CNAME, MX, ..., or TYPEnn)
    #[arg(default_value = "A")]
    pub qtype: Type,

    /// DNS server to query
    #[arg(short, long, default_value = "8.8.8.8", value_name = "IP")]
    pub server: IpAddr,

    /// Print answer data only, one record per line
    #[arg(long)]
    pub short: bool,

    /// Query timeout in milliseconds
    #[arg(long, default_value_t = 2000, value_name = "MS")]
    pub timeout: u64,
}
