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

//! The fleetdig binary, a dig-style lookup tool.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::Context;
use env_logger::Env;

use fleetdns::{acquire_message, release_message, Class, Client};

mod args;
mod format;

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(Env::new().default_filter_or("warn"));
    let args = args::parse();

    let server = SocketAddr::new(args.server, 53);
    let client = Client::new(server, Duration::from_millis(args.timeout), 16);

    let mut req = acquire_message();
    let mut resp = acquire_message();
    req.set_question(&args.domain, args.qtype, Class::IN);

    let start = Instant::now();
    client
        .exchange(&mut req, &mut resp)
        .with_context(|| format!("failed to query {} for {}", server, args.domain))?;
    let elapsed = start.elapsed();

    if args.short {
        format::short(&resp);
    } else {
        format::report(&req, &resp, args.server, elapsed);
    }

    release_message(req);
    release_message(resp);
    Ok(())
}
