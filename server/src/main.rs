//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! `seclog` binary: the log server and a line-oriented test client

mod cli;

use clap::Parser;
use cli::{Cli, ClientArgs, Command, ServeArgs};
use seclog_client::LogClient;
use seclog_service::{LogServer, StdoutSink};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr; stdout carries received messages
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Client(args) => client(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Fatal error");
            eprintln!("seclog: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(args: ServeArgs) -> Result<(), BoxError> {
    let bind_address = tokio::net::lookup_host((args.host.as_str(), args.port))
        .await?
        .next()
        .ok_or_else(|| format!("{} did not resolve to an address", args.host))?;

    let server = LogServer::bind(args.server_config(bind_address)).await?;
    server.start(Arc::new(StdoutSink::new())).await?;
    info!(address = %server.local_addr(), "Listening, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;

    let report = server.shutdown().await?;
    if !report.is_clean() {
        warn!(forced = report.forced, "Some connections were aborted");
    }
    Ok(())
}

async fn client(args: ClientArgs) -> Result<(), BoxError> {
    let mut client = LogClient::with_ca_file(args.client_config(), &args.ca)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"mesg: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        // The connection is re-dialled on the next line
        if let Err(e) = client.send(&line).await {
            warn!(error = %e, "Message not delivered");
        }
    }

    client.close().await?;
    Ok(())
}
