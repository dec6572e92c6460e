// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Galene-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Galene and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Galene CLI entrypoint.
//!
//! By default this serves the co-editing bridge over HTTP at
//! `http://127.0.0.1:<port>`: the editor's WebSocket at `/ws`, the polling
//! fallback under `/api`, and MCP over streamable HTTP at `/mcp`.
//!
//! Use `--mcp` to run the MCP server over stdio instead (intended for tool
//! integrations); the polling/push transports are not served in that mode.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use rmcp::transport::{
    streamable_http_server::session::local::LocalSessionManager, StreamableHttpServerConfig,
    StreamableHttpService,
};

use galene::diff::DiffOptions;
use galene::sync::{poll, push, SyncHandle, SyncOptions};

const DEFAULT_HTTP_PORT: u16 = 6004;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--port <port>] [--checkpoint-cap <n>] [--geometry-tolerance <units>] [--heartbeat-timeout <secs>] [--request-max-age <secs>]\n  {program} --mcp [--checkpoint-cap <n>] [--geometry-tolerance <units>]\n\nDefault mode serves the bridge at `http://127.0.0.1:<port>` (WebSocket at /ws, polling API under /api, MCP over streamable HTTP at /mcp; default port {DEFAULT_HTTP_PORT}).\n\n--mcp serves MCP over stdio instead and disables the HTTP transports.\n--checkpoint-cap bounds per-document history (default 50).\n--geometry-tolerance sets the per-axis diff tolerance in document units (default 1).\n--heartbeat-timeout drops push clients with no ping for that long (default 30).\n--request-max-age drops unresolved operation requests after that long (default 300)."
    );
}

#[derive(Debug, Default, Clone, PartialEq)]
struct CliOptions {
    mcp: bool,
    port: Option<u16>,
    checkpoint_cap: Option<usize>,
    geometry_tolerance: Option<f64>,
    heartbeat_timeout_secs: Option<u64>,
    request_max_age_secs: Option<u64>,
}

impl CliOptions {
    fn sync_options(&self) -> SyncOptions {
        let defaults = SyncOptions::default();
        SyncOptions {
            diff: DiffOptions {
                geometry_tolerance: self
                    .geometry_tolerance
                    .unwrap_or(defaults.diff.geometry_tolerance),
            },
            checkpoint_cap: self.checkpoint_cap.unwrap_or(defaults.checkpoint_cap),
            heartbeat_timeout: self
                .heartbeat_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.heartbeat_timeout),
            request_max_age: self
                .request_max_age_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_max_age),
        }
    }
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<CliOptions, ()> {
    let mut options = CliOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mcp" => {
                if options.mcp {
                    return Err(());
                }
                options.mcp = true;
            }
            "--port" => {
                if options.port.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                let port: u16 = raw.parse().map_err(|_| ())?;
                options.port = Some(port);
            }
            "--checkpoint-cap" => {
                if options.checkpoint_cap.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                let cap: usize = raw.parse().map_err(|_| ())?;
                if cap == 0 {
                    return Err(());
                }
                options.checkpoint_cap = Some(cap);
            }
            "--geometry-tolerance" => {
                if options.geometry_tolerance.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                let tolerance: f64 = raw.parse().map_err(|_| ())?;
                if !tolerance.is_finite() || tolerance < 0.0 {
                    return Err(());
                }
                options.geometry_tolerance = Some(tolerance);
            }
            "--heartbeat-timeout" => {
                if options.heartbeat_timeout_secs.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                let secs: u64 = raw.parse().map_err(|_| ())?;
                options.heartbeat_timeout_secs = Some(secs);
            }
            "--request-max-age" => {
                if options.request_max_age_secs.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                let secs: u64 = raw.parse().map_err(|_| ())?;
                options.request_max_age_secs = Some(secs);
            }
            _ => return Err(()),
        }
    }

    if options.mcp
        && (options.port.is_some()
            || options.heartbeat_timeout_secs.is_some()
            || options.request_max_age_secs.is_some())
    {
        return Err(());
    }

    Ok(options)
}

fn main() {
    let result = (|| -> Result<(), Box<dyn Error>> {
        let mut args = std::env::args();
        let program = args.next().unwrap_or_else(|| "galene".to_owned());

        let options = match parse_options(args) {
            Ok(options) => options,
            Err(()) => {
                print_usage(&program);
                std::process::exit(2);
            }
        };

        let handle = SyncHandle::new(options.sync_options());
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

        if options.mcp {
            let mcp = galene::mcp::GaleneMcp::new(handle);
            runtime.block_on(mcp.serve_stdio())?;
            return Ok(());
        }

        let port = options.port.unwrap_or(DEFAULT_HTTP_PORT);

        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;

            let config = StreamableHttpServerConfig {
                stateful_mode: true,
                ..StreamableHttpServerConfig::default()
            };
            let session_manager = Arc::new(LocalSessionManager::default());
            let mcp_service = {
                let mcp = galene::mcp::GaleneMcp::new(handle.clone());
                StreamableHttpService::new(move || Ok(mcp.clone()), session_manager, config)
            };

            let router = Router::new()
                .route("/ws", get(push::ws_handler))
                .merge(poll::routes())
                .with_state(handle.clone())
                .nest_service("/mcp", mcp_service);

            // The liveness/expiry sweep is the only timer-driven mutation; it
            // only ever removes entries.
            let sweep_handle = handle.clone();
            let sweep_interval = {
                let state = sweep_handle.lock().await;
                state.options().heartbeat_timeout.max(Duration::from_secs(1)) / 2
            };
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(sweep_interval);
                loop {
                    ticker.tick().await;
                    sweep_handle.sweep().await;
                }
            });

            eprintln!("galene: serving on http://127.0.0.1:{port} (ws at /ws, api at /api, mcp at /mcp)");
            axum::serve(listener, router).await?;
            Ok::<(), Box<dyn Error>>(())
        })?;

        Ok(())
    })();

    if let Err(err) = result {
        eprintln!("galene: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_options, CliOptions};

    #[test]
    fn parses_empty_args() {
        let options = parse_options(std::iter::empty()).expect("parse options");
        assert_eq!(options, CliOptions::default());
    }

    #[test]
    fn parses_mcp_flag() {
        let options = parse_options(["--mcp".to_owned()].into_iter()).expect("parse options");
        assert!(options.mcp);
        assert_eq!(options.port, None);
    }

    #[test]
    fn parses_port() {
        let options =
            parse_options(["--port".to_owned(), "1234".to_owned()].into_iter()).expect("parse");
        assert_eq!(options.port, Some(1234));
        assert!(!options.mcp);
    }

    #[test]
    fn parses_tuning_flags() {
        let options = parse_options(
            [
                "--checkpoint-cap".to_owned(),
                "10".to_owned(),
                "--geometry-tolerance".to_owned(),
                "2.5".to_owned(),
                "--heartbeat-timeout".to_owned(),
                "15".to_owned(),
                "--request-max-age".to_owned(),
                "60".to_owned(),
            ]
            .into_iter(),
        )
        .expect("parse options");

        assert_eq!(options.checkpoint_cap, Some(10));
        assert_eq!(options.geometry_tolerance, Some(2.5));
        assert_eq!(options.heartbeat_timeout_secs, Some(15));
        assert_eq!(options.request_max_age_secs, Some(60));

        let sync = options.sync_options();
        assert_eq!(sync.checkpoint_cap, 10);
        assert_eq!(sync.diff.geometry_tolerance, 2.5);
    }

    #[test]
    fn rejects_port_with_stdio_mcp_mode() {
        parse_options(["--mcp".to_owned(), "--port".to_owned(), "0".to_owned()].into_iter())
            .unwrap_err();
    }

    #[test]
    fn rejects_unknown_args() {
        parse_options(["--nope".to_owned()].into_iter()).unwrap_err();
    }

    #[test]
    fn rejects_duplicate_flags() {
        parse_options(["--mcp".to_owned(), "--mcp".to_owned()].into_iter()).unwrap_err();
        parse_options(
            ["--port".to_owned(), "1".to_owned(), "--port".to_owned(), "2".to_owned()].into_iter(),
        )
        .unwrap_err();
    }

    #[test]
    fn rejects_zero_checkpoint_cap() {
        parse_options(["--checkpoint-cap".to_owned(), "0".to_owned()].into_iter()).unwrap_err();
    }

    #[test]
    fn rejects_negative_geometry_tolerance() {
        parse_options(["--geometry-tolerance".to_owned(), "-1".to_owned()].into_iter())
            .unwrap_err();
    }

    #[test]
    fn rejects_missing_flag_values() {
        parse_options(["--port".to_owned()].into_iter()).unwrap_err();
        parse_options(["--checkpoint-cap".to_owned()].into_iter()).unwrap_err();
    }
}
