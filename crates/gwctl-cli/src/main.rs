//! `gwctl` CLI — command-line client for the `gwctl` control-plane server.
//!
//! A standalone HTTP client with no internal crate dependencies — talks
//! exclusively via the REST API (spec §6).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

/// gwctl — control-plane CLI for the residential gateway fleet.
#[derive(Parser)]
#[command(name = "gwctl", version, about = "gwctl CLI — manage nodes, HSI configuration, and sessions")]
struct Cli {
    /// gwctl server address.
    #[arg(long, env = "GWCTL_ADDR", default_value = "https://127.0.0.1:8443")]
    addr: String,

    /// Bearer token for authenticated routes.
    #[arg(long, env = "GWCTL_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check server and store health.
    Health,
    /// Obtain a bearer token.
    Login {
        username: String,
        password: String,
    },
    /// Revoke the current token.
    Logout,
    /// Create a user account.
    Register {
        username: String,
        password: String,
    },
    /// List registered nodes.
    Nodes,
    /// Unregister a node.
    NodeDelete {
        uuid: String,
    },
    /// Read a node's subscriber-count cap.
    SubscriberCountGet {
        node_id: String,
    },
    /// Set a node's subscriber-count cap.
    SubscriberCountPut {
        node_id: String,
        count: i64,
    },
    /// List user accounts.
    Users,
    /// Delete a user account.
    UserDelete {
        username: String,
    },
    /// List HSI user-ids for a node.
    HsiUsers {
        node_id: String,
    },
    /// Fetch one HSI record.
    HsiGet {
        node_id: String,
        user_id: String,
    },
    /// Create or update an HSI record.
    HsiPut {
        node_id: String,
        #[command(flatten)]
        config: HsiArgs,
    },
    /// Delete an HSI record.
    HsiDelete {
        node_id: String,
        user_id: String,
    },
    /// Dial a PPPoE session.
    Dial {
        node_id: String,
        user_id: String,
    },
    /// Hang up a PPPoE session.
    Hangup {
        node_id: String,
        user_id: String,
    },
    /// Read failed-event history, optionally scoped to one node.
    FailedEvents {
        node_id: Option<String>,
        #[arg(long)]
        event_type: Option<String>,
    },
}

#[derive(clap::Args)]
struct HsiArgs {
    user_id: String,
    vlan_id: String,
    account: String,
    password: String,
    pool_start: String,
    pool_end: String,
    dhcp_subnet: String,
    dhcp_gateway: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = reqwest::Client::builder().danger_accept_invalid_certs(false).build().context("building HTTP client")?;
    let addr = cli.addr.trim_end_matches('/').to_string();
    let token = cli.token;

    match cli.command {
        Command::Health => print_json(get(&client, &addr, "/api/health", None).await?),
        Command::Login { username, password } => {
            let body = serde_json::json!({"username": username, "password": password});
            print_json(post(&client, &addr, "/api/login", None, &body).await?)
        }
        Command::Logout => {
            let t = require_token(&token)?;
            print_json(post(&client, &addr, "/api/logout", Some(t), &serde_json::json!({})).await?)
        }
        Command::Register { username, password } => {
            let body = serde_json::json!({"username": username, "password": password});
            print_json(post(&client, &addr, "/api/register", None, &body).await?)
        }
        Command::Nodes => {
            let t = require_token(&token)?;
            print_json(get(&client, &addr, "/api/nodes", Some(t)).await?)
        }
        Command::NodeDelete { uuid } => {
            let t = require_token(&token)?;
            print_json(delete(&client, &addr, &format!("/api/nodes/{uuid}"), t).await?)
        }
        Command::SubscriberCountGet { node_id } => {
            let t = require_token(&token)?;
            print_json(get(&client, &addr, &format!("/api/nodes/{node_id}/subscriber-count"), Some(t)).await?)
        }
        Command::SubscriberCountPut { node_id, count } => {
            let t = require_token(&token)?;
            let body = serde_json::json!({"subscriber_count": count});
            print_json(put(&client, &addr, &format!("/api/nodes/{node_id}/subscriber-count"), t, &body).await?)
        }
        Command::Users => {
            let t = require_token(&token)?;
            print_json(get(&client, &addr, "/api/users", Some(t)).await?)
        }
        Command::UserDelete { username } => {
            let t = require_token(&token)?;
            print_json(delete(&client, &addr, &format!("/api/users/{username}"), t).await?)
        }
        Command::HsiUsers { node_id } => {
            let t = require_token(&token)?;
            print_json(get(&client, &addr, &format!("/api/config/{node_id}/hsi/users"), Some(t)).await?)
        }
        Command::HsiGet { node_id, user_id } => {
            let t = require_token(&token)?;
            print_json(get(&client, &addr, &format!("/api/config/{node_id}/hsi/{user_id}"), Some(t)).await?)
        }
        Command::HsiPut { node_id, config } => {
            let t = require_token(&token)?;
            let path = format!("/api/config/{node_id}/hsi/{}", config.user_id);
            let body = serde_json::json!({
                "user_id": config.user_id,
                "vlan_id": config.vlan_id,
                "account": config.account,
                "password": config.password,
                "pool_start": config.pool_start,
                "pool_end": config.pool_end,
                "dhcp_subnet": config.dhcp_subnet,
                "dhcp_gateway": config.dhcp_gateway,
            });
            print_json(put(&client, &addr, &path, t, &body).await?)
        }
        Command::HsiDelete { node_id, user_id } => {
            let t = require_token(&token)?;
            print_json(delete(&client, &addr, &format!("/api/config/{node_id}/hsi/{user_id}"), t).await?)
        }
        Command::Dial { node_id, user_id } => {
            let t = require_token(&token)?;
            let body = serde_json::json!({"node_id": node_id, "user_id": user_id});
            print_json(post(&client, &addr, "/api/pppoe/dial", Some(t), &body).await?)
        }
        Command::Hangup { node_id, user_id } => {
            let t = require_token(&token)?;
            let body = serde_json::json!({"node_id": node_id, "user_id": user_id});
            print_json(post(&client, &addr, "/api/pppoe/hangup", Some(t), &body).await?)
        }
        Command::FailedEvents { node_id, event_type } => {
            let t = require_token(&token)?;
            let mut path = match node_id {
                Some(id) => format!("/api/failed-events/{id}"),
                None => "/api/failed-events".to_string(),
            };
            if let Some(kind) = event_type {
                path = format!("{path}?event_type={kind}");
            }
            print_json(get(&client, &addr, &path, Some(t)).await?)
        }
    }
}

fn require_token(token: &Option<String>) -> Result<&str> {
    token.as_deref().ok_or_else(|| anyhow::anyhow!("missing --token/GWCTL_TOKEN; run `gwctl login` first"))
}

fn print_json(value: Value) {
    match serde_json::to_string_pretty(&value) {
        Ok(pretty) => println!("{pretty}"),
        Err(_) => println!("{value}"),
    }
}

async fn get(client: &reqwest::Client, addr: &str, path: &str, token: Option<&str>) -> Result<Value> {
    let mut req = client.get(format!("{addr}{path}"));
    if let Some(t) = token {
        req = req.bearer_auth(t);
    }
    handle(req.send().await.with_context(|| format!("GET {path}"))?).await
}

async fn post(client: &reqwest::Client, addr: &str, path: &str, token: Option<&str>, body: &Value) -> Result<Value> {
    let mut req = client.post(format!("{addr}{path}")).json(body);
    if let Some(t) = token {
        req = req.bearer_auth(t);
    }
    handle(req.send().await.with_context(|| format!("POST {path}"))?).await
}

async fn put(client: &reqwest::Client, addr: &str, path: &str, token: &str, body: &Value) -> Result<Value> {
    let req = client.put(format!("{addr}{path}")).bearer_auth(token).json(body);
    handle(req.send().await.with_context(|| format!("PUT {path}"))?).await
}

async fn delete(client: &reqwest::Client, addr: &str, path: &str, token: &str) -> Result<Value> {
    let req = client.delete(format!("{addr}{path}")).bearer_auth(token);
    handle(req.send().await.with_context(|| format!("DELETE {path}"))?).await
}

async fn handle(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        bail!("server returned {status}: {body}");
    }
    Ok(body)
}
