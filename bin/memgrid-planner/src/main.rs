//! Memgrid Topology Planner CLI
//!
//! Plans a partition-to-host topology for a declared cluster and prints
//! the canonical JSON document to stdout. Logging goes to stderr so the
//! output stays pipeable.

use anyhow::{bail, Context, Result};
use clap::Parser;
use memgrid_common::{ClusterConfig, GroupTag, HostId};
use memgrid_placement::{plan, PlacementRequest};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "memgrid-planner")]
#[command(about = "Memgrid cluster topology planner")]
#[command(version)]
struct Args {
    /// Number of hosts (defaults to the number of --host-group tags)
    #[arg(long)]
    hosts: Option<i32>,

    /// Partition slots per host
    #[arg(short, long, default_value = "8")]
    sites_per_host: i32,

    /// Replication factor (number of copies beyond the master)
    #[arg(short, long, default_value = "0")]
    kfactor: i32,

    /// Host group tag, repeatable: <hostId>=<rack>[:<buddy>]
    #[arg(long = "host-group", value_name = "ID=RACK[:BUDDY]")]
    host_groups: Vec<String>,

    /// Full planning request as a JSON file (overrides the sizing flags;
    /// use for rejoin inputs)
    #[arg(long)]
    request: Option<PathBuf>,

    /// Force the round-robin fallback strategy
    #[arg(long)]
    fallback: bool,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut request = match &args.request {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading request file {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("parsing request file {}", path.display()))?
        }
        None => build_request(&args)?,
    };

    // The environment knob is resolved here, at the process boundary; the
    // planner itself only sees the explicit flag.
    if args.fallback || env_forces_fallback() {
        request.force_fallback = true;
    }

    info!(
        hosts = request.config.host_count,
        sites_per_host = request.config.sites_per_host,
        kfactor = request.config.kfactor,
        fallback = request.force_fallback,
        "planning topology"
    );

    let topology = plan(&request)?;
    println!("{}", topology.to_json_string()?);
    Ok(())
}

fn env_forces_fallback() -> bool {
    std::env::var("VOLT_REPLICA_FALLBACK").is_ok_and(|value| value.eq_ignore_ascii_case("true"))
}

fn build_request(args: &Args) -> Result<PlacementRequest> {
    let mut host_groups: BTreeMap<HostId, GroupTag> = BTreeMap::new();
    for tag in &args.host_groups {
        let (host, group) = parse_host_group(tag)?;
        if host_groups.insert(host, group).is_some() {
            bail!("duplicate host id in --host-group: {tag}");
        }
    }

    let host_count = match args.hosts {
        Some(count) => count,
        None if !host_groups.is_empty() => host_groups.len() as i32,
        None => bail!("either --hosts or at least one --host-group is required"),
    };

    // With no explicit tags every host lands in a single flat group.
    if host_groups.is_empty() {
        for id in 0..host_count {
            host_groups.insert(HostId::new(id), GroupTag::new("0", "0"));
        }
    }

    let config = ClusterConfig::new(host_count, args.sites_per_host, args.kfactor);
    Ok(PlacementRequest::new(config, host_groups))
}

fn parse_host_group(tag: &str) -> Result<(HostId, GroupTag)> {
    let (id, groups) = tag
        .split_once('=')
        .with_context(|| format!("expected <hostId>=<rack>[:<buddy>], got {tag:?}"))?;
    let id: i32 = id
        .trim()
        .parse()
        .with_context(|| format!("invalid host id in {tag:?}"))?;
    let (rack, buddy) = groups.split_once(':').unwrap_or((groups, "0"));
    Ok((HostId::new(id), GroupTag::new(rack.trim(), buddy.trim())))
}
