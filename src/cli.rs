// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command line flags and process configuration.
//!
//! Flags come from [`Cli`]; the pod identity comes from the downward API
//! environment (`MY_POD_NAMESPACE`, `MY_POD_NAME`) and the host name. Both
//! are combined and validated into an [`OperatorConfig`] before anything talks to
//! the cluster.

use crate::constants::{
    DEFAULT_CACHE_SYNC_TIMEOUT_SECS, DEFAULT_LEASE_DURATION_SECS,
    DEFAULT_LEASE_RENEW_DEADLINE_SECS, DEFAULT_LEASE_RETRY_PERIOD_SECS, DEFAULT_RESYNC_PERIOD_SECS,
    DEFAULT_WORKER_COUNT, ENV_HOSTNAME, ENV_POD_NAME, ENV_POD_NAMESPACE,
    METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PORT,
};
use crate::controller::ControllerConfig;
use crate::errors::ConfigError;
use crate::leader::LeaderElectionConfig;
use crate::version::LONG_VERSION;
use clap::{ArgAction, Parser};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// LoadBalancer Operator for Kubernetes
#[derive(Parser, Debug, Clone)]
#[command(name = "lbaas", version, long_version = LONG_VERSION, about, long_about = None)]
pub struct Cli {
    /// Install or update the LoadBalancer CRD on startup
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub create_crd: bool,

    /// Number of concurrent reconcile workers
    #[arg(long, env = "LBAAS_WORKERS", default_value_t = DEFAULT_WORKER_COUNT)]
    pub workers: usize,

    /// Seconds a standby waits before taking over an unrenewed lease
    #[arg(long, default_value_t = DEFAULT_LEASE_DURATION_SECS)]
    pub lease_duration: u64,

    /// Seconds the leader keeps retrying a renewal before giving up
    #[arg(long, default_value_t = DEFAULT_LEASE_RENEW_DEADLINE_SECS)]
    pub renew_deadline: u64,

    /// Seconds between leader election attempts
    #[arg(long, default_value_t = DEFAULT_LEASE_RETRY_PERIOD_SECS)]
    pub retry_period: u64,

    /// Seconds to wait for the watch caches to complete their initial list
    #[arg(long, default_value_t = DEFAULT_CACHE_SYNC_TIMEOUT_SECS)]
    pub cache_sync_timeout: u64,

    /// Seconds between full resyncs of all cached LoadBalancers
    #[arg(long, default_value_t = DEFAULT_RESYNC_PERIOD_SECS)]
    pub resync_period: u64,

    /// Port serving /metrics and /healthz
    #[arg(long, env = "LBAAS_METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    pub metrics_port: u16,
}

/// Everything the operator needs to start, validated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace holding the leader lock
    pub namespace: String,
    /// Pod name, reported on published events
    pub pod_name: String,
    pub create_crd: bool,
    pub leader: LeaderElectionConfig,
    pub controller: ControllerConfig,
    pub metrics_addr: SocketAddr,
}

impl OperatorConfig {
    /// Build the config from flags and the process environment.
    ///
    /// # Errors
    /// See [`OperatorConfig::from_cli`]
    pub fn from_env(cli: &Cli) -> Result<Self, ConfigError> {
        Self::from_cli(cli, |name| std::env::var(name).ok(), system_hostname())
    }

    /// Build the config from flags and an environment lookup.
    ///
    /// The lock identity is the system host name, then `HOSTNAME`, then the
    /// pod name.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingEnv`] if the pod namespace or name is not
    /// set and [`ConfigError::Invalid`] for out-of-range or inconsistent flags
    pub fn from_cli<F>(cli: &Cli, env: F, hostname: Option<String>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            env(name)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingEnv(name))
        };
        let namespace = required(ENV_POD_NAMESPACE)?;
        let pod_name = required(ENV_POD_NAME)?;
        let identity = hostname
            .filter(|value| !value.is_empty())
            .or_else(|| env(ENV_HOSTNAME).filter(|value| !value.is_empty()))
            .unwrap_or_else(|| pod_name.clone());

        if cli.workers == 0 {
            return Err(ConfigError::Invalid(
                "--workers must be at least 1".to_string(),
            ));
        }
        if cli.cache_sync_timeout == 0 {
            return Err(ConfigError::Invalid(
                "--cache-sync-timeout must be greater than zero".to_string(),
            ));
        }
        if cli.resync_period == 0 {
            return Err(ConfigError::Invalid(
                "--resync-period must be greater than zero".to_string(),
            ));
        }

        let leader = LeaderElectionConfig {
            identity,
            lease_duration: Duration::from_secs(cli.lease_duration),
            renew_deadline: Duration::from_secs(cli.renew_deadline),
            retry_period: Duration::from_secs(cli.retry_period),
        };
        leader
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let bind: IpAddr = METRICS_SERVER_BIND_ADDRESS
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("metrics bind address: {e}")))?;

        Ok(Self {
            namespace,
            pod_name,
            create_crd: cli.create_crd,
            leader,
            controller: ControllerConfig {
                workers: cli.workers,
                cache_sync_timeout: Duration::from_secs(cli.cache_sync_timeout),
                resync_period: Duration::from_secs(cli.resync_period),
            },
            metrics_addr: SocketAddr::new(bind, cli.metrics_port),
        })
    }
}

/// Host name reported by the operating system, if it is valid UTF-8.
fn system_hostname() -> Option<String> {
    hostname::get()
        .ok()?
        .into_string()
        .ok()
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod cli_tests;
