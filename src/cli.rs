use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Backstage — multi-tenant admin backend
#[derive(Parser)]
#[command(name = "backstage", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Port to bind (overrides BACKSTAGE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Reconcile permissions and bootstrap a company with its admin account
    Seed {
        /// Company name
        #[arg(long)]
        company: String,
        /// Tenant prefix partitioning the company's data
        #[arg(long)]
        prefix: String,
        /// Admin account identifier (stored as {prefix}@{admin})
        #[arg(long, default_value = "admin")]
        admin: String,
        /// Admin account password
        #[arg(long)]
        password: String,
        /// Optional JSON file with extra permission tree nodes
        #[arg(long)]
        permissions: Option<PathBuf>,
    },

    /// WeChat mini-program utilities
    Wx {
        #[command(subcommand)]
        command: WxCommands,
    },
}

#[derive(Subcommand)]
pub enum WxCommands {
    /// Generate a scheme deep-link
    Scheme {
        #[arg(long)]
        path: String,
        #[arg(long)]
        query: Option<String>,
        /// Link lifetime in seconds
        #[arg(long, default_value = "86400")]
        expire_interval: i64,
    },
    /// Generate a url-link
    UrlLink {
        #[arg(long)]
        path: Option<String>,
        #[arg(long)]
        query: Option<String>,
        /// Link lifetime in days (expire_type 1)
        #[arg(long, default_value = "1")]
        expire_interval: i64,
    },
}
