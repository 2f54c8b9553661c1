// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use ping::tracking::BoundingBox;
use std::net::SocketAddr;

mod cli;

#[derive(Parser)]
#[command(name = "ping")]
#[command(about = "Dual-camera photos with face masks, and the Ping! feed")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List {
        /// Use the built-in virtual phone cameras
        #[arg(long = "virtual")]
        virtual_cameras: bool,
    },

    /// Take a front and back photo and store them for publishing
    Capture {
        /// Use the built-in virtual phone cameras
        #[arg(long = "virtual")]
        virtual_cameras: bool,

        /// Mask to draw over faces
        #[arg(short, long)]
        mask: Option<String>,

        /// Face box as x,y,w,h in frame pixels, instead of the configured face model
        #[arg(long)]
        face: Option<BoundingBox>,
    },

    /// Publish the stored capture
    Publish {
        /// Wallet address of the author
        #[arg(short, long)]
        wallet: String,

        /// Optional caption
        #[arg(short, long, default_value = "")]
        caption: String,
    },

    /// Show the feed
    Feed {
        /// Only posts of this wallet
        #[arg(short, long)]
        wallet: Option<String>,

        /// Number of posts to fetch
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Run the REST proxy
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:3000")]
        bind: SocketAddr,

        /// Keep data in memory instead of the hosted database
        #[arg(long)]
        memory: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG controls the level, e.g. RUST_LOG=ping=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        match cli.command {
            Commands::List { virtual_cameras } => cli::list_cameras(virtual_cameras),
            Commands::Capture {
                virtual_cameras,
                mask,
                face,
            } => cli::capture(virtual_cameras, mask, face).await,
            Commands::Publish { wallet, caption } => cli::publish(&wallet, &caption).await,
            Commands::Feed { wallet, limit } => cli::show_feed(wallet, limit).await,
            Commands::Serve { bind, memory } => cli::serve(bind, memory).await,
        }
    })
}
