pub mod onboard;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "covidash",
    about = "COVID-19 Indonesia case explorer & dashboard"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Onboard,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Status,
    Doctor,
    Serve,
    Dashboard,
    Report {
        #[arg(long)]
        province: Option<String>,
        #[arg(long)]
        year: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}
