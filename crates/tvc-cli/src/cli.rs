use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tvc_root::Column;
use tvc_types::{Collation, TableName};

#[derive(Parser)]
#[command(
    name = "tvc",
    about = "TVC: version-controlled tables with a staging area",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Repository directory
    #[arg(short = 'C', long = "repo", global = true, default_value = ".")]
    pub repo: PathBuf,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new repository
    Init(InitArgs),
    /// Show staged, unstaged and untracked tables
    Status(StatusArgs),
    /// Stage tables for the next commit
    Add(AddArgs),
    /// Unstage tables, restoring them from Head
    Reset(ResetArgs),
    /// Edit tables in the working root
    Table(TableArgs),
    /// Inspect or copy tuple stream files
    Tuples(TuplesArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Database collation
    #[arg(long)]
    pub collation: Option<Collation>,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Also list ignored tables
    #[arg(long)]
    pub ignored: bool,
}

#[derive(Args)]
pub struct AddArgs {
    pub tables: Vec<TableName>,
    /// Stage every table in Working or Staged
    #[arg(short = 'A', long, conflicts_with_all = ["update", "tables"])]
    pub all: bool,
    /// Stage modified and deleted tables only
    #[arg(short = 'u', long, conflicts_with = "tables")]
    pub update: bool,
    /// Stage tables even when they match an ignore rule
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ResetArgs {
    /// Tables to unstage; all when empty
    pub tables: Vec<TableName>,
}

#[derive(Args)]
pub struct TableArgs {
    #[command(subcommand)]
    pub action: TableAction,
}

#[derive(Subcommand)]
pub enum TableAction {
    /// Create an empty table; columns are `name:type[:pk]`
    Create {
        name: TableName,
        #[arg(required = true)]
        columns: Vec<Column>,
    },
    /// Insert or replace a row
    Put {
        name: TableName,
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Remove a table
    Drop { name: TableName },
    /// Write a table's rows as a tuple stream of key/value pairs
    Export {
        name: TableName,
        #[arg(short, long)]
        output: PathBuf,
        /// Export the staged version instead of the working one
        #[arg(long)]
        staged: bool,
    },
}

#[derive(Args)]
pub struct TuplesArgs {
    #[command(subcommand)]
    pub action: TuplesAction,
}

#[derive(Subcommand)]
pub enum TuplesAction {
    /// Print every tuple in a stream file
    Dump { input: PathBuf },
    /// Copy a stream file frame by frame
    Copy { input: PathBuf, output: PathBuf },
}
