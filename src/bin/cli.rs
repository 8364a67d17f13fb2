//! PCL CLI
//!
//! Command-line access to a persistence root: read and write keys, dump and
//! replace file resources.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use pcl::{AccessMode, Config, PersistenceClient, Policy, ResourceReference, ShutdownFlags};
use tracing_subscriber::{fmt, EnvFilter};

/// PCL CLI
#[derive(Parser, Debug)]
#[command(name = "pcl-cli")]
#[command(about = "Inspect and edit persistence client data")]
#[command(version)]
struct Args {
    /// Persistence root directory
    #[arg(short, long, default_value = "./pcl_data")]
    root: PathBuf,

    /// Application id
    #[arg(short, long)]
    app: String,

    /// Policy for resources without a configuration entry
    #[arg(long, value_enum, default_value_t = FallbackPolicy::WriteThrough)]
    policy: FallbackPolicy,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FallbackPolicy {
    Cached,
    WriteThrough,
}

/// Addressing shared by every subcommand
#[derive(ClapArgs, Debug)]
struct Target {
    /// Resource name
    name: String,

    /// Logical database id (decimal or 0x-prefixed hex)
    #[arg(long, default_value = "0xFF", value_parser = parse_ldbid)]
    ldbid: u16,

    #[arg(long, default_value_t = 0)]
    user: u32,

    #[arg(long, default_value_t = 0)]
    seat: u32,
}

impl Target {
    fn reference(&self) -> ResourceReference {
        ResourceReference::new(self.ldbid, self.name.clone(), self.user, self.seat)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the value of a key
    Get(Target),

    /// Set a key
    Set {
        #[command(flatten)]
        target: Target,

        /// The value to store
        value: String,
    },

    /// Delete a key
    Del(Target),

    /// Print the size of a key's value
    Size(Target),

    /// File resource operations
    #[command(subcommand)]
    File(FileCommands),
}

#[derive(Subcommand, Debug)]
enum FileCommands {
    /// Write the file contents to stdout
    Cat(Target),

    /// Replace the file contents with stdin
    Write(Target),

    /// Remove the file
    Rm(Target),

    /// Print the physical path of the file
    Path(Target),
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pcl=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let fallback = match args.policy {
        FallbackPolicy::Cached => Policy::Cached,
        FallbackPolicy::WriteThrough => Policy::WriteThrough,
    };
    let config = Config::builder()
        .root_dir(&args.root)
        .fallback_policy(fallback)
        .build();

    let client = PersistenceClient::new(config);
    if let Err(e) = client.init(&args.app, ShutdownFlags::NORMAL) {
        tracing::error!("Failed to initialize: {}", e);
        return ExitCode::FAILURE;
    }

    let result = run(&client, &args.command);
    let shutdown = client.deinit();

    match (result, shutdown) {
        (Ok(()), Ok(())) => ExitCode::SUCCESS,
        (Err(e), _) | (Ok(()), Err(e)) => {
            eprintln!("error ({}): {}", e.status_code(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(client: &PersistenceClient, command: &Commands) -> pcl::Result<()> {
    match command {
        Commands::Get(target) => {
            let value = client.key_read_data(&target.reference())?;
            io::stdout().write_all(&value)?;
            println!();
        }
        Commands::Set { target, value } => {
            let written = client.key_write_data(&target.reference(), value.as_bytes())?;
            println!("{} bytes written", written);
        }
        Commands::Del(target) => {
            client.key_delete(&target.reference())?;
            println!("deleted");
        }
        Commands::Size(target) => {
            println!("{}", client.key_get_size(&target.reference())?);
        }
        Commands::File(FileCommands::Cat(target)) => {
            let handle = client.file_open(&target.reference(), AccessMode::ReadOnly)?;
            let region = client.file_map_region(handle);
            let result = region.and_then(|region| {
                io::stdout().write_all(&region)?;
                client.file_unmap_region(region)
            });
            client.file_close(handle)?;
            result?;
        }
        Commands::File(FileCommands::Write(target)) => {
            let mut data = Vec::new();
            io::stdin().read_to_end(&mut data)?;

            let handle = client.file_open(&target.reference(), AccessMode::ReadWrite)?;
            let written = if data.is_empty() {
                Ok(0)
            } else {
                client.file_write_data(handle, &data)
            };

            // Drop whatever the old content had beyond the new end
            let result = written.and_then(|written| {
                client.file_truncate(handle, data.len() as u64)?;
                Ok(written)
            });
            client.file_close(handle)?;
            println!("{} bytes written", result?);
        }
        Commands::File(FileCommands::Rm(target)) => {
            client.file_remove(&target.reference())?;
            println!("removed");
        }
        Commands::File(FileCommands::Path(target)) => {
            let created = client.file_create_path(&target.reference())?;
            println!("{}", created.path.display());
            client.file_release_path(created.handle)?;
        }
    }
    Ok(())
}

fn parse_ldbid(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid ldbid {:?}: {}", s, e))
}
