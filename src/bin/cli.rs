//! zkv CLI
//!
//! Command-line interface for inspecting and maintaining a zkv file.
//! Keys and values are strings.

use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use zkv::{CompressorRegistry, Config, Engine, ZkvError};

/// zkv CLI
#[derive(Parser, Debug)]
#[command(name = "zkv-cli")]
#[command(about = "CLI for zkv single-file key-value storage")]
#[command(version)]
struct Args {
    /// Storage file
    #[arg(short, long, default_value = "./data.zkv")]
    file: String,

    /// Open without permitting writes
    #[arg(short, long)]
    read_only: bool,

    /// Block size in bytes (new files; must match existing files)
    #[arg(short, long)]
    block_size: Option<u64>,

    /// Compressor name: none, xz or zstd (new files; must match existing files)
    #[arg(short, long)]
    compressor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Print the number of live keys
    Count,

    /// List live keys
    Keys,

    /// Print live key/value pairs in file order
    Dump,

    /// Print file configuration and recovery statistics
    Info,

    /// Write a compacted copy of the file
    Shrink {
        /// Destination path (must not exist)
        dest: String,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,zkv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> zkv::Result<()> {
    let registry = CompressorRegistry::with_defaults()?;

    let mut builder = Config::builder().read_only(args.read_only);
    if let Some(size) = args.block_size {
        builder = builder.block_data_size(size);
    }
    if let Some(name) = &args.compressor {
        let id = registry.id_by_name(name).ok_or_else(|| {
            ZkvError::InvalidConfig(format!("unknown compressor name: {}", name))
        })?;
        builder = builder.compressor(id);
    }

    let engine = Engine::open_with_registry(&args.file, builder.build(), registry.into())?;

    match args.command {
        Commands::Get { key } => match engine.get::<_, String>(key.as_str()) {
            Ok(value) => println!("{}", value),
            Err(ZkvError::NotFound) => println!("(not found)"),
            Err(e) => return Err(e),
        },
        Commands::Set { key, value } => {
            engine.set(key.as_str(), value.as_str())?;
            println!("OK");
        }
        Commands::Del { key } => {
            engine.delete(key.as_str())?;
            println!("OK");
        }
        Commands::Count => println!("{}", engine.count()),
        Commands::Keys => {
            for key in engine.keys::<String>()? {
                println!("{}", key);
            }
        }
        Commands::Dump => {
            engine.iterate::<String, String, _>(|key, value| {
                println!("{}\t{}", key, value);
                true
            })?;
        }
        Commands::Info => {
            let config = engine.config();
            let report = engine.recovery_report();
            println!("path:              {}", engine.path().display());
            println!("compressor id:     {}", engine.compressor_id());
            println!(
                "block data size:   {}",
                config.block_data_size.unwrap_or_default()
            );
            println!("read only:         {}", config.read_only);
            println!("live keys:         {}", engine.count());
            println!("flushed blocks:    {}", engine.block_count());
            println!("buffered bytes:    {}", engine.buffer_len());
            println!("records replayed:  {}", report.records_replayed);
            println!("tombstones:        {}", report.tombstones_replayed);
        }
        Commands::Shrink { dest } => {
            engine.shrink(&dest)?;
            println!("OK");
        }
    }

    engine.close()
}
