//! CLI tool for inspecting executable archives.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use nestarc::{ChainedAddress, Launcher, ResolveMode, Resolved};

/// Inspect self-contained executable archives.
#[derive(Parser)]
#[command(name = "nestarc", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the entries of the archive at a chained address.
    List {
        /// Archive address, e.g. `app.arc` or `app.arc!/APP-INF/lib/x.arc`.
        address: String,
    },
    /// Resolve a chained address and describe what it points at.
    Resolve {
        /// Address of an archive or an entry inside one.
        address: String,
    },
    /// Show archive metadata and the discovered launch classpath.
    Info {
        /// Path to a packaged archive or exploded directory.
        path: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> nestarc::Result<()> {
    match command {
        Command::List { address } => list(&address),
        Command::Resolve { address } => resolve(&address),
        Command::Info { path } => info(&path),
    }
}

fn list(address: &str) -> nestarc::Result<()> {
    let archive = ChainedAddress::parse(address)?.resolve_archive(ResolveMode::Exact)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for header in archive.entries() {
        let header = header?;
        let _ = writeln!(
            out,
            "{:>12}  {}",
            header.uncompressed_size(),
            header.name().as_str()
        );
    }
    Ok(())
}

fn resolve(address: &str) -> nestarc::Result<()> {
    let parsed = ChainedAddress::parse(address)?;
    match parsed.resolve(ResolveMode::Exact)? {
        Resolved::Archive(archive) => {
            println!("archive  {}", archive.location());
            println!("entries  {}", archive.entry_count());
        }
        Resolved::Entry { archive, header } => {
            println!("entry    {}", header.name().as_str());
            println!("in       {}", archive.location());
            println!(
                "size     {} ({} compressed, method {})",
                header.uncompressed_size(),
                header.compressed_size(),
                header.method()
            );
        }
    }
    Ok(())
}

fn info(path: &str) -> nestarc::Result<()> {
    let launcher = Launcher::open(path)?;
    match launcher.entry_point() {
        Ok(entry_point) => println!("entry point     {entry_point}"),
        Err(_) => println!("entry point     (none declared)"),
    }
    println!("classpath index {}", if launcher.has_index() { "yes" } else { "no" });
    println!("classpath:");
    for address in launcher.class_path()? {
        println!("  {address}");
    }
    Ok(())
}
