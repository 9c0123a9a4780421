//! Console front-end for the wand-store dump and visited-links repair
//! libraries. All recovery logic lives in `opera-wand` / `opera-vlink4`;
//! this binary only maps files and arguments onto them.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use opera_vlink4::{repair_stream, RepairEvent};
use opera_wand::{recovered_logins, write_report, WandFile};

#[derive(Debug, Parser)]
#[command(name = "opera-recover")]
#[command(about = "Recover data from legacy Opera browser artifacts (wand.dat, vlink4.dat).")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decrypt a wand.dat credential store and print the recovered
    /// URL/username/password entries.
    DumpWand(DumpWandArgs),
    /// Repair corrupted record lengths in a vlink4.dat visited-links log
    /// and write a corrected copy.
    RepairVisitedLinks(RepairArgs),
}

#[derive(Debug, Parser)]
struct DumpWandArgs {
    /// Path to the wand.dat file.
    input: PathBuf,
}

#[derive(Debug, Parser)]
struct RepairArgs {
    /// Path to the vlink4.dat file.
    input: PathBuf,

    /// Output path for the repaired file. Defaults to the input path with
    /// its extension replaced by a `_FIXED.dat` suffix.
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::DumpWand(args) => dump_wand(&args),
        Command::RepairVisitedLinks(args) => repair_visited_links(&args),
    };

    if let Err(message) = result {
        eprintln!("error: {message}");
        std::process::exit(1);
    }
}

fn dump_wand(args: &DumpWandArgs) -> Result<(), String> {
    let bytes = std::fs::read(&args.input)
        .map_err(|e| format!("{}: {e}", args.input.display()))?;
    let file = WandFile::read(&mut Cursor::new(bytes)).map_err(|e| e.to_string())?;

    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    write_report(&mut stdout, &recovered_logins(&file)).map_err(|e| e.to_string())
}

fn repair_visited_links(args: &RepairArgs) -> Result<(), String> {
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));

    let input = File::open(&args.input)
        .map_err(|e| format!("{}: {e}", args.input.display()))?;
    let mut input = BufReader::new(input);

    let output = File::create(&output_path)
        .map_err(|e| format!("{}: {e}", output_path.display()))?;
    let mut output = BufWriter::new(output);

    let summary = repair_stream(&mut input, &mut output, |event| match event {
        RepairEvent::Record { offset } => println!("{offset}"),
        RepairEvent::Repair { offset, .. } => println!("Attempting to repair @{offset}"),
    })
    .map_err(|e| e.to_string())?;
    output.flush().map_err(|e| e.to_string())?;

    println!(
        "Repaired {} of {} records -> {}",
        summary.repaired,
        summary.records,
        output_path.display()
    );
    Ok(())
}

/// `dir/vlink4.dat` -> `dir/vlink4_FIXED.dat`.
fn default_output_path(input: &Path) -> PathBuf {
    let mut output = input.with_extension("");
    let mut name = output.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push("_FIXED.dat");
    output.set_file_name(name);
    output
}
