use std::{
    ffi::OsStr,
    fs::{self, File},
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use vmtrans::{hack, CompareStrategy, IfGotoTest, Options, Translator};

/// Translate VM code into Hack assembly.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// `.vm` files, or directories of them. Each file is one compilation unit.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output `.asm` file. Defaults to the first input with an `.asm` extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Initialise SP to 256 before the first command.
    #[arg(long)]
    bootstrap: bool,

    /// Use generated labels rather than computed addresses in comparisons.
    #[arg(long)]
    symbolic_compare: bool,

    /// Make `if-goto` jump on any non-zero value instead of positive ones.
    #[arg(long)]
    nonzero_if_goto: bool,

    /// Do not echo source lines as comments.
    #[arg(long)]
    no_comments: bool,

    /// Resolve the output's symbols before writing it.
    #[arg(long)]
    verify: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn unit_name(path: &Path) -> Result<&str> {
    path.file_stem()
        .and_then(OsStr::to_str)
        .with_context(|| format!("No usable file name: {}", path.display()))
}

/// Expand directories into their `.vm` files, sorted by name.
fn collect_sources(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut sources = vec![];
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(input)
                .with_context(|| format!("Error while reading directory: {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension() == Some(OsStr::new("vm")))
                .collect();
            found.sort();
            if found.is_empty() {
                bail!("No .vm files in {}", input.display());
            }
            sources.extend(found);
        } else {
            sources.push(input.clone());
        }
    }
    Ok(sources)
}

fn default_output(input: &Path) -> Result<PathBuf> {
    if input.is_dir() {
        Ok(input.join(format!("{}.asm", unit_name(input)?)))
    } else {
        Ok(input.with_extension("asm"))
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = match args.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let options = Options {
        compare: if args.symbolic_compare {
            CompareStrategy::Symbolic
        } else {
            CompareStrategy::Absolute
        },
        if_goto: if args.nonzero_if_goto {
            IfGotoTest::NonZero
        } else {
            IfGotoTest::Positive
        },
        comments: !args.no_comments,
        bootstrap: args.bootstrap,
    };

    let mut translator = Translator::with_options(options);
    for source in collect_sources(&args.inputs)? {
        let file = File::open(&source)
            .with_context(|| format!("File not found: {}", source.display()))?;
        translator
            .translate_unit(unit_name(&source)?, BufReader::new(file))
            .with_context(|| format!("Error while translating {}", source.display()))?;
    }
    let translation = translator.finish();

    if args.verify {
        let program = hack::assemble(&translation).context("Generated assembly is invalid")?;
        info!(
            "verified {} instructions, {} labels, {} variables",
            program.instructions.len(),
            program.labels.len(),
            program.variables.len()
        );
    }

    let outfilename = match args.output {
        Some(path) => path,
        None => default_output(&args.inputs[0])?,
    };
    let mut outfile = File::create(&outfilename)
        .with_context(|| format!("Cannot create {}", outfilename.display()))?;
    for instruction in &translation {
        writeln!(outfile, "{}", instruction)?;
    }
    info!("wrote {}", outfilename.display());

    Ok(())
}
