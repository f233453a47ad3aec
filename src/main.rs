use clade_extractor::corpus::{CladeExtractor, CladeSource, CorpusOptions};
use clade_extractor::error::CladeError;
use clade_extractor::io::{read_first_line, read_source, write_clades};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

/// Extract, deduplicate and enhance the clades implied by a set of trees
/// and write one clade per line.
#[derive(Parser, Debug)]
#[command(name = "clade-extractor", version, about = "Build a clade corpus from Newick trees or clade lists")]
struct Args {
    /// Precomputed clade list (one clade per line); may be repeated
    #[arg(short = 'X', long = "cladefile")]
    clade_files: Vec<PathBuf>,

    /// Gene trees in Newick format
    #[arg(short = 'g', long = "genetrees")]
    gene_trees: Option<PathBuf>,

    /// Extra trees whose clades are added to the corpus
    #[arg(short = 'e', long = "extragenetrees")]
    extra_trees: Option<PathBuf>,

    /// Only extract the clades of the rooted tree on the first line of this file
    #[arg(long = "rootedscore")]
    rooted_score: Option<PathBuf>,

    /// Add differences of nested clades whose sizes differ by less than N
    #[arg(long = "enhance", value_parser = clap::value_parser!(u64).range(1..))]
    enhance: Option<u64>,

    /// Run an additional extraction round over gene trees and extra trees combined
    #[arg(long = "extraextra", default_value_t = false)]
    extra_extra: bool,

    /// Keep single-leaf clades found while parsing trees
    #[arg(long = "include-trivial", default_value_t = false)]
    include_trivial: bool,

    /// Output path for the clade list (`-` for stdout, `.gz` to compress)
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: PathBuf,

    /// Quiet mode: only warnings and errors
    #[arg(short = 'q', long = "quiet", default_value_t = false, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode: include debug output
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.quiet {
        tracing::Level::WARN
    } else if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let extractor = match load(&args) {
        Ok(e) => e,
        Err(e) => {
            error!("Failed to read input: {e}");
            std::process::exit(2);
        }
    };
    info!("Reading in sources {:.3}s", t0.elapsed().as_secs_f64());

    let t1 = Instant::now();
    let corpus = match extractor.corpus() {
        Ok(c) => c,
        Err(e @ CladeError::EmptyUniverse) => {
            error!("{e}");
            std::process::exit(2);
        }
        Err(e) => {
            error!("Failed to build clade corpus: {e}");
            std::process::exit(3);
        }
    };
    info!(
        "Built {} clades over {} taxa in {:.3}s",
        corpus.len(),
        corpus.taxa().len(),
        t1.elapsed().as_secs_f64()
    );

    let t2 = Instant::now();
    if let Err(e) = write_clades(&args.output, corpus) {
        error!("Failed to write output {:?}: {e}", args.output);
        std::process::exit(4);
    }
    info!("Writing to output {:.3}s", t2.elapsed().as_secs_f64());
}

fn load(args: &Args) -> Result<CladeExtractor, CladeError> {
    let rooted_score = args.rooted_score.as_ref().map(read_first_line).transpose()?;
    let options = CorpusOptions {
        enhance: args.enhance.map(|n| n as usize),
        rooted_score,
        extra_extra: args.extra_extra,
        include_trivial: args.include_trivial,
    };

    let mut extractor = CladeExtractor::new(options);
    for path in &args.clade_files {
        extractor.add_source(CladeSource::CladeList(read_source(path)?));
    }
    if let Some(path) = &args.gene_trees {
        extractor.add_source(CladeSource::GeneTrees(read_source(path)?));
    }
    if let Some(path) = &args.extra_trees {
        extractor.add_source(CladeSource::ExtraTrees(read_source(path)?));
    }
    Ok(extractor)
}
