//! mutant-repl - line-oriented REPL for the Mutant language.
//!
//! Each line compiles (or, in `--macros` mode, evaluates) in the same
//! context as every line before it - definitions and values persist for
//! the life of the session.

use clap::Parser as ClapParser;

#[derive(ClapParser)]
#[command(name = "mutant-repl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Line-oriented REPL for the Mutant language", long_about = None)]
#[command(disable_version_flag = true)]
struct Args {
    /// Run the tree-walking evaluator with macro support instead of the compiler/VM
    #[arg(long)]
    macros: bool,

    /// Print version
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: (),
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let args = Args::parse();

    if let Err(e) = mutant_repl::run(args.macros) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
