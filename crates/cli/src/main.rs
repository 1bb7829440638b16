//! mutant - command-line entry point for the language toolchain.
//!
//! - no args: start the REPL.
//! - `<path>.mut`: compile to a sibling `<path>.mu`.
//! - `<path>.mu`: verify, decode, and run.
//! - `release --src <path>.mut --stub <path>`: splice a compiled artifact
//!   into a prebuilt binary stub.

mod banners;
mod compile;
mod release;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser as ClapParser, Subcommand};

use compile::CompileOutcome;
use mutant_runtime::Vm;
use release::{TargetArch, TargetOs};

const SOURCE_EXT: &str = "mut";
const ARTIFACT_EXT: &str = "mu";
const WINDOWS_EXE_EXT: &str = "exe";

#[derive(ClapParser)]
#[command(name = "mutant")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Mutant language toolchain", long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// A `.mut` source file to compile, or a `.mu` artifact to run
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,

    /// Print version
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: (),
}

#[derive(Subcommand)]
enum Command {
    /// Compile a source file and embed it into a prebuilt binary stub
    Release {
        #[arg(long = "src")]
        src: PathBuf,
        #[arg(long = "os", value_enum, default_value_t = TargetOs::Linux)]
        os: TargetOs,
        #[arg(long = "arch", value_enum, default_value_t = TargetArch::Amd64)]
        arch: TargetArch,
        /// Path to the prebuilt binary stub carrying the |#|...|#| marker
        #[arg(long)]
        stub: PathBuf,
    },
}

impl std::fmt::Display for TargetOs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TargetOs::Darwin => "darwin",
            TargetOs::Linux => "linux",
            TargetOs::Windows => "windows",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for TargetArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TargetArch::Amd64 => "amd64",
            TargetArch::Arm64 => "arm64",
            TargetArch::Arm => "arm",
            TargetArch::X86_32 => "386",
            TargetArch::X86 => "x86",
        };
        write!(f, "{s}")
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Command::Release { src, os, arch, stub }) => run_release(&src, os, arch, &stub),
        None => match cli.file {
            Some(path) => run_file(&path),
            None => mutant_repl::run(false).map_err(|e| e.to_string()),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run_file(path: &Path) -> Result<(), String> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(SOURCE_EXT) => compile_to_artifact(path),
        Some(ARTIFACT_EXT) => run_artifact(path),
        _ => Err(format!("unrecognized file extension: {}", path.display())),
    }
}

fn compile_to_artifact(src_path: &Path) -> Result<(), String> {
    let source = std::fs::read_to_string(src_path).map_err(|e| {
        banners::print_io_error(&e.to_string());
        e.to_string()
    })?;

    match compile::compile_source(&source) {
        CompileOutcome::Ok(bytecode) => {
            let artifact = mutant_container::encode(&bytecode).map_err(|e| e.to_string())?;
            let dst_path = src_path.with_extension(ARTIFACT_EXT);
            std::fs::write(&dst_path, artifact).map_err(|e| e.to_string())?;
            println!("compiled {} -> {}", src_path.display(), dst_path.display());
            Ok(())
        }
        CompileOutcome::ParseErrors(errors) => {
            banners::print_parse_errors(&errors);
            Err("parse failed".to_string())
        }
        CompileOutcome::CompileError(e) => {
            banners::print_compiler_error(&e.to_string());
            Err("compile failed".to_string())
        }
    }
}

fn run_artifact(path: &Path) -> Result<(), String> {
    let artifact = std::fs::read(path).map_err(|e| {
        banners::print_io_error(&e.to_string());
        e.to_string()
    })?;

    let bytecode = mutant_container::decode(&artifact).map_err(|e| {
        banners::print_signature_error(&e.to_string());
        e.to_string()
    })?;

    let mut vm = Vm::new(bytecode);
    vm.run().map_err(|e| {
        banners::print_vm_error(&e.to_string());
        e.to_string()
    })?;

    println!("{}", vm.last_popped_stack_elem().inspect());
    Ok(())
}

fn run_release(src_path: &Path, os: TargetOs, arch: TargetArch, stub_path: &Path) -> Result<(), String> {
    let source = std::fs::read_to_string(src_path).map_err(|e| e.to_string())?;

    let bytecode = match compile::compile_source(&source) {
        CompileOutcome::Ok(bytecode) => bytecode,
        CompileOutcome::ParseErrors(errors) => {
            banners::print_parse_errors(&errors);
            return Err("parse failed".to_string());
        }
        CompileOutcome::CompileError(e) => {
            banners::print_compiler_error(&e.to_string());
            return Err("compile failed".to_string());
        }
    };

    let artifact = mutant_container::encode(&bytecode).map_err(|e| e.to_string())?;

    let mut dst_path = src_path.with_extension("");
    if os == TargetOs::Windows {
        dst_path.set_extension(WINDOWS_EXE_EXT);
    }

    release::pack(stub_path, &artifact, &dst_path).map_err(|e| e.to_string())?;
    println!("released {} for {os}/{arch} -> {}", src_path.display(), dst_path.display());
    Ok(())
}
