//! cfrontc CLI
//!
//! Command-line front end for translating .c files to IR and inspecting
//! the tokens, symbols, or control-flow graphs the translator produces.

use clap::{CommandFactory, Parser as ClapParser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use std::io;
use std::path::PathBuf;
use std::process;

use cfront::config::Dialect;
use cfront::{Parser, TranslatorConfig};

#[derive(ClapParser)]
#[command(name = "cfrontc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "cfront - translate C89/C99 source to a CFG-based IR", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DialectArg {
    C89,
    C99,
}

impl From<DialectArg> for Dialect {
    fn from(value: DialectArg) -> Self {
        match value {
            DialectArg::C89 => Dialect::C89,
            DialectArg::C99 => Dialect::C99,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DumpKind {
    Tokens,
    Symbols,
    Cfg,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a .c file and report how many CFGs it produced
    Translate {
        /// Input .c source file
        input: PathBuf,

        /// C dialect to parse against (defaults to C99)
        #[arg(long, value_enum)]
        dialect: Option<DialectArg>,

        /// Accept non-constant file-scope initializers instead of rejecting them
        #[arg(long)]
        lenient_constants: bool,
    },

    /// Dump tokens, symbols, or the CFG for a .c file in readable text form
    Dump {
        /// Input .c source file
        input: PathBuf,

        /// What to dump
        #[arg(value_enum)]
        what: DumpKind,

        /// C dialect to parse against (defaults to C99)
        #[arg(long, value_enum)]
        dialect: Option<DialectArg>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Translate { input, dialect, lenient_constants } => {
            run_translate(&input, dialect, lenient_constants);
        }
        Commands::Dump { input, what, dialect } => {
            run_dump(&input, what, dialect);
        }
        Commands::Completions { shell } => {
            run_completions(shell);
        }
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "cfrontc", &mut io::stdout());
}

fn config_for(dialect: Option<DialectArg>, lenient_constants: bool) -> TranslatorConfig {
    let dialect = dialect.map(Dialect::from).unwrap_or_default();
    TranslatorConfig::new(dialect).with_strict_constant_initializers(!lenient_constants)
}

fn read_source(input: &PathBuf) -> String {
    match std::fs::read_to_string(input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {}: {}", input.display(), e);
            process::exit(1);
        }
    }
}

fn run_translate(input: &PathBuf, dialect: Option<DialectArg>, lenient_constants: bool) {
    let config = config_for(dialect, lenient_constants);
    match cfront::translate_file(input, config) {
        Ok(units) => {
            println!("Translated {} -> {} CFG(s)", input.display(), units.len());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_dump(input: &PathBuf, what: DumpKind, dialect: Option<DialectArg>) {
    let source = read_source(input);
    match what {
        DumpKind::Tokens => dump_tokens(&source),
        DumpKind::Symbols => dump_symbols(&source, dialect),
        DumpKind::Cfg => dump_cfg(&source, dialect),
    }
}

fn dump_tokens(source: &str) {
    match cfront::lexer::tokenize(source) {
        Ok(tokens) => {
            for tok in tokens {
                println!("{:>4}:{:<4} {:?} {:?}", tok.span.line, tok.span.column, tok.kind, tok.lexeme);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn dump_symbols(source: &str, dialect: Option<DialectArg>) {
    let config = config_for(dialect, false);
    let mut parser = match Parser::new(source, config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = parser.parse_translation_unit() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
    for sym in parser.ctx.scopes.ident.symbols() {
        println!("{:<20} ty={:?} storage={:?} linkage={:?} depth={}", sym.name, sym.ty, sym.storage, sym.linkage, sym.depth);
    }
}

fn dump_cfg(source: &str, dialect: Option<DialectArg>) {
    let config = config_for(dialect, false);
    let mut parser = match Parser::new(source, config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let units = match parser.parse_translation_unit() {
        Ok(units) => units,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    for (i, cfg) in units.iter().enumerate() {
        println!("--- unit {} (fun={:?}) ---", i, cfg.fun);
        for (idx, block) in cfg.blocks().iter().enumerate() {
            println!("L{}:", idx);
            for op in &block.ops {
                println!("    {:?}", op);
            }
            println!("    jump={:?}", block.jump);
        }
    }
}
