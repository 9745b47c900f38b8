use clap::{Parser as ClapParser, Subcommand};
use sharpscript::cli::{self, CliError, EvalOptions, RenderOptions, RenderResult};
use std::fs;
use std::io::{self, Read};

#[derive(ClapParser)]
#[command(name = "sharp")]
#[command(about = "sharp - An embeddable template and expression engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression and print its JSON result
    Eval {
        /// The expression to evaluate
        expr: String,

        /// JSON object of argument bindings
        #[arg(short, long)]
        args: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Render a template file (reads from stdin if not provided)
    Render {
        /// Path to the template file
        file: Option<String>,

        /// JSON object of argument bindings
        #[arg(short, long)]
        args: Option<String>,

        /// Only validate syntax, don't render
        #[arg(long)]
        check: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Eval { expr, args, pretty } => run_eval(expr, args, pretty),
        Commands::Render { file, args, check } => run_render(file, args, check),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_eval(expr: String, args: Option<String>, pretty: bool) -> Result<(), CliError> {
    let options = EvalOptions { expr, args };
    let value = cli::execute_eval(&options)?;
    if pretty {
        println!("{:#}", value);
    } else {
        println!("{}", value);
    }
    Ok(())
}

fn run_render(file: Option<String>, args: Option<String>, check: bool) -> Result<(), CliError> {
    let template = match file {
        Some(path) => fs::read_to_string(path).map_err(CliError::Io)?,
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer).map_err(CliError::Io)?;
            buffer
        }
        None => return Err(CliError::NoInput),
    };

    let options = RenderOptions {
        template,
        args,
        check,
    };
    match cli::execute_render(&options)? {
        RenderResult::SyntaxValid => println!("Syntax OK"),
        RenderResult::Rendered(output) => print!("{}", output),
    }
    Ok(())
}
