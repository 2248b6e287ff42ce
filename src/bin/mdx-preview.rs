//! One-shot preview: normalize, compile and render a Markdown/MDX file.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use mdx_language_server::compiler::{CompileOptions, CompileResult, Compiler, MdxCompiler, RenderTree};
use mdx_language_server::config::ProjectConfig;
use mdx_language_server::normalizer::normalize;
use mdx_language_server::render::{render_error, render_html, Theme};

#[derive(Debug, Parser)]
#[command(name = "mdx-preview")]
#[command(about = "Render a Markdown/MDX file the way the live preview does")]
#[command(version)]
struct Args {
    /// Input file; reads stdin when omitted or `-`
    input: Option<PathBuf>,

    /// Preview theme
    #[arg(long, value_enum, default_value_t = Theme::Dark)]
    theme: Theme,

    /// Print the normalized text instead of HTML
    #[arg(long)]
    normalize_only: bool,

    /// Print the render tree as JSON instead of HTML
    #[arg(long, conflicts_with = "normalize_only")]
    json: bool,

    /// Fail on code fences in unknown languages
    #[arg(long)]
    strict_languages: bool,

    /// Project configuration file for compile settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn read_input(input: Option<&PathBuf>) -> Result<String> {
    match input {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let mut options = match &args.config {
        Some(path) => ProjectConfig::load(path)?.compile,
        None => CompileOptions::default(),
    };
    if args.strict_languages {
        options.ignore_missing_languages = false;
    }

    let text = read_input(args.input.as_ref())?;
    let normalized = normalize(&text);
    if args.normalize_only {
        print!("{}", normalized);
        return Ok(ExitCode::SUCCESS);
    }

    let result = if normalized.is_empty() {
        CompileResult::Success(RenderTree::empty())
    } else {
        MdxCompiler::new(options).compile(&normalized)
    };

    match &result {
        CompileResult::Success(tree) if args.json => {
            println!("{}", serde_json::to_string_pretty(tree)?);
            Ok(ExitCode::SUCCESS)
        }
        CompileResult::Success(tree) => {
            println!("{}", render_html(tree, args.theme));
            Ok(ExitCode::SUCCESS)
        }
        CompileResult::Failure(error) => {
            match (error.line, error.column) {
                (Some(line), Some(column)) => eprintln!("error:{}:{}: {}", line, column, error),
                _ => eprintln!("error: {}", error),
            }
            if !args.json {
                println!("{}", render_error(error, args.theme));
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
