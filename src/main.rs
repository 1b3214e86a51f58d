//! Twine CLI
//!
//! Usage:
//!   twine render <TEMPLATE> [--data FILE] [--var KEY=VALUE]... [--strict]
//!   twine analyze <TEMPLATE>
//!   twine serve [--config FILE] [--bind ADDR]
//!
//! Options shared by every command:
//!   -t, --templates <DIR>  Templates root (env: TWINE_TEMPLATES_DIR)
//!
//! Environment variables are also read from a `.env` file in the working
//! directory, if one exists.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use twine::config::parse_assignment;
use twine::{
    analyze, render_with_config, RenderConfig, RenderContext, Settings, UnresolvedBlockPolicy,
};

#[derive(Parser)]
#[command(name = "twine")]
#[command(about = "Compose HTML pages from layered templates")]
struct Cli {
    /// Templates root directory
    #[arg(short, long, global = true, env = "TWINE_TEMPLATES_DIR")]
    templates: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a template to stdout
    Render {
        /// Template name relative to the templates root
        template: String,

        /// JSON or TOML file with variables
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Set a variable, overriding the data file
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// Fail if any block is left unresolved
        #[arg(long)]
        strict: bool,
    },

    /// Show every template a page depends on
    Analyze {
        /// Template name relative to the templates root
        template: String,
    },

    /// Serve templates over HTTP
    Serve {
        /// Settings file (TOML format)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Address to listen on
        #[arg(short, long, env = "TWINE_BIND")]
        bind: Option<String>,
    },
}

fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("twine=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Render {
            template,
            data,
            vars,
            strict,
        } => run_render(cli.templates, &template, data, &vars, strict),
        Command::Analyze { template } => run_analyze(cli.templates, &template),
        Command::Serve { config, bind } => run_serve(cli.templates, config, bind),
    }
}

fn run_render(
    templates: Option<PathBuf>,
    template: &str,
    data: Option<PathBuf>,
    vars: &[String],
    strict: bool,
) {
    let mut context = match &data {
        Some(path) => match RenderContext::from_file(path) {
            Ok(ctx) => ctx,
            Err(e) => {
                eprintln!("Error loading data '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => RenderContext::new(),
    };

    let overrides = match vars
        .iter()
        .map(|var| parse_assignment(var))
        .collect::<Result<RenderContext, _>>()
    {
        Ok(overrides) => overrides,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    context.merge(overrides);

    let mut config = RenderConfig::new();
    if let Some(dir) = templates {
        config = config.with_templates_dir(dir);
    }
    if strict {
        config = config.with_unresolved_blocks(UnresolvedBlockPolicy::Error);
    }

    match render_with_config(template, &context, &config) {
        Ok(html) => print!("{}", html),
        Err(e) => {
            eprintln!("{}", e.format(template));
            std::process::exit(1);
        }
    }
}

fn run_analyze(templates: Option<PathBuf>, template: &str) {
    let root = templates.unwrap_or_else(|| RenderConfig::default().templates_dir);

    let analysis = match analyze(&root, template) {
        Ok(analysis) => analysis,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    for info in analysis.iter() {
        let marker = if info.is_entry { " (entry)" } else { "" };
        println!("{}{}", info.path.display(), marker);
        if let Some(parent) = &info.extends {
            println!("  extends:  {}", parent.display());
        }
        for include in &info.includes {
            println!("  includes: {}", include.display());
        }
        if !info.defined_blocks.is_empty() {
            let names: Vec<_> = info.defined_blocks.keys().map(String::as_str).collect();
            println!("  blocks:   {}", names.join(", "));
        }
        if !info.used_blocks.is_empty() {
            let names: Vec<_> = info.used_blocks.keys().map(String::as_str).collect();
            println!("  uses:     {}", names.join(", "));
        }
    }
}

fn run_serve(templates: Option<PathBuf>, config: Option<PathBuf>, bind: Option<String>) {
    let mut settings = match &config {
        Some(path) => match Settings::from_file(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error loading settings '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Settings::default(),
    };
    if let Some(dir) = templates {
        settings.templates_dir = dir;
    }
    if let Some(addr) = bind {
        settings.bind = addr;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(twine::server::serve(settings)) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_env_file_supplies_defaults() {
        let dir = TempDir::new().unwrap();
        let env_file = dir.path().join(".env");
        fs::write(
            &env_file,
            "TWINE_TEMPLATES_DIR=site/templates\nTWINE_BIND=0.0.0.0:9000\n",
        )
        .unwrap();
        dotenvy::from_path(&env_file).unwrap();

        let cli = Cli::try_parse_from(["twine", "serve"]).unwrap();
        assert_eq!(cli.templates, Some(PathBuf::from("site/templates")));
        match cli.command {
            Command::Serve { bind, config } => {
                assert_eq!(bind.as_deref(), Some("0.0.0.0:9000"));
                assert!(config.is_none());
            }
            _ => panic!("expected serve"),
        }

        let cli = Cli::try_parse_from(["twine", "analyze", "x.html", "-t", "other"]).unwrap();
        assert_eq!(cli.templates, Some(PathBuf::from("other")));
    }
}
