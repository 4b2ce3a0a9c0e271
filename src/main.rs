use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Parser;
use shownotes::{AttributedText, RenderOptions, Rendered, Styles};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shownotes")]
#[command(about = "Render show-note markup as plain text")]
struct Cli {
    /// Input markup file (reads stdin when omitted or "-")
    input: Option<PathBuf>,

    /// Append each link's target after its text
    #[arg(long)]
    bracket_links: bool,

    /// List the tagged ranges after the text
    #[arg(long)]
    ranges: bool,

    /// Print the parsed node tree instead of the text
    #[arg(long)]
    tree: bool,

    /// List styled attribute runs after the text
    #[arg(long)]
    runs: bool,

    /// Style sheet used with --runs (defaults to the bundled sheet)
    #[arg(long, value_name = "FILE")]
    styles: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let markup = match read_input(cli.input.as_deref()) {
        Ok(content) => content,
        Err(e) => {
            let name = cli
                .input
                .as_deref()
                .map_or_else(|| "stdin".into(), Path::to_string_lossy);
            eprintln!("Error reading {}: {}", name, e);
            std::process::exit(1);
        }
    };

    let tree = match shownotes::parse(&markup) {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if cli.tree {
        println!("{}", tree);
        return;
    }

    let rendered = shownotes::render(
        &tree,
        RenderOptions {
            bracket_links: cli.bracket_links,
        },
    );
    println!("{}", rendered.text);

    if cli.ranges {
        print_ranges(&rendered);
    }

    if cli.runs {
        let styles = match &cli.styles {
            Some(path) => match Styles::load(path) {
                Ok(styles) => styles,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            },
            None => Styles::compiled_default(),
        };
        print_runs(&shownotes::apply_styles(&rendered, &styles));
    }
}

fn read_input(path: Option<&Path>) -> io::Result<String> {
    match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path),
        _ => {
            let mut content = String::new();
            io::stdin().read_to_string(&mut content)?;
            Ok(content)
        }
    }
}

fn print_ranges(rendered: &Rendered) {
    println!();
    for tagged in &rendered.ranges {
        let attributes: String = tagged
            .attributes
            .iter()
            .flatten()
            .map(|(key, value)| format!(" {key}={value:?}"))
            .collect();
        println!(
            "{:>5}..{:<5} {:<6} {:?}{}",
            tagged.range.start,
            tagged.range.end,
            tagged.tag,
            tagged.slice(&rendered.text),
            attributes
        );
    }
}

fn print_runs(text: &AttributedText) {
    println!();
    for run in text.runs() {
        let attributes = &run.attributes;
        let mut line = format!("{:>5}..{:<5}", run.range.start, run.range.end);
        if let Some(font) = attributes.font {
            line.push_str(&format!(" font={font:?}"));
        }
        if let Some(color) = &attributes.color {
            line.push_str(&format!(" color={color}"));
        }
        for (flag, name) in [
            (attributes.bold, "bold"),
            (attributes.italic, "italic"),
            (attributes.underline, "underline"),
        ] {
            if flag {
                line.push(' ');
                line.push_str(name);
            }
        }
        if let Some(link) = &attributes.link {
            line.push_str(&format!(" link={link}"));
        }
        println!("{line}");
    }
}
