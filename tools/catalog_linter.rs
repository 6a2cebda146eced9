/// Catalog Linter: checks a theme catalog for problems that parse cleanly
/// but play badly.
///
/// Usage: catalog_linter [<catalog.ron>] [--max-line <chars>]
///
/// Without a path the built-in catalog is checked.
use clap::Parser;
use dialogue_player::core::catalog::ScriptCatalog;
use dialogue_player::schema::theme::ThemeEntry;
use std::path::PathBuf;
use std::process;

/// Lint a dialogue catalog file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Catalog file (RON); defaults to the built-in catalog
    catalog: Option<PathBuf>,

    /// Warn about lines longer than this many characters
    #[arg(long, default_value_t = 120)]
    max_line: usize,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let loaded = match &cli.catalog {
        Some(path) => ScriptCatalog::load_from_ron(path),
        None => ScriptCatalog::builtin(),
    };
    let catalog = match loaded {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("ERROR: Failed to load catalog: {}", e);
            process::exit(1);
        }
    };

    println!("Loaded {} themes", catalog.len());

    let (errors, warnings) = lint_catalog(&catalog, cli.max_line);

    println!("\n=== Catalog Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if !errors.is_empty() {
        process::exit(1);
    }
}

fn lint_catalog(catalog: &ScriptCatalog, max_line: usize) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if catalog.is_empty() {
        errors.push("catalog has no themes".to_string());
    }

    for entry in catalog.themes() {
        lint_entry(entry, max_line, &mut errors, &mut warnings);
    }

    (errors, warnings)
}

fn lint_entry(
    entry: &ThemeEntry,
    max_line: usize,
    errors: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    let id = entry.id.as_str();

    if id.trim().is_empty() {
        errors.push("theme with an empty id".to_string());
    } else if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        // Ids travel in share links.
        warnings.push(format!("theme '{}': id is not URL-safe", id));
    }

    if entry.name.trim().is_empty() {
        errors.push(format!("theme '{}': empty display name", id));
    }

    let script = &entry.script;
    let first = script.first().speaker();
    if script.len() > 1 && script.iter().all(|line| line.speaker() == first) {
        warnings.push(format!(
            "theme '{}': only speaker {} ever talks",
            id, first
        ));
    } else {
        for (i, pair) in script.lines().windows(2).enumerate() {
            if pair[0].speaker() == pair[1].speaker() {
                warnings.push(format!(
                    "theme '{}': lines {} and {} are both spoken by speaker {}",
                    id,
                    i + 1,
                    i + 2,
                    pair[0].speaker()
                ));
            }
        }
    }

    for (i, line) in script.iter().enumerate() {
        let chars = line.text().chars().count();
        if chars > max_line {
            warnings.push(format!(
                "theme '{}': line {} is {} characters (limit {})",
                id,
                i + 1,
                chars,
                max_line
            ));
        }
    }

    let palette = &entry.palette;
    if palette.speaker_one == palette.speaker_two {
        warnings.push(format!(
            "theme '{}': both speakers share color {}",
            id, palette.speaker_one
        ));
    }
}
