//! forge – command-line report renderer.
//!
//! Usage:
//!   forge <skeleton.json> [output.html] [--templates DIR] [--config FILE]
//!
//! If `output.html` is omitted the document is written next to the skeleton
//! with the same stem (e.g. `invoice.json` → `invoice.html`). Files listed in
//! the skeleton's `save` options are written as well.

use std::{env, fs, path::PathBuf, process};

use report_forge::pipeline::{save_files, DocumentEngine};
use report_forge::store::DirectoryStore;
use report_forge::{EngineConfig, Skeleton};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut skeleton_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut templates_dir: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut positional = 0usize;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--templates" | "-t" => match iter.next() {
                Some(v) => templates_dir = Some(PathBuf::from(v)),
                None => {
                    eprintln!("Error: --templates needs a directory.");
                    process::exit(1);
                }
            },
            "--config" | "-c" => match iter.next() {
                Some(v) => config_path = Some(PathBuf::from(v)),
                None => {
                    eprintln!("Error: --config needs a file.");
                    process::exit(1);
                }
            },
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(&args[0]);
                process::exit(1);
            }
            path => {
                if positional == 0 {
                    skeleton_path = Some(PathBuf::from(path));
                } else if positional == 1 {
                    output_path = Some(PathBuf::from(path));
                } else {
                    eprintln!("Unexpected argument: {path}");
                    print_usage(&args[0]);
                    process::exit(1);
                }
                positional += 1;
            }
        }
    }

    let input = match skeleton_path {
        Some(p) => p,
        None => {
            eprintln!("Error: no skeleton file specified.");
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    let output = output_path.unwrap_or_else(|| {
        let mut o = input.clone();
        o.set_extension("html");
        o
    });

    let mut config = match config_path {
        Some(path) => match EngineConfig::load(&path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };
    if let Some(dir) = templates_dir {
        config.templates_dir = dir;
    }

    let json = match fs::read_to_string(&input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", input.display());
            process::exit(1);
        }
    };
    let skeleton = match Skeleton::from_json(&json) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error parsing '{}': {e}", input.display());
            process::exit(1);
        }
    };

    let engine = DocumentEngine::new(config);

    // No printer is bundled; PDF output needs a host-provided PagePrinter.
    let document = match engine.render(&skeleton, None) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error rendering '{}': {e}", input.display());
            process::exit(1);
        }
    };

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Error creating output directory: {e}");
                process::exit(1);
            }
        }
    }
    let html = document.html();
    if let Err(e) = fs::write(&output, html) {
        eprintln!("Error writing '{}': {e}", output.display());
        process::exit(1);
    }
    eprintln!("Wrote '{}' ({} bytes)", output.display(), html.len());

    match save_files(&skeleton, &document, &DirectoryStore) {
        Ok(saved) => {
            for path in saved {
                eprintln!("Saved '{}'", path.display());
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn print_usage(prog: &str) {
    eprintln!("forge – section-template report renderer (report-forge)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <skeleton.json> [output.html] [--templates DIR] [--config FILE]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <skeleton.json>  Document skeleton: template, content tree, style and save options");
    eprintln!("  [output.html]    Output path  (default: same stem as skeleton with .html)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --templates, -t  Base directory for template names (overrides the config)");
    eprintln!("  --config, -c     Engine config JSON file");
    eprintln!("  --help           Print this message");
}
