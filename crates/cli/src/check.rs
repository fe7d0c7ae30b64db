use anyhow::{Context, bail};
use bindscope_api::{Diagnostic, Severity};
use bindscope_core::{CompilerOptions, RoundProcessor};
use bindscope_plugin::InMemoryRepository;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tracing::info;

pub fn run(file: &Path, roots: &[String], options: &[String], out: &mut dyn Write) -> anyhow::Result<bool> {
    let repo = InMemoryRepository::load(file)
        .with_context(|| format!("failed to load declarations from {}", file.display()))?;
    let options = CompilerOptions::from_options(&parse_options(options)?)?;

    let roots: Vec<SmolStr> = if roots.is_empty() {
        bindscope_core::roots(&repo)
    } else {
        roots.iter().map(|r| SmolStr::from(r.as_str())).collect()
    };
    info!("Checking {} roots from {}", roots.len(), file.display());

    // A declaration file never grows, so one round is all there is.
    let mut processor = RoundProcessor::new(options);
    let reports = processor.process_round(&repo, &roots)?;
    let graphs = reports.len();
    let mut diagnostics: Vec<Diagnostic> = reports.into_iter().flat_map(|r| r.diagnostics).collect();
    diagnostics.extend(processor.finish());

    for diagnostic in &diagnostics {
        writeln!(out, "{}", diagnostic)?;
        if let Some(element) = &diagnostic.primary_element {
            writeln!(out, "  at {} [{}]", element, diagnostic.component_path)?;
        }
    }
    let errors = count(&diagnostics, Severity::Error);
    let warnings = count(&diagnostics, Severity::Warning);
    writeln!(
        out,
        "checked {} graph{}: {} error{}, {} warning{}",
        graphs,
        plural(graphs),
        errors,
        plural(errors),
        warnings,
        plural(warnings)
    )?;
    Ok(errors == 0)
}

fn parse_options(options: &[String]) -> anyhow::Result<HashMap<String, String>> {
    let mut parsed = HashMap::new();
    for option in options {
        let Some((key, value)) = option.split_once('=') else {
            bail!("invalid processor option `{}`: expected KEY=VALUE", option);
        };
        parsed.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(parsed)
}

fn count(diagnostics: &[Diagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity == severity).count()
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
