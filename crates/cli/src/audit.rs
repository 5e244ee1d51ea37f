//! `larder audit`, `validate` and `units`: config-driven catalog audit.

use std::path::{Path, PathBuf};

use clap::Args;
use larder_audit::{AuditConfig, AuditError, AuditInput, AuditResult, CsvTable};
use serde::Serialize;

use crate::exit_codes::{EXIT_FINDINGS, EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_USAGE};
use crate::report;
use crate::CliError;

#[derive(Args)]
pub struct AuditArgs {
    /// Path to the audit .toml config file
    pub config: PathBuf,

    /// Items CSV (overrides [input] items; relative to the working directory)
    #[arg(long)]
    pub items: Option<PathBuf>,

    /// Recipes CSV (overrides [input] recipes; relative to the working directory)
    #[arg(long)]
    pub recipes: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    pub json: bool,

    /// Write JSON result to file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Write the CSV review reports into this directory
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Exit 1 when the audit has any findings
    #[arg(long)]
    pub strict: bool,
}

fn audit_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

/// Config problems are exit 3; anything about the data or files is exit 4.
fn engine_err(e: AuditError) -> CliError {
    let code = match e {
        AuditError::ConfigParse(_) | AuditError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        AuditError::MissingColumn { .. } | AuditError::Csv { .. } => EXIT_RUNTIME,
    };
    let err = audit_err(code, e.to_string());
    match e {
        AuditError::MissingColumn { table, .. } => err.with_hint(format!("map the column under [columns.{table}]")),
        _ => err,
    }
}

fn load_config(config_path: &Path) -> Result<AuditConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| audit_err(EXIT_RUNTIME, format!("cannot read config {}: {e}", config_path.display())))?;
    AuditConfig::from_toml(&config_str).map_err(engine_err)
}

/// Flag path as given, else the config's `[input]` entry relative to the config file.
fn input_path(flag: Option<PathBuf>, configured: Option<&str>, base_dir: &Path, table: &str) -> Result<PathBuf, CliError> {
    match (flag, configured) {
        (Some(path), _) => Ok(path),
        (None, Some(file)) => Ok(base_dir.join(file)),
        (None, None) => Err(audit_err(EXIT_USAGE, format!("no {table} file given"))
            .with_hint(format!("set [input] {table} in the config or pass --{table}"))),
    }
}

fn read_csv(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|e| audit_err(EXIT_RUNTIME, format!("cannot read {}: {e}", path.display())))
}

pub fn cmd_audit(args: AuditArgs) -> Result<(), CliError> {
    let config = load_config(&args.config)?;

    // Resolve file paths relative to config file's directory
    let base_dir = args.config.parent().unwrap_or_else(|| Path::new("."));
    let items_path = input_path(args.items, config.input.items.as_deref(), base_dir, "items")?;
    let recipes_path = input_path(args.recipes, config.input.recipes.as_deref(), base_dir, "recipes")?;
    tracing::debug!(items = %items_path.display(), recipes = %recipes_path.display(), "reading inputs");

    let CsvTable { headers: item_headers, rows: items } =
        larder_audit::load_items_csv(&read_csv(&items_path)?, &config.columns).map_err(engine_err)?;
    let CsvTable { headers: recipe_headers, rows: recipes } =
        larder_audit::load_recipes_csv(&read_csv(&recipes_path)?, &config.columns).map_err(engine_err)?;

    let input = AuditInput { items, recipes };

    // Run engine
    let result = larder_audit::run(&config, &input).map_err(engine_err)?;

    // Output
    if args.json || args.output.is_some() {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| audit_err(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;

        if let Some(ref path) = args.output {
            std::fs::write(path, &json_str)
                .map_err(|e| audit_err(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
            eprintln!("wrote {}", path.display());
        }

        if args.json {
            println!("{json_str}");
        }
    }

    if let Some(ref dir) = args.out_dir {
        write_reports(dir, &config, &item_headers, &recipe_headers, &input, &result)?;
    }

    print_summary(&result);

    if args.strict && result.has_findings() {
        return Err(audit_err(EXIT_FINDINGS, "findings present (--strict)"));
    }
    Ok(())
}

fn write_reports(
    dir: &Path,
    config: &AuditConfig,
    item_headers: &[String],
    recipe_headers: &[String],
    input: &AuditInput,
    result: &AuditResult,
) -> Result<(), CliError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| audit_err(EXIT_RUNTIME, format!("cannot create {}: {e}", dir.display())))?;

    let reports = [
        (report::ITEMS_REPORT, report::items_report(item_headers, &input.items, result)),
        (report::RECIPES_REPORT, report::recipes_report(recipe_headers, &input.recipes, result)),
        (report::MISSING_REPORT, report::missing_report(result, &config.columns)),
    ];
    for (name, bytes) in reports {
        let path = dir.join(name);
        let bytes = bytes.map_err(|e| audit_err(EXIT_RUNTIME, format!("CSV write error ({name}): {e}")))?;
        std::fs::write(&path, bytes)
            .map_err(|e| audit_err(EXIT_RUNTIME, format!("cannot write {}: {e}", path.display())))?;
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

/// Human summary to stderr.
fn print_summary(result: &AuditResult) {
    let s = &result.summary;
    eprintln!(
        "audit '{}': {} items ({} flagged, {} in {} duplicate clusters), {} recipes",
        result.meta.config_name, s.items, s.flagged_items, s.items_in_clusters, s.duplicate_clusters, s.recipes,
    );
    eprintln!(
        "lines: {} ({} exact, {} fuzzy, {} unresolved); uom: {} identical, {} convertible, {} incompatible",
        s.lines,
        s.resolved_exact,
        s.resolved_fuzzy,
        s.unresolved,
        s.uom_identical,
        s.uom_convertible,
        s.uom_incompatible,
    );
    eprintln!(
        "cost: {} costed, {} undetermined, {} outliers ({})",
        s.costed_recipes, s.undetermined_recipes, s.cost_outliers, result.meta.outlier_method,
    );
    for recipe in result.recipes.iter().filter(|r| r.cost.verdict.is_outlier()) {
        eprintln!(
            "  high cost: {} ({:.2})",
            recipe.name.as_deref().unwrap_or(&recipe.recipe_id),
            recipe.cost.total.unwrap_or_default(),
        );
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let registry = config.registry().map_err(engine_err)?;
    eprintln!(
        "valid: audit '{}' with {} unit(s), outliers {} (k = {})",
        config.name,
        registry.len(),
        config.outliers.method,
        config.outliers.k,
    );
    Ok(())
}

#[derive(Serialize)]
struct UnitRow<'a> {
    unit: &'a str,
    family: String,
    factor: f64,
}

pub fn cmd_units(config_path: PathBuf, json: bool) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let registry = config.registry().map_err(engine_err)?;
    let rows: Vec<UnitRow> = registry
        .describe()
        .into_iter()
        .map(|(unit, family, factor)| UnitRow {
            unit,
            family: family.to_string(),
            factor,
        })
        .collect();

    if json {
        let json_str = serde_json::to_string_pretty(&rows)
            .map_err(|e| audit_err(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    println!("{:<8} {:<8} {:>12}", "unit", "family", "to base");
    for row in &rows {
        println!("{:<8} {:<8} {:>12}", row.unit, row.family, row.factor);
    }
    Ok(())
}
