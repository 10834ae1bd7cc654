use crate::config::{EngineConfig, FormulaMode};
use crate::core::{SortDirection, TableEngine};
use crate::error::{GridError, GridResult};
use crate::excel::{ExcelImportDecoder, MemoryWorkbook, Worksheet};
use crate::types::Row;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load the configuration file, or defaults when none is given
pub fn load_config(path: Option<&Path>) -> GridResult<EngineConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            EngineConfig::load(path)
        }
        None => Ok(EngineConfig::default()),
    }
}

/// Parse `column` or `column:asc|desc`
pub fn parse_sort_arg(arg: &str) -> GridResult<(String, SortDirection)> {
    if let Some((column, direction)) = arg.rsplit_once(':') {
        if let Ok(direction) = direction.parse::<SortDirection>() {
            if column.is_empty() {
                return Err(GridError::Parse("Sort column must not be empty".to_string()));
            }
            return Ok((column.to_string(), direction));
        }
    }
    if arg.is_empty() {
        return Err(GridError::Parse("Sort column must not be empty".to_string()));
    }
    Ok((arg.to_string(), SortDirection::Asc))
}

/// Parse `column=substring`
pub fn parse_filter_arg(arg: &str) -> GridResult<(String, String)> {
    match arg.split_once('=') {
        Some((column, substring)) if !column.is_empty() => {
            Ok((column.to_string(), substring.to_string()))
        }
        _ => Err(GridError::Parse(format!(
            "Filter '{}' must look like column=substring",
            arg
        ))),
    }
}

/// Execute the inspect command
pub fn inspect(file: PathBuf, config: Option<PathBuf>, json: bool) -> GridResult<()> {
    let config = load_config(config.as_deref())?;
    let workbook = MemoryWorkbook::load(&file)?;
    let sheets = ExcelImportDecoder::new(&config.decode).decode(&workbook);

    if json {
        println!("{}", serde_json::to_string_pretty(&sheets)?);
        return Ok(());
    }

    println!("{}", "📗 gridforge - Workbook Inspection".bold().green());
    println!("   File: {}\n", file.display());

    for sheet in &sheets {
        print_sheet_summary(sheet);
    }

    println!(
        "{}",
        format!("✅ {} sheet(s) decoded", sheets.len()).bold().green()
    );
    Ok(())
}

fn print_sheet_summary(sheet: &Worksheet) {
    println!("   📊 Sheet: {}", sheet.name.bright_blue().bold());
    println!(
        "      {} rows x {} columns, {} non-empty cells",
        sheet.actual_rows,
        sheet.actual_cols,
        sheet.non_empty_count()
    );
    if !sheet.merged_cells.is_empty() {
        let labels: Vec<&str> = sheet
            .merged_cells
            .iter()
            .map(|m| m.range_label.as_str())
            .collect();
        println!("      Merged: {}", labels.join(", ").cyan());
    }

    let formulas = sheet
        .cells
        .iter()
        .flatten()
        .filter(|c| c.formula.is_some())
        .count();
    if formulas > 0 {
        println!("      Formulas: {}", formulas);
    }
    println!();
}

/// Options of the eval command
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    pub config: Option<PathBuf>,
    pub formula: Option<String>,
    pub sort: Option<String>,
    pub filters: Vec<String>,
    pub structured: bool,
}

/// Execute the eval command
pub fn eval(file: PathBuf, options: EvalOptions) -> GridResult<()> {
    let mut config = load_config(options.config.as_deref())?;
    if options.structured {
        config.formula.mode = FormulaMode::Structured;
    }

    let yaml = fs::read_to_string(&file)?;
    let mut table = TableEngine::from_yaml_str(&yaml, &config)?;

    for filter in &options.filters {
        let (column, substring) = parse_filter_arg(filter)?;
        table.filter(&column, &substring);
    }
    if let Some(sort) = &options.sort {
        let (column, direction) = parse_sort_arg(sort)?;
        table.sort(&column, direction);
    }
    let view = table.view();

    println!("{}", "🧮 gridforge - Table Evaluation".bold().green());
    println!("   File: {}", file.display());
    println!(
        "   {} of {} rows, {} columns\n",
        view.len(),
        table.rows().len(),
        table.columns().len()
    );

    match &options.formula {
        Some(formula) => print_formula(&table, &view, formula),
        None => print_rows(&table, &view),
    }

    let issues = table.validate_all();
    if !issues.is_empty() {
        println!(
            "{}",
            format!("⚠️  {} validation issue(s)", issues.len()).yellow()
        );
        for (row, column, issue) in &issues {
            println!("   {} / {}: {}", row, column.cyan(), issue);
        }
    }
    Ok(())
}

fn print_formula(table: &TableEngine, view: &[Row], formula: &str) {
    println!("   Formula: {}", formula.bright_yellow());
    for row in view {
        let result = table
            .evaluator()
            .evaluate(formula, row, table.rows(), table.columns());
        let shown = if result.is_error() {
            result.to_string().red().to_string()
        } else {
            result.to_string().bold().to_string()
        };
        println!("   {} = {}", row.id.bright_blue(), shown);
    }
    println!();
}

fn print_rows(table: &TableEngine, view: &[Row]) {
    for row in view {
        println!("   📄 Row: {}", row.id.bright_blue().bold());
        for column in table.columns() {
            let value = table.display_value(row, column);
            let name = if column.is_formula() {
                format!("{} (formula)", column.name).cyan()
            } else {
                column.name.cyan()
            };
            println!("      {} = {}", name, value);
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_sort_arg() {
        assert_eq!(
            parse_sort_arg("name").unwrap(),
            ("name".to_string(), SortDirection::Asc)
        );
        assert_eq!(
            parse_sort_arg("name:desc").unwrap(),
            ("name".to_string(), SortDirection::Desc)
        );
        // a colon that is not a direction belongs to the column name
        assert_eq!(
            parse_sort_arg("start:time").unwrap(),
            ("start:time".to_string(), SortDirection::Asc)
        );
        assert!(parse_sort_arg("").is_err());
        assert!(parse_sort_arg(":desc").is_err());
    }

    #[test]
    fn test_parse_filter_arg() {
        assert_eq!(
            parse_filter_arg("status=open").unwrap(),
            ("status".to_string(), "open".to_string())
        );
        assert_eq!(
            parse_filter_arg("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_filter_arg("status").is_err());
        assert!(parse_filter_arg("=open").is_err());
    }

    #[test]
    fn test_load_config_default_and_file() {
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gridforge.yaml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "formula:\n  error_marker: \"#ERR\"").unwrap();
        assert_eq!(
            load_config(Some(path.as_path())).unwrap().formula.error_marker,
            "#ERR"
        );
    }

    #[test]
    fn test_eval_missing_file() {
        let result = eval(PathBuf::from("nonexistent.yaml"), EvalOptions::default());
        assert!(matches!(result, Err(GridError::Io(_))));
    }

    #[test]
    fn test_inspect_unsupported_file() {
        let result = inspect(PathBuf::from("workbook.csv"), None, false);
        assert!(matches!(result, Err(GridError::Import(_))));
    }
}
