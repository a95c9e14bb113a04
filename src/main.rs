//! reportgen – command-line front end for report_forge.
//!
//! Usage:
//!   reportgen render <template> <model.json> <output.{pdf|docx}> [flags]
//!   reportgen table <records.json> <output.xlsx> [--sheet NAME] [--align MODE]

use std::{env, fs, path::PathBuf, process};

use report_forge::{
    DocumentMetadata, Error, PageOrientation, PageSize, Record, RecordAlignment, ReportFactory,
    ReportOptions, Result,
};
use report_forge::tabular::DEFAULT_SHEET_NAME;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let prog = args.first().map(String::as_str).unwrap_or("reportgen");

    let outcome = match args.get(1).map(String::as_str) {
        Some("render") => run_render(&args[2..]),
        Some("table") => run_table(&args[2..]),
        Some("--help" | "-h") => {
            print_usage(prog);
            return;
        }
        Some(other) => Err(Error::Argument(format!("unknown command '{other}'"))),
        None => Err(Error::Argument("no command given".to_string())),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        if e.is_argument_error() {
            print_usage(prog);
        }
        process::exit(1);
    }
}

/// Split `args` into positionals and `--flag value` pairs. `--landscape`
/// takes no value.
fn split_args(args: &[String]) -> Result<(Vec<&str>, Vec<(&str, &str)>)> {
    let mut positionals = Vec::new();
    let mut flags = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--landscape" | "-l" => flags.push(("--landscape", "")),
            flag if flag.starts_with("--") => {
                let value = iter
                    .next()
                    .ok_or_else(|| Error::Argument(format!("{flag} needs a value")))?;
                flags.push((flag, value.as_str()));
            }
            positional => positionals.push(positional),
        }
    }
    Ok((positionals, flags))
}

fn expect_positionals<'a>(positionals: &[&'a str], names: &[&str]) -> Result<Vec<&'a str>> {
    if positionals.len() != names.len() {
        return Err(Error::Argument(format!(
            "expected {} argument(s): {}",
            names.len(),
            names.join(" ")
        )));
    }
    Ok(positionals.to_vec())
}

fn run_render(args: &[String]) -> Result<()> {
    let (positionals, flags) = split_args(args)?;
    let paths = expect_positionals(&positionals, &["<template>", "<model.json>", "<output>"])?;
    let (template_path, model_path, output) = (paths[0], paths[1], PathBuf::from(paths[2]));

    let mut options = ReportOptions::default();
    let mut metadata = DocumentMetadata::new();
    for (flag, value) in flags {
        match flag {
            "--options" => options = ReportOptions::from_json(&fs::read_to_string(value)?)?,
            "--landscape" => options.orientation = PageOrientation::Landscape,
            "--page-size" => {
                options.page_size = PageSize::parse(value)
                    .ok_or_else(|| Error::Argument(format!("unknown page size '{value}'")))?
            }
            "--title" => metadata.title = Some(value.to_string()),
            "--author" => metadata.author = Some(value.to_string()),
            "--subject" => metadata.subject = Some(value.to_string()),
            "--keywords" => metadata.keywords = Some(value.to_string()),
            other => return Err(Error::Argument(format!("unknown flag '{other}'"))),
        }
    }

    let factory = ReportFactory::default();
    let generator = match output.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => factory.create_pdf(Some(options)),
        Some(ext) if ext.eq_ignore_ascii_case("docx") => factory.create_word(Some(options)),
        _ => {
            return Err(Error::Argument(format!(
                "output '{}' must end in .pdf or .docx",
                output.display()
            )))
        }
    };

    let template = fs::read_to_string(template_path)?;
    let model: serde_json::Value = serde_json::from_str(&fs::read_to_string(model_path)?)?;
    let metadata = (!metadata.is_empty()).then_some(&metadata);
    generator.save_with_metadata(&template, &model, metadata, &output)?;
    eprintln!(
        "Wrote '{}' ({})",
        output.display(),
        generator.format().mime_type()
    );
    Ok(())
}

fn run_table(args: &[String]) -> Result<()> {
    let (positionals, flags) = split_args(args)?;
    let paths = expect_positionals(&positionals, &["<records.json>", "<output.xlsx>"])?;
    let (records_path, output) = (paths[0], PathBuf::from(paths[1]));

    let mut sheet = DEFAULT_SHEET_NAME.to_string();
    let mut alignment = RecordAlignment::default();
    let mut options = ReportOptions::default();
    for (flag, value) in flags {
        match flag {
            "--sheet" => sheet = value.to_string(),
            "--align" => {
                alignment = RecordAlignment::parse(value)
                    .ok_or_else(|| Error::Argument(format!("unknown alignment '{value}'")))?
            }
            "--options" => options = ReportOptions::from_json(&fs::read_to_string(value)?)?,
            "--landscape" => options.orientation = PageOrientation::Landscape,
            other => return Err(Error::Argument(format!("unknown flag '{other}'"))),
        }
    }

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(records_path)?)?;
    let serde_json::Value::Array(items) = json else {
        return Err(Error::Argument(
            "records file must hold a JSON array of objects".to_string(),
        ));
    };
    let records = items
        .into_iter()
        .map(Record::try_from)
        .collect::<Result<Vec<_>>>()?;

    let excel = ReportFactory::default()
        .create_excel(Some(options))
        .with_alignment(alignment);
    excel.save_from_dynamic(&records, &sheet, &output)?;
    eprintln!(
        "Wrote '{}' ({}, {} records)",
        output.display(),
        excel.format().mime_type(),
        records.len()
    );
    Ok(())
}

fn print_usage(prog: &str) {
    eprintln!("reportgen – template and data driven reports (PDF, DOCX, XLSX)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} render <template> <model.json> <output.pdf|output.docx> [flags]");
    eprintln!("  {prog} table <records.json> <output.xlsx> [--sheet NAME] [--align MODE]");
    eprintln!();
    eprintln!("Render flags:");
    eprintln!("  --page-size S     A4 (default), A5, Letter or Legal");
    eprintln!("  --landscape       Landscape orientation");
    eprintln!("  --options FILE    Page options as JSON");
    eprintln!("  --title T, --author A, --subject S, --keywords K");
    eprintln!("                    Document metadata");
    eprintln!();
    eprintln!("Table flags:");
    eprintln!("  --sheet NAME      Worksheet name (default: {DEFAULT_SHEET_NAME})");
    eprintln!("  --align MODE      positional (default), strict or by-name");
}
