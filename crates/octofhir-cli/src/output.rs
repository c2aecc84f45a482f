use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => print_error(&format!("Failed to render JSON: {e}")),
    }
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Prints rows under `header` as a rounded table.
pub fn print_table<R, S>(header: &[&str], rows: R)
where
    R: IntoIterator<Item = Vec<S>>,
    S: Into<String>,
{
    let mut builder = Builder::default();
    builder.push_record(header.iter().map(|h| h.to_string()));
    let mut empty = true;
    for row in rows {
        empty = false;
        builder.push_record(row.into_iter().map(Into::into));
    }
    if empty {
        println!("Nothing to show.");
        return;
    }
    let table = builder.build().with(Style::rounded()).to_string();
    println!("{table}");
}

/// Prints `label: value` pairs with highlighted labels.
pub fn print_fields(fields: &[(&str, String)]) {
    for (label, value) in fields {
        println!("{}: {}", label.cyan(), value);
    }
}
