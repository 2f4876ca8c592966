//! GritDB interactive shell
//!
//! Reads SQL statements terminated by `;` (multi-line input is buffered),
//! prints result rows as an aligned table, and keeps going after errors.
//! `\q` quits, `\h` prints help.

use gritdb::{Database, QueryResult, Result, Value};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

const DEFAULT_DATA_DIR: &str = "./gritdb_data";

const HELP: &str = r#"
Commands:
  \h              Show this help
  \q              Quit

SQL statements end with a semicolon, for example:
  CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(100) NOT NULL);
  INSERT INTO users VALUES (1, 'Alice');
  SELECT * FROM users WHERE name LIKE 'A%';
  SHOW TABLES;
  DESCRIBE users;
"#;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let data_dir = match args.len() {
        1 => PathBuf::from(DEFAULT_DATA_DIR),
        2 => PathBuf::from(&args[1]),
        _ => {
            eprintln!("Usage: gritdb-cli [data_dir]");
            std::process::exit(1);
        }
    };

    let db = Database::open(&data_dir)?;
    println!("GritDB shell (data dir: {})", data_dir.display());
    println!("Type \\h for help; statements end with ';'.");

    let stdin = io::stdin();
    let mut buffer = String::new();

    loop {
        if buffer.is_empty() {
            print!("gritdb> ");
        } else {
            print!("   ...> ");
        }
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        // Shell commands are only recognized outside a buffered statement
        if buffer.is_empty() && line.starts_with('\\') {
            match line {
                "\\q" => break,
                "\\h" => println!("{}", HELP),
                other => println!("Unknown command: {} (try \\h)", other),
            }
            continue;
        }

        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(line);

        if buffer.trim_end().ends_with(';') {
            let sql = std::mem::take(&mut buffer);
            match db.execute(&sql) {
                Ok(result) => print_result(&result),
                Err(e) => println!("Error: {}", e),
            }
        }
    }

    db.close()?;
    println!("Goodbye!");
    Ok(())
}

fn print_result(result: &QueryResult) {
    if result.columns.is_empty() {
        println!("{}", result.status);
        return;
    }

    // Column widths from header and values
    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();
    let rendered: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(render_value).collect())
        .collect();
    for row in &rendered {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let header: Vec<String> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
        .collect();
    println!("{}", header.join(" | "));
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    println!("{}", separator.join("-+-"));

    for row in &rendered {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        println!("{}", cells.join(" | "));
    }

    println!("({} row(s))", result.rows.len());
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}
