use std::{
    fmt::Display,
    io::{self, BufRead as _, Write as _},
    str::FromStr,
};

/// Reads one value from stdin, showing the default in the prompt.
/// Empty entry takes the default silently, unparsable entry takes it with a warning.
pub fn read_or_default<T>(label: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
{
    print!("{label} [{default}]: ");
    let _ = io::stdout().flush();

    let mut entry = String::new();
    if io::stdin().lock().read_line(&mut entry).is_err() {
        return default;
    }

    parse_entry(&entry, label, default)
}

fn parse_entry<T>(entry: &str, label: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
{
    let entry = entry.trim();
    if entry.is_empty() {
        return default;
    }

    entry.parse().unwrap_or_else(|_| {
        warn!("invalid {label} entry, using default {default}");
        default
    })
}

/// Holds the console window open, the tool is commonly run by dropping a gif onto it.
pub fn pause() {
    println!("press enter to exit");
    let _ = io::stdin().lock().read_line(&mut String::new());
}
