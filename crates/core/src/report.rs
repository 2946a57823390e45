//! Operator console output
//!
//! Status lines printed while a deployment runs. These are for the person
//! watching the push and never influence control flow.

use colored::*;

pub fn success(message: &str) {
    println!("\n  {}  {}\n", "✔".green().bold(), message);
}

pub fn error(message: &str) {
    println!("\n  {}  {}\n", "✘".red().bold(), message);
}

pub fn notice(message: &str) {
    println!("\n  {}  {}\n", "●".yellow().bold(), message);
}

/// Print a heading followed by `|-- key: value` rows
pub fn print_item(prefix: &str, rows: &[(&str, &str)]) {
    println!("{}", prefix.bold());
    for (key, value) in rows {
        println!("|-- {}: {}", key, value);
    }
}

/// Get a consistent color for a branch name
pub fn branch_color(branch: &str) -> Color {
    let hash = branch
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));

    // Jewel tones, kept clear of the red/green/yellow used for status markers
    let colors = [
        Color::TrueColor {
            r: 147,
            g: 112,
            b: 219,
        },
        Color::TrueColor {
            r: 64,
            g: 224,
            b: 208,
        },
        Color::TrueColor {
            r: 255,
            g: 140,
            b: 0,
        },
        Color::TrueColor {
            r: 199,
            g: 21,
            b: 133,
        },
        Color::TrueColor {
            r: 138,
            g: 43,
            b: 226,
        },
    ];

    colors[(hash % colors.len() as u64) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_color_is_stable() {
        assert_eq!(branch_color("master"), branch_color("master"));
    }
}
