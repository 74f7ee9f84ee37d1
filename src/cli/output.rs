//! User-facing output for the CLI: colored summaries and miette error reports.

use std::io::Write;

use miette::Report;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::engine::Counts;
use crate::step::Step;
use crate::syntax::Instruction;
use crate::TorsoError;

/// Prints a rich diagnostic for `error` to stderr.
pub fn print_error(error: TorsoError) {
    let report = Report::new(error);
    eprintln!("{report:?}");
}

/// Prints one instruction per line, prefixed with where it came from.
pub fn print_instructions(instructions: &[Instruction]) {
    if instructions.is_empty() {
        println!("(empty)");
        return;
    }
    for instruction in instructions {
        println!(
            "{}:{}: {}",
            instruction.file.display(),
            instruction.line,
            instruction.text()
        );
    }
}

pub fn print_steps(steps: &[Step]) {
    if steps.is_empty() {
        println!("(empty)");
        return;
    }
    for (index, step) in steps.iter().enumerate() {
        let config = step
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>4}  {}  config={}  repeat={}",
            index + 1,
            step.name,
            config,
            step.repeat
        );
    }
}

/// Prints the pass/fail/untested line in color.
pub fn print_summary(counts: &Counts) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_bold(true));
    let _ = write!(stdout, "Summary: ");
    print_count(&mut stdout, Color::Green, "passed", counts.passed);
    print_count(&mut stdout, Color::Red, "failed", counts.failed);
    print_count(&mut stdout, Color::Yellow, "untested", counts.skipped);
    let _ = stdout.reset();
    let _ = writeln!(stdout);
}

fn print_count(stdout: &mut StandardStream, color: Color, label: &str, count: usize) {
    let spec = if count > 0 {
        ColorSpec::new().set_fg(Some(color)).set_bold(true).clone()
    } else {
        ColorSpec::new()
    };
    let _ = stdout.set_color(&spec);
    let _ = write!(stdout, "{} {}  ", count, label);
}
