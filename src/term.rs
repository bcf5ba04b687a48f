use std::fs;
use std::io::{self, BufRead, Write};

use crate::diff::{DiffDisplayConfig, print_review_diff};
use crate::pipeline::RewriteRecord;
use crate::review::{InputSource, NavInput, ReviewScreen};

const COLOR_BOLD: &str = "\x1b[1m";
const COLOR_RESET: &str = "\x1b[m";

/// Cooked-mode navigation input: one command per line, vi-style letters or
/// plain words, Enter on its own confirms.
pub struct StdinInput;

impl InputSource for StdinInput {
    fn next_input(&mut self) -> Option<NavInput> {
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            print!("> ");
            let _ = io::stdout().flush();
            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
            match parse_nav(line.trim()) {
                Some(symbol) => return Some(symbol),
                None => println!(
                    "commands: [Enter]/l select, j/down move down, k/up move up, b/q back"
                ),
            }
        }
    }
}

fn parse_nav(token: &str) -> Option<NavInput> {
    match token.to_ascii_lowercase().as_str() {
        "" | "l" | "right" | "select" => Some(NavInput::Confirm),
        "j" | "down" | "next" => Some(NavInput::Down),
        "k" | "up" | "prev" => Some(NavInput::Up),
        "h" | "b" | "q" | "left" | "back" => Some(NavInput::Back),
        _ => None,
    }
}

/// Prints review menus and per-record diffs to stdout.
pub struct TerminalScreen {
    colorize: bool,
    context: usize,
}

impl TerminalScreen {
    pub fn new(colorize: bool, context: usize) -> Self {
        Self { colorize, context }
    }

    fn bold(&self, text: &str) -> String {
        if self.colorize {
            format!("{COLOR_BOLD}{text}{COLOR_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl ReviewScreen for TerminalScreen {
    fn show_summary(&mut self, found: usize, selected: usize) {
        println!();
        if selected > 0 {
            println!("{}", self.bold(&format!("Selected {selected}/{found} rewrites")));
        } else {
            println!("{}", self.bold(&format!("Found {found} rewrites")));
        }
        println!();
    }

    fn show_menu(
        &mut self,
        question: &str,
        items: &[String],
        cursor: usize,
        scroll: usize,
        height: usize,
    ) {
        println!("{}", self.bold(question));
        if scroll > 0 {
            println!("  ...");
        }
        let end = (scroll + height).min(items.len());
        for (idx, item) in items[scroll..end].iter().enumerate() {
            let marker = if scroll + idx == cursor { '>' } else { ' ' };
            println!("{marker} {item}");
        }
        if end < items.len() {
            println!("  ...");
        }
    }

    fn show_record(&mut self, record: &RewriteRecord, position: usize, total: usize) {
        println!("-----------------------------------------------------------");
        println!();
        println!(
            "{}",
            self.bold(&format!(
                "Rewrite {position}/{total} \u{2022} {}",
                record.filename.display()
            ))
        );
        println!();
        match fs::read_to_string(&record.filename) {
            Ok(original) => print_review_diff(
                &original,
                &record.rewritten_text,
                &DiffDisplayConfig {
                    context: self.context,
                    colorize: self.colorize,
                },
            ),
            Err(err) => println!("unable to re-read {}: {err}", record.filename.display()),
        }
        println!();
    }
}
