//! Console stand-in for the hardware buttons.
//!
//! One command per stdin line:
//! - `a`, `b`, `c`: click
//! - `ha` / `-`, `hc` / `+`: one hold step on A / C
//! - `ac` / `back`: A and C held together
//! - `status`, `quit`

use std::io::BufRead;
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::Sender;

use crate::menu::{Button, ButtonEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputCommand {
    Button(ButtonEvent),
    Status,
    Quit,
}

pub fn parse_line(line: &str) -> Option<InputCommand> {
    let cmd = line.trim().to_ascii_lowercase();
    let event = match cmd.as_str() {
        "a" => ButtonEvent::Click(Button::A),
        "b" => ButtonEvent::Click(Button::B),
        "c" => ButtonEvent::Click(Button::C),
        "ha" | "-" => ButtonEvent::Hold(Button::A),
        "hc" | "+" => ButtonEvent::Hold(Button::C),
        "ac" | "back" => ButtonEvent::HoldBoth,
        "status" | "s" => return Some(InputCommand::Status),
        "quit" | "q" | "exit" => return Some(InputCommand::Quit),
        _ => return None,
    };
    Some(InputCommand::Button(event))
}

/// Read stdin on a background thread; the channel disconnects at end of input.
pub fn spawn_stdin_reader(tx: Sender<InputCommand>) -> Result<()> {
    thread::Builder::new()
        .name("stdin-buttons".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!("stdin read failed: {e}");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_line(&line) {
                    Some(cmd) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    None => println!("unknown command: {}", line.trim()),
                }
            }
        })
        .context("spawn stdin reader")?;
    Ok(())
}
