//! Interactive REPL for the council
//!
//! Provides the main user interaction loop. Input keeps being read while a
//! cycle runs: `reset` or `exit` abort it, anything else is queued and
//! handled once the cycle ends.

use std::collections::VecDeque;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::agent::Council;
use crate::cli::commands::{handle_command, is_interrupt, render_outcome, CommandResult};
use crate::core::{CouncilError, Result};

type InputLines = Lines<BufReader<Stdin>>;

/// What the REPL does after a cycle ends
enum AfterCycle {
    Continue,
    Exit,
}

/// What a line typed during a running cycle asks for
#[derive(Debug, PartialEq, Eq)]
enum MidCycle {
    Reset,
    Exit,
    Queued,
}

/// Sort a line typed mid-cycle. Interrupts abort the cycle; a reset also
/// drops whatever was queued before it. Blank lines are ignored.
fn take_mid_cycle_line(line: String, queued: &mut VecDeque<String>) -> Option<MidCycle> {
    if line.trim().is_empty() {
        return None;
    }
    if is_interrupt(&line) {
        if line.trim().eq_ignore_ascii_case("reset") {
            queued.clear();
            return Some(MidCycle::Reset);
        }
        return Some(MidCycle::Exit);
    }
    queued.push_back(line);
    Some(MidCycle::Queued)
}

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    council: Council,
    queued: VecDeque<String>,
}

impl Repl {
    pub fn new(council: Council) -> Self {
        Self {
            council,
            queued: VecDeque::new(),
        }
    }

    pub fn council(&self) -> &Council {
        &self.council
    }

    /// Run the REPL until `exit` or end of input
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let input = match self.queued.pop_front() {
                Some(line) => {
                    println!("You: {}", line);
                    line
                }
                None => {
                    print!("You: ");
                    io::stdout().flush()?;

                    match lines.next_line().await {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            // EOF (Ctrl+D)
                            println!();
                            break;
                        }
                        Err(e) => {
                            eprintln!("Error reading input: {}", e);
                            continue;
                        }
                    }
                }
            };

            match handle_command(&input, &self.council) {
                CommandResult::Exit => break,
                CommandResult::Clear => {
                    self.council.reset().await;
                    println!("Conversation cleared.\n");
                }
                CommandResult::Handled(output) => println!("{}\n", output),
                CommandResult::None => {}
                CommandResult::Continue(message) => {
                    if let AfterCycle::Exit = self.run_cycle(&message, &mut lines).await {
                        break;
                    }
                }
            }
        }

        self.council.shutdown().await;
        println!("Goodbye!");
        Ok(())
    }

    /// Drive one cycle while watching stdin for `reset` and `exit`
    async fn run_cycle(&mut self, message: &str, lines: &mut InputLines) -> AfterCycle {
        let council = &self.council;
        let queued = &mut self.queued;

        let cycle = council.process(message);
        tokio::pin!(cycle);

        let mut after = AfterCycle::Continue;
        let mut reset_requested = false;
        let mut stdin_open = true;

        let result = loop {
            tokio::select! {
                result = &mut cycle => break result,
                line = lines.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => match take_mid_cycle_line(line, queued) {
                        // The cycle future is not polled in here, so the
                        // draining reset waits until it has returned
                        Some(MidCycle::Reset) => {
                            reset_requested = true;
                            council.interrupt();
                        }
                        Some(MidCycle::Exit) => {
                            after = AfterCycle::Exit;
                            council.interrupt();
                        }
                        Some(MidCycle::Queued) => println!("(queued until the council finishes)"),
                        None => {}
                    },
                    Ok(None) => {
                        // Let the cycle finish, then leave
                        stdin_open = false;
                        after = AfterCycle::Exit;
                    }
                    Err(e) => {
                        eprintln!("Error reading input: {}", e);
                        stdin_open = false;
                    }
                },
            }
        };

        if reset_requested {
            council.reset().await;
        }

        match result {
            Ok(outcome) => {
                if outcome.turns.is_empty() && outcome.failures.is_empty() {
                    println!("\n(nobody had anything to add)\n");
                } else {
                    println!("{}", render_outcome(&outcome, council.registry()));
                }
                if reset_requested {
                    println!("Conversation cleared.\n");
                }
            }
            Err(CouncilError::Cancelled) => {
                if reset_requested {
                    println!("\nInterrupted. Conversation cleared.\n");
                }
            }
            Err(e) => eprintln!("\nError: {}\n", e),
        }

        after
    }

    /// Print the startup banner
    fn print_banner(&self) {
        let config = self.council.config();

        println!(
            r#"
╔═══════════════════════════════════════════════════════════╗
║                                                           ║
║   C O U N C I L                                           ║
║                                                           ║
║   A room full of opinionated engineers                    ║
║                                                           ║
╚═══════════════════════════════════════════════════════════╝
"#
        );
        println!("Provider:   {}", self.council.provider_name());
        println!("Models:");
        println!("  Primary: {}", config.models.primary);
        println!("  Fast:    {}", config.models.fast);
        let members: Vec<String> = self.council.registry().ids().iter().map(|id| format!("@{}", id)).collect();
        println!("Members:    {}", members.join(" "));
        println!();
        println!("Commands: help, agents, status, reset, exit");
        println!("─────────────────────────────────────────────────────────────");
    }
}
