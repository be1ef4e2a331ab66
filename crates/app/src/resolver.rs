use std::io::{self, Write};

use akahu_sync_reconcile::{Decision, MatchError, MatchPrompt, Resolver};

/// Interactive confirmation at the terminal. Prompt text goes to stdout;
/// operational events stay on the tracing side.
pub struct StdinResolver;

impl StdinResolver {
    fn render(prompt: &MatchPrompt<'_>) {
        println!();
        println!(
            "Which {} account matches Akahu account \"{}\"{}?",
            prompt.ledger.label(),
            prompt.source.name,
            prompt
                .source
                .connection
                .as_deref()
                .map(|c| format!(" ({c})"))
                .unwrap_or_default()
        );
        if let Some(other) = &prompt.mapped_elsewhere {
            println!("  (mapped to \"{other}\" in the other ledger)");
        }
        println!("0. Mark this account as DO NOT MAP");
        for candidate in prompt.candidates {
            let marker = if candidate.claimed {
                " (Already Mapped)"
            } else {
                ""
            };
            println!("{}. {}{marker}", candidate.position, candidate.account.name);
        }
        if let Some(position) = prompt.suggestion {
            println!("Suggested match: {position}");
        }
        println!("(Press Enter to skip for now)");
        print!("> ");
        let _ = io::stdout().flush();
    }
}

impl Resolver for StdinResolver {
    fn resolve(&mut self, prompt: &MatchPrompt<'_>) -> Result<Decision, MatchError> {
        Self::render(prompt);

        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        let answer = line.trim();

        if answer.is_empty() {
            return Ok(Decision::Skip);
        }
        match answer.parse::<usize>() {
            Ok(0) => Ok(Decision::Never),
            Ok(position) => match prompt
                .candidates
                .iter()
                .find(|c| c.position == position && !c.claimed)
            {
                Some(candidate) => Ok(Decision::Confirm(candidate.account.id.clone())),
                None => {
                    println!("Invalid input.");
                    Ok(Decision::Skip)
                }
            },
            Err(_) => {
                println!("Invalid input.");
                Ok(Decision::Skip)
            }
        }
    }
}
