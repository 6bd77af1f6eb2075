//! List available challenges.

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use rigor_core::{Challenge, Difficulty};

#[derive(Args, Debug)]
pub struct ChallengesArgs {
    /// Skip the model and show the built-in challenges
    #[arg(long)]
    pub offline: bool,
}

pub async fn run(args: ChallengesArgs) -> Result<()> {
    let (_, orchestrator) = super::build_orchestrator(args.offline)?;
    let challenges = orchestrator.list_challenges().await;
    println!("{}", challenge_table(&challenges));
    println!();
    println!("Start one with: rigor practice --challenge <id>");
    Ok(())
}

/// Render challenges as a table.
pub fn challenge_table(challenges: &[Challenge]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::Cyan),
        Cell::new("ID").fg(Color::Cyan),
        Cell::new("Title").fg(Color::Cyan),
        Cell::new("Level").fg(Color::Cyan),
        Cell::new("Context").fg(Color::Cyan),
    ]);

    for (i, challenge) in challenges.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(challenge.id.as_str()),
            Cell::new(&challenge.title),
            Cell::new(challenge.difficulty).fg(difficulty_color(challenge.difficulty)),
            Cell::new(&challenge.context),
        ]);
    }
    table
}

fn difficulty_color(difficulty: Difficulty) -> Color {
    match difficulty {
        Difficulty::Junior => Color::Green,
        Difficulty::Senior => Color::Yellow,
        Difficulty::Staff => Color::Magenta,
        Difficulty::Principal => Color::Red,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigor_core::fallback_catalog;

    #[test]
    fn table_lists_every_challenge() {
        let catalog = fallback_catalog();
        let rendered = challenge_table(&catalog).to_string();
        for challenge in &catalog {
            assert!(rendered.contains(challenge.id.as_str()));
        }
        assert!(rendered.contains("Principal"));
    }
}
