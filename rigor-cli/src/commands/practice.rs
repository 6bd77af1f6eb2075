//! Interactive practice session.
//!
//! Each plain line fills the open step and submits it for critique. Slash
//! commands edit without submitting, finish, restart or inspect the session.

use anyhow::{Result, bail};
use clap::Args;
use dialoguer::{Select, theme::ColorfulTheme};
use rigor_core::{
    Challenge, MIN_CRITIQUED_STEPS, Orchestrator, SessionEvent, SessionResult, SessionSnapshot,
    StepId, StepState, SubmitOutcome,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Args, Debug)]
pub struct PracticeArgs {
    /// Challenge id to start with (see `rigor challenges`)
    #[arg(short, long)]
    pub challenge: Option<String>,

    /// Skip the model; every call uses its fallback
    #[arg(long)]
    pub offline: bool,
}

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    /// Fill the open step and submit it.
    Answer(String),
    /// Replace the open step without submitting.
    Edit(String),
    Submit,
    Finish,
    Restart,
    Show,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl ReplCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Answer(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match name {
            "edit" | "e" => Self::Edit(arg.to_string()),
            "submit" | "s" => Self::Submit,
            "finish" | "f" => Self::Finish,
            "restart" | "r" => Self::Restart,
            "show" => Self::Show,
            "help" | "h" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        }
    }
}

const HELP: &str = "\
Commands:
  <text>         write the next step and submit it for critique
  /edit <text>   replace the open step without submitting
  /submit        submit the open step as it is
  /finish        end the session and get graded
  /restart       throw the session away and start over
  /show          print the session so far
  /help          show this help
  /quit          leave";

pub async fn run(args: PracticeArgs) -> Result<()> {
    let (config, orchestrator) = super::build_orchestrator(args.offline)?;
    println!(
        "Using {} ({})",
        config.llm.provider,
        config.llm.model_or_default()
    );

    let challenges = orchestrator.list_challenges().await;
    let challenge = pick_challenge(&challenges, args.challenge.as_deref())?;

    let printer = tokio::spawn(print_progress(orchestrator.subscribe()));
    let result = repl(&orchestrator, challenge).await;
    printer.abort();
    result
}

fn pick_challenge(challenges: &[Challenge], wanted: Option<&str>) -> Result<Challenge> {
    if let Some(id) = wanted {
        return match challenges.iter().find(|c| c.id.as_str() == id) {
            Some(challenge) => Ok(challenge.clone()),
            None => {
                let known: Vec<&str> = challenges.iter().map(|c| c.id.as_str()).collect();
                bail!("Unknown challenge '{}'. Available: {}", id, known.join(", "))
            }
        };
    }

    let items: Vec<String> = challenges
        .iter()
        .map(|c| format!("[{}] {}", c.difficulty, c.title))
        .collect();
    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Pick a challenge")
        .items(&items)
        .default(0)
        .interact()?;
    Ok(challenges[index].clone())
}

async fn repl(orchestrator: &Orchestrator, mut challenge: Challenge) -> Result<()> {
    begin(orchestrator, &challenge).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = ReplCommand::parse(&line);
        debug!(?command, "repl command");

        match command {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Show => print_snapshot(&orchestrator.snapshot().await),
            ReplCommand::Unknown(name) => println!("Unknown command /{name}. Try /help."),
            ReplCommand::Restart => {
                orchestrator.restart().await;
                challenge = pick_challenge(&orchestrator.list_challenges().await, None)
                    .unwrap_or(challenge);
                begin(orchestrator, &challenge).await;
            }
            ReplCommand::Edit(text) => match open_step(orchestrator).await {
                Some(step) => report(orchestrator.edit_step(step, text).await),
                None => println!("No open step."),
            },
            ReplCommand::Submit => {
                if let Some(step) = open_step(orchestrator).await {
                    submit(orchestrator, step).await;
                } else {
                    println!("No open step.");
                }
            }
            ReplCommand::Answer(text) => {
                if let Some(step) = open_step(orchestrator).await {
                    if let Err(e) = orchestrator.edit_step(step, text).await {
                        println!("{e}");
                        continue;
                    }
                    submit(orchestrator, step).await;
                } else {
                    println!("No open step. Use /restart to start over.");
                }
            }
            ReplCommand::Finish => match orchestrator.finish_session().await {
                Ok(result) => print_result(&result),
                Err(e) => println!("{e}"),
            },
        }
    }
    Ok(())
}

async fn begin(orchestrator: &Orchestrator, challenge: &Challenge) {
    orchestrator.start_session(challenge.clone()).await;
    println!();
    println!("== {} [{}] ==", challenge.title, challenge.difficulty);
    println!("{}", challenge.description);
    if !challenge.context.is_empty() {
        println!("Context: {}", challenge.context);
    }
    println!();
    println!(
        "Reason through your design one step at a time. After {} critiqued steps, /finish to be graded. /help for commands.",
        MIN_CRITIQUED_STEPS
    );
}

async fn open_step(orchestrator: &Orchestrator) -> Option<StepId> {
    orchestrator
        .snapshot()
        .await
        .steps
        .last()
        .filter(|s| s.state == StepState::Open)
        .map(|s| s.id)
}

async fn submit(orchestrator: &Orchestrator, step: StepId) {
    match orchestrator.submit_step(step).await {
        Ok(SubmitOutcome::Critiqued { critique, .. }) => {
            println!();
            println!("  > {}", critique.text);
            println!("  depth {}/10", critique.depth_score);
            println!();
        }
        Ok(SubmitOutcome::Reverted { reason, .. }) => {
            println!("Could not get a critique ({reason}). Your step is still open; try again.");
        }
        Ok(SubmitOutcome::Ignored) => println!("Nothing to submit."),
        Ok(SubmitOutcome::Superseded) => {}
        Err(e) => println!("{e}"),
    }
}

fn report(result: Result<(), rigor_core::SessionError>) {
    if let Err(e) = result {
        println!("{e}");
    }
}

/// Show in-flight state while a call is outstanding.
async fn print_progress(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::CritiqueRequested { position, .. }) => {
                println!("  (critiquing step {position}...)");
            }
            Ok(SessionEvent::EvaluationRequested { steps }) => {
                println!("  (grading {steps} steps...)");
            }
            Ok(SessionEvent::FinalizationFailed { .. }) => {
                println!("  (grading failed, /finish to retry)");
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                debug!(skipped = n, "progress printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    let Some(challenge) = &snapshot.challenge else {
        println!("No session.");
        return;
    };
    println!("== {} ==", challenge.title);
    for step in &snapshot.steps {
        let marker = match step.state {
            StepState::Open => "open",
            StepState::AwaitingCritique => "waiting",
            StepState::Critiqued => "done",
        };
        println!("{:>3}. [{marker}] {}", step.position, step.content);
        if let (Some(critique), Some(score)) = (&step.critique, step.depth_score) {
            println!("       > {critique} ({score}/10)");
        }
    }
    if let Some(avg) = snapshot.average_depth {
        println!("Average depth: {avg:.1}/10");
    }
    if let Some(result) = &snapshot.result {
        print_result(result);
    }
}

fn print_result(result: &SessionResult) {
    println!();
    println!("Score: {}/100", result.score);
    println!("{}", result.summary);
    if !result.strengths.is_empty() {
        println!("Strengths:");
        for s in &result.strengths {
            println!("  + {s}");
        }
    }
    if !result.weaknesses.is_empty() {
        println!("Weaknesses:");
        for w in &result.weaknesses {
            println!("  - {w}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigor_core::fallback_catalog;

    #[test]
    fn plain_text_is_an_answer() {
        assert_eq!(
            ReplCommand::parse("  shard by user id "),
            ReplCommand::Answer("shard by user id".to_string())
        );
    }

    #[test]
    fn slash_commands_parse() {
        assert_eq!(ReplCommand::parse("/finish"), ReplCommand::Finish);
        assert_eq!(ReplCommand::parse("/q"), ReplCommand::Quit);
        assert_eq!(ReplCommand::parse("/submit"), ReplCommand::Submit);
        assert_eq!(ReplCommand::parse("/restart"), ReplCommand::Restart);
        assert_eq!(
            ReplCommand::parse("/edit  use   a queue"),
            ReplCommand::Edit("use   a queue".to_string())
        );
        assert_eq!(ReplCommand::parse("/edit"), ReplCommand::Edit(String::new()));
        assert_eq!(
            ReplCommand::parse("/dance"),
            ReplCommand::Unknown("dance".to_string())
        );
    }

    #[test]
    fn blank_line_is_empty() {
        assert_eq!(ReplCommand::parse("   "), ReplCommand::Empty);
    }

    #[test]
    fn pick_challenge_by_id() {
        let catalog = fallback_catalog();
        let picked = pick_challenge(&catalog, Some("rate-limiter")).unwrap();
        assert_eq!(picked.id.as_str(), "rate-limiter");
    }

    #[test]
    fn pick_unknown_challenge_lists_ids() {
        let catalog = fallback_catalog();
        let err = pick_challenge(&catalog, Some("nope")).unwrap_err();
        assert!(err.to_string().contains("url-shortener"));
    }
}
