//! Turn-based terminal chat UI.
//!
//! Reads one line per turn. Plain lines are chat messages; the rest are
//! commands:
//!
//! | Input | Effect |
//! |-------|--------|
//! | `/add <text>` | Submit `<text>` as knowledge and print a notice |
//! | `/history` | Re-render the session transcript |
//! | `/help` | List commands |
//! | `/quit` | End the session (so does end of input) |
//!
//! Submitted knowledge only affects later retrieval; the running session's
//! history is not touched.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::client::{BackendClient, KnowledgeOutcome};
use crate::models::{ChatTurn, Role};
use crate::session::SessionStore;

const HELP: &str = "Commands: /add <text>, /history, /help, /quit";

enum Command<'a> {
    Chat(&'a str),
    AddKnowledge(&'a str),
    History,
    Help,
    Quit,
    Skip,
}

fn parse_line(line: &str) -> Command<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Command::Skip;
    }
    match line.split_once(char::is_whitespace) {
        Some(("/add", rest)) => Command::AddKnowledge(rest.trim()),
        _ => match line {
            "/add" => Command::AddKnowledge(""),
            "/history" => Command::History,
            "/help" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Chat(line),
        },
    }
}

fn render_turn(out: &mut impl Write, turn: &ChatTurn) -> std::io::Result<()> {
    let label = match turn.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    writeln!(out, "{}> {}", label, turn.content)
}

fn render_notice(out: &mut impl Write, outcome: &KnowledgeOutcome) -> std::io::Result<()> {
    let level = match outcome {
        KnowledgeOutcome::Added => "ok",
        KnowledgeOutcome::Empty => "warn",
        KnowledgeOutcome::Rejected(_) | KnowledgeOutcome::Unreachable(_) => "error",
    };
    writeln!(out, "[{}] {}", level, outcome.notice())
}

/// Runs one session until `/quit` or end of input.
///
/// Returns the session transcript as it stood when the session ended.
/// With `interactive` set, a `> ` prompt is printed before each read.
pub async fn run<R, W>(
    client: &BackendClient,
    input: R,
    mut out: W,
    interactive: bool,
) -> Result<Vec<ChatTurn>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut sessions = SessionStore::new();
    let session_id = sessions.create();
    let mut lines = input.lines();

    writeln!(out, "Personal AI Assistant ({})", client.base_url())?;
    if interactive {
        writeln!(out, "{}", HELP)?;
    }

    loop {
        if interactive {
            write!(out, "> ")?;
            out.flush()?;
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_line(&line) {
            Command::Skip => {}
            Command::Quit => break,
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::History => {
                for turn in sessions.read(&session_id).unwrap_or_default() {
                    render_turn(&mut out, turn)?;
                }
            }
            Command::AddKnowledge(text) => {
                let outcome = client.add_knowledge(text).await;
                if let KnowledgeOutcome::Rejected(status) = &outcome {
                    tracing::debug!(status, "knowledge rejected by backend");
                }
                render_notice(&mut out, &outcome)?;
            }
            Command::Chat(message) => {
                let user_turn = ChatTurn::user(message);
                if !interactive {
                    render_turn(&mut out, &user_turn)?;
                }
                sessions.append(&session_id, user_turn);

                let outcome = client.chat(message).await;
                let assistant_turn = ChatTurn::assistant(outcome.text());
                render_turn(&mut out, &assistant_turn)?;
                sessions.append(&session_id, assistant_turn);
            }
        }
    }

    let transcript = sessions
        .end(&session_id)
        .map(|session| session.turns().to_vec())
        .unwrap_or_default();
    tracing::debug!(turns = transcript.len(), "session ended");
    Ok(transcript)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BACKEND_UNREACHABLE;

    #[test]
    fn parses_commands() {
        assert!(matches!(parse_line("  "), Command::Skip));
        assert!(matches!(parse_line("/quit"), Command::Quit));
        assert!(matches!(parse_line("/history"), Command::History));
        assert!(matches!(
            parse_line("/add  the sky is blue "),
            Command::AddKnowledge("the sky is blue")
        ));
        assert!(matches!(parse_line("/add"), Command::AddKnowledge("")));
        assert!(matches!(parse_line("what is /add?"), Command::Chat("what is /add?")));
    }

    #[tokio::test]
    async fn unreachable_backend_renders_local_fallback() {
        let client = BackendClient::new("http://127.0.0.1:1", 2).unwrap();
        let mut out = Vec::new();
        let input: &[u8] = b"hello\n/add\n/quit\nnever read\n";

        let transcript = run(&client, input, &mut out, false).await.unwrap();

        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].content, "hello");
        assert_eq!(transcript[1].role, Role::Assistant);
        assert_eq!(transcript[1].content, BACKEND_UNREACHABLE);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("you> hello"));
        assert!(text.contains(&format!("assistant> {}", BACKEND_UNREACHABLE)));
        assert!(text.contains("[warn] Please enter some text."));
        assert!(!text.contains("never read"));
    }

    #[tokio::test]
    async fn history_replays_transcript() {
        let client = BackendClient::new("http://127.0.0.1:1", 2).unwrap();
        let mut out = Vec::new();
        let input: &[u8] = b"one\n/history\n";

        run(&client, input, &mut out, false).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("you> one").count(), 2);
    }
}
