//! Interactive session behaviour: background tasks, conversation
//! bookkeeping and persistence commands.

mod common;

use std::sync::Arc;

use common::{spawn_fake_ollama, test_config, write_file, DEAD_URL};
use orinda::context::AppContext;
use orinda::session::{Flow, Session};
use orinda::worker::WorkerEvent;
use orinda_core::models::Role;
use tempfile::TempDir;

type TestSession = Session<Vec<u8>>;

async fn session(tmp: &TempDir, url: &str) -> TestSession {
    let ctx = AppContext::open(test_config(tmp.path(), url)).await.unwrap();
    Session::new(Arc::new(ctx), Vec::new()).unwrap()
}

async fn send(session: &mut TestSession, line: &str) -> Flow {
    let flow = session.handle_line(line).await.unwrap();
    session.wait_idle().await.unwrap();
    flow
}

fn output(session: TestSession) -> String {
    String::from_utf8(session.into_output()).unwrap()
}

#[tokio::test]
async fn chat_reply_appends_both_turns() {
    let (url, _server) = spawn_fake_ollama().await;
    let tmp = TempDir::new().unwrap();
    let mut s = session(&tmp, &url).await;

    send(&mut s, "hello there").await;

    let turns = &s.conversation().turns;
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].text, "hello there");
    assert_eq!(turns[1].role, Role::Assistant);
    assert!(turns[1].text.starts_with("reply #1"));
    assert!(output(s).contains("LLM: reply #1"));
}

#[tokio::test]
async fn chat_failure_leaves_conversation_untouched() {
    let tmp = TempDir::new().unwrap();
    let ctx = Arc::new(AppContext::open(test_config(tmp.path(), DEAD_URL)).await.unwrap());
    let mut s = Session::new(ctx.clone(), Vec::new()).unwrap();

    send(&mut s, "hello there").await;
    send(&mut s, "/save").await;

    assert!(s.conversation().is_empty());
    assert!(s.is_idle());
    assert!(ctx.conversations().list().await.unwrap().is_empty());
    let out = output(s);
    assert!(out.contains("Error: inference service unavailable"));
    assert!(out.contains(&format!("(is the Ollama server running at {}?)", DEAD_URL)));
    assert!(out.contains("Nothing to save yet."));
}

#[tokio::test]
async fn second_request_is_refused_while_first_runs() {
    let tmp = TempDir::new().unwrap();
    let mut s = session(&tmp, DEAD_URL).await;

    s.handle_line("first").await.unwrap();
    s.handle_line("second").await.unwrap();
    s.wait_idle().await.unwrap();

    assert!(output(s).contains("Still waiting for the previous reply"));
}

#[tokio::test]
async fn stale_results_are_ignored() {
    let (url, _server) = spawn_fake_ollama().await;
    let tmp = TempDir::new().unwrap();
    let mut s = session(&tmp, &url).await;

    s.handle_line("question").await.unwrap();
    s.handle_line("/cancel").await.unwrap();
    assert!(s.is_idle());

    s.handle_event(WorkerEvent::Chat {
        task: 1,
        prompt: "question".into(),
        result: Ok("late answer".into()),
    })
    .unwrap();
    assert!(s.conversation().is_empty());
}

#[tokio::test]
async fn ask_lists_sources() {
    let (url, _server) = spawn_fake_ollama().await;
    let tmp = TempDir::new().unwrap();
    let mut s = session(&tmp, &url).await;
    let body = "The warranty covers water damage for two years.";
    let file = write_file(tmp.path(), "warranty.md", body);

    send(&mut s, &format!("/ingest {}", file.display())).await;
    send(&mut s, &format!("/ask {}", body)).await;
    send(&mut s, "/sources").await;

    assert_eq!(s.conversation().turns.len(), 2);
    assert_eq!(s.conversation().turns[0].text, body);
    let out = output(s);
    assert!(out.contains("Ingested 1 chunk(s) from 1 file(s), 0 failed."));
    assert!(out.contains("Sources:\n  [warranty.md, Relevance: "));
    assert!(out.contains("warranty.md  (1 chunks)"));
}

#[tokio::test]
async fn forget_removes_source() {
    let (url, _server) = spawn_fake_ollama().await;
    let tmp = TempDir::new().unwrap();
    let mut s = session(&tmp, &url).await;
    let file = write_file(tmp.path(), "old notes.txt", "Outdated information.");

    send(&mut s, &format!("/ingest \"{}\"", file.display())).await;
    send(&mut s, "/forget old notes.txt").await;
    send(&mut s, "/sources").await;

    let out = output(s);
    assert!(out.contains("Removed 1 chunk(s) of old notes.txt."));
    assert!(out.contains("No documents ingested yet."));
}

#[tokio::test]
async fn save_history_load_and_delete() {
    let (url, _server) = spawn_fake_ollama().await;
    let tmp = TempDir::new().unwrap();
    let mut s = session(&tmp, &url).await;

    send(&mut s, "/save").await;
    send(&mut s, "first message").await;
    send(&mut s, "/save Trip planning").await;
    let id = s.conversation().id.clone();

    send(&mut s, "/new").await;
    assert!(s.conversation().is_empty());
    send(&mut s, "/history").await;

    send(&mut s, &format!("/load {}", &id[..8])).await;
    assert_eq!(s.conversation().id, id);
    assert_eq!(s.conversation().title, "Trip planning");
    assert_eq!(s.conversation().turns.len(), 2);

    send(&mut s, "second message").await;
    send(&mut s, "/save").await;
    send(&mut s, &format!("/delete {}", id)).await;
    assert_ne!(s.conversation().id, id);
    send(&mut s, "/history").await;

    let out = output(s);
    assert!(out.contains("Nothing to save yet."));
    assert!(out.contains("Saved \"Trip planning\""));
    assert!(out.contains("2 new turn(s)."));
    assert!(out.contains("Trip planning  (2 turns)"));
    assert!(out.contains(&format!("Deleted conversation {}.", id)));
    assert!(out.contains("No saved conversations."));
}

#[tokio::test]
async fn model_commands() {
    let (url, _server) = spawn_fake_ollama().await;
    let tmp = TempDir::new().unwrap();
    let mut s = session(&tmp, &url).await;

    send(&mut s, "/model tiny").await;
    assert_eq!(s.model().name, "tiny");
    send(&mut s, "/model gpt-9").await;
    assert_eq!(s.model().name, "tiny");
    send(&mut s, "/models").await;
    send(&mut s, "hello").await;
    assert!(s.conversation().is_empty());

    let out = output(s);
    assert!(out.contains("Model set to tiny"));
    assert!(out.contains("Error: model not found: 'gpt-9'"));
    assert!(out.contains("* tiny"));
    assert!(out.contains("Error: model not found: tiny"));
}

#[tokio::test]
async fn switching_model_starts_new_conversation() {
    let (url, _server) = spawn_fake_ollama().await;
    let tmp = TempDir::new().unwrap();
    let mut s = session(&tmp, &url).await;

    send(&mut s, "hello").await;
    assert_eq!(s.conversation().turns.len(), 2);
    let first_id = s.conversation().id.clone();

    send(&mut s, "/model tiny").await;
    assert!(s.conversation().is_empty());
    assert_ne!(s.conversation().id, first_id);
    send(&mut s, "/model tiny").await;

    let out = output(s);
    assert!(out.contains("Model set to tiny. Started a new conversation."));
    assert!(out.contains("Already using tiny"));
}

#[tokio::test]
async fn invalid_utf8_line_is_reported_and_skipped() {
    let (url, _server) = spawn_fake_ollama().await;
    let tmp = TempDir::new().unwrap();
    let mut s = session(&tmp, &url).await;

    s.run(&b"caf\xe9\n/show\n"[..]).await.unwrap();

    assert!(s.conversation().is_empty());
    let out = output(s);
    assert!(out.contains("Error: input is not valid UTF-8"));
    assert!(out.contains("(empty conversation)"));
}

#[tokio::test]
async fn run_drains_tasks_at_end_of_input() {
    let (url, _server) = spawn_fake_ollama().await;
    let tmp = TempDir::new().unwrap();
    let mut s = session(&tmp, &url).await;

    s.run(&b"hello\n"[..]).await.unwrap();

    assert_eq!(s.conversation().turns.len(), 2);
}

#[tokio::test]
async fn quit_stops_reading() {
    let (url, _server) = spawn_fake_ollama().await;
    let tmp = TempDir::new().unwrap();
    let mut s = session(&tmp, &url).await;

    assert_eq!(send(&mut s, "/quit").await, Flow::Quit);
    s.run(&b"/quit\n/show\n"[..]).await.unwrap();
    assert!(!output(s).contains("(empty conversation)"));
}
