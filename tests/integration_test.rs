// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
/// End-to-end tests over the conversation engine using scripted mock clients.
use std::io::Write;
use std::sync::Arc;

use colloquy_config::{DiscussionConfig, Mode};
use colloquy_core::{write_transcript, ConversationManager};
use colloquy_model::{Message, Role, ScriptedClient};

const HUMAN: &str = "mock:human";
const AI: &str = "mock:ai";

fn manager_with_mocks(
    dir: &tempfile::TempDir,
) -> (ConversationManager, Arc<ScriptedClient>, Arc<ScriptedClient>) {
    let manager = ConversationManager::new(DiscussionConfig::default())
        .with_output_dir(dir.path());
    let human = Arc::new(ScriptedClient::always_text("<p>a question from the human side</p>"));
    let ai = Arc::new(ScriptedClient::always_text("<p>an answer from the ai side</p>"));
    manager.insert_client(HUMAN, human.clone());
    manager.insert_client(AI, ai.clone());
    (manager, human, ai)
}

#[tokio::test]
async fn conversation_to_transcript_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, _human, _ai) = manager_with_mocks(&dir);

    let history = manager
        .run_conversation(
            "Topic: integration surfaces",
            HUMAN,
            AI,
            Mode::HumanAiAi,
            None,
            None,
            2,
        )
        .await
        .unwrap();

    // Head invariant plus strict alternation after it.
    assert_eq!(history[0], Message::system("Discuss: integration surfaces"));
    let conversational: Vec<Role> = history[1..].iter().map(|m| m.role).collect();
    assert_eq!(
        conversational,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );

    let path = write_transcript(
        dir.path(),
        &history,
        Mode::HumanAiAi,
        "Topic: integration surfaces",
        "claude-3-7-sonnet",
        "gemini-2.0-flash-exp",
    )
    .unwrap();
    let html = std::fs::read_to_string(&path).unwrap();
    assert!(html.contains("human-message"));
    assert!(html.contains("ai-message"));
    assert!(html.contains("an answer from the ai side"));
}

#[tokio::test]
async fn all_three_modes_complete_back_to_back() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, human, _ai) = manager_with_mocks(&dir);

    for mode in Mode::all() {
        let history = manager
            .run_conversation("GOAL: compare the modes", HUMAN, AI, mode, None, None, 1)
            .await
            .unwrap();
        assert_eq!(history.len(), 3, "mode {mode}: system + one round");
        assert_eq!(history[0].role, Role::System);
    }

    // One human call per sub-run.
    assert_eq!(human.call_count(), 3);

    // The three modes produced three distinct instruction styles.
    let reqs = human.requests.lock().unwrap();
    assert!(reqs[0].system_instruction.contains("NEVER REFER TO YOURSELF AS AN AI"));
    assert!(reqs[1].system_instruction.contains("NEVER REFER TO YOURSELF AS AN AI"));
    assert!(reqs[2].system_instruction.starts_with("You are a helpful assistant."));
}

#[tokio::test]
async fn human_aiai_swaps_history_only_for_the_human_side() {
    let dir = tempfile::tempdir().unwrap();
    let manager = ConversationManager::new(DiscussionConfig::default())
        .with_output_dir(dir.path());
    let human = Arc::new(ScriptedClient::new(vec![Ok("A".into()), Ok("C".into())]));
    let ai = Arc::new(ScriptedClient::new(vec![Ok("B".into()), Ok("D".into())]));
    manager.insert_client(HUMAN, human.clone());
    manager.insert_client(AI, ai.clone());

    let mut manager = manager;
    manager
        .run_conversation("t", HUMAN, AI, Mode::HumanAiAi, None, None, 2)
        .await
        .unwrap();

    // Second human turn saw [t, A, B] swapped to [t, assistant A, user B].
    assert_eq!(
        human.history_at(1),
        vec![
            Message::system("t"),
            Message::assistant("A"),
            Message::user("B"),
        ]
    );
    // Second ai turn saw the natural [t, A, B, C].
    assert_eq!(
        ai.history_at(1),
        vec![
            Message::system("t"),
            Message::user("A"),
            Message::assistant("B"),
            Message::user("C"),
        ]
    );
}

#[tokio::test]
async fn attached_file_reaches_the_first_turn_and_the_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, human, _ai) = manager_with_mocks(&dir);

    let mut file = tempfile::Builder::new().suffix(".rs").tempfile().unwrap();
    writeln!(file, "fn main() {{}}").unwrap();

    let history = manager
        .run_conversation_with_file(
            "review this program",
            HUMAN,
            AI,
            Mode::NoMetaPrompting,
            None,
            None,
            1,
            file.path(),
        )
        .await
        .unwrap();

    let first_request = &human.requests.lock().unwrap()[0];
    assert!(first_request.attachment.is_some());

    let path = write_transcript(
        dir.path(),
        &history,
        Mode::NoMetaPrompting,
        "review this program",
        HUMAN,
        AI,
    )
    .unwrap();
    let html = std::fs::read_to_string(path).unwrap();
    assert!(html.contains("file-content"));
    assert!(html.contains("fn main()"));
}

#[test]
fn config_defaults_are_valid() {
    let cfg = DiscussionConfig::default();
    assert_eq!(cfg.rounds, 3);
    assert_eq!(cfg.mode, Mode::NoMetaPrompting);
    assert!(cfg.models.is_empty());
}
