mod support;

use std::fs;
use std::process::Command;
use std::sync::Arc;

use agent_provider::{Message, ProviderError, Role};
use agent_provider_mock::{
    failure, text, text_with_usage, tool_calls, ScriptedProvider, MOCK_PROVIDER_ID,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use session_store::SessionStoreError;
use skill_agent::controller::{Approval, CommitMode, Flow, TurnOutcome};
use skill_agent::operator::OperatorEvent;
use skill_agent::prompt::{COMMIT_SYSTEM_PROMPT, COMPACTION_REQUEST};
use skill_agent::signals::InterruptAction;
use support::{call, provider, Answer, Project, RecordingOperator};

#[test]
fn final_reply_ends_the_turn_and_saves_the_history() {
    let project = Project::new();
    let provider = provider([text("<thought>greet back</thought>Hello there")]);
    let operator = RecordingOperator::new();
    let mut controller = project.controller(provider.clone(), operator.clone(), Approval::Auto);

    let flow = controller.handle_input("  hi  ").expect("turn");

    assert_eq!(flow, Flow::Turn(TurnOutcome::Completed));
    let roles: Vec<Role> = controller.messages().iter().map(|message| message.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    assert_eq!(controller.messages()[1].content, "hi");
    assert_eq!(
        controller.messages()[2].content,
        "<thought>greet back</thought>Hello there"
    );
    assert!(operator.saw(&OperatorEvent::Thought("greet back".to_string())));
    assert!(operator.saw(&OperatorEvent::Reply("Hello there".to_string())));

    let request = &provider.requests()[0];
    assert!(request.include_reasoning);
    let tool_names: Vec<&str> = request.tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(tool_names, vec!["apply_udiff", "run_script", "shorten_context"]);

    let saved = project.store().load().expect("saved history");
    assert_eq!(saved.len(), 3);
}

#[test]
fn tool_results_are_sent_back_until_the_model_stops_calling_tools() {
    let project = Project::new();
    let provider = provider([
        tool_calls(
            "",
            vec![call(
                "c1",
                "apply_udiff",
                json!({"path": "notes.md", "diff": "@@\n+hello"}),
            )],
        ),
        text("Created notes.md."),
    ]);
    let mut controller =
        project.controller(provider.clone(), RecordingOperator::new(), Approval::Auto);

    let flow = controller.handle_input("write a note").expect("turn");

    assert_eq!(flow, Flow::Turn(TurnOutcome::Completed));
    assert_eq!(project.read("notes.md"), "hello");
    let roles: Vec<Role> = controller.messages().iter().map(|message| message.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    let last = requests[1].messages.last().expect("tool response sent");
    assert_eq!(last.role, Role::Tool);
    assert_eq!(last.tool_call_id.as_deref(), Some("c1"));
    assert_eq!(last.content, "Diff applied successfully.");
}

#[test]
fn skills_created_mid_turn_are_announced() {
    let project = Project::new();
    let provider = provider([
        tool_calls(
            "",
            vec![call(
                "c1",
                "apply_udiff",
                json!({
                    "path": "skills/fresh/SKILL.md",
                    "diff": "@@\n+---\n+name: fresh\n+description: made mid-session\n+---\n"
                }),
            )],
        ),
        text("Skill ready."),
    ]);
    let operator = RecordingOperator::new();
    let mut controller = project.controller(provider.clone(), operator.clone(), Approval::Auto);
    assert!(controller.registry().get("fresh").is_none());

    controller.handle_input("make a skill").expect("turn");

    let notice = "SYSTEM NOTICE: New skills discovered:\n- fresh: made mid-session\n";
    assert!(controller.registry().get("fresh").is_some());
    assert!(controller
        .messages()
        .iter()
        .any(|message| message.role == Role::System && message.content == notice));
    assert!(operator.notices().contains(&notice.to_string()));
    let second = &provider.requests()[1];
    assert_eq!(
        second.messages.last().map(|message| message.content.as_str()),
        Some(notice)
    );
}

#[test]
fn bad_request_ends_the_turn_and_is_logged() {
    let project = Project::new();
    let body = r#"{"error":{"code":400,"message":"invalid tool_call_id"}}"#;
    let provider = provider([failure(ProviderError::BadRequest {
        body: body.to_string(),
    })]);
    let operator = RecordingOperator::new();
    let mut controller = project.controller(provider, operator.clone(), Approval::Auto);

    let flow = controller.handle_input("hi").expect("turn");

    assert_eq!(flow, Flow::Turn(TurnOutcome::Failed));
    assert!(operator
        .diagnostics()
        .contains(&format!("API Error (Status 400): {body}")));
    let log = fs::read_to_string(project.error_log().path()).expect("error log");
    assert!(log.contains(&format!("Error: {body}\n")));
    assert!(log.contains("Last Messages:\n"));
    assert_eq!(project.store().load().expect("history").len(), 2);
}

#[test]
fn exhausted_retries_print_a_diagnostic() {
    let project = Project::new();
    let provider = provider([failure(ProviderError::RetryExhausted {
        attempts: 8,
        last_error: "HTTP 503: busy".to_string(),
    })]);
    let operator = RecordingOperator::new();
    let mut controller = project.controller(provider, operator.clone(), Approval::Auto);

    assert_eq!(
        controller.handle_input("hi").expect("turn"),
        Flow::Turn(TurnOutcome::Failed)
    );
    assert_eq!(
        operator.diagnostics(),
        vec!["giving up after 8 attempts: HTTP 503: busy".to_string()]
    );
}

#[test]
fn large_context_offers_compaction() {
    let project = Project::new();
    let provider = provider([text_with_usage("done", 450_000)]);
    let operator = RecordingOperator::answering([Answer::Yes]);
    let mut controller = project.controller(provider, operator.clone(), Approval::Auto);

    controller.handle_input("hi").expect("turn");

    assert!(operator
        .notices()
        .contains(&"\n[System] Context size is 450000 tokens (>400,000).".to_string()));
    assert_eq!(
        operator.prompts(),
        vec!["Would you like to ask the model to shorten the context? [y/N]: ".to_string()]
    );
    assert_eq!(
        controller.take_pending_input().as_deref(),
        Some(COMPACTION_REQUEST)
    );
    assert_eq!(controller.take_pending_input(), None);
}

#[test]
fn declined_compaction_queues_nothing() {
    let project = Project::new();
    let provider = provider([text_with_usage("done", 450_000), text("ok")]);
    let operator = RecordingOperator::answering([Answer::No]);
    let mut controller = project.controller(provider, operator.clone(), Approval::Auto);

    controller.handle_input("hi").expect("turn");
    assert_eq!(controller.take_pending_input(), None);

    controller.handle_input("again").expect("turn");
    assert_eq!(operator.prompts().len(), 1);
}

#[test]
fn ctrl_c_at_the_compaction_offer_declines_it() {
    let project = Project::new();
    let provider = provider([text_with_usage("done", 450_000)]);
    let operator = RecordingOperator::answering([Answer::CtrlC]);
    let mut controller = project.controller(provider, operator.clone(), Approval::Auto);
    operator.listen_on(controller.turns());

    assert_eq!(
        controller.handle_input("hi").expect("turn"),
        Flow::Turn(TurnOutcome::Completed)
    );

    assert_eq!(operator.prompts().len(), 1);
    assert_eq!(operator.interrupts(), vec![InterruptAction::CancelledTurn]);
    assert_eq!(controller.take_pending_input(), None);
    assert!(!controller.turns().is_active());
}

#[test]
fn controller_reports_the_provider_identity() {
    let project = Project::new();
    let provider = Arc::new(ScriptedProvider::new([]).with_model_id("fixture-model"));
    let controller = project.controller(provider, RecordingOperator::new(), Approval::Auto);

    assert_eq!(controller.profile().provider_id, MOCK_PROVIDER_ID);
    assert_eq!(controller.profile().model_id, "fixture-model");
}

#[test]
fn slash_commands_never_reach_the_model() {
    let project = Project::new();
    project.write_skill(
        "searcher",
        "---\nname: searcher\ndescription: web search\nversion: 0.3\n---\n",
        &[],
    );
    project.write_skill("plain", "---\nname: plain\ndescription: no version\n---\n", &[]);
    let provider = provider([]);
    let operator = RecordingOperator::new();
    let mut controller = project.controller(provider.clone(), operator.clone(), Approval::Auto);

    assert_eq!(controller.handle_input("/history").expect("history"), Flow::Command);
    assert_eq!(controller.handle_input("/skills").expect("skills"), Flow::Command);
    assert_eq!(controller.handle_input("/frobnicate now").expect("unknown"), Flow::Command);
    assert_eq!(controller.handle_input("/help").expect("help"), Flow::Command);
    assert_eq!(controller.handle_input("   ").expect("blank"), Flow::Idle);
    assert_eq!(controller.handle_input("/quit").expect("quit"), Flow::Exit);

    let notices = operator.notices();
    assert_eq!(notices[0], "History contains 1 messages.");
    assert_eq!(
        notices[1],
        "Available Skills:\n- plain: no version\n- searcher (v0.3): web search"
    );
    assert_eq!(notices[2], "Unknown command: /frobnicate");
    assert!(notices[3].starts_with("Available Commands:"));
    assert_eq!(notices[4], "Exiting...");
    assert!(provider.requests().is_empty());
}

#[test]
fn clear_resets_to_the_system_prompt_and_persists() {
    let project = Project::new();
    let provider = provider([text("one")]);
    let operator = RecordingOperator::new();
    let mut controller = project.controller(provider, operator.clone(), Approval::Auto);
    controller.handle_input("hi").expect("turn");
    assert_eq!(controller.messages().len(), 3);

    controller.handle_input("/clear").expect("clear");

    assert_eq!(controller.messages().len(), 1);
    assert_eq!(controller.messages()[0].role, Role::System);
    assert_eq!(project.store().load().expect("history").len(), 1);
    assert!(operator
        .notices()
        .contains(&"Conversation history cleared.".to_string()));
}

#[test]
fn resume_appends_saved_messages_after_the_fresh_prompt() {
    let project = Project::new();
    project
        .store()
        .save(&[
            Message::system("stale prompt"),
            Message::user("earlier question"),
            Message::assistant("earlier answer"),
        ])
        .expect("seed history");
    let operator = RecordingOperator::new();
    let mut controller = project.controller(provider([]), operator.clone(), Approval::Auto);

    assert_eq!(controller.resume().expect("resume"), 2);

    let messages = controller.messages();
    assert_eq!(messages.len(), 3);
    assert_ne!(messages[0].content, "stale prompt");
    assert_eq!(messages[1].content, "earlier question");
    assert_eq!(messages[2].content, "earlier answer");
    assert!(operator
        .notices()
        .contains(&"Loaded 2 messages from history.".to_string()));
}

#[test]
fn corrupt_history_fails_resume() {
    let project = Project::new();
    project.write(".agent/history.json", "{not json");
    let mut controller = project.controller(provider([]), RecordingOperator::new(), Approval::Auto);

    let error = controller.resume().expect_err("corrupt history");
    assert!(matches!(error, SessionStoreError::Parse { .. }));
}

#[test]
fn startup_hooks_add_a_second_system_message() {
    let project = Project::new();
    project.write_core_skill(
        "rules",
        "---\nname: rules\ndescription: house rules\nhooks:\n  startup: inject_skill_md\n---\nAlways run the tests.\n",
        &[],
    );
    let controller = project.controller(provider([]), RecordingOperator::new(), Approval::Auto);

    let messages = controller.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].content.contains("**rules**"));
    assert_eq!(
        messages[1].content,
        "Startup Instructions:\n[Skill: rules Instructions]\nAlways run the tests."
    );
}

fn git(project: &Project, args: &[&str]) -> bool {
    Command::new("git")
        .current_dir(&project.root)
        .args(args)
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

#[test]
fn forced_commit_uses_the_fast_model_message() {
    let project = Project::new();
    if !git(&project, &["init", "-q"]) {
        return;
    }
    git(&project, &["config", "user.email", "dev@example.com"]);
    git(&project, &["config", "user.name", "dev"]);
    project.write("main.txt", "v1\n");
    git(&project, &["add", "main.txt"]);
    git(&project, &["commit", "-qm", "init"]);
    project.write("main.txt", "v2\n");

    let provider = provider([text("Bumped the version."), text("  Bump main.txt to v2  ")]);
    let operator = RecordingOperator::new();
    let mut controller = project.controller_with(
        provider.clone(),
        operator.clone(),
        Approval::Auto,
        CommitMode::Force,
    );

    controller.handle_input("bump it").expect("turn");

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].model.as_deref(), Some("fast-model"));
    assert!(requests[1].tools.is_empty());
    assert_eq!(requests[1].messages[0].content, COMMIT_SYSTEM_PROMPT);
    assert_eq!(
        requests[1].messages[1].content,
        "user: bump it\nassistant: Bumped the version.\n"
    );
    assert!(operator
        .notices()
        .contains(&"\n[Git] Proposed commit message: Bump main.txt to v2".to_string()));
    assert!(operator
        .notices()
        .contains(&"Changes committed successfully.".to_string()));
    assert!(operator.prompts().is_empty());

    let subject = Command::new("git")
        .current_dir(&project.root)
        .args(["log", "-1", "--pretty=%s"])
        .output()
        .expect("git log");
    assert_eq!(
        String::from_utf8_lossy(&subject.stdout).trim(),
        "Bump main.txt to v2"
    );
}

#[test]
fn declined_commit_is_aborted() {
    let project = Project::new();
    if !git(&project, &["init", "-q"]) {
        return;
    }
    git(&project, &["config", "user.email", "dev@example.com"]);
    git(&project, &["config", "user.name", "dev"]);
    project.write("main.txt", "v1\n");
    git(&project, &["add", "main.txt"]);
    git(&project, &["commit", "-qm", "init"]);
    project.write("main.txt", "v2\n");

    let provider = provider([text("Bumped the version."), text("Bump main.txt")]);
    let operator = RecordingOperator::answering([Answer::No]);
    let mut controller = project.controller(provider, operator.clone(), Approval::Auto);
    controller.handle_input("bump it").expect("turn");

    assert_eq!(controller.handle_input("/commit").expect("commit"), Flow::Command);
    assert_eq!(operator.prompts(), vec!["Commit these changes? [y/N]: ".to_string()]);
    assert!(operator.notices().contains(&"Commit aborted.".to_string()));
    assert_eq!(project.read("main.txt"), "v2\n");
}

#[test]
fn ctrl_c_at_the_commit_prompt_aborts_the_commit() {
    let project = Project::new();
    if !git(&project, &["init", "-q"]) {
        return;
    }
    git(&project, &["config", "user.email", "dev@example.com"]);
    git(&project, &["config", "user.name", "dev"]);
    project.write("main.txt", "v1\n");
    git(&project, &["add", "main.txt"]);
    git(&project, &["commit", "-qm", "init"]);
    project.write("main.txt", "v2\n");

    let provider = provider([text("Bumped the version."), text("Bump main.txt")]);
    let operator = RecordingOperator::answering([Answer::CtrlC]);
    let mut controller = project.controller(provider, operator.clone(), Approval::Auto);
    operator.listen_on(controller.turns());
    controller.handle_input("bump it").expect("turn");

    assert_eq!(controller.handle_input("/commit").expect("commit"), Flow::Command);
    assert_eq!(operator.interrupts(), vec![InterruptAction::CancelledTurn]);
    assert!(operator.notices().contains(&"Commit aborted.".to_string()));
    let log = Command::new("git")
        .current_dir(&project.root)
        .args(["log", "--oneline"])
        .output()
        .expect("git log");
    assert_eq!(String::from_utf8_lossy(&log.stdout).lines().count(), 1);
}
