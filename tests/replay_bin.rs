//! Integration tests that lock the replay binary's output format.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn scratch_dir(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "narrator-replay-{label}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn replay(label: &str, script: &str, flags: &[&str]) -> Output {
    let dir = scratch_dir(label);
    let script_path = dir.join("script.jsonl");
    fs::write(&script_path, script).expect("write script");
    let output = Command::new(env!("CARGO_BIN_EXE_narrator-replay"))
        .arg(&script_path)
        .args(flags)
        .env("NARRATOR_CONFIG_DIR", &dir)
        .env_remove("NARRATOR_CONFIG")
        .output()
        .expect("run narrator-replay");
    let _ = fs::remove_dir_all(&dir);
    output
}

const BATTLE_TURN: &str = r#"
# command menu opens, then the target picker takes over in the same frame
{"op":"claim","region":"battle-command"}
{"op":"announce","region":"battle-command","context":"battle-command.cursor","text":"Fight"}
{"op":"generic","context":"generic.cursor","text":"Fight"}
{"op":"defer","text":"Attack","unless_active":"battle-target"}
{"op":"claim","region":"battle-target"}
{"op":"tick"}
{"op":"speak","text":"Goblin"}
{"op":"finish"}
{"op":"speak","text":"Goblin takes 12 damage"}
"#;

#[test]
fn replay_prints_spoken_lines_with_markers() {
    let output = replay("plain", BATTLE_TURN, &[]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "> Fight\n+ Goblin takes 12 damage\n");
}

#[test]
fn replay_explain_shows_arbitration_notes() {
    let output = replay("explain", BATTLE_TURN, &["--explain"]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("# yielded to battle-command"));
    assert!(!stdout.contains("Attack"));
}

#[test]
fn replay_json_emits_requests() {
    let output = replay(
        "json",
        r#"{"op":"generic","context":"generic.cursor","text":"New Game"}"#,
        &["--json"],
    );
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().next().expect("one request");
    let value: serde_json::Value = serde_json::from_str(line).expect("json line");
    assert_eq!(value["text"], "New Game");
    assert_eq!(value["interrupt"], true);
}

#[test]
fn replay_rejects_malformed_script() {
    let output = replay("bad", "{\"op\":\"tick\"}\nnot json\n", &[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("script line 2"));
}
