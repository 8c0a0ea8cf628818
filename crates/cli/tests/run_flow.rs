//! File-in / JSON-out behavior of the `triage` binary.

use std::fs;
use std::path::Path;
use std::process::Command;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn diagnoses_a_failure_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let trace = write(
        dir.path(),
        "trace.txt",
        "Error occurred when executing node 2 (VAE Decode)\n\
         Traceback (most recent call last):\n\
         \x20 File \"nodes.py\", line 281, in decode\n\
         torch.cuda.OutOfMemoryError: CUDA out of memory",
    );
    let workflow = write(
        dir.path(),
        "workflow.json",
        r#"{
            "1": {"type": "CheckpointLoader", "inputs": {"ckpt_name": "model.safetensors"}},
            "2": {"type": "VaeDecode", "inputs": {"samples": ["1", 0]}}
        }"#,
    );
    let logs = write(dir.path(), "logs.txt", "run started\nexecuting node 2\n");

    let output = Command::new(env!("CARGO_BIN_EXE_triage"))
        .arg("--trace")
        .arg(&trace)
        .arg("--workflow")
        .arg(&workflow)
        .arg("--logs")
        .arg(&logs)
        .env_remove("TRIAGE_TOKENIZER_DIR")
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let bundle = &parsed["bundle"];
    for key in [
        "error_summary",
        "node_info",
        "traceback",
        "execution_logs",
        "workflow_subset",
        "system_info",
    ] {
        assert!(!bundle[key].is_null() || key == "system_info", "missing bundle key {key}");
    }
    assert!(bundle["error_summary"]
        .as_str()
        .unwrap()
        .starts_with("torch.cuda.OutOfMemoryError:"));
    assert_eq!(bundle["node_info"]["node_id"], "2");
    assert_eq!(parsed["report"]["pipeline_status"], "ok");
    assert_eq!(
        parsed["report"]["suggestion"]["pattern_id"],
        "out_of_memory"
    );
    assert_eq!(parsed["report"]["metadata"]["prune_mode"], "upstream_trace");
}

#[test]
fn missing_trace_file_fails_with_context() {
    let output = Command::new(env!("CARGO_BIN_EXE_triage"))
        .arg("--trace")
        .arg("/definitely/not/here.txt")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot read"), "stderr: {stderr}");
}

#[test]
fn empty_trace_degrades_but_still_prints_a_report() {
    let dir = tempfile::tempdir().unwrap();
    let trace = write(dir.path(), "trace.txt", "");

    let output = Command::new(env!("CARGO_BIN_EXE_triage"))
        .arg("--trace")
        .arg(&trace)
        .output()
        .unwrap();

    assert!(output.status.success(), "degraded is not a process failure");
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["report"]["pipeline_status"], "degraded");
    assert!(parsed["bundle"].is_null());
    assert!(!parsed["report"]["stage_errors"].as_array().unwrap().is_empty());
}
