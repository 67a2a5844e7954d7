use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const CONTRACT: &str = "\
SECTION 1. Liability
The Supplier's liability under this Agreement shall be unlimited and shall include all indirect and consequential losses.

SECTION 2. Termination
The Customer may terminate this Agreement for convenience on thirty days' written notice to the Supplier.

SECTION 3. Confidentiality
Each party shall keep the other party's confidential information secret and shall not disclose it to any third party.
";

const CORPUS: &str = r#"[
  "Neither party's aggregate liability shall exceed the fees paid in the preceding twelve months.",
  "Either party may terminate this Agreement on ninety days' prior written notice.",
  "Each party shall not disclose confidential information to any third party without consent."
]"#;

fn cra_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cra");
    path
}

/// Temp workspace with a contract, a corpus, and a config pointing the
/// model at `llm_base_url`.
fn setup_test_env(llm_base_url: &str, api_key_env: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();
    fs::write(root.join("contract.txt"), CONTRACT).unwrap();
    fs::write(root.join("data/precedents.json"), CORPUS).unwrap();

    let config_content = format!(
        r#"[llm]
base_url = "{llm}"
model = "test-model"
api_key_env = "{key_env}"
timeout_secs = 5
max_retries = 1
retry_delay_ms = 0

[analysis]
top_k = 1

[precedents]
corpus_path = "{root}/data/precedents.json"
db_path = "{root}/data/precedents.sqlite"

[trace]
path = "{root}/logs/agent_traces.jsonl"
"#,
        llm = llm_base_url,
        key_env = api_key_env,
        root = root.display(),
    );

    let config_path = root.join("config/cra.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_cra(config_path: &Path, args: &[&str], envs: &[(&str, &str)]) -> (String, String, bool) {
    let binary = cra_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .envs(envs.iter().copied())
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cra binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn contract_path(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("contract.txt")
        .display()
        .to_string()
}

fn trace_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("logs/agent_traces.jsonl")
}

#[test]
fn test_segment_without_config_file() {
    let tmp = TempDir::new().unwrap();
    let contract = tmp.path().join("contract.txt");
    fs::write(&contract, CONTRACT).unwrap();
    let missing_config = tmp.path().join("nope.toml");

    let (stdout, stderr, success) = run_cra(
        &missing_config,
        &["segment", contract.to_str().unwrap(), "--json"],
        &[],
    );
    assert!(success, "segment failed: {}", stderr);

    let clauses: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let clauses = clauses.as_array().unwrap();
    assert_eq!(clauses.len(), 3);
    assert_eq!(clauses[0]["id"], 0);
    assert!(clauses[2]["text"]
        .as_str()
        .unwrap()
        .starts_with("SECTION 3."));
}

#[test]
fn test_segment_rejects_non_utf8() {
    let tmp = TempDir::new().unwrap();
    let contract = tmp.path().join("contract.bin");
    fs::write(&contract, [0x53, 0x45, 0xC3, 0x28, 0xFF]).unwrap();

    let (_, stderr, success) = run_cra(
        &tmp.path().join("nope.toml"),
        &["segment", contract.to_str().unwrap()],
        &[],
    );
    assert!(!success);
    assert!(stderr.contains("UTF-8"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("cra.toml");
    fs::write(&config, "[segmentation]\nmin_len = 100\nmax_len = 10\n").unwrap();
    let contract = tmp.path().join("contract.txt");
    fs::write(&contract, CONTRACT).unwrap();

    let (_, stderr, success) = run_cra(&config, &["segment", contract.to_str().unwrap()], &[]);
    assert!(!success);
    assert!(stderr.contains("min_len"), "stderr: {}", stderr);
}

#[test]
fn test_analyze_unreachable_model_degrades_every_clause() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9/v1", "CRA_IT_KEY_UNREACHABLE");
    let contract = contract_path(&config);

    let (stdout, stderr, success) = run_cra(
        &config,
        &["analyze", &contract, "--json"],
        &[("CRA_IT_KEY_UNREACHABLE", "sk-test")],
    );
    assert!(success, "analyze failed: {}", stderr);

    let results: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 3);
    for r in results {
        assert_eq!(r["risk_score"], 0);
        let reason = r["reasons"][0].as_str().unwrap();
        assert!(reason.starts_with("llm_error"), "reason: {}", reason);
        assert_eq!(r["redline"], "");
        assert_eq!(r["precedents"].as_array().unwrap().len(), 1);
    }

    let traces = fs::read_to_string(trace_path(&config)).unwrap();
    let lines: Vec<&str> = traces.lines().collect();
    assert_eq!(lines.len(), 3);
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["attempts"], 2);
    assert!(first["error"].as_str().unwrap().starts_with("llm_error"));
}

#[test]
fn test_analyze_missing_api_key_degrades() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9/v1", "CRA_IT_KEY_NEVER_SET");
    let contract = contract_path(&config);

    let (stdout, stderr, success) = run_cra(&config, &["analyze", &contract, "--json"], &[]);
    assert!(success, "analyze failed: {}", stderr);
    assert!(stdout.contains("CRA_IT_KEY_NEVER_SET not set"));
}

#[test]
fn test_analyze_max_clauses_limits_model_calls() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9/v1", "CRA_IT_KEY_LIMIT");
    let contract = contract_path(&config);

    let (stdout, stderr, success) = run_cra(
        &config,
        &["analyze", &contract, "--json", "--max-clauses", "2"],
        &[("CRA_IT_KEY_LIMIT", "sk-test")],
    );
    assert!(success, "analyze failed: {}", stderr);
    let results: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(results.as_array().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_analyze_with_model_and_keyword_precedents() {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{ "message": { "content":
                "```json\n{\"risk_score\": 3, \"reasons\": [\"one-sided\"], \"redline\": \"Make it mutual.\"}\n```"
            } }]
        })))
        .mount(&server)
        .await;

    let (_tmp, config) = setup_test_env(&format!("{}/v1", server.uri()), "CRA_IT_KEY_MOCK");
    let contract = contract_path(&config);

    let (stdout, stderr, success) = tokio::task::spawn_blocking(move || {
        let out = run_cra(
            &config,
            &["analyze", &contract, "--json"],
            &[("CRA_IT_KEY_MOCK", "sk-test")],
        );
        drop(_tmp);
        out
    })
    .await
    .unwrap();
    assert!(success, "analyze failed: {}", stderr);

    let results: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r["risk_score"] == 3));
    assert_eq!(results[0]["redline"], "Make it mutual.");
    assert!(results[1]["precedents"][0]
        .as_str()
        .unwrap()
        .contains("terminate"));
}

#[test]
fn test_traces_audit_view_skips_malformed_lines() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9/v1", "CRA_IT_KEY_TRACES");
    let contract = contract_path(&config);
    let (_, stderr, success) = run_cra(
        &config,
        &["analyze", &contract, "--max-clauses", "1"],
        &[("CRA_IT_KEY_TRACES", "sk-test")],
    );
    assert!(success, "analyze failed: {}", stderr);

    let mut log = fs::read_to_string(trace_path(&config)).unwrap();
    log.push_str("this is not json\n");
    fs::write(trace_path(&config), log).unwrap();

    let (stdout, stderr, success) = run_cra(&config, &["traces", "--json"], &[]);
    assert!(success, "traces failed: {}", stderr);
    assert_eq!(stdout.lines().count(), 1);
    assert!(stderr.contains("malformed"));

    let (stdout, _, success) = run_cra(&config, &["traces"], &[]);
    assert!(success);
    assert!(stdout.contains("1 of 1 entries"));
    assert!(stdout.contains("degraded"));
}

#[test]
fn test_precedents_query_uses_keyword_fallback() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9/v1", "CRA_IT_KEY_QUERY");

    let (stdout, stderr, success) = run_cra(
        &config,
        &["precedents", "query", "disclose confidential information", "--top-k", "1"],
        &[],
    );
    assert!(success, "query failed: {}", stderr);
    assert!(stdout.contains("resolver: keyword"));
    assert!(stdout.contains("1. Each party shall not disclose"));
}

#[test]
fn test_precedents_init_creates_index() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9/v1", "CRA_IT_KEY_INIT");
    let db = config
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("data/precedents.sqlite");

    let (stdout, stderr, success) = run_cra(&config, &["precedents", "init"], &[]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("initialized"));
    assert!(db.exists());

    let (_, _, success) = run_cra(&config, &["precedents", "init"], &[]);
    assert!(success, "init must be idempotent");
}

#[test]
fn test_precedents_seed_requires_embeddings() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9/v1", "CRA_IT_KEY_SEED");
    let (_, stderr, success) = run_cra(&config, &["precedents", "seed"], &[]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
}
