use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn gpath_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("gpath");
    path
}

const CORPUS: &str = r#"{
  "programs": [
    {
      "id": "p1", "school": "CMU", "program": "MSCS", "country": "美国", "category": "CS",
      "prestige_tier": 1, "research_emphasis": 92.0, "internship_emphasis": 85.0,
      "min_gpa": 3.5, "min_toefl": 102, "tuition_per_year": 58000,
      "highlights": ["top-ranked CS", "strong industry ties"]
    },
    {
      "id": "p2", "school": "UIUC", "program": "MCS", "country": "美国", "category": "CS",
      "prestige_tier": 2, "research_emphasis": 80.0, "internship_emphasis": 75.0,
      "min_gpa": 3.2, "min_toefl": 100, "tuition_per_year": 48000
    },
    {
      "id": "p3", "school": "NEU", "program": "MSCS", "country": "美国", "category": "CS",
      "prestige_tier": 3, "research_emphasis": 55.0, "internship_emphasis": 90.0,
      "min_gpa": 3.0, "min_toefl": 92, "tuition_per_year": 42000
    },
    {
      "id": "p4", "school": "Stanford", "program": "MSCS", "country": "美国", "category": "CS",
      "prestige_tier": 1, "research_emphasis": 95.0, "internship_emphasis": 80.0,
      "min_gpa": 3.8, "min_toefl": 118, "tuition_per_year": 62000
    },
    {
      "id": "p5", "school": "Oxford", "program": "MSc CS", "country": "英国", "category": "CS",
      "prestige_tier": 1, "research_emphasis": 90.0, "internship_emphasis": 60.0,
      "min_ielts": 7.0, "tuition_per_year": 45000
    },
    {
      "id": "p6", "school": "NYU", "program": "MS Finance", "country": "美国", "category": "Finance",
      "prestige_tier": 2, "research_emphasis": 60.0, "internship_emphasis": 85.0,
      "tuition_per_year": 55000
    }
  ],
  "case_library": [
    {
      "school": "CMU", "program": "MSCS",
      "cases": [
        { "title": "2024 Fall admit, GPA 3.6, TOEFL 104", "outcome": "admitted" }
      ]
    }
  ]
}"#;

const PROFILE: &str = r#"{
  "id": "s1",
  "name": "测试学生",
  "undergraduate_school": "武汉大学",
  "gpa_text": "GPA 3.7/4.0",
  "language_text": "TOEFL: 106",
  "test_text": "GRE: 325",
  "target_countries": ["美国"],
  "target_programs": ["CS"],
  "intake_term": "2027 Fall"
}"#;

const EMPTY_TARGETS_PROFILE: &str = r#"{
  "id": "s2",
  "name": "空白学生",
  "undergraduate_school": "",
  "gpa_text": "",
  "language_text": "",
  "test_text": "",
  "target_countries": [],
  "target_programs": []
}"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(data_dir.join("programs.json"), CORPUS).unwrap();
    fs::write(root.join("s1.json"), PROFILE).unwrap();
    fs::write(root.join("s2.json"), EMPTY_TARGETS_PROFILE).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/gpath.sqlite"

[catalog]
path = "{}/data/programs.json"

[pipeline]
page_size = 2
analysis_batch = 2
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("gpath.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_gpath(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = gpath_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run gpath binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn import_profiles(config_path: &Path, root: &Path) {
    let (_, stderr, ok) = run_gpath(config_path, &["init"]);
    assert!(ok, "init failed: {}", stderr);

    let s1 = root.join("s1.json");
    let (stdout, stderr, ok) = run_gpath(
        config_path,
        &["profile", "import", "--file", s1.to_str().unwrap()],
    );
    assert!(ok, "profile import failed: {}", stderr);
    assert!(stdout.contains("Profile imported"));

    let s2 = root.join("s2.json");
    let (_, stderr, ok) = run_gpath(
        config_path,
        &["profile", "import", "--file", s2.to_str().unwrap()],
    );
    assert!(ok, "profile import failed: {}", stderr);
}

#[test]
fn full_planning_flow() {
    let (tmp, config_path) = setup_test_env();
    import_profiles(&config_path, tmp.path());

    // Profile show surfaces the derived criteria.
    let (stdout, _, ok) = run_gpath(&config_path, &["profile", "show", "s1", "--criteria"]);
    assert!(ok);
    assert!(stdout.contains("106"), "derived TOEFL missing: {}", stdout);

    // Deep match: p5 (country) and p6 (category) fail hard filters,
    // p4 fails the TOEFL condition, leaving 3 results.
    let (stdout, stderr, ok) = run_gpath(
        &config_path,
        &["match", "s1", "--mode", "deep", "--json", "--progress", "off"],
    );
    assert!(ok, "deep match failed: {}", stderr);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let results = report["results"].as_array().unwrap();
    assert_eq!(results.len(), 3, "unexpected results: {}", stdout);
    assert_eq!(report["scanned"], 6);
    assert_eq!(report["filtered"], 4);
    assert_eq!(report["matched"], 3);
    for r in results {
        let tier = r["tier"].as_str().unwrap();
        assert!(["冲刺", "匹配", "保底"].contains(&tier), "bad tier: {}", tier);
    }
    // Case library reference attached to CMU MSCS.
    let cmu = results
        .iter()
        .find(|r| r["school"] == "CMU")
        .expect("CMU result missing");
    assert_eq!(cmu["similar_cases"][0]["outcome"], "admitted");

    // JSON progress events on stderr: monotone percent ending at 100.
    let (_, stderr, ok) = run_gpath(
        &config_path,
        &["match", "s1", "--mode", "deep", "--json", "--progress", "json"],
    );
    assert!(ok);
    let mut last = 0i64;
    let mut stages = Vec::new();
    for line in stderr.lines().filter(|l| l.starts_with('{')) {
        let event: serde_json::Value = serde_json::from_str(line).unwrap();
        let percent = event["percent"].as_i64().unwrap();
        assert!(percent >= last, "percent regressed in: {}", line);
        last = percent;
        let stage = event["stage"].as_str().unwrap().to_string();
        if stages.last() != Some(&stage) {
            stages.push(stage);
        }
    }
    assert_eq!(last, 100);
    assert_eq!(
        stages,
        vec![
            "parsing",
            "loading",
            "initialFilter",
            "conditionMatch",
            "deepAnalysis",
            "scoring",
            "caseComparison",
            "sorting",
            "completed"
        ]
    );

    // Save a version, then accept everything into the pool.
    let (stdout, stderr, ok) = run_gpath(
        &config_path,
        &["match", "s1", "--mode", "deep", "--save", "--progress", "off"],
    );
    assert!(ok, "match --save failed: {}", stderr);
    let version_id = stdout
        .lines()
        .find_map(|l| l.strip_prefix("Saved version: "))
        .expect("no version id printed")
        .trim()
        .to_string();

    let (stdout, stderr, ok) = run_gpath(&config_path, &["pool", "accept", "s1", "--all"]);
    assert!(ok, "pool accept failed: {}", stderr);
    assert!(stdout.contains("Accepted 3 of 3"), "got: {}", stdout);

    // Accepting the same version again only skips duplicates.
    let (stdout, _, ok) = run_gpath(&config_path, &["pool", "accept", "s1", "--all"]);
    assert!(ok);
    assert!(stdout.contains("Accepted 0 of 3"), "got: {}", stdout);
    assert!(stdout.contains("3 duplicates skipped"), "got: {}", stdout);

    // Curate: approve one entry via its pool id.
    let (stdout, _, ok) = run_gpath(&config_path, &["pool", "list", "s1", "--json"]);
    assert!(ok);
    let entries: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let first_id = entries[0]["id"].as_str().unwrap().to_string();
    assert_eq!(entries[0]["source"], "AI推荐");
    assert_eq!(entries[0]["status"], "待讨论");

    let (stdout, stderr, ok) = run_gpath(
        &config_path,
        &["pool", "set", "s1", &first_id, "--status", "approved"],
    );
    assert!(ok, "pool set failed: {}", stderr);
    assert!(stdout.contains("通过"), "got: {}", stdout);

    // Filter by status returns exactly the approved entry.
    let (stdout, _, ok) = run_gpath(
        &config_path,
        &["pool", "list", "s1", "--status", "通过", "--json"],
    );
    assert!(ok);
    let approved: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(approved.as_array().unwrap().len(), 1);
    assert_eq!(approved[0]["id"].as_str().unwrap(), first_id);

    // Manual add, then stats across all axes.
    let (stdout, stderr, ok) = run_gpath(
        &config_path,
        &[
            "pool", "add", "s1", "--school", "NUS", "--program", "MComp", "--stage", "safety",
            "--notes", "家长推荐",
        ],
    );
    assert!(ok, "pool add failed: {}", stderr);
    assert!(stdout.contains("Added candidate"));

    let (stdout, _, ok) = run_gpath(&config_path, &["pool", "stats", "s1"]);
    assert!(ok);
    assert!(stdout.contains("Total:     4"), "got: {}", stdout);
    assert!(stdout.contains("1 人工添加"), "got: {}", stdout);

    // Adopt the saved version; the list marks it.
    let (stdout, stderr, ok) = run_gpath(&config_path, &["versions", "adopt", "s1", &version_id]);
    assert!(ok, "adopt failed: {}", stderr);
    assert!(stdout.contains("Adopted version"));

    let (stdout, _, ok) = run_gpath(&config_path, &["versions", "list", "s1"]);
    assert!(ok);
    let adopted_lines: Vec<&str> = stdout.lines().filter(|l| l.starts_with('*')).collect();
    assert_eq!(adopted_lines.len(), 1);
    assert!(adopted_lines[0].contains(&version_id));
}

#[test]
fn quick_match_skips_soft_conditions() {
    let (tmp, config_path) = setup_test_env();
    import_profiles(&config_path, tmp.path());

    let (stdout, stderr, ok) = run_gpath(
        &config_path,
        &["match", "s1", "--json", "--progress", "off"],
    );
    assert!(ok, "quick match failed: {}", stderr);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    // Quick mode applies only the hard filters: Stanford stays in.
    assert_eq!(report["results"].as_array().unwrap().len(), 4);
    assert_eq!(report["mode"], "quick");
}

#[test]
fn generation_requires_targets() {
    let (tmp, config_path) = setup_test_env();
    import_profiles(&config_path, tmp.path());

    let (_, stderr, ok) = run_gpath(
        &config_path,
        &["match", "s2", "--mode", "deep", "--progress", "off"],
    );
    assert!(!ok, "match without targets must fail");
    assert!(stderr.contains("Cannot generate"), "got: {}", stderr);
}

#[test]
fn unknown_pool_id_is_a_lookup_failure() {
    let (tmp, config_path) = setup_test_env();
    import_profiles(&config_path, tmp.path());

    let (_, stderr, ok) = run_gpath(
        &config_path,
        &["pool", "set", "s1", "missing-id", "--status", "approved"],
    );
    assert!(!ok);
    assert!(stderr.contains("Candidate not found"), "got: {}", stderr);

    let (stdout, _, ok) = run_gpath(&config_path, &["pool", "stats", "s1"]);
    assert!(ok);
    assert!(stdout.contains("Total:     0"), "got: {}", stdout);
}

#[test]
fn empty_corpus_completes_with_no_results() {
    let (tmp, config_path) = setup_test_env();
    import_profiles(&config_path, tmp.path());

    fs::write(
        tmp.path().join("data").join("programs.json"),
        r#"{ "programs": [] }"#,
    )
    .unwrap();

    let (stdout, stderr, ok) = run_gpath(
        &config_path,
        &["match", "s1", "--mode", "deep", "--json", "--progress", "off"],
    );
    assert!(ok, "empty corpus must complete normally: {}", stderr);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["results"].as_array().unwrap().len(), 0);
    assert_eq!(report["matched"], 0);
}
