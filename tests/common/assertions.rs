//! Output-file readers and assertions

use std::collections::HashMap;
use std::path::Path;
use fetch_pipeline::ResultRecord;

/// Read the raw lines of an output file
pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("read output file")
        .lines()
        .map(str::to_string)
        .collect()
}

/// Parse every line of an output file into a record
pub fn read_records(path: &Path) -> Vec<ResultRecord> {
    read_lines(path)
        .iter()
        .map(|line| serde_json::from_str(line).unwrap_or_else(|e| panic!("bad line {line:?}: {e}")))
        .collect()
}

/// Assert the output holds exactly one record per target, in any order
pub fn assert_one_record_per_target(records: &[ResultRecord], targets: &[String]) {
    assert_eq!(
        records.len(),
        targets.len(),
        "expected one record per target, got {} records for {} targets",
        records.len(),
        targets.len()
    );

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *seen.entry(record.url.as_str()).or_default() += 1;
    }
    for target in targets {
        assert_eq!(
            seen.get(target.as_str()),
            Some(&1),
            "target {target} should appear exactly once"
        );
    }
}

/// The exact line the writer produces for a record
pub fn expected_line(url: &str, status_code: u16) -> String {
    format!("{{\"url\": \"{url}\", \"status_code\": {status_code}}}")
}
