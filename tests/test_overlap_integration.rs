// Integration tests for the overlap engine with on-disk source files
use listinsight::model::{ListType, OverlapSummary, ProcessedFile};
use listinsight::overlap::{compact_summaries, OverlapEngine, OverlapOptions};
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::TempDir;

fn source(
    dir: &Path,
    name: &str,
    category: &str,
    list_type: ListType,
    entries: &[&str],
) -> ProcessedFile {
    let path = dir.join(format!("{}_{}_{}.txt", name, category, list_type.code()));
    let mut content = String::from("# generated fixture\n");
    for entry in entries {
        content.push_str(entry);
        content.push('\n');
    }
    std::fs::write(&path, content).unwrap();

    ProcessedFile {
        name: name.to_string(),
        generic_source_type: category.to_string(),
        actual_source_type: "hostsfile".to_string(),
        list_type,
        filepath: path,
        number_of_entries: entries.len(),
        valid: true,
        must_consider: false,
    }
}

fn engine(root: &Path) -> OverlapEngine {
    let mut options = OverlapOptions::new(root.join("overlap"), root.join("summary").join("overlap.json"));
    options.pair_workers = 3;
    OverlapEngine::new(options)
}

fn domain_fixture(dir: &Path) -> Vec<ProcessedFile> {
    vec![
        source(dir, "stevenblack", "domain", ListType::Blocklist, &[
            "ads.example.com", "tracker.example.net", "malware.example.org", "phish.example.io",
        ]),
        source(dir, "oisd", "domain", ListType::Blocklist, &[
            "ads.example.com", "tracker.example.net", "spam.example.biz",
        ]),
        source(dir, "hagezi", "domain", ListType::Blocklist, &[
            "ads.example.com", "crypto.example.xyz",
        ]),
        source(dir, "corp-allow", "domain", ListType::Allowlist, &[
            "tracker.example.net", "intranet.example.com",
        ]),
    ]
}

#[test]
fn test_every_pair_is_symmetric() {
    let tmp = TempDir::new().unwrap();
    let files = domain_fixture(tmp.path());

    let result = engine(tmp.path()).find_overlap("domain", &files);

    for pair in &result.pairs {
        let mirror = result
            .pairs
            .iter()
            .find(|p| p.source.name == pair.target.name && p.target.name == pair.source.name)
            .expect("mirror pair recorded");
        assert_eq!(mirror.overlap, pair.overlap);
        assert_eq!(mirror.overlap_file, pair.overlap_file);
        assert_eq!(mirror.source.count, pair.target.count);
    }
}

#[test]
fn test_full_overlap_pair_count() {
    let tmp = TempDir::new().unwrap();
    // Every source shares one entry, so every comparison is non-empty
    let files: Vec<ProcessedFile> = (0..6)
        .map(|i| {
            let own = format!("only-{}.example.com", i);
            source(tmp.path(), &format!("feed{}", i), "ipv4", ListType::Blocklist, &[
                "203.0.113.7", own.as_str(),
            ])
        })
        .collect();

    let result = engine(tmp.path()).find_overlap("ipv4", &files);
    assert_eq!(result.pairs_count, 6 * 5);
    assert_eq!(result.pairs.len(), result.pairs_count);
}

#[test]
fn test_percent_uses_each_sides_own_count() {
    let tmp = TempDir::new().unwrap();
    let files = vec![
        source(tmp.path(), "big", "domain", ListType::Blocklist, &["a.example", "b.example", "c.example", "d.example"]),
        source(tmp.path(), "small", "domain", ListType::Blocklist, &["a.example", "b.example", "x.example"]),
    ];

    let result = engine(tmp.path()).find_overlap("domain", &files);
    let big = result.pairs.iter().find(|p| &*p.source.name == "big").unwrap();
    assert_eq!(big.overlap, 2);
    assert_eq!(big.source.count, 4);
    assert_eq!(big.source.percent, 50.0);
    assert_eq!(big.target.percent, 66.7);
}

#[test]
fn test_unreadable_source_degrades_gracefully() {
    let tmp = TempDir::new().unwrap();
    let mut files = domain_fixture(tmp.path());
    let missing = source(tmp.path(), "gone", "domain", ListType::Blocklist, &["ads.example.com"]);
    std::fs::remove_file(&missing.filepath).unwrap();
    files.push(missing);

    let with_missing = engine(tmp.path()).find_overlap("domain", &files);
    files.pop();
    let without = engine(tmp.path()).find_overlap("domain", &files);

    assert_eq!(with_missing.pairs_count, without.pairs_count);
    assert!(with_missing.pairs.iter().all(|p| &*p.target.name != "gone"));
}

#[test]
fn test_compact_summary_invariants() {
    let tmp = TempDir::new().unwrap();
    let files = domain_fixture(tmp.path());

    let result = engine(tmp.path()).find_overlap("domain", &files);
    let summaries = compact_summaries(&[result]);

    assert_eq!(summaries.len(), 4);
    for summary in &summaries {
        let overlap_sum: usize = summary.targets.iter().map(|t| t.overlap).sum();
        assert_eq!(summary.unique, summary.count.saturating_sub(overlap_sum));
        assert_eq!(summary.targets_count, summary.targets.len());
        assert!(summary
            .targets
            .windows(2)
            .all(|w| w[0].percent >= w[1].percent));
    }

    let stevenblack = find(&summaries, "stevenblack", ListType::Blocklist);
    assert_eq!(stevenblack.count, 4);
    // oisd: 2 shared, hagezi: 1 shared, corp-allow: 1 shared
    assert_eq!(stevenblack.targets_count, 3);
    assert_eq!(stevenblack.unique, 0);
    assert_eq!(stevenblack.conflicts, 1);

    let allow = find(&summaries, "corp-allow", ListType::Allowlist);
    assert_eq!(allow.conflicts, allow.targets_count);
}

#[test]
fn test_same_name_under_both_list_types_kept_apart() {
    let tmp = TempDir::new().unwrap();
    let files = vec![
        source(tmp.path(), "source", "domain", ListType::Blocklist, &["a.example", "b.example", "c.example"]),
        source(tmp.path(), "vendor", "domain", ListType::Blocklist, &["a.example", "b.example"]),
        source(tmp.path(), "vendor", "domain", ListType::Allowlist, &["c.example"]),
    ];

    let result = engine(tmp.path()).find_overlap("domain", &files);
    let summaries = compact_summaries(&[result]);

    let source_summary = find(&summaries, "source", ListType::Blocklist);
    assert_eq!(source_summary.targets_count, 2);
    assert_eq!(source_summary.conflicts, 1);
    assert_eq!(source_summary.unique, 0);

    let vendor_lists: BTreeSet<ListType> = source_summary
        .targets
        .iter()
        .filter(|t| t.name == "vendor")
        .map(|t| t.list_type)
        .collect();
    assert_eq!(vendor_lists.len(), 2);
}

#[test]
fn test_summary_file_is_byte_identical_across_runs() {
    let tmp = TempDir::new().unwrap();
    let mut files = domain_fixture(tmp.path());
    files.push(source(tmp.path(), "spamhaus", "ipv4", ListType::Blocklist, &["198.51.100.1", "198.51.100.2"]));
    files.push(source(tmp.path(), "firehol", "ipv4", ListType::Blocklist, &["198.51.100.2", "198.51.100.3"]));
    let categories = vec!["domain".to_string(), "ipv4".to_string()];

    let engine = engine(tmp.path());
    let first_count = engine.write_compact_overlap_summaries(&files, &categories, 2).unwrap();
    let first = std::fs::read(&engine.options().summary_path).unwrap();

    let second_count = engine.write_compact_overlap_summaries(&files, &categories, 4).unwrap();
    let second = std::fs::read(&engine.options().summary_path).unwrap();

    assert_eq!(first_count, 6);
    assert_eq!(first_count, second_count);
    assert_eq!(first, second);
}

#[test]
fn test_overlap_files_written_per_pair() {
    let tmp = TempDir::new().unwrap();
    let files = domain_fixture(tmp.path());

    let result = engine(tmp.path()).find_overlap("domain", &files);
    let overlap_files: BTreeSet<_> = result.pairs.iter().map(|p| p.overlap_file.clone()).collect();
    assert_eq!(overlap_files.len(), result.pairs.len() / 2);

    for pair in &result.pairs {
        let content = std::fs::read_to_string(&pair.overlap_file).unwrap();
        assert_eq!(content.lines().count(), pair.overlap);
    }

    let mixed = overlap_files
        .iter()
        .filter(|p| p.to_string_lossy().ends_with("_domain_mixed_overlap.txt"))
        .count();
    assert_eq!(mixed, 2);
}

#[test]
fn test_sources_with_both_list_types_keep_separate_overlap_files() {
    let tmp = TempDir::new().unwrap();
    let files = vec![
        source(tmp.path(), "vendor-x", "domain", ListType::Allowlist, &["a.example", "b.example", "c.example", "d.example"]),
        source(tmp.path(), "vendor-x", "domain", ListType::Blocklist, &["a.example", "b.example", "e.example"]),
        source(tmp.path(), "vendor-y", "domain", ListType::Allowlist, &["a.example", "f.example"]),
        source(tmp.path(), "vendor-y", "domain", ListType::Blocklist, &["a.example", "b.example", "c.example", "g.example"]),
    ];
    let mut options = OverlapOptions::new(tmp.path().join("overlap"), tmp.path().join("overlap.json"));
    options.pair_workers = 6;
    let engine = OverlapEngine::new(options);

    for _ in 0..10 {
        let result = engine.find_overlap("domain", &files);
        assert_eq!(result.pairs_count, 4 * 3);

        let overlap_files: BTreeSet<_> = result.pairs.iter().map(|p| p.overlap_file.clone()).collect();
        assert_eq!(overlap_files.len(), 6);

        for pair in &result.pairs {
            let content = std::fs::read_to_string(&pair.overlap_file).unwrap();
            assert_eq!(content.lines().count(), pair.overlap);
        }

        let cross_mixed: Vec<usize> = result
            .pairs
            .iter()
            .filter(|p| {
                &*p.source.name == "vendor-x"
                    && &*p.target.name == "vendor-y"
                    && p.source.list_type != p.target.list_type
            })
            .map(|p| p.overlap)
            .collect();
        assert_eq!(cross_mixed.len(), 2);
        assert!(cross_mixed.contains(&1));
        assert!(cross_mixed.contains(&3));
    }

    let leftovers = std::fs::read_dir(tmp.path().join("overlap"))
        .unwrap()
        .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);
}

fn find<'a>(summaries: &'a [OverlapSummary], name: &str, list_type: ListType) -> &'a OverlapSummary {
    summaries
        .iter()
        .find(|s| s.name == name && s.list_type == list_type)
        .unwrap_or_else(|| panic!("summary for {} missing", name))
}
