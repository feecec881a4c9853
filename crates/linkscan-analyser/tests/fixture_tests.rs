//! Whole-file analysis of the C fixtures under `tests/fixtures`.

use linkscan_analyser::{
    analyse_str, AnalysedC, Analyser, EntityKind, Linkage, MarkerConfig, Region, Symbol,
};
use linkscan_common::SourceFile;
use std::collections::BTreeSet;
use std::path::PathBuf;

fn fixture(name: &str) -> SourceFile {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../tests/fixtures")
        .join(name);
    let content = std::fs::read_to_string(&path).expect("fixture exists");
    SourceFile::anonymous(content)
}

fn expect(name: &str, kind: EntityKind, linkage: Linkage, is_definition: bool, region: Region) -> Symbol {
    Symbol {
        name: name.into(),
        kind,
        linkage,
        is_definition,
        region,
    }
}

#[test]
fn test_linkage_fixture_symbol_table() {
    use EntityKind::{Function, Variable};
    use Linkage::{External, Internal};

    let analysis = Analyser::default().analyse(&fixture("linkage.c")).unwrap();

    let mut expected = vec![
        expect("printf", Function, External, false, Region::System),
        expect("sys_var", Variable, External, false, Region::System),
        expect("sys_func", Function, External, false, Region::System),
        expect("usr_var", Variable, External, false, Region::User),
        expect("usr_func", Function, External, false, Region::User),
        expect("var_decl", Variable, External, false, Region::None),
        expect("var_static_decl", Variable, Internal, false, Region::None),
        expect("var_extern_decl", Variable, External, false, Region::None),
        expect("var_def", Variable, External, true, Region::None),
        expect("var_static_def", Variable, Internal, true, Region::None),
        expect("var_extern_def", Variable, External, true, Region::None),
        expect("func_decl", Function, External, true, Region::None),
        expect("func_static_decl", Function, Internal, true, Region::None),
        expect("func_extern_decl", Function, External, false, Region::None),
        expect("func_def", Function, External, true, Region::None),
        expect("func_static_def", Function, Internal, true, Region::None),
        expect("main", Function, External, true, Region::None),
    ];
    expected.sort_by(|a, b| a.name.cmp(&b.name));

    assert_eq!(analysis.table.records(), expected);
    assert!(analysis.diagnostics.is_empty(), "{:?}", analysis.diagnostics);
    assert_eq!(analysis.boundaries.len(), 4);
}

#[test]
fn test_linkage_fixture_summary() {
    let analysis = Analyser::default().analyse(&fixture("linkage.c")).unwrap();
    let analysed = AnalysedC::from_analysis("linkage.c", 0, &analysis);

    let defs: BTreeSet<String> = ["func_decl", "func_def", "var_def", "var_extern_def", "main"]
        .into_iter()
        .map(String::from)
        .collect();
    let deps: BTreeSet<String> = ["usr_var", "usr_func"].into_iter().map(String::from).collect();
    assert_eq!(analysed.symbol_defs, defs);
    assert_eq!(analysed.symbol_deps, deps);
}

#[test]
fn test_no_markers_means_no_region() {
    let file = fixture("linkage.c");
    let stripped: String = file
        .content
        .lines()
        .filter(|line| !line.starts_with("#pragma"))
        .map(|line| format!("{line}\n"))
        .collect();

    let analysis = analyse_str(&stripped, &MarkerConfig::default()).unwrap();
    assert_eq!(analysis.table.len(), 17);
    assert!(analysis.table.iter().all(|s| s.region == Region::None));
    assert!(analysis.boundaries.is_empty());
}

#[test]
fn test_static_stays_internal_after_any_redeclaration() {
    let src = "static int s; int s; extern int s; int s = 3;\n\
               static void h(void); extern void h(void); void h(void) {}\n";
    let analysis = analyse_str(src, &MarkerConfig::default()).unwrap();

    for name in ["s", "h"] {
        let symbol = analysis.table.get(name).unwrap();
        assert_eq!(symbol.linkage, Linkage::Internal, "{name}");
        assert!(symbol.is_definition, "{name}");
    }
    assert_eq!(analysis.warnings().count(), 0);
}

#[test]
fn test_definition_flag_tracks_any_definition() {
    let src = "int a; int a; int b; int b = 1; int b; void c(void); void c(void);";
    let analysis = analyse_str(src, &MarkerConfig::default()).unwrap();

    assert!(!analysis.table.get("a").unwrap().is_definition);
    assert!(analysis.table.get("b").unwrap().is_definition);
    assert!(!analysis.table.get("c").unwrap().is_definition);
}

#[test]
fn test_repeated_analysis_is_identical() {
    let file = fixture("linkage.c");
    let analyser = Analyser::default();

    let first = analyser.analyse(&file).unwrap();
    let second = analyser.analyse(&file).unwrap();
    assert_eq!(first, second);

    let first_json = serde_json::to_vec(&first.table).unwrap();
    let second_json = serde_json::to_vec(&second.table).unwrap();
    assert_eq!(first_json, second_json);
}

#[test]
fn test_parallel_passes_do_not_interfere() {
    let file = fixture("linkage.c");
    let analyser = Analyser::default();
    let expected = analyser.analyse(&file).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| analyser.analyse(&file).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn test_custom_marker_vocabulary() {
    let markers = MarkerConfig {
        namespace: "DEPS".to_string(),
        system: linkscan_analyser::MarkerPair::new("SystemBegin", "SystemEnd"),
        user: linkscan_analyser::MarkerPair::new("UserBegin", "UserEnd"),
    };
    let src = "#pragma DEPS UserBegin\nint shared(void);\n#pragma DEPS UserEnd\n\
               #pragma FAB SysIncludeStart\nint other;\n";
    let analysis = analyse_str(src, &markers).unwrap();

    assert_eq!(analysis.table.get("shared").unwrap().region, Region::User);
    // Foreign pragmas are ordinary directives.
    assert_eq!(analysis.table.get("other").unwrap().region, Region::None);
}
