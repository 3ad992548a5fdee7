use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use mystfig_core::{
    canonical_filename, descriptive_name_of, is_canonical, parse_canonical, plan, resolve_order,
    ChapterScan, MappingEntry, Reference, ReferenceSyntax, RenameMapping, Resolution, Rewriter,
    StepKind,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn canonical_names_roundtrip(
        chapter in 1u32..100,
        position in 1u32..100,
        descriptive in descriptive_segment(),
        ext in prop::sample::select(vec!["png", "jpg", "svg", "gif"]),
    ) {
        let filename = canonical_filename(chapter, position, &descriptive, ext);
        prop_assert!(is_canonical(&filename, chapter));
        let parsed = parse_canonical(&filename).unwrap();
        prop_assert_eq!(parsed.position, position);
        prop_assert_eq!(descriptive_name_of(&filename), descriptive);
    }

    #[test]
    fn any_filename_yields_a_usable_segment(name in "[A-Za-z0-9 _.\\-]{0,24}") {
        let descriptive = descriptive_name_of(&format!("{name}.png"));
        let filename = canonical_filename(4, 2, &descriptive, "png");
        prop_assert!(is_canonical(&filename, 4), "{} from {:?}", filename, name);
    }

    #[test]
    fn positions_follow_scan_order(picks in prop::collection::vec(0usize..8, 1..20)) {
        let ordered: Vec<Reference> = picks.iter().map(|idx| reference(*idx)).collect();
        let scan = ChapterScan { ordered: ordered.clone(), ..Default::default() };
        let mapping = resolve_order(7, &scan).unwrap();

        let mut first_seen: Vec<PathBuf> = Vec::new();
        for item in &ordered {
            let path = item.resolution.resolved_path().unwrap().to_path_buf();
            if !first_seen.contains(&path) {
                first_seen.push(path);
            }
        }
        prop_assert_eq!(mapping.len(), first_seen.len());
        for (idx, path) in first_seen.iter().enumerate() {
            let entry = mapping.iter().find(|e| &e.old_path == path).unwrap();
            prop_assert_eq!(entry.position, idx as u32 + 1);
        }
    }

    #[test]
    fn rewriting_disjoint_names_is_idempotent(
        names in prop::collection::btree_set("[a-z]{2,6}", 1..6),
        filler in prop::collection::vec("[a-z ]{0,8}", 1..6),
    ) {
        let pairs: Vec<(String, String)> = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (format!("{name}.png"), format!("07_{:02}_{name}.png", idx + 1)))
            .collect();
        let mut text = String::new();
        for (idx, chunk) in filler.iter().enumerate() {
            text.push_str(chunk);
            text.push_str(" Images/");
            text.push_str(&pairs[idx % pairs.len()].0);
            text.push('\n');
        }
        let rewriter = Rewriter::new(pairs.clone());
        let once = rewriter.rewrite(&text).text.into_owned();
        let twice = rewriter.rewrite(&once).text.into_owned();
        prop_assert_eq!(&once, &twice);
        for (old, _) in &pairs {
            let stale = format!("Images/{old}");
            prop_assert!(!once.contains(&stale));
        }
    }

    #[test]
    fn plans_never_overwrite(order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle()) {
        // figures 07_01..07_06 all named "fig" are reordered into a permutation
        let mut mapping = RenameMapping::new();
        for (new_idx, &old_idx) in order.iter().enumerate() {
            let old = format!("07_{:02}_fig.png", old_idx + 1);
            let new = format!("07_{:02}_fig.png", new_idx + 1);
            mapping.insert(MappingEntry {
                old_path: PathBuf::from("/img").join(&old),
                new_path: PathBuf::from("/img").join(&new),
                needs_rename: old != new,
                old_filename: old,
                new_filename: new,
                position: new_idx as u32 + 1,
                old_position: Some(old_idx as u32 + 1),
                descriptive_name: "fig".to_string(),
            }).unwrap();
        }
        let mut files: BTreeSet<PathBuf> = mapping.iter().map(|e| e.old_path.clone()).collect();
        let built = plan(&mapping, &files).unwrap();
        prop_assert!(built.blocked.is_empty());

        let mut finished = HashSet::new();
        for step in &built.steps {
            prop_assert!(files.remove(&step.from));
            prop_assert!(files.insert(step.to.clone()));
            if step.kind != StepKind::ToTemporary {
                finished.insert(step.entry.clone());
            }
        }
        prop_assert_eq!(finished.len(), mapping.renames_needed());
        let expected: BTreeSet<PathBuf> = mapping.iter().map(|e| e.new_path.clone()).collect();
        prop_assert_eq!(files, expected);
    }
}

fn reference(idx: usize) -> Reference {
    let filename = format!("Figure{idx}.png");
    Reference {
        document: PathBuf::from("/book/Chap07/Chapter.md"),
        line: idx + 1,
        column: 1,
        syntax: ReferenceSyntax::InlineImage,
        raw_path: format!("Images/{filename}"),
        resolution: Resolution::Resolved(PathBuf::from("/book/Chap07/Images").join(&filename)),
        filename,
        line_text: String::new(),
    }
}

fn descriptive_segment() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z0-9]{1,6}", 1..4).prop_map(|parts| parts.join("_"))
}
