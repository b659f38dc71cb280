use kptag::database::{Document, Group};
use kptag::filter::{filter, TagSet};

fn entry(uuid: &str, fields: &[(&str, &str)]) -> String {
    let strings: String = fields
        .iter()
        .map(|(key, value)| format!("<String><Key>{}</Key><Value>{}</Value></String>", key, value))
        .collect();

    format!(
        "<Entry><UUID>{}</UUID><Times><Expires>False</Expires></Times>{}</Entry>",
        uuid, strings
    )
}

fn group(uuid: &str, name: &str, children: &[String]) -> String {
    format!(
        "<Group><UUID>{}</UUID><Name>{}</Name>{}</Group>",
        uuid,
        name,
        children.concat()
    )
}

fn document(recycle_bin: Option<&str>, root: String) -> Document {
    let meta = match recycle_bin {
        Some(uuid) => format!(
            "<Meta><Generator>KeePassXC</Generator><RecycleBinUUID>{}</RecycleBinUUID></Meta>",
            uuid
        ),
        None => String::from("<Meta><Generator>KeePassXC</Generator></Meta>"),
    };
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<KeePassFile>{}<Root>{}<DeletedObjects/></Root></KeePassFile>",
        meta, root
    );

    Document::parse(&xml).unwrap()
}

fn tags(tags: &[&str]) -> TagSet {
    tags.iter().copied().collect()
}

fn entry_uuids(document: &Document) -> Vec<String> {
    fn walk(group: Group<'_>, out: &mut Vec<String>) {
        out.extend(group.entries().map(|e| e.uuid()));
        for child in group.groups() {
            walk(child, out);
        }
    }

    let mut out = Vec::new();
    for group in document.groups() {
        walk(group, &mut out);
    }
    out
}

fn group_names(document: &Document) -> Vec<String> {
    fn walk(group: Group<'_>, out: &mut Vec<String>) {
        out.push(group.name());
        for child in group.groups() {
            walk(child, out);
        }
    }

    let mut out = Vec::new();
    for group in document.groups() {
        walk(group, &mut out);
    }
    out
}

#[test]
fn recycle_bin_is_never_counted() {
    let bin: Vec<String> = (0..5)
        .map(|i| entry(&format!("bin-{}", i), &[("Title", "old"), ("exportme", "")]))
        .collect();
    let doc = document(
        Some("bin"),
        group(
            "root",
            "Passwords",
            &[
                group("work", "Work", &[entry("w1", &[("exportme", "yes")]), entry("w2", &[])]),
                group("bin", "Recycle Bin", &bin),
            ],
        ),
    );

    let filtered = filter(doc, &tags(&["exportme"]));

    assert_eq!(filtered.total_entries, 2);
    assert_eq!(filtered.exported_entries, 1);
    assert_eq!(entry_uuids(&filtered.document), vec!["w1"]);
    assert_eq!(group_names(&filtered.document), vec!["Passwords", "Work"]);
    assert_eq!(filtered.document.recycle_bin_uuid(), None);
}

#[test]
fn recycle_bin_is_dropped_even_without_tags() {
    let doc = document(
        Some("bin"),
        group(
            "root",
            "Passwords",
            &[group("bin", "Recycle Bin", &[entry("gone", &[("x", "")])])],
        ),
    );

    let filtered = filter(doc, &TagSet::new());

    assert_eq!(filtered.total_entries, 0);
    assert_eq!(filtered.exported_entries, 0);
    assert!(group_names(&filtered.document).is_empty());
}

#[test]
fn nested_recycle_bin_beside_kept_group() {
    let doc = document(
        Some("bin"),
        group(
            "root",
            "Passwords",
            &[group(
                "parent",
                "Parent",
                &[
                    group("kept", "Kept", &[entry("k1", &[("exportme", "")])]),
                    group(
                        "bin",
                        "Recycle Bin",
                        &[
                            entry("b1", &[("exportme", "")]),
                            group("deleted", "Deleted", &[entry("b2", &[("exportme", "")])]),
                        ],
                    ),
                ],
            )],
        ),
    );

    let filtered = filter(doc, &tags(&["exportme"]));

    assert_eq!(filtered.total_entries, 1);
    assert_eq!(filtered.exported_entries, 1);
    assert_eq!(entry_uuids(&filtered.document), vec!["k1"]);
    assert_eq!(group_names(&filtered.document), vec!["Passwords", "Parent", "Kept"]);
}

#[test]
fn large_export() {
    // 13 groups of 25 entries, every 24th entry tagged
    let groups: Vec<String> = (0..13)
        .map(|g| {
            let entries: Vec<String> = (0..25)
                .map(|e| {
                    let i = g * 25 + e;
                    if i % 24 == 0 {
                        entry(&format!("e{}", i), &[("Title", "t"), ("exportme", "")])
                    } else {
                        entry(&format!("e{}", i), &[("Title", "t"), ("other", "")])
                    }
                })
                .collect();
            group(&format!("g{}", g), &format!("Group {}", g), &entries)
        })
        .collect();
    let doc = document(Some("bin"), group("root", "Passwords", &groups));
    assert_eq!(doc.entry_count(), 325);

    let filtered = filter(doc, &tags(&["exportme"]));

    assert_eq!(filtered.total_entries, 325);
    assert_eq!(filtered.exported_entries, 14);
    let expected: Vec<String> = (0..325)
        .filter(|i| i % 24 == 0)
        .map(|i| format!("e{}", i))
        .collect();
    assert_eq!(entry_uuids(&filtered.document), expected);
    assert_eq!(filtered.document.entry_count(), 14);
}

#[test]
fn empty_groups_are_pruned_and_order_is_kept() {
    let doc = document(
        None,
        group(
            "root",
            "Passwords",
            &[
                group("a", "A", &[entry("a1", &[("t", "")])]),
                group("b", "B", &[entry("b1", &[("u", "")]), group("b2", "B2", &[])]),
                group("c", "C", &[group("c2", "C2", &[entry("c3", &[("t", "")])])]),
                entry("r1", &[("t", "")]),
                entry("r2", &[]),
            ],
        ),
    );

    let filtered = filter(doc, &tags(&["t"]));

    assert_eq!(filtered.total_entries, 5);
    assert_eq!(filtered.exported_entries, 3);
    assert_eq!(entry_uuids(&filtered.document), vec!["r1", "a1", "c3"]);
    assert_eq!(group_names(&filtered.document), vec!["Passwords", "A", "C", "C2"]);
}

#[test]
fn reserved_fields_are_not_tags() {
    let doc = document(
        None,
        group(
            "root",
            "Passwords",
            &[
                entry(
                    "reserved",
                    &[
                        ("Notes", ""),
                        ("Password", ""),
                        ("Title", ""),
                        ("URL", ""),
                        ("UserName", ""),
                        ("TOTP Seed", ""),
                        ("TOTP Settings", ""),
                    ],
                ),
                entry("custom", &[("Password", "x"), ("password", "x")]),
            ],
        ),
    );
    let all = tags(&[
        "Notes",
        "Password",
        "Title",
        "URL",
        "UserName",
        "TOTP Seed",
        "TOTP Settings",
        "password",
    ]);

    let filtered = filter(doc, &all);

    assert_eq!(filtered.total_entries, 2);
    assert_eq!(entry_uuids(&filtered.document), vec!["custom"]);
}

#[test]
fn matching_is_exact_and_ignores_values() {
    let doc = document(
        None,
        group(
            "root",
            "Passwords",
            &[
                entry("upper", &[("ExportMe", "")]),
                entry("prefix", &[("exportme2", "")]),
                entry("value", &[("note", "exportme")]),
                entry("any", &[("exportme", "no")]),
                entry("second", &[("backup", "")]),
            ],
        ),
    );

    let filtered = filter(doc, &tags(&["exportme", "backup"]));

    assert_eq!(filtered.total_entries, 5);
    assert_eq!(entry_uuids(&filtered.document), vec!["any", "second"]);
}

#[test]
fn empty_tag_set_keeps_nothing() {
    let doc = document(
        Some("bin"),
        group("root", "Passwords", &[entry("a", &[("exportme", "")])]),
    );

    let filtered = filter(doc, &TagSet::new());

    assert_eq!(filtered.total_entries, 1);
    assert_eq!(filtered.exported_entries, 0);
    assert!(entry_uuids(&filtered.document).is_empty());
    assert!(filtered.document.root().child("DeletedObjects").is_some());
}

#[test]
fn filtering_twice_changes_nothing() {
    let doc = document(
        Some("bin"),
        group(
            "root",
            "Passwords",
            &[
                group("a", "A", &[entry("a1", &[("t", "")]), entry("a2", &[])]),
                group("bin", "Recycle Bin", &[entry("b1", &[("t", "")])]),
                entry("r1", &[("t", "")]),
            ],
        ),
    );
    let tags = tags(&["t"]);

    let once = filter(doc, &tags);
    assert!(once.exported_entries <= once.total_entries);

    let twice = filter(once.document.clone(), &tags);
    assert_eq!(twice.document, once.document);
    assert_eq!(twice.total_entries, once.exported_entries);
    assert_eq!(twice.exported_entries, once.exported_entries);
}

#[test]
fn retained_entries_keep_everything_else() {
    let doc = document(
        None,
        group(
            "root",
            "Passwords",
            &[entry("a", &[("Title", "mail &amp; more"), ("t", "")])],
        ),
    );

    let filtered = filter(doc, &tags(&["t"]));
    let root = filtered.document.groups().next().unwrap();
    let entry = root.entries().next().unwrap();

    assert!(entry.0.child("Times").is_some());
    assert_eq!(entry.title().as_deref(), Some("mail & more"));
    assert!(filtered.document.element().child("Meta").unwrap().child("Generator").is_some());
}

#[test]
fn serialized_output_keeps_indentation_tidy() {
    let xml = "<KeePassFile>\n\t<Meta>\n\t\t<RecycleBinUUID>bin</RecycleBinUUID>\n\t</Meta>\n\t<Root>\n\t\t<Group>\n\t\t\t<UUID>g</UUID>\n\t\t\t<Entry><UUID>a</UUID><String><Key>t</Key><Value/></String></Entry>\n\t\t\t<Entry><UUID>b</UUID></Entry>\n\t\t\t<Group><UUID>bin</UUID><Entry><UUID>c</UUID><String><Key>t</Key><Value/></String></Entry></Group>\n\t\t</Group>\n\t</Root>\n</KeePassFile>";
    let doc = Document::parse(xml).unwrap();

    let filtered = filter(doc, &tags(&["t"]));
    let bytes = filtered.document.to_bytes().unwrap();

    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        "<?xml version=\"1.0\" ?><KeePassFile>\n\t<Meta>\n\t\t</Meta>\n\t<Root>\n\t\t<Group>\n\t\t\t<UUID>g</UUID>\n\t\t\t<Entry><UUID>a</UUID><String><Key>t</Key><Value/></String></Entry>\n\t\t\t</Group>\n\t</Root>\n</KeePassFile>"
    );
}
