use markbridge::placement::{PlacementOptions, PlacementTier, Table, place, table_blocks};

fn opts() -> PlacementOptions {
    PlacementOptions::default()
}

fn is_subsequence(original: &str, output: &str) -> bool {
    let mut out = output.lines();
    original.lines().all(|l| out.any(|o| o == l))
}

const PIPE_DOC: &str = "Intro\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\nAfter table.\n";

#[test]
fn no_tables_returns_document_unchanged() {
    for doc in ["", "\n", "plain", PIPE_DOC, "a\r\nb\n\n\n"] {
        let placed = place(doc, &[], &opts());
        assert_eq!(placed.markdown, doc);
        assert!(placed.records.is_empty());
    }
}

#[test]
fn tables_without_images_leave_document_unchanged() {
    let tables = vec![Table {
        index: 0,
        image: None,
        context_marker: Some("After".into()),
    }];
    let placed = place(PIPE_DOC, &tables, &opts());
    assert_eq!(placed.markdown, PIPE_DOC);
    assert_eq!(placed.skipped, 1);
}

#[test]
fn context_marker_places_image_before_its_line() {
    let doc = "# Report\n\nIntro text.\n\nQuarterly Report\nNumbers follow.\n";
    let tables = vec![Table::new(0, "doc/table_0.png").with_marker("Quarterly Report")];

    let placed = place(doc, &tables, &opts());

    assert_eq!(
        placed.markdown,
        "# Report\n\nIntro text.\n\n![Table 1](doc/table_0.png)\n\nQuarterly Report\nNumbers follow.\n"
    );
    assert_eq!(placed.anchored, 1);
    assert_eq!(placed.records[0].tier, PlacementTier::ContextAnchor);
    assert_eq!(placed.records[0].line, 4);
    assert_eq!(placed.records[0].anchor_line, Some(4));
}

#[test]
fn marker_in_middle_of_line_does_not_split_it() {
    let doc = "## Summary of Quarterly Report figures\n";
    let tables = vec![Table::new(0, "t.png").with_marker("Quarterly Report")];

    let placed = place(doc, &tables, &opts());

    assert_eq!(
        placed.markdown,
        "![Table 1](t.png)\n\n## Summary of Quarterly Report figures\n"
    );
}

#[test]
fn pipe_block_gets_image_right_after_it() {
    let tables = vec![Table::new(0, "t0.png")];

    let placed = place(PIPE_DOC, &tables, &opts());

    assert_eq!(
        placed.markdown,
        "Intro\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n![Table 1](t0.png)\n\nAfter table.\n"
    );
    let lines: Vec<&str> = placed.markdown.lines().collect();
    let after_block = lines[5..].iter().find(|l| !l.trim().is_empty());
    assert_eq!(after_block, Some(&"![Table 1](t0.png)"));
    assert_eq!(placed.block_placed, 1);
    assert_eq!(placed.records[0].tier, PlacementTier::TableBlock);
    assert_eq!(placed.records[0].anchor_line, Some(5));
}

#[test]
fn pipe_block_at_end_of_document() {
    let doc = "| a |\n|---|\n| 1 |";
    let placed = place(doc, &[Table::new(0, "t.png")], &opts());
    assert_eq!(placed.markdown, "| a |\n|---|\n| 1 |\n\n![Table 1](t.png)");
}

#[test]
fn unmatched_tables_go_to_trailer_in_index_order() {
    let doc = "Just text.\nMore text.";
    let tables = vec![
        Table::new(1, "b.png"),
        Table::new(0, "a.png").with_marker("not in the document"),
    ];

    let placed = place(doc, &tables, &opts());

    assert_eq!(
        placed.markdown,
        "Just text.\nMore text.\n\n## Table Images\n\n![Table 1](a.png)\n\n![Table 2](b.png)"
    );
    assert_eq!(placed.appended, 2);
    assert!(
        placed
            .records
            .iter()
            .all(|r| r.tier == PlacementTier::Trailer && r.anchor_line.is_none())
    );
}

#[test]
fn shared_marker_anchors_only_once() {
    let doc = "Alpha\n\nShared marker line\n\nOmega\n";
    let tables = vec![
        Table::new(0, "t0.png").with_marker("Shared marker"),
        Table::new(1, "t1.png").with_marker("Shared marker"),
    ];

    let placed = place(doc, &tables, &opts());

    assert_eq!(
        placed.markdown,
        "Alpha\n\n![Table 1](t0.png)\n\nShared marker line\n\nOmega\n\n## Table Images\n\n![Table 2](t1.png)\n"
    );
    assert_eq!(placed.anchored, 1);
    assert_eq!(placed.appended, 1);
}

#[test]
fn repeated_marker_text_resolves_in_index_order() {
    let doc = "Total\n\nText A\n\nTotal\n";
    let tables = vec![
        Table::new(1, "t1.png").with_marker("Total"),
        Table::new(0, "t0.png").with_marker("Total"),
    ];

    let placed = place(doc, &tables, &opts());

    assert_eq!(
        placed.markdown,
        "![Table 1](t0.png)\n\nTotal\n\nText A\n\n![Table 2](t1.png)\n\nTotal\n"
    );
}

#[test]
fn blank_marker_falls_through_to_table_block() {
    let tables = vec![Table::new(0, "t0.png").with_marker("   ")];
    let placed = place(PIPE_DOC, &tables, &opts());
    assert_eq!(placed.records[0].tier, PlacementTier::TableBlock);
}

#[test]
fn anchored_table_claims_its_block() {
    let doc = "Intro\n\n| a |\n|---|\n| 1 |\n\nAfter first.\n\n| b |\n|---|\n| 2 |\n";
    let tables = vec![
        Table::new(0, "t0.png").with_marker("After first."),
        Table::new(1, "t1.png"),
    ];

    let placed = place(doc, &tables, &opts());

    assert_eq!(
        placed.markdown,
        "Intro\n\n| a |\n|---|\n| 1 |\n\n![Table 1](t0.png)\n\nAfter first.\n\n| b |\n|---|\n| 2 |\n\n![Table 2](t1.png)\n"
    );
    assert_eq!(placed.anchored, 1);
    assert_eq!(placed.block_placed, 1);
}

#[test]
fn marker_inside_pipe_table_anchors_before_the_table() {
    let doc = "Intro\n\n| Revenue | 10 |\n|---|---|\n| Cost | 5 |\n\nEnd\n";
    let tables = vec![
        Table::new(0, "t0.png").with_marker("Cost"),
        Table::new(1, "t1.png"),
    ];

    let placed = place(doc, &tables, &opts());

    assert!(
        placed
            .markdown
            .contains("![Table 1](t0.png)\n\n| Revenue | 10 |\n|---|---|\n| Cost | 5 |\n")
    );
    assert_eq!(placed.records[0].anchor_line, Some(2));
    // The block already holds table 1, so table 2 goes to the trailer.
    assert_eq!(placed.block_placed, 0);
    assert_eq!(placed.appended, 1);
}

#[test]
fn skipped_tables_do_not_consume_blocks() {
    let tables = vec![
        Table {
            index: 0,
            image: None,
            context_marker: None,
        },
        Table::new(1, "b.png"),
    ];

    let placed = place(PIPE_DOC, &tables, &opts());

    assert!(placed.markdown.contains("| 1 | 2 |\n\n![Table 2](b.png)\n"));
    assert_eq!(placed.skipped, 1);
    assert_eq!(placed.summary().placed, 1);
}

#[test]
fn every_image_appears_once_and_original_order_is_kept() {
    let doc = "Title\n\n| x |\n|---|\n\nMiddle paragraph\n\n| y |\n|---|\n| 9 |\nTrailing text\n";
    let tables = vec![
        Table::new(0, "img/t0.png"),
        Table::new(1, "img/t1.png").with_marker("Trailing text"),
        Table::new(2, "img/t2.png"),
        Table::new(3, "img/t3.png").with_marker("nowhere"),
    ];

    let placed = place(doc, &tables, &opts());

    for t in &tables {
        let path = t.image.as_deref().unwrap();
        assert_eq!(placed.markdown.matches(path).count(), 1, "{path}");
    }
    assert_eq!(placed.markdown.matches("![").count(), 4);
    assert!(is_subsequence(doc, &placed.markdown));
    assert_eq!(placed.records.len(), 4);
    assert_eq!(
        placed.anchored + placed.block_placed + placed.appended,
        tables.len()
    );
}

#[test]
fn records_point_at_image_lines() {
    let doc = "Intro\n\n| a |\n|---|\n\nQuarterly Report\n\n| b |\n|---|\n";
    let tables = vec![
        Table::new(0, "t0.png"),
        Table::new(1, "t1.png").with_marker("Quarterly Report"),
        Table::new(2, "t2.png"),
        Table::new(3, "t3.png"),
    ];

    let placed = place(doc, &tables, &opts());
    let lines: Vec<&str> = placed.markdown.lines().collect();

    for r in &placed.records {
        let expected = format!("![Table {}](t{}.png)", r.table_index + 1, r.table_index);
        assert_eq!(lines[r.line], expected);
    }
}

#[test]
fn empty_document_gets_trailer_only() {
    let placed = place("", &[Table::new(0, "t.png")], &opts());
    assert_eq!(placed.markdown, "## Table Images\n\n![Table 1](t.png)");
}

#[test]
fn custom_labels_are_used() {
    let opts = PlacementOptions {
        alt_label: "表".into(),
        trailer_heading: "## 表の画像".into(),
    };
    let placed = place("本文", &[Table::new(2, "t.png")], &opts);
    assert_eq!(placed.markdown, "本文\n\n## 表の画像\n\n![表 3](t.png)");
}

#[test]
fn table_blocks_tolerate_leading_whitespace() {
    let lines = ["text", "  | a |", "  |---|", "", "| b |"];
    let blocks = table_blocks(&lines);
    assert_eq!(blocks.len(), 2);
    assert_eq!((blocks[0].start, blocks[0].end), (1, 3));
    assert_eq!((blocks[1].start, blocks[1].end), (4, 5));
}

#[test]
fn anchor_on_next_block_does_not_claim_previous_block() {
    let doc = "| a |\n|---|\n| 1 |\n\n| Beta |\n|---|\n| 2 |\n";
    let tables = vec![Table::new(0, "t0.png"), Table::new(1, "t1.png").with_marker("Beta")];

    let placed = place(doc, &tables, &opts());

    assert_eq!(
        placed.markdown,
        "| a |\n|---|\n| 1 |\n\n![Table 1](t0.png)\n\n![Table 2](t1.png)\n\n| Beta |\n|---|\n| 2 |\n"
    );
    assert_eq!(placed.block_placed, 1);
    assert_eq!(placed.anchored, 1);
    assert_eq!(placed.appended, 0);
}

#[test]
fn marker_directly_under_table_keeps_table_intact() {
    let doc = "| a |\n|---|\nAfter\n";
    let tables = vec![Table::new(0, "t0.png").with_marker("After"), Table::new(1, "t1.png")];

    let placed = place(doc, &tables, &opts());

    assert_eq!(
        placed.markdown,
        "| a |\n|---|\n\n![Table 1](t0.png)\n\nAfter\n\n## Table Images\n\n![Table 2](t1.png)\n"
    );
    assert_eq!(table_blocks(&placed.markdown.lines().collect::<Vec<_>>()).len(), 1);
}

#[test]
fn crlf_documents_keep_crlf() {
    let doc = "Intro\r\n\r\n| a |\r\n|---|\r\n\r\nEnd\r\n";

    let placed = place(doc, &[Table::new(0, "t0.png")], &opts());
    assert_eq!(
        placed.markdown,
        "Intro\r\n\r\n| a |\r\n|---|\r\n\r\n![Table 1](t0.png)\r\n\r\nEnd\r\n"
    );

    let tables = vec![
        Table::new(0, "t0.png").with_marker("End"),
        Table::new(1, "t1.png").with_marker("missing"),
    ];
    let placed = place(doc, &tables, &opts());
    assert!(!placed.markdown.replace("\r\n", "").contains('\n'));
    assert!(placed.markdown.contains("![Table 1](t0.png)\r\n\r\nEnd\r\n"));
    assert!(placed.markdown.ends_with("## Table Images\r\n\r\n![Table 2](t1.png)\r\n"));
}
