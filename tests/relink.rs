use markbridge::relink::{quote, relative_link, relativize_image_links};
use std::path::Path;

#[test]
fn absolute_links_under_md_dir_become_relative_and_escaped() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("doc_images");
    std::fs::create_dir_all(&images).unwrap();
    let img = images.join("fig 1.png");
    std::fs::write(&img, b"png").unwrap();

    let md = format!("Intro\n\n![Figure one]({})\n\nDone\n", img.display());
    let (out, n) = relativize_image_links(&md, dir.path(), true);

    assert_eq!(n, 1);
    assert_eq!(out, "Intro\n\n![Figure one](doc_images/fig%201.png)\n\nDone\n");
}

#[test]
fn missing_targets_are_left_alone_when_required() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("img").join("gone.png");
    let md = format!("![x]({})", missing.display());

    let (out, n) = relativize_image_links(&md, dir.path(), true);
    assert_eq!(n, 0);
    assert_eq!(out, md);

    let (out, n) = relativize_image_links(&md, dir.path(), false);
    assert_eq!(n, 1);
    assert_eq!(out, "![x](img/gone.png)");
}

#[test]
fn targets_outside_md_dir_are_left_alone() {
    let md_dir = tempfile::tempdir().unwrap();
    let other = tempfile::tempdir().unwrap();
    let img = other.path().join("a.png");
    std::fs::write(&img, b"png").unwrap();

    let md = format!("![a]({})", img.display());
    let (out, n) = relativize_image_links(&md, md_dir.path(), true);
    assert_eq!(n, 0);
    assert_eq!(out, md);
}

#[test]
fn relative_and_remote_targets_are_untouched() {
    let md = "![a](images/a.png) ![b](https://example.com/b.png) ![](data:image/png;base64,AAAA)";
    let (out, n) = relativize_image_links(md, Path::new("/tmp"), false);
    assert_eq!(n, 0);
    assert_eq!(out, md);
}

#[test]
fn relative_link_requires_containment() {
    let base = Path::new("/work/out");
    assert_eq!(
        relative_link(base, Path::new("/work/out/report/table_0.png")).as_deref(),
        Some("report/table_0.png")
    );
    assert_eq!(relative_link(base, Path::new("/work/other/x.png")), None);
    assert_eq!(relative_link(base, Path::new("/work/out")), None);
}

#[test]
fn quote_escapes_outside_unreserved_set() {
    assert_eq!(quote("table_0-a.png~"), "table_0-a.png~");
    assert_eq!(quote("fig 1.png"), "fig%201.png");
    assert_eq!(quote("a(b)#c"), "a%28b%29%23c");
    assert_eq!(quote("表.png"), "%E8%A1%A8.png");
}
