// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fixed and templated package parts of a presentation: content types,
// relationships, presentation, master, layout, theme, and document properties.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};

use super::xml::esc;

pub const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

pub const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
pub const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub const REL_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";

/// Content types for the package; `media_extensions` lists every image
/// extension present under `ppt/media`.
pub fn content_types(slide_count: usize, media_extensions: &[&str]) -> String {
    let mut xml = String::from(XML_DECL);
    xml.push_str(
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    );
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    for ext in media_extensions {
        let mime = match *ext {
            "jpeg" | "jpg" => "image/jpeg",
            "gif" => "image/gif",
            _ => "image/png",
        };
        let _ = write!(xml, r#"<Default Extension="{ext}" ContentType="{mime}"/>"#);
    }
    let overrides = [
        ("/ppt/presentation.xml", "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"),
        ("/ppt/slideMasters/slideMaster1.xml", "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"),
        ("/ppt/slideLayouts/slideLayout1.xml", "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"),
        ("/ppt/theme/theme1.xml", "application/vnd.openxmlformats-officedocument.theme+xml"),
        ("/ppt/presProps.xml", "application/vnd.openxmlformats-officedocument.presentationml.presProps+xml"),
        ("/ppt/viewProps.xml", "application/vnd.openxmlformats-officedocument.presentationml.viewProps+xml"),
        ("/ppt/tableStyles.xml", "application/vnd.openxmlformats-officedocument.presentationml.tableStyles+xml"),
        ("/docProps/core.xml", "application/vnd.openxmlformats-package.core-properties+xml"),
        ("/docProps/app.xml", "application/vnd.openxmlformats-officedocument.extended-properties+xml"),
    ];
    for (part, ty) in overrides {
        let _ = write!(xml, r#"<Override PartName="{part}" ContentType="{ty}"/>"#);
    }
    for n in 1..=slide_count {
        let _ = write!(
            xml,
            r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
        );
    }
    xml.push_str("</Types>");
    xml
}

/// A relationships part from `(id, type, target)` triples.
pub fn relationships(entries: &[(String, &str, String)]) -> String {
    let mut xml = String::from(XML_DECL);
    xml.push_str(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (id, ty, target) in entries {
        let _ = write!(
            xml,
            r#"<Relationship Id="{id}" Type="{ty}" Target="{}"/>"#,
            esc(target)
        );
    }
    xml.push_str("</Relationships>");
    xml
}

pub fn root_rels() -> String {
    relationships(&[
        (
            "rId1".into(),
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument",
            "ppt/presentation.xml".into(),
        ),
        (
            "rId2".into(),
            "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties",
            "docProps/core.xml".into(),
        ),
        (
            "rId3".into(),
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties",
            "docProps/app.xml".into(),
        ),
    ])
}

/// `presentation.xml`. Relationship ids: rId1 master, rId2.. slides, then
/// theme, presProps, viewProps, tableStyles (see [`presentation_rels`]).
pub fn presentation(slide_count: usize, width_emu: i64, height_emu: i64) -> String {
    let mut xml = String::from(XML_DECL);
    let _ = write!(
        xml,
        r#"<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1">"#
    );
    xml.push_str(r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#);
    xml.push_str("<p:sldIdLst>");
    for n in 0..slide_count {
        let _ = write!(xml, r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + n, 2 + n);
    }
    xml.push_str("</p:sldIdLst>");
    let _ = write!(xml, r#"<p:sldSz cx="{width_emu}" cy="{height_emu}"/>"#);
    xml.push_str(r#"<p:notesSz cx="6858000" cy="9144000"/>"#);
    xml.push_str("</p:presentation>");
    xml
}

pub fn presentation_rels(slide_count: usize) -> String {
    let mut entries = vec![(
        "rId1".to_string(),
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster",
        "slideMasters/slideMaster1.xml".to_string(),
    )];
    for n in 0..slide_count {
        entries.push((format!("rId{}", 2 + n), REL_SLIDE, format!("slides/slide{}.xml", n + 1)));
    }
    let next = 2 + slide_count;
    for (offset, (ty, target)) in [
        ("http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme", "theme/theme1.xml"),
        ("http://schemas.openxmlformats.org/officeDocument/2006/relationships/presProps", "presProps.xml"),
        ("http://schemas.openxmlformats.org/officeDocument/2006/relationships/viewProps", "viewProps.xml"),
        ("http://schemas.openxmlformats.org/officeDocument/2006/relationships/tableStyles", "tableStyles.xml"),
    ]
    .into_iter()
    .enumerate()
    {
        entries.push((format!("rId{}", next + offset), ty, target.to_string()));
    }
    relationships(&entries)
}

const EMPTY_SHAPE_TREE: &str = r#"<p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree></p:cSld>"#;

pub fn slide_master() -> String {
    let mut xml = String::from(XML_DECL);
    let _ = write!(xml, r#"<p:sldMaster xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}">"#);
    xml.push_str(EMPTY_SHAPE_TREE);
    xml.push_str(r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#);
    xml.push_str(r#"<p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst>"#);
    xml.push_str("<p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles>");
    xml.push_str("</p:sldMaster>");
    xml
}

pub fn slide_master_rels() -> String {
    relationships(&[
        ("rId1".into(), REL_LAYOUT, "../slideLayouts/slideLayout1.xml".into()),
        (
            "rId2".into(),
            "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme",
            "../theme/theme1.xml".into(),
        ),
    ])
}

pub fn slide_layout() -> String {
    let mut xml = String::from(XML_DECL);
    let _ = write!(
        xml,
        r#"<p:sldLayout xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" type="blank" preserve="1">"#
    );
    xml.push_str(&EMPTY_SHAPE_TREE.replace("<p:cSld>", r#"<p:cSld name="Blank">"#));
    xml.push_str(r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#);
    xml
}

pub fn slide_layout_rels() -> String {
    relationships(&[(
        "rId1".into(),
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster",
        "../slideMasters/slideMaster1.xml".into(),
    )])
}

/// Minimal Office theme; `font` becomes the major and minor Latin face.
pub fn theme(font: &str) -> String {
    let font = esc(font);
    let mut xml = String::from(XML_DECL);
    let _ = write!(xml, r#"<a:theme xmlns:a="{NS_A}" name="Reslide">"#);
    xml.push_str(r#"<a:themeElements><a:clrScheme name="Reslide">"#);
    for (slot, value) in [
        ("dk1", r#"<a:sysClr val="windowText" lastClr="000000"/>"#),
        ("lt1", r#"<a:sysClr val="window" lastClr="FFFFFF"/>"#),
        ("dk2", r#"<a:srgbClr val="44546A"/>"#),
        ("lt2", r#"<a:srgbClr val="E7E6E6"/>"#),
        ("accent1", r#"<a:srgbClr val="4472C4"/>"#),
        ("accent2", r#"<a:srgbClr val="ED7D31"/>"#),
        ("accent3", r#"<a:srgbClr val="A5A5A5"/>"#),
        ("accent4", r#"<a:srgbClr val="FFC000"/>"#),
        ("accent5", r#"<a:srgbClr val="5B9BD5"/>"#),
        ("accent6", r#"<a:srgbClr val="70AD47"/>"#),
        ("hlink", r#"<a:srgbClr val="0563C1"/>"#),
        ("folHlink", r#"<a:srgbClr val="954F72"/>"#),
    ] {
        let _ = write!(xml, "<a:{slot}>{value}</a:{slot}>");
    }
    xml.push_str("</a:clrScheme>");
    let _ = write!(
        xml,
        r#"<a:fontScheme name="Reslide"><a:majorFont><a:latin typeface="{font}"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="{font}"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme>"#
    );
    let solid = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let line = r#"<a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#;
    let _ = write!(
        xml,
        r#"<a:fmtScheme name="Reslide"><a:fillStyleLst>{solid}{solid}{solid}</a:fillStyleLst><a:lnStyleLst>{line}{line}{line}</a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst>{solid}{solid}{solid}</a:bgFillStyleLst></a:fmtScheme>"#
    );
    xml.push_str("</a:themeElements></a:theme>");
    xml
}

pub fn pres_props() -> String {
    format!(r#"{XML_DECL}<p:presentationPr xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"/>"#)
}

pub fn view_props() -> String {
    format!(
        r#"{XML_DECL}<p:viewPr xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:normalViewPr/><p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#
    )
}

pub fn table_styles() -> String {
    format!(
        r#"{XML_DECL}<a:tblStyleLst xmlns:a="{NS_A}" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#
    )
}

pub fn core_props(title: &str, created: DateTime<Utc>) -> String {
    let stamp = created.to_rfc3339_opts(SecondsFormat::Secs, true);
    format!(
        r#"{XML_DECL}<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>{}</dc:title><dc:creator>Reslide</dc:creator><dcterms:created xsi:type="dcterms:W3CDTF">{stamp}</dcterms:created><dcterms:modified xsi:type="dcterms:W3CDTF">{stamp}</dcterms:modified></cp:coreProperties>"#,
        esc(title)
    )
}

pub fn app_props(slide_count: usize) -> String {
    format!(
        r#"{XML_DECL}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>Reslide</Application><Slides>{slide_count}</Slides><PresentationFormat>Custom</PresentationFormat></Properties>"#
    )
}

/// Relationship ids of a slide: rId1 is always the layout.
pub fn slide_rels(media: &[String]) -> String {
    let mut entries = vec![("rId1".to_string(), REL_LAYOUT, "../slideLayouts/slideLayout1.xml".to_string())];
    for (i, name) in media.iter().enumerate() {
        entries.push((format!("rId{}", i + 2), REL_IMAGE, format!("../media/{name}")));
    }
    relationships(&entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presentation_lists_every_slide() {
        let xml = presentation(3, 18_288_000, 10_287_000);
        assert_eq!(xml.matches("<p:sldId ").count(), 3);
        assert!(xml.contains(r#"r:id="rId4""#));
        assert!(xml.contains(r#"<p:sldSz cx="18288000" cy="10287000"/>"#));
        let rels = presentation_rels(3);
        assert!(rels.contains(r#"Target="slides/slide3.xml""#));
        assert!(rels.contains(r#"Id="rId5""#));
        assert!(rels.starts_with(XML_DECL));
    }

    #[test]
    fn content_types_cover_media_and_slides() {
        let xml = content_types(2, &["png", "jpeg"]);
        assert!(xml.contains(r#"Extension="jpeg" ContentType="image/jpeg""#));
        assert!(xml.contains("/ppt/slides/slide2.xml"));
        assert!(!xml.contains("/ppt/slides/slide3.xml"));
    }

    #[test]
    fn theme_escapes_font_name() {
        assert!(theme("A&B").contains(r#"typeface="A&amp;B""#));
    }
}
