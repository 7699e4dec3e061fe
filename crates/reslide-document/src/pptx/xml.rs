// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DrawingML shape fragments for slide shape trees.

use std::borrow::Cow;
use std::fmt::Write as _;

use quick_xml::escape::escape;
use reslide_core::style::{Alignment, TextStyle};

use crate::units::EmuRect;

/// Escape text for XML content or attribute values, dropping characters
/// XML 1.0 cannot carry.
pub fn esc(text: &str) -> Cow<'_, str> {
    if text.chars().any(|c| (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r')) {
        let cleaned: String = text
            .chars()
            .filter(|c| (*c as u32) >= 0x20 || matches!(c, '\t' | '\n' | '\r'))
            .collect();
        return Cow::Owned(escape(cleaned.as_str()).into_owned());
    }
    escape(text)
}

fn xfrm(rect: &EmuRect) -> String {
    format!(
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        rect.x, rect.y, rect.cx, rect.cy
    )
}

/// `#RRGGBB` → `RRGGBB`, black when malformed.
fn srgb(color_hex: &str) -> String {
    reslide_core::style::normalize_hex(color_hex)
        .map(|c| c.trim_start_matches('#').to_string())
        .unwrap_or_else(|| "000000".into())
}

fn algn(alignment: Alignment) -> &'static str {
    match alignment {
        Alignment::Left => "l",
        Alignment::Center => "ctr",
        Alignment::Right => "r",
        Alignment::Justify => "just",
    }
}

/// Everything a text box needs besides its geometry.
#[derive(Debug, Clone)]
pub struct TextBody<'a> {
    pub text: &'a str,
    pub style: &'a TextStyle,
    pub size_pt: f32,
    pub font_family: &'a str,
    pub line_spacing: f32,
    /// Overrides the style's alignment (table cells are centred).
    pub alignment: Option<Alignment>,
    /// Vertical anchor: `t`, `ctr` or `b`.
    pub anchor: &'static str,
}

struct RunProps<'a> {
    color_hex: &'a str,
    bold: bool,
    italic: bool,
    underline: bool,
}

fn run(xml: &mut String, text: &str, props: &RunProps<'_>, body: &TextBody<'_>) {
    let sz = ((body.size_pt * 100.0).round() as i64).clamp(100, 400_000);
    let _ = write!(
        xml,
        r#"<a:r><a:rPr lang="en-US" sz="{sz}" b="{}" i="{}" u="{}" dirty="0"><a:solidFill><a:srgbClr val="{}"/></a:solidFill><a:latin typeface="{font}"/><a:ea typeface="{font}"/><a:cs typeface="{font}"/></a:rPr><a:t>{}</a:t></a:r>"#,
        u8::from(props.bold),
        u8::from(props.italic),
        if props.underline { "sng" } else { "none" },
        srgb(props.color_hex),
        esc(text),
        font = esc(body.font_family),
    );
}

fn paragraph_open(xml: &mut String, body: &TextBody<'_>) {
    let alignment = body.alignment.unwrap_or(body.style.alignment);
    let spacing = (body.line_spacing * 100_000.0).round() as i64;
    let _ = write!(
        xml,
        r#"<a:p><a:pPr algn="{}"><a:lnSpc><a:spcPct val="{spacing}"/></a:lnSpc></a:pPr>"#,
        algn(alignment)
    );
}

fn paragraph_close(xml: &mut String, body: &TextBody<'_>) {
    let sz = ((body.size_pt * 100.0).round() as i64).clamp(100, 400_000);
    let _ = write!(xml, r#"<a:endParaRPr lang="en-US" sz="{sz}" dirty="0"/></a:p>"#);
}

fn text_paragraphs(body: &TextBody<'_>) -> String {
    let mut xml = String::new();
    let style = body.style;
    if style.is_mixed() {
        // Runs share one size; a newline inside a run starts a new paragraph.
        paragraph_open(&mut xml, body);
        for segment in &style.runs {
            let props = RunProps {
                color_hex: segment.color_hex.as_deref().unwrap_or(&style.color_hex),
                bold: segment.bold || style.bold,
                italic: segment.italic || style.italic,
                underline: style.underline,
            };
            let mut pieces = segment.text.split('\n').peekable();
            while let Some(piece) = pieces.next() {
                if !piece.is_empty() {
                    run(&mut xml, piece, &props, body);
                }
                if pieces.peek().is_some() {
                    paragraph_close(&mut xml, body);
                    paragraph_open(&mut xml, body);
                }
            }
        }
        paragraph_close(&mut xml, body);
    } else {
        let props = RunProps {
            color_hex: style
                .runs
                .first()
                .and_then(|r| r.color_hex.as_deref())
                .unwrap_or(&style.color_hex),
            bold: style.bold,
            italic: style.italic,
            underline: style.underline,
        };
        for line in body.text.split('\n') {
            paragraph_open(&mut xml, body);
            if !line.is_empty() {
                run(&mut xml, line, &props, body);
            }
            paragraph_close(&mut xml, body);
        }
    }
    xml
}

/// A borderless, zero-inset text box.
pub fn text_box(id: u32, name: &str, rect: &EmuRect, body: &TextBody<'_>) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/><a:ln><a:noFill/></a:ln></p:spPr><p:txBody><a:bodyPr wrap="square" lIns="0" tIns="0" rIns="0" bIns="0" anchor="{}" rtlCol="0"><a:noAutofit/></a:bodyPr><a:lstStyle/>{}</p:txBody></p:sp>"#,
        esc(name),
        xfrm(rect),
        body.anchor,
        text_paragraphs(body)
    )
}

/// A picture stretched over `rect`, referencing relationship `rid`.
pub fn picture(id: u32, name: &str, descr: &str, rect: &EmuRect, rid: &str) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="{}" descr="{}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{rid}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
        esc(name),
        esc(descr),
        xfrm(rect)
    )
}

/// Dashed outline marking an element that could not be placed.
pub fn placeholder(id: u32, name: &str, rect: &EmuRect) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr>{}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/><a:ln w="12700"><a:solidFill><a:srgbClr val="A6A6A6"/></a:solidFill><a:prstDash val="dash"/></a:ln></p:spPr></p:sp>"#,
        esc(name),
        xfrm(rect)
    )
}

/// Opening of a group shape whose child space equals slide space.
pub fn group_open(id: u32, name: &str, rect: &EmuRect) -> String {
    format!(
        r#"<p:grpSp><p:nvGrpSpPr><p:cNvPr id="{id}" name="{}"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/><a:chOff x="{x}" y="{y}"/><a:chExt cx="{cx}" cy="{cy}"/></a:xfrm></p:grpSpPr>"#,
        esc(name),
        x = rect.x,
        y = rect.y,
        cx = rect.cx,
        cy = rect.cy,
    )
}

pub const GROUP_CLOSE: &str = "</p:grpSp>";

/// Slide background filled with the picture behind `rid`.
pub fn picture_background(rid: &str) -> String {
    format!(
        r#"<p:bg><p:bgPr><a:blipFill dpi="0" rotWithShape="1"><a:blip r:embed="{rid}"/><a:srcRect/><a:stretch><a:fillRect/></a:stretch></a:blipFill><a:effectLst/></p:bgPr></p:bg>"#
    )
}

/// A complete slide part around `background` and `shapes`.
pub fn slide(background: Option<&str>, shapes: &str) -> String {
    use super::parts::{NS_A, NS_P, NS_R, XML_DECL};
    format!(
        r#"{XML_DECL}<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld>{}<p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        background.unwrap_or("")
    )
}

#[cfg(test)]
mod tests {
    use reslide_core::style::TextRun;

    use super::*;

    fn rect() -> EmuRect {
        EmuRect {
            x: 10,
            y: 20,
            cx: 300,
            cy: 400,
        }
    }

    fn body<'a>(text: &'a str, style: &'a TextStyle) -> TextBody<'a> {
        TextBody {
            text,
            style,
            size_pt: 24.0,
            font_family: "Arial",
            line_spacing: 1.2,
            alignment: None,
            anchor: "t",
        }
    }

    #[test]
    fn uniform_text_is_one_run_per_line() {
        let style = TextStyle {
            color_hex: "#ff0000".into(),
            bold: true,
            ..TextStyle::default()
        };
        let xml = text_box(2, "Text 1", &rect(), &body("a < b\nsecond", &style));
        assert_eq!(xml.matches("<a:r>").count(), 2);
        assert_eq!(xml.matches("<a:p>").count(), 2);
        assert!(xml.contains("a &lt; b"));
        assert!(xml.contains(r#"sz="2400" b="1""#));
        assert!(xml.contains(r#"<a:srgbClr val="FF0000"/>"#));
        assert!(xml.contains(r#"lIns="0" tIns="0" rIns="0" bIns="0""#));
    }

    #[test]
    fn mixed_runs_share_size_with_own_colour() {
        let style = TextStyle {
            runs: vec![
                TextRun {
                    text: "Red ".into(),
                    color_hex: Some("#FF0000".into()),
                    bold: false,
                    italic: false,
                },
                TextRun {
                    text: "blue".into(),
                    color_hex: Some("#0000FF".into()),
                    bold: false,
                    italic: true,
                },
            ],
            ..TextStyle::default()
        };
        let xml = text_box(3, "Text 2", &rect(), &body("Red blue", &style));
        assert_eq!(xml.matches("<a:r>").count(), 2);
        assert_eq!(xml.matches(r#"sz="2400""#).count(), 3);
        assert!(xml.contains(r#"i="1""#));
        assert!(xml.contains("0000FF"));
    }

    #[test]
    fn element_bold_and_italic_apply_to_every_run() {
        let style = TextStyle {
            bold: true,
            italic: true,
            runs: vec![
                TextRun {
                    text: "Q3 ".into(),
                    color_hex: Some("#333333".into()),
                    bold: false,
                    italic: false,
                },
                TextRun {
                    text: "revenue".into(),
                    color_hex: Some("#0000FF".into()),
                    bold: false,
                    italic: false,
                },
            ],
            ..TextStyle::default()
        };
        let xml = text_box(5, "Text 3", &rect(), &body("Q3 revenue", &style));
        assert_eq!(xml.matches(r#"b="1" i="1""#).count(), 2);
        assert!(!xml.contains(r#"i="0""#));
    }

    #[test]
    fn control_characters_are_dropped() {
        assert_eq!(esc("a\u{1}b&c"), "ab&amp;c");
        assert_eq!(esc("plain"), "plain");
    }

    #[test]
    fn group_child_space_matches_extent() {
        let xml = group_open(4, "Chart", &rect());
        assert!(xml.contains(r#"<a:chOff x="10" y="20"/><a:chExt cx="300" cy="400"/>"#));
        assert!(slide(None, &format!("{xml}{GROUP_CLOSE}")).contains("</p:grpSp></p:spTree>"));
    }
}
