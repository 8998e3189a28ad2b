use std::fmt::Write;

use anyhow::Result;

use crate::layout::TreeLayout;
use crate::person::{Gender, Person, parse_person_date};
use crate::utils::escape_xml;

pub const NODE_WIDTH: f32 = 140.0;
pub const NODE_HEIGHT: f32 = 48.0;
pub const DEFAULT_BACKGROUND: &str = "#fafafa";

const MALE_FILL: &str = "#e6f2ff";
const FEMALE_FILL: &str = "#ffe6f0";
const OTHER_FILL: &str = "#fff";
const CENTER_STROKE: &str = "#f59e0b";
const NODE_STROKE: &str = "#3b82f6";
const LINK_STROKE: &str = "#999";

/// Render a computed layout as a standalone SVG document. Edges are
/// drawn first so nodes paint on top of them.
pub fn render_svg(layout: &TreeLayout, center_id: &str, background: &str) -> Result<String> {
    let mut svg = String::new();

    write!(
        svg,
        r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{w:.0}" height="{h:.0}" viewBox="0 0 {w:.0} {h:.0}" font-family="Inter, system-ui, sans-serif">
  <rect width="100%" height="100%" fill="{bg}" />
"##,
        w = layout.width,
        h = layout.height,
        bg = escape_xml(background),
    )?;

    for link in &layout.links {
        let mid_y = (link.from.y + link.to.y) / 2.0;
        writeln!(
            svg,
            r#"  <path d="M {x1:.1} {y1:.1} C {x1:.1} {m:.1}, {x2:.1} {m:.1}, {x2:.1} {y2:.1}" fill="none" stroke="{stroke}" stroke-width="1.2" />"#,
            x1 = link.from.x,
            y1 = link.from.y,
            x2 = link.to.x,
            y2 = link.to.y,
            m = mid_y,
            stroke = LINK_STROKE,
        )?;
    }

    for node in &layout.nodes {
        let person = &node.person;
        let fill = match person.gender {
            Gender::Male => MALE_FILL,
            Gender::Female => FEMALE_FILL,
            Gender::Other => OTHER_FILL,
        };
        let (stroke, stroke_width) = if person.person_id == center_id {
            (CENTER_STROKE, 2.0)
        } else {
            (NODE_STROKE, 1.0)
        };
        let text_color = if person.is_deceased() { "red" } else { "#000" };
        let left = node.x - NODE_WIDTH / 2.0;
        let top = node.y - NODE_HEIGHT / 2.0;

        writeln!(svg, r#"  <g transform="translate({left:.1}, {top:.1})">"#)?;
        writeln!(
            svg,
            r#"    <rect width="{NODE_WIDTH:.0}" height="{NODE_HEIGHT:.0}" rx="6" fill="{fill}" stroke="{stroke}" stroke-width="{stroke_width:.0}" />"#,
        )?;
        writeln!(
            svg,
            r#"    <text x="10" y="18" font-size="12" font-weight="600" fill="{text_color}">{}</text>"#,
            escape_xml(&person.full_name()),
        )?;
        writeln!(
            svg,
            r#"    <text x="10" y="36" font-size="11" fill="{text_color}">{}</text>"#,
            escape_xml(&life_dates(person)),
        )?;
        writeln!(svg, "  </g>")?;
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Second text line of a node: birth date, plus the death date when
/// one is recorded. Unparseable fields are left off the canvas.
fn life_dates(person: &Person) -> String {
    let dob = person
        .dob
        .as_deref()
        .filter(|raw| parse_person_date(raw).is_some())
        .unwrap_or("");
    match person
        .dod
        .as_deref()
        .filter(|raw| parse_person_date(raw).is_some())
    {
        Some(dod) => format!("{dob} \u{2014} {dod}"),
        None => dob.to_string(),
    }
}
