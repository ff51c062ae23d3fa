// Hyperlink runs wired to external relationships.

use crate::docx::{Container, DocumentBuilder};
use crate::format::{Rgb, RunFormat};
use crate::model::{Hyperlink, Run};

pub const LINK_COLOR: Rgb = Rgb(0x05, 0x63, 0xC1);

pub fn link_format() -> RunFormat {
    RunFormat {
        underline: true,
        color: Some(LINK_COLOR),
        ..RunFormat::default()
    }
}

const REFUSED_SCHEMES: [&str; 3] = ["javascript:", "data:", "vbscript:"];

/// The trimmed href when it can become an external relationship target.
/// Fragment-only hrefs point inside the source page and have no target in
/// the document.
pub fn link_target(href: &str) -> Option<&str> {
    let target = href.trim();
    let refused = REFUSED_SCHEMES.iter().any(|scheme| {
        target
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    });
    (!target.is_empty() && !target.starts_with('#') && !refused).then_some(target)
}

/// Appends a link-styled run to `parent`. A usable `href` allocates a new
/// relationship on every call; without one the run is styled text only.
pub fn emit_hyperlink(
    doc: &mut DocumentBuilder,
    parent: Container,
    text: &str,
    href: Option<&str>,
) {
    let mut run = Run::new(text, link_format());
    match href.and_then(link_target) {
        Some(target) => {
            let rel_id = doc.add_hyperlink_relationship(target);
            run.link = Some(Hyperlink {
                rel_id,
                target: target.to_string(),
            });
        }
        None => log::debug!("link {text:?} has no usable href, emitting styled text"),
    }
    doc.push_run(parent, run);
}
