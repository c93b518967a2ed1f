use std::io::{self, BufRead};

use brief_core::{BriefPayload, GenerationRequest};
use brief_logging::brief_warn;

const DEFAULT_TEMPLATE: &str = "pages";

/// Parses `page_id<TAB>url<TAB>title[<TAB>template]`.
///
/// Returns `None` for blank lines and for lines missing a page id or url.
pub fn parse_line(line: &str) -> Option<GenerationRequest> {
    let mut fields = line.trim_end_matches(['\r', '\n']).split('\t').map(str::trim);
    let page_id = fields.next().filter(|field| !field.is_empty())?;
    let url = fields.next().filter(|field| !field.is_empty())?;
    let title = fields.next().unwrap_or_default();
    let template = fields
        .next()
        .filter(|field| !field.is_empty())
        .unwrap_or(DEFAULT_TEMPLATE);

    Some(GenerationRequest::new(
        page_id,
        BriefPayload {
            title: title.to_string(),
            url: url.to_string(),
            slug: slug_from_url(url),
            template: template.to_string(),
            ..BriefPayload::default()
        },
    ))
}

/// Reads every parseable page, skipping the rest with a warning.
pub fn read_pages(reader: impl BufRead) -> io::Result<Vec<GenerationRequest>> {
    let mut pages = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Some(request) => pages.push(request),
            None => brief_warn!("skipping input line {}: expected page_id<TAB>url", index + 1),
        }
    }
    Ok(pages)
}

/// Last non-empty path segment of `url`.
fn slug_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let path = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    path.split('/')
        .skip(1)
        .filter(|segment| !segment.is_empty())
        .last()
        .unwrap_or_default()
        .to_string()
}
