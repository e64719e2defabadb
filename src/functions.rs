//! Built-in page functions
//!
//! The binary picks one of these by name from `[extraction] page-function`.
//! Applications embedding the crate pass their own `PageFunction` instead.

use crate::crawler::{page_function_fn, ExtractionContext, PageFunction};
use crate::ConfigError;
use serde_json::{json, Value};
use std::sync::Arc;

/// Names and descriptions of the built-in page functions
pub const BUILTIN_PAGE_FUNCTIONS: &[(&str, &str)] = &[
    ("page-title", "URL, status and <title> of every page"),
    ("headings", "URL and the text of every h1-h6 heading"),
    ("links", "URL and every absolute link target on the page"),
];

/// Looks up a built-in page function by name
pub fn builtin_page_function(name: &str) -> Result<Arc<dyn PageFunction>, ConfigError> {
    match name.trim() {
        "page-title" => Ok(page_function_fn(page_title)),
        "headings" => Ok(page_function_fn(headings)),
        "links" => Ok(page_function_fn(links)),
        other => Err(ConfigError::UnknownPageFunction(other.to_string())),
    }
}

fn page_title(ctx: &ExtractionContext) -> anyhow::Result<Option<Value>> {
    let title = ctx.select("title")?.into_iter().find(|t| !t.is_empty());
    Ok(Some(json!({
        "url": ctx.url().as_str(),
        "status": ctx.response().status.as_u16(),
        "title": title,
    })))
}

fn headings(ctx: &ExtractionContext) -> anyhow::Result<Option<Value>> {
    let document = ctx.html();
    let selector = scraper::Selector::parse("h1, h2, h3, h4, h5, h6")
        .map_err(|e| anyhow::anyhow!("heading selector: {:?}", e))?;

    let headings: Vec<Value> = document
        .select(&selector)
        .map(|el| {
            let text = el.text().collect::<String>();
            json!({
                "level": el.value().name(),
                "text": text.split_whitespace().collect::<Vec<_>>().join(" "),
            })
        })
        .collect();

    Ok(Some(json!({
        "url": ctx.url().as_str(),
        "headings": headings,
    })))
}

fn links(ctx: &ExtractionContext) -> anyhow::Result<Option<Value>> {
    let links: Vec<String> = ctx
        .select_attr("a[href]", "href")?
        .iter()
        .filter_map(|href| ctx.url().join(href.trim()).ok())
        .filter(crate::url::is_fetchable_scheme)
        .map(|url| url.to_string())
        .collect();

    Ok(Some(json!({
        "url": ctx.url().as_str(),
        "links": links,
    })))
}
