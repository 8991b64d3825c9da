//! Sitemap items and their `<param>` values

use std::io::{Read, Seek};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::markup::Element;
use super::{MAX_MERGE_DEPTH, Sitemap};
use crate::container::Chm;
use crate::directory::Entry;
use crate::error::{Error, Result};
use crate::map::ChmMap;

/// Value of a `Merge` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Merge {
    /// `X.chm::/path`: a sitemap stored in another container.
    Reference {
        /// Container name, as written (for example `B.chm`).
        container: String,
        /// `/`-rooted entry path inside that container.
        entry: String,
    },
    /// Any other non-empty value, kept verbatim.
    Other(String),
}

impl Merge {
    fn parse(value: &str) -> Self {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"(?i)^([^:\\/]+\.chm)::(.+)$").expect("valid regex")
        });
        match pattern.captures(value) {
            Some(captures) => Merge::Reference {
                container: captures[1].to_string(),
                entry: format!("/{}", captures[2].replace('\\', "/").trim_start_matches('/')),
            },
            None => Merge::Other(value.to_string()),
        }
    }
}

/// One node of a table of contents or keyword index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SitemapItem {
    pub name: String,
    pub is_new: bool,
    pub comment: String,
    pub keyword: String,
    pub see_also: String,
    /// `/`-rooted path of the topic inside the container, or empty.
    pub local: String,
    pub url: String,
    pub frame_name: String,
    pub window_name: String,
    pub merge: Option<Merge>,
    pub image_number: Option<i64>,
    /// Name (in the [`ChmMap`]) of the container this item was merged
    /// from; `None` for items of the container the sitemap was read from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub children: Vec<SitemapItem>,
}

impl SitemapItem {
    /// Read an item from the `<param>` children of a sitemap `<object>`.
    pub(crate) fn from_object(object: &Element) -> Result<Self> {
        let mut item = Self::default();
        for param in object.children_named("param") {
            let raw_name = param.attribute("name").unwrap_or_default().trim();
            let value = param.attribute("value").unwrap_or_default().trim();
            match raw_name.to_lowercase().as_str() {
                // Repeated names are allowed; the last one wins
                "name" => item.name = value.to_string(),
                "new" => item.is_new = !value.is_empty(),
                "comment" => item.comment = value.to_string(),
                "keyword" => item.keyword = value.to_string(),
                "see also" => item.see_also = value.to_string(),
                "local" => {
                    item.local = format!("/{}", value.replace("%20", " ").replace('\\', "/"));
                }
                "url" => item.url = value.to_string(),
                "framename" => item.frame_name = value.to_string(),
                "windowname" => item.window_name = value.to_string(),
                "merge" => {
                    if !value.is_empty() {
                        item.merge = Some(Merge::parse(value));
                    }
                }
                "imagenumber" => {
                    if !value.is_empty() {
                        item.image_number = Some(parse_image_number(value).ok_or_else(|| {
                            Error::InvalidSitemap(format!(
                                "invalid value of the '{raw_name}' attribute: {value}"
                            ))
                        })?);
                    }
                }
                _ => {
                    return Err(Error::InvalidSitemap(format!(
                        "unknown parameter name '{raw_name}' of a tree item (value: '{value}')"
                    )));
                }
            }
        }
        Ok(item)
    }

    /// The cross-container reference of this item, if any.
    pub fn merge_reference(&self) -> Option<(&str, &str)> {
        match &self.merge {
            Some(Merge::Reference { container, entry }) => Some((container, entry)),
            _ => None,
        }
    }

    /// The file entry this item's `local` path points at.
    ///
    /// A path with a `#fragment` that does not match an entry is retried
    /// without the fragment.
    pub fn find_entry<'c, R: Read + Seek>(&self, chm: &'c Chm<R>) -> Option<&'c Entry> {
        if self.local.is_empty() {
            return None;
        }
        let path = format!("/{}", self.local.replace('\\', "/").trim_start_matches('/'));
        let entry = chm.entry(&path).or_else(|| {
            let (without_fragment, _) = path.split_once('#')?;
            chm.entry(without_fragment)
        })?;
        entry.is_file().then_some(entry)
    }

    /// Every item of this subtree, depth first, with its depth below `self`.
    pub fn walk(&self) -> Vec<(usize, &SitemapItem)> {
        let mut out = Vec::new();
        collect(self, 0, &mut out);
        out
    }

    fn set_origin(&mut self, origin: &str) {
        if self.origin.is_none() {
            self.origin = Some(origin.to_string());
        }
        for child in &mut self.children {
            child.set_origin(origin);
        }
    }
}

fn collect<'a>(item: &'a SitemapItem, depth: usize, out: &mut Vec<(usize, &'a SitemapItem)>) {
    out.push((depth, item));
    for child in &item.children {
        collect(child, depth + 1, out);
    }
}

/// Integer part of a numeric value (`12`, `+4`, `2.0`, `1e2`).
fn parse_image_number(value: &str) -> Option<i64> {
    if let Ok(number) = value.parse::<i64>() {
        return Some(number);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .map(|number| number.trunc() as i64)
}

/// Replace merge references with the items they point at.
///
/// Children of every resulting item are resolved too. `lenient` turns a
/// missing container or entry into a no-op that keeps the referencing item.
pub(crate) fn resolve_items<R: Read + Seek>(
    items: Vec<SitemapItem>,
    map: &ChmMap<R>,
    lenient: bool,
    depth: usize,
) -> Result<Vec<SitemapItem>> {
    let mut resolved = Vec::with_capacity(items.len());
    for mut item in items {
        let target = match item.merge_reference() {
            Some((container, entry)) => load_reference(map, container, entry, lenient)?,
            None => None,
        };
        match target {
            Some((origin, sitemap)) => {
                if depth >= MAX_MERGE_DEPTH {
                    return Err(Error::InvalidSitemap(format!(
                        "merge references nested deeper than {MAX_MERGE_DEPTH} levels"
                    )));
                }
                let mut merged = sitemap.into_items();
                for merged_item in &mut merged {
                    merged_item.set_origin(&origin);
                }
                resolved.extend(resolve_items(merged, map, lenient, depth + 1)?);
            }
            None => {
                let children = std::mem::take(&mut item.children);
                item.children = resolve_items(children, map, lenient, depth)?;
                resolved.push(item);
            }
        }
    }
    Ok(resolved)
}

/// Parse the sitemap a merge reference points at.
fn load_reference<R: Read + Seek>(
    map: &ChmMap<R>,
    container: &str,
    entry: &str,
    lenient: bool,
) -> Result<Option<(String, Sitemap)>> {
    let Some((name, chm)) = map.get_key_value(container) else {
        if lenient {
            tracing::warn!("Merge target {} is not in the map", container);
            return Ok(None);
        }
        return Err(Error::MissingContainer(container.to_string()));
    };
    let Some(target) = chm.entry(entry) else {
        if lenient {
            tracing::warn!("Merge target {}::{} does not exist", container, entry);
            return Ok(None);
        }
        return Err(Error::MissingEntry(format!("{entry} in {container}")));
    };
    tracing::debug!("Merging {}::{}", name, entry);
    let sitemap = Sitemap::parse(&chm.entry_contents(target)?)?;
    Ok(Some((name.to_string(), sitemap)))
}
