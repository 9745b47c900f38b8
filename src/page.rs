use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, trace};

use crate::ast::PageFragment;
use crate::error::ScriptError;
use crate::parser::ParserOptions;
use crate::template::parse_template_with;

/// An immutable compiled page: its body source, the key/value metadata
/// parsed from a leading HTML-comment block, and the fragment tree.
#[derive(Debug)]
pub struct SharpPage {
    pub source: String,
    pub metadata: HashMap<String, String>,
    pub fragments: Vec<PageFragment>,
}

impl SharpPage {
    pub fn compile(source: &str, options: ParserOptions) -> Result<SharpPage, ScriptError> {
        let (metadata, body) = parse_metadata(source);
        let fragments = parse_template_with(body, options)?;
        debug!(
            "compiled page: {} fragments, {} metadata keys",
            fragments.len(),
            metadata.len()
        );
        Ok(SharpPage {
            source: body.to_string(),
            metadata,
            fragments,
        })
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Parse a leading `<!-- key: value -->` metadata block. Returns the
/// parsed entries and the remaining body text. Pages without a leading
/// comment pass through untouched.
fn parse_metadata(source: &str) -> (HashMap<String, String>, &str) {
    let mut metadata = HashMap::new();
    let Some(rest) = source.strip_prefix("<!--") else {
        return (metadata, source);
    };
    let Some(close) = rest.find("-->") else {
        return (metadata, source);
    };

    for line in rest[..close].lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            // not a metadata block after all
            return (HashMap::new(), source);
        };
        metadata.insert(key.trim().to_string(), value.trim().to_string());
    }

    let mut body = &rest[close + 3..];
    if let Some(stripped) = body.strip_prefix('\n') {
        body = stripped;
    }
    (metadata, body)
}

type PageSlot = Arc<Mutex<Option<Arc<SharpPage>>>>;

/// Compiled-page cache keyed by exact source text.
///
/// Each key owns a slot mutex, so concurrent first requests for one source
/// serialize on a single compile while other keys proceed independently.
/// Failed compiles leave nothing behind. There is no eviction.
#[derive(Default)]
pub struct PageCache {
    slots: Mutex<HashMap<String, PageSlot>>,
}

impl PageCache {
    pub fn new() -> Self {
        PageCache::default()
    }

    pub fn get_or_compile(
        &self,
        source: &str,
        options: ParserOptions,
    ) -> Result<Arc<SharpPage>, ScriptError> {
        let slot = {
            let mut slots = self.slots.lock().expect("poisoned page cache");
            slots.entry(source.to_string()).or_default().clone()
        };

        let mut guard = slot.lock().expect("poisoned page slot");
        if let Some(page) = guard.as_ref() {
            trace!("page cache hit");
            return Ok(Arc::clone(page));
        }

        match SharpPage::compile(source, options) {
            Ok(page) => {
                let page = Arc::new(page);
                *guard = Some(Arc::clone(&page));
                Ok(page)
            }
            Err(err) => {
                drop(guard);
                let mut slots = self.slots.lock().expect("poisoned page cache");
                if let Some(existing) = slots.get(source) {
                    let empty = existing
                        .lock()
                        .expect("poisoned page slot")
                        .is_none();
                    if empty {
                        slots.remove(source);
                    }
                }
                Err(err)
            }
        }
    }

    /// Number of successfully compiled pages currently cached.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().expect("poisoned page cache");
        slots
            .values()
            .filter(|slot| slot.lock().expect("poisoned page slot").is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_block_is_stripped() {
        let source = "<!--\nlayout: main\ntitle: Home\n-->\nbody";
        let (metadata, body) = parse_metadata(source);
        assert_eq!(metadata.get("layout").map(String::as_str), Some("main"));
        assert_eq!(metadata.get("title").map(String::as_str), Some("Home"));
        assert_eq!(body, "body");
    }

    #[test]
    fn plain_comment_is_not_metadata() {
        let source = "<!-- just a comment -->\nbody";
        let (metadata, body) = parse_metadata(source);
        assert!(metadata.is_empty());
        assert_eq!(body, source);
    }

    #[test]
    fn page_without_comment_passes_through() {
        let (metadata, body) = parse_metadata("hello {{ name }}");
        assert!(metadata.is_empty());
        assert_eq!(body, "hello {{ name }}");
    }

    #[test]
    fn failed_compile_caches_nothing() {
        let cache = PageCache::new();
        let err = cache.get_or_compile("{{ unterminated", ParserOptions::default());
        assert!(err.is_err());
        assert_eq!(cache.len(), 0);
    }
}
