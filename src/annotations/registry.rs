//! In-memory annotation registry for one content document
//!
//! Annotations are keyed by their canonical CFI string: adding a second
//! annotation at the same CFI replaces the first. Listeners are told about
//! every insertion and removal, which is how renderers keep their drawing
//! in sync with the registry.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use super::types::{Annotation, AnnotationProps, AnnotationSnapshot};
use crate::cfi::{self, CacheStats, ParseCache, Position, ResolvedCfi};
use crate::config::EngineConfig;
use crate::dom::DomNode;
use crate::error::Result;

/// A CFI handed to [`AnnotationRegistry::add`]
#[derive(Debug, Clone)]
pub enum CfiInput<N> {
    /// Parsed and resolved against the registry's document
    Raw(String),
    /// Already resolved by the caller
    Resolved(ResolvedCfi<N>),
}

impl<N> From<&str> for CfiInput<N> {
    fn from(raw: &str) -> Self {
        CfiInput::Raw(raw.to_string())
    }
}

impl<N> From<String> for CfiInput<N> {
    fn from(raw: String) -> Self {
        CfiInput::Raw(raw)
    }
}

impl<N> From<ResolvedCfi<N>> for CfiInput<N> {
    fn from(cfi: ResolvedCfi<N>) -> Self {
        CfiInput::Resolved(cfi)
    }
}

/// What to remove from the registry
#[derive(Debug, Clone, Copy)]
pub enum RemoveTarget<'a, N> {
    Raw(&'a str),
    Resolved(&'a ResolvedCfi<N>),
    Annotation(&'a Annotation<N>),
}

impl<'a, N> From<&'a str> for RemoveTarget<'a, N> {
    fn from(raw: &'a str) -> Self {
        RemoveTarget::Raw(raw)
    }
}

impl<'a, N> From<&'a ResolvedCfi<N>> for RemoveTarget<'a, N> {
    fn from(cfi: &'a ResolvedCfi<N>) -> Self {
        RemoveTarget::Resolved(cfi)
    }
}

impl<'a, N> From<&'a Annotation<N>> for RemoveTarget<'a, N> {
    fn from(annotation: &'a Annotation<N>) -> Self {
        RemoveTarget::Annotation(annotation)
    }
}

/// Receives registry changes
pub trait AnnotationListener<N> {
    fn added(&mut self, _annotation: &Annotation<N>) {}

    fn removed(&mut self, _annotation: &Annotation<N>) {}
}

/// Annotations of one content document
pub struct AnnotationRegistry<N> {
    root: N,
    cache: ParseCache,
    annotations: HashMap<String, Annotation<N>>,
    listeners: Vec<Box<dyn AnnotationListener<N>>>,
}

impl<N: DomNode> AnnotationRegistry<N> {
    /// Registry for the document whose document element is `root`
    pub fn new(root: N) -> Self {
        Self::with_cache(root, ParseCache::default())
    }

    pub fn with_config(root: N, config: &EngineConfig) -> Self {
        Self::with_cache(root, ParseCache::new(config.cache_capacity))
    }

    pub fn with_cache(root: N, cache: ParseCache) -> Self {
        Self {
            root,
            cache,
            annotations: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl AnnotationListener<N> + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Parse (through the cache) and resolve a CFI in this document
    pub fn resolve(&mut self, cfi: &str) -> Result<ResolvedCfi<N>> {
        let address = self.cache.parse(cfi)?;
        ResolvedCfi::new(address, self.root)
    }

    /// Add an annotation, replacing any annotation at the same CFI
    ///
    /// Nothing is stored if the CFI does not parse or resolve.
    pub fn add(
        &mut self,
        input: impl Into<CfiInput<N>>,
        props: AnnotationProps,
    ) -> Result<&Annotation<N>> {
        let cfi = match input.into() {
            CfiInput::Raw(raw) => self.resolve(&raw)?,
            CfiInput::Resolved(cfi) => cfi,
        };
        let key = cfi.as_str().to_string();
        let annotation = Annotation::new(cfi, props);

        let listeners = &mut self.listeners;
        let stored = match self.annotations.entry(key) {
            Entry::Occupied(mut slot) => {
                tracing::debug!(cfi = %slot.key(), "replacing annotation");
                let old = slot.insert(annotation);
                for listener in listeners.iter_mut() {
                    listener.removed(&old);
                }
                slot.into_mut()
            }
            Entry::Vacant(slot) => {
                tracing::debug!(cfi = %slot.key(), "adding annotation");
                slot.insert(annotation)
            }
        };

        for listener in listeners.iter_mut() {
            listener.added(stored);
        }
        Ok(stored)
    }

    /// Remove the annotation at a CFI
    ///
    /// Returns `Ok(None)`, without notifying anyone, when nothing is stored
    /// there. Only a raw string that does not parse is an error.
    pub fn remove<'a>(
        &mut self,
        target: impl Into<RemoveTarget<'a, N>>,
    ) -> Result<Option<Annotation<N>>>
    where
        N: 'a,
    {
        let key = match target.into() {
            RemoveTarget::Raw(raw) => self.cache.parse(raw)?.to_string(),
            RemoveTarget::Resolved(cfi) => cfi.as_str().to_string(),
            RemoveTarget::Annotation(annotation) => annotation.key().to_string(),
        };

        let Some(removed) = self.annotations.remove(&key) else {
            tracing::trace!(cfi = %key, "no annotation to remove");
            return Ok(None);
        };

        tracing::debug!(cfi = %key, "removed annotation");
        for listener in self.listeners.iter_mut() {
            listener.removed(&removed);
        }
        Ok(Some(removed))
    }

    /// Look up an annotation by CFI, in any spelling that parses to its key
    pub fn get(&self, cfi: &str) -> Option<&Annotation<N>> {
        self.annotations.get(cfi).or_else(|| {
            let canonical = cfi::parse(cfi).ok()?.to_string();
            self.annotations.get(&canonical)
        })
    }

    pub fn contains(&self, cfi: &str) -> bool {
        self.get(cfi).is_some()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Annotations in reading order
    pub fn iter(&self) -> impl Iterator<Item = &Annotation<N>> {
        let mut sorted: Vec<&Annotation<N>> = self.annotations.values().collect();
        sorted.sort_by(|a, b| a.cfi.address().cmp(b.cfi.address()));
        sorted.into_iter()
    }

    /// Annotations whose span contains `position`, in reading order
    pub fn annotations_at(&self, position: &Position<N>) -> Vec<&Annotation<N>> {
        self.iter()
            .filter(|annotation| annotation.cfi.span().contains(position))
            .collect()
    }

    /// Remove everything, notifying listeners in reading order
    pub fn clear(&mut self) {
        let mut removed: Vec<Annotation<N>> = self.annotations.drain().map(|(_, a)| a).collect();
        removed.sort_by(|a, b| a.cfi.address().cmp(b.cfi.address()));

        tracing::debug!(count = removed.len(), "clearing annotations");
        for annotation in &removed {
            for listener in self.listeners.iter_mut() {
                listener.removed(annotation);
            }
        }
    }

    /// Re-anchor every annotation in a new version of the document
    ///
    /// Annotations whose CFI no longer resolves are dropped and reported as
    /// removed. Returns how many were dropped.
    pub fn reload(&mut self, root: N) -> usize {
        self.root = root;
        let previous = std::mem::take(&mut self.annotations);
        let mut dropped = 0;

        for (key, annotation) in previous {
            match ResolvedCfi::new(Arc::clone(annotation.cfi.address()), root) {
                Ok(cfi) => {
                    self.annotations
                        .insert(key, Annotation::new(cfi, annotation.props));
                }
                Err(err) => {
                    if err.is_not_found() {
                        tracing::warn!(
                            cfi = %key,
                            error = %err,
                            "annotation no longer resolves, dropping"
                        );
                    } else {
                        tracing::error!(
                            cfi = %key,
                            error = %err,
                            "annotation failed to re-resolve, dropping"
                        );
                    }
                    for listener in self.listeners.iter_mut() {
                        listener.removed(&annotation);
                    }
                    dropped += 1;
                }
            }
        }
        dropped
    }

    /// Serializable view of every annotation, in reading order
    pub fn snapshot(&self) -> Vec<AnnotationSnapshot> {
        self.iter().map(Annotation::snapshot).collect()
    }

    pub fn root(&self) -> N {
        self.root
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::annotations::{AnnotationColor, AnnotationType};
    use crate::dom::parse_xhtml;
    use crate::dom::test_support::text_node;
    use crate::error::CfiError;

    const CHAPTER: &str = r#"<html><head><title>One</title></head><body>
<p id="p1">The quick brown fox</p>
<p id="p2">jumps over the lazy dog</p>
</body></html>"#;

    const REVISED: &str = r#"<html><head><title>One</title></head><body>
<p id="p1">The quick brown fox</p>
</body></html>"#;

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.0.borrow().clone()
        }
    }

    impl<N: DomNode> AnnotationListener<N> for Recorder {
        fn added(&mut self, annotation: &Annotation<N>) {
            self.0.borrow_mut().push(format!("added {}", annotation.key()));
        }

        fn removed(&mut self, annotation: &Annotation<N>) {
            self.0.borrow_mut().push(format!("removed {}", annotation.key()));
        }
    }

    #[test]
    fn test_add_raw_cfi() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let mut registry = AnnotationRegistry::new(doc.root_element());
        let recorder = Recorder::default();
        registry.subscribe(recorder.clone());

        let annotation = registry
            .add("epubcfi(/6/4!/4/2,/1:4,/1:9)", AnnotationProps::highlight())
            .unwrap();
        assert_eq!(annotation.cfi.text(), "quick");
        assert_eq!(annotation.annotation_type(), AnnotationType::Highlight);

        assert_eq!(registry.len(), 1);
        assert_eq!(recorder.events(), vec!["added epubcfi(/6/4!/4/2,/1:4,/1:9)"]);
    }

    #[test]
    fn test_same_cfi_replaces() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let mut registry = AnnotationRegistry::new(doc.root_element());
        let recorder = Recorder::default();
        registry.subscribe(recorder.clone());

        registry
            .add("epubcfi(/6/4!/4/2/1:4)", AnnotationProps::bookmark())
            .unwrap();
        // Different spelling, same canonical key
        registry
            .add(" epubcfi(/6/4!/4/2/1:4) ", AnnotationProps::note("second"))
            .unwrap();

        assert_eq!(registry.len(), 1);
        let stored = registry.get("epubcfi(/6/4!/4/2/1:4)").unwrap();
        assert_eq!(stored.props.text.as_deref(), Some("second"));
        assert_eq!(
            recorder.events(),
            vec![
                "added epubcfi(/6/4!/4/2/1:4)",
                "removed epubcfi(/6/4!/4/2/1:4)",
                "added epubcfi(/6/4!/4/2/1:4)",
            ]
        );
    }

    #[test]
    fn test_failed_add_stores_nothing() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let mut registry = AnnotationRegistry::new(doc.root_element());
        let recorder = Recorder::default();
        registry.subscribe(recorder.clone());

        assert!(matches!(
            registry.add("not-a-cfi", AnnotationProps::highlight()),
            Err(CfiError::Malformed(_))
        ));
        assert!(matches!(
            registry.add("epubcfi(/6/4!/4/20)", AnnotationProps::highlight()),
            Err(CfiError::UnresolvableStep { .. })
        ));
        assert!(registry.is_empty());
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_add_resolved_cfi() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let mut registry = AnnotationRegistry::new(doc.root_element());

        let resolved = registry.resolve("epubcfi(/6/4!/4/4/1:6)").unwrap();
        registry
            .add(resolved.clone(), AnnotationProps::highlight().with_color(AnnotationColor::Green))
            .unwrap();

        assert!(registry.contains(resolved.as_str()));
        let removed = registry.remove(&resolved).unwrap().unwrap();
        assert_eq!(removed.props.color, AnnotationColor::Green);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let mut registry = AnnotationRegistry::new(doc.root_element());
        let recorder = Recorder::default();
        registry.subscribe(recorder.clone());

        assert!(registry.remove("epubcfi(/6/4!/4/2/1:0)").unwrap().is_none());
        assert!(recorder.events().is_empty());
        assert!(registry.remove("garbage").is_err());
    }

    #[test]
    fn test_remove_by_annotation() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let mut registry = AnnotationRegistry::new(doc.root_element());
        let recorder = Recorder::default();
        registry.subscribe(recorder.clone());

        let annotation = registry
            .add("epubcfi(/6/4!/4/2/1:0)", AnnotationProps::bookmark())
            .unwrap()
            .clone();
        let removed = registry.remove(&annotation).unwrap();

        assert!(removed.is_some());
        assert!(registry.is_empty());
        assert_eq!(recorder.events().last().unwrap(), "removed epubcfi(/6/4!/4/2/1:0)");
    }

    #[test]
    fn test_iter_in_reading_order() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let mut registry = AnnotationRegistry::new(doc.root_element());
        for cfi in [
            "epubcfi(/6/4!/4/4/1:3)",
            "epubcfi(/6/4!/4/2/1:10)",
            "epubcfi(/6/4!/4/2/1:2)",
        ] {
            registry.add(cfi, AnnotationProps::bookmark()).unwrap();
        }

        let keys: Vec<&str> = registry.iter().map(|a| a.key()).collect();
        assert_eq!(
            keys,
            vec![
                "epubcfi(/6/4!/4/2/1:2)",
                "epubcfi(/6/4!/4/2/1:10)",
                "epubcfi(/6/4!/4/4/1:3)",
            ]
        );
    }

    #[test]
    fn test_annotations_at_position() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let mut registry = AnnotationRegistry::new(doc.root_element());
        registry
            .add("epubcfi(/6/4!/4,/2/1:4,/4/1:5)", AnnotationProps::highlight())
            .unwrap();
        registry
            .add("epubcfi(/6/4!/4/4/1:0)", AnnotationProps::bookmark())
            .unwrap();

        let jumps = text_node(&doc, "jumps over the lazy dog");
        let at_start = registry.annotations_at(&Position::new(jumps, 0));
        assert_eq!(at_start.len(), 2);

        let later = registry.annotations_at(&Position::new(jumps, 10));
        assert!(later.is_empty());
    }

    #[test]
    fn test_clear_notifies() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let mut registry = AnnotationRegistry::new(doc.root_element());
        let recorder = Recorder::default();
        registry.subscribe(recorder.clone());

        registry.add("epubcfi(/6/4!/4/4/1:0)", AnnotationProps::bookmark()).unwrap();
        registry.add("epubcfi(/6/4!/4/2/1:0)", AnnotationProps::bookmark()).unwrap();
        registry.clear();

        assert!(registry.is_empty());
        assert_eq!(
            &recorder.events()[2..],
            &[
                "removed epubcfi(/6/4!/4/2/1:0)".to_string(),
                "removed epubcfi(/6/4!/4/4/1:0)".to_string(),
            ]
        );
    }

    #[test]
    fn test_reload_drops_unresolvable() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let revised = parse_xhtml(REVISED).unwrap();
        let mut registry = AnnotationRegistry::new(doc.root_element());
        let recorder = Recorder::default();
        registry.subscribe(recorder.clone());

        registry.add("epubcfi(/6/4!/4/2/1:4)", AnnotationProps::bookmark()).unwrap();
        registry.add("epubcfi(/6/4!/4/4/1:4)", AnnotationProps::bookmark()).unwrap();

        assert_eq!(registry.reload(revised.root_element()), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            recorder.events().last().unwrap(),
            "removed epubcfi(/6/4!/4/4/1:4)"
        );

        let kept = registry.get("epubcfi(/6/4!/4/2/1:4)").unwrap();
        assert_eq!(kept.cfi.span().start.node, text_node(&revised, "The quick brown fox"));
    }

    #[test]
    fn test_raw_adds_use_parse_cache() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let mut registry = AnnotationRegistry::new(doc.root_element());

        registry.add("epubcfi(/6/4!/4/2/1:4)", AnnotationProps::bookmark()).unwrap();
        registry.add("epubcfi(/6/4!/4/2/1:4)", AnnotationProps::bookmark()).unwrap();
        registry.remove("epubcfi(/6/4!/4/2/1:4)").unwrap();

        let stats = registry.cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
    }

    #[test]
    fn test_snapshot() {
        let doc = parse_xhtml(CHAPTER).unwrap();
        let mut registry = AnnotationRegistry::new(doc.root_element());
        registry
            .add("epubcfi(/6/4!/4/2,/1:16,/1:19)", AnnotationProps::note("animal"))
            .unwrap();

        let json = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(json[0]["cfi"], "epubcfi(/6/4!/4/2,/1:16,/1:19)");
        assert_eq!(json[0]["kind"], "range");
        assert_eq!(json[0]["type"], "note");
        assert_eq!(json[0]["text"], "animal");
        assert_eq!(json[0]["quote"], "fox");
    }
}
