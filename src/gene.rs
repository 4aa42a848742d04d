//! Genes and gene collections (C1's naming layer).
//!
//! A [`GeneCollection`] owns an ordered list of parser rules that turn a raw
//! name from an input file into a canonical name plus an optional splice
//! variant id. This mirrors `GeneCollection::try_get_gene_variant` in the
//! source project: rules are tried in order, the first match wins.

use regex::Regex;

use crate::error::{Error, Result, SpliceVariantId};

/// Opaque handle to a [`Gene`] owned by a [`crate::store::DomainStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeneHandle(pub(crate) u32);

/// Opaque handle to a [`GeneCollection`] owned by a [`crate::store::DomainStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionHandle(pub(crate) u32);

/// A single (regex, replacement, splice-variant capture group) rule.
///
/// `splice_variant_group` names a capture group whose numeric value, if
/// present and not equal to 1, makes the resolution an unsupported variant.
pub struct ParserRule {
    /// The pattern as the caller wrote it, kept around for `pattern()`
    /// (Debug output, snapshot round-tripping) since `regex`'s source is the
    /// internally-anchored form.
    source_pattern: String,
    regex: Regex,
    replace_template: String,
    splice_variant_group: Option<usize>,
}

impl std::fmt::Debug for ParserRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRule")
            .field("pattern", &self.source_pattern)
            .field("replace_template", &self.replace_template)
            .field("splice_variant_group", &self.splice_variant_group)
            .finish()
    }
}

/// Outcome of trying to parse a raw name against one rule.
pub struct ParsedName {
    pub canonical: String,
    pub splice_variant: Option<SpliceVariantId>,
}

impl ParserRule {
    pub fn new(
        pattern: &str,
        replace_template: &str,
        splice_variant_group: Option<usize>,
    ) -> Result<Self> {
        // Anchored so the rule must match the *entire* raw name, mirroring
        // the source project's `std::regex_match` (whole-string match, not
        // search-for-a-substring). Without this, a lazy quantifier like the
        // "unknown" collection's `(.+?)` catch-all would only ever consume
        // its shortest possible prefix under this crate's leftmost-first NFA
        // semantics, rather than growing to cover the whole name the way a
        // backtracking whole-match engine forces it to.
        let anchored = format!("^(?:{pattern})$");
        let regex = Regex::new(&anchored)
            .map_err(|e| Error::Validation {
                path: "<parser rule>".into(),
                line: 0,
                message: format!("invalid regex '{pattern}': {e}"),
            })?;
        Ok(ParserRule {
            source_pattern: pattern.to_string(),
            regex,
            replace_template: replace_template.to_string(),
            splice_variant_group,
        })
    }

    /// The "unknown" collection's catch-all rule: `(.+?) -> $1`, no splice
    /// variant capture.
    pub fn catch_all() -> Self {
        ParserRule::new("(.+?)", "$1", None).expect("catch-all regex is valid")
    }

    pub fn pattern(&self) -> &str {
        &self.source_pattern
    }

    pub fn replace_template(&self) -> &str {
        &self.replace_template
    }

    pub fn splice_variant_group(&self) -> Option<usize> {
        self.splice_variant_group
    }

    fn try_parse(&self, raw: &str) -> Option<ParsedName> {
        let captures = self.regex.captures(raw)?;
        if captures.get(0)?.range() != (0..raw.len()) {
            return None;
        }
        let mut canonical = String::new();
        captures.expand(&self.replace_template, &mut canonical);

        let splice_variant = self
            .splice_variant_group
            .and_then(|group| captures.get(group))
            .and_then(|m| m.as_str().parse::<SpliceVariantId>().ok());

        Some(ParsedName {
            canonical,
            splice_variant,
        })
    }
}

/// Named namespace of genes for one species/source, with its own name
/// resolution rules.
#[derive(Debug)]
pub struct GeneCollection {
    pub(crate) handle: CollectionHandle,
    name: String,
    is_unknown: bool,
    rules: Vec<ParserRule>,
    gene_web_page_template: Option<String>,
}

impl GeneCollection {
    pub fn new(handle: CollectionHandle, name: &str, rules: Vec<ParserRule>) -> Result<Self> {
        if rules.is_empty() {
            return Err(Error::EmptyParserRules(name.to_string()));
        }
        Ok(GeneCollection {
            handle,
            name: name.to_string(),
            is_unknown: false,
            rules,
            gene_web_page_template: None,
        })
    }

    /// The distinguished "unknown" collection: catches names no other
    /// collection resolved.
    pub fn unknown(handle: CollectionHandle) -> Self {
        GeneCollection {
            handle,
            name: "Unknown".to_string(),
            is_unknown: true,
            rules: vec![ParserRule::catch_all()],
            gene_web_page_template: None,
        }
    }

    pub fn set_gene_web_page_template(&mut self, template: String) {
        self.gene_web_page_template = Some(template);
    }

    pub fn gene_web_page(&self, gene_name: &str) -> Option<String> {
        self.gene_web_page_template
            .as_ref()
            .map(|t| t.replace("$name", gene_name))
    }

    pub fn gene_web_page_template(&self) -> Option<&str> {
        self.gene_web_page_template.as_deref()
    }

    pub fn rules(&self) -> &[ParserRule] {
        &self.rules
    }

    pub fn handle(&self) -> CollectionHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unknown(&self) -> bool {
        self.is_unknown
    }

    /// Tries every rule in order; returns the first match's parse result.
    pub fn try_parse(&self, raw_name: &str) -> Option<ParsedName> {
        for rule in &self.rules {
            if let Some(parsed) = rule.try_parse(raw_name) {
                return Some(parsed);
            }
        }
        None
    }
}

/// A coding unit identified by a case-insensitive canonical name, unique
/// within its owning collection.
#[derive(Debug)]
pub struct Gene {
    pub(crate) handle: GeneHandle,
    pub(crate) collection: CollectionHandle,
    name: String,
    annotation: Option<String>,
    families: Vec<crate::family::FamilyHandle>,
}

impl Gene {
    pub fn new(handle: GeneHandle, collection: CollectionHandle, name: String) -> Self {
        Gene {
            handle,
            collection,
            name,
            annotation: None,
            families: Vec::new(),
        }
    }

    pub fn handle(&self) -> GeneHandle {
        self.handle
    }

    pub fn collection(&self) -> CollectionHandle {
        self.collection
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }

    /// Sets the functional annotation. Returns `true` if a different,
    /// non-empty annotation was already present (caller should warn).
    pub fn set_annotation(&mut self, text: String) -> bool {
        let text = text.trim().to_string();
        if text.is_empty() {
            return false;
        }
        let is_duplicate_conflict = matches!(&self.annotation, Some(existing) if existing != &text);
        self.annotation = Some(text);
        is_duplicate_conflict
    }

    pub fn families(&self) -> &[crate::family::FamilyHandle] {
        &self.families
    }

    pub(crate) fn families_mut(&mut self) -> &mut Vec<crate::family::FamilyHandle> {
        &mut self.families
    }
}

/// Canonicalises a raw name for case-insensitive comparison within a
/// collection's namespace.
pub fn fold_case(name: &str) -> String {
    name.to_lowercase()
}
