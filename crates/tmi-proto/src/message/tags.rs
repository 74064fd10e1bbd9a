//! IRCv3 message tag escaping, tag maps and raw-line tag merging.

/// A single tag: key and optional (unescaped) value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag(pub String, pub Option<String>);

/// Ordered tag-name → optional-value mapping.
///
/// Insertion order is kept; inserting an existing key replaces its value in
/// place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagMap {
    tags: Vec<Tag>,
}

impl TagMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tag.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<&str>) {
        let key = key.into();
        let value = value.map(str::to_owned);
        match self.tags.iter_mut().find(|Tag(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => self.tags.push(Tag(key, value)),
        }
    }

    /// Look up a tag. The outer `Option` is presence, the inner one the value.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.tags
            .iter()
            .find(|Tag(k, _)| k == key)
            .map(|Tag(_, v)| v.as_deref())
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.tags.iter().any(|Tag(k, _)| k == key)
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the map holds no tags.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }
}

impl From<Vec<Tag>> for TagMap {
    fn from(tags: Vec<Tag>) -> Self {
        let mut map = TagMap::new();
        for Tag(k, v) in tags {
            map.insert(k, v.as_deref());
        }
        map
    }
}

/// Escape a tag value into `out` according to the IRCv3 message-tags spec.
pub fn escape_tag_value_into(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            ';' => out.push_str("\\:"),
            ' ' => out.push_str("\\s"),
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}

/// Escape a tag value for serialization.
pub fn escape_tag_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    escape_tag_value_into(&mut escaped, value);
    escaped
}

/// Unescape a tag value from wire format.
///
/// Reverses [`escape_tag_value`]. Unknown escapes drop the backslash, a
/// trailing lone backslash is dropped.
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let r = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(c) => c,
                None => break,
            }
        } else {
            c
        };
        unescaped.push(r);
    }
    unescaped
}

/// Parse a raw tag block (without the leading `@`) into unescaped tags.
pub(crate) fn parse_tag_block(block: &str) -> Vec<Tag> {
    block
        .split(';')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => Tag(key.to_owned(), Some(unescape_tag_value(value))),
            None => Tag(pair.to_owned(), None),
        })
        .collect()
}

/// Merge `extra` onto the tag block of a raw wire line.
///
/// The extra tags lead the block in their insertion order; pre-existing tags
/// follow verbatim unless `extra` overrides their key. A line without tags
/// gains a new leading block. The rest of the line is copied byte for byte,
/// and merging the same map twice yields the same line as merging it once.
pub fn merge_tags(raw: &str, extra: &TagMap) -> String {
    if extra.is_empty() {
        return raw.to_owned();
    }

    let (existing, rest) = match raw.strip_prefix('@') {
        Some(after) => after.split_once(' ').unwrap_or((after, "")),
        None => ("", raw),
    };

    let mut out = String::with_capacity(raw.len() + 16 * extra.len());
    out.push('@');

    let mut first = true;
    for Tag(key, value) in extra.iter() {
        if !first {
            out.push(';');
        }
        first = false;
        out.push_str(key);
        if let Some(value) = value {
            out.push('=');
            escape_tag_value_into(&mut out, value);
        }
    }

    for pair in existing.split(';').filter(|s| !s.is_empty()) {
        let key = pair.split_once('=').map_or(pair, |(k, _)| k);
        if extra.contains_key(key) {
            continue;
        }
        out.push(';');
        out.push_str(pair);
    }

    out.push(' ');
    out.push_str(rest);
    out
}
