//! Lossless, editable view of an HTML document.
//!
//! The document is split into start tags, raw `script`/`style` bodies and everything else. Only
//! start tags whose attributes were edited are re-rendered; every other byte is written back
//! exactly as it was read.

use std::sync::OnceLock;

use regex::Regex;

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

fn markup_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(
      r#"(?s)<!--.*?-->|<![^>]*>|<\?[^>]*>|</[A-Za-z][^>]*>|<[A-Za-z][A-Za-z0-9:-]*(?:[^>"']|"[^"]*"|'[^']*')*>"#,
    )
    .expect("invalid html markup regex")
  })
}

fn attribute_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+)))?"#)
      .expect("invalid html attribute regex")
  })
}

/// Handle to a start tag inside an [`HtmlDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagId(usize);

#[derive(Debug, Clone)]
enum Token {
  Verbatim(String),
  Tag(StartTag),
  RawText(String),
}

#[derive(Debug, Clone)]
struct Attribute {
  name: String,
  value: Option<String>,
  raw: String,
}

/// A start tag with editable attributes.
#[derive(Debug, Clone)]
pub struct StartTag {
  raw: String,
  name: String,
  attributes: Vec<Attribute>,
  self_closing: bool,
  dirty: bool,
}

impl StartTag {
  fn parse(raw: &str) -> Self {
    let inner = raw
      .strip_prefix('<')
      .and_then(|rest| rest.strip_suffix('>'))
      .unwrap_or(raw);
    let name_len = inner
      .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == ':' || ch == '-'))
      .unwrap_or(inner.len());
    let (name, rest) = inner.split_at(name_len);
    let self_closing = rest.trim_end().ends_with('/');

    let attributes = attribute_pattern()
      .captures_iter(rest)
      .filter_map(|captures| {
        let whole = captures.get(0)?;
        let name = captures.get(1)?.as_str().to_ascii_lowercase();
        let value = captures
          .get(2)
          .or_else(|| captures.get(3))
          .or_else(|| captures.get(4))
          .map(|found| found.as_str().to_string());
        Some(Attribute {
          name,
          value,
          raw: whole.as_str().to_string(),
        })
      })
      .collect();

    Self {
      raw: raw.to_string(),
      name: name.to_ascii_lowercase(),
      attributes,
      self_closing,
      dirty: false,
    }
  }

  /// Lower-cased element name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Entity-decoded value of the attribute `name`; empty for valueless attributes.
  pub fn attr(&self, name: &str) -> Option<String> {
    self
      .find_attribute(name)
      .map(|attribute| {
        html_escape::decode_html_entities(attribute.value.as_deref().unwrap_or_default())
          .into_owned()
      })
  }

  /// Whether the attribute `name` is present, with or without a value.
  pub fn has_attr(&self, name: &str) -> bool {
    self.find_attribute(name).is_some()
  }

  /// Whether the whitespace-separated `rel` list contains `token` (ASCII case-insensitive).
  pub fn has_rel(&self, token: &str) -> bool {
    self.attr("rel").is_some_and(|rel| {
      rel
        .split_ascii_whitespace()
        .any(|value| value.eq_ignore_ascii_case(token))
    })
  }

  /// Set attribute `name` to `value`, appending it when the tag does not carry it yet.
  pub fn set_attr(&mut self, name: &str, value: &str) {
    let name = name.to_ascii_lowercase();
    let raw = format!("{name}=\"{}\"", encode_attribute(value));
    match self
      .attributes
      .iter_mut()
      .find(|attribute| attribute.name == name)
    {
      Some(attribute) => {
        attribute.value = Some(value.to_string());
        attribute.raw = raw;
      }
      None => self.attributes.push(Attribute {
        name,
        value: Some(value.to_string()),
        raw,
      }),
    }
    self.dirty = true;
  }

  fn find_attribute(&self, name: &str) -> Option<&Attribute> {
    self
      .attributes
      .iter()
      .find(|attribute| attribute.name.eq_ignore_ascii_case(name))
  }

  fn render(&self, out: &mut String) {
    if !self.dirty {
      out.push_str(&self.raw);
      return;
    }

    out.push('<');
    out.push_str(&self.name);
    for attribute in &self.attributes {
      out.push(' ');
      out.push_str(&attribute.raw);
    }
    out.push_str(if self.self_closing { " />" } else { ">" });
  }
}

/// Parsed HTML document that serializes back to its input unless edited.
#[derive(Debug, Clone)]
pub struct HtmlDocument {
  tokens: Vec<Token>,
}

impl HtmlDocument {
  /// Split `html` into tokens. Never fails; anything unrecognised is kept as text.
  pub fn parse(html: &str) -> Self {
    let mut tokens = Vec::new();
    let mut position = 0;

    while let Some(found) = markup_pattern().find_at(html, position) {
      if found.start() > position {
        tokens.push(Token::Verbatim(html[position..found.start()].to_string()));
      }
      position = found.end();

      let raw = found.as_str();
      let is_start_tag = raw[1..].starts_with(|ch: char| ch.is_ascii_alphabetic());
      if !is_start_tag {
        tokens.push(Token::Verbatim(raw.to_string()));
        continue;
      }

      let tag = StartTag::parse(raw);
      let raw_text = RAW_TEXT_ELEMENTS.contains(&tag.name());
      let closing = raw_text.then(|| closing_tag_offset(html, position, tag.name()));
      tokens.push(Token::Tag(tag));

      if let Some(end) = closing {
        tokens.push(Token::RawText(html[position..end].to_string()));
        position = end;
      }
    }

    if position < html.len() {
      tokens.push(Token::Verbatim(html[position..].to_string()));
    }

    Self { tokens }
  }

  /// Start tags whose element name is one of `names`, in document order.
  pub fn tags_named(&self, names: &[&str]) -> Vec<TagId> {
    self
      .tokens
      .iter()
      .enumerate()
      .filter_map(|(index, token)| match token {
        Token::Tag(tag) if names.contains(&tag.name()) => Some(TagId(index)),
        _ => None,
      })
      .collect()
  }

  /// Every `link` and `script` start tag, in document order.
  pub fn link_and_script_tags(&self) -> Vec<TagId> {
    self.tags_named(&["link", "script"])
  }

  /// The start tag behind `id`.
  pub fn tag(&self, id: TagId) -> Option<&StartTag> {
    match self.tokens.get(id.0) {
      Some(Token::Tag(tag)) => Some(tag),
      _ => None,
    }
  }

  /// Mutable access to the start tag behind `id`.
  pub fn tag_mut(&mut self, id: TagId) -> Option<&mut StartTag> {
    match self.tokens.get_mut(id.0) {
      Some(Token::Tag(tag)) => Some(tag),
      _ => None,
    }
  }

  /// Inline body of the `script` or `style` element opened by `id`.
  pub fn script_text(&self, id: TagId) -> Option<&str> {
    match self.tokens.get(id.0 + 1) {
      Some(Token::RawText(text)) => Some(text),
      _ => None,
    }
  }

  /// Replace the inline body of the element opened by `id`. The text is written as-is.
  pub fn set_script_text(&mut self, id: TagId, text: &str) -> bool {
    match self.tokens.get_mut(id.0 + 1) {
      Some(Token::RawText(body)) => {
        *body = text.to_string();
        true
      }
      _ => false,
    }
  }

  /// Serialize the document.
  pub fn to_html(&self) -> String {
    let mut out = String::new();
    for token in &self.tokens {
      match token {
        Token::Verbatim(text) | Token::RawText(text) => out.push_str(text),
        Token::Tag(tag) => tag.render(&mut out),
      }
    }
    out
  }
}

fn closing_tag_offset(html: &str, from: usize, name: &str) -> usize {
  let needle = format!("</{name}");
  html[from..]
    .to_ascii_lowercase()
    .find(&needle)
    .map_or(html.len(), |offset| from + offset)
}

fn encode_attribute(value: &str) -> String {
  value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
  use super::*;

  const PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <!-- <script src="commented.js"></script> -->
    <LINK REL="Stylesheet" HREF='https://cdn.example.com/app.css?v=1&amp;t=2'>
    <style>a::before { content: "<link href=x.css>"; }</style>
  </head>
  <body data-empty>
    <script>
      if (a < b) { document.write('<script src="nested.js"></' + 'script>'); }
    </script>
    <script src="//cdn.example.com/app.js" defer></SCRIPT>
  </body>
</html>
"#;

  #[test]
  fn untouched_document_round_trips_byte_for_byte() {
    let document = HtmlDocument::parse(PAGE);
    assert_eq!(document.to_html(), PAGE);

    let malformed = "<p>unclosed <a href='x>text</p> < 3 &amp; <script>never closed";
    assert_eq!(HtmlDocument::parse(malformed).to_html(), malformed);
  }

  #[test]
  fn comments_and_raw_text_hide_markup() {
    let document = HtmlDocument::parse(PAGE);
    let tags = document.link_and_script_tags();
    assert_eq!(tags.len(), 3);

    let link = document.tag(tags[0]).unwrap();
    assert_eq!(link.name(), "link");
    assert!(link.has_rel("stylesheet"));
    assert_eq!(
      link.attr("href").as_deref(),
      Some("https://cdn.example.com/app.css?v=1&t=2")
    );

    let inline = document.tag(tags[1]).unwrap();
    assert!(!inline.has_attr("src"));
    assert!(document.script_text(tags[1]).unwrap().contains("nested.js"));

    let external = document.tag(tags[2]).unwrap();
    assert_eq!(external.attr("src").as_deref(), Some("//cdn.example.com/app.js"));
    assert!(external.has_attr("defer"));
    assert_eq!(document.script_text(tags[2]), Some(""));
  }

  #[test]
  fn numeric_and_named_references_are_decoded() {
    let html = concat!(
      r#"<script src="https://example.com/x.js?a=1&#38;b=2&#x26;c=3&amp;d=&quot;4&quot;"></script>"#,
      r#"<link href='caf&#233;.css?q=&lt;&#62;&gt;'>"#,
    );
    let document = HtmlDocument::parse(html);
    let tags = document.link_and_script_tags();

    assert_eq!(
      document.tag(tags[0]).unwrap().attr("src").as_deref(),
      Some("https://example.com/x.js?a=1&b=2&c=3&d=\"4\"")
    );
    assert_eq!(
      document.tag(tags[1]).unwrap().attr("href").as_deref(),
      Some("café.css?q=<>>")
    );
  }

  #[test]
  fn edited_tags_are_re_rendered_and_the_rest_is_kept() {
    let html = "<head>\n<link rel=stylesheet href='a.css'>\n<script src=\"x.js\"/></head>";
    let mut document = HtmlDocument::parse(html);
    let tags = document.link_and_script_tags();

    document
      .tag_mut(tags[0])
      .unwrap()
      .set_attr("href", "cdn/a \"b\" & c.css");
    document.tag_mut(tags[1]).unwrap().set_attr("data-local", "1");

    assert_eq!(
      document.to_html(),
      "<head>\n<link rel=stylesheet href=\"cdn/a &quot;b&quot; &amp; c.css\">\n<script src=\"x.js\" data-local=\"1\" /></head>"
    );
  }

  #[test]
  fn inline_script_text_is_replaced_raw() {
    let html = "<script>\nrequire.config({ vs: 'https://x/y' });\n</script><p>after</p>";
    let mut document = HtmlDocument::parse(html);
    let script = document.tags_named(&["script"])[0];

    assert!(document.set_script_text(script, "\nrequire.config({ vs: 'y & <z>' });\n"));
    assert_eq!(
      document.to_html(),
      "<script>\nrequire.config({ vs: 'y & <z>' });\n</script><p>after</p>"
    );
    assert!(!document.set_script_text(TagId(script.0 + 2), "nope"));
  }
}
