use crate::utils::error::{ConvertError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Minimal element tree built from quick-xml events. Namespace prefixes are dropped.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    /// Text runs in document order; a child element between two runs splits them.
    pub texts: Vec<String>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();

        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = match attr.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            attributes,
            ..Default::default()
        })
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn required_attr(&self, key: &str) -> Result<&str> {
        self.attr(key).ok_or_else(|| {
            ConvertError::sbml(&self.name, format!("missing required attribute '{}'", key))
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Children of `<list>/<item>` pairs such as `listOfSpecies/species`.
    pub fn list_items<'a>(&'a self, list: &str, item: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.child(list)
            .into_iter()
            .flat_map(move |l| l.children_named(item))
    }

    pub fn text(&self) -> String {
        self.texts.concat().trim().to_string()
    }

    pub fn f64_attr(&self, key: &str) -> Result<Option<f64>> {
        self.attr(key)
            .map(|raw| {
                parse_f64(raw.trim()).ok_or_else(|| {
                    ConvertError::sbml(
                        &self.name,
                        format!("attribute '{}' is not a number: '{}'", key, raw),
                    )
                })
            })
            .transpose()
    }

    pub fn bool_attr(&self, key: &str, default: bool) -> Result<bool> {
        match self.attr(key).map(str::trim) {
            None => Ok(default),
            Some("true") | Some("1") => Ok(true),
            Some("false") | Some("0") => Ok(false),
            Some(other) => Err(ConvertError::sbml(
                &self.name,
                format!("attribute '{}' is not a boolean: '{}'", key, other),
            )),
        }
    }
}

pub fn parse_f64(raw: &str) -> Option<f64> {
    match raw {
        "INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        other => other.parse().ok(),
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(ConvertError::sbml(
            element.name,
            "document has more than one root element",
        )),
    }
}

pub fn parse_document(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Element::from_start(&start)?),
            Event::Empty(start) => {
                let element = Element::from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ConvertError::sbml("document", "unbalanced closing tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let content = match text.unescape() {
                        Ok(v) => v.into_owned(),
                        Err(_) => String::from_utf8_lossy(&text).into_owned(),
                    };
                    top.texts.push(content);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.texts
                        .push(String::from_utf8_lossy(&data.into_inner()).into_owned());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ConvertError::sbml(
            &open.name,
            "unexpected end of document",
        ));
    }

    root.ok_or_else(|| ConvertError::sbml("document", "document is empty"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_elements_and_attributes() {
        let doc = parse_document(
            r#"<?xml version="1.0"?>
            <sbml:root xmlns:sbml="urn:x" a="1">
              <item id="x" flag="true"/>
              <item id="y">hello &amp; bye</item>
            </sbml:root>"#,
        )
        .unwrap();

        assert_eq!(doc.name, "root");
        assert_eq!(doc.attr("a"), Some("1"));
        let items: Vec<_> = doc.children_named("item").collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].bool_attr("flag", false).unwrap());
        assert_eq!(items[1].text(), "hello & bye");
    }

    #[test]
    fn test_text_runs_split_by_child() {
        let doc = parse_document("<cn>1.5<sep/>3</cn>").unwrap();
        assert_eq!(doc.texts, vec!["1.5".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_mismatched_tags_are_errors() {
        assert!(parse_document("<a><b></a>").is_err());
        assert!(parse_document("<a>").is_err());
        assert!(parse_document("").is_err());
    }

    #[test]
    fn test_numeric_and_bool_attributes() {
        let doc = parse_document(r#"<p value="1e-3" bad="x" c="maybe"/>"#).unwrap();
        assert_eq!(doc.f64_attr("value").unwrap(), Some(0.001));
        assert_eq!(doc.f64_attr("missing").unwrap(), None);
        assert!(doc.f64_attr("bad").is_err());
        assert!(doc.bool_attr("c", true).is_err());
        assert!(doc.bool_attr("missing", true).unwrap());
    }
}
