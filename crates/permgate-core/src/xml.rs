use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("attribute error: {0}")]
    Attribute(#[from] AttrError),

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("missing attribute '{attribute}' on <{tag}>")]
    MissingAttribute { tag: String, attribute: String },

    #[error("invalid value '{value}' for attribute '{attribute}' on <{tag}>")]
    InvalidAttribute {
        tag: String,
        attribute: String,
        value: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn required_attribute(&self, name: &str) -> Result<&str, XmlError> {
        self.attribute(name)
            .ok_or_else(|| XmlError::MissingAttribute {
                tag: self.name.clone(),
                attribute: name.to_string(),
            })
    }

    pub fn int_attribute(&self, name: &str) -> Result<i32, XmlError> {
        let value = self.required_attribute(name)?;
        value.parse().map_err(|_| XmlError::InvalidAttribute {
            tag: self.name.clone(),
            attribute: name.to_string(),
            value: value.to_string(),
        })
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, XmlError> {
        let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()));
        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }
}

// Text content is not retained.
pub fn parse_document(xml: &str) -> Result<Vec<XmlElement>, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut roots = Vec::new();
    let mut open: Vec<XmlElement> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => open.push(XmlElement::from_start(&start)?),
            Event::Empty(start) => {
                let element = XmlElement::from_start(&start)?;
                attach(&mut open, &mut roots, element);
            }
            Event::End(_) => {
                let element = open
                    .pop()
                    .ok_or_else(|| XmlError::Malformed("unexpected end tag".to_string()))?;
                attach(&mut open, &mut roots, element);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(XmlError::Malformed(format!(
            "unclosed tag <{}>",
            unclosed.name
        )));
    }

    Ok(roots)
}

fn attach(open: &mut [XmlElement], roots: &mut Vec<XmlElement>, element: XmlElement) {
    match open.last_mut() {
        Some(parent) => parent.children.push(element),
        None => roots.push(element),
    }
}

pub struct XmlSerializer {
    writer: Writer<Vec<u8>>,
}

impl XmlSerializer {
    pub fn new() -> Result<Self, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(Self { writer })
    }

    pub fn tag<F>(&mut self, name: &str, attributes: &[(&str, &str)], body: F) -> Result<(), XmlError>
    where
        F: FnOnce(&mut Self) -> Result<(), XmlError>,
    {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Start(start))?;
        body(self)?;
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    pub fn empty_tag(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), XmlError> {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Empty(start))?;
        Ok(())
    }

    pub fn finish(self) -> Result<String, XmlError> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| XmlError::Malformed(format!("serializer produced invalid utf-8: {e}")))
    }
}
