//! Code parameters
//!
//! `<structure>.code.parameters` holds a free-form tree describing how a
//! code was run. It is exempt from schema checks and can be written (and
//! optionally read back) as XML markup:
//!
//! ```xml
//! <parameters>
//!   <launcher index="0">
//!     <mharm>2</mharm>
//!     <name>'front'</name>
//!   </launcher>
//!   <tolerance>[0.1 0.05]</tolerance>
//! </parameters>
//! ```
//!
//! Elements carrying an `index` attribute become sequence items; text is
//! read with [`parse_literal_str`](crate::value::parse_literal_str).

use std::collections::BTreeMap;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{OdsError, OdsResult};
use crate::ods::Node;
use crate::path::Token;
use crate::value::{Value, parse_literal_str};

/// Root element name used when writing markup
pub const ROOT_ELEMENT: &str = "parameters";

/// Attribute marking sequence items
pub const INDEX_ATTRIBUTE: &str = "index";

/// True when the tokens address a `code.parameters` node
pub fn is_code_parameters_location(tokens: &[Token]) -> bool {
    matches!(
        tokens,
        [.., Token::Name(code), Token::Name(parameters)] if code == "code" && parameters == "parameters"
    )
}

fn xml_error(e: impl std::fmt::Display) -> OdsError {
    OdsError::Serialization(format!("XML: {}", e))
}

struct Frame {
    name: String,
    index: Option<usize>,
    node: Node,
    text: String,
}

impl Frame {
    fn open(e: &BytesStart) -> OdsResult<Self> {
        let name = String::from_utf8(e.name().as_ref().to_vec()).map_err(xml_error)?;
        let mut index = None;
        for attr in e.attributes().flatten() {
            if attr.key.as_ref() == INDEX_ATTRIBUTE.as_bytes() {
                let text = String::from_utf8(attr.value.to_vec()).map_err(xml_error)?;
                index = Some(text.trim().parse::<usize>().map_err(|_| {
                    xml_error(format!("invalid index `{}` on <{}>", text, name))
                })?);
            }
        }
        Ok(Self {
            name,
            index,
            node: Node::Unset,
            text: String::new(),
        })
    }

    fn close(self) -> (String, Option<usize>, Node) {
        let node = match self.node {
            Node::Unset => Node::Leaf(parse_literal_str(&self.text)),
            other => other,
        };
        (self.name, self.index, node)
    }
}

fn insert_child(parent: &mut Node, name: String, index: Option<usize>, child: Node) -> OdsResult<()> {
    if matches!(parent, Node::Unset) {
        *parent = Node::Mapping(BTreeMap::new());
    }
    let Node::Mapping(children) = parent else {
        return Err(xml_error(format!("<{}> mixes text and elements", name)));
    };

    match index {
        None => {
            if children.insert(name.clone(), child).is_some() {
                return Err(xml_error(format!("duplicate element <{}>", name)));
            }
        }
        Some(index) => {
            let slot = children
                .entry(name.clone())
                .or_insert_with(|| Node::Sequence(Vec::new()));
            let Node::Sequence(items) = slot else {
                return Err(xml_error(format!(
                    "<{}> appears both with and without an index",
                    name
                )));
            };
            if items.len() <= index {
                items.resize_with(index + 1, Node::default);
            }
            items[index] = child;
        }
    }
    Ok(())
}

/// Parse markup into a mapping node
pub fn parse_xml(xml: &str) -> OdsResult<Node> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => stack.push(Frame::open(e)?),
            Ok(Event::Empty(ref e)) => {
                let (name, index, node) = Frame::open(e)?.close();
                match stack.last_mut() {
                    Some(parent) => insert_child(&mut parent.node, name, index, node)?,
                    None => root = Some(Node::Mapping(BTreeMap::new())),
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&e.unescape().map_err(xml_error)?);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::End(_)) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| xml_error("unbalanced closing tag"))?;
                match stack.last_mut() {
                    Some(parent) => {
                        let (name, index, node) = frame.close();
                        insert_child(&mut parent.node, name, index, node)?;
                    }
                    None => {
                        root = Some(match frame.node {
                            Node::Unset => Node::Mapping(BTreeMap::new()),
                            node => node,
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(xml_error(e)),
        }
    }

    if !stack.is_empty() {
        return Err(xml_error("unexpected end of document"));
    }
    root.ok_or_else(|| xml_error("document has no root element"))
}

fn leaf_text(name: &str, value: &Value) -> OdsResult<String> {
    let text = match value {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format!("{:?}", f),
        Value::Str(s) => {
            if parse_literal_str(s) == Value::Str(s.clone()) {
                s.clone()
            } else {
                format!("'{}'", s)
            }
        }
        Value::IntArray(a) if a.ndim() == 1 => format!(
            "[{}]",
            a.data().iter().map(|i| i.to_string()).collect::<Vec<_>>().join(" ")
        ),
        Value::FloatArray(a) if a.ndim() == 1 => format!(
            "[{}]",
            a.data().iter().map(|f| format!("{:?}", f)).collect::<Vec<_>>().join(" ")
        ),
        other => {
            return Err(OdsError::type_error(
                name,
                format!("{} cannot be written as a code parameter", other.kind_name()),
            ));
        }
    };
    Ok(text)
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    index: Option<usize>,
    node: &Node,
) -> OdsResult<()> {
    let mut start = BytesStart::new(name);
    let index_text = index.map(|i| i.to_string());
    if let Some(index_text) = &index_text {
        start.push_attribute((INDEX_ATTRIBUTE, index_text.as_str()));
    }

    match node {
        Node::Unset => return Ok(()),
        Node::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                write_element(writer, name, Some(i), item)?;
            }
            return Ok(());
        }
        Node::Leaf(Value::StrArray(items)) => {
            for (i, item) in items.iter().enumerate() {
                write_element(writer, name, Some(i), &Node::Leaf(Value::Str(item.clone())))?;
            }
            return Ok(());
        }
        Node::Leaf(value) => {
            let text = leaf_text(name, value)?;
            writer.write_event(Event::Start(start)).map_err(xml_error)?;
            writer
                .write_event(Event::Text(BytesText::new(&text)))
                .map_err(xml_error)?;
        }
        Node::Mapping(children) => {
            writer.write_event(Event::Start(start)).map_err(xml_error)?;
            for (child_name, child) in children {
                write_element(writer, child_name, None, child)?;
            }
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)?;
    Ok(())
}

/// Render a mapping node as markup
pub fn to_xml(node: &Node) -> OdsResult<String> {
    let Node::Mapping(children) = node else {
        return Err(OdsError::type_error(
            ROOT_ELEMENT,
            "code parameters must be a mapping",
        ));
    };

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Start(BytesStart::new(ROOT_ELEMENT)))
        .map_err(xml_error)?;
    for (name, child) in children {
        write_element(&mut writer, name, None, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))
        .map_err(xml_error)?;

    String::from_utf8(writer.into_inner()).map_err(xml_error)
}
