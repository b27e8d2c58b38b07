//!
//! Form definition parser
//! ----------------------
//! Parses raw XForms XML into the identity fields a definition is keyed by:
//! the form id, the (possibly blank) version string, and the display title.
//! Matching is by local element name so namespace prefixes (`h:`, `orx:`, or
//! none) do not matter. No versioning or persistence knowledge lives here;
//! schema extraction is a separate walk over the same bytes (see `schema`).

use roxmltree::{Document, Node};

use crate::error::{AppError, AppResult};

/// Identity fields extracted from a well-formed definition document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDefinition {
    pub xml_form_id: String,
    /// Blank when the document declares no version. Blank is a valid,
    /// distinct version value, never an error.
    pub version: String,
    /// Title from the document head, falling back to the form id.
    pub name: String,
}

/// Accept only XML content types for definition uploads. An absent declared
/// type is tolerated and treated as XML.
pub fn check_content_type(content_type: Option<&str>) -> AppResult<()> {
    let Some(ct) = content_type else { return Ok(()) };
    let base = ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase();
    if base == "application/xml" || base == "text/xml" || base.ends_with("+xml") {
        Ok(())
    } else {
        Err(AppError::unsupported_format(base))
    }
}

/// Parse raw definition text and extract `{xmlFormId, version, title}`.
///
/// Fails with `MalformedDocument` when the text is not well-formed XML, and
/// with `MissingIdentity` (field `formId`) when it parses but no primary
/// instance data node with a non-blank `id` attribute can be located. The
/// latter covers syntactically fine but unrecognizable documents such as a
/// lone `<test/>`.
pub fn parse(xml: &str) -> AppResult<ParsedDefinition> {
    let doc = Document::parse(xml).map_err(|_| AppError::malformed(xml.len()))?;

    let data_node = primary_instance_data(&doc);
    let xml_form_id = data_node
        .and_then(|n| attr_local(&n, "id"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::missing_identity("formId"))?;

    let version = data_node
        .and_then(|n| attr_local(&n, "version"))
        .unwrap_or("")
        .to_string();

    let name = head_title(&doc).unwrap_or_else(|| xml_form_id.clone());

    Ok(ParsedDefinition { xml_form_id, version, name })
}

/// First element child of the first `instance` under a `model`: the primary
/// instance data node. Secondary instances carrying a `src` attribute are
/// skipped.
pub(crate) fn primary_instance_data<'a>(doc: &'a Document<'a>) -> Option<Node<'a, 'a>> {
    let model = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "model")?;
    let instance = model
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "instance" && attr_local(n, "src").is_none())?;
    instance.children().find(|n| n.is_element())
}

/// Attribute lookup by local name, ignoring any namespace on the attribute.
pub(crate) fn attr_local<'a>(node: &Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes().find(|a| a.name() == name).map(|a| a.value())
}

fn head_title(doc: &Document) -> Option<String> {
    let head = doc
        .root_element()
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "head")?;
    let title = head
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "title")?;
    let text = title.text().map(str::trim).unwrap_or("");
    if text.is_empty() { None } else { Some(text.to_string()) }
}
